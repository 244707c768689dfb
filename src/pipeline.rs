//! The write path: extract, map, decide, merge.
//!
//! Oracle and load failures end the run with `success = false`. Once the
//! operations are decided, every category is merged in memory and written
//! back as one document per category; those writes run concurrently and
//! fail independently.

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;

use crate::error::ValidationError;
use crate::llm::ChatMessage;
use crate::profile::graph_merge::merge_relation_graph;
use crate::profile::list_merge::apply_trait_operations;
use crate::profile::operations::{OperationCounts, OperationSet};
use crate::profile::{AdditionalProfile, FieldValue, IdentityMap, TraitCategory};
use crate::service::{ProfileService, require_user_id};

/// Result of [`ProfileService::set_profile`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SetProfileOutcome {
    pub success: bool,
    pub basic_info_updated: bool,
    pub additional_profile_updated: bool,
    pub operations_performed: OperationCounts,
    pub errors: Vec<String>,
}

impl SetProfileOutcome {
    fn succeeded() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    fn fail(&mut self, error: String) {
        self.success = false;
        self.errors.push(error);
    }

    fn failed(error: String) -> Self {
        let mut outcome = Self::default();
        outcome.fail(error);
        outcome
    }
}

/// One category ready to be written, with the operations it carries.
struct CategoryWrite {
    value: FieldValue,
    counts: OperationCounts,
}

impl ProfileService {
    /// Update a profile from a conversation.
    ///
    /// Only bad input is an `Err`. Everything that goes wrong later is
    /// reported in the outcome.
    pub async fn set_profile(
        &self,
        user_id: &str,
        messages: &[ChatMessage],
    ) -> Result<SetProfileOutcome, ValidationError> {
        let user_id = require_user_id(user_id)?;
        if messages.iter().all(|m| m.content.trim().is_empty()) {
            return Err(ValidationError::EmptyMessages);
        }

        let now = Utc::now();
        tracing::info!(user_id, messages = messages.len(), "Updating profile");

        let extraction = match self.oracle.extract(messages, now).await {
            Ok(extraction) => extraction,
            Err(e) => {
                tracing::error!(user_id, error = %e, "Extraction failed");
                return Ok(SetProfileOutcome::failed(e.to_string()));
            }
        };
        if extraction.delta.is_empty() {
            tracing::info!(user_id, "Nothing extracted, profile unchanged");
            return Ok(SetProfileOutcome::succeeded());
        }

        let existing_basic = match self.basic.get_basic_info(user_id).await {
            Ok(info) => info.unwrap_or_default(),
            Err(e) => {
                tracing::error!(user_id, error = %e, "Failed to load basic info");
                return Ok(SetProfileOutcome::failed(format!("basic_info: {e}")));
            }
        };
        let existing = match self.documents.get_document(user_id, None).await {
            Ok(document) => document.unwrap_or_default(),
            Err(e) => {
                tracing::error!(user_id, error = %e, "Failed to load additional profile");
                return Ok(SetProfileOutcome::failed(format!("additional_profile: {e}")));
            }
        };

        let (masked, ids) = IdentityMap::build(&existing);
        tracing::debug!(user_id, surrogates = ids.len(), "Masked existing profile");
        let ops = match self
            .oracle
            .decide(&extraction.delta, &existing_basic, &masked, now)
            .await
        {
            Ok(ops) => ops,
            Err(e) => {
                tracing::error!(user_id, error = %e, "Decision failed");
                return Ok(SetProfileOutcome::failed(e.to_string()));
            }
        };

        let mut outcome = SetProfileOutcome::succeeded();
        outcome.errors.extend(ops.rejected.iter().cloned());

        if !ops.basic_info.is_empty() {
            match self.basic.upsert_basic_info(user_id, &ops.basic_info).await {
                Ok(written) => outcome.basic_info_updated = written,
                Err(e) => {
                    tracing::error!(user_id, error = %e, "Failed to update basic info");
                    outcome.fail(format!("basic_info: {e}"));
                }
            }
        }

        let writes = self.plan_writes(&existing, &ops, &ids);
        let results = join_all(
            writes
                .iter()
                .map(|w| self.documents.put_field(user_id, &w.value)),
        )
        .await;

        for (write, result) in writes.iter().zip(results) {
            let field = write.value.field();
            match result {
                Ok(()) => {
                    outcome.additional_profile_updated = true;
                    outcome.operations_performed += write.counts;
                }
                Err(e) => {
                    tracing::error!(user_id, %field, error = %e, "Failed to write category");
                    outcome.fail(format!("{field}: {e}"));
                }
            }
        }

        tracing::info!(
            user_id,
            success = outcome.success,
            added = outcome.operations_performed.added,
            updated = outcome.operations_performed.updated,
            deleted = outcome.operations_performed.deleted,
            errors = outcome.errors.len(),
            "Profile update finished"
        );
        Ok(outcome)
    }

    /// Merge every touched category in memory.
    fn plan_writes(
        &self,
        existing: &AdditionalProfile,
        ops: &OperationSet,
        ids: &IdentityMap,
    ) -> Vec<CategoryWrite> {
        let mut writes = Vec::new();

        for category in TraitCategory::ALL {
            let category_ops = ops.trait_ops(category);
            if category_ops.is_empty() {
                continue;
            }
            let merged = apply_trait_operations(
                category,
                existing.traits(category).to_vec(),
                category_ops,
                ids,
                self.config.evidence_cap,
            );
            if merged.unresolved > 0 {
                tracing::warn!(%category, unresolved = merged.unresolved, "Dropped operations on unknown ids");
            }
            if merged.changed() {
                writes.push(CategoryWrite {
                    counts: merged.counts,
                    value: FieldValue::Traits(category, merged.items),
                });
            }
        }

        if let Some(update) = ops.social_context.clone() {
            let merged =
                merge_relation_graph(existing.social_context.clone().unwrap_or_default(), update);
            for warning in &merged.warnings {
                tracing::warn!(%warning, "Relation graph merge");
            }
            if merged.changed() {
                writes.push(CategoryWrite {
                    counts: merged.counts,
                    value: FieldValue::SocialContext(merged.graph),
                });
            }
        }

        if let Some(prefs) = &ops.learning_preferences
            && existing.learning_preferences.as_ref() != Some(prefs)
        {
            let counts = if existing.learning_preferences.is_some() {
                OperationCounts {
                    updated: 1,
                    ..Default::default()
                }
            } else {
                OperationCounts {
                    added: 1,
                    ..Default::default()
                }
            };
            writes.push(CategoryWrite {
                counts,
                value: FieldValue::LearningPreferences(prefs.clone()),
            });
        }

        writes
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::ProfileDocumentStore;
    use crate::oracle::ProfileOracle;
    use crate::profile::ProfileField;
    use crate::testing::{MemoryBasicInfoStore, MemoryDocumentStore, StubLlm};
    use tracing_test::traced_test;

    const EXTRACT_SOCCER: &str = r#"{"additional_profile": {"interests": [{"name": "soccer", "degree": 4, "evidence": [{"text": "I like soccer"}]}]}}"#;

    fn service(replies: &[&str]) -> (ProfileService, Arc<MemoryDocumentStore>, Arc<StubLlm>) {
        let llm = Arc::new(StubLlm::scripted(replies.iter().copied()));
        let docs = Arc::new(MemoryDocumentStore::default());
        let service = ProfileService::new(
            ProfileOracle::new(llm.clone()),
            Arc::new(MemoryBasicInfoStore::default()),
            docs.clone(),
        );
        (service, docs, llm)
    }

    #[tokio::test]
    async fn empty_messages_are_rejected() {
        let (service, _, llm) = service(&["{}"]);
        assert_eq!(
            service.set_profile("u1", &[]).await,
            Err(ValidationError::EmptyMessages)
        );
        assert_eq!(
            service.set_profile("u1", &[ChatMessage::user("  ")]).await,
            Err(ValidationError::EmptyMessages)
        );
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn empty_extraction_skips_the_decide_call() {
        let (service, _, llm) = service(&[r#"{"basic_info": {}, "additional_profile": {}}"#]);
        let outcome = service
            .set_profile("u1", &[ChatMessage::user("hello")])
            .await
            .unwrap();
        assert!(outcome.success);
        assert!(!outcome.additional_profile_updated);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn extraction_failure_is_reported_not_raised() {
        let (service, _, _) = service(&["sorry, no JSON today"]);
        let outcome = service
            .set_profile("u1", &[ChatMessage::user("I like soccer")])
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with("extract"));
    }

    #[tokio::test]
    async fn decision_failure_leaves_stores_untouched() {
        let (service, docs, _) = service(&[EXTRACT_SOCCER, "```json\n[\"not\", \"an object\"]\n```"]);
        let outcome = service
            .set_profile("u1", &[ChatMessage::user("I like soccer")])
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.errors[0].starts_with("decide"));
        assert!(docs.get_document("u1", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn category_write_failure_does_not_block_others() {
        let decide = r#"{"additional_profile": {
            "interests": [{"id": null, "event": "ADD", "name": "soccer", "degree": 4, "evidence": [{"text": "I like soccer"}]}],
            "skills": [{"id": null, "event": "ADD", "name": "dribbling", "degree": 2, "evidence": [{"text": "practising"}]}]
        }}"#;
        let (service, docs, _) = service(&[EXTRACT_SOCCER, decide]);
        docs.fail_field(ProfileField::Skills);

        let outcome = service
            .set_profile("u1", &[ChatMessage::user("I like soccer")])
            .await
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.additional_profile_updated);
        assert_eq!(outcome.operations_performed.added, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with("skills"));

        let stored = docs.get_document("u1", None).await.unwrap().unwrap();
        assert_eq!(stored.interests.len(), 1);
        assert!(stored.skills.is_empty());
    }

    #[tokio::test]
    async fn learning_preferences_replace_wholesale() {
        let extract = r#"{"additional_profile": {"learning_preferences": {"preferred_time": "morning"}}}"#;
        let decide = r#"{"additional_profile": {"learning_preferences": {"preferred_time": "morning", "difficulty_level": "beginner"}}}"#;
        let (service, docs, _) = service(&[extract, decide]);

        let outcome = service
            .set_profile("u1", &[ChatMessage::user("I study in the morning")])
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.operations_performed.added, 1);

        let stored = docs.get_document("u1", None).await.unwrap().unwrap();
        let prefs = stored.learning_preferences.unwrap();
        assert_eq!(prefs.preferred_time.as_deref(), Some("morning"));
        assert_eq!(prefs.difficulty_level.as_deref(), Some("beginner"));
        assert!(prefs.preferred_style.is_none());
    }

    #[tokio::test]
    #[traced_test]
    async fn operations_on_unknown_ids_are_logged() {
        let decide = r#"{"additional_profile": {"interests": [{"id": 7, "event": "DELETE"}]}}"#;
        let (service, docs, _) = service(&[EXTRACT_SOCCER, decide]);

        let outcome = service
            .set_profile("u1", &[ChatMessage::user("I like soccer")])
            .await
            .unwrap();

        assert!(outcome.success);
        assert!(!outcome.additional_profile_updated);
        assert!(docs.get_document("u1", None).await.unwrap().is_none());
        assert!(logs_contain("Dropped operations on unknown ids"));
    }
}
