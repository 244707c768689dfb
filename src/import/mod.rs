//! Cold-start import from an external summary source.
//!
//! When a profile is read before any conversation has produced one, the
//! registration summary kept by another service can seed both stores. The
//! import is best effort: every failure means "no data".

mod convert;
mod summary;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

pub use convert::{REGISTRATION_EVIDENCE, SEED_DEGREE, Seed, convert_summary};
pub use summary::HttpSummarySource;

use crate::db::{BasicInfoStore, ProfileDocumentStore};
use crate::error::ImportError;

/// Where cold-start summaries come from.
#[async_trait]
pub trait ColdStartSource: Send + Sync {
    /// The summary object for one user.
    async fn fetch_summary(&self, user_id: &str) -> Result<Map<String, Value>, ImportError>;
}

/// Seeds empty profiles from a [`ColdStartSource`].
#[derive(Clone)]
pub struct ColdStartImporter {
    source: Arc<dyn ColdStartSource>,
}

impl ColdStartImporter {
    pub fn new(source: Arc<dyn ColdStartSource>) -> Self {
        Self { source }
    }

    /// Fetch, convert and store. Returns whether anything was seeded.
    ///
    /// Errors are logged and swallowed.
    pub async fn import(
        &self,
        user_id: &str,
        basic: &dyn BasicInfoStore,
        documents: &dyn ProfileDocumentStore,
        now: DateTime<Utc>,
    ) -> bool {
        match self.try_import(user_id, basic, documents, now).await {
            Ok(seeded) => seeded,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Cold start import failed, treating profile as empty");
                false
            }
        }
    }

    async fn try_import(
        &self,
        user_id: &str,
        basic: &dyn BasicInfoStore,
        documents: &dyn ProfileDocumentStore,
        now: DateTime<Utc>,
    ) -> Result<bool, ImportError> {
        let summary = self.source.fetch_summary(user_id).await?;
        let seed = convert_summary(&summary, now);
        if seed.is_empty() {
            tracing::info!(user_id, "Cold start summary had nothing usable");
            return Ok(false);
        }

        basic.upsert_basic_info(user_id, &seed.basic_info).await?;
        if !seed.additional_profile.is_empty() {
            documents
                .upsert_document(user_id, &seed.additional_profile)
                .await?;
        }

        tracing::info!(
            user_id,
            basic_fields = seed.basic_info.len(),
            interests = seed.additional_profile.interests.len(),
            personality = seed.additional_profile.personality.len(),
            "Cold start import complete"
        );
        Ok(true)
    }
}
