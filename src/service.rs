//! The profile service: the four public operations over both stores.
//!
//! Dependencies are injected at construction. [`ProfileService::set_profile`]
//! lives in [`crate::pipeline`]; the read side is here.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::config::ProfileConfig;
use crate::db::{BasicInfoStore, ProfileDocumentStore};
use crate::error::{DatabaseError, ProfileError, ValidationError};
use crate::import::ColdStartImporter;
use crate::oracle::ProfileOracle;
use crate::profile::{BasicInfoField, EvidenceLimit, Profile, ProfileField};

/// Runs profile operations against one oracle and one pair of stores.
pub struct ProfileService {
    pub(crate) oracle: ProfileOracle,
    pub(crate) basic: Arc<dyn BasicInfoStore>,
    pub(crate) documents: Arc<dyn ProfileDocumentStore>,
    pub(crate) cold_start: Option<ColdStartImporter>,
    pub(crate) config: ProfileConfig,
}

impl ProfileService {
    pub fn new(
        oracle: ProfileOracle,
        basic: Arc<dyn BasicInfoStore>,
        documents: Arc<dyn ProfileDocumentStore>,
    ) -> Self {
        Self {
            oracle,
            basic,
            documents,
            cold_start: None,
            config: ProfileConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ProfileConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cold_start(mut self, importer: ColdStartImporter) -> Self {
        self.cold_start = Some(importer);
        self
    }

    /// Create schemas in both stores.
    pub async fn initialize(&self) -> Result<(), DatabaseError> {
        tracing::info!("Initializing profile stores");
        self.basic.ensure_schema().await?;
        self.documents.ensure_schema().await?;
        Ok(())
    }

    /// Read a profile, seeding it from the cold-start source on a full miss.
    pub async fn get_profile(
        &self,
        user_id: &str,
        options: &GetProfileOptions,
    ) -> Result<Profile, ProfileError> {
        let user_id = require_user_id(user_id)?;
        let limit = EvidenceLimit::from_i64(
            options
                .evidence_limit
                .unwrap_or(self.config.default_evidence_limit),
        )?;
        let fields = options.fields.as_deref();

        let mut basic_info = self.basic.get_basic_info(user_id).await?;
        let mut document = self.documents.get_document(user_id, fields).await?;

        let mut missing = basic_info.as_ref().is_none_or(|b| b.is_empty())
            && document.as_ref().is_none_or(|d| d.is_empty());
        // A projection can hide stored categories; only a full miss seeds.
        if missing && fields.is_some() {
            missing = self
                .documents
                .get_document(user_id, None)
                .await?
                .is_none_or(|d| d.is_empty());
        }
        if missing && let Some(importer) = &self.cold_start {
            tracing::info!(user_id, "Profile not found, attempting cold start");
            if importer
                .import(user_id, self.basic.as_ref(), self.documents.as_ref(), Utc::now())
                .await
            {
                basic_info = self.basic.get_basic_info(user_id).await?;
                document = self.documents.get_document(user_id, fields).await?;
            }
        }

        let mut additional_profile = document.unwrap_or_default();
        additional_profile.limit_evidence(limit);

        Ok(Profile {
            user_id: user_id.to_string(),
            basic_info: basic_info.unwrap_or_default(),
            additional_profile,
        })
    }

    /// Remove a profile from both stores.
    ///
    /// Store failures are reported in the outcome, not as an error.
    pub async fn delete_profile(&self, user_id: &str) -> Result<DeleteOutcome, ValidationError> {
        let user_id = require_user_id(user_id)?;
        let mut outcome = DeleteOutcome {
            success: true,
            ..Default::default()
        };
        let mut errors = Vec::new();

        match self.basic.delete_basic_info(user_id).await {
            Ok(deleted) => outcome.basic_info_deleted = deleted,
            Err(e) => {
                tracing::error!(user_id, error = %e, "Failed to delete basic info");
                errors.push(format!("basic_info: {e}"));
            }
        }
        match self.documents.delete_document(user_id).await {
            Ok(deleted) => outcome.additional_profile_deleted = deleted,
            Err(e) => {
                tracing::error!(user_id, error = %e, "Failed to delete additional profile");
                errors.push(format!("additional_profile: {e}"));
            }
        }

        if !errors.is_empty() {
            outcome.success = false;
            outcome.error = Some(errors.join("; "));
        }
        tracing::info!(
            user_id,
            basic = outcome.basic_info_deleted,
            additional = outcome.additional_profile_deleted,
            "Deleted profile"
        );
        Ok(outcome)
    }

    /// Fields with no stored value.
    pub async fn missing_fields(
        &self,
        user_id: &str,
        source: FieldSource,
    ) -> Result<MissingFields, ProfileError> {
        let user_id = require_user_id(user_id)?;
        let mut missing = MissingFields {
            user_id: user_id.to_string(),
            ..Default::default()
        };

        if source.includes_scalar() {
            let info = self.basic.get_basic_info(user_id).await?.unwrap_or_default();
            missing.missing_fields.basic_info = Some(info.missing_fields());
        }
        if source.includes_documents() {
            let document = self
                .documents
                .get_document(user_id, None)
                .await?
                .unwrap_or_default();
            missing.missing_fields.additional_profile = Some(document.missing_fields());
        }
        Ok(missing)
    }
}

pub(crate) fn require_user_id(user_id: &str) -> Result<&str, ValidationError> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingUserId);
    }
    Ok(trimmed)
}

/// Read options for [`ProfileService::get_profile`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetProfileOptions {
    /// Document categories to return; all when `None`.
    pub fields: Option<Vec<ProfileField>>,
    /// `-1` for all stored evidence, `0` for none, `n` for the newest `n`.
    /// Falls back to the configured default.
    pub evidence_limit: Option<i64>,
}

/// Result of [`ProfileService::delete_profile`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub success: bool,
    pub basic_info_deleted: bool,
    pub additional_profile_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Which store(s) a missing-field check looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldSource {
    /// The scalar store, `pg`.
    Scalar,
    /// The document store, `mongo`.
    Document,
    #[default]
    Both,
}

impl FieldSource {
    fn includes_scalar(self) -> bool {
        matches!(self, FieldSource::Scalar | FieldSource::Both)
    }

    fn includes_documents(self) -> bool {
        matches!(self, FieldSource::Document | FieldSource::Both)
    }
}

impl FromStr for FieldSource {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pg" | "scalar" => Ok(FieldSource::Scalar),
            "mongo" | "document" => Ok(FieldSource::Document),
            "both" => Ok(FieldSource::Both),
            _ => Err(ValidationError::InvalidSource(s.to_string())),
        }
    }
}

impl fmt::Display for FieldSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldSource::Scalar => "pg",
            FieldSource::Document => "mongo",
            FieldSource::Both => "both",
        })
    }
}

/// Result of [`ProfileService::missing_fields`].
///
/// Serializes as `{"user_id": .., "missing_fields": {"basic_info": [..], "additional_profile": [..]}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MissingFields {
    pub user_id: String,
    pub missing_fields: MissingFieldLists,
}

/// The missing names per store. A side is `None` when not checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MissingFieldLists {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic_info: Option<Vec<BasicInfoField>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_profile: Option<Vec<ProfileField>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{AdditionalProfile, BasicInfo, Degree, Evidence, TraitItem};
    use crate::testing::{MemoryBasicInfoStore, MemoryDocumentStore, StubLlm};
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    struct Fixture {
        basic: Arc<MemoryBasicInfoStore>,
        docs: Arc<MemoryDocumentStore>,
        service: ProfileService,
    }

    fn fixture() -> Fixture {
        let basic = Arc::new(MemoryBasicInfoStore::default());
        let docs = Arc::new(MemoryDocumentStore::default());
        let service = ProfileService::new(
            ProfileOracle::new(Arc::new(StubLlm::default())),
            basic.clone(),
            docs.clone(),
        );
        Fixture {
            basic,
            docs,
            service,
        }
    }

    fn with_evidence(n: usize) -> AdditionalProfile {
        let base = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        AdditionalProfile {
            interests: vec![TraitItem {
                id: "i1".into(),
                name: "chess".into(),
                degree: Degree::clamped(4),
                evidence: (0..n)
                    .map(|i| Evidence::new(format!("e{i}"), base - Duration::days(i as i64)))
                    .collect(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn field_source_parses_aliases() {
        assert_eq!("pg".parse::<FieldSource>().unwrap(), FieldSource::Scalar);
        assert_eq!("Mongo".parse::<FieldSource>().unwrap(), FieldSource::Document);
        assert_eq!("document".parse::<FieldSource>().unwrap(), FieldSource::Document);
        assert_eq!("both".parse::<FieldSource>().unwrap(), FieldSource::Both);
        assert_eq!(
            "redis".parse::<FieldSource>(),
            Err(ValidationError::InvalidSource("redis".into()))
        );
    }

    #[tokio::test]
    async fn get_profile_applies_evidence_limits() {
        let f = fixture();
        f.docs.insert("u1", &with_evidence(5));

        let read = |limit| {
            let options = GetProfileOptions {
                evidence_limit: limit,
                ..Default::default()
            };
            let service = &f.service;
            async move { service.get_profile("u1", &options).await.unwrap() }
        };

        assert_eq!(read(Some(0)).await.additional_profile.interests[0].evidence.len(), 0);
        assert_eq!(read(Some(2)).await.additional_profile.interests[0].evidence.len(), 2);
        assert_eq!(read(Some(-1)).await.additional_profile.interests[0].evidence.len(), 5);
        assert_eq!(read(None).await.additional_profile.interests[0].evidence.len(), 5);

        let err = f
            .service
            .get_profile(
                "u1",
                &GetProfileOptions {
                    evidence_limit: Some(-3),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProfileError::Validation(ValidationError::InvalidEvidenceLimit(-3))
        ));

        // Reads never shrink the stored copy.
        let stored = f.docs.get_document("u1", None).await.unwrap().unwrap();
        assert_eq!(stored.interests[0].evidence.len(), 5);
    }

    #[tokio::test]
    async fn get_profile_projects_fields() {
        let f = fixture();
        f.docs.insert("u1", &with_evidence(1));
        f.basic
            .upsert_basic_info("u1", &BasicInfo::new().with(BasicInfoField::Name, "Ann"))
            .await
            .unwrap();

        let profile = f
            .service
            .get_profile(
                "u1",
                &GetProfileOptions {
                    fields: Some(vec![ProfileField::Skills]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(profile.additional_profile.interests.is_empty());
        assert_eq!(profile.basic_info.get(BasicInfoField::Name), Some("Ann"));
    }

    #[tokio::test]
    async fn unknown_user_reads_as_empty_without_cold_start() {
        let f = fixture();
        let profile = f
            .service
            .get_profile("nobody", &GetProfileOptions::default())
            .await
            .unwrap();
        assert_eq!(profile.user_id, "nobody");
        assert!(profile.basic_info.is_empty());
        assert!(profile.additional_profile.is_empty());
    }

    #[tokio::test]
    async fn projected_read_does_not_reseed_a_stored_profile() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        use async_trait::async_trait;
        use serde_json::{Map, Value, json};

        use crate::error::ImportError;
        use crate::import::ColdStartSource;

        #[derive(Default)]
        struct CountingSource(AtomicUsize);

        #[async_trait]
        impl ColdStartSource for CountingSource {
            async fn fetch_summary(&self, _user_id: &str) -> Result<Map<String, Value>, ImportError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"hobbies": "drawing"}).as_object().cloned().unwrap_or_default())
            }
        }

        let f = fixture();
        let source = Arc::new(CountingSource::default());
        let service = ProfileService::new(
            ProfileOracle::new(Arc::new(StubLlm::default())),
            f.basic.clone(),
            f.docs.clone(),
        )
        .with_cold_start(ColdStartImporter::new(source.clone()));
        f.docs.insert("u1", &with_evidence(1));

        let profile = service
            .get_profile(
                "u1",
                &GetProfileOptions {
                    fields: Some(vec![ProfileField::Skills]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(profile.additional_profile.is_empty());
        assert_eq!(source.0.load(Ordering::SeqCst), 0);

        let full = service
            .get_profile("u1", &GetProfileOptions::default())
            .await
            .unwrap();
        assert_eq!(full.additional_profile.interests[0].name, "chess");

        let fresh = service
            .get_profile("u2", &GetProfileOptions::default())
            .await
            .unwrap();
        assert_eq!(fresh.additional_profile.interests[0].name, "drawing");
        assert_eq!(source.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blank_user_id_is_rejected() {
        let f = fixture();
        assert_eq!(
            f.service.delete_profile("  ").await,
            Err(ValidationError::MissingUserId)
        );
        assert!(matches!(
            f.service.missing_fields("", FieldSource::Both).await,
            Err(ProfileError::Validation(ValidationError::MissingUserId))
        ));
    }

    #[tokio::test]
    async fn delete_reports_store_failures_in_outcome() {
        let f = fixture();
        f.docs.insert("u1", &with_evidence(1));
        f.docs.fail_deletes(true);

        let outcome = f.service.delete_profile("u1").await.unwrap();
        assert!(!outcome.success);
        assert!(!outcome.basic_info_deleted);
        assert!(!outcome.additional_profile_deleted);
        assert!(outcome.error.unwrap().starts_with("additional_profile"));
    }

    #[tokio::test]
    async fn missing_fields_by_source() {
        let f = fixture();
        f.docs.insert("u1", &with_evidence(1));

        let scalar = f.service.missing_fields("u1", FieldSource::Scalar).await.unwrap();
        let json = serde_json::to_value(&scalar).unwrap();
        assert_eq!(json["user_id"], "u1");
        assert_eq!(
            json["missing_fields"]["basic_info"].as_array().unwrap().len(),
            BasicInfoField::ALL.len()
        );
        assert!(json["missing_fields"].get("additional_profile").is_none());
        assert!(json.get("basic_info").is_none());

        let docs = f.service.missing_fields("u1", FieldSource::Document).await.unwrap();
        assert!(docs.missing_fields.basic_info.is_none());
        assert!(
            !docs
                .missing_fields
                .additional_profile
                .unwrap()
                .contains(&ProfileField::Interests)
        );
    }
}
