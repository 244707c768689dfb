//! Persistence for the two halves of a profile.
//!
//! [`BasicInfoStore`] is the scalar store: one row of reference columns per
//! user. [`ProfileDocumentStore`] is the document store: one JSON value per
//! (user, category). The two are independent; nothing here spans both.

#[cfg(feature = "libsql")]
pub mod libsql;
#[cfg(feature = "libsql")]
pub mod libsql_migrations;
#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::profile::{AdditionalProfile, BasicInfo, FieldValue, ProfileField};

/// Scalar reference fields, keyed by user id.
#[async_trait]
pub trait BasicInfoStore: Send + Sync {
    /// Create the schema if it does not exist yet.
    async fn ensure_schema(&self) -> Result<(), DatabaseError>;

    /// `None` when the user has no row.
    async fn get_basic_info(&self, user_id: &str) -> Result<Option<BasicInfo>, DatabaseError>;

    /// Partial upsert: only the fields present in `info` are written.
    ///
    /// Returns `false` without touching the store when `info` is empty.
    async fn upsert_basic_info(&self, user_id: &str, info: &BasicInfo)
    -> Result<bool, DatabaseError>;

    /// Returns whether a row was removed.
    async fn delete_basic_info(&self, user_id: &str) -> Result<bool, DatabaseError>;
}

/// Category documents, keyed by user id.
#[async_trait]
pub trait ProfileDocumentStore: Send + Sync {
    /// Create the collection and its indexes if they do not exist yet.
    async fn ensure_schema(&self) -> Result<(), DatabaseError>;

    /// Load the stored document, restricted to `fields` when given.
    ///
    /// `None` when nothing at all is stored for the user.
    async fn get_document(
        &self,
        user_id: &str,
        fields: Option<&[ProfileField]>,
    ) -> Result<Option<AdditionalProfile>, DatabaseError>;

    /// Replace one whole category. Atomic for that category only.
    async fn put_field(&self, user_id: &str, value: &FieldValue) -> Result<(), DatabaseError>;

    /// Replace the whole document in one write.
    async fn upsert_document(
        &self,
        user_id: &str,
        document: &AdditionalProfile,
    ) -> Result<(), DatabaseError>;

    /// Returns whether anything was removed.
    async fn delete_document(&self, user_id: &str) -> Result<bool, DatabaseError>;
}
