//! SQLite-dialect schema for the libSQL document store.
//!
//! Run on every open; idempotent via `IF NOT EXISTS`.

/// Document store schema.
///
/// One row per (user, category). `value` is the category's JSON encoding and
/// `updated_at` is ISO-8601 text.
pub const SCHEMA: &str = r#"

CREATE TABLE IF NOT EXISTS profile_documents (
    user_id TEXT NOT NULL,
    field TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (user_id, field)
);

CREATE INDEX IF NOT EXISTS idx_profile_documents_user ON profile_documents(user_id);
CREATE INDEX IF NOT EXISTS idx_profile_documents_updated_at ON profile_documents(updated_at);

"#;
