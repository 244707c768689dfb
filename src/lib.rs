//! Evidence-backed user profiles, reconciled from conversations.
//!
//! A profile has two halves: scalar reference fields ([`profile::BasicInfo`])
//! kept in PostgreSQL, and a document of trait lists, a relation graph and
//! learning preferences ([`profile::AdditionalProfile`]) kept in libSQL.
//! [`service::ProfileService`] ties them together with a language-model
//! oracle that extracts facts from a transcript and decides how they change
//! what is already stored.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod llm;
pub mod oracle;
pub mod pipeline;
pub mod profile;
pub mod service;
pub mod testing;

pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::SetProfileOutcome;
pub use service::{
    DeleteOutcome, FieldSource, GetProfileOptions, MissingFieldLists, MissingFields,
    ProfileService,
};
