//! Command-line interface.
//!
//! Each subcommand maps onto one [`ProfileService`] operation and prints its
//! result as JSON on stdout. Logs go to stderr.

mod profile;

pub use profile::{load_transcript, run_profile_command};

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::profile::ProfileField;
use crate::service::FieldSource;

#[derive(Parser, Debug)]
#[command(
    name = "userprofile",
    version,
    about = "Evidence-backed user profiles reconciled from conversations"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: ProfileCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ProfileCommand {
    /// Create the store schemas and exit
    Init,

    /// Update a profile from a conversation
    Set {
        /// User whose profile is updated
        #[arg(long)]
        user: String,

        /// A user message; repeat for several turns
        #[arg(short, long = "message")]
        messages: Vec<String>,

        /// JSON file holding an array of {"role", "content"} messages
        #[arg(long, conflicts_with = "messages")]
        transcript: Option<PathBuf>,
    },

    /// Print a profile
    Get {
        #[arg(long)]
        user: String,

        /// Document categories to include (comma-separated)
        #[arg(long, value_delimiter = ',')]
        fields: Option<Vec<ProfileField>>,

        /// Evidence entries per item: -1 for all, 0 for none
        #[arg(long, allow_negative_numbers = true)]
        evidence_limit: Option<i64>,
    },

    /// Delete a profile from both stores
    Delete {
        #[arg(long)]
        user: String,
    },

    /// List fields that have no value yet
    Missing {
        #[arg(long)]
        user: String,

        /// pg, mongo or both
        #[arg(long, default_value = "both")]
        source: FieldSource,
    },
}
