//! Profile subcommands.

use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use super::ProfileCommand;
use crate::llm::ChatMessage;
use crate::service::{GetProfileOptions, ProfileService};

/// Run a profile command. Store schemas must already exist.
pub async fn run_profile_command(
    cmd: ProfileCommand,
    service: &ProfileService,
) -> anyhow::Result<()> {
    match cmd {
        ProfileCommand::Init => {
            println!("Profile stores ready");
            Ok(())
        }
        ProfileCommand::Set {
            user,
            messages,
            transcript,
        } => {
            let messages = match transcript {
                Some(path) => load_transcript(&path)?,
                None => messages.into_iter().map(ChatMessage::user).collect(),
            };
            let outcome = service.set_profile(&user, &messages).await?;
            print_json(&outcome)?;
            if !outcome.success {
                anyhow::bail!("profile update finished with {} error(s)", outcome.errors.len());
            }
            Ok(())
        }
        ProfileCommand::Get {
            user,
            fields,
            evidence_limit,
        } => {
            let options = GetProfileOptions {
                fields,
                evidence_limit,
            };
            print_json(&service.get_profile(&user, &options).await?)
        }
        ProfileCommand::Delete { user } => {
            let outcome = service.delete_profile(&user).await?;
            print_json(&outcome)?;
            if let Some(error) = &outcome.error {
                anyhow::bail!("delete incomplete: {error}");
            }
            Ok(())
        }
        ProfileCommand::Missing { user, source } => {
            print_json(&service.missing_fields(&user, source).await?)
        }
    }
}

/// Read a transcript file: a JSON array of `{"role", "content"}` objects.
/// `role` defaults to `user`.
pub fn load_transcript(path: &Path) -> anyhow::Result<Vec<ChatMessage>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading transcript {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing transcript {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::llm::Role;

    #[test]
    fn transcript_roles_default_to_user() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"content": "I like soccer"}}, {{"role": "assistant", "content": "Nice!"}}]"#
        )
        .unwrap();

        let messages = load_transcript(file.path()).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
    }

    #[test]
    fn malformed_transcript_names_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = load_transcript(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("parsing transcript"));
    }
}
