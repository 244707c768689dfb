use chrono::{DateTime, SecondsFormat, Utc};

use super::ProfileOracle;
use super::payload::parse_delta;
use super::prompts::{EXTRACT_PROFILE_PROMPT, render};
use crate::error::{OracleError, OracleStage};
use crate::llm::ChatMessage;
use crate::profile::operations::ProfileDelta;

/// What the extract stage produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub delta: ProfileDelta,
    /// Entries dropped while validating the reply.
    pub dropped: Vec<String>,
}

/// Render a transcript as one `Role: content` line per message.
pub fn format_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

impl ProfileOracle {
    /// Extract a candidate delta from a transcript.
    ///
    /// Every evidence entry in the result is stamped with `now`.
    pub async fn extract(
        &self,
        messages: &[ChatMessage],
        now: DateTime<Utc>,
    ) -> Result<Extraction, OracleError> {
        let current_time = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        let transcript = format_transcript(messages);
        let prompt = render(
            EXTRACT_PROFILE_PROMPT,
            &[("current_time", current_time.as_str()), ("messages", transcript.as_str())],
        );

        let root = self.ask(OracleStage::Extract, prompt).await?;
        let (delta, dropped) = parse_delta(&root, now);
        for issue in &dropped {
            tracing::warn!(stage = %OracleStage::Extract, %issue, "Dropped extracted entry");
        }
        tracing::info!(
            basic_fields = delta.basic_info.len(),
            interests = delta.additional_profile.interests.len(),
            skills = delta.additional_profile.skills.len(),
            personality = delta.additional_profile.personality.len(),
            "Extraction complete"
        );

        Ok(Extraction { delta, dropped })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::*;
    use crate::profile::BasicInfoField;
    use crate::testing::StubLlm;

    #[test]
    fn transcript_uses_role_labels() {
        let text = format_transcript(&[
            ChatMessage::user("I like soccer "),
            ChatMessage::assistant("Nice!"),
        ]);
        assert_eq!(text, "User: I like soccer\nAssistant: Nice!");
    }

    #[tokio::test]
    async fn extract_stamps_evidence_and_embeds_transcript() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap();
        let reply = r#"```json
{"basic_info": {"current_city": "Hangzhou"},
 "additional_profile": {"interests": [{"name": "soccer", "degree": 4, "evidence": [{"text": "I like soccer", "timestamp": "2001-01-01"}]}]}}
```"#;
        let stub = Arc::new(StubLlm::new(reply));
        let oracle = ProfileOracle::new(stub.clone());

        let out = oracle
            .extract(&[ChatMessage::user("I like soccer")], now)
            .await
            .unwrap();

        assert!(out.dropped.is_empty());
        assert_eq!(
            out.delta.basic_info.get(BasicInfoField::CurrentCity),
            Some("Hangzhou")
        );
        let soccer = &out.delta.additional_profile.interests[0];
        assert_eq!(soccer.evidence.len(), 1);
        assert_eq!(soccer.evidence[0].timestamp, now);

        let prompt = &stub.requests()[0].messages[0].content;
        assert!(prompt.contains("User: I like soccer"));
        assert!(prompt.contains("2026-10-16T09:00:00Z"));
    }

    #[tokio::test]
    async fn unparseable_reply_fails_the_stage() {
        let oracle = ProfileOracle::new(Arc::new(StubLlm::new("I could not find anything.")));
        let err = oracle
            .extract(&[ChatMessage::user("hi")], Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.stage(), OracleStage::Extract);
    }
}
