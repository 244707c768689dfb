use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ProfileOracle;
use super::payload::parse_operations;
use super::prompts::{UPDATE_PROFILE_PROMPT, render};
use crate::error::{LlmError, OracleError, OracleStage};
use crate::profile::BasicInfo;
use crate::profile::identity::MaskedProfile;
use crate::profile::operations::{OperationSet, ProfileDelta};

#[derive(Serialize)]
struct ExistingView<'a> {
    basic_info: &'a BasicInfo,
    additional_profile: &'a MaskedProfile<'a>,
}

impl ProfileOracle {
    /// Ask for per-item operations reconciling `delta` with the stored profile.
    ///
    /// `existing` must be the masked view built for this run; the surrogates in
    /// the returned operations refer to it. New evidence is stamped with `now`.
    pub async fn decide(
        &self,
        delta: &ProfileDelta,
        basic_info: &BasicInfo,
        existing: &MaskedProfile<'_>,
        now: DateTime<Utc>,
    ) -> Result<OperationSet, OracleError> {
        let stage = OracleStage::Decide;
        let encoding_failed = |e| OracleError::Call {
            stage,
            source: LlmError::Json(e),
        };
        let extracted = serde_json::to_string_pretty(delta).map_err(encoding_failed)?;
        let stored = serde_json::to_string_pretty(&ExistingView {
            basic_info,
            additional_profile: existing,
        })
        .map_err(encoding_failed)?;

        let prompt = render(
            UPDATE_PROFILE_PROMPT,
            &[("extracted", extracted.as_str()), ("existing", stored.as_str())],
        );
        let root = self.ask(stage, prompt).await?;
        let ops = parse_operations(&root, now);

        for issue in &ops.rejected {
            tracing::warn!(%stage, %issue, "Rejected oracle operation");
        }
        tracing::info!(
            basic_fields = ops.basic_info.len(),
            trait_ops = ops.traits.values().map(Vec::len).sum::<usize>(),
            graph = ops.social_context.is_some(),
            rejected = ops.rejected.len(),
            "Decision complete"
        );

        Ok(ops)
    }
}
