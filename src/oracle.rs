//! The language-model oracle.
//!
//! Two stages talk to the model: [`ProfileOracle::extract`] turns a transcript
//! into a [`ProfileDelta`](crate::profile::operations::ProfileDelta), and
//! [`ProfileOracle::decide`] turns that delta plus the surrogate-masked
//! existing profile into an [`OperationSet`](crate::profile::operations::OperationSet).
//! Each stage is a single prompt, a single reply, and one JSON object parsed
//! out of it. Nothing is retried.

mod decider;
mod extractor;
mod json;
pub mod payload;
pub mod prompts;

use std::sync::Arc;

use serde_json::{Map, Value};

pub use extractor::{Extraction, format_transcript};
pub use json::{json_payload, parse_object};

use crate::error::{OracleError, OracleStage};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use json::PayloadError;

/// Default sampling temperature. Bookkeeping wants determinism.
pub const DEFAULT_TEMPERATURE: f32 = 0.0;

/// Handle to the model used by both pipeline stages.
#[derive(Clone)]
pub struct ProfileOracle {
    llm: Arc<dyn LlmProvider>,
    temperature: f32,
}

impl std::fmt::Debug for ProfileOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileOracle")
            .field("model", &self.llm.model_name())
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl ProfileOracle {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Send one prompt and parse the reply as a JSON object.
    async fn ask(&self, stage: OracleStage, prompt: String) -> Result<Map<String, Value>, OracleError> {
        let request = CompletionRequest::new(vec![ChatMessage::user(prompt)])
            .with_temperature(self.temperature)
            .with_json_object();

        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|source| OracleError::Call { stage, source })?;

        tracing::debug!(
            %stage,
            model = %self.llm.model_name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Oracle replied"
        );

        parse_object(&response.content).map_err(|e| match e {
            PayloadError::Syntax(reason) => OracleError::Unparseable { stage, reason },
            PayloadError::NotAnObject(found) => OracleError::Shape {
                stage,
                reason: format!("expected a JSON object, got {found}"),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubLlm;

    #[tokio::test]
    async fn ask_parses_fenced_object() {
        let stub = Arc::new(StubLlm::new("Sure!\n```json\n{\"basic_info\": {}}\n```"));
        let oracle = ProfileOracle::new(stub.clone());
        let map = oracle
            .ask(OracleStage::Extract, "prompt".into())
            .await
            .unwrap();
        assert!(map.contains_key("basic_info"));
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn ask_maps_failures_to_stage_errors() {
        let oracle = ProfileOracle::new(Arc::new(StubLlm::new("no json here")));
        let err = oracle.ask(OracleStage::Decide, "p".into()).await.unwrap_err();
        assert!(matches!(err, OracleError::Unparseable { stage: OracleStage::Decide, .. }));

        let oracle = ProfileOracle::new(Arc::new(StubLlm::new("[1, 2]")));
        let err = oracle.ask(OracleStage::Extract, "p".into()).await.unwrap_err();
        assert!(matches!(err, OracleError::Shape { .. }));

        let oracle = ProfileOracle::new(Arc::new(StubLlm::failing()));
        let err = oracle.ask(OracleStage::Extract, "p".into()).await.unwrap_err();
        assert!(matches!(err, OracleError::Call { stage: OracleStage::Extract, .. }));
    }

    #[tokio::test]
    async fn ask_sends_single_user_message_at_configured_temperature() {
        let stub = Arc::new(StubLlm::new("{}"));
        let oracle = ProfileOracle::new(stub.clone()).with_temperature(0.3);
        oracle.ask(OracleStage::Extract, "hello".into()).await.unwrap();

        let requests = stub.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages.len(), 1);
        assert_eq!(requests[0].messages[0].content, "hello");
        assert_eq!(requests[0].temperature, Some(0.3));
        assert!(requests[0].json_object);
    }
}
