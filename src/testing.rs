//! Test doubles: a scripted LLM and in-memory stores.
//!
//! Used by unit tests and the integration tests under `tests/`; nothing here
//! talks to a network or a database.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::db::{BasicInfoStore, ProfileDocumentStore};
use crate::error::{DatabaseError, LlmError};
use crate::llm::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
use crate::profile::{AdditionalProfile, BasicInfo, FieldValue, ProfileField};

/// LLM stub replying from a script.
///
/// Replies are consumed in order; the last one repeats once the script runs
/// out. Every request is recorded.
#[derive(Debug)]
pub struct StubLlm {
    replies: Mutex<VecDeque<String>>,
    last: Mutex<String>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
    failing: bool,
}

impl StubLlm {
    /// Always reply with `reply`.
    pub fn new(reply: impl Into<String>) -> Self {
        Self::scripted([reply.into()])
    }

    /// Reply with each entry in turn.
    pub fn scripted<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let replies: VecDeque<String> = replies.into_iter().map(Into::into).collect();
        let last = replies.back().cloned().unwrap_or_default();
        Self {
            replies: Mutex::new(replies),
            last: Mutex::new(last),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            failing: false,
        }
    }

    /// Fail every call with a request error.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new("")
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Default for StubLlm {
    fn default() -> Self {
        Self::new("{}")
    }
}

#[async_trait]
impl LlmProvider for StubLlm {
    fn model_name(&self) -> &str {
        "stub-model"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        if self.failing {
            return Err(LlmError::RequestFailed {
                provider: "stub".to_string(),
                reason: "scripted failure".to_string(),
            });
        }

        let content = {
            let mut replies = self.replies.lock().map_err(|_| poisoned())?;
            let mut last = self.last.lock().map_err(|_| poisoned())?;
            match replies.pop_front() {
                Some(reply) => {
                    *last = reply.clone();
                    reply
                }
                None => last.clone(),
            }
        };

        Ok(CompletionResponse {
            content,
            input_tokens: 0,
            output_tokens: 0,
            finish_reason: FinishReason::Stop,
        })
    }
}

fn poisoned() -> LlmError {
    LlmError::RequestFailed {
        provider: "stub".to_string(),
        reason: "lock poisoned".to_string(),
    }
}

fn injected(op: &str) -> DatabaseError {
    DatabaseError::Query(format!("injected failure: {op}"))
}

fn lock_error() -> DatabaseError {
    DatabaseError::Query("lock poisoned".to_string())
}

/// In-memory [`BasicInfoStore`].
#[derive(Debug, Default)]
pub struct MemoryBasicInfoStore {
    rows: Mutex<HashMap<String, BasicInfo>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryBasicInfoStore {
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BasicInfoStore for MemoryBasicInfoStore {
    async fn ensure_schema(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn get_basic_info(&self, user_id: &str) -> Result<Option<BasicInfo>, DatabaseError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected("get_basic_info"));
        }
        Ok(self.rows.lock().map_err(|_| lock_error())?.get(user_id).cloned())
    }

    async fn upsert_basic_info(
        &self,
        user_id: &str,
        info: &BasicInfo,
    ) -> Result<bool, DatabaseError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected("upsert_basic_info"));
        }
        if info.is_empty() {
            return Ok(false);
        }
        self.rows
            .lock()
            .map_err(|_| lock_error())?
            .entry(user_id.to_string())
            .or_default()
            .merge_from(info);
        Ok(true)
    }

    async fn delete_basic_info(&self, user_id: &str) -> Result<bool, DatabaseError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected("delete_basic_info"));
        }
        Ok(self.rows.lock().map_err(|_| lock_error())?.remove(user_id).is_some())
    }
}

/// In-memory [`ProfileDocumentStore`] with per-field failure injection.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<HashMap<String, HashMap<ProfileField, FieldValue>>>,
    failing_fields: Mutex<Vec<ProfileField>>,
    fail_reads: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryDocumentStore {
    /// Make writes of `field` fail.
    pub fn fail_field(&self, field: ProfileField) {
        if let Ok(mut failing) = self.failing_fields.lock() {
            failing.push(field);
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Seed a document directly, bypassing failure injection.
    pub fn insert(&self, user_id: &str, document: &AdditionalProfile) {
        if let Ok(mut docs) = self.docs.lock() {
            let entry = docs.entry(user_id.to_string()).or_default();
            for value in document.field_values() {
                entry.insert(value.field(), value);
            }
        }
    }

    fn field_fails(&self, field: ProfileField) -> bool {
        self.failing_fields
            .lock()
            .map(|f| f.contains(&field))
            .unwrap_or(false)
    }
}

#[async_trait]
impl ProfileDocumentStore for MemoryDocumentStore {
    async fn ensure_schema(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn get_document(
        &self,
        user_id: &str,
        fields: Option<&[ProfileField]>,
    ) -> Result<Option<AdditionalProfile>, DatabaseError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected("get_document"));
        }
        let docs = self.docs.lock().map_err(|_| lock_error())?;
        let Some(stored) = docs.get(user_id).filter(|d| !d.is_empty()) else {
            return Ok(None);
        };
        let mut document = AdditionalProfile::default();
        for (field, value) in stored {
            if fields.is_none_or(|wanted| wanted.contains(field)) {
                document.set_field(value.clone());
            }
        }
        Ok(Some(document))
    }

    async fn put_field(&self, user_id: &str, value: &FieldValue) -> Result<(), DatabaseError> {
        if self.field_fails(value.field()) {
            return Err(injected(value.field().as_str()));
        }
        self.docs
            .lock()
            .map_err(|_| lock_error())?
            .entry(user_id.to_string())
            .or_default()
            .insert(value.field(), value.clone());
        Ok(())
    }

    async fn upsert_document(
        &self,
        user_id: &str,
        document: &AdditionalProfile,
    ) -> Result<(), DatabaseError> {
        let values = document.field_values();
        if let Some(value) = values.iter().find(|v| self.field_fails(v.field())) {
            return Err(injected(value.field().as_str()));
        }
        self.docs.lock().map_err(|_| lock_error())?.insert(
            user_id.to_string(),
            values.into_iter().map(|v| (v.field(), v)).collect(),
        );
        Ok(())
    }

    async fn delete_document(&self, user_id: &str) -> Result<bool, DatabaseError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(injected("delete_document"));
        }
        Ok(self.docs.lock().map_err(|_| lock_error())?.remove(user_id).is_some())
    }
}
