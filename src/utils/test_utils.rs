//! A scripted in-memory [`Backend`] for controller tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use futures_util::stream;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::api::{
    Backend, BackendError, ByteStream, ChooseHistoryRequest, DeleteModelRequest,
    DeletePromptRequest, DocumentBatch, HistoryIndexPayload, ModelKind, ModelsResponse,
    QueryRequest, SelectModelRequest,
};

/// A request the fake received, in arrival order.
#[derive(Debug, Clone)]
pub enum Call {
    Query(QueryRequest),
    ListModels,
    SelectModel(SelectModelRequest),
    DeleteModel(DeleteModelRequest),
    HistoryIndex,
    ChooseHistory(String),
    NewChat,
    AddDocuments(DocumentBatch),
    Settings,
    UpdateSettings(Value),
    Prompts,
    UpdatePrompts(Value),
    DeletePrompt(DeletePromptRequest),
}

/// Sending half of a scripted reply stream. Dropping it ends the stream.
pub struct StreamFeed {
    tx: mpsc::UnboundedSender<Result<Vec<u8>, BackendError>>,
}

impl StreamFeed {
    pub fn send(&self, chunk: impl AsRef<[u8]>) {
        let _ = self.tx.send(Ok(chunk.as_ref().to_vec()));
    }

    pub fn fail(self, reason: &str) {
        let _ = self.tx.send(Err(BackendError::Interrupted(reason.to_string())));
    }
}

enum ScriptedQuery {
    Stream(ByteStream),
    Refuse(BackendError),
}

pub struct FakeBackend {
    calls: Mutex<Vec<Call>>,
    queries: Mutex<VecDeque<ScriptedQuery>>,
    sessions: Mutex<HashMap<String, Vec<Value>>>,
    history: Mutex<Option<HistoryIndexPayload>>,
    models: Mutex<ModelsResponse>,
    fail_uploads: AtomicBool,
    settings: Mutex<Value>,
    prompts: Mutex<Value>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            queries: Mutex::new(VecDeque::new()),
            sessions: Mutex::new(HashMap::new()),
            history: Mutex::new(Some(HistoryIndexPayload::Flat(Vec::new()))),
            models: Mutex::new(ModelsResponse::Split {
                llm: vec!["llama3".into(), "mistral".into()],
                embed: vec!["nomic-embed-text".into()],
                selected_model: Some("llama3".into()),
                selected_embed_model: Some("nomic-embed-text".into()),
            }),
            fail_uploads: AtomicBool::new(false),
            settings: Mutex::new(json!({})),
            prompts: Mutex::new(json!({
                "prompts": {
                    "LLM": {
                        "prompts": [{ "label": "default_prompt", "value": "" }],
                        "default": { "label": "default_prompt", "value": "" }
                    },
                    "Chat Engine": {
                        "prompts": [{ "label": "default_prompt", "value": "Context: {context_str}" }],
                        "default": { "label": "default_prompt", "value": "Context: {context_str}" }
                    }
                },
                "selectedLLMPrompt": { "label": "default_prompt", "value": "" },
                "selectedChatEnginePrompt": { "label": "default_prompt", "value": "Context: {context_str}" }
            })),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        lock(&self.calls).iter().filter(|call| matches(call)).count()
    }

    /// Queue a reply whose chunks the test pushes through the returned feed.
    pub fn script_reply(&self) -> StreamFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        let body = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed();
        lock(&self.queries).push_back(ScriptedQuery::Stream(body));
        StreamFeed { tx }
    }

    /// Queue a reply that arrives whole.
    pub fn script_complete_reply(&self, chunks: &[&str]) {
        let items: Vec<Result<Vec<u8>, BackendError>> = chunks
            .iter()
            .map(|chunk| Ok(chunk.as_bytes().to_vec()))
            .collect();
        lock(&self.queries).push_back(ScriptedQuery::Stream(stream::iter(items).boxed()));
    }

    /// Queue a query that fails before any reply body.
    pub fn script_refusal(&self, error: BackendError) {
        lock(&self.queries).push_back(ScriptedQuery::Refuse(error));
    }

    pub fn add_session(&self, handle: &str, rows: Vec<Value>) {
        lock(&self.sessions).insert(handle.to_string(), rows);
    }

    pub fn set_history(&self, payload: Option<HistoryIndexPayload>) {
        *lock(&self.history) = payload;
    }

    pub fn set_models(&self, response: ModelsResponse) {
        *lock(&self.models) = response;
    }

    pub fn set_settings(&self, settings: Value) {
        *lock(&self.settings) = settings;
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: Call) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn query(&self, request: &QueryRequest) -> Result<ByteStream, BackendError> {
        self.record(Call::Query(request.clone()));
        match lock(&self.queries).pop_front() {
            Some(ScriptedQuery::Stream(body)) => Ok(body),
            Some(ScriptedQuery::Refuse(error)) => Err(error),
            None => Ok(stream::empty().boxed()),
        }
    }

    async fn list_models(&self) -> Result<ModelsResponse, BackendError> {
        self.record(Call::ListModels);
        Ok(lock(&self.models).clone())
    }

    async fn select_model(&self, request: &SelectModelRequest) -> Result<(), BackendError> {
        self.record(Call::SelectModel(request.clone()));
        let mut models = lock(&self.models);
        if let ModelsResponse::Split {
            llm,
            embed,
            selected_model,
            selected_embed_model,
        } = &mut *models
        {
            let (registry, selected) = match request.kind.unwrap_or(ModelKind::Llm) {
                ModelKind::Llm => (llm, selected_model),
                ModelKind::Embed => (embed, selected_embed_model),
            };
            if !registry.contains(&request.model) {
                registry.push(request.model.clone());
            }
            *selected = Some(request.model.clone());
        }
        Ok(())
    }

    async fn delete_model(&self, request: &DeleteModelRequest) -> Result<(), BackendError> {
        self.record(Call::DeleteModel(request.clone()));
        if let ModelsResponse::Split { llm, embed, .. } = &mut *lock(&self.models) {
            llm.retain(|name| name != &request.model);
            embed.retain(|name| name != &request.model);
        }
        Ok(())
    }

    async fn history_index(&self) -> Result<HistoryIndexPayload, BackendError> {
        self.record(Call::HistoryIndex);
        lock(&self.history)
            .clone()
            .ok_or_else(|| BackendError::status(500, r#"{"error":"history unavailable"}"#))
    }

    async fn choose_chat_history(
        &self,
        request: &ChooseHistoryRequest,
    ) -> Result<Vec<Value>, BackendError> {
        self.record(Call::ChooseHistory(request.filename.clone()));
        lock(&self.sessions)
            .get(&request.filename)
            .cloned()
            .ok_or_else(|| BackendError::status(404, r#"{"error":"Session not found"}"#))
    }

    async fn new_chat(&self) -> Result<(), BackendError> {
        self.record(Call::NewChat);
        Ok(())
    }

    async fn add_documents(&self, batch: DocumentBatch) -> Result<(), BackendError> {
        self.record(Call::AddDocuments(batch));
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(BackendError::status(500, r#"{"error":"indexing failed"}"#));
        }
        Ok(())
    }

    async fn settings(&self) -> Result<Value, BackendError> {
        self.record(Call::Settings);
        Ok(lock(&self.settings).clone())
    }

    async fn update_settings(&self, settings: &Value) -> Result<(), BackendError> {
        self.record(Call::UpdateSettings(settings.clone()));
        *lock(&self.settings) = settings.clone();
        Ok(())
    }

    async fn prompts(&self) -> Result<Value, BackendError> {
        self.record(Call::Prompts);
        Ok(lock(&self.prompts).clone())
    }

    async fn update_prompts(&self, prompts: &Value) -> Result<(), BackendError> {
        self.record(Call::UpdatePrompts(prompts.clone()));
        Ok(())
    }

    async fn delete_prompt(&self, request: &DeletePromptRequest) -> Result<(), BackendError> {
        self.record(Call::DeletePrompt(request.clone()));
        Ok(())
    }
}
