//! The conversation state engine.
//!
//! [`ChatController`] owns the transcript, the busy gate, the upload flag,
//! the active-session pointer and the cached catalogs. Views subscribe to
//! the watch channels it exposes and never mutate state themselves.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::activity::{Activity, ActivityGate};
use super::chat_stream::{ingest, StreamTarget};
use super::error::{SendError, SessionLoadError, SettingsError, UploadError};
use super::message::Message;
use super::models::{ModelCatalog, ModelTarget};
use super::session::{HistoryLayout, SessionRecords, SessionSummary};
use super::session_pointer::SessionPointerStore;
use super::settings::{with_setting, PromptBook};
use super::store::{MessageStore, Transcript};
use super::upload::{build_batch, UploadFile, UploadFlag};
use crate::api::history::{normalize_history_index, HistoryEntry};
use crate::api::{
    Backend, BackendError, ChooseHistoryRequest, DeleteModelRequest, DeletePromptRequest,
    MetadataPair, Prompt, PromptKind, QueryRequest,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerOptions {
    pub history_layout: HistoryLayout,
}

/// A finished reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Id of the bot message that received the text.
    pub id: u64,
    pub text: String,
    /// The transcript was replaced before the reply finished, so the text was
    /// not (fully) written to it.
    pub detached: bool,
}

pub struct ChatController {
    backend: Arc<dyn Backend>,
    pointer: Arc<dyn SessionPointerStore>,
    options: ControllerOptions,
    store: MessageStore,
    gate: ActivityGate,
    uploads: UploadFlag,
    active_session: watch::Sender<Option<String>>,
    history: watch::Sender<Vec<HistoryEntry>>,
    models: watch::Sender<ModelCatalog>,
}

impl ChatController {
    pub fn new(
        backend: Arc<dyn Backend>,
        pointer: Arc<dyn SessionPointerStore>,
        options: ControllerOptions,
    ) -> Self {
        Self {
            backend,
            pointer,
            options,
            store: MessageStore::new(),
            gate: ActivityGate::new(),
            uploads: UploadFlag::new(),
            active_session: watch::channel(None).0,
            history: watch::channel(Vec::new()).0,
            models: watch::channel(ModelCatalog::default()).0,
        }
    }

    pub fn options(&self) -> ControllerOptions {
        self.options
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn messages(&self) -> Vec<Message> {
        self.store.messages()
    }

    pub fn subscribe_transcript(&self) -> watch::Receiver<Transcript> {
        self.store.subscribe()
    }

    pub fn activity(&self) -> Activity {
        self.gate.current()
    }

    pub fn is_sending(&self) -> bool {
        self.gate.current() == Activity::Sending
    }

    pub fn subscribe_activity(&self) -> watch::Receiver<Activity> {
        self.gate.subscribe()
    }

    pub fn is_uploading(&self) -> bool {
        self.uploads.is_uploading()
    }

    pub fn subscribe_uploading(&self) -> watch::Receiver<bool> {
        self.uploads.subscribe()
    }

    pub fn active_session(&self) -> Option<String> {
        self.active_session.borrow().clone()
    }

    pub fn subscribe_active_session(&self) -> watch::Receiver<Option<String>> {
        self.active_session.subscribe()
    }

    /// Catalog from the most recent successful history fetch.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.borrow().clone()
    }

    pub fn subscribe_history(&self) -> watch::Receiver<Vec<HistoryEntry>> {
        self.history.subscribe()
    }

    /// Catalog from the most recent successful model listing.
    pub fn models(&self) -> ModelCatalog {
        self.models.borrow().clone()
    }

    pub fn subscribe_models(&self) -> watch::Receiver<ModelCatalog> {
        self.models.subscribe()
    }

    /// Send `query` and stream the answer into the transcript.
    ///
    /// The user turn is appended immediately and kept even if the backend
    /// cannot be reached. The bot placeholder gets id `len + 2`, where `len`
    /// is the transcript length before this call.
    pub async fn submit(&self, query: &str, use_query_engine: bool) -> Result<Reply, SendError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SendError::EmptyQuery);
        }

        let _sending = match self.gate.try_begin(Activity::Sending) {
            Some(guard) => guard,
            None => return Err(SendError::Busy(self.gate.current())),
        };

        let base_len = self.store.len() as u64;
        let generation = self.store.generation();
        let user_id = base_len + 1;
        let bot_id = base_len + 2;
        self.store.append(Message::user(user_id, query));

        let request = QueryRequest {
            query: query.to_string(),
            use_query_engine,
        };
        debug!(user_id, use_query_engine, "opening reply stream");
        let stream = match self.backend.query(&request).await {
            Ok(stream) => stream,
            Err(err) => {
                warn!(endpoint = "api/query", %err, "query failed");
                return Err(SendError::Connection(err));
            }
        };

        self.store.append_in(generation, Message::placeholder(bot_id));
        let target = StreamTarget {
            generation,
            message_id: bot_id,
        };
        let report = ingest(&self.store, target, stream).await;

        if let Some(err) = report.error {
            warn!(endpoint = "api/query", %err, received = report.text.len(), "reply interrupted");
            return Err(SendError::Interrupted {
                source: err,
                partial: report.text,
            });
        }
        if report.detached {
            info!(bot_id, "reply finished after the transcript was replaced");
        }

        Ok(Reply {
            id: bot_id,
            text: report.text,
            detached: report.detached,
        })
    }

    /// Fetch and publish the session catalog. The transcript is not touched.
    pub async fn load_history_index(&self) -> Result<Vec<HistoryEntry>, SessionLoadError> {
        let payload = self.backend.history_index().await.map_err(|err| {
            warn!(endpoint = "api/history", %err, "could not load session catalog");
            SessionLoadError::Fetch(err)
        })?;
        let entries = normalize_history_index(payload);
        debug!(sessions = entries.len(), "session catalog loaded");
        self.history.send_replace(entries.clone());
        Ok(entries)
    }

    /// Load a persisted session into the transcript and make it active.
    ///
    /// On failure the transcript and the active pointer are unchanged.
    pub async fn select_session(&self, handle: &str) -> Result<SessionSummary, SessionLoadError> {
        let request = ChooseHistoryRequest {
            filename: handle.to_string(),
        };
        let rows = self
            .backend
            .choose_chat_history(&request)
            .await
            .map_err(|err| {
                warn!(endpoint = "api/choose_chat_history", handle, %err, "could not load session");
                SessionLoadError::Fetch(err)
            })?;

        let records = SessionRecords::from_rows(rows, self.options.history_layout).map_err(|err| {
            warn!(handle, %err, "session payload rejected");
            err
        })?;

        self.store.replace_all(records.to_messages());
        self.active_session.send_replace(Some(handle.to_string()));
        if let Err(err) = self.pointer.store(handle) {
            warn!(handle, %err, "could not persist active session");
        }

        info!(handle, exchanges = records.exchanges.len(), "session loaded");
        Ok(SessionSummary {
            handle: handle.to_string(),
            title: records.title().map(str::to_string),
            exchanges: records.exchanges.len(),
        })
    }

    /// Reload the session that was active when the process last ran, if any.
    pub async fn restore_on_startup(&self) -> Result<Option<SessionSummary>, SessionLoadError> {
        let Some(handle) = self.pointer.load() else {
            return Ok(None);
        };
        debug!(%handle, "restoring active session");
        self.select_session(&handle).await.map(Some)
    }

    /// Clear the transcript and the active session, then tell the backend.
    ///
    /// Local state is cleared before the backend is contacted; backend
    /// failures are logged only.
    pub async fn start_new_session(&self) {
        self.store.clear();
        self.active_session.send_replace(None);
        if let Err(err) = self.pointer.clear() {
            warn!(%err, "could not clear persisted active session");
        }

        if let Err(err) = self.backend.new_chat().await {
            warn!(endpoint = "api/new_chat", %err, "backend did not acknowledge new chat");
        }
        // Already logged; the catalog just stays as it was.
        let _ = self.load_history_index().await;
    }

    /// Fetch and publish the model catalog.
    pub async fn refresh_models(&self) -> Result<ModelCatalog, BackendError> {
        let catalog = ModelCatalog::from(self.backend.list_models().await.map_err(|err| {
            warn!(endpoint = "api/list_models", %err, "could not list models");
            err
        })?);
        self.models.send_replace(catalog.clone());
        Ok(catalog)
    }

    /// Change the chat or embedding model.
    ///
    /// Waits for an in-flight reply to finish first. The catalog is refreshed
    /// whether or not the change succeeded; failures are logged, not returned.
    pub async fn switch_model(&self, target: ModelTarget) {
        let _switching = self.gate.begin_when_idle(Activity::SwitchingModel).await;
        info!(model = %target.name, kind = target.kind.as_str(), "switching model");

        if let Err(err) = self.backend.select_model(&target.to_request()).await {
            warn!(endpoint = "api/select_model", model = %target.name, %err, "model switch failed");
        }
        let _ = self.refresh_models().await;
    }

    /// Remove a model from the backend registry, with the same waiting and
    /// refresh behaviour as [`ChatController::switch_model`].
    pub async fn delete_model(&self, name: &str) {
        let _switching = self.gate.begin_when_idle(Activity::SwitchingModel).await;
        let request = DeleteModelRequest {
            model: name.to_string(),
        };
        if let Err(err) = self.backend.delete_model(&request).await {
            warn!(endpoint = "api/delete_model", model = name, %err, "model delete failed");
        }
        let _ = self.refresh_models().await;
    }

    /// Send documents and metadata to the backend index in one request.
    pub async fn upload_documents(
        &self,
        files: Vec<UploadFile>,
        metadata: Vec<MetadataPair>,
    ) -> Result<(), UploadError> {
        if files.is_empty() {
            return Err(UploadError::NoFiles);
        }
        let _uploading = self.uploads.try_begin().ok_or(UploadError::AlreadyUploading)?;

        let count = files.len();
        let result = self.backend.add_documents(build_batch(files, metadata)).await;
        match result {
            Ok(()) => {
                info!(files = count, "documents uploaded");
                Ok(())
            }
            Err(err) => {
                warn!(endpoint = "api/add_new_documents", %err, "upload failed");
                Err(UploadError::Backend(err))
            }
        }
    }

    pub async fn settings(&self) -> Result<Value, BackendError> {
        self.backend.settings().await
    }

    /// Change one backend setting, keeping the others as the backend has them.
    pub async fn update_setting(&self, key: &str, value: Value) -> Result<Value, SettingsError> {
        let current = self.backend.settings().await?;
        let updated = with_setting(current, key, value)?;
        self.backend
            .update_settings(&updated)
            .await
            .map_err(|err| {
                warn!(endpoint = "api/settings", setting = key, %err, "settings update failed");
                err
            })?;
        info!(setting = key, "backend setting updated");
        Ok(updated)
    }

    pub async fn prompts(&self) -> Result<Value, BackendError> {
        self.backend.prompts().await
    }

    pub async fn prompt_book(&self) -> Result<PromptBook, BackendError> {
        PromptBook::from_listing(&self.backend.prompts().await?)
    }

    /// Add a prompt or replace the one with the same label, optionally making it active.
    pub async fn save_prompt(
        &self,
        kind: PromptKind,
        prompt: Prompt,
        activate: bool,
    ) -> Result<(), SettingsError> {
        let mut book = self.prompt_book().await?;
        let label = prompt.label.clone();
        book.upsert(kind, prompt);
        if activate {
            book.select(kind, &label)?;
        }
        self.push_prompts(&book).await
    }

    /// Make an existing prompt the active one of its family.
    pub async fn select_prompt(&self, kind: PromptKind, label: &str) -> Result<(), SettingsError> {
        let mut book = self.prompt_book().await?;
        book.select(kind, label)?;
        self.push_prompts(&book).await
    }

    pub async fn delete_prompt(&self, kind: PromptKind, label: &str) -> Result<(), SettingsError> {
        let book = self.prompt_book().await?;
        if !book.contains(kind, label) {
            return Err(SettingsError::NoSuchPrompt {
                kind: kind.as_str(),
                label: label.to_string(),
            });
        }
        let request = DeletePromptRequest {
            kind,
            label: label.to_string(),
        };
        self.backend.delete_prompt(&request).await.map_err(|err| {
            warn!(endpoint = "api/delete_prompt", label, %err, "prompt delete failed");
            err
        })?;
        Ok(())
    }

    async fn push_prompts(&self, book: &PromptBook) -> Result<(), SettingsError> {
        self.backend
            .update_prompts(&book.to_update())
            .await
            .map_err(|err| {
                warn!(endpoint = "api/prompts", %err, "prompt update failed");
                err
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
