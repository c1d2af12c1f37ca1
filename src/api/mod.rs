//! Request and response payloads exchanged with the chat backend.
//!
//! Field names follow the backend's JSON exactly (`useQueryEngine`,
//! `selectedModel`, ...); Rust-side names stay snake_case.

pub mod client;
pub mod history;

pub use client::{Backend, BackendError, ByteStream, DocumentBatch, HttpBackend};

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(rename = "useQueryEngine")]
    pub use_query_engine: bool,
}

/// Which registry a model belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Llm,
    Embed,
}

impl ModelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Llm => "llm",
            ModelKind::Embed => "embed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectModelRequest {
    pub model: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ModelKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteModelRequest {
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChooseHistoryRequest {
    pub filename: String,
}

/// One of the two prompt families the backend keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PromptKind {
    /// Plain model prompts.
    #[serde(rename = "LLM")]
    Llm,
    /// Context prompts for the retrieval chat engine.
    #[serde(rename = "Chat")]
    Chat,
}

impl PromptKind {
    /// Key of this family in the `/api/prompts` listing.
    pub fn listing_key(self) -> &'static str {
        match self {
            PromptKind::Llm => "LLM",
            PromptKind::Chat => "Chat Engine",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PromptKind::Llm => "llm",
            PromptKind::Chat => "chat",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub label: String,
    pub value: String,
}

impl Prompt {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletePromptRequest {
    #[serde(rename = "type")]
    pub kind: PromptKind,
    pub label: String,
}

/// `/api/list_models` in either of the shapes the backend has shipped.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ModelsResponse {
    Split {
        llm: Vec<String>,
        embed: Vec<String>,
        #[serde(rename = "selectedModel", default)]
        selected_model: Option<String>,
        #[serde(rename = "selectedEmbedModel", default)]
        selected_embed_model: Option<String>,
    },
    Legacy {
        models: Vec<String>,
        #[serde(rename = "selectedModel", default)]
        selected_model: Option<String>,
    },
}

/// Raw `/api/history` payload. Normalised by [`history::normalize_history_index`]
/// before anything else sees it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum HistoryIndexPayload {
    /// Items are decoded one at a time; unrecognised ones are skipped.
    Flat(Vec<Value>),
    Bucketed(serde_json::Map<String, Value>),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FlatHistoryItem {
    /// `[title, handle]`; a `null` title falls back to the handle.
    Pair(Option<String>, String),
    Handle(String),
}

/// One `{ key, value }` metadata row attached to an upload batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataPair {
    pub key: String,
    pub value: String,
}

impl MetadataPair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Whether every top-level backend setting has been filled in.
///
/// The backend reports unset settings as `null`; chatting before they are
/// configured produces server-side errors.
pub fn settings_complete(settings: &Value) -> bool {
    match settings {
        Value::Object(map) => map.values().all(|value| !value.is_null()),
        _ => false,
    }
}
