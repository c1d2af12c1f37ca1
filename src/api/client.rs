use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{
    ChooseHistoryRequest, DeleteModelRequest, DeletePromptRequest, HistoryIndexPayload,
    MetadataPair, ModelsResponse, QueryRequest, SelectModelRequest,
};
use crate::utils::url::construct_api_url;

/// Raw reply body of `/api/query`, one item per network chunk.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, BackendError>>;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned {status}: {summary}")]
    Status { status: u16, summary: String },

    #[error("response stream interrupted: {0}")]
    Interrupted(String),

    #[error("could not encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("unexpected response from {endpoint}: {detail}")]
    Unexpected {
        endpoint: &'static str,
        detail: String,
    },
}

impl BackendError {
    pub fn status(status: u16, body: &str) -> Self {
        BackendError::Status {
            status,
            summary: summarize_error_body(body),
        }
    }
}

/// A set of files plus one metadata list, submitted as a single multipart request.
#[derive(Debug, Clone, Default)]
pub struct DocumentBatch {
    pub files: Vec<(String, Vec<u8>)>,
    pub metadata: Vec<MetadataPair>,
}

/// Everything the conversation engine needs from the chat backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Open a streamed reply. Resolves once the response head has arrived.
    async fn query(&self, request: &QueryRequest) -> Result<ByteStream, BackendError>;

    async fn list_models(&self) -> Result<ModelsResponse, BackendError>;

    async fn select_model(&self, request: &SelectModelRequest) -> Result<(), BackendError>;

    async fn delete_model(&self, request: &DeleteModelRequest) -> Result<(), BackendError>;

    async fn history_index(&self) -> Result<HistoryIndexPayload, BackendError>;

    /// Rows of one persisted session, header row included when the backend sends one.
    async fn choose_chat_history(
        &self,
        request: &ChooseHistoryRequest,
    ) -> Result<Vec<Value>, BackendError>;

    async fn new_chat(&self) -> Result<(), BackendError>;

    async fn add_documents(&self, batch: DocumentBatch) -> Result<(), BackendError>;

    async fn settings(&self) -> Result<Value, BackendError>;

    /// Replace the backend settings. The backend nulls any field left out.
    async fn update_settings(&self, settings: &Value) -> Result<(), BackendError>;

    async fn prompts(&self) -> Result<Value, BackendError>;

    async fn update_prompts(&self, prompts: &Value) -> Result<(), BackendError>;

    async fn delete_prompt(&self, request: &DeletePromptRequest) -> Result<(), BackendError>;
}

/// [`Backend`] over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> Result<Self, BackendError> {
        // No overall timeout: replies stream for as long as the model generates.
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        construct_api_url(&self.base_url, endpoint)
    }

    async fn checked(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        Err(BackendError::status(status, &body))
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, BackendError> {
        debug!(endpoint, "GET");
        let response = self.client.get(self.url(endpoint)).send().await?;
        Ok(Self::checked(response).await?.json::<T>().await?)
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<reqwest::Response, BackendError> {
        debug!(endpoint, "POST");
        let response = self
            .client
            .post(self.url(endpoint))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;
        Self::checked(response).await
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn query(&self, request: &QueryRequest) -> Result<ByteStream, BackendError> {
        let response = self.post_json("api/query", request).await?;
        let stream = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|err| BackendError::Interrupted(err.to_string()))
        });
        Ok(stream.boxed())
    }

    async fn list_models(&self) -> Result<ModelsResponse, BackendError> {
        self.get_json("api/list_models").await
    }

    async fn select_model(&self, request: &SelectModelRequest) -> Result<(), BackendError> {
        self.post_json("api/select_model", request).await?;
        Ok(())
    }

    async fn delete_model(&self, request: &DeleteModelRequest) -> Result<(), BackendError> {
        self.post_json("api/delete_model", request).await?;
        Ok(())
    }

    async fn history_index(&self) -> Result<HistoryIndexPayload, BackendError> {
        self.get_json("api/history").await
    }

    async fn choose_chat_history(
        &self,
        request: &ChooseHistoryRequest,
    ) -> Result<Vec<Value>, BackendError> {
        let response = self.post_json("api/choose_chat_history", request).await?;
        Ok(response.json::<Vec<Value>>().await?)
    }

    async fn new_chat(&self) -> Result<(), BackendError> {
        debug!(endpoint = "api/new_chat", "GET");
        let response = self.client.get(self.url("api/new_chat")).send().await?;
        Self::checked(response).await?;
        Ok(())
    }

    async fn add_documents(&self, batch: DocumentBatch) -> Result<(), BackendError> {
        let metadata = serde_json::to_string(&batch.metadata)?;

        let mut form = reqwest::multipart::Form::new();
        for (name, bytes) in batch.files {
            form = form.part("files", reqwest::multipart::Part::bytes(bytes).file_name(name));
        }
        form = form.text("metadata", metadata);

        debug!(endpoint = "api/add_new_documents", "POST multipart");
        let response = self
            .client
            .post(self.url("api/add_new_documents"))
            .multipart(form)
            .send()
            .await?;
        Self::checked(response).await?;
        Ok(())
    }

    async fn settings(&self) -> Result<Value, BackendError> {
        self.get_json("api/settings").await
    }

    async fn update_settings(&self, settings: &Value) -> Result<(), BackendError> {
        self.post_json("api/settings", settings).await?;
        Ok(())
    }

    async fn prompts(&self) -> Result<Value, BackendError> {
        self.get_json("api/prompts").await
    }

    async fn update_prompts(&self, prompts: &Value) -> Result<(), BackendError> {
        self.post_json("api/prompts", prompts).await?;
        Ok(())
    }

    async fn delete_prompt(&self, request: &DeletePromptRequest) -> Result<(), BackendError> {
        self.post_json("api/delete_prompt", request).await?;
        Ok(())
    }
}

fn extract_error_summary(value: &Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value
                .get("error")
                .and_then(|v| v.as_str().map(str::to_owned))
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// One-line description of a non-success response body.
pub fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&json_value) {
            if !summary.is_empty() {
                return summary;
            }
        }
    }

    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}
