use std::path::PathBuf;

use crate::api::BackendError;

use super::activity::Activity;

/// Why a submission did not produce a complete reply.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("nothing to send")]
    EmptyQuery,

    #[error("cannot send while {0}")]
    Busy(Activity),

    /// The reply stream could not be opened. The user turn stays in the transcript.
    #[error("could not reach the chat backend: {0}")]
    Connection(#[source] BackendError),

    /// The stream broke after it started. `partial` is what was shown so far.
    #[error("reply interrupted after {} bytes: {source}", .partial.len())]
    Interrupted {
        #[source]
        source: BackendError,
        partial: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SessionLoadError {
    #[error("could not load session history: {0}")]
    Fetch(#[from] BackendError),

    #[error("session row {index} is not a query/response pair: {detail}")]
    Malformed { index: usize, detail: String },
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("no files selected")]
    NoFiles,

    #[error("an upload is already in progress")]
    AlreadyUploading,

    #[error("could not read {}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upload rejected: {0}")]
    Backend(#[from] BackendError),
}

/// Failure to read or change backend settings and prompts.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("unknown setting '{key}' (known: {})", .known.join(", "))]
    UnknownKey { key: String, known: Vec<String> },

    #[error("no {kind} prompt labelled '{label}'")]
    NoSuchPrompt { kind: &'static str, label: String },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Failure to persist or clear the active-session pointer.
#[derive(Debug, thiserror::Error)]
pub enum PointerError {
    #[error("could not write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not encode session state: {0}")]
    Encode(#[from] toml::ser::Error),
}
