//! Persistence of "which session is active" across restarts.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::error::PointerError;

pub trait SessionPointerStore: Send + Sync {
    fn load(&self) -> Option<String>;

    fn store(&self, handle: &str) -> Result<(), PointerError>;

    fn clear(&self) -> Result<(), PointerError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    active_session: Option<String>,
}

/// Keeps the pointer in a small TOML file.
pub struct FileSessionPointer {
    path: PathBuf,
}

impl FileSessionPointer {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `state.toml` in the platform data directory, if one can be determined.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "tok", "tok").map(|dirs| dirs.data_dir().join("state.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_err(&self, source: std::io::Error) -> PointerError {
        PointerError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl SessionPointerStore for FileSessionPointer {
    fn load(&self) -> Option<String> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "could not read session state");
                return None;
            }
        };

        match toml::from_str::<StateFile>(&contents) {
            Ok(state) => state.active_session.filter(|handle| !handle.is_empty()),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "ignoring unreadable session state");
                None
            }
        }
    }

    fn store(&self, handle: &str) -> Result<(), PointerError> {
        let parent = self.path.parent().filter(|dir| !dir.as_os_str().is_empty());
        if let Some(dir) = parent {
            fs::create_dir_all(dir).map_err(|err| self.write_err(err))?;
        }

        let contents = toml::to_string_pretty(&StateFile {
            active_session: Some(handle.to_string()),
        })?;

        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
        .map_err(|err| self.write_err(err))?;

        temp_file
            .write_all(contents.as_bytes())
            .map_err(|err| self.write_err(err))?;
        temp_file
            .as_file_mut()
            .sync_all()
            .map_err(|err| self.write_err(err))?;
        temp_file
            .persist(&self.path)
            .map_err(|err| self.write_err(err.error))?;
        Ok(())
    }

    fn clear(&self) -> Result<(), PointerError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.write_err(err)),
        }
    }
}

/// Process-local pointer, forgotten on exit.
#[derive(Debug, Default)]
pub struct MemorySessionPointer {
    handle: Mutex<Option<String>>,
}

impl MemorySessionPointer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handle(handle: impl Into<String>) -> Self {
        Self {
            handle: Mutex::new(Some(handle.into())),
        }
    }
}

impl SessionPointerStore for MemorySessionPointer {
    fn load(&self) -> Option<String> {
        self.handle
            .lock()
            .map(|handle| handle.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn store(&self, handle: &str) -> Result<(), PointerError> {
        let mut slot = self.handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(handle.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), PointerError> {
        let mut slot = self.handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = None;
        Ok(())
    }
}
