// # File State Store
//
// File-based implementation of StateStore.
//
// ## Purpose
//
// Keeps the session record across restarts and crashes, so a restarted
// keeper neither re-notifies an IP the remote already accepted nor forgets
// an active rate-limit window or a rejected credential.
//
// ## Crash Safety
//
// - Atomic writes: the record is written to a temporary file, synced, then
//   renamed over the real one. A torn write is never read back.
// - Forgiving reads: a missing file, invalid JSON, or a record whose field
//   set differs from the schema all load as the template.
// - Permission failures are fatal: silently starting from the template
//   would forget a rejected credential.
//
// ## File Format
//
// ```json
// {
//   "last_updated_ip": "1.2.3.4",
//   "last_successful_update": 1736424000,
//   "last_credential": "...",
//   "credential_invalid": false
// }
// ```

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::traits::state_store::{SessionState, StateStore};
use crate::{Error, FatalReason};

/// File-based state store
///
/// # Example
///
/// ```rust,no_run
/// use seedbox_core::state::FileStateStore;
/// use seedbox_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/data/mamapi.json").await?;
///
///     let mut state = store.load().await?;
///     state.last_updated_ip = "1.2.3.4".to_string();
///     store.save(&state).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Create a file state store, creating the parent directory if needed
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_error(&path, "create state directory", e))?;
        }

        Ok(Self { path })
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse file contents, falling back to the template
    fn parse(&self, content: &str) -> SessionState {
        let value: serde_json::Value = match serde_json::from_str(content) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    "State file {} is not valid JSON ({}), starting from a blank record",
                    self.path.display(),
                    e
                );
                return SessionState::template();
            }
        };

        match serde_json::from_value::<SessionState>(value) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(
                    "Entries in state file {} do not match the expected record ({}), refreshing",
                    self.path.display(),
                    e
                );
                SessionState::template()
            }
        }
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    /// Map an I/O failure, turning permission problems into a fatal reason
    fn io_error(path: &Path, action: &str, e: std::io::Error) -> Error {
        if e.kind() == ErrorKind::PermissionDenied {
            tracing::error!(
                "Could not {} at {}: permission denied",
                action,
                path.display()
            );
            return FatalReason::StatePermission {
                path: path.to_path_buf(),
            }
            .into();
        }
        Error::state_store(format!("Failed to {} at {}: {}", action, path.display(), e))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<SessionState, Error> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("State file does not exist: {}", self.path.display());
                return Ok(SessionState::template());
            }
            Err(e) => return Err(Self::io_error(&self.path, "read state file", e)),
        };

        let state = self.parse(&content);
        tracing::debug!("Loaded state: {:?}", state);
        Ok(state)
    }

    async fn save(&self, state: &SessionState) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| Error::state_store(format!("Failed to serialize state: {}", e)))?;

        // Write to temporary file first
        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path)
                .await
                .map_err(|e| Self::io_error(&temp_path, "create temp file", e))?;

            file.write_all(json.as_bytes())
                .await
                .map_err(|e| Self::io_error(&temp_path, "write temp file", e))?;

            file.sync_all()
                .await
                .map_err(|e| Self::io_error(&temp_path, "sync temp file", e))?;
        }

        // Atomic rename (temp -> actual)
        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Self::io_error(&self.path, "replace state file", e))?;

        tracing::trace!("State written to file: {}", self.path.display());
        Ok(())
    }
}
