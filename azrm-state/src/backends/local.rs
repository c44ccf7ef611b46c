//! Local file backend for state storage
//!
//! Stores state as pretty-printed JSON (default: azrm.state.json). Writes hold
//! a sibling `.lock` file for the whole check-and-replace, go to a temporary
//! file first and are renamed into place.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, warn};

use crate::backend::{BackendConfig, BackendError, BackendResult, StateBackend};
use crate::lock::{DEFAULT_LOCK_TIMEOUT_SECS, LockInfo};
use crate::state::StateFile;

/// Removes the lock file when dropped
struct HeldLock {
    path: PathBuf,
}

impl Drop for HeldLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("failed to remove lock file {}: {}", self.path.display(), e);
        }
    }
}

/// Local file backend
pub struct LocalBackend {
    state_path: PathBuf,
}

impl LocalBackend {
    /// Default state file name
    pub const DEFAULT_STATE_FILE: &'static str = "azrm.state.json";

    pub fn new() -> Self {
        Self::with_path(PathBuf::from(Self::DEFAULT_STATE_FILE))
    }

    pub fn with_path(state_path: impl Into<PathBuf>) -> Self {
        Self {
            state_path: state_path.into(),
        }
    }

    /// Create a LocalBackend from configuration, honouring the `path` attribute
    pub fn from_config(config: &BackendConfig) -> BackendResult<Self> {
        match config.attributes.get("path") {
            None => Ok(Self::new()),
            Some(_) => config
                .get_string("path")
                .filter(|p| !p.trim().is_empty())
                .map(Self::with_path)
                .ok_or_else(|| BackendError::configuration("`path` must be a non-empty string")),
        }
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.state_path.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    }

    fn staging_path(&self) -> PathBuf {
        self.sibling(".tmp")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.sibling(".lock")
    }

    /// Create the lock file, replacing it only if the existing lock has expired
    async fn acquire_lock(&self) -> BackendResult<HeldLock> {
        let path = self.lock_path();
        let lock = LockInfo::new("write");
        let content = serde_json::to_string_pretty(&lock)
            .map_err(|e| BackendError::Serialization(format!("Failed to serialize lock: {}", e)))?;

        for _ in 0..2 {
            let created = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            match created {
                Ok(_) => {
                    // From here on the lock file is ours and is removed on drop.
                    let held = HeldLock { path: path.clone() };
                    tokio::fs::write(&path, &content)
                        .await
                        .map_err(|e| BackendError::Io(format!("Failed to write lock file: {}", e)))?;
                    debug!("acquired state lock {}", lock.id);
                    return Ok(held);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let existing = tokio::fs::read_to_string(&path).await.ok();
                    match existing.and_then(|c| serde_json::from_str::<LockInfo>(&c).ok()) {
                        Some(existing) if !existing.is_expired() => {
                            return Err(BackendError::locked(&existing));
                        }
                        Some(existing) => {
                            warn!("removing expired state lock {} held by {}", existing.id, existing.who);
                        }
                        None if !lock_file_abandoned(&path).await => {
                            return Err(BackendError::Locked {
                                lock_id: "unknown".to_string(),
                                who: "unknown".to_string(),
                                operation: "write".to_string(),
                            });
                        }
                        None => warn!("removing abandoned state lock {}", path.display()),
                    }
                    match tokio::fs::remove_file(&path).await {
                        Ok(()) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => {
                            return Err(BackendError::Io(format!("Failed to remove lock file: {}", e)));
                        }
                    }
                }
                Err(e) => {
                    return Err(BackendError::Io(format!("Failed to create lock file: {}", e)));
                }
            }
        }
        Err(BackendError::Io(format!(
            "could not acquire {} after removing a stale lock",
            path.display()
        )))
    }
}

/// An unreadable lock file is only taken over once it is older than the lock timeout
async fn lock_file_abandoned(path: &Path) -> bool {
    let timeout = std::time::Duration::from_secs(DEFAULT_LOCK_TIMEOUT_SECS.unsigned_abs());
    match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
        Ok(modified) => modified.elapsed().is_ok_and(|age| age > timeout),
        Err(_) => false,
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateBackend for LocalBackend {
    async fn read_state(&self) -> BackendResult<Option<StateFile>> {
        let content = match tokio::fs::read_to_string(&self.state_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(BackendError::Io(format!("Failed to read state file: {}", e)));
            }
        };

        let state: StateFile = serde_json::from_str(&content).map_err(|e| {
            BackendError::InvalidState(format!("Failed to parse state file: {}", e))
        })?;
        if state.version > StateFile::CURRENT_VERSION {
            return Err(BackendError::InvalidState(format!(
                "state file version {} is newer than supported version {}",
                state.version,
                StateFile::CURRENT_VERSION
            )));
        }

        Ok(Some(state))
    }

    async fn write_state(&self, state: &StateFile) -> BackendResult<()> {
        let _lock = self.acquire_lock().await?;

        if let Some(stored) = self.read_state().await? {
            if stored.lineage != state.lineage {
                return Err(BackendError::LineageMismatch {
                    expected: stored.lineage,
                    actual: state.lineage.clone(),
                });
            }
            if stored.serial >= state.serial {
                return Err(BackendError::StaleSerial {
                    stored: stored.serial,
                    writing: state.serial,
                });
            }
        }

        let content = serde_json::to_string_pretty(state).map_err(|e| {
            BackendError::Serialization(format!("Failed to serialize state: {}", e))
        })?;

        let staging = self.staging_path();
        tokio::fs::write(&staging, content)
            .await
            .map_err(|e| BackendError::Io(format!("Failed to write state file: {}", e)))?;
        tokio::fs::rename(&staging, &self.state_path)
            .await
            .map_err(|e| BackendError::Io(format!("Failed to replace state file: {}", e)))?;

        debug!(
            "wrote state serial {} to {}",
            state.serial,
            self.state_path.display()
        );
        Ok(())
    }
}
