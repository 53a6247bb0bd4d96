//! Persistence for the access/refresh token pair.
//!
//! The store is a dumb shim: no validation, no expiry tracking. It only
//! has to remember two strings across restarts.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::StoreResult;

/// The two token slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub const ALL: [TokenKind; 2] = [TokenKind::Access, TokenKind::Refresh];

    /// Fixed storage key for this slot.
    pub fn key(self) -> &'static str {
        match self {
            TokenKind::Access => "access_token",
            TokenKind::Refresh => "refresh_token",
        }
    }
}

/// Trait for token persistence backends.
pub trait TokenStore: Send + Sync {
    fn get(&self, kind: TokenKind) -> StoreResult<Option<String>>;

    fn set(&self, kind: TokenKind, value: &str) -> StoreResult<()>;

    fn clear(&self, kind: TokenKind) -> StoreResult<()>;

    /// Clear both slots. Attempts both even if the first fails.
    fn clear_all(&self) -> StoreResult<()> {
        let access = self.clear(TokenKind::Access);
        let refresh = self.clear(TokenKind::Refresh);
        access.and(refresh)
    }
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    values: Mutex<HashMap<TokenKind, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, kind: TokenKind) -> StoreResult<Option<String>> {
        Ok(self.values.lock().get(&kind).cloned())
    }

    fn set(&self, kind: TokenKind, value: &str) -> StoreResult<()> {
        self.values.lock().insert(kind, value.to_string());
        Ok(())
    }

    fn clear(&self, kind: TokenKind) -> StoreResult<()> {
        self.values.lock().remove(&kind);
        Ok(())
    }
}

/// JSON file store, rewritten in full (temp file + rename) on each change.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileTokenStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let values = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), entries = values.len(), "opened token store");
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        match fs::remove_file(&tmp) {
            Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            // Owner read/write only.
            options.mode(0o600);
        }
        let mut file = options.open(&tmp)?;
        file.write_all(&serde_json::to_vec_pretty(values)?)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, kind: TokenKind) -> StoreResult<Option<String>> {
        Ok(self.values.lock().get(kind.key()).cloned())
    }

    fn set(&self, kind: TokenKind, value: &str) -> StoreResult<()> {
        let mut values = self.values.lock();
        values.insert(kind.key().to_string(), value.to_string());
        self.persist(&values)
    }

    fn clear(&self, kind: TokenKind) -> StoreResult<()> {
        let mut values = self.values.lock();
        if values.remove(kind.key()).is_none() {
            return Ok(());
        }
        self.persist(&values)
    }
}
