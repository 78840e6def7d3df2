//! Content-addressed store.
//!
//! A flat on-disk directory keyed by the SHA-256 hex of file content.
//! Identical output bytes across files, projects, and even unrelated runs
//! collapse onto one stored entry, which destinations then hard-link instead
//! of rewriting.
//!
//! Every operation here is best-effort: the store is a cost optimization,
//! never a correctness dependency. An unwritable store, a failed hard link
//! (cross-filesystem targets, say), or two processes racing on the same hash
//! all degrade to a plain write. Racing writers of the same key are harmless
//! since the same hash implies the same bytes.
//!
//! The store root is injectable so tests can use a temp directory instead of
//! the shared per-user cache.

use crate::engine::writer::{atomic_write_bytes, set_mode};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Default store location, shared by all projects of the current user.
const DEFAULT_STORE_DIR: &str = "~/.stencil_cache";

/// Unbounded content-addressed file store.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The per-user default root (`~/.stencil_cache`).
    pub fn default_root() -> PathBuf {
        PathBuf::from(shellexpand::tilde(DEFAULT_STORE_DIR).as_ref())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// SHA-256 hex digest of `bytes`, the store key.
    pub fn hash(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    fn entry(&self, hash: &str) -> PathBuf {
        self.root.join(hash)
    }

    /// Create the store directory. Best-effort.
    pub async fn init(&self) {
        tokio::fs::create_dir_all(&self.root).await.ok();
    }

    /// Whether an entry for `hash` exists.
    pub async fn contains(&self, hash: &str) -> bool {
        tokio::fs::metadata(self.entry(hash)).await.is_ok()
    }

    /// Hard-link the stored entry for `hash` to `dest` and apply `mode`.
    ///
    /// Returns false when the entry is missing or the link cannot be made;
    /// the caller falls back to writing `dest` directly.
    pub async fn try_link(&self, hash: &str, dest: &Path, mode: u32) -> bool {
        let entry = self.entry(hash);
        if tokio::fs::metadata(&entry).await.is_err() {
            return false;
        }
        if tokio::fs::hard_link(&entry, dest).await.is_err() {
            return false;
        }
        set_mode(dest, mode).await;
        true
    }

    /// Populate the entry for `hash` with `bytes` if absent. Best-effort:
    /// failures are swallowed and the store simply stays cold for this key.
    pub async fn ensure(&self, hash: &str, bytes: &[u8], mode: u32) {
        let entry = self.entry(hash);
        if tokio::fs::metadata(&entry).await.is_ok() {
            return;
        }
        atomic_write_bytes(&entry, bytes, mode).await.ok();
    }
}

impl Default for ContentStore {
    fn default() -> Self {
        Self::new(Self::default_root())
    }
}
