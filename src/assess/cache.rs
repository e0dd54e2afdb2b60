//! Write-once verdict cache.
//!
//! Verdicts are keyed by the commit content hash and the model that produced
//! them. A key is populated at most once; later inserts for the same key are
//! ignored and the stored verdict wins.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use log::{debug, warn};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::models::QualityVerdict;

/// Hash identifying the assessed content of a commit.
///
/// Covers the commit hash, the full message and the full (untruncated) diff.
pub fn content_hash(commit_hash: &str, message: &str, diff: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [commit_hash, message, diff] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub content_hash: String,
    pub model: String,
}

impl CacheKey {
    pub fn new(content_hash: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content_hash: content_hash.into(),
            model: model.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The key already held a verdict; nothing was written.
    AlreadyPresent,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to serialize verdict: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Thread-safe, append-only store of verdicts.
pub trait VerdictStore: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<QualityVerdict>;

    fn insert(&self, key: &CacheKey, verdict: &QualityVerdict) -> Result<InsertOutcome, CacheError>;
}

/// In-process store, lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryVerdictStore {
    entries: RwLock<HashMap<CacheKey, QualityVerdict>>,
}

impl MemoryVerdictStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl VerdictStore for MemoryVerdictStore {
    fn get(&self, key: &CacheKey) -> Option<QualityVerdict> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn insert(&self, key: &CacheKey, verdict: &QualityVerdict) -> Result<InsertOutcome, CacheError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.contains_key(key) {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        entries.insert(key.clone(), verdict.clone());
        Ok(InsertOutcome::Inserted)
    }
}

/// One JSON file per verdict under `<root>/<model dir>/<content hash>.json`.
///
/// The model directory is the model name with path separators flattened plus
/// a digest of the exact name, so `openai/gpt-4o` and `openai_gpt-4o` never share
/// a directory.
///
/// Files are written to a temporary file first and moved into place without
/// overwriting, so concurrent writers of the same key cannot clobber each
/// other. Unreadable files are treated as misses.
#[derive(Debug, Clone)]
pub struct FileVerdictStore {
    root: PathBuf,
    /// Serializes replacement of corrupt entries between threads.
    repair: Arc<Mutex<()>>,
}

impl FileVerdictStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            repair: Arc::new(Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(model_dir(&key.model))
            .join(format!("{}.json", sanitize(&key.content_hash)))
    }

    fn read(path: &Path) -> Option<QualityVerdict> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Ignoring unreadable cache entry {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(verdict) => Some(verdict),
            Err(e) => {
                warn!("Ignoring corrupt cache entry {}: {}", path.display(), e);
                None
            }
        }
    }
}

impl VerdictStore for FileVerdictStore {
    fn get(&self, key: &CacheKey) -> Option<QualityVerdict> {
        let path = self.path_for(key);
        let verdict = Self::read(&path)?;
        if verdict.model != key.model {
            warn!(
                "Ignoring cache entry {} written for model '{}'",
                path.display(),
                verdict.model
            );
            return None;
        }
        Some(verdict)
    }

    fn insert(&self, key: &CacheKey, verdict: &QualityVerdict) -> Result<InsertOutcome, CacheError> {
        let path = self.path_for(key);
        let io_err = |source| CacheError::Io {
            path: path.clone(),
            source,
        };

        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir).map_err(io_err)?;

        let corrupt = path.exists() && Self::read(&path).is_none();
        if path.exists() && !corrupt {
            return Ok(InsertOutcome::AlreadyPresent);
        }

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        let body = serde_json::to_vec_pretty(verdict)?;
        tmp.write_all(&body).map_err(io_err)?;

        // Held until the replacement is in place.
        let _repair = corrupt.then(|| self.repair.lock().unwrap_or_else(|e| e.into_inner()));
        if corrupt && path.exists() {
            // Another writer may have repaired the entry in the meantime.
            if Self::read(&path).is_some() {
                return Ok(InsertOutcome::AlreadyPresent);
            }
            debug!("Replacing corrupt cache entry {}", path.display());
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(io_err(e)),
            }
        }

        match tmp.persist_noclobber(&path) {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                Ok(InsertOutcome::AlreadyPresent)
            }
            Err(e) => Err(io_err(e.error)),
        }
    }
}

fn model_dir(model: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(model.as_bytes()));
    format!("{}-{}", sanitize(model), &digest[..12])
}

/// Keep cache paths flat: model names such as `openai/gpt-4o` contain separators.
fn sanitize(component: &str) -> String {
    component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
