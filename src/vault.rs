/*
 * Document stores.
 *
 * `DocumentStore` is the host-side contract the sync engine works against.
 * `Vault` binds it to a directory of markdown notes, `MemoryStore` keeps
 * documents in memory for embedding and tests.
 */

use crate::storage::LocalStorage;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use walkdir::WalkDir;

/// Workspace file the note app keeps its recently opened files in.
pub const WORKSPACE_FILE: &str = ".obsidian/workspace.json";

/// A document, addressed by its path relative to the store root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentHandle(pub String);

impl DocumentHandle {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait DocumentStore {
    /// Recently open documents, most recent first.
    fn list_recent_documents(&self) -> Result<Vec<DocumentHandle>>;

    fn read_text(&self, handle: &DocumentHandle) -> Result<String>;

    /// Atomically reads the current content, applies `transform` and writes
    /// the result back. Returns whether the content changed; unchanged
    /// content is not written.
    fn replace_text<F>(&self, handle: &DocumentHandle, transform: F) -> Result<bool>
    where
        F: FnOnce(&str) -> String;

    /// Last modification time, `None` when the store cannot tell.
    fn modification_time(&self, handle: &DocumentHandle) -> Option<DateTime<Utc>>;
}

#[derive(Deserialize, Default)]
struct Workspace {
    #[serde(default, rename = "lastOpenFiles")]
    last_open_files: Vec<String>,
}

/// A directory of markdown notes.
#[derive(Debug, Clone)]
pub struct Vault {
    root: PathBuf,
    lock_dir: PathBuf,
    recent_limit: usize,
}

impl Vault {
    /// `lock_dir` holds the lock files, so the vault itself stays clean.
    pub fn new(root: impl Into<PathBuf>, lock_dir: impl Into<PathBuf>, recent_limit: usize) -> Self {
        Self {
            root: root.into(),
            lock_dir: lock_dir.into(),
            recent_limit,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, handle: &DocumentHandle) -> PathBuf {
        self.root.join(handle.as_str())
    }

    fn lock_path(&self, handle: &DocumentHandle) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        self.path_of(handle).hash(&mut hasher);
        self.lock_dir.join(format!("doc_{:x}.lock", hasher.finish()))
    }

    fn recent_from_workspace(&self, workspace_path: &Path) -> Result<Vec<DocumentHandle>> {
        let json = fs::read_to_string(workspace_path)
            .with_context(|| format!("Failed to read {}", workspace_path.display()))?;
        let workspace: Workspace = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse {}", workspace_path.display()))?;

        let mut seen = HashSet::new();
        Ok(workspace
            .last_open_files
            .into_iter()
            .filter(|p| p.ends_with(".md"))
            .filter(|p| seen.insert(p.clone()))
            .map(DocumentHandle)
            .filter(|h| self.path_of(h).is_file())
            .collect())
    }

    /// Newest `*.md` files under the root. Hidden entries are pruned,
    /// symlinks are not followed and unreadable subdirectories are skipped.
    fn recent_by_mtime(&self) -> Result<Vec<DocumentHandle>> {
        let mut found: Vec<(DateTime<Utc>, DocumentHandle)> = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(e).with_context(|| format!("Failed to list {}", self.root.display()));
                }
                Err(e) => {
                    log::debug!("Skipping unreadable entry in {}: {}", self.root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || entry.path().extension().is_none_or(|e| e != "md") {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from)
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            let rel = rel.to_string_lossy().replace('\\', "/");
            found.push((modified, DocumentHandle(rel)));
        }

        found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        Ok(found
            .into_iter()
            .take(self.recent_limit)
            .map(|(_, h)| h)
            .collect())
    }
}

fn file_mtime(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

impl DocumentStore for Vault {
    fn list_recent_documents(&self) -> Result<Vec<DocumentHandle>> {
        let workspace = self.root.join(WORKSPACE_FILE);
        if workspace.exists() {
            return self.recent_from_workspace(&workspace);
        }
        log::debug!(
            "No workspace file in {}, using the {} most recently modified notes",
            self.root.display(),
            self.recent_limit
        );
        self.recent_by_mtime()
    }

    fn read_text(&self, handle: &DocumentHandle) -> Result<String> {
        let path = self.path_of(handle);
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))
    }

    fn replace_text<F>(&self, handle: &DocumentHandle, transform: F) -> Result<bool>
    where
        F: FnOnce(&str) -> String,
    {
        let path = self.path_of(handle);
        LocalStorage::with_lock_file(&self.lock_path(handle), || {
            let current = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let updated = transform(&current);
            if updated == current {
                return Ok(false);
            }
            LocalStorage::atomic_write(&path, updated)?;
            Ok(true)
        })
    }

    fn modification_time(&self, handle: &DocumentHandle) -> Option<DateTime<Utc>> {
        file_mtime(&self.path_of(handle))
    }
}

#[derive(Debug, Clone)]
pub struct MemoryDocument {
    pub text: String,
    pub modified: Option<DateTime<Utc>>,
}

/// In-memory store. Documents are listed in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    order: Mutex<Vec<DocumentHandle>>,
    docs: Mutex<HashMap<DocumentHandle, MemoryDocument>>,
    writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &str, text: &str, modified: Option<DateTime<Utc>>) -> DocumentHandle {
        let handle = DocumentHandle::new(path);
        let mut order = self.order.lock().unwrap_or_else(PoisonError::into_inner);
        if !order.contains(&handle) {
            order.push(handle.clone());
        }
        self.docs.lock().unwrap_or_else(PoisonError::into_inner).insert(
            handle.clone(),
            MemoryDocument {
                text: text.to_string(),
                modified,
            },
        );
        handle
    }

    pub fn text(&self, path: &str) -> Option<String> {
        self.docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&DocumentHandle::new(path))
            .map(|d| d.text.clone())
    }

    /// Number of committed rewrites.
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DocumentStore for MemoryStore {
    fn list_recent_documents(&self) -> Result<Vec<DocumentHandle>> {
        Ok(self.order.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn read_text(&self, handle: &DocumentHandle) -> Result<String> {
        self.docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(handle)
            .map(|d| d.text.clone())
            .ok_or_else(|| anyhow::anyhow!("No such document: {}", handle))
    }

    fn replace_text<F>(&self, handle: &DocumentHandle, transform: F) -> Result<bool>
    where
        F: FnOnce(&str) -> String,
    {
        let mut docs = self.docs.lock().unwrap_or_else(PoisonError::into_inner);
        let doc = docs
            .get_mut(handle)
            .ok_or_else(|| anyhow::anyhow!("No such document: {}", handle))?;
        let updated = transform(&doc.text);
        if updated == doc.text {
            return Ok(false);
        }
        doc.text = updated;
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(true)
    }

    fn modification_time(&self, handle: &DocumentHandle) -> Option<DateTime<Utc>> {
        self.docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(handle)
            .and_then(|d| d.modified)
    }
}
