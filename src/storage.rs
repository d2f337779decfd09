// Locked, atomic file writes shared by the config file and vault documents.
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use fs2::FileExt;

pub struct LocalStorage;

impl LocalStorage {
    /// Appends `suffix` to the file's extension (`note.md` -> `note.md.lock`).
    fn sibling_path(file_path: &Path, suffix: &str) -> PathBuf {
        let mut path = file_path.to_path_buf();
        if let Some(ext) = path.extension() {
            let mut new_ext = ext.to_os_string();
            new_ext.push(".");
            new_ext.push(suffix);
            path.set_extension(new_ext);
        } else {
            path.set_extension(suffix);
        }
        path
    }

    pub fn get_lock_path(file_path: &Path) -> PathBuf {
        Self::sibling_path(file_path, "lock")
    }

    /// Runs `f` while holding an exclusive lock on the sidecar lock file of `file_path`.
    pub fn with_lock<F, T>(file_path: &Path, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        Self::with_lock_file(&Self::get_lock_path(file_path), f)
    }

    /// Runs `f` while holding an exclusive lock on `lock_path` itself.
    pub fn with_lock_file<F, T>(lock_path: &Path, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(parent) = lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create lock directory: {:?}", parent))?;
        }
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .with_context(|| format!("Failed to open lock file: {:?}", lock_path))?;

        file.lock_exclusive()?;
        let result = f();
        file.unlock()?;
        result
    }

    /// Atomic write: write to a `.tmp` sibling, then rename over the target.
    pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = Self::sibling_path(path, "tmp");
        fs::write(&tmp_path, contents)
            .with_context(|| format!("Failed to write {:?}", tmp_path))?;
        fs::rename(&tmp_path, path).with_context(|| format!("Failed to replace {:?}", path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_paths() {
        assert_eq!(
            LocalStorage::get_lock_path(Path::new("/v/note.md")),
            PathBuf::from("/v/note.md.lock")
        );
        assert_eq!(
            LocalStorage::get_lock_path(Path::new("/v/README")),
            PathBuf::from("/v/README.lock")
        );
    }

    #[test]
    fn test_atomic_write_replaces_content_and_leaves_no_tmp() {
        let dir = std::env::temp_dir().join(format!("tasklink_storage_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let file = dir.join("note.md");
        fs::write(&file, "old").unwrap();

        LocalStorage::with_lock(&file, || LocalStorage::atomic_write(&file, "new")).unwrap();

        assert_eq!(fs::read_to_string(&file).unwrap(), "new");
        assert!(!dir.join("note.md.tmp").exists());
        let _ = fs::remove_dir_all(&dir);
    }
}
