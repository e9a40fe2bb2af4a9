use super::Fingerprint;
use crate::error::{Error, SyncResult};
use crate::utils::fs::{with_suffix, write_atomic};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Persists the fingerprint of the last published schedule
#[derive(Debug, Clone)]
pub struct FingerprintStore {
    path: PathBuf,
}

/// Exclusive lock on the state file, released on drop
#[derive(Debug)]
pub struct StateLock {
    _file: File,
}

impl FingerprintStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored fingerprint.
    ///
    /// `None` means there is nothing usable to compare against: no file yet,
    /// or content that is not a digest. Other read failures are errors.
    pub fn load(&self) -> SyncResult<Option<Fingerprint>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No stored fingerprint at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        match Fingerprint::from_hex(&content) {
            Some(fingerprint) => Ok(Some(fingerprint)),
            None => {
                warn!(
                    "Ignoring malformed fingerprint in {}; treating the schedule as changed",
                    self.path.display()
                );
                Ok(None)
            }
        }
    }

    /// Replace the stored fingerprint
    pub fn save(&self, fingerprint: &Fingerprint) -> SyncResult<()> {
        write_atomic(&self.path, format!("{}\n", fingerprint.as_hex()).as_bytes())?;
        debug!("Stored fingerprint {} in {}", fingerprint.short(), self.path.display());
        Ok(())
    }

    /// Take the run lock, failing at once if another run holds it
    pub fn lock(&self) -> SyncResult<StateLock> {
        let lock_path = with_suffix(&self.path, ".lock");
        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;

        file.try_lock_exclusive().map_err(|_| {
            Error::Lock(format!(
                "{} is held by another run",
                lock_path.display()
            ))
        })?;

        Ok(StateLock { _file: file })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(c: char) -> Fingerprint {
        Fingerprint::from_hex(&c.to_string().repeat(64)).unwrap()
    }

    #[test]
    fn test_missing_file_is_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = FingerprintStore::new(dir.path().join(".content_hash"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FingerprintStore::new(dir.path().join("state").join(".content_hash"));

        store.save(&digest('a')).unwrap();
        assert_eq!(store.load().unwrap(), Some(digest('a')));

        store.save(&digest('b')).unwrap();
        assert_eq!(store.load().unwrap(), Some(digest('b')));
        assert_eq!(
            fs::read_to_string(store.path()).unwrap(),
            format!("{}\n", "b".repeat(64))
        );
    }

    #[test]
    fn test_malformed_content_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".content_hash");

        fs::write(&path, "").unwrap();
        assert_eq!(FingerprintStore::new(&path).load().unwrap(), None);

        fs::write(&path, "not a digest\n").unwrap();
        assert_eq!(FingerprintStore::new(&path).load().unwrap(), None);
    }

    #[test]
    fn test_lock_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let store = FingerprintStore::new(dir.path().join(".content_hash"));

        let held = store.lock().unwrap();
        assert!(matches!(store.lock(), Err(Error::Lock(_))));

        drop(held);
        assert!(store.lock().is_ok());
    }
}
