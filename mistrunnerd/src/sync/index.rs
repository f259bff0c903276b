use std::collections::HashMap;
use std::sync::Mutex;

use mistdrive_core::RemoteFile;

/// In-memory map from `/<title>` to remote file metadata. Populated once per
/// session from the root folder listing, appended to as files are created or
/// discovered, never evicted. The remote store stays authoritative; a miss
/// here only means the caller falls back to a fresh listing.
#[derive(Debug, Default)]
pub struct FileIndex {
    entries: Mutex<HashMap<String, RemoteFile>>,
}

impl FileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_for(title: &str) -> String {
        format!("/{title}")
    }

    pub fn lookup(&self, path: &str) -> Option<RemoteFile> {
        self.lock().get(path).cloned()
    }

    /// Stores `file` under `/<title>`. Last write wins.
    pub fn insert(&self, file: RemoteFile) {
        self.lock().insert(Self::key_for(&file.title), file);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, RemoteFile>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
