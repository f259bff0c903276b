use std::io;
use std::path::{Path, PathBuf};

use mistdrive_core::{DriveClient, DriveError, RemoteFile};
use thiserror::Error;

use super::backup::backup_then_write;
use super::index::FileIndex;
use super::paths::{self, Period};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("api error: {0}")]
    Api(#[from] DriveError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("root folder {0:?} not found in remote store")]
    RootFolderNotFound(String),
}

#[derive(Debug)]
pub(crate) struct CloudContext {
    pub(crate) client: DriveClient,
    pub(crate) root_folder_id: String,
}

/// Orchestrates the local mirror against the remote store: resolves periods
/// to canonical paths, decides fetch-vs-reuse, and guards every destructive
/// overwrite with a backup of the previous generation.
///
/// One manager per process. Callers are expected to serialize operations
/// behind a single worker; the index lock keeps `&self` methods sound but
/// the local backup-then-replace sequence is not safe under concurrent
/// writers for the same period.
#[derive(Debug)]
pub struct SyncManager {
    cloud: Option<CloudContext>,
    index: FileIndex,
    static_root: PathBuf,
    cache_root: PathBuf,
    first_period: Period,
}

impl SyncManager {
    /// Local-only mode: the filesystem is authoritative and the remote store
    /// is never contacted.
    pub fn local_only(static_root: PathBuf, cache_root: PathBuf, first_period: Period) -> Self {
        Self {
            cloud: None,
            index: FileIndex::new(),
            static_root,
            cache_root,
            first_period,
        }
    }

    /// Cloud-backed mode. Lists the store once, resolves the root folder by
    /// name (fatal when absent: every later create/backup needs its id) and
    /// seeds the index with the root folder's direct children.
    pub async fn connect(
        client: DriveClient,
        root_folder: &str,
        static_root: PathBuf,
        cache_root: PathBuf,
        first_period: Period,
    ) -> Result<Self, SyncError> {
        let files = client.list_files(None).await?;
        let root_folder_id = files
            .iter()
            .find(|f| f.title == root_folder)
            .map(|f| f.id.clone())
            .ok_or_else(|| SyncError::RootFolderNotFound(root_folder.to_string()))?;

        let index = FileIndex::new();
        for file in files {
            if file.parent_ids.iter().any(|id| *id == root_folder_id) {
                index.insert(file);
            }
        }
        eprintln!(
            "[mistrunnerd] indexed {} files under {root_folder:?}",
            index.len()
        );

        Ok(Self {
            cloud: Some(CloudContext {
                client,
                root_folder_id,
            }),
            index,
            static_root,
            cache_root,
            first_period,
        })
    }

    pub fn cloud_enabled(&self) -> bool {
        self.cloud.is_some()
    }

    pub fn index(&self) -> &FileIndex {
        &self.index
    }

    pub fn first_period(&self) -> Period {
        self.first_period
    }

    pub fn local_path(&self, period: Period) -> PathBuf {
        paths::local_path_for(&self.static_root, period)
    }

    /// Transient download location for a remote file name.
    pub fn cache_path(&self, file_name: &str) -> PathBuf {
        self.cache_root.join(file_name)
    }

    pub(crate) fn cloud(&self) -> Option<&CloudContext> {
        self.cloud.as_ref()
    }

    /// Resolves `period` to a readable local path, fetching the remote copy
    /// first when one exists. A missing remote counterpart is a normal
    /// outcome, not an error: the caller sees whatever is already on disk,
    /// including nothing.
    pub async fn load_period(&self, period: Period) -> Result<PathBuf, SyncError> {
        let dst = self.local_path(period);
        let Some(cloud) = &self.cloud else {
            return Ok(dst);
        };

        let file_name = period.file_name();
        // Always a fresh listing on the read path; dataset freshness matters
        // more than the request cost, so the index is bypassed here.
        let files = cloud.client.list_files(Some(&cloud.root_folder_id)).await?;
        let Some(remote) = files.into_iter().find(|f| f.title == file_name) else {
            return Ok(dst);
        };

        let tmp = self.cache_path(&file_name);
        eprintln!("[mistrunnerd] downloading {}", remote.title);
        cloud.client.download_to_path(&remote.id, &tmp).await?;
        self.index.insert(remote);

        backup_then_write(
            async || match tokio::fs::read(&dst).await {
                Ok(bytes) => Ok(Some(bytes)),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(err) => Err(SyncError::Io(err)),
            },
            async |current| {
                tokio::fs::write(paths::backup_path_for(&dst), current)
                    .await
                    .map_err(SyncError::Io)
            },
            async || promote(&tmp, &dst).await,
        )
        .await?;
        Ok(dst)
    }

    /// Uploads `data` as the new content of the period's remote file,
    /// preserving the previous remote generation in a `.bak` sibling first.
    /// A brand-new file gets no backup step.
    pub async fn save_period(
        &self,
        period: Period,
        data: &serde_json::Value,
    ) -> Result<(), SyncError> {
        let Some(cloud) = &self.cloud else {
            eprintln!("[mistrunnerd] attempting to upload while cloud disabled");
            return Ok(());
        };

        let file_name = period.file_name();
        let (target, existed) = match self.resolve_target(cloud, &file_name).await? {
            Some(file) => (file, true),
            None => {
                eprintln!("[mistrunnerd] cloud file {file_name} does not exist, creating new file");
                let file = cloud
                    .client
                    .create_file(&file_name, &cloud.root_folder_id)
                    .await?;
                self.index.insert(file.clone());
                (file, false)
            }
        };

        let payload = serde_json::to_vec(data)?;
        let target_id = target.id.clone();
        eprintln!("[mistrunnerd] uploading {}", target.title);
        backup_then_write(
            async || {
                if !existed {
                    return Ok(None);
                }
                Ok(Some(
                    cloud
                        .client
                        .read_content(&target.id)
                        .await
                        .map_err(SyncError::Api)?,
                ))
            },
            async |current| self.write_backup_of(cloud, &target.title, current).await,
            async move || {
                cloud
                    .client
                    .upload_content(&target_id, payload)
                    .await
                    .map_err(SyncError::Api)
            },
        )
        .await
    }

    /// Copies `file`'s current remote content into its `<title>.bak`
    /// sibling. Best-effort: the snapshot and the overwrite that follows it
    /// are not transactional, a failed overwrite leaves a fresh backup next
    /// to a stale primary.
    pub async fn backup_remote(&self, file: &RemoteFile) -> Result<(), SyncError> {
        let Some(cloud) = &self.cloud else {
            eprintln!("[mistrunnerd] attempting to upload while cloud disabled");
            return Ok(());
        };
        let current = cloud.client.read_content(&file.id).await?;
        self.write_backup_of(cloud, &file.title, current).await
    }

    /// Fetches every period from the configured first period through
    /// `through`, in order, returning the canonical local paths.
    pub async fn refresh(&self, through: Period) -> Result<Vec<PathBuf>, SyncError> {
        let mut loaded = Vec::new();
        for period in paths::range_inclusive(self.first_period, through) {
            loaded.push(self.load_period(period).await?);
        }
        Ok(loaded)
    }

    async fn resolve_target(
        &self,
        cloud: &CloudContext,
        file_name: &str,
    ) -> Result<Option<RemoteFile>, SyncError> {
        if let Some(file) = self.index.lookup(&FileIndex::key_for(file_name)) {
            return Ok(Some(file));
        }
        let files = cloud.client.list_files(Some(&cloud.root_folder_id)).await?;
        let found = files.into_iter().find(|f| f.title == file_name);
        if let Some(file) = &found {
            self.index.insert(file.clone());
        }
        Ok(found)
    }

    async fn write_backup_of(
        &self,
        cloud: &CloudContext,
        title: &str,
        current: Vec<u8>,
    ) -> Result<(), SyncError> {
        let backup_name = format!("{title}.bak");
        let slot = match self.index.lookup(&FileIndex::key_for(&backup_name)) {
            Some(file) => file,
            None => {
                let file = cloud
                    .client
                    .create_file(&backup_name, &cloud.root_folder_id)
                    .await?;
                self.index.insert(file.clone());
                file
            }
        };
        eprintln!("[mistrunnerd] creating cloud backup of {backup_name}");
        cloud.client.upload_content(&slot.id, current).await?;
        eprintln!("[mistrunnerd] backup complete");
        Ok(())
    }
}

/// Replaces `dst` with the content of `src` through an `.incoming` sibling,
/// so the swap itself is a rename.
async fn promote(src: &Path, dst: &Path) -> Result<(), SyncError> {
    if let Some(parent) = dst.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(SyncError::Io)?;
    }
    let incoming = paths::incoming_path_for(dst);
    tokio::fs::copy(src, &incoming).await.map_err(SyncError::Io)?;
    tokio::fs::rename(&incoming, dst).await.map_err(SyncError::Io)
}
