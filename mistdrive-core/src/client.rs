use std::io;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://drive.mistrunner.app";

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Authenticated handle to the warehouse file API. All operations are a
/// single request; retry policy, if any, belongs to the caller.
#[derive(Clone, Debug)]
pub struct DriveClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl DriveClient {
    pub fn new(token: impl Into<String>) -> Result<Self, DriveError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, DriveError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            token: token.into(),
        })
    }

    /// Account diagnostics: owner, quota and the store-assigned root id.
    pub async fn about(&self) -> Result<About, DriveError> {
        let url = self.endpoint("/v1/about")?;
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Lists files visible to the session, optionally restricted to the
    /// direct children of one folder. `None` lists everything.
    pub async fn list_files(&self, parent: Option<&str>) -> Result<Vec<RemoteFile>, DriveError> {
        let mut url = self.endpoint("/v1/files")?;
        if let Some(parent) = parent {
            url.query_pairs_mut().append_pair("parent", parent);
        }
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        let payload: FileListResponse = Self::handle_response(response).await?;
        Ok(payload.items)
    }

    /// Creates an empty file handle under a folder; content comes later via
    /// [`DriveClient::upload_content`].
    pub async fn create_file(&self, title: &str, parent_id: &str) -> Result<RemoteFile, DriveError> {
        let url = self.endpoint("/v1/files")?;
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .json(&CreateFileRequest {
                title,
                parent_ids: vec![parent_id],
            })
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Streams file content to `target`, writing through a `.partial`
    /// sibling and renaming into place. Overwrites `target` directly; any
    /// backup of the previous content is the caller's responsibility.
    pub async fn download_to_path(&self, file_id: &str, target: &Path) -> Result<(), DriveError> {
        let response = self
            .http
            .get(self.content_endpoint(file_id)?)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let partial = partial_path(target);
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        file.sync_all().await?;
        tokio::fs::rename(partial, target).await?;
        Ok(())
    }

    /// Reads file content into memory. Used for remote-to-remote backup
    /// copies, avoiding a round-trip through local disk.
    pub async fn read_content(&self, file_id: &str) -> Result<Vec<u8>, DriveError> {
        let response = self
            .http
            .get(self.content_endpoint(file_id)?)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Replaces file content.
    pub async fn upload_content(&self, file_id: &str, bytes: Vec<u8>) -> Result<(), DriveError> {
        let response = self
            .http
            .put(self.content_endpoint(file_id)?)
            .header("Authorization", self.auth_header_value())
            .body(bytes)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    fn auth_header_value(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn endpoint(&self, path: &str) -> Result<Url, DriveError> {
        Ok(self.base_url.join(path)?)
    }

    fn content_endpoint(&self, file_id: &str) -> Result<Url, DriveError> {
        self.endpoint(&format!("/v1/files/{file_id}/content"))
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, DriveError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(DriveError::Api { status, body })
        }
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DriveError> {
        Ok(Self::check_status(response).await?.json::<T>().await?)
    }
}

fn partial_path(target: &Path) -> PathBuf {
    target.with_extension(format!(
        "{}partial",
        target
            .extension()
            .map(|ext| format!("{}.", ext.to_string_lossy()))
            .unwrap_or_default()
    ))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct About {
    pub user_name: String,
    pub root_folder_id: String,
    pub quota_bytes_total: u64,
    pub quota_bytes_used: u64,
}

/// Handle to one object in the store. Titles are unique within a folder by
/// convention only; the store does not enforce it.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RemoteFile {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub parent_ids: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
struct FileListResponse {
    items: Vec<RemoteFile>,
}

#[derive(Debug, Serialize)]
struct CreateFileRequest<'a> {
    title: &'a str,
    parent_ids: Vec<&'a str>,
}
