use std::io;

use thiserror::Error;

use crate::sync::manager::SyncManager;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact {0:?} is missing from the local cache")]
    MissingLocal(String),
    #[error("artifact {0:?} has no remote counterpart")]
    MissingRemote(String),
    #[error("artifact {name:?} failed to deserialize: {source}")]
    Deserialize {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("api error: {0}")]
    Api(#[from] mistdrive_core::DriveError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A ready-to-use model object. Opaque to this layer beyond its name and
/// the fact that it parsed; the prediction code knows what is inside.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub model: serde_json::Value,
}

/// Loads every configured artifact, in order, into memory. All-or-nothing:
/// a single missing name or corrupt payload fails the whole load, the
/// service cannot run on a partial artifact set.
///
/// In cloud-backed mode the root folder is listed once and each artifact is
/// downloaded into the cache directory first; in local-only mode the cache
/// directory must already hold every file.
pub async fn load_all(sync: &SyncManager, names: &[String]) -> Result<Vec<Artifact>, ArtifactError> {
    let mut artifacts = Vec::with_capacity(names.len());
    match sync.cloud() {
        None => {
            for name in names {
                eprintln!("[mistrunnerd] loading artifact {name}");
                let bytes = tokio::fs::read(sync.cache_path(name))
                    .await
                    .map_err(|err| match err.kind() {
                        io::ErrorKind::NotFound => ArtifactError::MissingLocal(name.clone()),
                        _ => ArtifactError::Io(err),
                    })?;
                artifacts.push(parse(name, &bytes)?);
            }
        }
        Some(cloud) => {
            let files = cloud.client.list_files(Some(&cloud.root_folder_id)).await?;
            for name in names {
                let file = files
                    .iter()
                    .find(|f| f.title == *name)
                    .ok_or_else(|| ArtifactError::MissingRemote(name.clone()))?;
                let target = sync.cache_path(name);
                eprintln!("[mistrunnerd] downloading artifact {name}");
                cloud.client.download_to_path(&file.id, &target).await?;
                let bytes = tokio::fs::read(&target).await?;
                artifacts.push(parse(name, &bytes)?);
            }
        }
    }
    Ok(artifacts)
}

fn parse(name: &str, bytes: &[u8]) -> Result<Artifact, ArtifactError> {
    let model = serde_json::from_slice(bytes).map_err(|source| ArtifactError::Deserialize {
        name: name.to_string(),
        source,
    })?;
    Ok(Artifact {
        name: name.to_string(),
        model,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::manager::SyncManager;
    use crate::sync::paths::Period;
    use mistdrive_core::DriveClient;
    use serde_json::json;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn local_manager(dir: &std::path::Path) -> SyncManager {
        SyncManager::local_only(
            dir.join("static"),
            dir.join("cache"),
            Period::new(2023, 1).unwrap(),
        )
    }

    #[tokio::test]
    async fn local_mode_loads_in_configured_order() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("cache");
        std::fs::create_dir_all(&cache).unwrap();
        std::fs::write(cache.join("estimator-rank.json"), br#"{"kind": "rank"}"#).unwrap();
        std::fs::write(cache.join("estimator-time.json"), br#"{"kind": "time"}"#).unwrap();

        let manager = local_manager(dir.path());
        let artifacts = load_all(
            &manager,
            &names(&["estimator-time.json", "estimator-rank.json"]),
        )
        .await
        .unwrap();

        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].name, "estimator-time.json");
        assert_eq!(artifacts[0].model, json!({"kind": "time"}));
        assert_eq!(artifacts[1].name, "estimator-rank.json");
    }

    #[tokio::test]
    async fn local_mode_missing_file_is_fatal() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("cache");
        std::fs::create_dir_all(&cache).unwrap();
        std::fs::write(cache.join("estimator-rank.json"), b"{}").unwrap();

        let manager = local_manager(dir.path());
        let err = load_all(
            &manager,
            &names(&["estimator-rank.json", "estimator-time.json"]),
        )
        .await
        .expect_err("expected missing artifact to abort the load");

        assert!(matches!(err, ArtifactError::MissingLocal(name) if name == "estimator-time.json"));
    }

    #[tokio::test]
    async fn corrupt_artifact_is_fatal() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("cache");
        std::fs::create_dir_all(&cache).unwrap();
        std::fs::write(cache.join("estimator-rank.json"), b"not json").unwrap();

        let manager = local_manager(dir.path());
        let err = load_all(&manager, &names(&["estimator-rank.json"]))
            .await
            .expect_err("expected corrupt artifact to abort the load");

        assert!(matches!(err, ArtifactError::Deserialize { name, .. } if name == "estimator-rank.json"));
    }

    #[tokio::test]
    async fn cloud_mode_downloads_each_configured_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/files"))
            .and(query_param_is_missing("parent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{ "id": "root-1", "title": "derpy-warehouse", "parent_ids": [] }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/files"))
            .and(query_param("parent", "root-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    { "id": "a-1", "title": "estimator-rank.json", "parent_ids": ["root-1"] },
                    { "id": "a-2", "title": "estimator-time.json", "parent_ids": ["root-1"] }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/files/a-1/content"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(br#"{"kind": "rank"}"#))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/files/a-2/content"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(br#"{"kind": "time"}"#))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let client = DriveClient::with_base_url(&server.uri(), "test-token").unwrap();
        let manager = SyncManager::connect(
            client,
            "derpy-warehouse",
            dir.path().join("static"),
            dir.path().join("cache"),
            Period::new(2023, 1).unwrap(),
        )
        .await
        .unwrap();

        let artifacts = load_all(
            &manager,
            &names(&["estimator-rank.json", "estimator-time.json"]),
        )
        .await
        .unwrap();

        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].model, json!({"kind": "rank"}));
        assert_eq!(artifacts[1].model, json!({"kind": "time"}));
        assert!(dir.path().join("cache/estimator-rank.json").exists());
    }

    #[tokio::test]
    async fn cloud_mode_unmatched_name_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/files"))
            .and(query_param_is_missing("parent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{ "id": "root-1", "title": "derpy-warehouse", "parent_ids": [] }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/files"))
            .and(query_param("parent", "root-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let client = DriveClient::with_base_url(&server.uri(), "test-token").unwrap();
        let manager = SyncManager::connect(
            client,
            "derpy-warehouse",
            dir.path().join("static"),
            dir.path().join("cache"),
            Period::new(2023, 1).unwrap(),
        )
        .await
        .unwrap();

        let err = load_all(&manager, &names(&["estimator-rank.json"]))
            .await
            .expect_err("expected unmatched artifact name to abort the load");

        assert!(matches!(err, ArtifactError::MissingRemote(name) if name == "estimator-rank.json"));
    }
}
