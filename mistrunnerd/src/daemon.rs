use anyhow::Context;
use mistdrive_core::{About, AuthClient, DriveClient};

use crate::artifacts::{self, Artifact};
use crate::config::RuntimeConfig;
use crate::sync::manager::SyncManager;
use crate::sync::paths::Period;

#[derive(Debug)]
pub struct DaemonRuntime {
    config: RuntimeConfig,
    sync: SyncManager,
    artifacts: Vec<Artifact>,
}

impl DaemonRuntime {
    /// Brings the service to a ready state in a fixed order: authenticate,
    /// log store diagnostics, resolve the root folder and seed the index,
    /// then preload the artifact list. Any failure here is unrecoverable.
    pub async fn bootstrap(config: RuntimeConfig) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&config.cache_root)
            .await
            .with_context(|| format!("failed to create cache root at {:?}", config.cache_root))?;
        tokio::fs::create_dir_all(&config.static_root)
            .await
            .with_context(|| format!("failed to create static root at {:?}", config.static_root))?;

        let sync = if let Some(credentials) = &config.credentials {
            let auth = match config.api_base_url.as_deref() {
                Some(base) => AuthClient::with_base_url(
                    base,
                    &credentials.client_id,
                    &credentials.client_secret,
                )?,
                None => AuthClient::new(&credentials.client_id, &credentials.client_secret)?,
            };
            let token = auth
                .authenticate()
                .await
                .context("service account authentication failed")?;
            let client = match config.api_base_url.as_deref() {
                Some(base) => DriveClient::with_base_url(base, token.access_token)?,
                None => DriveClient::new(token.access_token)?,
            };
            let about = client
                .about()
                .await
                .context("failed to fetch store diagnostics")?;
            log_store_info(&about);
            SyncManager::connect(
                client,
                &config.root_folder,
                config.static_root.clone(),
                config.cache_root.clone(),
                config.first_period,
            )
            .await
            .context("failed to resolve the remote root folder")?
        } else {
            eprintln!("[mistrunnerd] cloud data is disabled");
            SyncManager::local_only(
                config.static_root.clone(),
                config.cache_root.clone(),
                config.first_period,
            )
        };

        let artifacts = artifacts::load_all(&sync, &config.artifact_names)
            .await
            .context("artifact preload failed")?;
        eprintln!("[mistrunnerd] loaded {} artifacts", artifacts.len());

        Ok(Self {
            config,
            sync,
            artifacts,
        })
    }

    /// The preloaded model artifacts, in configured order. Written once
    /// during bootstrap, never mutated afterwards.
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn sync(&self) -> &SyncManager {
        &self.sync
    }

    /// Periodic refresh loop until ctrl-c. All sync operations run on this
    /// one task, which keeps at most one in flight at a time.
    pub async fn run(self) -> anyhow::Result<()> {
        eprintln!(
            "[mistrunnerd] started: mode={}, static_root={}, refresh_secs={}",
            if self.sync.cloud_enabled() {
                "cloud"
            } else {
                "local-only"
            },
            self.config.static_root.display(),
            self.config.refresh_interval.as_secs()
        );

        let mut ticker = tokio::time::interval(self.config.refresh_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sync.refresh(Period::current()).await {
                        Ok(loaded) => {
                            eprintln!("[mistrunnerd] refreshed {} period files", loaded.len());
                        }
                        // A failed tick is not fatal; the next one retries.
                        Err(err) => eprintln!("[mistrunnerd] refresh error: {err}"),
                    }
                }
                res = &mut shutdown => {
                    res.context("failed waiting for shutdown signal")?;
                    eprintln!("[mistrunnerd] shutting down");
                    return Ok(());
                }
            }
        }
    }
}

fn log_store_info(about: &About) {
    let mut banner = String::from("\n");
    banner.push_str(&"=".repeat(42));
    banner.push('\n');
    banner.push_str(&format!("Current username: {}\n", about.user_name));
    banner.push_str(&format!("Root folder ID: {}\n", about.root_folder_id));
    banner.push_str(&format!("Total quota (bytes): {}\n", about.quota_bytes_total));
    banner.push_str(&format!("Used quota (bytes): {}\n", about.quota_bytes_used));
    banner.push_str(&"=".repeat(42));
    eprintln!("[mistrunnerd]{banner}");
}
