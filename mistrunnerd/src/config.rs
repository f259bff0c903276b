use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use crate::sync::paths::Period;

const DEFAULT_STATIC_DIR: &str = "static";
const DEFAULT_CACHE_DIR: &str = ".dctmp";
const DEFAULT_ROOT_FOLDER: &str = "derpy-warehouse";
const DEFAULT_ARTIFACTS: &str = "estimator-rank.json,estimator-time.json";
const DEFAULT_FIRST_PERIOD: &str = "2023-01";
const DEFAULT_REFRESH_SECS: u64 = 300;

#[derive(Clone, Debug)]
pub struct ServiceCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Mode flag, set once at startup and immutable afterwards. When false
    /// the remote store is never contacted.
    pub cloud_enabled: bool,
    /// Present exactly when `cloud_enabled` is true.
    pub credentials: Option<ServiceCredentials>,
    /// Override for the auth and file API endpoints, used in staging.
    pub api_base_url: Option<String>,
    pub static_root: PathBuf,
    pub cache_root: PathBuf,
    pub root_folder: String,
    /// Ordered artifact name list; load order is part of the contract.
    pub artifact_names: Vec<String>,
    pub first_period: Period,
    pub refresh_interval: Duration,
}

impl RuntimeConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::with_cloud_enabled(read_bool_env("MIST_USE_CLOUD_DATA", true))
    }

    /// Same as [`RuntimeConfig::from_env`] but forces local-only mode, so a
    /// machine without credentials can still run against its mirror.
    pub fn local_only_from_env() -> anyhow::Result<Self> {
        Self::with_cloud_enabled(false)
    }

    fn with_cloud_enabled(cloud_enabled: bool) -> anyhow::Result<Self> {
        let credentials = if cloud_enabled {
            let client_id = std::env::var("MIST_CLIENT_ID").context("MIST_CLIENT_ID is not set")?;
            let client_secret =
                std::env::var("MIST_CLIENT_SECRET").context("MIST_CLIENT_SECRET is not set")?;
            Some(ServiceCredentials {
                client_id,
                client_secret,
            })
        } else {
            None
        };
        let api_base_url = std::env::var("MIST_API_BASE_URL").ok();
        let static_root = PathBuf::from(
            std::env::var("MIST_STATIC_DIR").unwrap_or_else(|_| DEFAULT_STATIC_DIR.to_string()),
        );
        let cache_root = PathBuf::from(
            std::env::var("MIST_CACHE_DIR").unwrap_or_else(|_| DEFAULT_CACHE_DIR.to_string()),
        );
        let root_folder =
            std::env::var("MIST_ROOT_FOLDER").unwrap_or_else(|_| DEFAULT_ROOT_FOLDER.to_string());
        let artifact_names = parse_artifact_names(
            &std::env::var("MIST_ARTIFACTS").unwrap_or_else(|_| DEFAULT_ARTIFACTS.to_string()),
        );
        let first_period = std::env::var("MIST_FIRST_PERIOD")
            .unwrap_or_else(|_| DEFAULT_FIRST_PERIOD.to_string())
            .parse::<Period>()
            .context("MIST_FIRST_PERIOD is malformed")?;
        let refresh_interval =
            Duration::from_secs(read_u64_env("MIST_REFRESH_SECS", DEFAULT_REFRESH_SECS));

        Ok(Self {
            cloud_enabled,
            credentials,
            api_base_url,
            static_root,
            cache_root,
            root_folder,
            artifact_names,
            first_period,
            refresh_interval,
        })
    }
}

fn parse_artifact_names(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn read_bool_env(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|value| parse_bool(&value))
        .unwrap_or(default)
}

fn parse_bool(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off" | ""
    )
}

fn read_u64_env(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("1"));
        assert!(parse_bool("true"));
        assert!(parse_bool("Yes"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("No"));
        assert!(!parse_bool("off"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn parse_artifact_names_trims_and_drops_empties() {
        assert_eq!(
            parse_artifact_names(" a.json, b.json ,,c.json"),
            vec!["a.json", "b.json", "c.json"]
        );
        assert!(parse_artifact_names("").is_empty());
    }

    #[test]
    fn default_artifact_list_is_ordered() {
        assert_eq!(
            parse_artifact_names(DEFAULT_ARTIFACTS),
            vec!["estimator-rank.json", "estimator-time.json"]
        );
    }
}
