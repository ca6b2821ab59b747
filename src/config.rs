use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::{Cid, Cycle, ResourceKind};
use crate::error::PullError;

pub const CONFIG_FILE_NAME: &str = "campaign-finance.json";
pub const API_KEY_ENV: &str = "OPENSECRETS_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://www.opensecrets.org/api/";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub cycle: Option<Cycle>,
    #[serde(default)]
    pub throttle_ms: Option<u64>,
    #[serde(default)]
    pub known_failures: KnownFailureLists,
}

/// Candidates that 404 upstream for a resource, collected over earlier runs.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct KnownFailureLists {
    #[serde(default)]
    pub sectors: Vec<String>,
    #[serde(default)]
    pub industries: Vec<String>,
    #[serde(default)]
    pub contributors: Vec<String>,
    #[serde(default)]
    pub summaries: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct KnownFailures {
    pub sectors: BTreeSet<Cid>,
    pub industries: BTreeSet<Cid>,
    pub contributors: BTreeSet<Cid>,
    pub summaries: BTreeSet<Cid>,
}

impl KnownFailures {
    pub fn for_kind(&self, kind: ResourceKind) -> &BTreeSet<Cid> {
        match kind {
            ResourceKind::Sectors => &self.sectors,
            ResourceKind::Industries => &self.industries,
            ResourceKind::Contributors => &self.contributors,
            ResourceKind::Summaries => &self.summaries,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub api_key: Option<String>,
    pub base_url: String,
    pub data_dir: Utf8PathBuf,
    pub cycle: Cycle,
    pub throttle: Duration,
    pub known_failures: KnownFailures,
}

impl ResolvedConfig {
    pub fn require_api_key(&self) -> Result<&str, PullError> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(PullError::MissingApiKey)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads an explicit config path, else `campaign-finance.json` in the
    /// working directory, else the platform config directory, else defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, PullError> {
        let config = match Self::locate(path) {
            Some(config_path) => {
                let content = fs::read_to_string(&config_path)
                    .map_err(|_| PullError::ConfigRead(config_path.clone()))?;
                tracing::debug!(path = %config_path.display(), "loaded config");
                serde_json::from_str(&content)
                    .map_err(|err| PullError::ConfigParse(err.to_string()))?
            }
            None => Config::default(),
        };

        let env_key = std::env::var(API_KEY_ENV).ok();
        Self::resolve_config(config, env_key)
    }

    fn locate(path: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = path {
            return Some(PathBuf::from(path));
        }
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        ProjectDirs::from("org", "opensecrets", "campaign-finance-puller")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
            .filter(|candidate| candidate.exists())
    }

    /// The environment key wins over the config file's `api_key`.
    pub fn resolve_config(
        config: Config,
        env_key: Option<String>,
    ) -> Result<ResolvedConfig, PullError> {
        let api_key = env_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .or(config.api_key);

        let lists = config.known_failures;
        let known_failures = KnownFailures {
            sectors: parse_cids(lists.sectors)?,
            industries: parse_cids(lists.industries)?,
            contributors: parse_cids(lists.contributors)?,
            summaries: parse_cids(lists.summaries)?,
        };

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            api_key,
            base_url: config
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            data_dir: Utf8PathBuf::from(config.data_dir.unwrap_or_else(|| "data".to_string())),
            cycle: config.cycle.unwrap_or_default(),
            throttle: Duration::from_millis(config.throttle_ms.unwrap_or(1000)),
            known_failures,
        })
    }
}

fn parse_cids(values: Vec<String>) -> Result<BTreeSet<Cid>, PullError> {
    values.iter().map(|value| value.parse()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_config_file() {
        let resolved = ConfigLoader::resolve_config(Config::default(), None).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.data_dir, Utf8PathBuf::from("data"));
        assert_eq!(resolved.cycle.year(), 2022);
        assert_eq!(resolved.throttle, Duration::from_secs(1));
        assert!(resolved.require_api_key().is_err());
    }

    #[test]
    fn env_key_overrides_file_key() {
        let config = Config {
            api_key: Some("from-file".to_string()),
            ..Config::default()
        };
        let resolved =
            ConfigLoader::resolve_config(config, Some(" from-env ".to_string())).unwrap();
        assert_eq!(resolved.require_api_key().unwrap(), "from-env");
    }
}
