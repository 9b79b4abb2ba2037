//! The JSON configuration file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Deserialize;
use tracing::*;

use crate::address::{format_address, parse_address};
use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "./config.json";

const DEFAULT_SNAPSHOT_WINDOW_SECS: u64 = 120;

/// File layout as written by operators. Validated into [`Config`].
#[derive(Debug, Deserialize)]
struct ConfigFile {
    json_rpc_address: String,
    flash_pool_address: String,
    #[serde(default)]
    asset_map: HashMap<String, String>,
    scan_interval: u64,
    #[serde(default)]
    snapshot_start: Option<DateTime<Utc>>,
    #[serde(default = "default_snapshot_window")]
    snapshot_window: u64,
    #[serde(default = "default_output_dir")]
    output_dir: PathBuf,
    #[serde(default)]
    max_retries: usize,
}

fn default_snapshot_window() -> u64 {
    DEFAULT_SNAPSHOT_WINDOW_SECS
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

/// Validated configuration, immutable once loaded.
#[derive(Debug, Clone)]
pub struct Config {
    /// JSON-RPC endpoint of the node used for pre-exec calls.
    pub json_rpc_address: Url,
    /// Root contract listing the markets.
    pub flash_pool_address: Address,
    pub asset_map: AssetMap,
    /// Time between two snapshot cycles.
    pub scan_interval: Duration,
    /// When polling begins. `None` starts right away.
    pub snapshot_start: Option<DateTime<Utc>>,
    /// How long after the start polling continues.
    pub snapshot_window: chrono::Duration,
    pub output_dir: PathBuf,
    /// Retries of a failed RPC round-trip within one invocation.
    pub max_retries: usize,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Reading config from {}", path.display());

        let json = std::fs::read_to_string(path).map_err(|source| {
            ConfigError::Read { path: path.to_path_buf(), source }
        })?;

        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_json::from_str(json)?;

        let json_rpc_address = Url::parse(&file.json_rpc_address).map_err(
            |err| ConfigError::InvalidRpcAddress {
                url: file.json_rpc_address.clone(),
                reason: err.to_string(),
            },
        )?;

        let flash_pool_address = parse_address(&file.flash_pool_address)
            .map_err(|source| ConfigError::InvalidAddress {
                field: "flash_pool_address",
                value: file.flash_pool_address.clone(),
                source,
            })?;

        if file.scan_interval == 0 {
            return Err(ConfigError::ZeroScanInterval);
        }

        let snapshot_window = i64::try_from(file.snapshot_window)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or(ConfigError::WindowOutOfRange(file.snapshot_window))?;

        let config = Config {
            json_rpc_address,
            flash_pool_address,
            asset_map: AssetMap::parse(file.asset_map)?,
            scan_interval: Duration::from_secs(file.scan_interval),
            snapshot_start: file.snapshot_start,
            snapshot_window,
            output_dir: file.output_dir,
            max_retries: file.max_retries,
        };

        info!(
            "Loaded config: rpc={} flash_pool={} assets={} interval={:?}",
            config.json_rpc_address,
            format_address(&config.flash_pool_address),
            config.asset_map.len(),
            config.scan_interval,
        );

        Ok(config)
    }
}

/// Display names of markets, keyed by market address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetMap(HashMap<Address, String>);

impl AssetMap {
    pub fn new(names: HashMap<Address, String>) -> Self {
        Self(names)
    }

    /// Parse the textual map of the config file. Two keys naming the same
    /// address, e.g. differing only in case, are rejected, as are names that
    /// would break the `name<TAB>balance` snapshot lines.
    pub fn parse(raw: HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut names = HashMap::with_capacity(raw.len());

        for (key, name) in raw {
            let address = parse_address(&key).map_err(|source| {
                ConfigError::InvalidAddress {
                    field: "asset_map",
                    value: key.clone(),
                    source,
                }
            })?;

            if name.contains(['\t', '\n', '\r']) {
                return Err(ConfigError::InvalidAssetName {
                    address: format_address(&address),
                    name,
                });
            }

            if names.insert(address, name).is_some() {
                return Err(ConfigError::DuplicateAsset {
                    address: format_address(&address),
                });
            }
        }

        Ok(Self(names))
    }

    pub fn get(&self, market: &Address) -> Option<&str> {
        self.0.get(market).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Address, String)> for AssetMap {
    fn from_iter<I: IntoIterator<Item = (Address, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ETH: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const DAI: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const POOL: &str = "0x1111111111111111111111111111111111111111";

    fn config_json(extra: &str) -> String {
        format!(
            r#"{{
                "json_rpc_address": "http://127.0.0.1:20336",
                "flash_pool_address": "{POOL}",
                "asset_map": {{ "{ETH}": "ETH", "0x{DAI}": "DAI" }},
                "scan_interval": 30{extra}
            }}"#
        )
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_json(&config_json("")).unwrap();

        assert_eq!(config.json_rpc_address.as_str(), "http://127.0.0.1:20336/");
        assert_eq!(config.flash_pool_address, parse_address(POOL).unwrap());
        assert_eq!(config.scan_interval, Duration::from_secs(30));
        assert_eq!(config.snapshot_start, None);
        assert_eq!(config.snapshot_window, chrono::Duration::minutes(2));
        assert_eq!(config.output_dir, PathBuf::from("data"));
        assert_eq!(config.max_retries, 0);

        assert_eq!(config.asset_map.len(), 2);
        let eth = parse_address(ETH).unwrap();
        let dai = parse_address(DAI).unwrap();
        assert_eq!(config.asset_map.get(&eth), Some("ETH"));
        assert_eq!(config.asset_map.get(&dai), Some("DAI"));
    }

    #[test]
    fn test_optional_fields() {
        let extra = r#",
            "snapshot_start": "2020-10-22T23:59:00Z",
            "snapshot_window": 300,
            "output_dir": "/tmp/reserves",
            "max_retries": 3"#;
        let config = Config::from_json(&config_json(extra)).unwrap();

        assert_eq!(
            config.snapshot_start,
            Some("2020-10-22T23:59:00Z".parse().unwrap())
        );
        assert_eq!(config.snapshot_window, chrono::Duration::minutes(5));
        assert_eq!(config.output_dir, PathBuf::from("/tmp/reserves"));
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_rejects_invalid_configs() {
        assert!(matches!(
            Config::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));

        let zero_interval = config_json("").replace("30", "0");
        assert!(matches!(
            Config::from_json(&zero_interval),
            Err(ConfigError::ZeroScanInterval)
        ));

        let bad_pool = config_json("").replace(POOL, "0x1234");
        assert!(matches!(
            Config::from_json(&bad_pool),
            Err(ConfigError::InvalidAddress { field: "flash_pool_address", .. })
        ));

        let bad_url = config_json("").replace("http://127.0.0.1:20336", "");
        assert!(matches!(
            Config::from_json(&bad_url),
            Err(ConfigError::InvalidRpcAddress { .. })
        ));

        let huge_window =
            config_json(r#", "snapshot_window": 18446744073709551615"#);
        assert!(matches!(
            Config::from_json(&huge_window),
            Err(ConfigError::WindowOutOfRange(u64::MAX))
        ));
    }

    #[test]
    fn test_duplicate_asset_keys_are_rejected() {
        let raw = HashMap::from([
            (ETH.to_string(), "ETH".to_string()),
            (format!("0x{}", ETH.to_uppercase()), "WETH".to_string()),
        ]);

        assert!(matches!(
            AssetMap::parse(raw),
            Err(ConfigError::DuplicateAsset { .. })
        ));
    }

    #[test]
    fn test_asset_names_with_separators_are_rejected() {
        for name in ["Wrapped\tETH", "ETH\n", "ETH\r\nDAI"] {
            let raw = HashMap::from([(ETH.to_string(), name.to_string())]);
            assert!(matches!(
                AssetMap::parse(raw),
                Err(ConfigError::InvalidAssetName { .. })
            ));
        }

        let quoted = "Wrapped \"ETH\"".to_string();
        let raw = HashMap::from([(ETH.to_string(), quoted)]);
        let assets = AssetMap::parse(raw).unwrap();
        let eth = parse_address(ETH).unwrap();
        assert_eq!(assets.get(&eth), Some("Wrapped \"ETH\""));
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, config_json("")).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.asset_map.len(), 2);
    }
}
