//! satlink.toml configuration parser.
//!
//! Every section is optional. An absent file (or an empty one) yields the
//! stock topology: five `GameOutcomeAggregator` satellites labelled
//! `Game 1`..`Game 5` linked into one `PredictionMarket` hub.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::DeployableUnit;

pub const DEFAULT_SATELLITE_LABELS: [&str; 5] = ["Game 1", "Game 2", "Game 3", "Game 4", "Game 5"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("invalid key pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SatlinkConfig {
    pub hub: HubConfig,
    pub satellites: SatelliteConfig,
    pub ledger: LedgerConfig,
    pub artifacts: ArtifactsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub template: String,
    pub label: String,
    pub env_key: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            template: "PredictionMarket".to_string(),
            label: "PredictionMarket".to_string(),
            env_key: "NEXT_PUBLIC_PREDICTION_MARKET_ADDRESS".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SatelliteConfig {
    pub template: String,
    /// Deployment and registration order.
    pub labels: Vec<String>,
    pub env_prefix: String,
    pub env_suffix: String,
}

impl Default for SatelliteConfig {
    fn default() -> Self {
        Self {
            template: "GameOutcomeAggregator".to_string(),
            labels: DEFAULT_SATELLITE_LABELS.iter().map(|s| s.to_string()).collect(),
            env_prefix: "NEXT_PUBLIC_".to_string(),
            env_suffix: "_AGGREGATOR".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Upper bound on waiting for a single transaction to be included.
    pub confirmation_timeout_secs: u64,
    /// Simulated inclusion latency of the development ledger.
    pub block_time_ms: u64,
    /// Starting balance of the deployer, in base units. A string because
    /// TOML integers stop at i64.
    pub deployer_balance: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout_secs: 60,
            block_time_ms: 0,
            deployer_balance: "1000000000000000000000".to_string(),
        }
    }
}

impl LedgerConfig {
    pub fn deployer_balance(&self) -> Result<u128, ConfigError> {
        self.deployer_balance.trim().parse().map_err(|e| {
            ConfigError::Invalid(format!(
                "ledger.deployer_balance {:?}: {e}",
                self.deployer_balance
            ))
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Directory of compiled `<Template>.json` artifacts. Built-in
    /// placeholders are used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl SatlinkConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` if given, otherwise the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hub.template.trim().is_empty() {
            return Err(ConfigError::Invalid("hub.template is empty".into()));
        }
        if self.hub.label.trim().is_empty() {
            return Err(ConfigError::Invalid("hub.label is empty".into()));
        }
        if self.hub.env_key.trim().is_empty() {
            return Err(ConfigError::Invalid("hub.env_key is empty".into()));
        }
        if self.satellites.template.trim().is_empty() {
            return Err(ConfigError::Invalid("satellites.template is empty".into()));
        }

        let mut seen = HashSet::new();
        for label in &self.satellites.labels {
            if label.trim().is_empty() {
                return Err(ConfigError::Invalid("satellite label is empty".into()));
            }
            if !seen.insert(label.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate satellite label {label:?}"
                )));
            }
        }

        let mut keys = HashSet::new();
        keys.insert(self.hub.env_key.clone());
        for unit in self.satellite_units()? {
            if !keys.insert(unit.env_key.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "satellite {:?} maps to env key {} which is already taken",
                    unit.label, unit.env_key
                )));
            }
        }

        self.ledger.deployer_balance()?;
        Ok(())
    }

    pub fn hub_unit(&self) -> DeployableUnit {
        DeployableUnit::hub(&self.hub.template, &self.hub.label, &self.hub.env_key)
    }

    /// Satellites in configured order.
    pub fn satellite_units(&self) -> Result<Vec<DeployableUnit>, ConfigError> {
        let s = &self.satellites;
        let non_word = non_word_pattern()?;
        s.labels
            .iter()
            .map(|label| {
                let key = derive_env_key(&non_word, &s.env_prefix, label, &s.env_suffix)?;
                Ok(DeployableUnit::satellite(&s.template, label, &key))
            })
            .collect()
    }
}

fn non_word_pattern() -> Result<Regex, ConfigError> {
    Ok(Regex::new(r"[^A-Za-z0-9]+")?)
}

/// `prefix + UPPER_SNAKE(label) + suffix`; "Game 1" becomes
/// `NEXT_PUBLIC_GAME_1_AGGREGATOR` with the default affixes.
///
/// Fails when the label has no letters or digits to build a key from.
pub fn env_key(prefix: &str, label: &str, suffix: &str) -> Result<String, ConfigError> {
    derive_env_key(&non_word_pattern()?, prefix, label, suffix)
}

fn derive_env_key(
    non_word: &Regex,
    prefix: &str,
    label: &str,
    suffix: &str,
) -> Result<String, ConfigError> {
    let body = non_word.replace_all(label.trim(), "_");
    let body = body.trim_matches('_').to_ascii_uppercase();
    if body.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "satellite label {label:?} has no letters or digits for an env key"
        )));
    }
    Ok(format!("{prefix}{body}{suffix}"))
}
