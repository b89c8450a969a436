//! Node configuration.
//!
//! `NodeConfig` holds everything a node needs to join the cluster and serve
//! searches. `ConfigManager` loads it from defaults or a JSON file, applies
//! `WAYPOINT_*` environment overrides and validates the result.

use crate::coordination::{COORDINATORS_REGISTRY, ELECTION_NAMESPACE, WORKERS_REGISTRY};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub network: NetworkConfig,
    pub coordination: CoordinationConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinationConfig {
    pub election_namespace: String,
    pub workers_registry: String,
    pub coordinators_registry: String,
    pub max_election_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub documents_dir: PathBuf,
    pub documents_pattern: String,
    pub request_timeout_secs: u64, // 0 = no timeout
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            election_namespace: ELECTION_NAMESPACE.to_string(),
            workers_registry: WORKERS_REGISTRY.to_string(),
            coordinators_registry: COORDINATORS_REGISTRY.to_string(),
            max_election_attempts: 16,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("./resources/books"),
            documents_pattern: "*.txt".to_string(),
            request_timeout_secs: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    /// Base URL other processes use to reach this node.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.network.host, self.network.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.search.request_timeout_secs)
    }

    /// Parsed log level; unknown names fall back to `Info`.
    pub fn log_level(&self) -> LevelFilter {
        LevelFilter::from_str(&self.logging.level).unwrap_or(LevelFilter::Info)
    }

    /// Rejects settings a node cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.port == 0 {
            return Err(ConfigError::Invalid("network port is not set".to_string()));
        }
        if self.network.host.is_empty() {
            return Err(ConfigError::Invalid("network host is not set".to_string()));
        }
        if self.coordination.max_election_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_election_attempts must be at least 1".to_string(),
            ));
        }

        let namespaces = [
            &self.coordination.election_namespace,
            &self.coordination.workers_registry,
            &self.coordination.coordinators_registry,
        ];
        for namespace in namespaces {
            if !namespace.starts_with('/') || namespace.len() < 2 || namespace.ends_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "namespace {:?} must be an absolute path below the root",
                    namespace
                )));
            }
        }
        if namespaces[0] == namespaces[1]
            || namespaces[0] == namespaces[2]
            || namespaces[1] == namespaces[2]
        {
            return Err(ConfigError::Invalid("namespaces must be distinct".to_string()));
        }
        if self.search.documents_pattern.is_empty() {
            return Err(ConfigError::Invalid("documents pattern is not set".to_string()));
        }
        Ok(())
    }
}

pub struct ConfigManager {
    config: NodeConfig,
    env_overrides: HashMap<String, String>,
}

impl ConfigManager {
    /// Defaults with environment overrides applied.
    pub fn new() -> Self {
        Self::with_config(NodeConfig::default())
    }

    pub fn with_config(config: NodeConfig) -> Self {
        let mut manager = Self {
            config,
            env_overrides: HashMap::new(),
        };
        manager.apply_env_overrides();
        manager
    }

    /// Loads a JSON file. Missing sections and fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: NodeConfig =
            serde_json::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(Self::with_config(config))
    }

    pub fn get_config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn into_config(self) -> NodeConfig {
        self.config
    }

    /// Settings that were taken from the environment, keyed by field path.
    pub fn env_overrides(&self) -> &HashMap<String, String> {
        &self.env_overrides
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.config.validate()
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Overwrites settings from `lookup`, which maps a variable name to its
    /// value.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("WAYPOINT_PORT") {
            if let Ok(port_num) = port.parse::<u16>() {
                self.config.network.port = port_num;
                self.env_overrides.insert("network.port".to_string(), port);
            }
        }

        if let Some(host) = lookup("WAYPOINT_HOST") {
            self.config.network.host = host.clone();
            self.env_overrides.insert("network.host".to_string(), host);
        }

        if let Some(dir) = lookup("WAYPOINT_DOCUMENTS_DIR") {
            self.config.search.documents_dir = PathBuf::from(&dir);
            self.env_overrides
                .insert("search.documents_dir".to_string(), dir);
        }

        if let Some(log_level) = lookup("WAYPOINT_LOG_LEVEL") {
            self.config.logging.level = log_level.clone();
            self.env_overrides
                .insert("logging.level".to_string(), log_level);
        }
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
