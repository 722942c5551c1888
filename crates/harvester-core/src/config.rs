use std::collections::BTreeMap;
use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HarvesterError, Result};
use crate::types::{HttpMethod, JobDefinition};

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = concat!("harvester/", env!("CARGO_PKG_VERSION"));
pub const ENV_PREFIX: &str = "HARVESTER_";

/// Top-level config (harvester.toml + HARVESTER_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HarvesterConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Named lookups referenced by `LOOKUP` parameter sources.
    #[serde(default)]
    pub lookups: BTreeMap<String, LookupConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file holding the execution audit log.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// A named lookup: either an inline list (e.g. active region codes exported
/// from the code registry) or an HTTP endpoint returning JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LookupConfig {
    Static {
        values: Vec<String>,
    },
    Http {
        url: String,
        #[serde(default)]
        method: HttpMethod,
        /// Dotted path into the response, e.g. `data.items[]`.
        #[serde(default)]
        json_path: Option<String>,
    },
}

fn default_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.harvester/harvester.db", home)
}

impl HarvesterConfig {
    /// Load config from a TOML file with HARVESTER_* env var overrides.
    ///
    /// Nested keys use a double underscore so snake_case names survive:
    /// `HARVESTER_HTTP__TIMEOUT_SECS=5`.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        debug!(path = %path, "loading config");

        Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| HarvesterError::Config(e.to_string()))
    }
}

/// Read a job definition from a TOML job file.
pub fn load_job(path: &Path) -> Result<JobDefinition> {
    if !path.is_file() {
        return Err(HarvesterError::Config(format!(
            "job file not found: {}",
            path.display()
        )));
    }
    debug!(path = %path.display(), "loading job file");
    Figment::new()
        .merge(Toml::file(path))
        .extract()
        .map_err(|e| HarvesterError::Config(format!("{}: {e}", path.display())))
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.harvester/harvester.toml", home)
}
