//! Configuration loading
//!
//! Every setting resolves with the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or malformed TOML file is never fatal: it is logged and the
//! remaining tiers are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_FILE_ENV: &str = "ACAPELLA_CONFIG";
pub const OUTPUT_DIR_ENV: &str = "ACAPELLA_OUTPUT_DIR";
pub const DATABASE_ENV: &str = "ACAPELLA_DATABASE";
pub const USER_AGENT_ENV: &str = "ACAPELLA_USER_AGENT";
pub const SEARCH_API_KEY_ENV: &str = "GOOGLE_SEARCH_API_KEY";
pub const SEARCH_ENGINE_ID_ENV: &str = "GOOGLE_SEARCH_CX";

const DEFAULT_OUTPUT_DIR: &str = "./fetched";
const DEFAULT_IMPORT_CONCURRENCY: usize = 4;

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub output_dir: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub user_agent: Option<String>,
    pub search_api_key: Option<String>,
    pub search_engine_id: Option<String>,
    pub enrich_track_links: Option<bool>,
    pub import_concurrency: Option<usize>,
}

impl TomlConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load the config file, degrading to an empty config on any problem
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path.map(Path::to_path_buf).or_else(config_file_path) {
            Some(path) => path,
            None => {
                debug!("No config file location available, using defaults");
                return Self::default();
            }
        };

        if !path.exists() {
            debug!("Config file {} not found, using defaults", path.display());
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => match Self::from_toml_str(&content) {
                Ok(config) => {
                    debug!("Loaded config file {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Ignoring config file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Cannot read config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Values given on the command line; `None` means "not given"
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub output_dir: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub enrich_track_links: Option<bool>,
    pub import_concurrency: Option<usize>,
}

/// Fully resolved settings for the fetch and upload tools
#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    /// Directory snapshots are written to
    pub output_dir: PathBuf,
    /// SQLite database the upserter writes to
    pub database_path: PathBuf,
    /// User-Agent sent to every external service
    pub user_agent: String,
    /// Web search API key (platform link enrichment is skipped without it)
    pub search_api_key: Option<String>,
    /// Web search engine id
    pub search_engine_id: Option<String>,
    /// Run link enrichment for every track (expensive in search quota)
    pub enrich_track_links: bool,
    /// Snapshot files imported concurrently
    pub import_concurrency: usize,
}

impl IngestConfig {
    /// Resolve all settings: CLI → ENV → TOML → default
    pub fn resolve(cli: &ConfigOverrides, toml: &TomlConfig) -> Self {
        let output_dir = cli
            .output_dir
            .clone()
            .or_else(|| env_value(OUTPUT_DIR_ENV).map(PathBuf::from))
            .or_else(|| toml.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        let database_path = cli
            .database_path
            .clone()
            .or_else(|| env_value(DATABASE_ENV).map(PathBuf::from))
            .or_else(|| toml.database_path.clone())
            .unwrap_or_else(default_database_path);

        let user_agent = env_value(USER_AGENT_ENV)
            .or_else(|| toml.user_agent.clone())
            .unwrap_or_else(get_user_agent);

        let search_api_key = env_value(SEARCH_API_KEY_ENV).or_else(|| toml.search_api_key.clone());
        let search_engine_id =
            env_value(SEARCH_ENGINE_ID_ENV).or_else(|| toml.search_engine_id.clone());

        let enrich_track_links = cli
            .enrich_track_links
            .or(toml.enrich_track_links)
            .unwrap_or(false);

        let import_concurrency = cli
            .import_concurrency
            .or(toml.import_concurrency)
            .unwrap_or(DEFAULT_IMPORT_CONCURRENCY)
            .max(1);

        Self {
            output_dir,
            database_path,
            user_agent,
            search_api_key,
            search_engine_id,
            enrich_track_links,
            import_concurrency,
        }
    }
}

/// Standard User-Agent for outbound HTTP (MusicBrainz rejects anonymous clients)
pub fn get_user_agent() -> String {
    format!(
        "Acapella/{} ( https://musicbrainz.org/doc/MusicBrainz_API/Rate_Limiting )",
        env!("CARGO_PKG_VERSION")
    )
}

/// Location of `config.toml`: `ACAPELLA_CONFIG`, else `<config_dir>/acapella/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    if let Some(path) = env_value(CONFIG_FILE_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("acapella").join("config.toml"))
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("acapella"))
        .unwrap_or_else(|| PathBuf::from("./acapella_data"))
        .join("acapella.db")
}

/// Read an environment variable, treating blank values as unset
fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
