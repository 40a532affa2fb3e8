//! Configuration module for the property search engine.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file (`.inmofinder/settings.toml`)
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `IF_` and use double underscores
//! to separate nested levels:
//! - `IF_SEMANTIC_SEARCH__CANDIDATE_POOL=300` sets `semantic_search.candidate_pool`
//! - `IF_SEARCH__PAGE_SIZE=24` sets `search.page_size`
//! - `IF_LOGGING__LEVEL=debug` sets `logging.level`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR: &str = ".inmofinder";
const CONFIG_FILE: &str = "settings.toml";
const ENV_PREFIX: &str = "IF_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory holding vector index snapshots
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// JSON file backing the record store
    #[serde(default = "default_records_path")]
    pub records_path: PathBuf,

    /// Workspace root directory (where .inmofinder is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Global debug mode; lowers the default log filter to `debug`
    #[serde(default = "default_false")]
    pub debug: bool,

    #[serde(default)]
    pub semantic_search: SemanticSearchConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SemanticSearchConfig {
    /// Enable semantic ranking; keyword matching is used when disabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Model to use for embeddings
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// How many ranked candidates feed attribute filtering
    #[serde(default = "default_candidate_pool")]
    pub candidate_pool: usize,

    /// Records encoded per model call during rebuilds
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Upper bound on encoding a query
    #[serde(default = "default_encode_timeout_ms")]
    pub encode_timeout_ms: u64,

    /// Upper bound a search waits on a cold-start index build
    #[serde(default = "default_build_timeout_ms")]
    pub build_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SearchConfig {
    /// Results per page when the request does not say
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Largest page size a request may ask for
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default tracing filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_index_path() -> PathBuf {
    PathBuf::from(".inmofinder/index")
}
fn default_records_path() -> PathBuf {
    PathBuf::from(".inmofinder/records.json")
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_candidate_pool() -> usize {
    500
}
fn default_batch_size() -> usize {
    64
}
fn default_encode_timeout_ms() -> u64 {
    5_000
}
fn default_build_timeout_ms() -> u64 {
    300_000
}
fn default_page_size() -> usize {
    12
}
fn default_max_page_size() -> usize {
    100
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            index_path: default_index_path(),
            records_path: default_records_path(),
            workspace_root: None,
            debug: false,
            semantic_search: SemanticSearchConfig::default(),
            search: SearchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SemanticSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: default_embedding_model(),
            candidate_pool: default_candidate_pool(),
            batch_size: default_batch_size(),
            encode_timeout_ms: default_encode_timeout_ms(),
            build_timeout_ms: default_build_timeout_ms(),
        }
    }
}

impl SemanticSearchConfig {
    pub fn encode_timeout(&self) -> Duration {
        Duration::from_millis(self.encode_timeout_ms)
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_millis(self.build_timeout_ms)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Directory where fastembed caches downloaded model weights.
pub fn models_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("inmofinder")
        .join("models")
}

fn env_provider() -> Env {
    // Double underscore separates nested levels; single underscores stay
    Env::prefixed(ENV_PREFIX).map(|key| key.as_str().to_lowercase().replace("__", ".").into())
}

impl Settings {
    /// Tracing filter used when RUST_LOG is unset.
    pub fn log_filter(&self, verbose: bool) -> &str {
        if self.debug {
            "debug"
        } else if verbose {
            "info"
        } else {
            &self.logging.level
        }
    }

    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));

        Self::figment(&config_path)
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                if settings.workspace_root.is_none() {
                    settings.workspace_root = Self::workspace_root();
                }
                settings
            })
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path.as_ref()).extract().map_err(Box::new)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(env_provider())
    }

    /// Find the workspace config by looking for a .inmofinder directory
    /// from the current directory up to the root
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Get the workspace root directory (where .inmofinder is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Check if configuration is properly initialized
    pub fn check_init() -> Result<(), String> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));

        if !config_path.exists() {
            return Err("No configuration file found".to_string());
        }

        match std::fs::read_to_string(&config_path) {
            Ok(content) => {
                if let Err(e) = toml::from_str::<Settings>(&content) {
                    return Err(format!(
                        "Configuration file is corrupted: {e}\nRun 'inmofinder init --force' to regenerate."
                    ));
                }
            }
            Err(e) => {
                return Err(format!("Cannot read configuration file: {e}"));
            }
        }

        Ok(())
    }

    /// Resolves a configured path against the workspace root.
    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.workspace_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn index_dir(&self) -> PathBuf {
        self.resolve(&self.index_path)
    }

    pub fn records_file(&self) -> PathBuf {
        self.resolve(&self.records_path)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file with helpful comments
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&config_path, Self::template())?;
        Ok(config_path)
    }

    fn template() -> String {
        let defaults = Settings::default();
        format!(
            r#"# inmofinder configuration

# Version of the configuration schema
version = {version}

# Vector index snapshots (relative to workspace root)
index_path = "{index_path}"

# Record store file (relative to workspace root)
records_path = "{records_path}"

# Global debug mode
debug = false

[semantic_search]
# Rank free-text queries by embedding similarity.
# When disabled, free text falls back to keyword matching.
enabled = true

# Embedding model: AllMiniLML6V2, ParaphraseMLMiniLML12V2,
# MultilingualE5Small, BGESmallENV15, BGEBaseENV15.
# Changing the model requires 'inmofinder index --force'.
model = "{model}"

# Ranked candidates considered before attribute filters apply
candidate_pool = {pool}

# Records encoded per batch during index rebuilds
batch_size = {batch}

# Timeouts in milliseconds
encode_timeout_ms = {encode}
build_timeout_ms = {build}

[search]
page_size = {page}
max_page_size = {max_page}

[logging]
# Overridden by RUST_LOG and by --verbose
level = "{level}"
"#,
            version = defaults.version,
            index_path = defaults.index_path.display(),
            records_path = defaults.records_path.display(),
            model = defaults.semantic_search.model,
            pool = defaults.semantic_search.candidate_pool,
            batch = defaults.semantic_search.batch_size,
            encode = defaults.semantic_search.encode_timeout_ms,
            build = defaults.semantic_search.build_timeout_ms,
            page = defaults.search.page_size,
            max_page = defaults.search.max_page_size,
            level = defaults.logging.level,
        )
    }
}
