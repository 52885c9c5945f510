use crate::error::{ApigraphError, Result};
use crate::flows::FlowOptions;
use crate::semantic::SemanticOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "APIGRAPH_CONFIG";
/// Config file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "apigraph.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub apigraph: ApigraphConfig,
    #[serde(default)]
    pub flows: FlowsConfig,
    #[serde(default)]
    pub semantic: SemanticConfig,
}

/// General settings
#[derive(Debug, Clone, Deserialize)]
pub struct ApigraphConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApigraphConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Name-based flow detection
#[derive(Debug, Clone, Deserialize)]
pub struct FlowsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub fuzzy_enabled: bool,
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
}

impl Default for FlowsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            fuzzy_enabled: true,
            fuzzy_threshold: default_fuzzy_threshold(),
        }
    }
}

impl FlowsConfig {
    pub fn options(&self) -> FlowOptions {
        FlowOptions {
            fuzzy_enabled: self.fuzzy_enabled,
            fuzzy_threshold: self.fuzzy_threshold,
        }
    }
}

/// LLM-assisted semantic matching
#[derive(Debug, Clone, Deserialize)]
pub struct SemanticConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_batch_items")]
    pub max_batch_items: usize,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: default_model(),
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            max_batch_items: default_max_batch_items(),
            max_in_flight: default_max_in_flight(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            deadline_secs: default_deadline_secs(),
            min_confidence: default_min_confidence(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl SemanticConfig {
    pub fn options(&self) -> SemanticOptions {
        SemanticOptions {
            max_batch_items: self.max_batch_items,
            max_in_flight: self.max_in_flight,
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            deadline: Duration::from_secs(self.deadline_secs),
            min_confidence: self.min_confidence,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_fuzzy_threshold() -> f64 {
    0.8
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_max_batch_items() -> usize {
    40
}

fn default_max_in_flight() -> usize {
    4
}

fn default_max_retries() -> usize {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_deadline_secs() -> u64 {
    600
}

fn default_min_confidence() -> f64 {
    0.8
}

fn default_cache_capacity() -> usize {
    10_000
}

impl Config {
    /// Load configuration
    ///
    /// Loads environment variables from .env file (if present) first.
    /// Looks for a config file in this order:
    /// 1. Path specified in APIGRAPH_CONFIG environment variable (must exist)
    /// 2. ./apigraph.toml in current directory
    /// 3. Built-in defaults
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load_from(Path::new(&path));
        }

        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            return Self::load_from(&local);
        }

        log::debug!("No config file found, using defaults");
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a specific config file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path).map_err(|e| {
            ApigraphError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: Config = toml::from_str(&config_str)
            .map_err(|e| ApigraphError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        config.validate()?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        fn bail(message: &str) -> Result<()> {
            Err(ApigraphError::Config(message.to_string()))
        }

        if !(0.0..=1.0).contains(&self.flows.fuzzy_threshold) {
            return bail("flows.fuzzy_threshold must be between 0.0 and 1.0");
        }

        let semantic = &self.semantic;
        if semantic.model.trim().is_empty() {
            return bail("semantic.model must not be empty");
        }
        if semantic.api_key_env.trim().is_empty() {
            return bail("semantic.api_key_env must not be empty");
        }
        if let Err(e) = url::Url::parse(&semantic.base_url) {
            return Err(ApigraphError::Config(format!(
                "semantic.base_url is not a valid URL ({}): {}",
                semantic.base_url, e
            )));
        }
        if semantic.max_batch_items < 2 {
            return bail("semantic.max_batch_items must be at least 2");
        }
        if semantic.max_in_flight == 0 {
            return bail("semantic.max_in_flight must be greater than 0");
        }
        if semantic.request_timeout_secs == 0 {
            return bail("semantic.request_timeout_secs must be greater than 0");
        }
        if semantic.deadline_secs == 0 {
            return bail("semantic.deadline_secs must be greater than 0");
        }
        if !(0.0..=1.0).contains(&semantic.min_confidence) {
            return bail("semantic.min_confidence must be between 0.0 and 1.0");
        }
        if semantic.cache_capacity == 0 {
            return bail("semantic.cache_capacity must be greater than 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide cwd and env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    const FULL_CONFIG: &str = r#"
[apigraph]
log_level = "debug"

[flows]
fuzzy_threshold = 0.9

[semantic]
enabled = true
model = "gpt-4o"
max_batch_items = 20
deadline_secs = 30
"#;

    /// Restores cwd when dropped (e.g. on panic).
    struct CwdGuard(PathBuf);
    impl Drop for CwdGuard {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.0);
        }
    }

    fn with_config_env(config_path: Option<&Path>, f: impl FnOnce()) {
        let original = std::env::var(CONFIG_ENV).ok();
        match config_path {
            Some(p) => std::env::set_var(CONFIG_ENV, p),
            None => std::env::remove_var(CONFIG_ENV),
        }
        f();
        std::env::remove_var(CONFIG_ENV);
        if let Some(val) = original {
            std::env::set_var(CONFIG_ENV, val);
        }
    }

    #[test]
    fn test_config_load_from_env_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("custom.toml");
        fs::write(&config_path, FULL_CONFIG).unwrap();

        with_config_env(Some(&config_path), || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            let config = config.unwrap();
            assert_eq!(config.apigraph.log_level, "debug");
            assert_eq!(config.flows.fuzzy_threshold, 0.9);
            assert!(config.flows.fuzzy_enabled);
            assert!(config.semantic.enabled);
            assert_eq!(config.semantic.model, "gpt-4o");
            assert_eq!(config.semantic.max_batch_items, 20);
            // untouched keys keep defaults
            assert_eq!(config.semantic.max_in_flight, 4);
            assert_eq!(config.semantic.options().deadline, Duration::from_secs(30));
        });
    }

    #[test]
    fn test_config_local_file_then_defaults() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        let _cwd = CwdGuard(original_dir);
        std::env::set_current_dir(temp_dir.path()).unwrap();

        with_config_env(None, || {
            let config = Config::load().unwrap();
            assert_eq!(config.apigraph.log_level, "info");
            assert!(!config.semantic.enabled);
            assert_eq!(config.semantic.cache_capacity, 10_000);

            fs::write(temp_dir.path().join(DEFAULT_CONFIG_FILE), FULL_CONFIG).unwrap();
            let config = Config::load().unwrap();
            assert_eq!(config.apigraph.log_level, "debug");
        });
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        with_config_env(Some(Path::new("nonexistent.toml")), || {
            let config = Config::load();
            assert!(matches!(config, Err(ApigraphError::Config(_))));
        });
    }

    #[test]
    fn test_config_rejects_out_of_range() {
        let cases = [
            "[flows]\nfuzzy_threshold = 1.5",
            "[semantic]\nmax_batch_items = 1",
            "[semantic]\nmax_in_flight = 0",
            "[semantic]\nmin_confidence = -0.1",
            "[semantic]\nbase_url = \"not a url\"",
            "[semantic]\ncache_capacity = 0",
        ];
        for case in cases {
            let config: Config = toml::from_str(case).unwrap();
            let err = config.validate().unwrap_err();
            assert!(matches!(err, ApigraphError::Config(_)), "{}", case);
        }
    }

    #[test]
    fn test_config_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        fs::write(&path, "[flows\nenabled = ").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_defaults_validate() {
        assert!(Config::default().validate().is_ok());
        let options = Config::default().semantic.options();
        assert_eq!(options, SemanticOptions::default());
        assert_eq!(Config::default().flows.options(), FlowOptions::default());
    }
}
