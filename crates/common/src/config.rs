use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(".")
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Config::builder()
            .add_source(
                File::with_name(
                    path.as_ref()
                        .join("config/default")
                        .to_string_lossy()
                        .as_ref(),
                )
                .required(false),
            )
            .add_source(
                File::with_name(
                    path.as_ref()
                        .join("config/local")
                        .to_string_lossy()
                        .as_ref(),
                )
                .required(false),
            )
            .add_source(Environment::default().separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    #[serde(default = "GithubConfig::default_api_base")]
    pub api_base: String,
    #[serde(default = "GithubConfig::default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub token: Option<String>,
    /// Serve every read from a canned JSON fixture instead of the network.
    #[serde(default)]
    pub fixture_path: Option<PathBuf>,
}

impl GithubConfig {
    fn default_api_base() -> String {
        "https://api.github.com/".to_string()
    }

    fn default_user_agent() -> String {
        "pr-timeline".to_string()
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: Self::default_api_base(),
            user_agent: Self::default_user_agent(),
            token: None,
            fixture_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "FetchConfig::default_per_page")]
    pub per_page: u32,
    #[serde(default = "FetchConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "FetchConfig::default_use_cache")]
    pub use_cache: bool,
}

impl FetchConfig {
    const fn default_per_page() -> u32 {
        100
    }

    const fn default_timeout_secs() -> u64 {
        120
    }

    const fn default_use_cache() -> bool {
        true
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            per_page: Self::default_per_page(),
            timeout_secs: Self::default_timeout_secs(),
            use_cache: Self::default_use_cache(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "RetryConfig::default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "RetryConfig::default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "RetryConfig::default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "RetryConfig::default_jitter_frac")]
    pub jitter_frac: f32,
}

impl RetryConfig {
    const fn default_max_attempts() -> u32 {
        5
    }

    const fn default_initial_delay_ms() -> u64 {
        500
    }

    const fn default_max_delay_ms() -> u64 {
        60_000
    }

    const fn default_jitter_frac() -> f32 {
        0.2
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            initial_delay_ms: Self::default_initial_delay_ms(),
            max_delay_ms: Self::default_max_delay_ms(),
            jitter_frac: Self::default_jitter_frac(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "CacheConfig::default_dir")]
    pub dir: PathBuf,
    #[serde(default = "CacheConfig::default_retention_days")]
    pub retention_days: u64,
    #[serde(default = "CacheConfig::default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl CacheConfig {
    fn default_dir() -> PathBuf {
        PathBuf::from(".cache/pr-timeline")
    }

    const fn default_retention_days() -> u64 {
        20
    }

    const fn default_sweep_interval_secs() -> u64 {
        3600
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days.saturating_mul(86_400))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: Self::default_dir(),
            retention_days: Self::default_retention_days(),
            sweep_interval_secs: Self::default_sweep_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// One aggregate JSON document.
    #[default]
    Json,
    /// One JSON event per line.
    Events,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_sources() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from_path(dir.path()).unwrap();
        assert_eq!(config.fetch.per_page, 100);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.cache.retention(), Duration::from_secs(20 * 86_400));
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.github.api_base.ends_with('/'));
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("config")).unwrap();
        std::fs::write(
            dir.path().join("config/default.toml"),
            "[fetch]\nper_page = 25\nuse_cache = false\n\n[cache]\nretention_days = 3\n",
        )
        .unwrap();
        let config = AppConfig::load_from_path(dir.path()).unwrap();
        assert_eq!(config.fetch.per_page, 25);
        assert!(!config.fetch.use_cache);
        assert_eq!(config.cache.retention_days, 3);
        assert_eq!(config.retry.initial_delay_ms, 500);
    }
}
