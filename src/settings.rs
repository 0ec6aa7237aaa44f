use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use reqwest::Url;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::render::webdriver::DriverOptions;
use crate::retriever::RetryPolicy;

const DEFAULT_CONFIG: &str = "magnet_scraper";
const ENV_PREFIX: &str = "MAGNET_SCRAPER";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                                  (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub input: PathBuf,
    pub output: PathBuf,
    pub index: PathBuf,
    pub batch_size: usize,
    pub max_attempts: u32,
    pub webdriver_url: String,
    pub chromedriver: Option<PathBuf>,
    pub headless: bool,
    pub user_agent: String,
    pub gate_timeout_secs: u64,
    pub marker_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub backoff_base_secs: u64,
    pub log_file: Option<PathBuf>,
}

/// Values taken from the command line; they win over file and environment.
#[derive(Debug, Default)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub index: Option<PathBuf>,
    pub batch_size: Option<usize>,
    pub max_attempts: Option<u32>,
}

fn path_value(p: &Option<PathBuf>) -> Option<String> {
    p.as_deref().map(|p| p.to_string_lossy().into_owned())
}

impl Settings {
    /// Defaults, then `magnet_scraper.toml` (or `--config`), then
    /// `MAGNET_SCRAPER_*` variables, then CLI flags.
    pub fn load(overrides: &Overrides) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("input", "input.csv")?
            .set_default("output", "output.csv")?
            .set_default("index", "url_index.csv")?
            .set_default("batch_size", 1_i64)?
            .set_default("max_attempts", 3_i64)?
            .set_default("webdriver_url", "http://127.0.0.1:9515")?
            .set_default("headless", true)?
            .set_default("user_agent", DEFAULT_USER_AGENT)?
            .set_default("gate_timeout_secs", 10_i64)?
            .set_default("marker_timeout_secs", 15_i64)?
            .set_default("poll_interval_ms", 1000_i64)?
            .set_default("request_timeout_secs", 60_i64)?
            .set_default("backoff_base_secs", 1_i64)?
            .set_default("log_file", "crawler.log")?;

        builder = match &overrides.config_file {
            Some(path) => builder.add_source(File::from(path.as_path()).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG).required(false)),
        };

        let settings: Settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .set_override_option("input", path_value(&overrides.input))?
            .set_override_option("output", path_value(&overrides.output))?
            .set_override_option("index", path_value(&overrides.index))?
            .set_override_option("batch_size", overrides.batch_size.map(|n| n as i64))?
            .set_override_option("max_attempts", overrides.max_attempts.map(i64::from))?
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid { key: "batch_size", reason: "must be at least 1".into() });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid { key: "max_attempts", reason: "must be at least 1".into() });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid { key: "poll_interval_ms", reason: "must be positive".into() });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid { key: "request_timeout_secs", reason: "must be positive".into() });
        }
        Url::parse(&self.webdriver_url)
            .map_err(|e| ConfigError::Invalid { key: "webdriver_url", reason: e.to_string() })?;
        Ok(())
    }

    /// Configured log file, unless disabled with an empty value.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_file.as_deref().filter(|p| !p.as_os_str().is_empty())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff_base: Duration::from_secs(self.backoff_base_secs),
            gate_timeout: Duration::from_secs(self.gate_timeout_secs),
            marker_timeout: Duration::from_secs(self.marker_timeout_secs),
        }
    }

    pub fn driver_options(&self) -> DriverOptions {
        DriverOptions {
            webdriver_url: self.webdriver_url.clone(),
            headless: self.headless,
            user_agent: self.user_agent.clone(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}
