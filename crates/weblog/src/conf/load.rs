//! Load — config loading from file and environment variables.

use std::path::Path;
use std::fs::File;
use std::io::Read;

use super::model::{ConfigError, ParserConfig};

const DEFAULT_CONFIG_PATH: &str = "/etc/weblog/weblog.toml";

impl ParserConfig {
    /// Load configuration from file or environment variables
    /// Priority: Environment Variables > Config File > Defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("WEBLOG_CONFIG_FILE")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut config = if Path::new(&config_path).exists() {
            tracing::info!("Loading configuration from: {}", config_path);
            Self::from_file(&config_path)?
        } else {
            tracing::info!("Config file not found at {}, using environment variables", config_path);
            Self::from_env()
        };

        // Environment variables override file config for the formats and input
        if let Ok(format) = std::env::var("WEBLOG_LOG_FORMAT") {
            config.log_format = format;
        }
        if let Ok(format) = std::env::var("WEBLOG_DATE_FORMAT") {
            config.date_format = format;
        }
        if let Ok(file) = std::env::var("WEBLOG_LOG_FILE") {
            config.log_file = Some(file);
        }

        config.apply_preset();
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: ParserConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let flag = |name: &str| {
            std::env::var(name)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false)
        };
        let list = |name: &str| -> Vec<String> {
            std::env::var(name)
                .map(|s| {
                    s.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default()
        };

        Self {
            log_format: std::env::var("WEBLOG_LOG_FORMAT").unwrap_or_default(),
            date_format: std::env::var("WEBLOG_DATE_FORMAT").unwrap_or_default(),
            log_file: std::env::var("WEBLOG_LOG_FILE").ok(),
            double_decode: flag("WEBLOG_DOUBLE_DECODE"),
            append_method: flag("WEBLOG_APPEND_METHOD"),
            append_protocol: flag("WEBLOG_APPEND_PROTOCOL"),
            ignore_query_string: flag("WEBLOG_IGNORE_QUERY_STRING"),
            code444_as_404: flag("WEBLOG_444_AS_404"),
            client_err_to_unique_count: flag("WEBLOG_4XX_TO_UNIQUE_COUNT"),
            ignore_ips: list("WEBLOG_IGNORE_IPS"),
            ignore_crawlers: flag("WEBLOG_IGNORE_CRAWLERS"),
            ignore_referers: list("WEBLOG_IGNORE_REFERERS"),
            list_agents: flag("WEBLOG_LIST_AGENTS"),
            ..Default::default()
        }
    }
}
