//! Model — ParserConfig, predefined log formats, and config errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parser::date::DateFormat;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No log format was found in the configuration")]
    MissingLogFormat,

    #[error("No date format was found in the configuration")]
    MissingDateFormat,

    #[error("Date format is not understood: {0}")]
    InvalidDateFormat(String),

    #[error("Invalid IP or range in ignore_ips: {0}")]
    InvalidIpRange(String),

    #[error("Invalid referrer pattern {pattern}: {reason}")]
    InvalidReferrerPattern { pattern: String, reason: String },

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Extensions treated as static content by default
pub const DEFAULT_STATIC_FILES: [&str; 34] = [
    ".css", ".CSS", ".dae", ".DAE", ".eot", ".EOT", ".gif", ".GIF", ".ico", ".ICO",
    ".jpeg", ".JPEG", ".jpg", ".JPG", ".js", ".JS", ".map", ".MAP", ".mp3", ".MP3",
    ".pdf", ".PDF", ".png", ".PNG", ".svg", ".SVG", ".swf", ".SWF", ".ttf", ".TTF",
    ".txt", ".TXT", ".woff", ".WOFF",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Log-format pattern, or the name of a preset (`combined`, `w3c`, ...)
    pub log_format: String,
    pub date_format: String,
    /// Log file to read; stdin when unset
    pub log_file: Option<String>,

    /// Percent-decode URLs twice
    pub double_decode: bool,
    /// Prefix request keys with the HTTP method
    pub append_method: bool,
    /// Prefix request keys with the HTTP protocol
    pub append_protocol: bool,
    /// Strip `?query` from request paths
    pub ignore_query_string: bool,
    /// Count nginx's 444 as a 404
    pub code444_as_404: bool,
    /// Let 4xx responses count towards unique visitors
    pub client_err_to_unique_count: bool,

    pub static_files: Vec<String>,
    /// Paths shorter than this are never static
    pub static_file_min_len: usize,

    /// IPs, CIDR blocks or `start-end` ranges to leave out
    pub ignore_ips: Vec<String>,
    pub ignore_crawlers: bool,
    /// Glob patterns matched against the referring site
    pub ignore_referers: Vec<String>,
    /// Keep the list of agents seen per host
    pub list_agents: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            log_format: String::new(),
            date_format: String::new(),
            log_file: None,
            double_decode: false,
            append_method: false,
            append_protocol: false,
            ignore_query_string: false,
            code444_as_404: false,
            client_err_to_unique_count: false,
            static_files: DEFAULT_STATIC_FILES.iter().map(|s| s.to_string()).collect(),
            static_file_min_len: DEFAULT_STATIC_FILES.iter().map(|s| s.len()).max().unwrap_or(0),
            ignore_ips: Vec::new(),
            ignore_crawlers: false,
            ignore_referers: Vec::new(),
            list_agents: false,
        }
    }
}

impl ParserConfig {
    /// Config with explicit formats and everything else defaulted
    pub fn with_formats(log_format: &str, date_format: &str) -> Self {
        Self {
            log_format: log_format.to_string(),
            date_format: date_format.to_string(),
            ..Default::default()
        }
    }

    /// Replace a preset name in `log_format` by its pattern. The preset's
    /// date format is used only when none is configured.
    pub fn apply_preset(&mut self) {
        if let Some(preset) = LogFormatPreset::from_name(&self.log_format) {
            self.log_format = preset.log_format().to_string();
            if self.date_format.trim().is_empty() {
                self.date_format = preset.date_format().to_string();
            }
        }
    }

    /// Validate the parts a run cannot start without
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_format.is_empty() {
            return Err(ConfigError::MissingLogFormat);
        }
        if self.date_format.is_empty() {
            return Err(ConfigError::MissingDateFormat);
        }
        if !DateFormat::new(&self.date_format).is_well_formed() {
            return Err(ConfigError::InvalidDateFormat(self.date_format.clone()));
        }
        Ok(())
    }
}

/// Well-known access-log layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormatPreset {
    /// NCSA Combined Log Format
    Combined,
    /// Combined with a leading virtual host
    VCombined,
    /// NCSA Common Log Format
    Common,
    /// Common with a leading virtual host
    VCommon,
    /// W3C extended (IIS)
    W3c,
    /// Amazon CloudFront web distribution
    CloudFront,
}

impl LogFormatPreset {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "combined" => Some(Self::Combined),
            "vcombined" => Some(Self::VCombined),
            "common" => Some(Self::Common),
            "vcommon" => Some(Self::VCommon),
            "w3c" => Some(Self::W3c),
            "cloudfront" => Some(Self::CloudFront),
            _ => None,
        }
    }

    pub fn log_format(&self) -> &'static str {
        match self {
            Self::Combined => r#"%h %^[%d:%^] "%r" %s %b "%R" "%u""#,
            Self::VCombined => r#"%^:%^ %h %^[%d:%^] "%r" %s %b "%R" "%u""#,
            Self::Common => r#"%h %^[%d:%^] "%r" %s %b"#,
            Self::VCommon => r#"%^:%^ %h %^[%d:%^] "%r" %s %b"#,
            Self::W3c => "%d %^ %h %^ %^ %^ %^ %r %^ %s %b %^ %^ %u %R",
            Self::CloudFront => "%d\t%^\t%^\t%b\t%h\t%m\t%^\t%r\t%s\t%R\t%u\t%^",
        }
    }

    pub fn date_format(&self) -> &'static str {
        match self {
            Self::Combined | Self::VCombined | Self::Common | Self::VCommon => "%d/%b/%Y",
            Self::W3c | Self::CloudFront => "%Y-%m-%d",
        }
    }
}
