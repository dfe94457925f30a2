use thiserror::Error;
use serde::Serialize;

/// Address family of a validated client host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    /// Classify a textual IP literal. Returns `None` when it is neither
    /// a valid IPv4 nor IPv6 address.
    pub fn of(host: &str) -> Option<Self> {
        match host.parse::<std::net::IpAddr>().ok()? {
            std::net::IpAddr::V4(_) => Some(IpFamily::V4),
            std::net::IpAddr::V6(_) => Some(IpFamily::V6),
        }
    }
}

/// Reasons a single line is rejected.
///
/// These never abort a run: the pipeline counts the line as invalid
/// and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("Empty line")]
    Blank,

    #[error("Comment line")]
    Comment,

    #[error("Nothing to parse")]
    Empty,

    #[error("Specifier %{0} appears more than once")]
    DuplicateSpecifier(char),

    #[error("Whitespace after '%' in log format")]
    MalformedSpecifier,

    #[error("Line ends inside an escape sequence")]
    UnterminatedEscape,

    #[error("Date does not match the date format: {0}")]
    InvalidDate(String),

    #[error("Host is not a valid IPv4/IPv6 address")]
    InvalidHost,

    #[error("Unknown HTTP method")]
    InvalidMethod,

    #[error("Empty request path")]
    EmptyPath,

    #[error("Unsupported HTTP protocol")]
    InvalidProtocol,

    #[error("Status code is not an integer")]
    InvalidStatus,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

/// One parsed access-log line.
///
/// Every field starts out absent and is filled at most once by the
/// format interpreter. The record is an owned value: it lives for the
/// duration of one line and is dropped when the pipeline returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LogRecord {
    /// Raw date token as it appeared in the line
    pub date: Option<String>,

    /// Canonical `YYYYMMDD` form of `date`
    pub date_key: Option<String>,

    /// Client IP, textual
    pub host: Option<String>,
    pub ip_family: Option<IpFamily>,

    pub method: Option<String>,      // GET, POST, etc.
    pub protocol: Option<String>,    // HTTP/1.1
    pub request_path: Option<String>,

    /// Aggregation key derived from the path (plus method/protocol)
    pub request_key: Option<String>,

    /// Numeric status code, kept as text
    pub status: Option<String>,

    pub response_bytes: Option<u64>,

    /// Time taken to serve the request, in microseconds
    pub serve_time: Option<u64>,

    pub agent: Option<String>,
    pub referrer: Option<String>,

    /// Host part of the referrer, empty when there is none
    pub referrer_site: String,
}

impl LogRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Response size, zero when the format carries none
    pub fn bytes(&self) -> u64 {
        self.response_bytes.unwrap_or(0)
    }

    /// Serve time in microseconds, zero when the format carries none
    pub fn serve_usecs(&self) -> u64 {
        self.serve_time.unwrap_or(0)
    }

    pub fn agent_or_default(&self) -> &str {
        self.agent.as_deref().unwrap_or("-")
    }

    /// True for a 4xx status
    pub fn is_client_error(&self) -> bool {
        self.status.as_deref().is_some_and(|s| s.starts_with('4'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_family_detects_v4_and_v6() {
        assert_eq!(IpFamily::of("127.0.0.1"), Some(IpFamily::V4));
        assert_eq!(IpFamily::of("2001:db8::1"), Some(IpFamily::V6));
        assert_eq!(IpFamily::of("example.com"), None);
        assert_eq!(IpFamily::of("300.1.1.1"), None);
    }

    #[test]
    fn test_new_record_is_empty() {
        let record = LogRecord::new();
        assert!(record.host.is_none());
        assert_eq!(record.bytes(), 0);
        assert_eq!(record.serve_usecs(), 0);
        assert_eq!(record.agent_or_default(), "-");
        assert!(record.referrer_site.is_empty());
    }

    #[test]
    fn test_client_error_detection() {
        let mut record = LogRecord::new();
        assert!(!record.is_client_error());
        record.status = Some("404".into());
        assert!(record.is_client_error());
        record.status = Some("200".into());
        assert!(!record.is_client_error());
    }
}
