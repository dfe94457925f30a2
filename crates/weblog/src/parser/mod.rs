/// Access-log line parsing and classification module
///
/// This module turns one raw access-log line, written in an
/// administrator-configured format, into a normalized `LogRecord`
/// and routes it to the aggregation collaborators.
///
/// # Architecture
///
/// - `token.rs`: Delimiter/escape-aware field scanner
/// - `url.rs`: Percent-decoding and cleanup
/// - `request.rs`: HTTP request-line splitting
/// - `referrer.rs`: Referring site and search keyphrase extraction
/// - `date.rs`: strptime-style date matching and canonical date keys
/// - `format.rs`: The log-format interpreter (`%h %d %r ...`)
/// - `classify.rs`: Request keys, 404 mapping, static files, unique visitors
/// - `traits.rs`: Collaborator seams (sink, exclusions, line source)
/// - `metrics.rs`: Lock-free run counters
///
/// # Leniency
///
/// Structural fields (date, host, method, protocol, status) fail the line
/// when malformed. Size and timing fields degrade to zero.

pub mod traits;
pub mod model;
pub mod token;
pub mod url;
pub mod request;
pub mod referrer;
pub mod date;
pub mod format;
pub mod classify;
pub mod metrics;

// Re-export commonly used types
pub use model::{IpFamily, LineError, LogRecord};
pub use format::FormatInterpreter;
pub use classify::RecordClassifier;
pub use metrics::{Exclusion, RunCounters, RunSnapshot};

// Constants
pub const REF_SITE_LEN: usize = 512; // Max referring site length (incl. terminator)
pub const VISITOR_KEY_LEN: usize = 2048; // Max unique-visitor key length (incl. terminator)
pub const DATE_KEY_FORMAT: &str = "%Y%m%d";
pub const FORMAT_CHECK_LINES: usize = 20; // Lines read by the validation pass
pub const USECS_PER_SEC: f64 = 1_000_000.0;
