use std::io;

use serde::Serialize;

pub use super::model::{IpFamily, LineError, LogRecord};

/// Tables a classified record feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Hosts,
    StatusCodes,
    Referrers,
    ReferringSites,
    Keyphrases,
    /// Unique visitors per canonical date key
    VisitorsByDate,
    /// Metered: bytes per date key
    BytesByDate,
    /// Metered: bytes / serve time per request key
    RequestMeta,
    /// Metered: bytes / serve time per host
    HostMeta,
}

/// Request table a record lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestBucket {
    NotFound,
    Static,
    Regular,
}

/// Statistics store fed by the classifier.
pub trait AggregationSink {
    /// Simple hit counter
    fn count(&mut self, table: Table, key: &str);

    /// A request hit under its request key
    fn request(&mut self, bucket: RequestBucket, key: &str, record: &LogRecord);

    /// Metered counter, in bytes
    fn bytes(&mut self, table: Table, key: &str, bytes: u64);

    /// Metered counter, in microseconds
    fn serve_time(&mut self, table: Table, key: &str, usecs: u64);

    /// Called once per unique visitor key in a run (visitors, browsers, OS)
    fn unique_visitor(&mut self, record: &LogRecord);

    /// Agent seen for a host (only when agent listing is enabled)
    fn host_agent(&mut self, host: &str, agent: &str);
}

pub trait IpExclusion {
    fn is_excluded(&self, host: &str) -> bool;
}

pub trait CrawlerClassifier {
    fn is_crawler(&self, agent: &str) -> bool;
}

pub trait ReferrerExclusion {
    fn is_ignored(&self, site: &str) -> bool;
}

/// Source of raw log lines, one at a time
pub trait LineSource {
    /// Next line without its terminator, or `None` at end of input
    fn next_line(&mut self) -> io::Result<Option<String>>;

    /// True when reading a pipe rather than a file
    fn is_streaming(&self) -> bool {
        false
    }
}

/// Exclusion that never matches, for runs without filters
#[derive(Debug, Default, Clone, Copy)]
pub struct NoExclusion;

impl IpExclusion for NoExclusion {
    fn is_excluded(&self, _host: &str) -> bool {
        false
    }
}

impl CrawlerClassifier for NoExclusion {
    fn is_crawler(&self, _agent: &str) -> bool {
        false
    }
}

impl ReferrerExclusion for NoExclusion {
    fn is_ignored(&self, _site: &str) -> bool {
        false
    }
}
