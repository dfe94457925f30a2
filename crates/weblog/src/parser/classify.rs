//! Classify — request keys, not-found mapping, static files and unique
//! visitors, then dispatch of a record to the aggregation sink.

use std::collections::HashSet;

use super::model::LogRecord;
use super::traits::{AggregationSink, RequestBucket, Table};
use super::{referrer, url, VISITOR_KEY_LEN};
use crate::conf::ParserConfig;

/// Routes normalized records to an `AggregationSink`.
///
/// Holds the set of visitor keys seen so far in the run, so one
/// classifier must be used per run.
#[derive(Debug, Clone)]
pub struct RecordClassifier {
    code444_as_404: bool,
    ignore_query_string: bool,
    append_method: bool,
    append_protocol: bool,
    double_decode: bool,
    client_err_to_unique_count: bool,
    list_agents: bool,
    static_files: Vec<String>,
    static_file_min_len: usize,
    seen_visitors: HashSet<String>,
}

impl RecordClassifier {
    pub fn new(config: &ParserConfig) -> Self {
        Self {
            code444_as_404: config.code444_as_404,
            ignore_query_string: config.ignore_query_string,
            append_method: config.append_method,
            append_protocol: config.append_protocol,
            double_decode: config.double_decode,
            client_err_to_unique_count: config.client_err_to_unique_count,
            list_agents: config.list_agents,
            static_files: config.static_files.clone(),
            static_file_min_len: config.static_file_min_len,
            seen_visitors: HashSet::new(),
        }
    }

    /// Number of distinct visitor keys seen in this run
    pub fn unique_visitors(&self) -> usize {
        self.seen_visitors.len()
    }

    pub fn is_not_found(&self, record: &LogRecord) -> bool {
        match record.status.as_deref() {
            Some("404") => true,
            Some("444") => self.code444_as_404,
            _ => false,
        }
    }

    pub fn is_static(&self, path: &str) -> bool {
        path.len() >= self.static_file_min_len
            && self.static_files.iter().any(|ext| path.ends_with(ext.as_str()))
    }

    /// Request key for `path`, prefixed with method and protocol when
    /// configured. Prefixed keys carry no blanks; an empty path gets no
    /// prefix.
    pub fn request_key(&self, path: &str, record: &LogRecord) -> String {
        let mut key = path.to_string();
        if self.append_method && !key.is_empty() {
            if let Some(method) = &record.method {
                key = format!("{} {}", method.to_ascii_uppercase(), key);
            }
        }
        if self.append_protocol && !key.is_empty() {
            if let Some(protocol) = &record.protocol {
                key = format!("{} {}", protocol.to_ascii_uppercase(), key);
            }
        }
        if self.append_method || self.append_protocol {
            key = deblank(&key);
        }
        key
    }

    fn counts_as_visitor(&self, record: &LogRecord) -> bool {
        !record.is_client_error() || self.client_err_to_unique_count
    }

    /// Classify one record and feed every table it belongs to.
    pub fn classify<S>(&mut self, record: &mut LogRecord, sink: &mut S)
    where
        S: AggregationSink + ?Sized,
    {
        let not_found = self.is_not_found(record);

        let mut path = record.request_path.clone().unwrap_or_default();
        if !not_found && self.ignore_query_string {
            if let Some(q) = path.find('?').filter(|&q| q > 0) {
                path.truncate(q);
            }
        }

        let bucket = if not_found {
            RequestBucket::NotFound
        } else if self.is_static(&path) {
            RequestBucket::Static
        } else {
            RequestBucket::Regular
        };

        let key = self.request_key(&path, record);
        record.request_path = Some(path);
        record.method = record.method.take().map(|m| m.to_ascii_uppercase());
        record.protocol = record.protocol.take().map(|p| p.to_ascii_uppercase());
        record.request_key = Some(key.clone());

        let record: &LogRecord = record;
        let date_key = record.date_key.as_deref().unwrap_or_default();
        let host = record.host.as_deref().unwrap_or_default();

        if self.counts_as_visitor(record) && self.seen_visitors.insert(visitor_key(record)) {
            sink.count(Table::VisitorsByDate, date_key);
            sink.unique_visitor(record);
        }

        if self.list_agents {
            sink.host_agent(host, record.agent_or_default());
        }

        if let Some(status) = &record.status {
            sink.count(Table::StatusCodes, status);
        }

        sink.request(bucket, &key, record);

        if !record.referrer_site.is_empty() {
            sink.count(Table::ReferringSites, &record.referrer_site);
        }
        if let Some(referrer) = &record.referrer {
            if let Some(phrase) = referrer::extract_keyphrase(referrer, self.double_decode) {
                sink.count(Table::Keyphrases, &phrase);
            }
            if let Some(decoded) = url::decode(referrer, self.double_decode) {
                sink.count(Table::Referrers, &decoded);
            }
        }

        sink.count(Table::Hosts, host);

        // metered tables are fed even when the format has no size or time field
        let bytes = record.bytes();
        sink.bytes(Table::BytesByDate, date_key, bytes);
        sink.bytes(Table::RequestMeta, &key, bytes);
        sink.bytes(Table::HostMeta, host, bytes);

        let usecs = record.serve_usecs();
        sink.serve_time(Table::RequestMeta, &key, usecs);
        sink.serve_time(Table::HostMeta, host, usecs);
    }
}

/// Remove every space.
pub fn deblank(text: &str) -> String {
    text.chars().filter(|&c| c != ' ').collect()
}

/// `host|date_key|agent`, agent without blanks, capped below
/// `VISITOR_KEY_LEN` bytes.
pub fn visitor_key(record: &LogRecord) -> String {
    let mut key = format!(
        "{}|{}|{}",
        record.host.as_deref().unwrap_or_default(),
        record.date_key.as_deref().unwrap_or_default(),
        deblank(record.agent_or_default()),
    );
    let max = VISITOR_KEY_LEN - 1;
    if key.len() > max {
        let mut end = max;
        while !key.is_char_boundary(end) {
            end -= 1;
        }
        key.truncate(end);
    }
    key
}
