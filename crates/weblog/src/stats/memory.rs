//! Memory — `AggregationSink` backed by hash maps, with a serializable
//! top-N summary.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use woothee::parser::Parser;

use crate::parser::traits::{AggregationSink, RequestBucket, Table};
use crate::parser::{LogRecord, RunSnapshot};

const UNKNOWN: &str = "Unknown";

/// Hits of one request key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestHits {
    pub hits: u64,
    pub method: Option<String>,
    pub protocol: Option<String>,
}

pub struct MemorySink {
    counts: HashMap<Table, HashMap<String, u64>>,
    requests: HashMap<RequestBucket, HashMap<String, RequestHits>>,
    bytes: HashMap<Table, HashMap<String, u64>>,
    serve_time: HashMap<Table, HashMap<String, u64>>,
    browsers: HashMap<String, u64>,
    operating_systems: HashMap<String, u64>,
    host_agents: HashMap<String, BTreeSet<String>>,
    unique_visitors: u64,
    ua: Parser,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
            requests: HashMap::new(),
            bytes: HashMap::new(),
            serve_time: HashMap::new(),
            browsers: HashMap::new(),
            operating_systems: HashMap::new(),
            host_agents: HashMap::new(),
            unique_visitors: 0,
            ua: Parser::new(),
        }
    }

    pub fn count_of(&self, table: Table, key: &str) -> u64 {
        lookup(&self.counts, &table, key)
    }

    pub fn hits_of(&self, bucket: RequestBucket, key: &str) -> u64 {
        self.requests
            .get(&bucket)
            .and_then(|t| t.get(key))
            .map_or(0, |r| r.hits)
    }

    pub fn bytes_of(&self, table: Table, key: &str) -> u64 {
        lookup(&self.bytes, &table, key)
    }

    pub fn serve_time_of(&self, table: Table, key: &str) -> u64 {
        lookup(&self.serve_time, &table, key)
    }

    pub fn unique_visitors(&self) -> u64 {
        self.unique_visitors
    }

    pub fn browser_count(&self, name: &str) -> u64 {
        self.browsers.get(name).copied().unwrap_or(0)
    }

    pub fn os_count(&self, name: &str) -> u64 {
        self.operating_systems.get(name).copied().unwrap_or(0)
    }

    pub fn agents_of(&self, host: &str) -> Vec<&str> {
        self.host_agents
            .get(host)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Top `top` entries of every table, most hits first.
    pub fn summary(&self, run: RunSnapshot, top: usize) -> Summary {
        let mut counters = BTreeMap::new();
        for (table, entries) in &self.counts {
            counters.insert(*table, top_entries(entries.iter().map(|(k, v)| (k, *v)), top));
        }

        let mut requests = BTreeMap::new();
        for (bucket, entries) in &self.requests {
            let rows = top_entries(entries.iter().map(|(k, v)| (k, v.hits)), top)
                .into_iter()
                .map(|mut row| {
                    row.bytes = self.bytes_of(Table::RequestMeta, &row.key);
                    row.serve_usecs = self.serve_time_of(Table::RequestMeta, &row.key);
                    row
                })
                .collect();
            requests.insert(*bucket, rows);
        }

        Summary {
            run,
            unique_visitors: self.unique_visitors,
            counters,
            requests,
            browsers: top_entries(self.browsers.iter().map(|(k, v)| (k, *v)), top),
            operating_systems: top_entries(
                self.operating_systems.iter().map(|(k, v)| (k, *v)),
                top,
            ),
        }
    }
}

impl AggregationSink for MemorySink {
    fn count(&mut self, table: Table, key: &str) {
        bump(self.counts.entry(table).or_default(), key, 1);
    }

    fn request(&mut self, bucket: RequestBucket, key: &str, record: &LogRecord) {
        let hits = self
            .requests
            .entry(bucket)
            .or_default()
            .entry(key.to_string())
            .or_default();
        hits.hits += 1;
        if hits.method.is_none() {
            hits.method = record.method.clone();
        }
        if hits.protocol.is_none() {
            hits.protocol = record.protocol.clone();
        }
    }

    fn bytes(&mut self, table: Table, key: &str, bytes: u64) {
        bump(self.bytes.entry(table).or_default(), key, bytes);
    }

    fn serve_time(&mut self, table: Table, key: &str, usecs: u64) {
        bump(self.serve_time.entry(table).or_default(), key, usecs);
    }

    fn unique_visitor(&mut self, record: &LogRecord) {
        self.unique_visitors += 1;

        let (browser, os) = match self.ua.parse(record.agent_or_default()) {
            Some(ua) => (ua.name.to_string(), ua.os.to_string()),
            None => (UNKNOWN.to_string(), UNKNOWN.to_string()),
        };
        bump(&mut self.browsers, &browser, 1);
        bump(&mut self.operating_systems, &os, 1);
    }

    fn host_agent(&mut self, host: &str, agent: &str) {
        self.host_agents
            .entry(host.to_string())
            .or_default()
            .insert(agent.to_string());
    }
}

/// Run counters plus the busiest entries of each table.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub run: RunSnapshot,
    pub unique_visitors: u64,
    pub counters: BTreeMap<Table, Vec<SummaryEntry>>,
    pub requests: BTreeMap<RequestBucket, Vec<SummaryEntry>>,
    pub browsers: Vec<SummaryEntry>,
    pub operating_systems: Vec<SummaryEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryEntry {
    pub key: String,
    pub hits: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub bytes: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub serve_usecs: u64,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

fn bump(table: &mut HashMap<String, u64>, key: &str, by: u64) {
    match table.get_mut(key) {
        Some(v) => *v = v.saturating_add(by),
        None => {
            table.insert(key.to_string(), by);
        }
    }
}

fn lookup<K: std::hash::Hash + Eq>(
    tables: &HashMap<K, HashMap<String, u64>>,
    table: &K,
    key: &str,
) -> u64 {
    tables.get(table).and_then(|t| t.get(key)).copied().unwrap_or(0)
}

/// Sort by hits descending, then key, and keep `top`.
fn top_entries<'a, I>(entries: I, top: usize) -> Vec<SummaryEntry>
where
    I: Iterator<Item = (&'a String, u64)>,
{
    let mut rows: Vec<_> = entries.collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    rows.into_iter()
        .take(top)
        .map(|(key, hits)| SummaryEntry {
            key: key.clone(),
            hits,
            bytes: 0,
            serve_usecs: 0,
        })
        .collect()
}
