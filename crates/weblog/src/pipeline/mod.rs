//! Pipeline — drives raw log lines through extraction, exclusion and
//! classification, and keeps the run counters.
//!
//! ```text
//! line → validate → count → extract → required fields → [check stops]
//!      → date key → ip / crawler / referrer exclusion → bytes → classify
//! ```

pub mod source;

use std::io;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::conf::{ConfigError, ParserConfig};
use crate::filter::Filters;
use crate::parser::traits::{AggregationSink, LineSource};
use crate::parser::{
    Exclusion, FormatInterpreter, LineError, LogRecord, RecordClassifier, RunCounters,
    RunSnapshot, FORMAT_CHECK_LINES,
};

pub use source::ReaderSource;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Unable to open the log file {path}: {source}")]
    SourceUnreadable {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Error while reading the log: {0}")]
    Read(#[from] io::Error),
}

/// What happened to one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// Counted as invalid
    Invalid(LineError),
    /// Extracted during a format check; not classified
    Checked,
    /// Well-formed but left out of the statistics
    Excluded(Exclusion),
    /// Classified and fed to the sink
    Processed,
}

/// Result of the validation pass over the first lines of a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatCheck {
    Valid(RunSnapshot),
    /// Nothing processed, or every processed line was invalid
    LikelyInvalid(RunSnapshot),
}

impl FormatCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, FormatCheck::Valid(_))
    }
}

pub struct Pipeline {
    config: ParserConfig,
    interpreter: FormatInterpreter,
    classifier: RecordClassifier,
    filters: Filters,
    counters: Arc<RunCounters>,
}

impl Pipeline {
    /// Build a pipeline with no exclusion filters. A preset name in
    /// `log_format` is expanded; empty formats are rejected.
    pub fn new(mut config: ParserConfig) -> Result<Self, PipelineError> {
        config.apply_preset();
        config.validate()?;

        Ok(Self {
            interpreter: FormatInterpreter::new(&config),
            classifier: RecordClassifier::new(&config),
            filters: Filters::default(),
            counters: Arc::new(RunCounters::new()),
            config,
        })
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Shared handle on the run counters, for progress reporting.
    pub fn counters(&self) -> Arc<RunCounters> {
        Arc::clone(&self.counters)
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.counters.snapshot()
    }

    /// Process a single line (e.g. a tailed line) into `sink`.
    pub fn process_line<S>(&mut self, line: &str, sink: &mut S) -> LineOutcome
    where
        S: AggregationSink + ?Sized,
    {
        let mut record = match self.extract(line, &self.counters) {
            Ok(record) => record,
            Err(e) => return LineOutcome::Invalid(e),
        };

        let date = record.date.as_deref().unwrap_or_default();
        match self.interpreter.date_format().canonical_key(date) {
            Ok(key) => record.date_key = Some(key),
            Err(e) => {
                trace!("Rejected line, no date key: {}", e);
                self.counters.record_invalid();
                return LineOutcome::Invalid(e);
            }
        }

        if let Some(reason) = self.exclusion(&record) {
            debug!(
                "Excluded line from {} ({:?})",
                record.host.as_deref().unwrap_or_default(),
                reason
            );
            self.counters.record_excluded(reason);
            return LineOutcome::Excluded(reason);
        }

        if record.response_bytes.is_some() {
            self.counters.mark_bandwidth();
        }
        if record.serve_time.is_some() {
            self.counters.mark_serve_time();
        }
        self.counters.add_bytes(record.bytes());

        self.classifier.classify(&mut record, sink);
        LineOutcome::Processed
    }

    /// Read `source` to the end, or until `limit` lines were read.
    pub fn run<L, S>(
        &mut self,
        source: &mut L,
        sink: &mut S,
        limit: Option<usize>,
    ) -> Result<RunSnapshot, PipelineError>
    where
        L: LineSource + ?Sized,
        S: AggregationSink + ?Sized,
    {
        self.counters.reset();
        self.counters.set_streaming(source.is_streaming());
        info!(
            "Parsing {}",
            self.config.log_file.as_deref().unwrap_or("standard input")
        );

        let mut read = 0usize;
        while limit.map_or(true, |n| read < n) {
            let Some(line) = source.next_line()? else {
                break;
            };
            read += 1;
            self.process_line(&line, sink);
        }

        let snap = self.snapshot();
        info!(
            "Parsed {} lines: {} valid, {} invalid, {} excluded by IP",
            snap.processed,
            snap.valid(),
            snap.invalid,
            snap.excluded_ip
        );
        Ok(snap)
    }

    /// Extract the first `FORMAT_CHECK_LINES` lines of `source` without
    /// classifying them, using counters of its own.
    pub fn check_format<L>(&self, source: &mut L) -> Result<FormatCheck, PipelineError>
    where
        L: LineSource + ?Sized,
    {
        let counters = RunCounters::new();
        let mut checked = 0usize;
        for _ in 0..FORMAT_CHECK_LINES {
            let Some(line) = source.next_line()? else {
                break;
            };
            if self.check_line(&line, &counters) == LineOutcome::Checked {
                checked += 1;
            }
        }

        let snap = counters.snapshot();
        if snap.format_likely_invalid() {
            warn!(
                "Log format looks wrong: {} of {} checked lines invalid",
                snap.invalid, snap.processed
            );
            return Ok(FormatCheck::LikelyInvalid(snap));
        }
        debug!(
            "Log format check passed ({} of {} lines extracted)",
            checked, snap.processed
        );
        Ok(FormatCheck::Valid(snap))
    }

    /// Validation-pass handling of one line: extraction only.
    fn check_line(&self, line: &str, counters: &RunCounters) -> LineOutcome {
        match self.extract(line, counters) {
            Ok(_) => LineOutcome::Checked,
            Err(e) => LineOutcome::Invalid(e),
        }
    }

    /// Validate, count and extract one line.
    fn extract(&self, line: &str, counters: &RunCounters) -> Result<LogRecord, LineError> {
        if let Err(e) = validate_line(line) {
            trace!("Skipped line: {}", e);
            counters.record_invalid();
            return Err(e);
        }

        counters.record_processed();
        let result = self.interpreter.interpret(line).and_then(require_fields);
        if let Err(e) = &result {
            trace!("Rejected line: {}", e);
            counters.record_invalid();
        }
        result
    }

    fn exclusion(&self, record: &LogRecord) -> Option<Exclusion> {
        let host = record.host.as_deref().unwrap_or_default();
        if self.filters.ip.is_excluded(host) {
            return Some(Exclusion::IpRange);
        }
        if self.config.ignore_crawlers
            && self.filters.crawler.is_crawler(record.agent_or_default())
        {
            return Some(Exclusion::Crawler);
        }
        if self.filters.referrer.is_ignored(&record.referrer_site) {
            return Some(Exclusion::ReferrerSite);
        }
        None
    }
}

/// Open the configured log file, or stdin when none is set.
pub fn open_source(config: &ParserConfig) -> Result<Box<dyn LineSource>, PipelineError> {
    match &config.log_file {
        Some(path) => match ReaderSource::open(path) {
            Ok(src) => Ok(Box::new(src)),
            Err(source) => Err(PipelineError::SourceUnreadable {
                path: path.clone(),
                source,
            }),
        },
        None => Ok(Box::new(ReaderSource::stdin())),
    }
}

/// Parse the configured log source into `sink`.
pub fn parse_log<S>(
    pipeline: &mut Pipeline,
    sink: &mut S,
    limit: Option<usize>,
) -> Result<RunSnapshot, PipelineError>
where
    S: AggregationSink + ?Sized,
{
    let mut source = open_source(pipeline.config())?;
    pipeline.run(source.as_mut(), sink, limit)
}

fn validate_line(line: &str) -> Result<(), LineError> {
    if line.is_empty() || line == "\n" {
        return Err(LineError::Blank);
    }
    if line.starts_with('#') {
        return Err(LineError::Comment);
    }
    Ok(())
}

fn require_fields(mut record: LogRecord) -> Result<LogRecord, LineError> {
    if record.host.is_none() {
        return Err(LineError::MissingField("host"));
    }
    if record.date.is_none() {
        return Err(LineError::MissingField("date"));
    }
    if record.request_path.is_none() {
        return Err(LineError::MissingField("request"));
    }
    if record.agent.is_none() {
        record.agent = Some("-".to_string());
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::classify::tests::{Event, RecordingSink};
    use crate::parser::traits::{CrawlerClassifier, IpExclusion, RequestBucket, Table};
    use std::io::{Cursor, Write};

    const LINE: &str = r#"93.180.71.3 - - [17/May/2015:08:05:32 +0000] "GET /downloads/product_1 HTTP/1.1" 304 120 "-" "Debian APT-HTTP/1.3 (0.8.16~exp12ubuntu10.21)""#;

    fn combined() -> ParserConfig {
        ParserConfig::with_formats("combined", "")
    }

    fn pipeline(config: ParserConfig) -> Pipeline {
        Pipeline::new(config).unwrap()
    }

    fn source(lines: &[&str]) -> ReaderSource<Cursor<String>> {
        ReaderSource::new(Cursor::new(lines.join("\n")))
    }

    struct BlockAll;

    impl IpExclusion for BlockAll {
        fn is_excluded(&self, _host: &str) -> bool {
            true
        }
    }

    impl CrawlerClassifier for BlockAll {
        fn is_crawler(&self, _agent: &str) -> bool {
            true
        }
    }

    // ── Construction ─────────────────────────────────────────────

    #[test]
    fn test_new_rejects_missing_formats() {
        let err = Pipeline::new(ParserConfig::default()).err().unwrap();
        assert!(matches!(err, PipelineError::Config(ConfigError::MissingLogFormat)));

        let err = Pipeline::new(ParserConfig::with_formats("%h %d", "")).err().unwrap();
        assert!(matches!(err, PipelineError::Config(ConfigError::MissingDateFormat)));
    }

    #[test]
    fn test_new_expands_preset() {
        let p = pipeline(combined());
        assert!(p.config().log_format.starts_with("%h"));
        assert_eq!(p.config().date_format, "%d/%b/%Y");
    }

    // ── Single lines ─────────────────────────────────────────────

    #[test]
    fn test_combined_line_processed() {
        let mut p = pipeline(combined());
        let mut sink = RecordingSink::default();
        assert_eq!(p.process_line(LINE, &mut sink), LineOutcome::Processed);

        assert_eq!(
            sink.requests(),
            vec![(RequestBucket::Regular, "/downloads/product_1".to_string())]
        );
        assert_eq!(sink.counts(Table::StatusCodes), vec!["304".to_string()]);
        assert!(sink
            .events
            .contains(&Event::Bytes(Table::BytesByDate, "20150517".into(), 120)));

        let snap = p.snapshot();
        assert_eq!(snap.processed, 1);
        assert_eq!(snap.invalid, 0);
        assert_eq!(snap.total_bytes, 120);
        assert!(snap.has_bandwidth);
        assert!(!snap.has_serve_time);
    }

    #[test]
    fn test_blank_and_comment_lines_are_invalid() {
        let mut p = pipeline(combined());
        let mut sink = RecordingSink::default();
        assert_eq!(p.process_line("", &mut sink), LineOutcome::Invalid(LineError::Blank));
        assert_eq!(
            p.process_line("#Fields: date time", &mut sink),
            LineOutcome::Invalid(LineError::Comment)
        );

        let snap = p.snapshot();
        assert_eq!(snap.processed, 0, "Skipped before counting");
        assert_eq!(snap.invalid, 2);
        assert!(sink.events.is_empty());
    }

    #[test]
    fn test_missing_required_field() {
        let mut p = pipeline(ParserConfig::with_formats("%h %s", "%d/%b/%Y"));
        let outcome = p.process_line("1.1.1.1 200", &mut RecordingSink::default());
        assert_eq!(outcome, LineOutcome::Invalid(LineError::MissingField("date")));
        assert_eq!(p.snapshot().processed, 1);
        assert_eq!(p.snapshot().invalid, 1);
    }

    #[test]
    fn test_bad_status_is_invalid() {
        let mut p = pipeline(ParserConfig::with_formats("common", ""));
        let line = r#"1.1.1.1 - - [10/Oct/2000:13:55:36 -0700] "GET / HTTP/1.0" abc 10"#;
        let outcome = p.process_line(line, &mut RecordingSink::default());
        assert_eq!(outcome, LineOutcome::Invalid(LineError::InvalidStatus));
        assert_eq!(p.snapshot().total_bytes, 0);
    }

    #[test]
    fn test_query_string_stripped_from_key() {
        let mut config = ParserConfig::with_formats("common", "");
        config.ignore_query_string = true;
        let mut p = pipeline(config);
        let mut sink = RecordingSink::default();
        let line = r#"1.1.1.1 - - [10/Oct/2000:13:55:36 -0700] "GET /a?x=1 HTTP/1.1" 200 10"#;
        p.process_line(line, &mut sink);
        assert_eq!(sink.requests(), vec![(RequestBucket::Regular, "/a".to_string())]);
    }

    #[test]
    fn test_444_not_found_option() {
        let line = r#"1.1.1.1 - - [10/Oct/2000:13:55:36 -0700] "GET /x HTTP/1.1" 444 0"#;

        let mut sink = RecordingSink::default();
        pipeline(ParserConfig::with_formats("common", "")).process_line(line, &mut sink);
        let mut config = ParserConfig::with_formats("common", "");
        config.code444_as_404 = true;
        pipeline(config).process_line(line, &mut sink);

        let buckets: Vec<_> = sink.requests().into_iter().map(|(b, _)| b).collect();
        assert_eq!(buckets, vec![RequestBucket::Regular, RequestBucket::NotFound]);
    }

    #[test]
    fn test_format_without_size_still_meters() {
        let mut p = pipeline(ParserConfig::with_formats(r#"%h %^[%d:%^] "%r" %s"#, "%d/%b/%Y"));
        let mut sink = RecordingSink::default();
        let line = r#"1.1.1.1 - - [10/Oct/2000:13:55:36 -0700] "GET /a HTTP/1.1" 200"#;
        assert_eq!(p.process_line(line, &mut sink), LineOutcome::Processed);

        let metered: Vec<_> = sink
            .events
            .iter()
            .filter(|e| matches!(e, Event::Bytes(..) | Event::ServeTime(..)))
            .cloned()
            .collect();
        assert_eq!(
            metered,
            vec![
                Event::Bytes(Table::BytesByDate, "20001010".into(), 0),
                Event::Bytes(Table::RequestMeta, "/a".into(), 0),
                Event::Bytes(Table::HostMeta, "1.1.1.1".into(), 0),
                Event::ServeTime(Table::RequestMeta, "/a".into(), 0),
                Event::ServeTime(Table::HostMeta, "1.1.1.1".into(), 0),
            ]
        );
        assert!(!p.snapshot().has_bandwidth, "No size field was seen");
    }

    #[test]
    fn test_unique_visitor_once_per_run() {
        let mut p = pipeline(combined());
        let mut sink = RecordingSink::default();
        for _ in 0..3 {
            p.process_line(LINE, &mut sink);
        }
        let visitors = sink.events.iter().filter(|e| matches!(e, Event::Visitor(_))).count();
        assert_eq!(visitors, 1);
    }

    // ── Exclusions ───────────────────────────────────────────────

    #[test]
    fn test_ip_exclusion_is_counted() {
        let filters = Filters {
            ip: Box::new(BlockAll),
            ..Default::default()
        };
        let mut p = pipeline(combined()).with_filters(filters);
        let mut sink = RecordingSink::default();
        assert_eq!(
            p.process_line(LINE, &mut sink),
            LineOutcome::Excluded(Exclusion::IpRange)
        );
        assert_eq!(p.snapshot().excluded_ip, 1);
        assert_eq!(p.snapshot().total_bytes, 0);
        assert!(sink.events.is_empty());
    }

    #[test]
    fn test_crawler_exclusion_needs_option() {
        let filters = || Filters {
            crawler: Box::new(BlockAll),
            ..Default::default()
        };
        let mut sink = RecordingSink::default();

        let mut p = pipeline(combined()).with_filters(filters());
        assert_eq!(p.process_line(LINE, &mut sink), LineOutcome::Processed);

        let mut config = combined();
        config.ignore_crawlers = true;
        let mut p = pipeline(config).with_filters(filters());
        assert_eq!(
            p.process_line(LINE, &mut sink),
            LineOutcome::Excluded(Exclusion::Crawler)
        );
        assert_eq!(p.snapshot().excluded_crawler, 1);
    }

    #[test]
    fn test_crawler_exclusion_adds_no_bytes() {
        let mut config = combined();
        config.ignore_crawlers = true;
        let filters = Filters {
            crawler: Box::new(BlockAll),
            ..Default::default()
        };
        let mut p = pipeline(config).with_filters(filters);
        let mut sink = RecordingSink::default();
        p.process_line(LINE, &mut sink);

        assert_eq!(p.snapshot().total_bytes, 0);
        assert!(!p.snapshot().has_bandwidth);
        assert!(sink.events.is_empty());
    }

    #[test]
    fn test_referrer_site_exclusion_is_counted() {
        let mut config = combined();
        config.ignore_referers = vec!["*.spam.example".to_string()];
        let filters = Filters::from_config(&config).unwrap();
        let mut p = pipeline(config).with_filters(filters);
        let mut sink = RecordingSink::default();

        let line = LINE.replace(r#""-""#, r#""http://www.spam.example/win""#);
        assert_eq!(
            p.process_line(&line, &mut sink),
            LineOutcome::Excluded(Exclusion::ReferrerSite)
        );
        assert_eq!(p.process_line(LINE, &mut sink), LineOutcome::Processed);

        let snap = p.snapshot();
        assert_eq!(snap.excluded_referrer, 1);
        assert_eq!(snap.excluded_ip, 0);
        assert_eq!(snap.total_bytes, 120, "Only the kept line adds bytes");
    }

    #[test]
    fn test_filters_from_config() {
        let mut config = combined();
        config.ignore_ips = vec!["93.180.71.0/24".to_string()];
        let filters = Filters::from_config(&config).unwrap();
        let mut p = pipeline(config).with_filters(filters);
        assert_eq!(
            p.process_line(LINE, &mut RecordingSink::default()),
            LineOutcome::Excluded(Exclusion::IpRange)
        );
    }

    // ── Runs ─────────────────────────────────────────────────────

    #[test]
    fn test_run_reads_to_limit() {
        let mut p = pipeline(combined());
        let mut src = source(&[LINE, LINE, LINE, LINE]);
        let snap = p.run(&mut src, &mut RecordingSink::default(), Some(2)).unwrap();
        assert_eq!(snap.processed, 2);
        assert!(!snap.is_streaming);
    }

    #[test]
    fn test_each_run_starts_from_zero() {
        let mut p = pipeline(combined());
        let mut sink = RecordingSink::default();
        p.process_line("", &mut sink);
        let snap = p.run(&mut source(&[LINE]), &mut sink, None).unwrap();
        assert_eq!(snap.processed, 1);
        assert_eq!(snap.invalid, 0, "Lines before the run are not carried over");
    }

    #[test]
    fn test_run_mixed_lines() {
        let mut p = pipeline(combined());
        let mut src = source(&[LINE, "", "garbage", LINE]);
        let snap = p.run(&mut src, &mut RecordingSink::default(), None).unwrap();
        assert_eq!(snap.processed, 3);
        assert_eq!(snap.invalid, 2);
        assert_eq!(snap.total_bytes, 240);
    }

    #[test]
    fn test_check_format_valid() {
        let p = pipeline(combined());
        let check = p.check_format(&mut source(&[LINE, "junk"])).unwrap();
        assert!(check.is_valid());
        assert_eq!(p.snapshot().processed, 0, "The check keeps its own counters");
    }

    #[test]
    fn test_check_line_stops_before_classification() {
        let p = pipeline(combined());
        let counters = RunCounters::new();
        assert_eq!(p.check_line(LINE, &counters), LineOutcome::Checked);
        assert_eq!(
            p.check_line("# comment", &counters),
            LineOutcome::Invalid(LineError::Comment)
        );
        assert_eq!(counters.snapshot().total_bytes, 0, "Checked lines are not accumulated");
    }

    #[test]
    fn test_check_format_likely_invalid() {
        let p = pipeline(ParserConfig::with_formats("w3c", ""));
        let check = p.check_format(&mut source(&[LINE, LINE])).unwrap();
        assert!(matches!(
            check,
            FormatCheck::LikelyInvalid(s) if s.processed == 2 && s.invalid == 2
        ));

        let check = p.check_format(&mut source(&[])).unwrap();
        assert!(!check.is_valid(), "An empty log cannot pass the check");
    }

    #[test]
    fn test_check_format_reads_at_most_twenty_lines() {
        let p = pipeline(combined());
        let lines = vec![LINE; 30];
        let mut src = source(&lines);
        let check = p.check_format(&mut src).unwrap();
        assert!(matches!(check, FormatCheck::Valid(s) if s.processed == FORMAT_CHECK_LINES as u64));
    }

    #[test]
    fn test_parse_log_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", LINE).unwrap();
        writeln!(file, "{}", LINE).unwrap();

        let mut config = combined();
        config.log_file = Some(file.path().to_string_lossy().into_owned());
        let mut p = pipeline(config);
        let snap = parse_log(&mut p, &mut RecordingSink::default(), None).unwrap();
        assert_eq!(snap.processed, 2);
        assert_eq!(snap.valid(), 2);
    }

    #[test]
    fn test_parse_log_unreadable_file() {
        let mut config = combined();
        config.log_file = Some("/nonexistent/access.log".to_string());
        let mut p = pipeline(config);
        let err = parse_log(&mut p, &mut RecordingSink::default(), None).unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnreadable { .. }));
    }
}
