//! Format — the log-format interpreter.
//!
//! The pattern is a sequence of literal characters and `%<letter>`
//! specifiers. The character right after a specifier letter is the
//! delimiter that ends that field in the input line. Literal pattern
//! characters each consume one input character, which is how the
//! delimiter left under the cursor by a field handler gets skipped.

use super::date::DateFormat;
use super::model::{IpFamily, LineError, LogRecord};
use super::request::{self, Capture};
use super::token::Cursor;
use super::{referrer, url, REF_SITE_LEN, USECS_PER_SEC};
use crate::conf::ParserConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Literal,
    PendingSpecifier,
}

/// Compiled log-format + date-format pair.
#[derive(Debug, Clone)]
pub struct FormatInterpreter {
    pattern: Vec<char>,
    date: DateFormat,
    /// `%D` is present, so `%T` is ignored
    has_usecs: bool,
    capture: Capture,
    double_decode: bool,
    /// First specifier whose field the pattern names twice
    duplicate: Option<char>,
}

impl FormatInterpreter {
    pub fn new(config: &ParserConfig) -> Self {
        let pattern: Vec<char> = config.log_format.chars().collect();
        let has_usecs = config.log_format.contains("%D");
        Self {
            duplicate: find_duplicate(&pattern, has_usecs),
            pattern,
            date: DateFormat::new(&config.date_format),
            has_usecs,
            capture: Capture {
                method: config.append_method,
                protocol: config.append_protocol,
            },
            double_decode: config.double_decode,
        }
    }

    pub fn date_format(&self) -> &DateFormat {
        &self.date
    }

    /// Extract every field the pattern names from `line`.
    ///
    /// Running out of input before the pattern ends is not an error here;
    /// the pipeline's required-field check decides whether the record is
    /// usable.
    pub fn interpret(&self, line: &str) -> Result<LogRecord, LineError> {
        if line.is_empty() {
            return Err(LineError::Empty);
        }
        if let Some(spec) = self.duplicate {
            return Err(LineError::DuplicateSpecifier(spec));
        }

        let mut record = LogRecord::new();
        let mut cursor = Cursor::new(line);
        let mut state = State::Literal;

        for (idx, &c) in self.pattern.iter().enumerate() {
            match state {
                State::Literal if c == '%' => state = State::PendingSpecifier,
                State::Literal => cursor.advance(),
                State::PendingSpecifier if c == '%' => {}
                State::PendingSpecifier if c.is_whitespace() => {
                    return Err(LineError::MalformedSpecifier);
                }
                State::PendingSpecifier => {
                    if cursor.is_at_end() {
                        return Ok(record);
                    }
                    let delim = self.pattern.get(idx + 1).copied();
                    self.apply(c, delim, &mut cursor, &mut record)?;
                    state = State::Literal;
                }
            }
        }

        Ok(record)
    }

    /// Run the handler for one specifier.
    fn apply(
        &self,
        spec: char,
        delim: Option<char>,
        cursor: &mut Cursor<'_>,
        record: &mut LogRecord,
    ) -> Result<(), LineError> {
        let duplicate = || Err(LineError::DuplicateSpecifier(spec));

        match spec {
            // date, possibly spanning several delimiters (syslog: `Jul 15 20:10:56`)
            'd' => {
                if record.date.is_some() {
                    return duplicate();
                }
                let tkn = take(cursor, delim, self.date.token_delimiters())?;
                self.date.parse(&tkn)?;
                record.date = Some(tkn);
            }
            // remote host (IP only)
            'h' => {
                if record.host.is_some() {
                    return duplicate();
                }
                let tkn = take(cursor, delim, 1)?;
                let family = IpFamily::of(&tkn).ok_or(LineError::InvalidHost)?;
                record.ip_family = Some(family);
                record.host = Some(tkn);
            }
            // request method
            'm' => {
                if record.method.is_some() {
                    return duplicate();
                }
                let tkn = take(cursor, delim, 1)?;
                if request::extract_method(&tkn).is_none() {
                    return Err(LineError::InvalidMethod);
                }
                record.method = Some(tkn);
            }
            // request path, without method or protocol
            'U' => {
                if record.request_path.is_some() {
                    return duplicate();
                }
                let tkn = take(cursor, delim, 1)?;
                let path = url::decode(&tkn, self.double_decode).ok_or(LineError::EmptyPath)?;
                record.request_path = Some(path);
            }
            // request protocol
            'H' => {
                if record.protocol.is_some() {
                    return duplicate();
                }
                let tkn = take(cursor, delim, 1)?;
                if !request::is_valid_protocol(&tkn) {
                    return Err(LineError::InvalidProtocol);
                }
                record.protocol = Some(tkn);
            }
            // full request line: method + path + protocol
            'r' => {
                if record.request_path.is_some() {
                    return duplicate();
                }
                let tkn = take(cursor, delim, 1)?;
                let req = request::parse(&tkn, self.capture, self.double_decode);
                record.request_path = Some(req.path);
                if record.method.is_none() {
                    record.method = req.method;
                }
                if record.protocol.is_none() {
                    record.protocol = req.protocol;
                }
            }
            // status code
            's' => {
                if record.status.is_some() {
                    return duplicate();
                }
                let tkn = take(cursor, delim, 1)?;
                if tkn.parse::<i64>().is_err() {
                    return Err(LineError::InvalidStatus);
                }
                record.status = Some(tkn);
            }
            // response size in bytes, excluding headers
            'b' => {
                if record.response_bytes.is_some() {
                    return duplicate();
                }
                let tkn = take(cursor, delim, 1)?;
                record.response_bytes = Some(tkn.parse::<u64>().unwrap_or(0));
            }
            // referrer
            'R' => {
                if record.referrer.is_some() {
                    return duplicate();
                }
                let tkn = match cursor.extract(delim, 1) {
                    Some(t) if !t.is_empty() => t,
                    _ => "-".to_string(),
                };
                if tkn != "-" {
                    if let Some(site) = referrer::extract_site(&tkn, REF_SITE_LEN) {
                        record.referrer_site = site;
                    }
                }
                record.referrer = Some(tkn);
            }
            // user agent, decoded (CloudFront) with '+' as space (W3C)
            'u' => {
                if record.agent.is_some() {
                    return duplicate();
                }
                let agent = cursor
                    .extract(delim, 1)
                    .and_then(|t| url::decode(&t, self.double_decode))
                    .map(|a| a.replace('+', " "))
                    .filter(|a| !a.is_empty());
                record.agent = Some(agent.unwrap_or_else(|| "-".to_string()));
            }
            // serve time in seconds; ignored when microseconds are logged too
            'T' if self.has_usecs => cursor.skip_to(delim),
            'T' => {
                if record.serve_time.is_some() {
                    return duplicate();
                }
                let tkn = take(cursor, delim, 1)?;
                record.serve_time = Some(seconds_to_usecs(&tkn));
            }
            // serve time in microseconds
            'D' => {
                if record.serve_time.is_some() {
                    return duplicate();
                }
                let tkn = take(cursor, delim, 1)?;
                record.serve_time = Some(tkn.parse::<u64>().unwrap_or(0));
            }
            // everything else is skipped
            _ => cursor.skip_to(delim),
        }

        Ok(())
    }
}

fn take(cursor: &mut Cursor<'_>, delim: Option<char>, count: usize) -> Result<String, LineError> {
    cursor.extract(delim, count).ok_or(LineError::UnterminatedEscape)
}

/// Record field a specifier fills; specifiers sharing a field conflict.
fn field_of(spec: char, has_usecs: bool) -> Option<&'static str> {
    match spec {
        'd' => Some("date"),
        'h' => Some("host"),
        'm' => Some("method"),
        'U' | 'r' => Some("request"),
        'H' => Some("protocol"),
        's' => Some("status"),
        'b' => Some("bytes"),
        'R' => Some("referrer"),
        'u' => Some("agent"),
        'T' if has_usecs => None,
        'T' | 'D' => Some("serve_time"),
        _ => None,
    }
}

/// Walk the pattern like the interpreter does and report the first
/// specifier that targets an already-claimed field.
fn find_duplicate(pattern: &[char], has_usecs: bool) -> Option<char> {
    let mut claimed = Vec::new();
    let mut pending = false;
    for &c in pattern {
        if !pending {
            pending = c == '%';
            continue;
        }
        if c == '%' || c.is_whitespace() {
            pending = c == '%';
            continue;
        }
        pending = false;
        if let Some(field) = field_of(c, has_usecs) {
            if claimed.contains(&field) {
                return Some(c);
            }
            claimed.push(field);
        }
    }
    None
}

/// `1.25` / `3` seconds → microseconds; anything unparsable or
/// non-positive is zero.
fn seconds_to_usecs(token: &str) -> u64 {
    let secs = if token.contains('.') {
        token.parse::<f64>().ok()
    } else {
        token.parse::<u64>().ok().map(|s| s as f64)
    };

    match secs {
        Some(s) if s.is_finite() && s > 0.0 => (s * USECS_PER_SEC) as u64,
        _ => 0,
    }
}
