//! Date — strptime-style matching of the `%d` field and canonical date keys.

use chrono::format::{parse, Item, Parsed, StrftimeItems};
use chrono::NaiveDate;

use super::model::LineError;
use super::DATE_KEY_FORMAT;

/// Year assumed when the date format carries none (syslog-style
/// `%b %d %H:%M:%S`), matching a zeroed `struct tm`.
const DEFAULT_YEAR: &str = "1900";

/// Directives that set the year, directly or through a composite.
const YEAR_DIRECTIVES: &[char] = &['Y', 'y', 'C', 'G', 'g', 's', 'F', 'D', 'x', 'c', '+'];

/// A compiled date-format pattern.
#[derive(Debug, Clone)]
pub struct DateFormat {
    pattern: String,
    delimiters: usize,
    has_year: bool,
}

impl DateFormat {
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            delimiters: pattern.matches(' ').count() + 1,
            has_year: has_year_directive(pattern),
        }
    }

    /// True when chrono understands every directive in the pattern
    pub fn is_well_formed(&self) -> bool {
        !StrftimeItems::new(&self.pattern).any(|item| matches!(item, Item::Error))
    }

    /// How many delimiter occurrences a date token spans.
    ///
    /// A date pattern with embedded spaces (e.g. `%b %d %H:%M:%S`) needs one
    /// extra occurrence per space when the field delimiter is itself a space.
    pub fn token_delimiters(&self) -> usize {
        self.delimiters
    }

    /// Match `token` against the pattern. Leftover input is a failure.
    pub fn parse(&self, token: &str) -> Result<NaiveDate, LineError> {
        let invalid = || LineError::InvalidDate(token.to_string());

        let mut parsed = Parsed::new();
        if !self.has_year {
            parse(&mut parsed, DEFAULT_YEAR, StrftimeItems::new("%Y")).map_err(|_| invalid())?;
        }
        parse(&mut parsed, token, StrftimeItems::new(&self.pattern)).map_err(|_| invalid())?;

        parsed
            .to_naive_date()
            .or_else(|_| parsed.to_naive_datetime_with_offset(0).map(|dt| dt.date()))
            .map_err(|_| invalid())
    }

    /// Convert `token` into the fixed-width sortable key (`YYYYMMDD`).
    pub fn canonical_key(&self, token: &str) -> Result<String, LineError> {
        Ok(self.parse(token)?.format(DATE_KEY_FORMAT).to_string())
    }
}

fn has_year_directive(pattern: &str) -> bool {
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            continue;
        }
        // padding / width modifiers: %-d, %_d, %0d, %:z, %.f
        let mut next = chars.next();
        while matches!(next, Some('-' | '_' | '0' | ':' | '.' | '#' | '3' | '6' | '9')) {
            next = chars.next();
        }
        match next {
            Some(d) if YEAR_DIRECTIVES.contains(&d) => return true,
            Some(_) => {}
            None => break,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delimiter_count_follows_spaces() {
        assert_eq!(DateFormat::new("%d/%b/%Y").token_delimiters(), 1);
        assert_eq!(DateFormat::new("%b %d %H:%M:%S").token_delimiters(), 3);
    }

    #[test]
    fn test_common_log_date() {
        let fmt = DateFormat::new("%d/%b/%Y");
        assert_eq!(fmt.canonical_key("10/Oct/2000").unwrap(), "20001010");
    }

    #[test]
    fn test_date_with_time_and_zone() {
        let fmt = DateFormat::new("%d/%b/%Y:%H:%M:%S %z");
        assert_eq!(fmt.canonical_key("17/May/2015:08:05:32 +0000").unwrap(), "20150517");
    }

    #[test]
    fn test_iso_date() {
        let fmt = DateFormat::new("%Y-%m-%d");
        assert_eq!(fmt.canonical_key("2024-02-29").unwrap(), "20240229");
        assert!(fmt.parse("2023-02-29").is_err(), "Not a real date");
    }

    #[test]
    fn test_leftover_input_is_rejected() {
        let fmt = DateFormat::new("%d/%b/%Y");
        assert_eq!(
            fmt.parse("10/Oct/2000:13:55:36"),
            Err(LineError::InvalidDate("10/Oct/2000:13:55:36".to_string()))
        );
        assert!(fmt.parse("yesterday").is_err());
        assert!(fmt.parse("").is_err());
    }

    #[test]
    fn test_syslog_date_without_year() {
        let fmt = DateFormat::new("%b %d %H:%M:%S");
        assert_eq!(fmt.canonical_key("Jul 15 20:10:56").unwrap(), "19000715");
    }

    #[test]
    fn test_year_directive_detection() {
        assert!(has_year_directive("%d/%b/%Y"));
        assert!(has_year_directive("%F"));
        assert!(has_year_directive("%-y"));
        assert!(!has_year_directive("%b %d %H:%M:%S"));
        assert!(!has_year_directive("%%Y"), "Escaped percent is a literal");
    }

    #[test]
    fn test_well_formed_pattern() {
        assert!(DateFormat::new("%d/%b/%Y").is_well_formed());
        assert!(!DateFormat::new("%d/%Q").is_well_formed());
    }
}
