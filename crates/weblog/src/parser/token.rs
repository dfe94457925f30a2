//! Token — delimiter-aware field scanner over one input line.
//!
//! Every specifier handler pulls its value through [`Cursor::extract`].
//! A backslash makes the next character non-matching; the backslash itself
//! is kept in the token.

/// A read position inside one log line.
///
/// The cursor is always on a char boundary of `line`.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    line: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(line: &'a str) -> Self {
        Self { line, pos: 0 }
    }

    /// Unconsumed remainder of the line
    pub fn rest(&self) -> &'a str {
        &self.line[self.pos..]
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.line.len()
    }

    /// Consume one character (a literal in the log format). No-op at end.
    pub fn advance(&mut self) {
        if let Some(c) = self.rest().chars().next() {
            self.pos += c.len_utf8();
        }
    }

    /// Scan for the `count`-th unescaped `delim` (or end of line) and return
    /// the trimmed text before it.
    ///
    /// The cursor is left on the delimiter, so the log format's own literal
    /// consumes it. `delim == None` means the specifier closes the format and
    /// the token runs to end of line. Returns `None` only when the line ends
    /// right after an escaping backslash.
    pub fn extract(&mut self, delim: Option<char>, count: usize) -> Option<String> {
        let rest = self.rest();
        let mut seen = 0;
        let mut chars = rest.char_indices();

        loop {
            let (offset, c) = match chars.next() {
                Some(item) => item,
                None => return Some(self.take(rest.len())),
            };

            if Some(c) == delim {
                seen += 1;
                if seen >= count {
                    return Some(self.take(offset));
                }
            }

            if c == '\\' {
                // the escaped character never matches; a trailing escape is unterminated
                chars.next()?;
            }
        }
    }

    /// Move to the next occurrence of `delim` without consuming it.
    ///
    /// Leaves the cursor in place when the delimiter never occurs;
    /// `None` moves to end of line.
    pub fn skip_to(&mut self, delim: Option<char>) {
        match delim {
            Some(d) => {
                if let Some(offset) = self.rest().find(d) {
                    self.pos += offset;
                }
            }
            None => self.pos = self.line.len(),
        }
    }

    fn take(&mut self, len: usize) -> String {
        let token = self.rest()[..len].trim().to_string();
        self.pos += len;
        token
    }
}
