//! Source — line sources over files, stdin and in-memory readers.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::parser::traits::LineSource;

/// Reads `\n`-terminated lines from any `BufRead`, decoding bytes as
/// UTF-8 lossily so a stray invalid byte only affects its own line.
pub struct ReaderSource<R> {
    reader: R,
    buf: Vec<u8>,
    streaming: bool,
}

impl<R: BufRead> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(4096),
            streaming: false,
        }
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }
}

impl ReaderSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl ReaderSource<io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock()).streaming(true)
    }
}

impl<R: BufRead> LineSource for ReaderSource<R> {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }
}
