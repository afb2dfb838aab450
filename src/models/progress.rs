//! Progress extraction from fetch script output
//!
//! The fetch script is an arbitrary shell program (usually wrapping `curl`
//! or `wget`), so its output is treated as unstructured text. Lines are
//! split on `\n` or `\r`, since progress meters redraw a single line with
//! carriage returns.

/// Substrings that mark a stderr line as worth surfacing
const PROBLEM_KEYWORDS: [&str; 3] = ["error", "failed", "warning"];

/// Substrings that mark a stdout line as a status message
const STATUS_KEYWORDS: [&str; 6] = [
    "downloading",
    "done",
    "resuming",
    "exists",
    "error",
    "failed",
];

/// Longest partial line kept before it is force-flushed
const MAX_LINE_BYTES: usize = 16 * 1024;

/// Which pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// Splits a byte stream into lines on `\n` or `\r`
#[derive(Debug, Default)]
pub struct LineSplitter {
    buf: Vec<u8>,
}

impl LineSplitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every line it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                self.flush_into(&mut lines);
            } else {
                self.buf.push(byte);
                if self.buf.len() >= MAX_LINE_BYTES {
                    self.flush_into(&mut lines);
                }
            }
        }
        lines
    }

    /// Trailing text without a terminator, emitted at end of stream
    pub fn finish(&mut self) -> Option<String> {
        let mut lines = Vec::new();
        self.flush_into(&mut lines);
        lines.pop()
    }

    fn flush_into(&mut self, lines: &mut Vec<String>) {
        if self.buf.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.buf).trim().to_string();
        self.buf.clear();
        if !line.is_empty() {
            lines.push(line);
        }
    }
}

/// First `<digits>%` token in the line with a value of at most 100
///
/// Unlike a strict digits-then-`%` match, a fractional part (`45.3%`, as
/// printed by `curl --progress-bar`) is accepted and truncated to 45
/// rather than read as 3.
#[must_use]
pub fn parse_percent(line: &str) -> Option<u8> {
    let bytes = line.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        let int_end = digits_from(start);
        i = int_end;
        if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
            i = digits_from(i + 1);
        }
        if bytes.get(i) == Some(&b'%') {
            if let Ok(value) = line[start..int_end].parse::<u32>() {
                if value <= 100 {
                    return u8::try_from(value).ok();
                }
            }
        }
    }
    None
}

/// Throttles progress so listeners see the first update, each new multiple
/// of ten, and 100%, rather than every 1% tick
#[derive(Debug, Default, Clone)]
pub struct ProgressTracker {
    last_reported: Option<u8>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observed percentage; `true` if it should be reported
    pub fn observe(&mut self, percent: u8) -> bool {
        if self.last_reported == Some(percent) {
            return false;
        }
        let report = self.last_reported.is_none() || percent % 10 == 0 || percent == 100;
        if report {
            self.last_reported = Some(percent);
        }
        report
    }

    #[must_use]
    pub const fn last_reported(&self) -> Option<u8> {
        self.last_reported
    }
}

/// What a single output line means to the downloader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// Carries a percentage
    Progress(u8),
    /// Stderr line naming an error, failure or warning
    Problem,
    /// Stdout line with a recognised status keyword
    Status,
    /// Everything else
    Noise,
}

/// Classify a line according to the stream it came from
#[must_use]
pub fn classify(stream: StreamKind, line: &str) -> LineKind {
    if let Some(percent) = parse_percent(line) {
        return LineKind::Progress(percent);
    }

    let lower = line.to_ascii_lowercase();
    match stream {
        StreamKind::Stderr if PROBLEM_KEYWORDS.iter().any(|k| lower.contains(k)) => {
            LineKind::Problem
        }
        StreamKind::Stdout if STATUS_KEYWORDS.iter().any(|k| lower.contains(k)) => {
            LineKind::Status
        }
        _ => LineKind::Noise,
    }
}
