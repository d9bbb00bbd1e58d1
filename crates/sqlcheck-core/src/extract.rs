//! Locating delimited SQL fragments in host source text.
//!
//! Delimiters are literal tokens, not a grammar. The scanner walks the lines in
//! order, alternating between looking for the start token and the end token, so
//! a fragment may open and close on the same line or span many lines.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Zero-based line and byte column within that line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Half-open range `start..end` covering a fragment's text, delimiters excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// The start and end tokens bounding an embedded fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDelimiters", into = "RawDelimiters")]
pub struct Delimiters {
    start: String,
    end: String,
}

#[derive(Serialize, Deserialize)]
struct RawDelimiters {
    start: String,
    end: String,
}

impl Delimiters {
    /// Both tokens must be non-empty and distinct.
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Result<Self, ConfigError> {
        let start = start.into();
        let end = end.into();
        if start.is_empty() || end.is_empty() {
            return Err(ConfigError::Invalid(
                "delimiter tokens must not be empty".to_string(),
            ));
        }
        if start == end {
            return Err(ConfigError::Invalid(format!(
                "start and end delimiters must differ (both are '{start}')"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn end(&self) -> &str {
        &self.end
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            start: "sql`".to_string(),
            end: "`".to_string(),
        }
    }
}

impl TryFrom<RawDelimiters> for Delimiters {
    type Error = ConfigError;

    fn try_from(raw: RawDelimiters) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

impl From<Delimiters> for RawDelimiters {
    fn from(d: Delimiters) -> Self {
        Self {
            start: d.start,
            end: d.end,
        }
    }
}

/// Result of scanning a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Closed fragments in document order.
    pub spans: Vec<Span>,
    /// False when the input ended inside an unterminated fragment.
    pub well_formed: bool,
}

/// Scan `lines` for fragments bounded by `delimiters`.
pub fn extract<S: AsRef<str>>(lines: &[S], delimiters: &Delimiters) -> Extraction {
    let mut spans = Vec::new();
    let mut open: Option<Position> = None;

    for (line_no, line) in lines.iter().enumerate() {
        let line = line.as_ref();
        let mut column = 0;

        loop {
            match open {
                None => match line[column..].find(delimiters.start()) {
                    Some(offset) => {
                        column += offset + delimiters.start().len();
                        open = Some(Position::new(line_no, column));
                    }
                    None => break,
                },
                Some(start) => match line[column..].find(delimiters.end()) {
                    Some(offset) => {
                        let end = Position::new(line_no, column + offset);
                        spans.push(Span::new(start, end));
                        column = end.column + delimiters.end().len();
                        open = None;
                    }
                    None => break,
                },
            }
        }
    }

    Extraction {
        spans,
        well_formed: open.is_none(),
    }
}

/// Text covered by `span`, lines joined with `\n`. Out-of-range spans yield the
/// overlapping part only.
pub fn slice<S: AsRef<str>>(lines: &[S], span: &Span) -> String {
    let mut out = String::new();
    for line_no in span.start.line..=span.end.line {
        let Some(line) = lines.get(line_no).map(AsRef::as_ref) else {
            break;
        };
        let from = if line_no == span.start.line {
            span.start.column.min(line.len())
        } else {
            0
        };
        let to = if line_no == span.end.line {
            span.end.column.min(line.len())
        } else {
            line.len()
        };
        if line_no != span.start.line {
            out.push('\n');
        }
        if let Some(part) = line.get(from..to.max(from)) {
            out.push_str(part);
        }
    }
    out
}
