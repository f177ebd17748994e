//! Error types for YAML loading.
//!
//! Every stage of the pipeline reports failures through [`Error`]. Apart from
//! reader errors, each carries a [`MarkedError`]: an optional context message
//! with its own mark, the problem message and mark, and an optional note.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::render;

/// Result type for YAML loading operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A position in the source text.
///
/// `index`, `line` and `column` are zero-based. Marks share the decoded
/// source buffer so error rendering can quote the offending line.
#[derive(Clone)]
pub struct Mark {
    pub name: Arc<str>,
    pub index: usize,
    pub line: usize,
    pub column: usize,
    buffer: Option<Arc<[char]>>,
}

impl Mark {
    pub(crate) fn new(
        name: Arc<str>,
        index: usize,
        line: usize,
        column: usize,
        buffer: Option<Arc<[char]>>,
    ) -> Self {
        Self {
            name,
            index,
            line,
            column,
            buffer,
        }
    }

    /// Create a mark without source text, for positions not taken from a reader.
    pub fn detached(name: &str, index: usize, line: usize, column: usize) -> Self {
        Self::new(Arc::from(name), index, line, column, None)
    }

    /// Quote the source line around this mark with a caret beneath the column.
    ///
    /// Lines longer than `max_length` are cut around the mark and the cut
    /// ends are replaced with ` ... `.
    pub fn snippet(&self, indent: usize, max_length: usize) -> Option<String> {
        let buffer = self.buffer.as_ref()?;
        let half = (max_length / 2).saturating_sub(1);
        let is_break =
            |ch: char| matches!(ch, '\0' | '\r' | '\n' | '\u{85}' | '\u{2028}' | '\u{2029}');

        let mut head = "";
        let mut start = self.index;
        while start > 0 && !is_break(buffer[start - 1]) {
            start -= 1;
            if self.index - start > half {
                head = " ... ";
                start = (start + 5).min(self.index);
                break;
            }
        }

        let mut tail = "";
        let mut end = self.index;
        while end < buffer.len() && !is_break(buffer[end]) {
            end += 1;
            if end - self.index > half {
                tail = " ... ";
                end = end.saturating_sub(5).max(self.index);
                break;
            }
        }

        let snippet: String = buffer[start..end].iter().collect();
        let caret = " ".repeat(indent + self.index - start + head.chars().count());
        Some(format!(
            "{}{}{}{}\n{}^",
            " ".repeat(indent),
            head,
            snippet,
            tail,
            caret
        ))
    }
}

impl PartialEq for Mark {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.index == other.index
            && self.line == other.line
            && self.column == other.column
    }
}

impl Eq for Mark {}

impl fmt::Debug for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.name, self.line + 1, self.column + 1)
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "in \"{}\", line {}, column {}",
            self.name,
            self.line + 1,
            self.column + 1
        )
    }
}

/// The body shared by scanner, parser, composer and constructor errors.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkedError {
    pub context: Option<String>,
    pub context_mark: Option<Mark>,
    pub problem: String,
    pub problem_mark: Option<Mark>,
    pub note: Option<String>,
}

impl MarkedError {
    /// An error with a problem message at `mark`.
    pub fn new(problem: impl Into<String>, mark: Option<Mark>) -> Self {
        Self {
            context: None,
            context_mark: None,
            problem: problem.into(),
            problem_mark: mark,
            note: None,
        }
    }

    /// Attach the construct that was being processed when the problem occurred.
    pub fn with_context(mut self, context: impl Into<String>, mark: Option<Mark>) -> Self {
        self.context = Some(context.into());
        self.context_mark = mark;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Whether the context mark adds anything beyond the problem mark.
    pub(crate) fn shows_context_mark(&self) -> bool {
        match (&self.context_mark, &self.problem_mark) {
            (Some(_), None) => true,
            (Some(context), Some(problem)) => {
                context.name != problem.name
                    || context.line != problem.line
                    || context.column != problem.column
            }
            (None, _) => false,
        }
    }
}

/// A character outside the accepted set was found while decoding input.
#[derive(Clone, Debug, PartialEq)]
pub struct ReaderError {
    pub name: Arc<str>,
    pub character: char,
    /// Character offset of the rejected character.
    pub position: usize,
    pub mark: Mark,
}

/// Error type for YAML loading.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum Error {
    /// Unacceptable character in the input.
    #[error("{}", render::compact_reader(.0))]
    Reader(ReaderError),

    /// Malformed token.
    #[error("{}", render::compact_marked(.0))]
    Scanner(MarkedError),

    /// Token sequence violates the grammar, or a directive is invalid.
    #[error("{}", render::compact_marked(.0))]
    Parser(MarkedError),

    /// Undefined alias, duplicate anchor or wrong document count.
    #[error("{}", render::compact_marked(.0))]
    Composer(MarkedError),

    /// A node cannot be turned into a native value.
    #[error("{}", render::compact_marked(.0))]
    Constructor(MarkedError),
}

/// The pipeline stage an [`Error`] came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Reader,
    Scanner,
    Parser,
    Composer,
    Constructor,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Reader => "ReaderError",
            ErrorKind::Scanner => "ScannerError",
            ErrorKind::Parser => "ParserError",
            ErrorKind::Composer => "ComposerError",
            ErrorKind::Constructor => "ConstructorError",
        };
        f.write_str(name)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Reader(_) => ErrorKind::Reader,
            Error::Scanner(_) => ErrorKind::Scanner,
            Error::Parser(_) => ErrorKind::Parser,
            Error::Composer(_) => ErrorKind::Composer,
            Error::Constructor(_) => ErrorKind::Constructor,
        }
    }

    /// The marked body, for every kind except reader errors.
    pub fn marked(&self) -> Option<&MarkedError> {
        match self {
            Error::Reader(_) => None,
            Error::Scanner(e) | Error::Parser(e) | Error::Composer(e) | Error::Constructor(e) => {
                Some(e)
            }
        }
    }

    /// Where the problem was detected.
    pub fn problem_mark(&self) -> Option<&Mark> {
        match self {
            Error::Reader(e) => Some(&e.mark),
            _ => self.marked().and_then(|e| e.problem_mark.as_ref()),
        }
    }

    /// The problem message without any location.
    pub fn problem(&self) -> String {
        match self {
            Error::Reader(e) => render::reader_problem(e),
            _ => self
                .marked()
                .map(|e| e.problem.clone())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mark_in(text: &str, index: usize) -> Mark {
        let mut buffer: Vec<char> = text.chars().collect();
        buffer.push('\0');
        let line = text[..index].matches('\n').count();
        let column = index - text[..index].rfind('\n').map(|i| i + 1).unwrap_or(0);
        Mark::new(Arc::from("test.yaml"), index, line, column, Some(buffer.into()))
    }

    #[test]
    fn test_mark_display_is_one_based() {
        let mark = mark_in("a: 1\nb: 2\n", 8);
        assert_eq!(mark.to_string(), "in \"test.yaml\", line 2, column 4");
    }

    #[test]
    fn test_snippet_points_at_column() {
        let mark = mark_in("key: value\nother: 1\n", 5);
        assert_eq!(
            mark.snippet(4, 75).unwrap(),
            "    key: value\n         ^"
        );
    }

    #[test]
    fn test_snippet_truncates_long_lines() {
        let line = "x".repeat(200);
        let mark = mark_in(&line, 100);
        let snippet = mark.snippet(4, 75).unwrap();
        let first = snippet.lines().next().unwrap();
        assert!(first.starts_with("     ... "));
        assert!(first.ends_with(" ... "));
        let caret = snippet.lines().nth(1).unwrap();
        assert_eq!(caret.trim_start(), "^");
    }

    #[test]
    fn test_snippet_with_tiny_width() {
        let mark = mark_in("abcdefghij", 5);
        for max_length in 0..4 {
            let snippet = mark.snippet(0, max_length).unwrap();
            assert!(snippet.ends_with('^'), "{:?}", snippet);
        }
        assert_eq!(mark.snippet(0, 2).unwrap(), " ...  ... \n     ^");
    }

    #[test]
    fn test_detached_mark_has_no_snippet() {
        assert!(Mark::detached("x", 0, 0, 0).snippet(4, 75).is_none());
    }

    #[test]
    fn test_context_mark_suppressed_when_same_position() {
        let mark = mark_in("a", 0);
        let err =
            MarkedError::new("problem", Some(mark.clone())).with_context("context", Some(mark));
        assert!(!err.shows_context_mark());
    }

    #[test]
    fn test_error_kind() {
        let err = Error::Composer(MarkedError::new("found undefined alias 'x'", None));
        assert_eq!(err.kind(), ErrorKind::Composer);
        assert_eq!(err.kind().to_string(), "ComposerError");
        assert_eq!(err.problem(), "found undefined alias 'x'");
    }
}
