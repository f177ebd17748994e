//! Human-readable error rendering.
//!
//! [`compact`] puts everything on one line and is what `Display` prints.
//! [`full`] spreads context, problem and note over separate lines and quotes
//! the source under each mark.

use crate::error::{Error, Mark, MarkedError, ReaderError};

const SNIPPET_INDENT: usize = 4;
const SNIPPET_MAX_LENGTH: usize = 75;

/// Render an error on a single line.
pub fn compact(error: &Error) -> String {
    match error {
        Error::Reader(e) => compact_reader(e),
        _ => error.marked().map(compact_marked).unwrap_or_default(),
    }
}

/// Render an error over several lines with source snippets.
pub fn full(error: &Error) -> String {
    match error {
        Error::Reader(e) => {
            let mut out = format!(
                "{}\n  in \"{}\", position {}",
                reader_problem(e),
                e.name,
                e.position
            );
            if let Some(snippet) = e.mark.snippet(SNIPPET_INDENT, SNIPPET_MAX_LENGTH) {
                out.push_str(":\n");
                out.push_str(&snippet);
            }
            out
        }
        _ => error.marked().map(full_marked).unwrap_or_default(),
    }
}

pub(crate) fn reader_problem(error: &ReaderError) -> String {
    format!(
        "unacceptable character #x{:04x}: special characters are not allowed",
        error.character as u32
    )
}

pub(crate) fn compact_reader(error: &ReaderError) -> String {
    format!(
        "{} in \"{}\", position {}",
        reader_problem(error),
        error.name,
        error.position
    )
}

pub(crate) fn compact_marked(error: &MarkedError) -> String {
    let mut parts = Vec::new();
    if let Some(context) = &error.context {
        parts.push(context.clone());
    }
    if error.shows_context_mark() {
        if let Some(mark) = &error.context_mark {
            parts.push(mark.to_string());
        }
    }
    parts.push(error.problem.clone());
    if let Some(mark) = &error.problem_mark {
        parts.push(mark.to_string());
    }
    if let Some(note) = &error.note {
        parts.push(note.clone());
    }
    parts.join(" ")
}

fn full_marked(error: &MarkedError) -> String {
    let mut lines = Vec::new();
    if let Some(context) = &error.context {
        lines.push(context.clone());
    }
    if error.shows_context_mark() {
        if let Some(mark) = &error.context_mark {
            lines.push(full_mark(mark));
        }
    }
    lines.push(error.problem.clone());
    if let Some(mark) = &error.problem_mark {
        lines.push(full_mark(mark));
    }
    if let Some(note) = &error.note {
        lines.push(note.clone());
    }
    lines.join("\n")
}

fn full_mark(mark: &Mark) -> String {
    match mark.snippet(SNIPPET_INDENT, SNIPPET_MAX_LENGTH) {
        Some(snippet) => format!("  {}:\n{}", mark, snippet),
        None => format!("  {}", mark),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load;

    #[test]
    fn test_compact_is_single_line() {
        let err = load("a: *nope\n").unwrap_err();
        let text = compact(&err);
        assert!(!text.contains('\n'));
        assert_eq!(text, "found undefined alias 'nope' in \"<input>\", line 1, column 4");
        assert_eq!(err.to_string(), text);
    }

    #[test]
    fn test_full_quotes_source() {
        let err = load("a: *nope\n").unwrap_err();
        assert_eq!(
            full(&err),
            "found undefined alias 'nope'\n  in \"<input>\", line 1, column 4:\n    a: *nope\n       ^"
        );
    }

    #[test]
    fn test_full_shows_distinct_context_mark() {
        let err = load("a: 'unterminated\n").unwrap_err();
        let text = full(&err);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "while scanning a quoted scalar");
        assert_eq!(lines[1], "  in \"<input>\", line 1, column 4:");
        assert!(lines.contains(&"found unexpected end of stream"));
    }

    #[test]
    fn test_reader_error_rendering() {
        let err = load("ok: \u{1}\n").unwrap_err();
        assert_eq!(
            compact(&err),
            "unacceptable character #x0001: special characters are not allowed in \"<input>\", position 4"
        );
        assert!(full(&err).starts_with(
            "unacceptable character #x0001: special characters are not allowed\n  in \"<input>\", position 4"
        ));
    }
}
