//! Stage 1: Reader
//!
//! The reader validates the input characters and exposes them to the scanner
//! through a cursor with lookahead. It tracks the character index, line and
//! column of the cursor so every later stage can attach marks to what it
//! produces.

use std::sync::Arc;

use crate::error::{Error, Mark, ReaderError, Result};

/// Check whether a character may appear in a YAML stream.
///
/// Tab, line feed, carriage return, next line, printable ASCII and the
/// printable ranges of the BMP are accepted, along with the supplementary
/// planes.
fn is_printable(ch: char) -> bool {
    matches!(ch,
        '\t' | '\n' | '\r' | '\u{85}'
        | '\u{20}'..='\u{7E}'
        | '\u{A0}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

fn is_line_break(ch: char) -> bool {
    matches!(ch, '\n' | '\u{85}' | '\u{2028}' | '\u{2029}')
}

/// Character cursor over a decoded input.
///
/// The buffer always ends with a `'\0'` sentinel, which is what [`peek`]
/// returns at and beyond the end of the input.
///
/// [`peek`]: Reader::peek
#[derive(Clone)]
pub struct Reader {
    name: Arc<str>,
    buffer: Arc<[char]>,
    pointer: usize,
    line: usize,
    column: usize,
}

impl Reader {
    /// Decode `input` and reject any character outside the printable set.
    pub fn new(name: &str, input: &str) -> Result<Self> {
        let mut chars: Vec<char> = input.chars().collect();
        let rejected = chars
            .iter()
            .position(|&ch| !is_printable(ch))
            .map(|position| (position, chars[position]));
        chars.push('\0');

        let reader = Self {
            name: Arc::from(name),
            buffer: chars.into(),
            pointer: 0,
            line: 0,
            column: 0,
        };

        if let Some((position, character)) = rejected {
            let mut cursor = reader.clone();
            cursor.forward(position);
            tracing::debug!(name, position, "rejected unprintable character");
            return Err(Error::Reader(ReaderError {
                name: reader.name.clone(),
                character,
                position,
                mark: cursor.mark(),
            }));
        }
        Ok(reader)
    }

    /// The character `offset` positions ahead of the cursor.
    pub fn peek(&self, offset: usize) -> char {
        self.buffer
            .get(self.pointer + offset)
            .copied()
            .unwrap_or('\0')
    }

    /// The next `length` characters, stopping at the end of the input.
    pub fn prefix(&self, length: usize) -> String {
        let end = (self.pointer + length).min(self.buffer.len() - 1);
        self.buffer[self.pointer.min(end)..end].iter().collect()
    }

    /// Advance the cursor by `length` characters, updating line and column.
    ///
    /// A carriage return only ends a line when it is not followed by a line
    /// feed. The byte order mark does not occupy a column.
    pub fn forward(&mut self, length: usize) {
        for _ in 0..length {
            if self.pointer + 1 >= self.buffer.len() {
                break;
            }
            let ch = self.buffer[self.pointer];
            self.pointer += 1;
            if is_line_break(ch) || (ch == '\r' && self.buffer[self.pointer] != '\n') {
                self.line += 1;
                self.column = 0;
            } else if ch != '\u{FEFF}' {
                self.column += 1;
            }
        }
    }

    pub fn mark(&self) -> Mark {
        Mark::new(
            self.name.clone(),
            self.pointer,
            self.line,
            self.column,
            Some(self.buffer.clone()),
        )
    }

    pub fn index(&self) -> usize {
        self.pointer
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peek_and_prefix() {
        let reader = Reader::new("t", "abc").unwrap();
        assert_eq!(reader.peek(0), 'a');
        assert_eq!(reader.peek(2), 'c');
        assert_eq!(reader.peek(3), '\0');
        assert_eq!(reader.peek(10), '\0');
        assert_eq!(reader.prefix(2), "ab");
        assert_eq!(reader.prefix(10), "abc");
    }

    #[test]
    fn test_forward_tracks_lines() {
        let mut reader = Reader::new("t", "ab\ncd\r\nef\rg").unwrap();
        reader.forward(3);
        assert_eq!((reader.index(), reader.line(), reader.column()), (3, 1, 0));
        reader.forward(3);
        assert_eq!((reader.line(), reader.column()), (1, 3));
        reader.forward(1);
        assert_eq!((reader.line(), reader.column()), (2, 0));
        reader.forward(3);
        assert_eq!((reader.line(), reader.column()), (3, 0));
    }

    #[test]
    fn test_forward_stops_at_end() {
        let mut reader = Reader::new("t", "ab").unwrap();
        reader.forward(10);
        assert_eq!(reader.index(), 2);
        assert_eq!(reader.peek(0), '\0');
    }

    #[test]
    fn test_bom_has_no_column() {
        let mut reader = Reader::new("t", "\u{FEFF}a").unwrap();
        reader.forward(1);
        assert_eq!(reader.column(), 0);
    }

    #[test]
    fn test_unicode_line_breaks() {
        let mut reader = Reader::new("t", "a\u{2028}b\u{85}c").unwrap();
        reader.forward(4);
        assert_eq!(reader.line(), 2);
    }

    #[test]
    fn test_rejects_control_characters() {
        let err = Reader::new("in.yaml", "ok\nbad: \u{7}").err().unwrap();
        match err {
            Error::Reader(e) => {
                assert_eq!(e.character, '\u{7}');
                assert_eq!(e.position, 8);
                assert_eq!(e.mark.line, 1);
                assert_eq!(e.mark.column, 5);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_accepts_astral_characters() {
        assert!(Reader::new("t", "emoji: \u{1F600}").is_ok());
    }

    #[test]
    fn test_rejects_nul() {
        assert!(Reader::new("t", "a\0b").is_err());
    }
}
