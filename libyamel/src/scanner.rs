//! Stage 2: Scanner
//!
//! The scanner turns the character stream into tokens. Block structure is
//! made explicit: indentation changes become BLOCK-SEQUENCE-START,
//! BLOCK-MAPPING-START and BLOCK-END tokens, and a KEY token is inserted in
//! front of every simple key once the `:` that follows it is found.
//!
//! Tokens are produced lazily. A token is only handed out when no pending
//! simple key could still cause a KEY or BLOCK-MAPPING-START to be inserted
//! in front of it.

use std::collections::{BTreeMap, VecDeque};

use crate::error::{Error, Mark, MarkedError, Result};
use crate::reader::Reader;
use crate::tokens::{DirectiveValue, ScalarStyle, Token, TokenKind};

/// Simple keys may not span lines or run longer than this many characters.
const MAX_SIMPLE_KEY_LENGTH: usize = 1024;

fn is_break(ch: char) -> bool {
    matches!(ch, '\r' | '\n' | '\u{85}' | '\u{2028}' | '\u{2029}')
}

fn is_breakz(ch: char) -> bool {
    ch == '\0' || is_break(ch)
}

/// End of input, a space or a line break.
fn is_space_or_breakz(ch: char) -> bool {
    ch == ' ' || is_breakz(ch)
}

/// End of input, a space, a tab or a line break.
fn is_blankz(ch: char) -> bool {
    ch == '\t' || is_space_or_breakz(ch)
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'
}

fn is_uri_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || "-;/?:@&=+$,_.!~*'()[]%".contains(ch)
}

fn escape_replacement(ch: char) -> Option<char> {
    Some(match ch {
        '0' => '\0',
        'a' => '\u{07}',
        'b' => '\u{08}',
        't' | '\t' => '\t',
        'n' => '\n',
        'v' => '\u{0B}',
        'f' => '\u{0C}',
        'r' => '\r',
        'e' => '\u{1B}',
        ' ' => ' ',
        '"' => '"',
        '\\' => '\\',
        'N' => '\u{85}',
        '_' => '\u{A0}',
        'L' => '\u{2028}',
        'P' => '\u{2029}',
        _ => return None,
    })
}

fn escape_code_length(ch: char) -> Option<usize> {
    match ch {
        'x' => Some(2),
        'u' => Some(4),
        'U' => Some(8),
        _ => None,
    }
}

/// A place where a simple key may start.
#[derive(Debug, Clone)]
struct SimpleKey {
    token_number: usize,
    required: bool,
    index: usize,
    line: usize,
    column: usize,
    mark: Mark,
}

/// Pull-based tokenizer over a [`Reader`].
pub struct Scanner {
    reader: Reader,
    /// Set once STREAM-END has been queued.
    done: bool,
    /// Set after an error has been returned from the iterator.
    failed: bool,
    /// Number of unclosed `[` and `{`. Zero means block context.
    flow_level: usize,
    tokens: VecDeque<Token>,
    tokens_taken: usize,
    indent: isize,
    indents: Vec<isize>,
    /// Whether a simple key may start at the current position.
    allow_simple_key: bool,
    /// At most one candidate per flow level.
    possible_simple_keys: BTreeMap<usize, SimpleKey>,
}

impl Scanner {
    pub fn new(reader: Reader) -> Self {
        let mut scanner = Self {
            reader,
            done: false,
            failed: false,
            flow_level: 0,
            tokens: VecDeque::new(),
            tokens_taken: 0,
            indent: -1,
            indents: Vec::new(),
            allow_simple_key: true,
            possible_simple_keys: BTreeMap::new(),
        };
        scanner.fetch_stream_start();
        scanner
    }

    /// Whether another token is available.
    pub fn check_token(&mut self) -> Result<bool> {
        self.fill()?;
        Ok(!self.tokens.is_empty())
    }

    /// The next token, without consuming it.
    pub fn peek_token(&mut self) -> Result<Option<&Token>> {
        self.fill()?;
        Ok(self.tokens.front())
    }

    /// Consume the next token.
    pub fn get_token(&mut self) -> Result<Option<Token>> {
        self.fill()?;
        let token = self.tokens.pop_front();
        if let Some(token) = &token {
            self.tokens_taken += 1;
            tracing::trace!(token = %token, "scanned");
        }
        Ok(token)
    }

    /// The current position of the reader.
    pub fn mark(&self) -> Mark {
        self.reader.mark()
    }

    fn fill(&mut self) -> Result<()> {
        while self.need_more_tokens()? {
            self.fetch_more_tokens()?;
        }
        Ok(())
    }

    fn need_more_tokens(&mut self) -> Result<bool> {
        if self.done {
            return Ok(false);
        }
        if self.tokens.is_empty() {
            return Ok(true);
        }
        self.stale_possible_simple_keys()?;
        Ok(self.next_possible_simple_key() == Some(self.tokens_taken))
    }

    fn fetch_more_tokens(&mut self) -> Result<()> {
        self.scan_to_next_token();
        self.stale_possible_simple_keys()?;
        self.unwind_indent(self.reader.column() as isize);

        let ch = self.reader.peek(0);
        match ch {
            '\0' => {
                self.fetch_stream_end()?;
                return Ok(());
            }
            '%' if self.check_directive() => return self.fetch_directive(),
            '-' if self.check_document_start() => {
                return self.fetch_document_indicator(TokenKind::DocumentStart)
            }
            '.' if self.check_document_end() => {
                return self.fetch_document_indicator(TokenKind::DocumentEnd)
            }
            '[' => return self.fetch_flow_collection_start(TokenKind::FlowSequenceStart),
            '{' => return self.fetch_flow_collection_start(TokenKind::FlowMappingStart),
            ']' => return self.fetch_flow_collection_end(TokenKind::FlowSequenceEnd),
            '}' => return self.fetch_flow_collection_end(TokenKind::FlowMappingEnd),
            ',' => return self.fetch_flow_entry(),
            '-' if self.check_block_entry() => return self.fetch_block_entry(),
            '?' if self.check_key() => return self.fetch_key(),
            ':' if self.check_value() => return self.fetch_value(),
            '*' => return self.fetch_alias(),
            '&' => return self.fetch_anchor(),
            '!' => return self.fetch_tag(),
            '|' if self.flow_level == 0 => return self.fetch_block_scalar(ScalarStyle::Literal),
            '>' if self.flow_level == 0 => return self.fetch_block_scalar(ScalarStyle::Folded),
            '\'' => return self.fetch_flow_scalar(ScalarStyle::SingleQuoted),
            '"' => return self.fetch_flow_scalar(ScalarStyle::DoubleQuoted),
            _ => {}
        }
        if self.check_plain() {
            return self.fetch_plain();
        }
        Err(Error::Scanner(
            MarkedError::new(
                format!("found character {:?} that cannot start any token", ch),
                Some(self.reader.mark()),
            )
            .with_context("while scanning for the next token", None),
        ))
    }

    fn error(&self, context: &str, context_mark: &Mark, problem: String) -> Error {
        Error::Scanner(
            MarkedError::new(problem, Some(self.reader.mark()))
                .with_context(context, Some(context_mark.clone())),
        )
    }

    fn simple_key_error(&self, key: &SimpleKey) -> Error {
        self.error(
            "while scanning a simple key",
            &key.mark,
            "could not find expected ':'".to_string(),
        )
    }

    // Simple keys

    fn next_possible_simple_key(&self) -> Option<usize> {
        self.possible_simple_keys
            .values()
            .map(|key| key.token_number)
            .min()
    }

    /// Drop candidates that can no longer be keys: the line changed or the
    /// key grew too long. A required candidate going stale is an error.
    fn stale_possible_simple_keys(&mut self) -> Result<()> {
        let line = self.reader.line();
        let index = self.reader.index();
        let mut stale = Vec::new();
        for (&level, key) in &self.possible_simple_keys {
            if key.line != line || index - key.index > MAX_SIMPLE_KEY_LENGTH {
                if key.required {
                    return Err(self.simple_key_error(key));
                }
                stale.push(level);
            }
        }
        for level in stale {
            self.possible_simple_keys.remove(&level);
        }
        Ok(())
    }

    fn save_possible_simple_key(&mut self) -> Result<()> {
        let required =
            self.flow_level == 0 && self.indent == self.reader.column() as isize;
        if self.allow_simple_key {
            self.remove_possible_simple_key()?;
            let key = SimpleKey {
                token_number: self.tokens_taken + self.tokens.len(),
                required,
                index: self.reader.index(),
                line: self.reader.line(),
                column: self.reader.column(),
                mark: self.reader.mark(),
            };
            self.possible_simple_keys.insert(self.flow_level, key);
        }
        Ok(())
    }

    fn remove_possible_simple_key(&mut self) -> Result<()> {
        if let Some(key) = self.possible_simple_keys.remove(&self.flow_level) {
            if key.required {
                return Err(self.simple_key_error(&key));
            }
        }
        Ok(())
    }

    // Indentation

    fn unwind_indent(&mut self, column: isize) {
        if self.flow_level > 0 {
            return;
        }
        while self.indent > column {
            let mark = self.reader.mark();
            self.indent = self.indents.pop().unwrap_or(-1);
            self.tokens
                .push_back(Token::new(TokenKind::BlockEnd, mark.clone(), mark));
        }
    }

    fn add_indent(&mut self, column: isize) -> bool {
        if self.indent < column {
            self.indents.push(self.indent);
            self.indent = column;
            return true;
        }
        false
    }

    // Fetchers

    fn push_here(&mut self, kind: TokenKind) {
        let mark = self.reader.mark();
        self.tokens.push_back(Token::new(kind, mark.clone(), mark));
    }

    fn push_forwarded(&mut self, kind: TokenKind, length: usize) {
        let start_mark = self.reader.mark();
        self.reader.forward(length);
        let end_mark = self.reader.mark();
        self.tokens.push_back(Token::new(kind, start_mark, end_mark));
    }

    fn fetch_stream_start(&mut self) {
        self.push_here(TokenKind::StreamStart);
    }

    fn fetch_stream_end(&mut self) -> Result<()> {
        self.unwind_indent(-1);
        self.remove_possible_simple_key()?;
        self.allow_simple_key = false;
        self.possible_simple_keys.clear();
        self.push_here(TokenKind::StreamEnd);
        self.done = true;
        Ok(())
    }

    fn fetch_directive(&mut self) -> Result<()> {
        self.unwind_indent(-1);
        self.remove_possible_simple_key()?;
        self.allow_simple_key = false;
        let token = self.scan_directive()?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_document_indicator(&mut self, kind: TokenKind) -> Result<()> {
        self.unwind_indent(-1);
        self.remove_possible_simple_key()?;
        self.allow_simple_key = false;
        self.push_forwarded(kind, 3);
        Ok(())
    }

    fn fetch_flow_collection_start(&mut self, kind: TokenKind) -> Result<()> {
        self.save_possible_simple_key()?;
        self.flow_level += 1;
        self.allow_simple_key = true;
        self.push_forwarded(kind, 1);
        Ok(())
    }

    fn fetch_flow_collection_end(&mut self, kind: TokenKind) -> Result<()> {
        self.remove_possible_simple_key()?;
        self.flow_level = self.flow_level.saturating_sub(1);
        self.allow_simple_key = false;
        self.push_forwarded(kind, 1);
        Ok(())
    }

    fn fetch_flow_entry(&mut self) -> Result<()> {
        self.allow_simple_key = true;
        self.remove_possible_simple_key()?;
        self.push_forwarded(TokenKind::FlowEntry, 1);
        Ok(())
    }

    fn fetch_block_entry(&mut self) -> Result<()> {
        if self.flow_level == 0 {
            if !self.allow_simple_key {
                return Err(Error::Scanner(MarkedError::new(
                    "sequence entries are not allowed here",
                    Some(self.reader.mark()),
                )));
            }
            if self.add_indent(self.reader.column() as isize) {
                self.push_here(TokenKind::BlockSequenceStart);
            }
        }
        self.allow_simple_key = true;
        self.remove_possible_simple_key()?;
        self.push_forwarded(TokenKind::BlockEntry, 1);
        Ok(())
    }

    fn fetch_key(&mut self) -> Result<()> {
        if self.flow_level == 0 {
            if !self.allow_simple_key {
                return Err(Error::Scanner(MarkedError::new(
                    "mapping keys are not allowed here",
                    Some(self.reader.mark()),
                )));
            }
            if self.add_indent(self.reader.column() as isize) {
                self.push_here(TokenKind::BlockMappingStart);
            }
        }
        self.allow_simple_key = self.flow_level == 0;
        self.remove_possible_simple_key()?;
        self.push_forwarded(TokenKind::Key, 1);
        Ok(())
    }

    fn fetch_value(&mut self) -> Result<()> {
        if let Some(key) = self.possible_simple_keys.remove(&self.flow_level) {
            // Insert KEY, and possibly BLOCK-MAPPING-START, where the key began.
            let position = key.token_number - self.tokens_taken;
            self.tokens.insert(
                position,
                Token::new(TokenKind::Key, key.mark.clone(), key.mark.clone()),
            );
            if self.flow_level == 0 && self.add_indent(key.column as isize) {
                self.tokens.insert(
                    position,
                    Token::new(TokenKind::BlockMappingStart, key.mark.clone(), key.mark),
                );
            }
            self.allow_simple_key = false;
        } else {
            if self.flow_level == 0 {
                if !self.allow_simple_key {
                    return Err(Error::Scanner(MarkedError::new(
                        "mapping values are not allowed here",
                        Some(self.reader.mark()),
                    )));
                }
                if self.add_indent(self.reader.column() as isize) {
                    self.push_here(TokenKind::BlockMappingStart);
                }
            }
            self.allow_simple_key = self.flow_level == 0;
            self.remove_possible_simple_key()?;
        }
        self.push_forwarded(TokenKind::Value, 1);
        Ok(())
    }

    fn fetch_alias(&mut self) -> Result<()> {
        self.save_possible_simple_key()?;
        self.allow_simple_key = false;
        let token = self.scan_anchor(true)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_anchor(&mut self) -> Result<()> {
        self.save_possible_simple_key()?;
        self.allow_simple_key = false;
        let token = self.scan_anchor(false)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_tag(&mut self) -> Result<()> {
        self.save_possible_simple_key()?;
        self.allow_simple_key = false;
        let token = self.scan_tag()?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_block_scalar(&mut self, style: ScalarStyle) -> Result<()> {
        self.allow_simple_key = true;
        self.remove_possible_simple_key()?;
        let token = self.scan_block_scalar(style)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_flow_scalar(&mut self, style: ScalarStyle) -> Result<()> {
        self.save_possible_simple_key()?;
        self.allow_simple_key = false;
        let token = self.scan_flow_scalar(style)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_plain(&mut self) -> Result<()> {
        self.save_possible_simple_key()?;
        self.allow_simple_key = false;
        let token = self.scan_plain()?;
        self.tokens.push_back(token);
        Ok(())
    }

    // Checkers

    fn check_directive(&self) -> bool {
        self.reader.column() == 0
    }

    fn check_document_start(&self) -> bool {
        self.reader.column() == 0
            && self.reader.prefix(3) == "---"
            && is_blankz(self.reader.peek(3))
    }

    fn check_document_end(&self) -> bool {
        self.reader.column() == 0
            && self.reader.prefix(3) == "..."
            && is_blankz(self.reader.peek(3))
    }

    fn check_block_entry(&self) -> bool {
        is_blankz(self.reader.peek(1))
    }

    fn check_key(&self) -> bool {
        self.flow_level > 0 || is_blankz(self.reader.peek(1))
    }

    fn check_value(&self) -> bool {
        self.flow_level > 0 || is_blankz(self.reader.peek(1))
    }

    /// A plain scalar may start with any non-indicator character, or with
    /// `-`, `?` or `:` followed by a non-space (`?` and `:` only in block
    /// context).
    fn check_plain(&self) -> bool {
        let ch = self.reader.peek(0);
        !(is_blankz(ch) || "-?:,[]{}#&*!|>'\"%@`".contains(ch))
            || (!is_blankz(self.reader.peek(1))
                && (ch == '-' || (self.flow_level == 0 && (ch == '?' || ch == ':'))))
    }

    // Scanners

    /// Skip spaces, comments and line breaks. Tabs are not skipped.
    fn scan_to_next_token(&mut self) {
        if self.reader.index() == 0 && self.reader.peek(0) == '\u{FEFF}' {
            self.reader.forward(1);
        }
        loop {
            while self.reader.peek(0) == ' ' {
                self.reader.forward(1);
            }
            if self.reader.peek(0) == '#' {
                while !is_breakz(self.reader.peek(0)) {
                    self.reader.forward(1);
                }
            }
            if self.scan_line_break().is_empty() {
                break;
            }
            if self.flow_level == 0 {
                self.allow_simple_key = true;
            }
        }
    }

    fn scan_directive(&mut self) -> Result<Token> {
        let start_mark = self.reader.mark();
        self.reader.forward(1);
        let name = self.scan_directive_name(&start_mark)?;
        let value = match name.as_str() {
            "YAML" => self.scan_yaml_directive_value(&start_mark)?,
            "TAG" => self.scan_tag_directive_value(&start_mark)?,
            _ => DirectiveValue::Reserved,
        };
        let end_mark = self.reader.mark();
        if value == DirectiveValue::Reserved {
            while !is_breakz(self.reader.peek(0)) {
                self.reader.forward(1);
            }
        }
        self.scan_directive_ignored_line(&start_mark)?;
        Ok(Token::new(
            TokenKind::Directive { name, value },
            start_mark,
            end_mark,
        ))
    }

    fn scan_directive_name(&mut self, start_mark: &Mark) -> Result<String> {
        let mut length = 0;
        while is_word_char(self.reader.peek(length)) {
            length += 1;
        }
        if length == 0 {
            return Err(self.error(
                "while scanning a directive",
                start_mark,
                format!(
                    "expected alphabetic or numeric character, but found {:?}",
                    self.reader.peek(length)
                ),
            ));
        }
        let value = self.reader.prefix(length);
        self.reader.forward(length);
        let ch = self.reader.peek(0);
        if !is_space_or_breakz(ch) {
            return Err(self.error(
                "while scanning a directive",
                start_mark,
                format!("expected alphabetic or numeric character, but found {:?}", ch),
            ));
        }
        Ok(value)
    }

    fn scan_yaml_directive_value(&mut self, start_mark: &Mark) -> Result<DirectiveValue> {
        while self.reader.peek(0) == ' ' {
            self.reader.forward(1);
        }
        let major = self.scan_yaml_directive_number(start_mark)?;
        if self.reader.peek(0) != '.' {
            return Err(self.error(
                "while scanning a directive",
                start_mark,
                format!("expected a digit or '.', but found {:?}", self.reader.peek(0)),
            ));
        }
        self.reader.forward(1);
        let minor = self.scan_yaml_directive_number(start_mark)?;
        if !is_space_or_breakz(self.reader.peek(0)) {
            return Err(self.error(
                "while scanning a directive",
                start_mark,
                format!("expected a digit or ' ', but found {:?}", self.reader.peek(0)),
            ));
        }
        Ok(DirectiveValue::Version(major, minor))
    }

    fn scan_yaml_directive_number(&mut self, start_mark: &Mark) -> Result<u32> {
        let ch = self.reader.peek(0);
        if !ch.is_ascii_digit() {
            return Err(self.error(
                "while scanning a directive",
                start_mark,
                format!("expected a digit, but found {:?}", ch),
            ));
        }
        let mut length = 0;
        while self.reader.peek(length).is_ascii_digit() {
            length += 1;
        }
        let digits = self.reader.prefix(length);
        let value = digits.parse::<u32>().map_err(|_| {
            self.error(
                "while scanning a directive",
                start_mark,
                format!("version number {} is too large", digits),
            )
        })?;
        self.reader.forward(length);
        Ok(value)
    }

    fn scan_tag_directive_value(&mut self, start_mark: &Mark) -> Result<DirectiveValue> {
        while self.reader.peek(0) == ' ' {
            self.reader.forward(1);
        }
        let handle = self.scan_tag_handle("directive", start_mark)?;
        if self.reader.peek(0) != ' ' {
            return Err(self.error(
                "while scanning a directive",
                start_mark,
                format!("expected ' ', but found {:?}", self.reader.peek(0)),
            ));
        }
        while self.reader.peek(0) == ' ' {
            self.reader.forward(1);
        }
        let prefix = self.scan_tag_uri("directive", start_mark)?;
        if !is_space_or_breakz(self.reader.peek(0)) {
            return Err(self.error(
                "while scanning a directive",
                start_mark,
                format!("expected ' ', but found {:?}", self.reader.peek(0)),
            ));
        }
        Ok(DirectiveValue::Tag { handle, prefix })
    }

    fn scan_directive_ignored_line(&mut self, start_mark: &Mark) -> Result<()> {
        while self.reader.peek(0) == ' ' {
            self.reader.forward(1);
        }
        if self.reader.peek(0) == '#' {
            while !is_breakz(self.reader.peek(0)) {
                self.reader.forward(1);
            }
        }
        let ch = self.reader.peek(0);
        if !is_breakz(ch) {
            return Err(self.error(
                "while scanning a directive",
                start_mark,
                format!("expected a comment or a line break, but found {:?}", ch),
            ));
        }
        self.scan_line_break();
        Ok(())
    }

    fn scan_anchor(&mut self, alias: bool) -> Result<Token> {
        let start_mark = self.reader.mark();
        let context = if alias {
            "while scanning an alias"
        } else {
            "while scanning an anchor"
        };
        self.reader.forward(1);
        let mut length = 0;
        while is_word_char(self.reader.peek(length)) {
            length += 1;
        }
        if length == 0 {
            return Err(self.error(
                context,
                &start_mark,
                format!(
                    "expected alphabetic or numeric character, but found {:?}",
                    self.reader.peek(0)
                ),
            ));
        }
        let value = self.reader.prefix(length);
        self.reader.forward(length);
        let ch = self.reader.peek(0);
        if !(is_blankz(ch) || "?:,]}%@`".contains(ch)) {
            return Err(self.error(
                context,
                &start_mark,
                format!("expected alphabetic or numeric character, but found {:?}", ch),
            ));
        }
        let kind = if alias {
            TokenKind::Alias(value)
        } else {
            TokenKind::Anchor(value)
        };
        Ok(Token::new(kind, start_mark, self.reader.mark()))
    }

    fn scan_tag(&mut self) -> Result<Token> {
        let start_mark = self.reader.mark();
        let ch = self.reader.peek(1);
        let (handle, suffix) = if ch == '<' {
            self.reader.forward(2);
            let suffix = self.scan_tag_uri("tag", &start_mark)?;
            if self.reader.peek(0) != '>' {
                return Err(self.error(
                    "while scanning a tag",
                    &start_mark,
                    format!("expected '>', but found {:?}", self.reader.peek(0)),
                ));
            }
            self.reader.forward(1);
            (None, suffix)
        } else if is_blankz(ch) {
            self.reader.forward(1);
            (None, "!".to_string())
        } else {
            let mut length = 1;
            let mut use_handle = false;
            let mut ch = ch;
            while !is_space_or_breakz(ch) {
                if ch == '!' {
                    use_handle = true;
                    break;
                }
                length += 1;
                ch = self.reader.peek(length);
            }
            let handle = if use_handle {
                self.scan_tag_handle("tag", &start_mark)?
            } else {
                self.reader.forward(1);
                "!".to_string()
            };
            let suffix = self.scan_tag_uri("tag", &start_mark)?;
            (Some(handle), suffix)
        };
        let ch = self.reader.peek(0);
        if !is_space_or_breakz(ch) {
            return Err(self.error(
                "while scanning a tag",
                &start_mark,
                format!("expected ' ', but found {:?}", ch),
            ));
        }
        Ok(Token::new(
            TokenKind::Tag { handle, suffix },
            start_mark,
            self.reader.mark(),
        ))
    }

    fn scan_block_scalar(&mut self, style: ScalarStyle) -> Result<Token> {
        let folded = style == ScalarStyle::Folded;
        let mut chunks = String::new();
        let start_mark = self.reader.mark();
        self.reader.forward(1);
        let (chomping, increment) = self.scan_block_scalar_indicators(&start_mark)?;
        self.scan_block_scalar_ignored_line(&start_mark)?;

        let min_indent = (self.indent + 1).max(1) as usize;
        let (mut breaks, mut end_mark, indent) = match increment {
            None => {
                let (breaks, max_indent, end_mark) = self.scan_block_scalar_indentation();
                (breaks, end_mark, min_indent.max(max_indent))
            }
            Some(increment) => {
                let indent = min_indent + increment - 1;
                let (breaks, end_mark) = self.scan_block_scalar_breaks(indent);
                (breaks, end_mark, indent)
            }
        };

        let mut line_break = "";
        while self.reader.column() == indent && self.reader.peek(0) != '\0' {
            chunks.push_str(&breaks);
            let leading_non_space = !matches!(self.reader.peek(0), ' ' | '\t');
            let mut length = 0;
            while !is_breakz(self.reader.peek(length)) {
                length += 1;
            }
            chunks.push_str(&self.reader.prefix(length));
            self.reader.forward(length);
            line_break = self.scan_line_break();
            (breaks, end_mark) = self.scan_block_scalar_breaks(indent);
            if self.reader.column() != indent || self.reader.peek(0) == '\0' {
                break;
            }
            // Fold a single line feed between two non-indented lines into a space.
            if folded
                && line_break == "\n"
                && leading_non_space
                && !matches!(self.reader.peek(0), ' ' | '\t')
            {
                if breaks.is_empty() {
                    chunks.push(' ');
                }
            } else {
                chunks.push_str(line_break);
            }
        }

        // Clip keeps the final line break, keep also keeps trailing empty lines.
        if chomping != Some(false) {
            chunks.push_str(line_break);
        }
        if chomping == Some(true) {
            chunks.push_str(&breaks);
        }
        Ok(Token::new(
            TokenKind::Scalar {
                value: chunks,
                plain: false,
                style,
            },
            start_mark,
            end_mark,
        ))
    }

    /// Returns `(chomping, increment)`. Chomping is `Some(true)` for keep,
    /// `Some(false)` for strip and `None` for clip.
    fn scan_block_scalar_indicators(
        &mut self,
        start_mark: &Mark,
    ) -> Result<(Option<bool>, Option<usize>)> {
        let mut chomping = None;
        let mut increment = None;
        let ch = self.reader.peek(0);
        if ch == '+' || ch == '-' {
            chomping = Some(ch == '+');
            self.reader.forward(1);
            let ch = self.reader.peek(0);
            if ch.is_ascii_digit() {
                increment = Some(self.scan_indentation_indicator(start_mark, ch)?);
            }
        } else if ch.is_ascii_digit() {
            increment = Some(self.scan_indentation_indicator(start_mark, ch)?);
            let ch = self.reader.peek(0);
            if ch == '+' || ch == '-' {
                chomping = Some(ch == '+');
                self.reader.forward(1);
            }
        }
        let ch = self.reader.peek(0);
        if !is_space_or_breakz(ch) {
            return Err(self.error(
                "while scanning a block scalar",
                start_mark,
                format!("expected chomping or indentation indicators, but found {:?}", ch),
            ));
        }
        Ok((chomping, increment))
    }

    fn scan_indentation_indicator(&mut self, start_mark: &Mark, ch: char) -> Result<usize> {
        let increment = ch.to_digit(10).unwrap_or(0) as usize;
        if increment == 0 {
            return Err(self.error(
                "while scanning a block scalar",
                start_mark,
                "expected indentation indicator in the range 1-9, but found 0".to_string(),
            ));
        }
        self.reader.forward(1);
        Ok(increment)
    }

    fn scan_block_scalar_ignored_line(&mut self, start_mark: &Mark) -> Result<()> {
        while self.reader.peek(0) == ' ' {
            self.reader.forward(1);
        }
        if self.reader.peek(0) == '#' {
            while !is_breakz(self.reader.peek(0)) {
                self.reader.forward(1);
            }
        }
        let ch = self.reader.peek(0);
        if !is_breakz(ch) {
            return Err(self.error(
                "while scanning a block scalar",
                start_mark,
                format!("expected a comment or a line break, but found {:?}", ch),
            ));
        }
        self.scan_line_break();
        Ok(())
    }

    /// Skip leading blank lines and find the most indented of them.
    fn scan_block_scalar_indentation(&mut self) -> (String, usize, Mark) {
        let mut chunks = String::new();
        let mut max_indent = 0;
        let mut end_mark = self.reader.mark();
        loop {
            let ch = self.reader.peek(0);
            if ch == ' ' {
                self.reader.forward(1);
                max_indent = max_indent.max(self.reader.column());
            } else if is_break(ch) {
                chunks.push_str(self.scan_line_break());
                end_mark = self.reader.mark();
            } else {
                break;
            }
        }
        (chunks, max_indent, end_mark)
    }

    fn scan_block_scalar_breaks(&mut self, indent: usize) -> (String, Mark) {
        let mut chunks = String::new();
        let mut end_mark = self.reader.mark();
        while self.reader.column() < indent && self.reader.peek(0) == ' ' {
            self.reader.forward(1);
        }
        while is_break(self.reader.peek(0)) {
            chunks.push_str(self.scan_line_break());
            end_mark = self.reader.mark();
            while self.reader.column() < indent && self.reader.peek(0) == ' ' {
                self.reader.forward(1);
            }
        }
        (chunks, end_mark)
    }

    fn scan_flow_scalar(&mut self, style: ScalarStyle) -> Result<Token> {
        let double = style == ScalarStyle::DoubleQuoted;
        let mut chunks = String::new();
        let start_mark = self.reader.mark();
        let quote = self.reader.peek(0);
        self.reader.forward(1);
        self.scan_flow_scalar_non_spaces(double, &start_mark, &mut chunks)?;
        while self.reader.peek(0) != quote {
            self.scan_flow_scalar_spaces(&start_mark, &mut chunks)?;
            self.scan_flow_scalar_non_spaces(double, &start_mark, &mut chunks)?;
        }
        self.reader.forward(1);
        Ok(Token::new(
            TokenKind::Scalar {
                value: chunks,
                plain: false,
                style,
            },
            start_mark,
            self.reader.mark(),
        ))
    }

    fn scan_flow_scalar_non_spaces(
        &mut self,
        double: bool,
        start_mark: &Mark,
        chunks: &mut String,
    ) -> Result<()> {
        loop {
            let mut length = 0;
            while !(is_blankz(self.reader.peek(length))
                || matches!(self.reader.peek(length), '\'' | '"' | '\\'))
            {
                length += 1;
            }
            if length > 0 {
                chunks.push_str(&self.reader.prefix(length));
                self.reader.forward(length);
            }
            let ch = self.reader.peek(0);
            if !double && ch == '\'' && self.reader.peek(1) == '\'' {
                chunks.push('\'');
                self.reader.forward(2);
            } else if (double && ch == '\'') || (!double && (ch == '"' || ch == '\\')) {
                chunks.push(ch);
                self.reader.forward(1);
            } else if double && ch == '\\' {
                self.reader.forward(1);
                let ch = self.reader.peek(0);
                if let Some(replacement) = escape_replacement(ch) {
                    chunks.push(replacement);
                    self.reader.forward(1);
                } else if let Some(length) = escape_code_length(ch) {
                    self.reader.forward(1);
                    for k in 0..length {
                        let digit = self.reader.peek(k);
                        if !digit.is_ascii_hexdigit() {
                            return Err(self.error(
                                "while scanning a double-quoted scalar",
                                start_mark,
                                format!(
                                    "expected escape sequence of {} hexadecimal numbers, but found {:?}",
                                    length, digit
                                ),
                            ));
                        }
                    }
                    let digits = self.reader.prefix(length);
                    let decoded = u32::from_str_radix(&digits, 16)
                        .ok()
                        .and_then(char::from_u32);
                    match decoded {
                        Some(decoded) => chunks.push(decoded),
                        None => {
                            return Err(self.error(
                                "while scanning a double-quoted scalar",
                                start_mark,
                                format!("found invalid Unicode character escape code {}", digits),
                            ))
                        }
                    }
                    self.reader.forward(length);
                } else if is_break(ch) {
                    self.scan_line_break();
                    let breaks = self.scan_flow_scalar_breaks(start_mark)?;
                    chunks.push_str(&breaks);
                } else {
                    return Err(self.error(
                        "while scanning a double-quoted scalar",
                        start_mark,
                        format!("found unknown escape character {:?}", ch),
                    ));
                }
            } else {
                return Ok(());
            }
        }
    }

    fn scan_flow_scalar_spaces(&mut self, start_mark: &Mark, chunks: &mut String) -> Result<()> {
        let mut length = 0;
        while matches!(self.reader.peek(length), ' ' | '\t') {
            length += 1;
        }
        let whitespaces = self.reader.prefix(length);
        self.reader.forward(length);
        let ch = self.reader.peek(0);
        if ch == '\0' {
            return Err(self.error(
                "while scanning a quoted scalar",
                start_mark,
                "found unexpected end of stream".to_string(),
            ));
        }
        if is_break(ch) {
            let line_break = self.scan_line_break();
            let breaks = self.scan_flow_scalar_breaks(start_mark)?;
            if line_break != "\n" {
                chunks.push_str(line_break);
            } else if breaks.is_empty() {
                chunks.push(' ');
            }
            chunks.push_str(&breaks);
        } else {
            chunks.push_str(&whitespaces);
        }
        Ok(())
    }

    fn scan_flow_scalar_breaks(&mut self, start_mark: &Mark) -> Result<String> {
        let mut chunks = String::new();
        loop {
            let prefix = self.reader.prefix(3);
            if (prefix == "---" || prefix == "...") && is_blankz(self.reader.peek(3)) {
                return Err(self.error(
                    "while scanning a quoted scalar",
                    start_mark,
                    "found unexpected document separator".to_string(),
                ));
            }
            while matches!(self.reader.peek(0), ' ' | '\t') {
                self.reader.forward(1);
            }
            if is_break(self.reader.peek(0)) {
                chunks.push_str(self.scan_line_break());
            } else {
                return Ok(chunks);
            }
        }
    }

    fn scan_plain(&mut self) -> Result<Token> {
        let mut chunks = String::new();
        let start_mark = self.reader.mark();
        let mut end_mark = start_mark.clone();
        let indent = self.indent + 1;
        let mut spaces = String::new();
        loop {
            if self.reader.peek(0) == '#' {
                break;
            }
            let mut length = 0;
            let mut ch;
            loop {
                ch = self.reader.peek(length);
                if is_blankz(ch)
                    || (self.flow_level == 0
                        && ch == ':'
                        && is_blankz(self.reader.peek(length + 1)))
                    || (self.flow_level > 0 && ",:?[]{}".contains(ch))
                {
                    break;
                }
                length += 1;
            }
            if self.flow_level > 0 && ch == ':' {
                let next = self.reader.peek(length + 1);
                if !(is_blankz(next) || ",[]{}".contains(next)) {
                    self.reader.forward(length);
                    return Err(Error::Scanner(
                        MarkedError::new("found unexpected ':'", Some(self.reader.mark()))
                            .with_context("while scanning a plain scalar", Some(start_mark))
                            .with_note(
                                "Please check http://pyyaml.org/wiki/YAMLColonInFlowContext for details.",
                            ),
                    ));
                }
            }
            if length == 0 {
                break;
            }
            self.allow_simple_key = false;
            chunks.push_str(&spaces);
            chunks.push_str(&self.reader.prefix(length));
            self.reader.forward(length);
            end_mark = self.reader.mark();
            match self.scan_plain_spaces() {
                Some(next) if !next.is_empty() => spaces = next,
                _ => break,
            }
            if self.reader.peek(0) == '#'
                || (self.flow_level == 0 && (self.reader.column() as isize) < indent)
            {
                break;
            }
        }
        Ok(Token::new(
            TokenKind::Scalar {
                value: chunks,
                plain: true,
                style: ScalarStyle::Plain,
            },
            start_mark,
            end_mark,
        ))
    }

    /// Whitespace between the words of a plain scalar, already folded.
    /// `None` when a document separator ends the scalar.
    fn scan_plain_spaces(&mut self) -> Option<String> {
        let mut chunks = String::new();
        let mut length = 0;
        while self.reader.peek(length) == ' ' {
            length += 1;
        }
        let whitespaces = self.reader.prefix(length);
        self.reader.forward(length);
        let ch = self.reader.peek(0);
        if is_break(ch) {
            let line_break = self.scan_line_break();
            self.allow_simple_key = true;
            if self.at_document_separator() {
                return None;
            }
            let mut breaks = String::new();
            loop {
                let ch = self.reader.peek(0);
                if ch == ' ' {
                    self.reader.forward(1);
                } else if is_break(ch) {
                    breaks.push_str(self.scan_line_break());
                    if self.at_document_separator() {
                        return None;
                    }
                } else {
                    break;
                }
            }
            if line_break != "\n" {
                chunks.push_str(line_break);
            } else if breaks.is_empty() {
                chunks.push(' ');
            }
            chunks.push_str(&breaks);
        } else {
            chunks.push_str(&whitespaces);
        }
        Some(chunks)
    }

    fn at_document_separator(&self) -> bool {
        let prefix = self.reader.prefix(3);
        (prefix == "---" || prefix == "...") && is_blankz(self.reader.peek(3))
    }

    fn scan_tag_handle(&mut self, name: &str, start_mark: &Mark) -> Result<String> {
        let context = format!("while scanning a {}", name);
        let ch = self.reader.peek(0);
        if ch != '!' {
            return Err(self.error(
                &context,
                start_mark,
                format!("expected '!', but found {:?}", ch),
            ));
        }
        let mut length = 1;
        let mut ch = self.reader.peek(length);
        if ch != ' ' {
            while is_word_char(ch) {
                length += 1;
                ch = self.reader.peek(length);
            }
            if ch != '!' {
                self.reader.forward(length);
                return Err(self.error(
                    &context,
                    start_mark,
                    format!("expected '!', but found {:?}", ch),
                ));
            }
            length += 1;
        }
        let value = self.reader.prefix(length);
        self.reader.forward(length);
        Ok(value)
    }

    fn scan_tag_uri(&mut self, name: &str, start_mark: &Mark) -> Result<String> {
        let mut chunks = String::new();
        let mut length = 0;
        let mut ch = self.reader.peek(length);
        while is_uri_char(ch) {
            if ch == '%' {
                chunks.push_str(&self.reader.prefix(length));
                self.reader.forward(length);
                length = 0;
                let decoded = self.scan_uri_escapes(name, start_mark)?;
                chunks.push_str(&decoded);
            } else {
                length += 1;
            }
            ch = self.reader.peek(length);
        }
        if length > 0 {
            chunks.push_str(&self.reader.prefix(length));
            self.reader.forward(length);
        }
        if chunks.is_empty() {
            return Err(self.error(
                &format!("while scanning a {}", name),
                start_mark,
                format!("expected URI, but found {:?}", ch),
            ));
        }
        Ok(chunks)
    }

    fn scan_uri_escapes(&mut self, name: &str, start_mark: &Mark) -> Result<String> {
        let context = format!("while scanning a {}", name);
        let mut bytes = Vec::new();
        let mark = self.reader.mark();
        while self.reader.peek(0) == '%' {
            self.reader.forward(1);
            for k in 0..2 {
                let digit = self.reader.peek(k);
                if !digit.is_ascii_hexdigit() {
                    return Err(self.error(
                        &context,
                        start_mark,
                        format!(
                            "expected URI escape sequence of 2 hexadecimal numbers, but found {:?}",
                            digit
                        ),
                    ));
                }
            }
            let byte = u8::from_str_radix(&self.reader.prefix(2), 16).unwrap_or(0);
            bytes.push(byte);
            self.reader.forward(2);
        }
        String::from_utf8(bytes).map_err(|e| {
            Error::Scanner(
                MarkedError::new(e.to_string(), Some(mark))
                    .with_context(context, Some(start_mark.clone())),
            )
        })
    }

    /// Consume one line break. `\r\n`, `\r`, `\n` and next line become `"\n"`;
    /// line and paragraph separators are preserved. Returns `""` if the
    /// cursor is not at a line break.
    fn scan_line_break(&mut self) -> &'static str {
        match self.reader.peek(0) {
            '\r' | '\n' | '\u{85}' => {
                if self.reader.prefix(2) == "\r\n" {
                    self.reader.forward(2);
                } else {
                    self.reader.forward(1);
                }
                "\n"
            }
            '\u{2028}' => {
                self.reader.forward(1);
                "\u{2028}"
            }
            '\u{2029}' => {
                self.reader.forward(1);
                "\u{2029}"
            }
            _ => "",
        }
    }
}

impl Iterator for Scanner {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.get_token() {
            Ok(token) => token.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(input: &str) -> Result<Vec<Token>> {
        Scanner::new(Reader::new("<input>", input)?).collect()
    }

    fn ids(input: &str) -> Vec<&'static str> {
        scan(input).unwrap().iter().map(Token::id).collect()
    }

    fn scalars(input: &str) -> Vec<String> {
        scan(input)
            .unwrap()
            .into_iter()
            .filter_map(|token| match token.kind {
                TokenKind::Scalar { value, .. } => Some(value),
                _ => None,
            })
            .collect()
    }

    fn problem(input: &str) -> String {
        scan(input).unwrap_err().problem()
    }

    #[test]
    fn test_empty_stream() {
        assert_eq!(ids(""), vec!["<stream start>", "<stream end>"]);
    }

    #[test]
    fn test_simple_mapping_inserts_key_tokens() {
        assert_eq!(
            ids("a: 1\nb: 2\n"),
            vec![
                "<stream start>",
                "<block mapping start>",
                "'?'",
                "<scalar>",
                "':'",
                "<scalar>",
                "'?'",
                "<scalar>",
                "':'",
                "<scalar>",
                "<block end>",
                "<stream end>",
            ]
        );
    }

    #[test]
    fn test_nested_blocks_balance() {
        let tokens = ids("a:\n  b:\n    - 1\n    - 2\nc: 3\n");
        let opens = tokens
            .iter()
            .filter(|id| **id == "<block mapping start>" || **id == "<block sequence start>")
            .count();
        let closes = tokens.iter().filter(|id| **id == "<block end>").count();
        assert_eq!(opens, 3);
        assert_eq!(closes, 3);
    }

    #[test]
    fn test_indentless_sequence_has_no_start_token() {
        let tokens = ids("a:\n- 1\n- 2\n");
        assert!(!tokens.contains(&"<block sequence start>"));
        assert_eq!(tokens.iter().filter(|id| **id == "'-'").count(), 2);
    }

    #[test]
    fn test_flow_collections() {
        assert_eq!(
            ids("[a, {b: c}]"),
            vec![
                "<stream start>",
                "'['",
                "<scalar>",
                "','",
                "'{'",
                "'?'",
                "<scalar>",
                "':'",
                "<scalar>",
                "'}'",
                "']'",
                "<stream end>",
            ]
        );
    }

    #[test]
    fn test_plain_scalar_folding() {
        assert_eq!(scalars("a b\n  c\n\n  d"), vec!["a b c\nd"]);
    }

    #[test]
    fn test_single_quoted_escape() {
        assert_eq!(scalars("'it''s'"), vec!["it's"]);
    }

    #[test]
    fn test_double_quoted_escapes() {
        assert_eq!(
            scalars(r#""a\tb\x41\u00e9\U0001F600\\\"""#),
            vec!["a\tbA\u{e9}\u{1F600}\\\""]
        );
    }

    #[test]
    fn test_quoted_line_folding() {
        assert_eq!(scalars("\"one\n  two\"\n"), vec!["one two"]);
        assert_eq!(scalars("'one\n\n  two'\n"), vec!["one\ntwo"]);
    }

    #[test]
    fn test_double_quoted_escaped_line_break() {
        assert_eq!(scalars("\"one\\\n  two\"\n"), vec!["onetwo"]);
    }

    #[test]
    fn test_block_scalar_chomping() {
        assert_eq!(scalars("--- |\n  text\n\n\n"), vec!["text\n"]);
        assert_eq!(scalars("--- |-\n  text\n\n\n"), vec!["text"]);
        assert_eq!(scalars("--- |+\n  text\n\n\n"), vec!["text\n\n\n"]);
    }

    #[test]
    fn test_folded_block_scalar() {
        assert_eq!(
            scalars("--- >\n  one\n  two\n\n  three\n    indented\n  four\n"),
            vec!["one two\nthree\n  indented\nfour\n"]
        );
    }

    #[test]
    fn test_block_scalar_explicit_indent() {
        assert_eq!(scalars("--- |2\n   x\n  y\n"), vec![" x\ny\n"]);
    }

    #[test]
    fn test_tags() {
        let tokens = scan("[!!int 1, !<tag:x> 2, ! 3, !local 4]").unwrap();
        let tags: Vec<(Option<String>, String)> = tokens
            .into_iter()
            .filter_map(|token| match token.kind {
                TokenKind::Tag { handle, suffix } => Some((handle, suffix)),
                _ => None,
            })
            .collect();
        assert_eq!(
            tags,
            vec![
                (Some("!!".to_string()), "int".to_string()),
                (None, "tag:x".to_string()),
                (None, "!".to_string()),
                (Some("!".to_string()), "local".to_string()),
            ]
        );
    }

    #[test]
    fn test_uri_escapes_in_tags() {
        let tokens = scan("!<tag:a%20b> x").unwrap();
        assert!(tokens.iter().any(|token| token.kind
            == TokenKind::Tag {
                handle: None,
                suffix: "tag:a b".to_string()
            }));
    }

    #[test]
    fn test_directives() {
        let tokens = scan("%YAML 1.1\n%TAG !e! tag:example.com,2000:\n%FOO bar\n---\n").unwrap();
        let values: Vec<DirectiveValue> = tokens
            .into_iter()
            .filter_map(|token| match token.kind {
                TokenKind::Directive { value, .. } => Some(value),
                _ => None,
            })
            .collect();
        assert_eq!(
            values,
            vec![
                DirectiveValue::Version(1, 1),
                DirectiveValue::Tag {
                    handle: "!e!".to_string(),
                    prefix: "tag:example.com,2000:".to_string()
                },
                DirectiveValue::Reserved,
            ]
        );
    }

    #[test]
    fn test_anchor_and_alias() {
        let tokens = scan("- &a x\n- *a\n").unwrap();
        assert!(tokens
            .iter()
            .any(|token| token.kind == TokenKind::Anchor("a".to_string())));
        assert!(tokens
            .iter()
            .any(|token| token.kind == TokenKind::Alias("a".to_string())));
    }

    #[test]
    fn test_bom_is_skipped() {
        assert_eq!(scalars("\u{FEFF}a"), vec!["a"]);
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(scalars("# c\na # trailing\n# end"), vec!["a"]);
    }

    #[test]
    fn test_tab_cannot_start_token() {
        assert_eq!(
            problem("a:\n\tb: 1\n"),
            "found character '\\t' that cannot start any token"
        );
    }

    #[test]
    fn test_mapping_values_not_allowed() {
        assert_eq!(problem("a: b: c\n"), "mapping values are not allowed here");
    }

    #[test]
    fn test_sequence_entries_not_allowed() {
        assert_eq!(problem("a: - b\n"), "sequence entries are not allowed here");
    }

    #[test]
    fn test_required_simple_key_must_have_value() {
        let err = scan("a: 1\nb\nc: 2\n").unwrap_err();
        assert_eq!(err.problem(), "could not find expected ':'");
        assert_eq!(
            err.marked().unwrap().context.as_deref(),
            Some("while scanning a simple key")
        );
    }

    #[test]
    fn test_colon_in_flow_plain_scalar() {
        let err = scan("{a:b}").unwrap_err();
        assert_eq!(err.problem(), "found unexpected ':'");
        assert!(err.marked().unwrap().note.is_some());
    }

    #[test]
    fn test_unknown_escape() {
        assert_eq!(problem(r#""\q""#), "found unknown escape character 'q'");
    }

    #[test]
    fn test_zero_indentation_indicator() {
        assert_eq!(
            problem("a: |0\n  x\n"),
            "expected indentation indicator in the range 1-9, but found 0"
        );
    }

    #[test]
    fn test_document_separator_in_quoted_scalar() {
        assert_eq!(
            problem("'a\n---\n'"),
            "found unexpected document separator"
        );
    }

    #[test]
    fn test_marks() {
        let tokens = scan("a:\n  b: c\n").unwrap();
        let scalar = tokens
            .iter()
            .find(|token| matches!(&token.kind, TokenKind::Scalar { value, .. } if value == "b"))
            .unwrap();
        assert_eq!((scalar.start_mark.line, scalar.start_mark.column), (1, 2));
        assert_eq!(scalar.end_mark.column, 3);
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let mut scanner = Scanner::new(Reader::new("t", "a: b: c").unwrap());
        let results: Vec<_> = scanner.by_ref().collect();
        assert!(results.last().unwrap().is_err());
        assert!(scanner.next().is_none());
    }
}
