//! Tokens produced by the scanner.

use std::fmt;

use crate::error::Mark;

/// How a scalar was written in the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    /// `|` block scalar.
    Literal,
    /// `>` block scalar.
    Folded,
}

impl ScalarStyle {
    /// The indicator character for this style, as used in event dumps.
    pub fn indicator(self) -> char {
        match self {
            ScalarStyle::Plain => ':',
            ScalarStyle::SingleQuoted => '\'',
            ScalarStyle::DoubleQuoted => '"',
            ScalarStyle::Literal => '|',
            ScalarStyle::Folded => '>',
        }
    }
}

/// The value carried by a `%` directive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DirectiveValue {
    /// `%YAML major.minor`
    Version(u32, u32),
    /// `%TAG handle prefix`
    Tag { handle: String, prefix: String },
    /// Any other directive. Its parameters are skipped.
    Reserved,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    StreamStart,
    StreamEnd,
    Directive { name: String, value: DirectiveValue },
    /// `---`
    DocumentStart,
    /// `...`
    DocumentEnd,
    /// Synthesized when a block sequence begins at a new indentation level.
    BlockSequenceStart,
    /// Synthesized when a block mapping begins at a new indentation level.
    BlockMappingStart,
    /// Synthesized when indentation decreases past an open block collection.
    BlockEnd,
    FlowSequenceStart,
    FlowMappingStart,
    FlowSequenceEnd,
    FlowMappingEnd,
    /// `-` in block context.
    BlockEntry,
    /// `,`
    FlowEntry,
    /// `?`, or synthesized in front of a simple key.
    Key,
    /// `:`
    Value,
    Alias(String),
    Anchor(String),
    /// A tag as written. `handle` is `None` for verbatim `!<...>` tags and for
    /// the bare non-specific `!`.
    Tag { handle: Option<String>, suffix: String },
    Scalar {
        value: String,
        plain: bool,
        style: ScalarStyle,
    },
}

impl TokenKind {
    /// Short identifier used in error messages.
    pub fn id(&self) -> &'static str {
        match self {
            TokenKind::StreamStart => "<stream start>",
            TokenKind::StreamEnd => "<stream end>",
            TokenKind::Directive { .. } => "<directive>",
            TokenKind::DocumentStart => "<document start>",
            TokenKind::DocumentEnd => "<document end>",
            TokenKind::BlockSequenceStart => "<block sequence start>",
            TokenKind::BlockMappingStart => "<block mapping start>",
            TokenKind::BlockEnd => "<block end>",
            TokenKind::FlowSequenceStart => "'['",
            TokenKind::FlowMappingStart => "'{'",
            TokenKind::FlowSequenceEnd => "']'",
            TokenKind::FlowMappingEnd => "'}'",
            TokenKind::BlockEntry => "'-'",
            TokenKind::FlowEntry => "','",
            TokenKind::Key => "'?'",
            TokenKind::Value => "':'",
            TokenKind::Alias(_) => "<alias>",
            TokenKind::Anchor(_) => "<anchor>",
            TokenKind::Tag { .. } => "<tag>",
            TokenKind::Scalar { .. } => "<scalar>",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub start_mark: Mark,
    pub end_mark: Mark,
}

impl Token {
    pub fn new(kind: TokenKind, start_mark: Mark, end_mark: Mark) -> Self {
        Self {
            kind,
            start_mark,
            end_mark,
        }
    }

    pub fn id(&self) -> &'static str {
        self.kind.id()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())?;
        match &self.kind {
            TokenKind::Directive { name, value } => match value {
                DirectiveValue::Version(major, minor) => {
                    write!(f, " %{} {}.{}", name, major, minor)
                }
                DirectiveValue::Tag { handle, prefix } => {
                    write!(f, " %{} {} {}", name, handle, prefix)
                }
                DirectiveValue::Reserved => write!(f, " %{}", name),
            },
            TokenKind::Alias(name) => write!(f, " *{}", name),
            TokenKind::Anchor(name) => write!(f, " &{}", name),
            TokenKind::Tag { handle, suffix } => match handle {
                Some(handle) => write!(f, " {}{}", handle, suffix),
                None => write!(f, " {}", suffix),
            },
            TokenKind::Scalar { value, style, .. } => {
                write!(f, " {}{:?}", style.indicator(), value)
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_display() {
        let mark = Mark::detached("t", 0, 0, 0);
        let token = Token::new(
            TokenKind::Scalar {
                value: "a b".to_string(),
                plain: true,
                style: ScalarStyle::Plain,
            },
            mark.clone(),
            mark.clone(),
        );
        assert_eq!(token.to_string(), "<scalar> :\"a b\"");
        let token = Token::new(TokenKind::Anchor("x".to_string()), mark.clone(), mark);
        assert_eq!(token.to_string(), "<anchor> &x");
    }

    #[test]
    fn test_punctuation_ids_are_quoted() {
        assert_eq!(TokenKind::Value.id(), "':'");
        assert_eq!(TokenKind::BlockEnd.id(), "<block end>");
    }
}
