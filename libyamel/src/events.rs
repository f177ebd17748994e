//! Events produced by the parser.
//!
//! Events describe the document structure as a flat stream: collection
//! start and end events bracket their contents, scalars and aliases stand
//! alone.

use std::fmt;

use crate::error::Mark;
pub use crate::tokens::ScalarStyle;

#[derive(Clone, Debug, PartialEq)]
pub enum EventKind {
    StreamStart,
    StreamEnd,
    DocumentStart {
        /// Whether the document began with `---`.
        explicit: bool,
        version: Option<(u32, u32)>,
        /// Handles declared with `%TAG` for this document, in declaration order.
        tags: Option<Vec<(String, String)>>,
    },
    DocumentEnd {
        /// Whether the document ended with `...`.
        explicit: bool,
    },
    Alias {
        anchor: String,
    },
    Scalar {
        anchor: Option<String>,
        tag: Option<String>,
        /// `(plain_implicit, quoted_implicit)`. The first is set when the tag
        /// may be resolved from the value as a plain scalar, the second when
        /// it may be resolved as a non-plain one.
        implicit: (bool, bool),
        value: String,
        style: ScalarStyle,
    },
    SequenceStart {
        anchor: Option<String>,
        tag: Option<String>,
        implicit: bool,
        flow_style: bool,
    },
    SequenceEnd,
    MappingStart {
        anchor: Option<String>,
        tag: Option<String>,
        implicit: bool,
        flow_style: bool,
    },
    MappingEnd,
}

impl EventKind {
    /// Short identifier used in error messages.
    pub fn id(&self) -> &'static str {
        match self {
            EventKind::StreamStart => "<stream start>",
            EventKind::StreamEnd => "<stream end>",
            EventKind::DocumentStart { .. } => "<document start>",
            EventKind::DocumentEnd { .. } => "<document end>",
            EventKind::Alias { .. } => "<alias>",
            EventKind::Scalar { .. } => "<scalar>",
            EventKind::SequenceStart { .. } => "<sequence start>",
            EventKind::SequenceEnd => "<sequence end>",
            EventKind::MappingStart { .. } => "<mapping start>",
            EventKind::MappingEnd => "<mapping end>",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub start_mark: Mark,
    pub end_mark: Mark,
}

impl Event {
    pub fn new(kind: EventKind, start_mark: Mark, end_mark: Mark) -> Self {
        Self {
            kind,
            start_mark,
            end_mark,
        }
    }

    /// The anchor defined on this event, if any.
    pub fn anchor(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Scalar { anchor, .. }
            | EventKind::SequenceStart { anchor, .. }
            | EventKind::MappingStart { anchor, .. } => anchor.as_deref(),
            _ => None,
        }
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0"),
            '\u{08}' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out
}

fn write_properties(
    f: &mut fmt::Formatter<'_>,
    anchor: &Option<String>,
    tag: &Option<String>,
) -> fmt::Result {
    if let Some(anchor) = anchor {
        write!(f, " &{}", anchor)?;
    }
    if let Some(tag) = tag {
        write!(f, " <{}>", tag)?;
    }
    Ok(())
}

/// One line of the event tree notation, e.g. `+MAP {} &a` or `=VAL :text`.
impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EventKind::StreamStart => write!(f, "+STR"),
            EventKind::StreamEnd => write!(f, "-STR"),
            EventKind::DocumentStart { explicit, .. } => {
                write!(f, "+DOC{}", if *explicit { " ---" } else { "" })
            }
            EventKind::DocumentEnd { explicit } => {
                write!(f, "-DOC{}", if *explicit { " ..." } else { "" })
            }
            EventKind::Alias { anchor } => write!(f, "=ALI *{}", anchor),
            EventKind::Scalar {
                anchor,
                tag,
                value,
                style,
                ..
            } => {
                write!(f, "=VAL")?;
                write_properties(f, anchor, tag)?;
                write!(f, " {}{}", style.indicator(), escape(value))
            }
            EventKind::SequenceStart {
                anchor,
                tag,
                flow_style,
                ..
            } => {
                write!(f, "+SEQ{}", if *flow_style { " []" } else { "" })?;
                write_properties(f, anchor, tag)
            }
            EventKind::SequenceEnd => write!(f, "-SEQ"),
            EventKind::MappingStart {
                anchor,
                tag,
                flow_style,
                ..
            } => {
                write!(f, "+MAP{}", if *flow_style { " {}" } else { "" })?;
                write_properties(f, anchor, tag)
            }
            EventKind::MappingEnd => write!(f, "-MAP"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EventKind) -> Event {
        let mark = Mark::detached("t", 0, 0, 0);
        Event::new(kind, mark.clone(), mark)
    }

    #[test]
    fn test_scalar_notation() {
        let e = event(EventKind::Scalar {
            anchor: Some("a".to_string()),
            tag: Some("tag:yaml.org,2002:str".to_string()),
            implicit: (false, false),
            value: "line\none\\".to_string(),
            style: ScalarStyle::DoubleQuoted,
        });
        assert_eq!(e.to_string(), "=VAL &a <tag:yaml.org,2002:str> \"line\\none\\\\");
        assert_eq!(e.anchor(), Some("a"));
    }

    #[test]
    fn test_collection_notation() {
        let e = event(EventKind::MappingStart {
            anchor: None,
            tag: None,
            implicit: true,
            flow_style: true,
        });
        assert_eq!(e.to_string(), "+MAP {}");
        let e = event(EventKind::DocumentEnd { explicit: true });
        assert_eq!(e.to_string(), "-DOC ...");
        assert_eq!(e.kind.id(), "<document end>");
        assert_eq!(EventKind::SequenceEnd.id(), "<sequence end>");
    }
}
