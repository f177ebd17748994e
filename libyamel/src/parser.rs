//! Stage 3: Parser
//!
//! The parser checks the token stream against the YAML grammar and emits
//! events. It is an explicit state machine: each call produces exactly one
//! event and records the state to resume from, with a stack of return
//! states for nested collections.
//!
//! ```text
//! stream            ::= STREAM-START implicit_document? explicit_document* STREAM-END
//! implicit_document ::= block_node DOCUMENT-END*
//! explicit_document ::= DIRECTIVE* DOCUMENT-START block_node? DOCUMENT-END*
//! block_node        ::= ALIAS | properties block_content? | block_content
//! flow_node         ::= ALIAS | properties flow_content? | flow_content
//! properties        ::= TAG ANCHOR? | ANCHOR TAG?
//! block_collection  ::= block_sequence | block_mapping
//! block_sequence    ::= BLOCK-SEQUENCE-START (BLOCK-ENTRY block_node?)* BLOCK-END
//! indentless_sequence ::= (BLOCK-ENTRY block_node?)+
//! block_mapping     ::= BLOCK-MAPPING-START
//!                       ((KEY block_node_or_indentless_sequence?)?
//!                       (VALUE block_node_or_indentless_sequence?)?)* BLOCK-END
//! flow_sequence     ::= FLOW-SEQUENCE-START
//!                       (flow_sequence_entry FLOW-ENTRY)* flow_sequence_entry?
//!                       FLOW-SEQUENCE-END
//! flow_mapping      ::= FLOW-MAPPING-START
//!                       (flow_mapping_entry FLOW-ENTRY)* flow_mapping_entry?
//!                       FLOW-MAPPING-END
//! ```

use std::collections::HashMap;

use crate::error::{Error, Mark, MarkedError, Result};
use crate::events::{Event, EventKind, ScalarStyle};
use crate::scanner::Scanner;
use crate::tokens::{DirectiveValue, Token, TokenKind};

const DEFAULT_TAGS: [(&str, &str); 2] = [("!", "!"), ("!!", "tag:yaml.org,2002:")];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    StreamStart,
    ImplicitDocumentStart,
    DocumentStart,
    DocumentEnd,
    DocumentContent,
    BlockNode,
    BlockSequenceFirstEntry,
    BlockSequenceEntry,
    IndentlessSequenceEntry,
    BlockMappingFirstKey,
    BlockMappingKey,
    BlockMappingValue,
    FlowSequenceFirstEntry,
    FlowSequenceEntry,
    FlowSequenceEntryMappingKey,
    FlowSequenceEntryMappingValue,
    FlowSequenceEntryMappingEnd,
    FlowMappingFirstKey,
    FlowMappingKey,
    FlowMappingValue,
    FlowMappingEmptyValue,
}

fn parser_error(problem: String, mark: Mark) -> Error {
    Error::Parser(MarkedError::new(problem, Some(mark)))
}

fn parser_error_in(
    context: &str,
    context_mark: Option<Mark>,
    problem: String,
    mark: Mark,
) -> Error {
    Error::Parser(MarkedError::new(problem, Some(mark)).with_context(context, context_mark))
}

fn end_of_tokens() -> Error {
    Error::Parser(MarkedError::new("unexpected end of the token stream", None))
}

/// Pull-based event producer over a [`Scanner`].
pub struct Parser {
    scanner: Scanner,
    current: Option<Event>,
    state: Option<State>,
    states: Vec<State>,
    /// Start marks of the open collections, for error context.
    marks: Vec<Mark>,
    yaml_version: Option<(u32, u32)>,
    tag_handles: HashMap<String, String>,
    failed: bool,
}

impl Parser {
    pub fn new(scanner: Scanner) -> Self {
        Self {
            scanner,
            current: None,
            state: Some(State::StreamStart),
            states: Vec::new(),
            marks: Vec::new(),
            yaml_version: None,
            tag_handles: HashMap::new(),
            failed: false,
        }
    }

    /// Whether another event is available.
    pub fn check_event(&mut self) -> Result<bool> {
        Ok(self.peek_event()?.is_some())
    }

    /// The next event, without consuming it.
    pub fn peek_event(&mut self) -> Result<Option<&Event>> {
        if self.current.is_none() {
            self.current = self.next_event()?;
        }
        Ok(self.current.as_ref())
    }

    /// Consume the next event.
    pub fn get_event(&mut self) -> Result<Option<Event>> {
        self.peek_event()?;
        Ok(self.current.take())
    }

    /// The current position of the underlying reader.
    pub fn mark(&self) -> Mark {
        self.scanner.mark()
    }

    fn next_event(&mut self) -> Result<Option<Event>> {
        let Some(state) = self.state.take() else {
            return Ok(None);
        };
        let event = match state {
            State::StreamStart => self.parse_stream_start(),
            State::ImplicitDocumentStart => self.parse_implicit_document_start(),
            State::DocumentStart => self.parse_document_start(),
            State::DocumentEnd => self.parse_document_end(),
            State::DocumentContent => self.parse_document_content(),
            State::BlockNode => self.parse_node(true, false),
            State::BlockSequenceFirstEntry => self.parse_block_sequence_first_entry(),
            State::BlockSequenceEntry => self.parse_block_sequence_entry(),
            State::IndentlessSequenceEntry => self.parse_indentless_sequence_entry(),
            State::BlockMappingFirstKey => self.parse_block_mapping_first_key(),
            State::BlockMappingKey => self.parse_block_mapping_key(),
            State::BlockMappingValue => self.parse_block_mapping_value(),
            State::FlowSequenceFirstEntry => self.parse_flow_sequence_first_entry(),
            State::FlowSequenceEntry => self.parse_flow_sequence_entry(false),
            State::FlowSequenceEntryMappingKey => self.parse_flow_sequence_entry_mapping_key(),
            State::FlowSequenceEntryMappingValue => {
                self.parse_flow_sequence_entry_mapping_value()
            }
            State::FlowSequenceEntryMappingEnd => self.parse_flow_sequence_entry_mapping_end(),
            State::FlowMappingFirstKey => self.parse_flow_mapping_first_key(),
            State::FlowMappingKey => self.parse_flow_mapping_key(false),
            State::FlowMappingValue => self.parse_flow_mapping_value(),
            State::FlowMappingEmptyValue => self.parse_flow_mapping_empty_value(),
        }?;
        tracing::trace!(event = %event, "parsed");
        Ok(Some(event))
    }

    // Token access

    fn peek_token(&mut self) -> Result<&Token> {
        match self.scanner.peek_token()? {
            Some(token) => Ok(token),
            None => Err(end_of_tokens()),
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        self.scanner.get_token()?.ok_or_else(end_of_tokens)
    }

    fn check(&mut self, matches: impl Fn(&TokenKind) -> bool) -> Result<bool> {
        Ok(matches(&self.peek_token()?.kind))
    }

    fn peek_start_mark(&mut self) -> Result<Mark> {
        Ok(self.peek_token()?.start_mark.clone())
    }

    fn pop_state(&mut self) {
        self.state = self.states.pop();
    }

    // Stream and documents

    fn parse_stream_start(&mut self) -> Result<Event> {
        let token = self.next_token()?;
        self.state = Some(State::ImplicitDocumentStart);
        Ok(Event::new(EventKind::StreamStart, token.start_mark, token.end_mark))
    }

    fn parse_implicit_document_start(&mut self) -> Result<Event> {
        if self.check(|kind| {
            matches!(
                kind,
                TokenKind::Directive { .. } | TokenKind::DocumentStart | TokenKind::StreamEnd
            )
        })? {
            return self.parse_document_start();
        }
        self.tag_handles = DEFAULT_TAGS
            .iter()
            .map(|(handle, prefix)| (handle.to_string(), prefix.to_string()))
            .collect();
        let mark = self.peek_start_mark()?;
        self.states.push(State::DocumentEnd);
        self.state = Some(State::BlockNode);
        Ok(Event::new(
            EventKind::DocumentStart {
                explicit: false,
                version: None,
                tags: None,
            },
            mark.clone(),
            mark,
        ))
    }

    fn parse_document_start(&mut self) -> Result<Event> {
        while self.check(|kind| matches!(kind, TokenKind::DocumentEnd))? {
            self.next_token()?;
        }

        if self.check(|kind| matches!(kind, TokenKind::StreamEnd))? {
            let token = self.next_token()?;
            debug_assert!(self.states.is_empty());
            debug_assert!(self.marks.is_empty());
            self.state = None;
            return Ok(Event::new(EventKind::StreamEnd, token.start_mark, token.end_mark));
        }

        let start_mark = self.peek_start_mark()?;
        let (version, tags) = self.process_directives()?;
        if !self.check(|kind| matches!(kind, TokenKind::DocumentStart))? {
            let token = self.peek_token()?;
            return Err(parser_error(
                format!("expected '<document start>', but found {}", token.id()),
                token.start_mark.clone(),
            ));
        }
        let token = self.next_token()?;
        self.states.push(State::DocumentEnd);
        self.state = Some(State::DocumentContent);
        Ok(Event::new(
            EventKind::DocumentStart {
                explicit: true,
                version,
                tags,
            },
            start_mark,
            token.end_mark,
        ))
    }

    fn parse_document_end(&mut self) -> Result<Event> {
        let start_mark = self.peek_start_mark()?;
        let mut end_mark = start_mark.clone();
        let mut explicit = false;
        if self.check(|kind| matches!(kind, TokenKind::DocumentEnd))? {
            let token = self.next_token()?;
            end_mark = token.end_mark;
            explicit = true;
        }
        self.state = Some(State::DocumentStart);
        Ok(Event::new(
            EventKind::DocumentEnd { explicit },
            start_mark,
            end_mark,
        ))
    }

    fn parse_document_content(&mut self) -> Result<Event> {
        if self.check(|kind| {
            matches!(
                kind,
                TokenKind::Directive { .. }
                    | TokenKind::DocumentStart
                    | TokenKind::DocumentEnd
                    | TokenKind::StreamEnd
            )
        })? {
            let mark = self.peek_start_mark()?;
            self.pop_state();
            return Ok(empty_scalar(mark));
        }
        self.parse_node(true, false)
    }

    /// Consume the directives in front of an explicit document and install
    /// its tag handles. Returns the declared version and the declared handles.
    #[allow(clippy::type_complexity)]
    fn process_directives(
        &mut self,
    ) -> Result<(Option<(u32, u32)>, Option<Vec<(String, String)>>)> {
        self.yaml_version = None;
        self.tag_handles.clear();
        let mut declared = Vec::new();

        while self.check(|kind| matches!(kind, TokenKind::Directive { .. }))? {
            let token = self.next_token()?;
            let TokenKind::Directive { value, .. } = token.kind else {
                continue;
            };
            match value {
                DirectiveValue::Version(major, minor) => {
                    if self.yaml_version.is_some() {
                        return Err(parser_error(
                            "found duplicate YAML directive".to_string(),
                            token.start_mark,
                        ));
                    }
                    if major != 1 {
                        return Err(parser_error(
                            "found incompatible YAML document (version 1.* is required)"
                                .to_string(),
                            token.start_mark,
                        ));
                    }
                    self.yaml_version = Some((major, minor));
                }
                DirectiveValue::Tag { handle, prefix } => {
                    if self.tag_handles.contains_key(&handle) {
                        return Err(parser_error(
                            format!("duplicate tag handle {}", handle),
                            token.start_mark,
                        ));
                    }
                    self.tag_handles.insert(handle.clone(), prefix.clone());
                    declared.push((handle, prefix));
                }
                DirectiveValue::Reserved => {
                    tracing::debug!(mark = ?token.start_mark, "ignoring reserved directive");
                }
            }
        }

        let tags = if declared.is_empty() {
            None
        } else {
            Some(declared)
        };
        for (handle, prefix) in DEFAULT_TAGS {
            self.tag_handles
                .entry(handle.to_string())
                .or_insert_with(|| prefix.to_string());
        }
        Ok((self.yaml_version, tags))
    }

    // Nodes

    fn parse_node(&mut self, block: bool, indentless_sequence: bool) -> Result<Event> {
        if self.check(|kind| matches!(kind, TokenKind::Alias(_)))? {
            let token = self.next_token()?;
            let TokenKind::Alias(anchor) = token.kind else {
                unreachable!("checked for an alias token");
            };
            self.pop_state();
            return Ok(Event::new(
                EventKind::Alias { anchor },
                token.start_mark,
                token.end_mark,
            ));
        }

        let mut anchor = None;
        let mut tag_parts = None;
        let mut start_mark = None;
        let mut end_mark = None;
        let mut tag_mark = None;

        if self.check(|kind| matches!(kind, TokenKind::Anchor(_)))? {
            let token = self.next_token()?;
            start_mark = Some(token.start_mark);
            end_mark = Some(token.end_mark);
            if let TokenKind::Anchor(name) = token.kind {
                anchor = Some(name);
            }
            if self.check(|kind| matches!(kind, TokenKind::Tag { .. }))? {
                let token = self.next_token()?;
                tag_mark = Some(token.start_mark);
                end_mark = Some(token.end_mark);
                if let TokenKind::Tag { handle, suffix } = token.kind {
                    tag_parts = Some((handle, suffix));
                }
            }
        } else if self.check(|kind| matches!(kind, TokenKind::Tag { .. }))? {
            let token = self.next_token()?;
            start_mark = Some(token.start_mark.clone());
            tag_mark = Some(token.start_mark);
            end_mark = Some(token.end_mark);
            if let TokenKind::Tag { handle, suffix } = token.kind {
                tag_parts = Some((handle, suffix));
            }
            if self.check(|kind| matches!(kind, TokenKind::Anchor(_)))? {
                let token = self.next_token()?;
                end_mark = Some(token.end_mark);
                if let TokenKind::Anchor(name) = token.kind {
                    anchor = Some(name);
                }
            }
        }

        let tag = match tag_parts {
            None => None,
            Some((None, suffix)) => Some(suffix),
            Some((Some(handle), suffix)) => match self.tag_handles.get(&handle) {
                Some(prefix) => Some(format!("{}{}", prefix, suffix)),
                None => {
                    return Err(parser_error_in(
                        "while parsing a node",
                        start_mark,
                        format!("found undefined tag handle {}", handle),
                        tag_mark.unwrap_or_else(|| self.scanner.mark()),
                    ));
                }
            },
        };

        let (start_mark, mut end_mark) = match (start_mark, end_mark) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                let mark = self.peek_start_mark()?;
                (mark.clone(), mark)
            }
        };
        let implicit = tag.is_none() || tag.as_deref() == Some("!");

        if indentless_sequence && self.check(|kind| matches!(kind, TokenKind::BlockEntry))? {
            end_mark = self.peek_token()?.end_mark.clone();
            self.state = Some(State::IndentlessSequenceEntry);
            return Ok(Event::new(
                EventKind::SequenceStart {
                    anchor,
                    tag,
                    implicit,
                    flow_style: false,
                },
                start_mark,
                end_mark,
            ));
        }

        let token = self.peek_token()?;
        let (kind, next_state, end) = match &token.kind {
            TokenKind::Scalar { .. } => {
                let token = self.next_token()?;
                let TokenKind::Scalar { value, plain, style } = token.kind else {
                    unreachable!("checked for a scalar token");
                };
                let implicit = if (plain && tag.is_none()) || tag.as_deref() == Some("!") {
                    (true, false)
                } else if tag.is_none() {
                    (false, true)
                } else {
                    (false, false)
                };
                self.pop_state();
                return Ok(Event::new(
                    EventKind::Scalar {
                        anchor,
                        tag,
                        implicit,
                        value,
                        style,
                    },
                    start_mark,
                    token.end_mark,
                ));
            }
            TokenKind::FlowSequenceStart => (
                EventKind::SequenceStart {
                    anchor,
                    tag,
                    implicit,
                    flow_style: true,
                },
                State::FlowSequenceFirstEntry,
                token.end_mark.clone(),
            ),
            TokenKind::FlowMappingStart => (
                EventKind::MappingStart {
                    anchor,
                    tag,
                    implicit,
                    flow_style: true,
                },
                State::FlowMappingFirstKey,
                token.end_mark.clone(),
            ),
            TokenKind::BlockSequenceStart if block => (
                EventKind::SequenceStart {
                    anchor,
                    tag,
                    implicit,
                    flow_style: false,
                },
                State::BlockSequenceFirstEntry,
                token.start_mark.clone(),
            ),
            TokenKind::BlockMappingStart if block => (
                EventKind::MappingStart {
                    anchor,
                    tag,
                    implicit,
                    flow_style: false,
                },
                State::BlockMappingFirstKey,
                token.start_mark.clone(),
            ),
            _ if anchor.is_some() || tag.is_some() => {
                // Properties without content: an empty scalar.
                self.pop_state();
                return Ok(Event::new(
                    EventKind::Scalar {
                        anchor,
                        tag,
                        implicit: (implicit, false),
                        value: String::new(),
                        style: ScalarStyle::Plain,
                    },
                    start_mark,
                    end_mark,
                ));
            }
            _ => {
                let context = if block {
                    "while parsing a block node"
                } else {
                    "while parsing a flow node"
                };
                return Err(parser_error_in(
                    context,
                    Some(start_mark),
                    format!("expected the node content, but found {}", token.id()),
                    token.start_mark.clone(),
                ));
            }
        };
        self.state = Some(next_state);
        Ok(Event::new(kind, start_mark, end))
    }

    // Block sequences

    fn parse_block_sequence_first_entry(&mut self) -> Result<Event> {
        let token = self.next_token()?;
        self.marks.push(token.start_mark);
        self.parse_block_sequence_entry()
    }

    fn parse_block_sequence_entry(&mut self) -> Result<Event> {
        if self.check(|kind| matches!(kind, TokenKind::BlockEntry))? {
            let token = self.next_token()?;
            if !self.check(|kind| matches!(kind, TokenKind::BlockEntry | TokenKind::BlockEnd))? {
                self.states.push(State::BlockSequenceEntry);
                return self.parse_node(true, false);
            }
            self.state = Some(State::BlockSequenceEntry);
            return Ok(empty_scalar(token.end_mark));
        }
        if !self.check(|kind| matches!(kind, TokenKind::BlockEnd))? {
            let context_mark = self.marks.last().cloned();
            let token = self.peek_token()?;
            return Err(parser_error_in(
                "while parsing a block collection",
                context_mark,
                format!("expected <block end>, but found {}", token.id()),
                token.start_mark.clone(),
            ));
        }
        let token = self.next_token()?;
        self.pop_state();
        self.marks.pop();
        Ok(Event::new(EventKind::SequenceEnd, token.start_mark, token.end_mark))
    }

    fn parse_indentless_sequence_entry(&mut self) -> Result<Event> {
        if self.check(|kind| matches!(kind, TokenKind::BlockEntry))? {
            let token = self.next_token()?;
            if !self.check(|kind| {
                matches!(
                    kind,
                    TokenKind::BlockEntry | TokenKind::Key | TokenKind::Value | TokenKind::BlockEnd
                )
            })? {
                self.states.push(State::IndentlessSequenceEntry);
                return self.parse_node(true, false);
            }
            self.state = Some(State::IndentlessSequenceEntry);
            return Ok(empty_scalar(token.end_mark));
        }
        let mark = self.peek_start_mark()?;
        self.pop_state();
        Ok(Event::new(EventKind::SequenceEnd, mark.clone(), mark))
    }

    // Block mappings

    fn parse_block_mapping_first_key(&mut self) -> Result<Event> {
        let token = self.next_token()?;
        self.marks.push(token.start_mark);
        self.parse_block_mapping_key()
    }

    fn parse_block_mapping_key(&mut self) -> Result<Event> {
        if self.check(|kind| matches!(kind, TokenKind::Key))? {
            let token = self.next_token()?;
            if !self.check(|kind| {
                matches!(kind, TokenKind::Key | TokenKind::Value | TokenKind::BlockEnd)
            })? {
                self.states.push(State::BlockMappingValue);
                return self.parse_node(true, true);
            }
            self.state = Some(State::BlockMappingValue);
            return Ok(empty_scalar(token.end_mark));
        }
        if !self.check(|kind| matches!(kind, TokenKind::BlockEnd))? {
            let context_mark = self.marks.last().cloned();
            let token = self.peek_token()?;
            return Err(parser_error_in(
                "while parsing a block mapping",
                context_mark,
                format!("expected <block end>, but found {}", token.id()),
                token.start_mark.clone(),
            ));
        }
        let token = self.next_token()?;
        self.pop_state();
        self.marks.pop();
        Ok(Event::new(EventKind::MappingEnd, token.start_mark, token.end_mark))
    }

    fn parse_block_mapping_value(&mut self) -> Result<Event> {
        if self.check(|kind| matches!(kind, TokenKind::Value))? {
            let token = self.next_token()?;
            if !self.check(|kind| {
                matches!(kind, TokenKind::Key | TokenKind::Value | TokenKind::BlockEnd)
            })? {
                self.states.push(State::BlockMappingKey);
                return self.parse_node(true, true);
            }
            self.state = Some(State::BlockMappingKey);
            return Ok(empty_scalar(token.end_mark));
        }
        self.state = Some(State::BlockMappingKey);
        let mark = self.peek_start_mark()?;
        Ok(empty_scalar(mark))
    }

    // Flow sequences

    fn parse_flow_sequence_first_entry(&mut self) -> Result<Event> {
        let token = self.next_token()?;
        self.marks.push(token.start_mark);
        self.parse_flow_sequence_entry(true)
    }

    fn parse_flow_sequence_entry(&mut self, first: bool) -> Result<Event> {
        if !self.check(|kind| matches!(kind, TokenKind::FlowSequenceEnd))? {
            if !first {
                if self.check(|kind| matches!(kind, TokenKind::FlowEntry))? {
                    self.next_token()?;
                } else {
                    let context_mark = self.marks.last().cloned();
                    let token = self.peek_token()?;
                    return Err(parser_error_in(
                        "while parsing a flow sequence",
                        context_mark,
                        format!("expected ',' or ']', but got {}", token.id()),
                        token.start_mark.clone(),
                    ));
                }
            }

            if self.check(|kind| matches!(kind, TokenKind::Key))? {
                // A single-pair mapping inside a flow sequence: `[a: b]`.
                let token = self.peek_token()?;
                let (start_mark, end_mark) = (token.start_mark.clone(), token.end_mark.clone());
                self.state = Some(State::FlowSequenceEntryMappingKey);
                return Ok(Event::new(
                    EventKind::MappingStart {
                        anchor: None,
                        tag: None,
                        implicit: true,
                        flow_style: true,
                    },
                    start_mark,
                    end_mark,
                ));
            } else if !self.check(|kind| matches!(kind, TokenKind::FlowSequenceEnd))? {
                self.states.push(State::FlowSequenceEntry);
                return self.parse_node(false, false);
            }
        }
        let token = self.next_token()?;
        self.pop_state();
        self.marks.pop();
        Ok(Event::new(EventKind::SequenceEnd, token.start_mark, token.end_mark))
    }

    fn parse_flow_sequence_entry_mapping_key(&mut self) -> Result<Event> {
        let token = self.next_token()?;
        if !self.check(|kind| {
            matches!(
                kind,
                TokenKind::Value | TokenKind::FlowEntry | TokenKind::FlowSequenceEnd
            )
        })? {
            self.states.push(State::FlowSequenceEntryMappingValue);
            return self.parse_node(false, false);
        }
        self.state = Some(State::FlowSequenceEntryMappingValue);
        Ok(empty_scalar(token.end_mark))
    }

    fn parse_flow_sequence_entry_mapping_value(&mut self) -> Result<Event> {
        if self.check(|kind| matches!(kind, TokenKind::Value))? {
            let token = self.next_token()?;
            if !self.check(|kind| {
                matches!(kind, TokenKind::FlowEntry | TokenKind::FlowSequenceEnd)
            })? {
                self.states.push(State::FlowSequenceEntryMappingEnd);
                return self.parse_node(false, false);
            }
            self.state = Some(State::FlowSequenceEntryMappingEnd);
            return Ok(empty_scalar(token.end_mark));
        }
        self.state = Some(State::FlowSequenceEntryMappingEnd);
        let mark = self.peek_start_mark()?;
        Ok(empty_scalar(mark))
    }

    fn parse_flow_sequence_entry_mapping_end(&mut self) -> Result<Event> {
        self.state = Some(State::FlowSequenceEntry);
        let mark = self.peek_start_mark()?;
        Ok(Event::new(EventKind::MappingEnd, mark.clone(), mark))
    }

    // Flow mappings

    fn parse_flow_mapping_first_key(&mut self) -> Result<Event> {
        let token = self.next_token()?;
        self.marks.push(token.start_mark);
        self.parse_flow_mapping_key(true)
    }

    fn parse_flow_mapping_key(&mut self, first: bool) -> Result<Event> {
        if !self.check(|kind| matches!(kind, TokenKind::FlowMappingEnd))? {
            if !first {
                if self.check(|kind| matches!(kind, TokenKind::FlowEntry))? {
                    self.next_token()?;
                } else {
                    let context_mark = self.marks.last().cloned();
                    let token = self.peek_token()?;
                    return Err(parser_error_in(
                        "while parsing a flow mapping",
                        context_mark,
                        format!("expected ',' or '}}', but got {}", token.id()),
                        token.start_mark.clone(),
                    ));
                }
            }
            if self.check(|kind| matches!(kind, TokenKind::Key))? {
                let token = self.next_token()?;
                if !self.check(|kind| {
                    matches!(
                        kind,
                        TokenKind::Value | TokenKind::FlowEntry | TokenKind::FlowMappingEnd
                    )
                })? {
                    self.states.push(State::FlowMappingValue);
                    return self.parse_node(false, false);
                }
                self.state = Some(State::FlowMappingValue);
                return Ok(empty_scalar(token.end_mark));
            } else if !self.check(|kind| matches!(kind, TokenKind::FlowMappingEnd))? {
                self.states.push(State::FlowMappingEmptyValue);
                return self.parse_node(false, false);
            }
        }
        let token = self.next_token()?;
        self.pop_state();
        self.marks.pop();
        Ok(Event::new(EventKind::MappingEnd, token.start_mark, token.end_mark))
    }

    fn parse_flow_mapping_value(&mut self) -> Result<Event> {
        if self.check(|kind| matches!(kind, TokenKind::Value))? {
            let token = self.next_token()?;
            if !self.check(|kind| {
                matches!(kind, TokenKind::FlowEntry | TokenKind::FlowMappingEnd)
            })? {
                self.states.push(State::FlowMappingKey);
                return self.parse_node(false, false);
            }
            self.state = Some(State::FlowMappingKey);
            return Ok(empty_scalar(token.end_mark));
        }
        self.state = Some(State::FlowMappingKey);
        let mark = self.peek_start_mark()?;
        Ok(empty_scalar(mark))
    }

    fn parse_flow_mapping_empty_value(&mut self) -> Result<Event> {
        self.state = Some(State::FlowMappingKey);
        let mark = self.peek_start_mark()?;
        Ok(empty_scalar(mark))
    }
}

/// The implicit empty plain scalar that stands in for an omitted node.
fn empty_scalar(mark: Mark) -> Event {
    Event::new(
        EventKind::Scalar {
            anchor: None,
            tag: None,
            implicit: (true, false),
            value: String::new(),
            style: ScalarStyle::Plain,
        },
        mark.clone(),
        mark,
    )
}

impl Iterator for Parser {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.get_event() {
            Ok(event) => event.map(Ok),
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
    use crate::reader::Reader;
    use pretty_assertions::assert_eq;

    fn parse(input: &str) -> Result<Vec<Event>> {
        Parser::new(Scanner::new(Reader::new("<input>", input)?)).collect()
    }

    fn tree(input: &str) -> Vec<String> {
        parse(input)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    fn problem(input: &str) -> String {
        parse(input).unwrap_err().problem()
    }

    #[test]
    fn test_empty_stream() {
        assert_eq!(tree(""), vec!["+STR", "-STR"]);
    }

    #[test]
    fn test_block_mapping() {
        assert_eq!(
            tree("a: 1\nb:\n"),
            vec![
                "+STR", "+DOC", "+MAP", "=VAL :a", "=VAL :1", "=VAL :b", "=VAL :", "-MAP", "-DOC",
                "-STR"
            ]
        );
    }

    #[test]
    fn test_indentless_sequence() {
        assert_eq!(
            tree("k:\n- a\n-\n"),
            vec![
                "+STR", "+DOC", "+MAP", "=VAL :k", "+SEQ", "=VAL :a", "=VAL :", "-SEQ", "-MAP", "-DOC",
                "-STR"
            ]
        );
    }

    #[test]
    fn test_flow_sequence_pair() {
        assert_eq!(
            tree("[a: b, c]"),
            vec![
                "+STR", "+DOC", "+SEQ []", "+MAP {}", "=VAL :a", "=VAL :b", "-MAP", "=VAL :c", "-SEQ",
                "-DOC", "-STR"
            ]
        );
    }

    #[test]
    fn test_flow_mapping_without_values() {
        assert_eq!(
            tree("{a, b: }"),
            vec![
                "+STR", "+DOC", "+MAP {}", "=VAL :a", "=VAL :", "=VAL :b", "=VAL :", "-MAP", "-DOC",
                "-STR"
            ]
        );
    }

    #[test]
    fn test_explicit_documents() {
        assert_eq!(
            tree("--- a\n...\n--- b\n"),
            vec!["+STR", "+DOC ---", "=VAL :a", "-DOC ...", "+DOC ---", "=VAL :b", "-DOC", "-STR"]
        );
    }

    #[test]
    fn test_empty_explicit_document() {
        assert_eq!(
            tree("---\n...\n"),
            vec!["+STR", "+DOC ---", "=VAL :", "-DOC ...", "-STR"]
        );
    }

    #[test]
    fn test_tag_resolution_and_implicit_flags() {
        let events = parse("- !!str a\n- ! b\n- 'c'\n- d\n- !e! f\n").err();
        assert!(events.is_some());

        let events = parse("- !!str a\n- ! b\n- 'c'\n- d\n").unwrap();
        let scalars: Vec<(Option<String>, (bool, bool))> = events
            .into_iter()
            .filter_map(|event| match event.kind {
                EventKind::Scalar { tag, implicit, .. } => Some((tag, implicit)),
                _ => None,
            })
            .collect();
        assert_eq!(
            scalars,
            vec![
                (Some("tag:yaml.org,2002:str".to_string()), (false, false)),
                (Some("!".to_string()), (true, false)),
                (None, (false, true)),
                (None, (true, false)),
            ]
        );
    }

    #[test]
    fn test_tag_directive() {
        let events = parse("%TAG !e! tag:example.com,2000:\n--- !e!thing x\n").unwrap();
        match &events[1].kind {
            EventKind::DocumentStart { explicit, tags, .. } => {
                assert!(*explicit);
                assert_eq!(
                    tags.as_deref(),
                    Some(&[("!e!".to_string(), "tag:example.com,2000:".to_string())][..])
                );
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(events[2].to_string(), "=VAL <tag:example.com,2000:thing> :x");
    }

    #[test]
    fn test_tag_handles_reset_between_documents() {
        let err = parse("%TAG !e! tag:e,2000:\n--- !e!a x\n--- !e!b y\n").unwrap_err();
        assert_eq!(err.problem(), "found undefined tag handle !e!");
    }

    #[test]
    fn test_yaml_directive() {
        let events = parse("%YAML 1.1\n--- x\n").unwrap();
        assert!(matches!(
            events[1].kind,
            EventKind::DocumentStart {
                version: Some((1, 1)),
                ..
            }
        ));
        assert_eq!(problem("%YAML 1.1\n%YAML 1.1\n--- x\n"), "found duplicate YAML directive");
        assert_eq!(
            problem("%YAML 2.0\n--- x\n"),
            "found incompatible YAML document (version 1.* is required)"
        );
    }

    #[test]
    fn test_duplicate_tag_handle() {
        assert_eq!(
            problem("%TAG !a! tag:a:\n%TAG !a! tag:b:\n--- x\n"),
            "duplicate tag handle !a!"
        );
    }

    #[test]
    fn test_directive_requires_document_start() {
        assert_eq!(
            problem("%YAML 1.1\nx\n"),
            "expected '<document start>', but found <scalar>"
        );
    }

    #[test]
    fn test_properties_without_content() {
        let events = parse("a: &x\nb: !!str\n").unwrap();
        let values: Vec<String> = events.iter().map(ToString::to_string).collect();
        assert!(values.contains(&"=VAL &x :".to_string()));
        assert!(values.contains(&"=VAL <tag:yaml.org,2002:str> :".to_string()));
    }

    #[test]
    fn test_missing_block_end() {
        let err = parse("- a\nb: c\n").unwrap_err();
        assert_eq!(err.problem(), "expected <block end>, but found '?'");
        assert_eq!(
            err.marked().unwrap().context.as_deref(),
            Some("while parsing a block collection")
        );
    }

    #[test]
    fn test_unclosed_flow_sequence() {
        let err = parse("[a, b").unwrap_err();
        assert_eq!(err.problem(), "expected ',' or ']', but got <stream end>");
    }

    #[test]
    fn test_alias_event() {
        assert!(tree("- &a x\n- *a\n").contains(&"=ALI *a".to_string()));
    }
}
