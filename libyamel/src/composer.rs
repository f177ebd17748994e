//! Stage 4: Composer
//!
//! The composer builds one [`Document`] at a time from parser events. Tags
//! missing from the source are filled in by the [`Resolver`]. Anchors are
//! recorded as soon as their node is allocated, before any children are
//! composed, so an alias inside a collection may refer back to the
//! collection itself.

use std::collections::HashMap;

use crate::error::{Error, Mark, MarkedError, Result};
use crate::events::{Event, EventKind};
use crate::nodes::{Document, Node, NodeId, NodeKind};
use crate::parser::Parser;
use crate::resolver::{NodeShape, Resolver};
use crate::tokens::ScalarStyle;

fn composer_error(problem: String, mark: Mark) -> Error {
    Error::Composer(MarkedError::new(problem, Some(mark)))
}

pub struct Composer {
    parser: Parser,
    resolver: Resolver,
    /// Nodes of the document being composed.
    nodes: Vec<Node>,
    anchors: HashMap<String, NodeId>,
    failed: bool,
}

impl Composer {
    pub fn new(parser: Parser, resolver: Resolver) -> Self {
        Self {
            parser,
            resolver,
            nodes: Vec::new(),
            anchors: HashMap::new(),
            failed: false,
        }
    }

    /// The current position of the underlying reader.
    pub fn mark(&self) -> Mark {
        self.parser.mark()
    }

    /// Whether another document is available.
    pub fn check_node(&mut self) -> Result<bool> {
        if self.next_is(|kind| matches!(kind, EventKind::StreamStart))? {
            self.next_event()?;
        }
        Ok(self
            .parser
            .peek_event()?
            .is_some_and(|event| !matches!(event.kind, EventKind::StreamEnd)))
    }

    /// Compose the next document, or `None` at the end of the stream.
    pub fn get_node(&mut self) -> Result<Option<Document>> {
        if self.check_node()? {
            return self.compose_document().map(Some);
        }
        Ok(None)
    }

    /// Compose the only document of the stream.
    ///
    /// Returns `None` for an empty stream and an error if a second document
    /// follows the first.
    pub fn get_single_node(&mut self) -> Result<Option<Document>> {
        self.next_event()?;
        let mut document = None;
        if !self.next_is(|kind| matches!(kind, EventKind::StreamEnd))? {
            document = Some(self.compose_document()?);
        }
        if !self.next_is(|kind| matches!(kind, EventKind::StreamEnd))? {
            let event = self.next_event()?;
            let context_mark = document.as_ref().map(|doc| doc.root().start_mark.clone());
            return Err(Error::Composer(
                MarkedError::new("but found another document", Some(event.start_mark))
                    .with_context("expected a single document in the stream", context_mark),
            ));
        }
        self.next_event()?;
        Ok(document)
    }

    fn next_is(&mut self, matches: impl Fn(&EventKind) -> bool) -> Result<bool> {
        Ok(self
            .parser
            .peek_event()?
            .map(|event| matches(&event.kind))
            .unwrap_or(false))
    }

    fn next_event(&mut self) -> Result<Event> {
        match self.parser.get_event()? {
            Some(event) => Ok(event),
            None => Err(Error::Composer(MarkedError::new(
                "unexpected end of the event stream",
                Some(self.parser.mark()),
            ))),
        }
    }

    fn compose_document(&mut self) -> Result<Document> {
        let root = self.compose_root();
        self.anchors.clear();
        let nodes = std::mem::take(&mut self.nodes);
        let root = root?;
        tracing::debug!(nodes = nodes.len(), "composed document");
        Ok(Document::new(nodes, root))
    }

    fn compose_root(&mut self) -> Result<NodeId> {
        // DOCUMENT-START
        self.next_event()?;
        let root = self.compose_node()?;
        // DOCUMENT-END
        self.next_event()?;
        Ok(root)
    }

    fn compose_node(&mut self) -> Result<NodeId> {
        if self.next_is(|kind| matches!(kind, EventKind::Alias { .. }))? {
            let event = self.next_event()?;
            let EventKind::Alias { anchor } = event.kind else {
                unreachable!("checked for an alias event");
            };
            return match self.anchors.get(&anchor) {
                Some(&id) => Ok(id),
                None => Err(composer_error(
                    format!("found undefined alias '{}'", anchor),
                    event.start_mark,
                )),
            };
        }

        let event = self.next_event()?;
        if let Some(anchor) = event.anchor() {
            if let Some(&first) = self.anchors.get(anchor) {
                return Err(Error::Composer(
                    MarkedError::new("second occurrence", Some(event.start_mark.clone()))
                        .with_context(
                            format!("found duplicate anchor '{}'; first occurrence", anchor),
                            Some(self.nodes[first.0].start_mark.clone()),
                        ),
                ));
            }
        }

        match event.kind {
            EventKind::Scalar {
                anchor,
                tag,
                implicit,
                value,
                style,
            } => Ok(self.compose_scalar_node(
                anchor,
                tag,
                implicit,
                value,
                style,
                event.start_mark,
                event.end_mark,
            )),
            EventKind::SequenceStart {
                anchor,
                tag,
                implicit,
                flow_style,
            } => self.compose_sequence_node(anchor, tag, implicit, flow_style, event.start_mark),
            EventKind::MappingStart {
                anchor,
                tag,
                implicit,
                flow_style,
            } => self.compose_mapping_node(anchor, tag, implicit, flow_style, event.start_mark),
            other => Err(composer_error(
                format!("expected a node event, but found {}", other.id()),
                event.start_mark,
            )),
        }
    }

    fn allocate(&mut self, anchor: Option<String>, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        if let Some(anchor) = anchor {
            self.anchors.insert(anchor, id);
        }
        id
    }

    #[allow(clippy::too_many_arguments)]
    fn compose_scalar_node(
        &mut self,
        anchor: Option<String>,
        tag: Option<String>,
        implicit: (bool, bool),
        value: String,
        style: ScalarStyle,
        start_mark: Mark,
        end_mark: Mark,
    ) -> NodeId {
        let tag = match tag {
            Some(tag) if tag != "!" => tag,
            _ => self
                .resolver
                .resolve(NodeShape::Scalar, &value, implicit)
                .to_string(),
        };
        self.allocate(
            anchor,
            Node {
                tag,
                kind: NodeKind::Scalar { value, style },
                start_mark,
                end_mark,
            },
        )
    }

    fn compose_sequence_node(
        &mut self,
        anchor: Option<String>,
        tag: Option<String>,
        implicit: bool,
        flow_style: bool,
        start_mark: Mark,
    ) -> Result<NodeId> {
        let tag = match tag {
            Some(tag) if tag != "!" => tag,
            _ => self
                .resolver
                .resolve(NodeShape::Sequence, "", (implicit, false))
                .to_string(),
        };
        let id = self.allocate(
            anchor,
            Node {
                tag,
                kind: NodeKind::Sequence {
                    items: Vec::new(),
                    flow_style,
                },
                start_mark: start_mark.clone(),
                end_mark: start_mark,
            },
        );

        let mut children = Vec::new();
        while !self.next_is(|kind| matches!(kind, EventKind::SequenceEnd))? {
            children.push(self.compose_node()?);
        }
        let end_event = self.next_event()?;

        let node = &mut self.nodes[id.0];
        node.end_mark = end_event.end_mark;
        if let NodeKind::Sequence { items, .. } = &mut node.kind {
            *items = children;
        }
        Ok(id)
    }

    fn compose_mapping_node(
        &mut self,
        anchor: Option<String>,
        tag: Option<String>,
        implicit: bool,
        flow_style: bool,
        start_mark: Mark,
    ) -> Result<NodeId> {
        let tag = match tag {
            Some(tag) if tag != "!" => tag,
            _ => self
                .resolver
                .resolve(NodeShape::Mapping, "", (implicit, false))
                .to_string(),
        };
        let id = self.allocate(
            anchor,
            Node {
                tag,
                kind: NodeKind::Mapping {
                    pairs: Vec::new(),
                    flow_style,
                },
                start_mark: start_mark.clone(),
                end_mark: start_mark,
            },
        );

        let mut children = Vec::new();
        while !self.next_is(|kind| matches!(kind, EventKind::MappingEnd))? {
            let key = self.compose_node()?;
            let value = self.compose_node()?;
            children.push((key, value));
        }
        let end_event = self.next_event()?;

        let node = &mut self.nodes[id.0];
        node.end_mark = end_event.end_mark;
        if let NodeKind::Mapping { pairs, .. } = &mut node.kind {
            *pairs = children;
        }
        Ok(id)
    }
}

impl Iterator for Composer {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.get_node() {
            Ok(document) => document.map(Ok),
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
    use crate::scanner::Scanner;

    fn composer(input: &str) -> Composer {
        let reader = Reader::new("<input>", input).unwrap();
        Composer::new(Parser::new(Scanner::new(reader)), Resolver::yaml11())
    }

    fn single(input: &str) -> Result<Option<Document>> {
        composer(input).get_single_node()
    }

    #[test]
    fn test_scalar_tags_are_resolved() {
        let doc = single("[1, 1.5, true, ~, text, '1']").unwrap().unwrap();
        let tags: Vec<&str> = doc
            .root()
            .items()
            .unwrap()
            .iter()
            .map(|&id| doc.node(id).tag.as_str())
            .collect();
        assert_eq!(
            tags,
            vec![
                "tag:yaml.org,2002:int",
                "tag:yaml.org,2002:float",
                "tag:yaml.org,2002:bool",
                "tag:yaml.org,2002:null",
                "tag:yaml.org,2002:str",
                "tag:yaml.org,2002:str",
            ]
        );
        assert_eq!(doc.root().tag, "tag:yaml.org,2002:seq");
    }

    #[test]
    fn test_non_specific_tag_resolves_as_plain() {
        let doc = single("! 12").unwrap().unwrap();
        assert_eq!(doc.root().tag, "tag:yaml.org,2002:int");
    }

    #[test]
    fn test_explicit_tag_is_kept() {
        let doc = single("!custom {a: 1}").unwrap().unwrap();
        assert_eq!(doc.root().tag, "!custom");
        assert!(doc.root().is_mapping());
    }

    #[test]
    fn test_alias_shares_node() {
        let doc = single("a: &x {v: 1}\nb: *x\n").unwrap().unwrap();
        let pairs = doc.root().pairs().unwrap();
        assert_eq!(pairs[0].1, pairs[1].1);
    }

    #[test]
    fn test_self_reference() {
        let doc = single("&x [1, *x]").unwrap().unwrap();
        let items = doc.root().items().unwrap();
        assert_eq!(items[1], doc.root_id());
    }

    #[test]
    fn test_undefined_alias() {
        let err = single("a: *missing\n").unwrap_err();
        assert_eq!(err.problem(), "found undefined alias 'missing'");
        let mark = err.problem_mark().unwrap();
        assert_eq!((mark.line, mark.column), (0, 3));
    }

    #[test]
    fn test_duplicate_anchor() {
        let err = single("a: &x 1\nb: &x 2\n").unwrap_err();
        let marked = err.marked().unwrap();
        assert_eq!(marked.problem, "second occurrence");
        assert_eq!(
            marked.context.as_deref(),
            Some("found duplicate anchor 'x'; first occurrence")
        );
        assert_eq!(marked.context_mark.as_ref().unwrap().line, 0);
        assert_eq!(marked.problem_mark.as_ref().unwrap().line, 1);
    }

    #[test]
    fn test_anchors_do_not_cross_documents() {
        let mut composer = composer("--- &x a\n--- *x\n");
        assert!(composer.get_node().unwrap().is_some());
        let err = composer.get_node().unwrap_err();
        assert_eq!(err.problem(), "found undefined alias 'x'");
    }

    #[test]
    fn test_iteration_ends_at_first_error() {
        let results: Vec<Result<Document>> = composer("[*x, [1, 2]]\n--- 3\n").collect();
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].as_ref().unwrap_err().problem(),
            "found undefined alias 'x'"
        );
    }

    #[test]
    fn test_failed_document_leaves_no_state() {
        let mut composer = composer("[&a 1, *x]\n");
        assert!(composer.get_node().is_err());
        assert!(composer.nodes.is_empty());
        assert!(composer.anchors.is_empty());
    }

    #[test]
    fn test_anchor_may_be_reused_in_next_document() {
        let docs: Result<Vec<Document>> = composer("--- &x a\n--- &x b\n").collect();
        assert_eq!(docs.unwrap().len(), 2);
    }

    #[test]
    fn test_single_document_rejects_second() {
        let err = single("--- 1\n--- 2\n").unwrap_err();
        let marked = err.marked().unwrap();
        assert_eq!(
            marked.context.as_deref(),
            Some("expected a single document in the stream")
        );
        assert_eq!(marked.problem, "but found another document");
    }

    #[test]
    fn test_empty_stream() {
        assert!(single("").unwrap().is_none());
        assert!(single("# only a comment\n").unwrap().is_none());
        assert!(composer("").get_node().unwrap().is_none());
    }

    #[test]
    fn test_mapping_order_is_preserved() {
        let doc = single("z: 1\na: 2\nm: 3\n").unwrap().unwrap();
        let keys: Vec<&str> = doc
            .root()
            .pairs()
            .unwrap()
            .iter()
            .map(|&(key, _)| doc.node(key).as_scalar().unwrap())
            .collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_node_marks() {
        let doc = single("a:\n  - x\n").unwrap().unwrap();
        let (_, value) = doc.root().pairs().unwrap()[0];
        let seq = doc.node(value);
        assert_eq!(seq.start_mark.line, 1);
        assert_eq!(seq.start_mark.column, 2);
    }
}
