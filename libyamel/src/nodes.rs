//! The node graph built by the composer.
//!
//! Nodes live in an arena owned by their [`Document`] and refer to each
//! other by [`NodeId`]. An alias in the source becomes a second reference to
//! the same id, so shared and self-referencing structures need no special
//! representation.

use std::fmt;

use crate::error::Mark;
use crate::tokens::ScalarStyle;

/// Index of a node within its [`Document`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Scalar {
        value: String,
        style: ScalarStyle,
    },
    Sequence {
        items: Vec<NodeId>,
        flow_style: bool,
    },
    Mapping {
        pairs: Vec<(NodeId, NodeId)>,
        flow_style: bool,
    },
}

impl NodeKind {
    /// `"scalar"`, `"sequence"` or `"mapping"`.
    pub fn id(&self) -> &'static str {
        match self {
            NodeKind::Scalar { .. } => "scalar",
            NodeKind::Sequence { .. } => "sequence",
            NodeKind::Mapping { .. } => "mapping",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    /// The resolved tag.
    pub tag: String,
    pub kind: NodeKind,
    pub start_mark: Mark,
    pub end_mark: Mark,
}

impl Node {
    pub fn id(&self) -> &'static str {
        self.kind.id()
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, NodeKind::Scalar { .. })
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self.kind, NodeKind::Sequence { .. })
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self.kind, NodeKind::Mapping { .. })
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn items(&self) -> Option<&[NodeId]> {
        match &self.kind {
            NodeKind::Sequence { items, .. } => Some(items),
            _ => None,
        }
    }

    pub fn pairs(&self) -> Option<&[(NodeId, NodeId)]> {
        match &self.kind {
            NodeKind::Mapping { pairs, .. } => Some(pairs),
            _ => None,
        }
    }
}

/// One composed document: a node arena and its root.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Document {
    pub(crate) fn new(nodes: Vec<Node>, root: NodeId) -> Self {
        Self { nodes, root }
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn root(&self) -> &Node {
        &self.nodes[self.root.0]
    }

    /// Look up a node. Ids are only valid for the document that issued them.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeId(index), node))
    }
}
