#![forbid(unsafe_code)]

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use crate::measurement::NodeIdentity;
use crate::ContractViolation;

/// Text a node exposes for one output channel.
///
/// Hosts that echo a descendant's text at an ancestor hand out clones of the
/// same `Arc`, which is how inherited text is told apart from text that merely
/// reads the same.
pub type SharedOutput = Arc<str>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OutputCategory {
    Primary,
    Secondary,
}

impl OutputCategory {
    pub const ALL: [OutputCategory; 2] = [OutputCategory::Primary, OutputCategory::Secondary];

    pub fn as_str(self) -> &'static str {
        match self {
            OutputCategory::Primary => "PRIMARY",
            OutputCategory::Secondary => "SECONDARY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultNodeKind {
    /// Groups children and only ever re-exposes their output.
    Aggregate,
    /// Has enumerable children and may carry output of its own (suites, classes).
    Tabulated,
    /// Single test case.
    Leaf,
}

impl ResultNodeKind {
    pub fn has_children(self) -> bool {
        matches!(self, ResultNodeKind::Aggregate | ResultNodeKind::Tabulated)
    }

    pub fn originates_output(self) -> bool {
        !matches!(self, ResultNodeKind::Aggregate)
    }
}

/// Host test-result tree for one finished run.
pub trait ResultTree {
    type Node: Copy + Eq + Hash + Debug;

    fn root(&self) -> Self::Node;
    fn kind(&self, node: Self::Node) -> ResultNodeKind;
    fn children(&self, node: Self::Node) -> Vec<Self::Node>;
    fn parent(&self, node: Self::Node) -> Option<Self::Node>;
    fn identity(&self, node: Self::Node) -> NodeIdentity;
    fn output(&self, node: Self::Node, category: OutputCategory) -> Option<SharedOutput>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeOutputs {
    pub primary: Option<SharedOutput>,
    pub secondary: Option<SharedOutput>,
}

impl NodeOutputs {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn primary(text: SharedOutput) -> Self {
        Self {
            primary: Some(text),
            secondary: None,
        }
    }

    pub fn both(primary: SharedOutput, secondary: SharedOutput) -> Self {
        Self {
            primary: Some(primary),
            secondary: Some(secondary),
        }
    }

    pub fn get(&self, category: OutputCategory) -> Option<&SharedOutput> {
        match category {
            OutputCategory::Primary => self.primary.as_ref(),
            OutputCategory::Secondary => self.secondary.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(usize);

#[derive(Debug, Clone)]
struct ArenaNode {
    kind: ResultNodeKind,
    identity: NodeIdentity,
    parent: Option<NodeIndex>,
    children: Vec<NodeIndex>,
    outputs: NodeOutputs,
}

/// In-memory result tree for hosts that materialize their results up front.
///
/// A [`NodeIndex`] is only meaningful for the arena that returned it; the
/// [`ResultTree`] accessors panic on an index this arena never handed out.
/// Use [`ResultArena::contains`] to check an index of unknown origin.
#[derive(Debug, Clone)]
pub struct ResultArena {
    nodes: Vec<ArenaNode>,
}

impl ResultArena {
    pub fn new(kind: ResultNodeKind, identity: NodeIdentity, outputs: NodeOutputs) -> Self {
        Self {
            nodes: vec![ArenaNode {
                kind,
                identity,
                parent: None,
                children: Vec::new(),
                outputs,
            }],
        }
    }

    pub fn add_child(
        &mut self,
        parent: NodeIndex,
        kind: ResultNodeKind,
        identity: NodeIdentity,
        outputs: NodeOutputs,
    ) -> Result<NodeIndex, ContractViolation> {
        let parent_kind = self
            .nodes
            .get(parent.0)
            .map(|node| node.kind)
            .ok_or(ContractViolation::InvalidValue {
                field: "result_arena.parent",
                reason: "must reference an existing node",
            })?;
        if !parent_kind.has_children() {
            return Err(ContractViolation::InvalidValue {
                field: "result_arena.parent",
                reason: "leaf nodes cannot have children",
            });
        }
        let index = NodeIndex(self.nodes.len());
        self.nodes.push(ArenaNode {
            kind,
            identity,
            parent: Some(parent),
            children: Vec::new(),
            outputs,
        });
        self.nodes[parent.0].children.push(index);
        Ok(index)
    }

    pub fn set_output(
        &mut self,
        node: NodeIndex,
        category: OutputCategory,
        text: Option<SharedOutput>,
    ) -> Result<(), ContractViolation> {
        let entry = self
            .nodes
            .get_mut(node.0)
            .ok_or(ContractViolation::InvalidValue {
                field: "result_arena.node",
                reason: "must reference an existing node",
            })?;
        match category {
            OutputCategory::Primary => entry.outputs.primary = text,
            OutputCategory::Secondary => entry.outputs.secondary = text,
        }
        Ok(())
    }

    pub fn contains(&self, node: NodeIndex) -> bool {
        node.0 < self.nodes.len()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, node: NodeIndex) -> &ArenaNode {
        match self.nodes.get(node.0) {
            Some(entry) => entry,
            None => panic!(
                "node index {} out of bounds for arena of {} nodes",
                node.0,
                self.nodes.len()
            ),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl ResultTree for ResultArena {
    type Node = NodeIndex;

    fn root(&self) -> NodeIndex {
        NodeIndex(0)
    }

    fn kind(&self, node: NodeIndex) -> ResultNodeKind {
        self.node(node).kind
    }

    fn children(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.node(node).children.clone()
    }

    fn parent(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.node(node).parent
    }

    fn identity(&self, node: NodeIndex) -> NodeIdentity {
        self.node(node).identity.clone()
    }

    fn output(&self, node: NodeIndex, category: OutputCategory) -> Option<SharedOutput> {
        self.node(node).outputs.get(category).cloned()
    }
}
