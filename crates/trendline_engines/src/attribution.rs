#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use trendline_kernel_contracts::result_tree::{OutputCategory, ResultTree, SharedOutput};

/// Output handle keyed by allocation, not by content.
#[derive(Debug)]
struct Allocation(SharedOutput);

impl PartialEq for Allocation {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Allocation {}

impl Hash for Allocation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as *const u8).hash(state);
    }
}

/// Decides which node authored each piece of output in a result tree.
///
/// Hosts hand the same text allocation to several nodes: a case's output is
/// echoed up to its class, suite and root, and a suite's own output is handed
/// down to every case that has none. Nodes exposing one allocation for the
/// same category form a sharing group, and exactly one member is credited:
///
/// - the deepest member that is an ancestor or descendant of every other
///   member (a plain chain credits its bottom node, a suite whose text falls
///   back to its cases credits the suite);
/// - failing that, the shallowest member, ties broken by node identity.
///
/// Content-equal text in separate allocations never groups. Pure aggregates
/// never author and never join a group. The result does not depend on the
/// order nodes are supplied in.
#[derive(Debug)]
pub struct OutputAttribution<N> {
    credited: HashSet<(N, OutputCategory)>,
    suppressed: usize,
}

impl<N> OutputAttribution<N>
where
    N: Copy + Eq + Hash,
{
    pub fn build<T: ResultTree<Node = N>>(tree: &T, nodes: &[N]) -> Self {
        let mut groups: HashMap<(Allocation, OutputCategory), Vec<N>> = HashMap::new();
        for &node in nodes {
            if !tree.kind(node).originates_output() {
                continue;
            }
            for category in OutputCategory::ALL {
                let Some(output) = tree.output(node, category) else {
                    continue;
                };
                if output.is_empty() {
                    continue;
                }
                let sharers = groups.entry((Allocation(output), category)).or_default();
                if !sharers.contains(&node) {
                    sharers.push(node);
                }
            }
        }

        let mut credited = HashSet::with_capacity(groups.len());
        let mut suppressed = 0;
        for ((_, category), sharers) in groups {
            suppressed += sharers.len() - 1;
            if let Some(author) = author_of(tree, &sharers) {
                credited.insert((author, category));
            }
        }
        Self {
            credited,
            suppressed,
        }
    }

    pub fn is_authored(&self, node: N, category: OutputCategory) -> bool {
        self.credited.contains(&(node, category))
    }

    /// The node's output for `category` when the node is credited with it.
    pub fn authored_output<T: ResultTree<Node = N>>(
        &self,
        tree: &T,
        node: N,
        category: OutputCategory,
    ) -> Option<SharedOutput> {
        if !self.is_authored(node, category) {
            return None;
        }
        tree.output(node, category).filter(|output| !output.is_empty())
    }

    /// Outputs seen on some node but credited to another member of their group.
    pub fn suppressed_count(&self) -> usize {
        self.suppressed
    }
}

fn author_of<T: ResultTree>(tree: &T, sharers: &[T::Node]) -> Option<T::Node> {
    if let [only] = sharers {
        return Some(*only);
    }
    let comparable_with_all = |node: T::Node| {
        sharers.iter().all(|&other| {
            other == node || is_ancestor(tree, node, other) || is_ancestor(tree, other, node)
        })
    };
    if let Some(author) = sharers
        .iter()
        .copied()
        .filter(|&node| comparable_with_all(node))
        .max_by_key(|&node| depth(tree, node))
    {
        return Some(author);
    }
    sharers.iter().copied().min_by(|&a, &b| {
        depth(tree, a)
            .cmp(&depth(tree, b))
            .then_with(|| tree.identity(a).cmp(&tree.identity(b)))
    })
}

fn is_ancestor<T: ResultTree>(tree: &T, ancestor: T::Node, node: T::Node) -> bool {
    let mut cursor = tree.parent(node);
    while let Some(current) = cursor {
        if current == ancestor {
            return true;
        }
        cursor = tree.parent(current);
    }
    false
}

fn depth<T: ResultTree>(tree: &T, node: T::Node) -> usize {
    let mut depth = 0;
    let mut cursor = tree.parent(node);
    while let Some(current) = cursor {
        depth += 1;
        cursor = tree.parent(current);
    }
    depth
}
