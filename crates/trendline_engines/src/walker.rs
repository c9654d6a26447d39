#![forbid(unsafe_code)]

use std::collections::{HashSet, VecDeque};

use trendline_kernel_contracts::result_tree::ResultTree;

/// Breadth-first visit of every node in a result tree, each exactly once.
///
/// Only kinds that carry children are expanded. Callers must not rely on the
/// visiting order.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResultTreeWalker;

impl ResultTreeWalker {
    pub fn walk<T, F>(tree: &T, mut visit: F) -> usize
    where
        T: ResultTree,
        F: FnMut(T::Node),
    {
        let mut frontier = VecDeque::new();
        let mut seen = HashSet::new();
        frontier.push_back(tree.root());
        while let Some(current) = frontier.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            if tree.kind(current).has_children() {
                frontier.extend(tree.children(current));
            }
            visit(current);
        }
        seen.len()
    }

    pub fn nodes<T: ResultTree>(tree: &T) -> Vec<T::Node> {
        let mut out = Vec::new();
        Self::walk(tree, |node| out.push(node));
        out
    }
}
