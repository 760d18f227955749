//! MathArray - one editable cell of the expression tree

use crate::model::MathNode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Ordered sequence of nodes forming one cell
///
/// Positions run from `0` (before the first node) to `len()` (after the
/// last). Out-of-range positions are clamped at this boundary so that no
/// caller can produce a hole or an invalid index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MathArray {
    nodes: Vec<MathNode>,
}

impl MathArray {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn from_nodes(nodes: Vec<MathNode>) -> Self {
        Self { nodes }
    }

    /// Build a cell holding one `Char` per character of `text`
    pub fn from_chars(text: &str) -> Self {
        Self {
            nodes: text.chars().map(MathNode::Char).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, pos: usize) -> Option<&MathNode> {
        self.nodes.get(pos)
    }

    pub(crate) fn get_mut(&mut self, pos: usize) -> Option<&mut MathNode> {
        self.nodes.get_mut(pos)
    }

    pub fn nodes(&self) -> &[MathNode] {
        &self.nodes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MathNode> {
        self.nodes.iter()
    }

    pub fn into_nodes(self) -> Vec<MathNode> {
        self.nodes
    }

    pub fn push(&mut self, node: MathNode) {
        self.nodes.push(node);
    }

    /// Insert `node` before position `pos`
    pub fn insert(&mut self, pos: usize, node: MathNode) {
        debug_assert!(pos <= self.len(), "insert position {} past end", pos);
        let pos = pos.min(self.len());
        self.nodes.insert(pos, node);
    }

    /// Insert every node of `other` before `pos`, returning how many were inserted
    pub fn insert_array(&mut self, pos: usize, other: MathArray) -> usize {
        let pos = pos.min(self.len());
        let count = other.len();
        self.nodes.splice(pos..pos, other.nodes);
        count
    }

    /// Append all nodes of `other`
    pub fn append(&mut self, other: MathArray) {
        self.nodes.extend(other.nodes);
    }

    /// Remove the half-open range `[from, to)` and return the removed nodes
    pub fn erase(&mut self, from: usize, to: usize) -> MathArray {
        let to = to.min(self.len());
        let from = from.min(to);
        Self {
            nodes: self.nodes.drain(from..to).collect(),
        }
    }

    /// Copy of the half-open range `[from, to)`
    pub fn slice(&self, from: usize, to: usize) -> MathArray {
        let to = to.min(self.len());
        let from = from.min(to);
        Self {
            nodes: self.nodes[from..to].to_vec(),
        }
    }

    /// Substitute the node at `pos`, returning the old one
    pub fn replace(&mut self, pos: usize, node: MathNode) -> Option<MathNode> {
        let slot = self.nodes.get_mut(pos)?;
        Some(std::mem::replace(slot, node))
    }

    /// Remove and return the node at `pos`
    pub fn remove(&mut self, pos: usize) -> Option<MathNode> {
        if pos < self.len() {
            Some(self.nodes.remove(pos))
        } else {
            None
        }
    }

    /// Visit every node in this cell and all nested cells, pre-order
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a MathNode)) {
        for node in &self.nodes {
            node.walk(f);
        }
    }

    /// Total number of nodes including nested ones
    pub fn deep_len(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_| count += 1);
        count
    }

    /// LaTeX packages the content of this cell needs
    pub fn required_packages(&self) -> BTreeSet<&'static str> {
        let mut packages = BTreeSet::new();
        self.walk(&mut |node| {
            if let Some(package) = node.required_package() {
                packages.insert(package);
            }
        });
        packages
    }
}

impl From<Vec<MathNode>> for MathArray {
    fn from(nodes: Vec<MathNode>) -> Self {
        Self::from_nodes(nodes)
    }
}

impl FromIterator<MathNode> for MathArray {
    fn from_iter<I: IntoIterator<Item = MathNode>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a MathArray {
    type Item = &'a MathNode;
    type IntoIter = std::slice::Iter<'a, MathNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_shifts_following() {
        let mut array = MathArray::from_chars("ac");
        array.insert(1, MathNode::Char('b'));
        assert_eq!(array, MathArray::from_chars("abc"));
        array.insert(3, MathNode::Char('d'));
        assert_eq!(array, MathArray::from_chars("abcd"));
    }

    #[test]
    fn test_erase_range() {
        let mut array = MathArray::from_chars("abcde");
        let removed = array.erase(1, 3);
        assert_eq!(removed, MathArray::from_chars("bc"));
        assert_eq!(array, MathArray::from_chars("ade"));
    }

    #[test]
    fn test_erase_empty_range_is_noop() {
        let mut array = MathArray::from_chars("abc");
        assert!(array.erase(2, 2).is_empty());
        assert_eq!(array.len(), 3);
    }

    #[test]
    fn test_erase_clamps() {
        let mut array = MathArray::from_chars("abc");
        let removed = array.erase(2, 10);
        assert_eq!(removed, MathArray::from_chars("c"));
        assert_eq!(array, MathArray::from_chars("ab"));
    }

    #[test]
    fn test_insert_array() {
        let mut array = MathArray::from_chars("ad");
        let count = array.insert_array(1, MathArray::from_chars("bc"));
        assert_eq!(count, 2);
        assert_eq!(array, MathArray::from_chars("abcd"));
    }

    #[test]
    fn test_replace_and_remove() {
        let mut array = MathArray::from_chars("ab");
        let old = array.replace(0, MathNode::Char('x'));
        assert_eq!(old, Some(MathNode::Char('a')));
        assert_eq!(array.replace(5, MathNode::Char('y')), None);
        assert_eq!(array.remove(1), Some(MathNode::Char('b')));
        assert_eq!(array.remove(1), None);
        assert_eq!(array, MathArray::from_chars("x"));
    }

    #[test]
    fn test_deep_len_counts_nested() {
        let frac = MathNode::fraction(MathArray::from_chars("ab"), MathArray::from_chars("c"));
        let array = MathArray::from_nodes(vec![frac, MathNode::Char('d')]);
        assert_eq!(array.deep_len(), 5);
    }

    #[test]
    fn test_required_packages() {
        let array = MathArray::from_nodes(vec![
            MathNode::symbol("leqslant").unwrap(),
            MathNode::font(crate::font::FontId::MathBb, MathArray::from_chars("R")),
            MathNode::symbol("alpha").unwrap(),
        ]);
        let packages: Vec<_> = array.required_packages().into_iter().collect();
        assert_eq!(packages, vec!["amssymb"]);
    }
}
