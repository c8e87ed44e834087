//! Arena-backed document tree.
//!
//! Nodes live in a single `Vec` and are addressed by [`NodeId`]. Removing a
//! node only detaches it: the id stays valid so callers holding stale ids
//! (bookmarks, selections) can detect that the node left the tree instead of
//! aliasing a recycled slot.
//!
//! Positions inside the tree are DOM-style boundary points: a container node
//! plus an offset that counts children for elements and chars for text.

use std::cmp::Ordering;

/// Index of a node in its [`Document`] arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Payload of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Element { name: String },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Position among the parent's children; stale while detached.
    index: usize,
    /// Char count of a text node, 0 for elements.
    chars: usize,
}

/// A boundary point in the tree: `offset` is a child index when `node` is an
/// element and a char index when `node` is a text node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreePosition {
    pub node: NodeId,
    pub offset: usize,
}

impl TreePosition {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("Unknown node: {0:?}")]
    UnknownNode(NodeId),
    #[error("Node {0:?} is not an element")]
    NotAnElement(NodeId),
    #[error("Node {0:?} is not a text node")]
    NotText(NodeId),
    #[error("Offset {offset} is out of bounds for node {node:?} (length {len})")]
    OffsetOutOfBounds {
        node: NodeId,
        offset: usize,
        len: usize,
    },
    #[error("Node {0:?} is already attached to a parent")]
    AlreadyAttached(NodeId),
    #[error("Node {0:?} is not attached to a parent")]
    Detached(NodeId),
    #[error("Attaching {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("Node {node:?} is outside the subtree of {root:?}")]
    OutsideRoot { node: NodeId, root: NodeId },
}

/// Mutable document tree with a replaceable root.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Document {
    /// Create a document whose root is an empty element called `root_name`.
    pub fn new(root_name: &str) -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        doc.root = doc.create_element(root_name);
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Swap in a detached element as the new root. The old root and its
    /// subtree stay in the arena, unreachable from the new root.
    pub fn replace_root(&mut self, new_root: NodeId) -> Result<(), DocumentError> {
        self.check_element(new_root)?;
        if self.nodes[new_root.index()].parent.is_some() {
            return Err(DocumentError::AlreadyAttached(new_root));
        }
        self.root = new_root;
        Ok(())
    }

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.push(NodeData::Element {
            name: name.to_string(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let chars = match &data {
            NodeData::Text(text) => text.chars().count(),
            NodeData::Element { .. } => 0,
        };
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
            index: 0,
            chars,
        });
        id
    }

    /// Refresh the stored index of `parent`'s children from `from` onwards.
    fn reindex_children(&mut self, parent: NodeId, from: usize) {
        for index in from..self.nodes[parent.index()].children.len() {
            let child = self.nodes[parent.index()].children[index];
            self.nodes[child.index()].index = index;
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DocumentError> {
        let index = self.checked(parent)?.children.len();
        self.insert_child(parent, index, child)
    }

    /// Attach a detached `child` at `index` among `parent`'s children.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), DocumentError> {
        self.check_element(parent)?;
        let child_node = self.checked(child)?;
        if child_node.parent.is_some() || child == self.root {
            return Err(DocumentError::AlreadyAttached(child));
        }
        if self.contains(child, parent) {
            return Err(DocumentError::Cycle { parent, child });
        }
        let len = self.nodes[parent.index()].children.len();
        if index > len {
            return Err(DocumentError::OffsetOutOfBounds {
                node: parent,
                offset: index,
                len,
            });
        }
        self.nodes[parent.index()].children.insert(index, child);
        self.nodes[child.index()].parent = Some(parent);
        self.reindex_children(parent, index);
        Ok(())
    }

    /// Detach `node` from its parent, keeping its own subtree intact.
    pub fn remove(&mut self, node: NodeId) -> Result<(), DocumentError> {
        let parent = self
            .checked(node)?
            .parent
            .ok_or(DocumentError::Detached(node))?;
        let index = self.nodes[node.index()].index;
        self.nodes[parent.index()].children.remove(index);
        self.nodes[node.index()].parent = None;
        self.reindex_children(parent, index);
        Ok(())
    }

    /// Insert `text` before char `offset` of a text node.
    pub fn insert_text(
        &mut self,
        node: NodeId,
        offset: usize,
        text: &str,
    ) -> Result<(), DocumentError> {
        let (content, chars) = self.text_mut(node)?;
        let len = *chars;
        if offset > len {
            return Err(DocumentError::OffsetOutOfBounds { node, offset, len });
        }
        let byte = byte_index(content, offset);
        content.insert_str(byte, text);
        *chars += text.chars().count();
        Ok(())
    }

    /// Remove `count` chars starting at char `offset` of a text node.
    pub fn remove_text(
        &mut self,
        node: NodeId,
        offset: usize,
        count: usize,
    ) -> Result<(), DocumentError> {
        let (content, chars) = self.text_mut(node)?;
        let len = *chars;
        let end = match offset.checked_add(count) {
            Some(end) if end <= len => end,
            end => {
                return Err(DocumentError::OffsetOutOfBounds {
                    node,
                    offset: end.unwrap_or(usize::MAX),
                    len,
                });
            }
        };
        let start_byte = byte_index(content, offset);
        let end_byte = byte_index(content, end);
        content.replace_range(start_byte..end_byte, "");
        *chars -= count;
        Ok(())
    }

    fn text_mut(&mut self, node: NodeId) -> Result<(&mut String, &mut usize), DocumentError> {
        match self.nodes.get_mut(node.index()) {
            Some(Node {
                data: NodeData::Text(text),
                chars,
                ..
            }) => Ok((text, chars)),
            Some(_) => Err(DocumentError::NotText(node)),
            None => Err(DocumentError::UnknownNode(node)),
        }
    }

    fn checked(&self, node: NodeId) -> Result<&Node, DocumentError> {
        self.nodes
            .get(node.index())
            .ok_or(DocumentError::UnknownNode(node))
    }

    fn check_element(&self, node: NodeId) -> Result<(), DocumentError> {
        match self.checked(node)?.data {
            NodeData::Element { .. } => Ok(()),
            NodeData::Text(_) => Err(DocumentError::NotAnElement(node)),
        }
    }

    /// Fails unless `position` is a valid boundary point of an existing node.
    pub fn check_position(&self, position: TreePosition) -> Result<(), DocumentError> {
        self.checked(position.node)?;
        let len = self.node_len(position.node);
        if position.offset > len {
            return Err(DocumentError::OffsetOutOfBounds {
                node: position.node,
                offset: position.offset,
                len,
            });
        }
        Ok(())
    }

    // Navigation. These index the arena directly and panic on ids that did
    // not come from this document.

    pub fn data(&self, node: NodeId) -> &NodeData {
        &self.nodes[node.index()].data
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.index()].children
    }

    pub fn child_count(&self, node: NodeId) -> usize {
        self.nodes[node.index()].children.len()
    }

    pub fn child_at(&self, node: NodeId, index: usize) -> Option<NodeId> {
        self.nodes[node.index()].children.get(index).copied()
    }

    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].children.first().copied()
    }

    pub fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].children.last().copied()
    }

    pub fn index_in_parent(&self, node: NodeId) -> Option<usize> {
        self.parent(node)?;
        Some(self.nodes[node.index()].index)
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let index = self.index_in_parent(node)?;
        self.child_at(parent, index + 1)
    }

    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let index = self.index_in_parent(node)?;
        index.checked_sub(1).and_then(|i| self.child_at(parent, i))
    }

    pub fn is_text(&self, node: NodeId) -> bool {
        matches!(self.data(node), NodeData::Text(_))
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        !self.is_text(node)
    }

    /// Element name, `None` for text nodes.
    pub fn name(&self, node: NodeId) -> Option<&str> {
        match self.data(node) {
            NodeData::Element { name } => Some(name),
            NodeData::Text(_) => None,
        }
    }

    /// Text content of a text node, `None` for elements.
    pub fn text(&self, node: NodeId) -> Option<&str> {
        match self.data(node) {
            NodeData::Text(text) => Some(text),
            NodeData::Element { .. } => None,
        }
    }

    /// Largest valid offset inside `node`: chars for text, children otherwise.
    pub fn node_len(&self, node: NodeId) -> usize {
        match self.data(node) {
            NodeData::Text(_) => self.nodes[node.index()].chars,
            NodeData::Element { .. } => self.child_count(node),
        }
    }

    /// Concatenated text of every text node under `node`.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match self.data(node) {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Element { .. } => {
                for &child in self.children(node) {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Ancestors of `node`, nearest first, excluding `node` itself.
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(node), move |&n| self.parent(n))
    }

    /// True when `node` is `ancestor` or lies in its subtree.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|a| a == ancestor)
    }

    /// True when `node` is reachable from the current root.
    pub fn is_attached(&self, node: NodeId) -> bool {
        node.index() < self.nodes.len() && self.contains(self.root, node)
    }

    /// The child of `ancestor` on the path down to `node`, if `node` is a
    /// strict descendant of `ancestor`.
    pub fn child_towards(&self, ancestor: NodeId, node: NodeId) -> Option<NodeId> {
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            if parent == ancestor {
                return Some(current);
            }
            current = parent;
        }
        None
    }

    /// Deepest node containing both `a` and `b`.
    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        let path_a = self.path_from_top(a);
        let path_b = self.path_from_top(b);
        path_a
            .iter()
            .zip(path_b.iter())
            .take_while(|(x, y)| x == y)
            .last()
            .map(|(x, _)| *x)
    }

    fn path_from_top(&self, node: NodeId) -> Vec<NodeId> {
        let mut path: Vec<NodeId> = self.ancestors(node).collect();
        path.reverse();
        path.push(node);
        path
    }

    /// Compare two boundary points in document order.
    ///
    /// Points in unrelated (detached) trees are ordered by node id so the
    /// result is at least consistent.
    pub fn compare_points(&self, a: TreePosition, b: TreePosition) -> Ordering {
        if a.node == b.node {
            return a.offset.cmp(&b.offset);
        }
        if let Some(child) = self.child_towards(a.node, b.node) {
            let index = self.index_in_parent(child).unwrap_or(0);
            return if a.offset <= index {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }
        if let Some(child) = self.child_towards(b.node, a.node) {
            let index = self.index_in_parent(child).unwrap_or(0);
            return if b.offset <= index {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }
        self.compare_nodes(a.node, b.node)
    }

    /// Document order of two nodes; an ancestor precedes its descendants.
    pub fn compare_nodes(&self, a: NodeId, b: NodeId) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        let path_a = self.path_from_top(a);
        let path_b = self.path_from_top(b);
        if path_a[0] != path_b[0] {
            return a.cmp(&b);
        }
        for (x, y) in path_a.iter().zip(path_b.iter()) {
            if x != y {
                let ix = self.index_in_parent(*x).unwrap_or(0);
                let iy = self.index_in_parent(*y).unwrap_or(0);
                return ix.cmp(&iy);
            }
        }
        path_a.len().cmp(&path_b.len())
    }
}

fn byte_index(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> (Document, NodeId, NodeId, NodeId) {
        // <body><p>ab</p><p>cd</p></body>
        let mut doc = Document::new("body");
        let root = doc.root();
        let p1 = doc.create_element("p");
        let t1 = doc.create_text("ab");
        let p2 = doc.create_element("p");
        let t2 = doc.create_text("cd");
        doc.append_child(root, p1).unwrap();
        doc.append_child(p1, t1).unwrap();
        doc.append_child(root, p2).unwrap();
        doc.append_child(p2, t2).unwrap();
        (doc, p1, t1, t2)
    }

    #[test]
    fn build_and_navigate() {
        let (doc, p1, t1, t2) = sample();
        let root = doc.root();
        assert_eq!(doc.child_count(root), 2);
        assert_eq!(doc.first_child(root), Some(p1));
        assert_eq!(doc.parent(t1), Some(p1));
        assert_eq!(doc.index_in_parent(p1), Some(0));
        assert_eq!(doc.next_sibling(p1), doc.parent(t2));
        assert_eq!(doc.previous_sibling(p1), None);
        assert_eq!(doc.text_content(root), "abcd");
        assert_eq!(doc.name(p1), Some("p"));
        assert_eq!(doc.node_len(t1), 2);
    }

    #[test]
    fn attaching_twice_is_rejected() {
        let (mut doc, p1, t1, _) = sample();
        assert_eq!(
            doc.append_child(p1, t1),
            Err(DocumentError::AlreadyAttached(t1))
        );
    }

    #[test]
    fn attaching_ancestor_under_descendant_is_a_cycle() {
        let mut doc = Document::new("body");
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        doc.append_child(outer, inner).unwrap();
        assert_eq!(
            doc.append_child(inner, outer),
            Err(DocumentError::Cycle {
                parent: inner,
                child: outer
            })
        );
    }

    #[test]
    fn text_cannot_hold_children() {
        let (mut doc, _, t1, _) = sample();
        let extra = doc.create_text("x");
        assert_eq!(
            doc.append_child(t1, extra),
            Err(DocumentError::NotAnElement(t1))
        );
    }

    #[test]
    fn removed_nodes_are_detached() {
        let (mut doc, p1, t1, _) = sample();
        doc.remove(p1).unwrap();
        assert!(!doc.is_attached(p1));
        assert!(!doc.is_attached(t1));
        assert_eq!(doc.text_content(doc.root()), "cd");
        assert_eq!(doc.remove(p1), Err(DocumentError::Detached(p1)));
    }

    #[test]
    fn text_edits_use_char_offsets() {
        let mut doc = Document::new("body");
        let t = doc.create_text("héllo");
        doc.insert_text(t, 2, "XY").unwrap();
        assert_eq!(doc.text(t), Some("héXYllo"));
        doc.remove_text(t, 1, 3).unwrap();
        assert_eq!(doc.text(t), Some("hllo"));
        assert!(doc.remove_text(t, 3, 5).is_err());
    }

    #[test]
    fn sibling_links_follow_inserts_and_removals() {
        let mut doc = Document::new("body");
        let root = doc.root();
        let [a, b, c, d] = ["a", "b", "c", "d"].map(|name| doc.create_element(name));
        doc.append_child(root, a).unwrap();
        doc.append_child(root, c).unwrap();
        doc.insert_child(root, 1, b).unwrap();
        doc.insert_child(root, 0, d).unwrap();
        assert_eq!(doc.children(root), &[d, a, b, c]);
        for (index, &child) in doc.children(root).iter().enumerate() {
            assert_eq!(doc.index_in_parent(child), Some(index));
        }

        doc.remove(a).unwrap();
        assert_eq!(doc.index_in_parent(a), None);
        assert_eq!(doc.index_in_parent(b), Some(1));
        assert_eq!(doc.index_in_parent(c), Some(2));
        assert_eq!(doc.next_sibling(d), Some(b));
        assert_eq!(doc.previous_sibling(c), Some(b));

        doc.append_child(root, a).unwrap();
        assert_eq!(doc.index_in_parent(a), Some(3));
        assert_eq!(doc.previous_sibling(a), Some(c));
        assert_eq!(doc.next_sibling(a), None);
    }

    #[test]
    fn text_length_tracks_edits() {
        let mut doc = Document::new("body");
        let t = doc.create_text("añb");
        assert_eq!(doc.node_len(t), 3);
        doc.insert_text(t, 3, "ççç").unwrap();
        assert_eq!(doc.node_len(t), 6);
        doc.remove_text(t, 0, 2).unwrap();
        assert_eq!(doc.text(t), Some("bççç"));
        assert_eq!(doc.node_len(t), 4);
        assert_eq!(doc.node_len(doc.root()), 0);
    }

    #[test]
    fn remove_text_past_usize_max_is_out_of_bounds() {
        let mut doc = Document::new("body");
        let t = doc.create_text("abc");
        assert_eq!(
            doc.remove_text(t, 2, usize::MAX),
            Err(DocumentError::OffsetOutOfBounds {
                node: t,
                offset: usize::MAX,
                len: 3
            })
        );
        assert_eq!(doc.text(t), Some("abc"));
    }

    #[test]
    fn replace_root_requires_detached_element() {
        let (mut doc, p1, _, _) = sample();
        assert_eq!(
            doc.replace_root(p1),
            Err(DocumentError::AlreadyAttached(p1))
        );
        let fresh = doc.create_element("body");
        doc.replace_root(fresh).unwrap();
        assert_eq!(doc.root(), fresh);
        assert!(!doc.is_attached(p1));
    }

    #[test]
    fn compare_points_in_document_order() {
        let (doc, p1, t1, t2) = sample();
        let root = doc.root();
        let at = TreePosition::new;

        assert_eq!(doc.compare_points(at(t1, 0), at(t1, 1)), Ordering::Less);
        assert_eq!(doc.compare_points(at(t1, 1), at(t2, 0)), Ordering::Less);
        // (root, 0) sits before everything inside the first paragraph
        assert_eq!(doc.compare_points(at(root, 0), at(t1, 0)), Ordering::Less);
        // (root, 1) sits between the paragraphs
        assert_eq!(doc.compare_points(at(root, 1), at(t1, 2)), Ordering::Greater);
        assert_eq!(doc.compare_points(at(root, 1), at(t2, 0)), Ordering::Less);
        assert_eq!(doc.compare_points(at(t2, 0), at(root, 1)), Ordering::Greater);
        assert_eq!(doc.compare_points(at(p1, 1), at(root, 1)), Ordering::Less);
        assert_eq!(doc.compare_points(at(p1, 0), at(p1, 0)), Ordering::Equal);
    }

    #[test]
    fn common_ancestor_of_cousins() {
        let (doc, p1, t1, t2) = sample();
        assert_eq!(doc.common_ancestor(t1, t2), Some(doc.root()));
        assert_eq!(doc.common_ancestor(t1, p1), Some(p1));
        assert_eq!(doc.child_towards(doc.root(), t2), doc.parent(t2));
    }
}
