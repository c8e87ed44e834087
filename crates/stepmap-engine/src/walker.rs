//! Raw position cursor over a document subtree.
//!
//! The walker visits every boundary point under its root in document order,
//! without consulting any filter. Each boundary point corresponds to exactly
//! one walker state:
//!
//! - `BeforeNode(e)`: just before element `e`; the DOM point is
//!   `(parent(e), index(e))`.
//! - `Within { container, offset }`: inside a text node at a char offset, or
//!   inside an element after its last child (`offset == child_count`).
//!
//! Positions between children are always reported as "before" the following
//! child (or as offset 0 of a following text node). A text node contributes
//! one position per char; the point after its last char is reported as the
//! position following the text node.

use std::cmp::Ordering;

use crate::document::{Document, DocumentError, NodeId, TreePosition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkerState {
    BeforeNode(NodeId),
    Within { container: NodeId, offset: usize },
}

#[derive(Debug, Clone)]
pub struct TreeWalker {
    root: NodeId,
    state: WalkerState,
}

impl TreeWalker {
    /// Create a walker positioned at `(root, 0)`.
    pub fn new(doc: &Document, root: NodeId) -> Self {
        Self {
            root,
            state: state_at(doc, root, root, 0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn state(&self) -> WalkerState {
        self.state
    }

    pub fn is_before_node(&self) -> bool {
        matches!(self.state, WalkerState::BeforeNode(_))
    }

    /// The node the walker is about to enter, or the node it is inside of.
    pub fn current_node(&self) -> NodeId {
        match self.state {
            WalkerState::BeforeNode(node) => node,
            WalkerState::Within { container, .. } => container,
        }
    }

    /// Container of the current boundary point.
    pub fn container(&self, doc: &Document) -> NodeId {
        match self.state {
            WalkerState::BeforeNode(node) => doc.parent(node).unwrap_or(node),
            WalkerState::Within { container, .. } => container,
        }
    }

    /// Offset of the current boundary point within [`Self::container`].
    pub fn unfiltered_offset(&self, doc: &Document) -> usize {
        match self.state {
            WalkerState::BeforeNode(node) => doc.index_in_parent(node).unwrap_or(0),
            WalkerState::Within { offset, .. } => offset,
        }
    }

    pub fn position(&self, doc: &Document) -> TreePosition {
        TreePosition::new(self.container(doc), self.unfiltered_offset(doc))
    }

    /// Move to the boundary point `(node, offset)`.
    pub fn set_unfiltered_position(
        &mut self,
        doc: &Document,
        node: NodeId,
        offset: usize,
    ) -> Result<(), DocumentError> {
        doc.check_position(TreePosition::new(node, offset))?;
        self.check_in_root(doc, node)?;
        self.state = state_at(doc, self.root, node, offset);
        Ok(())
    }

    /// Move to the position just before `node`.
    pub fn set_before_node(&mut self, doc: &Document, node: NodeId) -> Result<(), DocumentError> {
        self.check_in_root(doc, node)?;
        self.state = if node == self.root {
            state_at(doc, self.root, node, 0)
        } else {
            state_for_node(doc, node)
        };
        Ok(())
    }

    fn check_in_root(&self, doc: &Document, node: NodeId) -> Result<(), DocumentError> {
        if doc.contains(self.root, node) {
            Ok(())
        } else {
            Err(DocumentError::OutsideRoot {
                node,
                root: self.root,
            })
        }
    }

    /// Advance to the next raw position. Returns false at the end of the root.
    pub fn next_position(&mut self, doc: &Document) -> bool {
        let next = match self.state {
            WalkerState::BeforeNode(node) => match doc.first_child(node) {
                Some(child) => state_for_node(doc, child),
                None => WalkerState::Within {
                    container: node,
                    offset: 0,
                },
            },
            WalkerState::Within { container, offset } if doc.is_text(container) => {
                if offset + 1 < doc.node_len(container) {
                    WalkerState::Within {
                        container,
                        offset: offset + 1,
                    }
                } else if container == self.root {
                    return false;
                } else {
                    state_after_node(doc, container)
                }
            }
            WalkerState::Within { container, .. } => {
                if container == self.root {
                    return false;
                }
                state_after_node(doc, container)
            }
        };
        self.state = next;
        true
    }

    /// Step back to the previous raw position. Returns false at the start of
    /// the root.
    pub fn previous_position(&mut self, doc: &Document) -> bool {
        let previous = match self.state {
            WalkerState::Within { container, offset } if doc.is_text(container) => {
                if offset > 0 {
                    WalkerState::Within {
                        container,
                        offset: offset - 1,
                    }
                } else if container == self.root {
                    return false;
                } else {
                    match self.state_before_node(doc, container) {
                        Some(state) => state,
                        None => return false,
                    }
                }
            }
            WalkerState::Within { container, .. } => match doc.last_child(container) {
                Some(child) => last_state_in(doc, child),
                None if container == self.root => return false,
                None => WalkerState::BeforeNode(container),
            },
            WalkerState::BeforeNode(node) => match self.state_before_node(doc, node) {
                Some(state) => state,
                None => return false,
            },
        };
        self.state = previous;
        true
    }

    /// The raw position preceding the start of `node`, or `None` at the start
    /// of the root.
    fn state_before_node(&self, doc: &Document, node: NodeId) -> Option<WalkerState> {
        if node == self.root {
            return None;
        }
        if let Some(previous) = doc.previous_sibling(node) {
            return Some(last_state_in(doc, previous));
        }
        match doc.parent(node) {
            Some(parent) if parent != self.root => Some(WalkerState::BeforeNode(parent)),
            _ => None,
        }
    }
}

fn state_for_node(doc: &Document, node: NodeId) -> WalkerState {
    if doc.is_text(node) {
        WalkerState::Within {
            container: node,
            offset: 0,
        }
    } else {
        WalkerState::BeforeNode(node)
    }
}

fn state_at(doc: &Document, root: NodeId, node: NodeId, offset: usize) -> WalkerState {
    if doc.is_text(node) {
        let len = doc.node_len(node);
        if offset < len || len == 0 || node == root {
            return WalkerState::Within {
                container: node,
                offset: offset.min(len.saturating_sub(1)),
            };
        }
        return state_after_node(doc, node);
    }
    match doc.child_at(node, offset) {
        Some(child) => state_for_node(doc, child),
        None => WalkerState::Within {
            container: node,
            offset: doc.child_count(node),
        },
    }
}

/// The raw position following the end of `node`.
fn state_after_node(doc: &Document, node: NodeId) -> WalkerState {
    if let Some(next) = doc.next_sibling(node) {
        return state_for_node(doc, next);
    }
    match doc.parent(node) {
        Some(parent) => WalkerState::Within {
            container: parent,
            offset: doc.child_count(parent),
        },
        None => WalkerState::Within {
            container: node,
            offset: doc.node_len(node),
        },
    }
}

/// The last raw position inside `node`.
fn last_state_in(doc: &Document, node: NodeId) -> WalkerState {
    WalkerState::Within {
        container: node,
        offset: if doc.is_text(node) {
            doc.node_len(node).saturating_sub(1)
        } else {
            doc.child_count(node)
        },
    }
}

/// A snapshot of a walker position that can be compared against a walker as
/// it moves.
///
/// A position before node `N` is recorded as `(N, 0)` flagged
/// `before_node`: the flagged point stands one raw position ahead of where
/// the walker really is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkerPoint {
    pub container: NodeId,
    pub offset: usize,
    pub before_node: bool,
}

impl WalkerPoint {
    pub fn from_walker(walker: &TreeWalker) -> Self {
        match walker.state() {
            WalkerState::BeforeNode(node) => Self {
                container: node,
                offset: 0,
                before_node: true,
            },
            WalkerState::Within { container, offset } => Self {
                container,
                offset,
                before_node: false,
            },
        }
    }

    /// Exact state equality with the walker's current position.
    pub fn is_equal_to(&self, walker: &TreeWalker) -> bool {
        match walker.state() {
            WalkerState::BeforeNode(node) => {
                self.before_node && self.offset == 0 && self.container == node
            }
            WalkerState::Within { container, offset } => {
                !self.before_node && self.offset == offset && self.container == container
            }
        }
    }

    /// Document-order comparison of this point against another.
    ///
    /// When exactly one side is flagged `before_node`, the flagged side is
    /// one raw position before its recorded point. The two are equal when the
    /// other side is the flagged node's parent at the node's own index.
    pub fn compare(&self, doc: &Document, other: &WalkerPoint) -> Ordering {
        let raw = doc.compare_points(self.tree_position(), other.tree_position());
        if self.before_node == other.before_node {
            return raw;
        }
        // Work in flagged-vs-plain orientation, then turn back to self-vs-other.
        let (flagged, plain, flagged_vs_plain) = if self.before_node {
            (self, other, raw)
        } else {
            (other, self, raw.reverse())
        };
        let result = match flagged_vs_plain {
            Ordering::Equal => Ordering::Less,
            Ordering::Greater if is_parent_slot(doc, flagged.container, plain) => Ordering::Equal,
            ordering => ordering,
        };
        if self.before_node {
            result
        } else {
            result.reverse()
        }
    }

    pub fn compare_to_walker(&self, doc: &Document, walker: &TreeWalker) -> Ordering {
        self.compare(doc, &WalkerPoint::from_walker(walker))
    }

    fn tree_position(&self) -> TreePosition {
        TreePosition::new(self.container, self.offset)
    }
}

fn is_parent_slot(doc: &Document, node: NodeId, point: &WalkerPoint) -> bool {
    doc.parent(node) == Some(point.container) && doc.index_in_parent(node) == Some(point.offset)
}
