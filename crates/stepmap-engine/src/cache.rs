//! Sparse step bookmarks used to seed translation walks.
//!
//! A bookmark ties a node to the step index of the first accepted position at
//! or after the node's start. Bookmarks are kept in step order, which is also
//! document order, and are spaced at least `bucket_size` steps apart so a walk
//! from the nearest bookmark stays short. A synthetic bookmark for the root
//! at step 0 is always available and never stored.

use std::collections::{BTreeMap, HashMap};

use crate::document::{Document, NodeId, TreePosition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bookmark {
    pub steps: usize,
    pub node: NodeId,
}

#[derive(Debug, Clone)]
pub struct BookmarkCache {
    root: NodeId,
    bucket_size: usize,
    by_step: BTreeMap<usize, NodeId>,
    by_node: HashMap<NodeId, usize>,
}

impl BookmarkCache {
    pub fn new(root: NodeId, bucket_size: usize) -> Self {
        Self {
            root,
            bucket_size,
            by_step: BTreeMap::new(),
            by_node: HashMap::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    pub fn root_bookmark(&self) -> Bookmark {
        Bookmark {
            steps: 0,
            node: self.root,
        }
    }

    /// Number of stored bookmarks, not counting the root.
    pub fn len(&self) -> usize {
        self.by_step.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_step.is_empty()
    }

    /// Stored bookmarks in step order.
    pub fn bookmarks(&self) -> impl Iterator<Item = Bookmark> + '_ {
        self.by_step
            .iter()
            .map(|(&steps, &node)| Bookmark { steps, node })
    }

    pub fn steps_for(&self, node: NodeId) -> Option<usize> {
        self.by_node.get(&node).copied()
    }

    /// Highest bookmark at or below `steps`, or the root bookmark.
    ///
    /// Bookmarks whose node has left the tree are dropped on the way.
    pub fn nearest_at_or_below(&mut self, doc: &Document, steps: usize) -> Bookmark {
        while let Some((&found, &node)) = self.by_step.range(..=steps).next_back() {
            if doc.contains(self.root, node) {
                return Bookmark { steps: found, node };
            }
            self.remove(found, node);
        }
        self.root_bookmark()
    }

    /// Closest bookmark whose node starts at or before `position`, or the root
    /// bookmark.
    ///
    /// The node at the position and its ancestors are checked first; only
    /// when none of them is bookmarked are the stored bookmarks binary
    /// searched. Step order matches document order, so the search runs over
    /// step keys and drops bookmarks whose node has left the tree as it meets
    /// them.
    pub fn nearest_to_position(&mut self, doc: &Document, position: TreePosition) -> Bookmark {
        let start = if doc.is_element(position.node) {
            doc.child_at(position.node, position.offset)
                .unwrap_or(position.node)
        } else {
            position.node
        };
        for candidate in std::iter::once(start).chain(doc.ancestors(start)) {
            if candidate == self.root {
                break;
            }
            if let Some(steps) = self.steps_for(candidate) {
                return Bookmark {
                    steps,
                    node: candidate,
                };
            }
        }

        let Some(&last) = self.by_step.keys().next_back() else {
            return self.root_bookmark();
        };
        let mut best = self.root_bookmark();
        let (mut low, mut high) = (0, last);
        while low <= high {
            let mid = low + (high - low) / 2;
            let Some((&steps, &node)) = self.by_step.range(mid..=high).next() else {
                // nothing stored in mid..=high
                match mid.checked_sub(1) {
                    Some(below) => high = below,
                    None => break,
                }
                continue;
            };
            if !doc.contains(self.root, node) {
                self.remove(steps, node);
                continue;
            }
            if doc.compare_points(node_start(doc, node), position).is_le() {
                best = Bookmark { steps, node };
                match steps.checked_add(1) {
                    Some(above) => low = above,
                    None => break,
                }
            } else {
                match mid.checked_sub(1) {
                    Some(below) => high = below,
                    None => break,
                }
            }
        }
        best
    }

    /// Record that the first step at or after `node`'s start is `steps`.
    ///
    /// An already bookmarked node is always moved to its new step. A new node
    /// replaces whatever sits at exactly the same step, and is otherwise only
    /// stored when it is at least `bucket_size` steps from its neighbours.
    /// Returns whether the bookmark was stored.
    pub fn set(&mut self, steps: usize, node: NodeId) -> bool {
        if node == self.root {
            return false;
        }
        match self.by_node.get(&node).copied() {
            Some(existing) if existing == steps => return true,
            Some(existing) => {
                self.by_step.remove(&existing);
            }
            None if !self.by_step.contains_key(&steps) && !self.has_room_for(steps) => {
                return false;
            }
            None => {}
        }
        if let Some(replaced) = self.by_step.insert(steps, node)
            && replaced != node
        {
            self.by_node.remove(&replaced);
        }
        self.by_node.insert(node, steps);
        true
    }

    /// Drop every bookmark at or after `steps`.
    pub fn invalidate_from(&mut self, steps: usize) {
        let damaged = self.by_step.split_off(&steps);
        for node in damaged.values() {
            self.by_node.remove(node);
        }
        if !damaged.is_empty() {
            log::debug!(
                "Dropped {} bookmark(s) from step {steps} onwards",
                damaged.len()
            );
        }
    }

    pub fn clear(&mut self) {
        self.by_step.clear();
        self.by_node.clear();
    }

    fn has_room_for(&self, steps: usize) -> bool {
        if self.bucket_size == 0 {
            return true;
        }
        // the root bookmark sits at step 0
        let below = self
            .by_step
            .range(..steps)
            .next_back()
            .map_or(0, |(&s, _)| s);
        let above = self.by_step.range(steps..).next().map(|(&s, _)| s);
        steps - below >= self.bucket_size && above.is_none_or(|a| a - steps >= self.bucket_size)
    }

    fn remove(&mut self, steps: usize, node: NodeId) {
        self.by_step.remove(&steps);
        self.by_node.remove(&node);
    }
}

/// Boundary point just before `node`.
fn node_start(doc: &Document, node: NodeId) -> TreePosition {
    match doc.parent(node) {
        Some(parent) => TreePosition::new(parent, doc.index_in_parent(node).unwrap_or(0)),
        None => TreePosition::new(node, 0),
    }
}
