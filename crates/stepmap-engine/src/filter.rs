//! Position and node filters supplied by the content model.
//!
//! The translator only sees these traits. [`TextPositionFilter`] is a small
//! reference content model: paragraphs hold text, every char is a caret
//! position, and each paragraph has one extra position at its end.

use crate::document::{Document, NodeId};
use crate::walker::{TreeWalker, WalkerState};

/// Verdict of a filter on a position or node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    /// A legal step / a node to report.
    Accept,
    /// Not a step / not reported, and excluded together with its subtree
    /// from range projection.
    Reject,
    /// Not a step / not reported, but its children are still considered.
    Skip,
}

/// Classifies raw walker positions as steps.
pub trait PositionFilter {
    fn accept_position(&self, doc: &Document, walker: &TreeWalker) -> FilterResult;

    /// Paragraph-equivalent nodes get bookmarks in the steps cache.
    fn is_paragraph(&self, doc: &Document, node: NodeId) -> bool;
}

/// Classifies whole nodes for range projection.
pub trait NodeFilter {
    fn accept_node(&self, doc: &Document, node: NodeId) -> FilterResult;
}

impl<F> NodeFilter for F
where
    F: Fn(&Document, NodeId) -> FilterResult,
{
    fn accept_node(&self, doc: &Document, node: NodeId) -> FilterResult {
        self(doc, node)
    }
}

/// Caret positions of plain paragraphs.
///
/// Accepted positions are every char offset of a non-empty text node that
/// sits inside a paragraph, plus the position after the last child of each
/// paragraph. A paragraph holding `n` chars therefore has `n + 1` steps.
#[derive(Debug, Clone)]
pub struct TextPositionFilter {
    paragraph_names: Vec<String>,
}

impl Default for TextPositionFilter {
    fn default() -> Self {
        Self::new(["p", "h"])
    }
}

impl TextPositionFilter {
    pub fn new<I, S>(paragraph_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paragraph_names: paragraph_names.into_iter().map(Into::into).collect(),
        }
    }

    fn is_paragraph_name(&self, doc: &Document, node: NodeId) -> bool {
        doc.name(node)
            .is_some_and(|name| self.paragraph_names.iter().any(|p| p == name))
    }

    /// Nearest paragraph enclosing `node`, including `node` itself.
    pub fn paragraph_of(&self, doc: &Document, node: NodeId) -> Option<NodeId> {
        std::iter::once(node)
            .chain(doc.ancestors(node))
            .find(|&n| self.is_paragraph_name(doc, n))
    }
}

impl PositionFilter for TextPositionFilter {
    fn accept_position(&self, doc: &Document, walker: &TreeWalker) -> FilterResult {
        match walker.state() {
            WalkerState::Within { container, offset } if doc.is_text(container) => {
                if offset < doc.node_len(container) && self.paragraph_of(doc, container).is_some()
                {
                    FilterResult::Accept
                } else {
                    FilterResult::Reject
                }
            }
            WalkerState::Within { container, offset }
                if self.is_paragraph_name(doc, container)
                    && offset == doc.child_count(container) =>
            {
                FilterResult::Accept
            }
            _ => FilterResult::Reject,
        }
    }

    fn is_paragraph(&self, doc: &Document, node: NodeId) -> bool {
        self.is_paragraph_name(doc, node)
    }
}

/// Reports text nodes and looks through every element.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextNodeFilter;

impl NodeFilter for TextNodeFilter {
    fn accept_node(&self, doc: &Document, node: NodeId) -> FilterResult {
        if doc.is_text(node) {
            FilterResult::Accept
        } else {
            FilterResult::Skip
        }
    }
}

/// Reports paragraphs, looks through other elements, drops loose text.
#[derive(Debug, Clone, Default)]
pub struct ParagraphNodeFilter {
    positions: TextPositionFilter,
}

impl ParagraphNodeFilter {
    pub fn new(positions: TextPositionFilter) -> Self {
        Self { positions }
    }
}

impl NodeFilter for ParagraphNodeFilter {
    fn accept_node(&self, doc: &Document, node: NodeId) -> FilterResult {
        if self.positions.is_paragraph(doc, node) {
            FilterResult::Accept
        } else if doc.is_text(node) {
            FilterResult::Reject
        } else {
            FilterResult::Skip
        }
    }
}
