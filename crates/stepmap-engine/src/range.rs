//! Projection of a tree range onto the nodes it covers.
//!
//! Starting at the range's common ancestor, children that lie wholly inside
//! the range are reported as single units, while the (at most two) children
//! straddling a range boundary are descended into so the boundary can be
//! resolved at a finer level. Nodes are reported in document order.

use crate::document::{Document, NodeId, TreePosition};
use crate::filter::{FilterResult, NodeFilter, ParagraphNodeFilter, TextNodeFilter, TextPositionFilter};

/// A range between two boundary points, `start` not after `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeRange {
    pub start: TreePosition,
    pub end: TreePosition,
}

impl TreeRange {
    pub fn new(start: TreePosition, end: TreePosition) -> Self {
        Self { start, end }
    }

    pub fn collapsed(at: TreePosition) -> Self {
        Self { start: at, end: at }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Deepest node containing both boundary containers.
    pub fn common_ancestor(&self, doc: &Document) -> Option<NodeId> {
        doc.common_ancestor(self.start.node, self.end.node)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    /// The child straddles a range boundary and must be descended into.
    Intersect,
    /// The child lies wholly inside the range.
    Contained,
}

struct RangeProjector<'a> {
    doc: &'a Document,
    range: TreeRange,
    filter: Option<&'a dyn NodeFilter>,
}

/// Nodes wholly or partially inside `range`, in document order.
///
/// Without a filter every node is accepted, so the common ancestor itself is
/// the first entry.
pub fn project(doc: &Document, range: TreeRange, filter: Option<&dyn NodeFilter>) -> Vec<NodeId> {
    let mut nodes = Vec::new();
    if let Some(ancestor) = range.common_ancestor(doc) {
        let projector = RangeProjector { doc, range, filter };
        projector.process_partial(ancestor, &mut nodes, true);
    }
    nodes
}

/// Text nodes touched by `range`.
pub fn text_nodes_in_range(doc: &Document, range: TreeRange) -> Vec<NodeId> {
    project(doc, range, Some(&TextNodeFilter))
}

/// Paragraphs touched by `range`, including the paragraph that encloses a
/// range lying entirely inside one paragraph.
pub fn paragraphs_in_range(
    doc: &Document,
    range: TreeRange,
    positions: &TextPositionFilter,
) -> Vec<NodeId> {
    let filter = ParagraphNodeFilter::new(positions.clone());
    let mut paragraphs = project(doc, range, Some(&filter));
    let enclosing = range
        .common_ancestor(doc)
        .and_then(|ancestor| positions.paragraph_of(doc, ancestor));
    if let Some(paragraph) = enclosing
        && !paragraphs.contains(&paragraph)
    {
        paragraphs.insert(0, paragraph);
    }
    paragraphs
}

impl RangeProjector<'_> {
    fn accept(&self, node: NodeId) -> FilterResult {
        self.filter
            .map_or(FilterResult::Accept, |f| f.accept_node(self.doc, node))
    }

    fn process_complete(&self, node: NodeId, nodes: &mut Vec<NodeId>) {
        match self.accept(node) {
            FilterResult::Accept => nodes.push(node),
            FilterResult::Skip => {
                for &child in self.doc.children(node) {
                    self.process_complete(child, nodes);
                }
            }
            FilterResult::Reject => {}
        }
    }

    fn process_partial(&self, node: NodeId, nodes: &mut Vec<NodeId>, is_root: bool) {
        let accept = self.accept(node);
        if accept == FilterResult::Accept {
            nodes.push(node);
        }
        if accept == FilterResult::Reject && !is_root {
            return;
        }
        let Some((start_index, start_kind)) = self.start_child(node) else {
            return;
        };
        let Some((end_index, end_kind)) = self.end_child(node) else {
            return;
        };
        if start_index > end_index {
            return;
        }

        let children = self.doc.children(node);
        for (index, &child) in children
            .iter()
            .enumerate()
            .take(end_index + 1)
            .skip(start_index)
        {
            let straddles = (index == start_index && start_kind == Boundary::Intersect)
                || (index == end_index && end_kind == Boundary::Intersect);
            if straddles {
                self.process_partial(child, nodes, false);
            } else {
                self.process_complete(child, nodes);
            }
        }
    }

    /// First child of `node` touched by the range.
    fn start_child(&self, node: NodeId) -> Option<(usize, Boundary)> {
        let count = self.doc.child_count(node);
        if count == 0 {
            return None;
        }
        let start = self.range.start;
        if start.node == node {
            return (start.offset < count).then_some((start.offset, Boundary::Contained));
        }
        Some(match self.doc.child_towards(node, start.node) {
            Some(child) => (self.index_of(child), Boundary::Intersect),
            // the range starts before this node
            None => (0, Boundary::Contained),
        })
    }

    /// Last child of `node` touched by the range.
    fn end_child(&self, node: NodeId) -> Option<(usize, Boundary)> {
        let count = self.doc.child_count(node);
        if count == 0 {
            return None;
        }
        let end = self.range.end;
        if end.node == node {
            return end
                .offset
                .checked_sub(1)
                .map(|index| (index.min(count - 1), Boundary::Contained));
        }
        Some(match self.doc.child_towards(node, end.node) {
            Some(child) => (self.index_of(child), Boundary::Intersect),
            // the range ends after this node
            None => (count - 1, Boundary::Contained),
        })
    }

    fn index_of(&self, child: NodeId) -> usize {
        self.doc.index_in_parent(child).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Sample {
        doc: Document,
        p1: NodeId,
        hello: NodeId,
        p2: NodeId,
        wor: NodeId,
        b: NodeId,
        ld: NodeId,
        p3: NodeId,
    }

    /// `<body><p>hello</p><p>wor<b>ld</b></p><p>!</p></body>`
    fn sample() -> Sample {
        let mut doc = Document::new("body");
        let root = doc.root();
        let p1 = doc.create_element("p");
        let hello = doc.create_text("hello");
        let p2 = doc.create_element("p");
        let wor = doc.create_text("wor");
        let b = doc.create_element("b");
        let ld = doc.create_text("ld");
        let p3 = doc.create_element("p");
        let bang = doc.create_text("!");
        doc.append_child(root, p1).unwrap();
        doc.append_child(p1, hello).unwrap();
        doc.append_child(root, p2).unwrap();
        doc.append_child(p2, wor).unwrap();
        doc.append_child(p2, b).unwrap();
        doc.append_child(b, ld).unwrap();
        doc.append_child(root, p3).unwrap();
        doc.append_child(p3, bang).unwrap();
        Sample {
            doc,
            p1,
            hello,
            p2,
            wor,
            b,
            ld,
            p3,
        }
    }

    fn describe(doc: &Document, nodes: &[NodeId]) -> String {
        nodes
            .iter()
            .map(|&n| match doc.text(n) {
                Some(text) => format!("{text:?}"),
                None => doc.name(n).unwrap_or_default().to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn straddling_range_descends_both_boundaries() {
        let s = sample();
        let range = TreeRange::new(TreePosition::new(s.hello, 2), TreePosition::new(s.ld, 1));
        let nodes = project(&s.doc, range, None);
        insta::assert_snapshot!(describe(&s.doc, &nodes), @r#"body p "hello" p "wor" b "ld""#);
    }

    #[test]
    fn fully_contained_node_is_atomic() {
        let s = sample();
        let root = s.doc.root();
        let range = TreeRange::new(TreePosition::new(root, 1), TreePosition::new(root, 2));
        let nodes = project(&s.doc, range, None);
        assert_eq!(nodes, vec![root, s.p2]);
    }

    #[test]
    fn range_starting_inside_node_recurses_into_it() {
        let s = sample();
        let root = s.doc.root();
        let range = TreeRange::new(TreePosition::new(s.wor, 1), TreePosition::new(root, 3));
        let nodes = project(&s.doc, range, None);
        assert_eq!(nodes, vec![root, s.p2, s.wor, s.b, s.p3]);
    }

    #[test]
    fn no_node_is_followed_by_its_descendants() {
        let s = sample();
        let root = s.doc.root();
        let range = TreeRange::new(TreePosition::new(root, 0), TreePosition::new(root, 3));
        let nodes = project(&s.doc, range, None);
        assert_eq!(nodes, vec![root, s.p1, s.p2, s.p3]);
        for (i, &node) in nodes.iter().enumerate().skip(1) {
            assert!(nodes[i + 1..].iter().all(|&later| !s.doc.contains(node, later)));
        }
    }

    #[test]
    fn collapsed_range_covers_only_the_container() {
        let s = sample();
        let root = s.doc.root();
        let range = TreeRange::collapsed(TreePosition::new(root, 1));
        assert!(range.is_collapsed());
        assert_eq!(project(&s.doc, range, None), vec![root]);
    }

    #[test]
    fn range_inside_one_text_node() {
        let s = sample();
        let range = TreeRange::new(TreePosition::new(s.hello, 1), TreePosition::new(s.hello, 3));
        assert_eq!(project(&s.doc, range, None), vec![s.hello]);
    }

    #[test]
    fn skip_descends_and_reject_prunes() {
        let s = sample();
        let root = s.doc.root();
        let range = TreeRange::new(TreePosition::new(root, 0), TreePosition::new(root, 3));
        let skip_paragraph_two = |doc: &Document, node: NodeId| {
            if node == s.p2 {
                FilterResult::Reject
            } else if doc.is_text(node) {
                FilterResult::Accept
            } else {
                FilterResult::Skip
            }
        };
        let nodes = project(&s.doc, range, Some(&skip_paragraph_two));
        insta::assert_snapshot!(describe(&s.doc, &nodes), @r#""hello" "!""#);
    }

    #[test]
    fn text_nodes_in_selection() {
        let s = sample();
        let range = TreeRange::new(TreePosition::new(s.hello, 4), TreePosition::new(s.wor, 2));
        assert_eq!(text_nodes_in_range(&s.doc, range), vec![s.hello, s.wor]);
    }

    #[test]
    fn paragraphs_in_selection() {
        let s = sample();
        let filter = TextPositionFilter::default();
        let across = TreeRange::new(TreePosition::new(s.hello, 4), TreePosition::new(s.ld, 0));
        assert_eq!(paragraphs_in_range(&s.doc, across, &filter), vec![s.p1, s.p2]);

        let inside = TreeRange::new(TreePosition::new(s.ld, 0), TreePosition::new(s.ld, 1));
        assert_eq!(paragraphs_in_range(&s.doc, inside, &filter), vec![s.p2]);
        assert_eq!(s.doc.parent(s.ld), Some(s.b));
    }

    #[test]
    fn range_across_detached_trees_is_empty() {
        let mut s = sample();
        let stray = s.doc.create_element("p");
        let range = TreeRange::new(TreePosition::new(s.p1, 0), TreePosition::new(stray, 0));
        assert!(project(&s.doc, range, None).is_empty());
    }
}
