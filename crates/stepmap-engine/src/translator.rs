//! Step <-> tree position translation.
//!
//! A step is the index of an accepted position in document order. Both
//! directions walk the tree from the nearest cached bookmark, and every
//! paragraph passed on the way is bookmarked so later lookups start closer.
//!
//! The cache is only as good as the change notifications it receives: after
//! any edit that adds or removes steps, call [`StepsTranslator::notify_inserted`]
//! or [`StepsTranslator::notify_removed`] before the next lookup. Replacing the
//! document root is detected automatically.

use crate::cache::{Bookmark, BookmarkCache};
use crate::document::{Document, DocumentError, NodeId, TreePosition};
use crate::filter::{FilterResult, PositionFilter};
use crate::walker::{TreeWalker, WalkerPoint};

/// Default spacing between bookmarks, in steps.
pub const DEFAULT_BUCKET_SIZE: usize = 500;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TranslateError {
    #[error("Invalid step value: {0}")]
    InvalidArgument(f64),
    #[error("Requested step {requested} is out of range ({available} steps available)")]
    OutOfRange { requested: usize, available: usize },
    #[error("No step can represent {node:?} at offset {offset}")]
    Unrepresentable { node: NodeId, offset: usize },
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Convert a wire value into a step index.
///
/// Rejects NaN, infinities, negative and fractional values, and anything
/// that does not fit below `usize::MAX`.
pub fn steps_from_f64(value: f64) -> Result<usize, TranslateError> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value >= usize::MAX as f64 {
        return Err(TranslateError::InvalidArgument(value));
    }
    Ok(value as usize)
}

/// Which neighbouring step a rounding callback is being offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    Previous,
    Next,
}

/// Tie-break for a position that is not itself a step.
///
/// Called with the direction and the candidate's `(container, offset)`;
/// returning true picks that candidate.
pub trait RoundDirection {
    fn choose(&self, direction: StepDirection, node: NodeId, offset: usize) -> bool;
}

impl<F> RoundDirection for F
where
    F: Fn(StepDirection, NodeId, usize) -> bool,
{
    fn choose(&self, direction: StepDirection, node: NodeId, offset: usize) -> bool {
        self(direction, node, offset)
    }
}

/// An edit reported by the host: `length` steps added or removed at step
/// `position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepsChanged {
    pub position: usize,
    pub length: usize,
}

impl StepsChanged {
    pub fn new(position: usize, length: usize) -> Self {
        Self { position, length }
    }
}

/// Where invalidation starts after a removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemovalBoundary {
    /// Drop bookmarks from the reported position onwards.
    Exact,
    /// Also drop the bookmark one step earlier. Removals that merge
    /// paragraphs report the position of the first removed char, while the
    /// paragraph that was absorbed starts one step before it.
    #[default]
    PrecedingStep,
}

pub type RootAccessor = Box<dyn Fn(&Document) -> NodeId>;

pub struct StepsTranslator<F: PositionFilter> {
    filter: F,
    bucket_size: usize,
    root_accessor: RootAccessor,
    root: NodeId,
    cache: BookmarkCache,
    walker: TreeWalker,
}

impl<F: PositionFilter> std::fmt::Debug for StepsTranslator<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepsTranslator")
            .field("root", &self.root)
            .field("bucket_size", &self.bucket_size)
            .field("bookmarks", &self.cache.len())
            .finish()
    }
}

impl<F: PositionFilter> StepsTranslator<F> {
    /// Bind a translator to the current root of `doc`.
    pub fn new(doc: &Document, filter: F, bucket_size: usize) -> Self {
        Self::with_root_accessor(doc, filter, bucket_size, Box::new(Document::root))
    }

    /// Bind a translator whose root is looked up through `root_accessor` on
    /// every call, e.g. to translate within a subtree.
    pub fn with_root_accessor(
        doc: &Document,
        filter: F,
        bucket_size: usize,
        root_accessor: RootAccessor,
    ) -> Self {
        let root = root_accessor(doc);
        Self {
            filter,
            bucket_size,
            root_accessor,
            root,
            cache: BookmarkCache::new(root, bucket_size),
            walker: TreeWalker::new(doc, root),
        }
    }

    pub fn filter(&self) -> &F {
        &self.filter
    }

    pub fn cache(&self) -> &BookmarkCache {
        &self.cache
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Position of step `steps`.
    pub fn steps_to_position(
        &mut self,
        doc: &Document,
        steps: usize,
    ) -> Result<TreePosition, TranslateError> {
        self.verify_root(doc);
        let anchor = self.cache.nearest_at_or_below(doc, steps);
        let mut next_step = self.seek(doc, anchor);
        log::trace!("Walking to step {steps} from step {next_step}");
        loop {
            self.update_cache(doc, next_step);
            if self.is_accepted(doc) {
                if next_step == steps {
                    return Ok(self.walker.position(doc));
                }
                next_step += 1;
            }
            if !self.walker.next_position(doc) {
                return Err(TranslateError::OutOfRange {
                    requested: steps,
                    available: next_step,
                });
            }
        }
    }

    /// Step at `(node, offset)`.
    ///
    /// A position that is not a step resolves to the step before it. With a
    /// `round` callback, the nearest step before and then after the position
    /// are offered in turn, and the first one chosen is used instead. A
    /// position before every step resolves to step 0. Positions outside the
    /// root are clamped to its start or end.
    pub fn position_to_steps(
        &mut self,
        doc: &Document,
        node: NodeId,
        offset: usize,
        round: Option<&dyn RoundDirection>,
    ) -> Result<usize, TranslateError> {
        self.verify_root(doc);
        doc.check_position(TreePosition::new(node, offset))?;
        let (container, container_offset) = self.clamp_to_root(doc, node, offset);

        self.walker
            .set_unfiltered_position(doc, container, container_offset)?;
        if !self.round_to_preferred_step(doc, round) {
            self.walker
                .set_unfiltered_position(doc, container, container_offset)?;
        }
        let destination = WalkerPoint::from_walker(&self.walker);
        let anchor = self
            .cache
            .nearest_to_position(doc, self.walker.position(doc));

        let mut next_step = self.seek(doc, anchor);
        if destination.compare_to_walker(doc, &self.walker).is_lt() {
            // stale bookmark ahead of the destination
            next_step = self.seek(doc, self.cache.root_bookmark());
        }
        log::trace!("Counting steps up to {destination:?} from step {next_step}");

        loop {
            self.update_cache(doc, next_step);
            let accepted = self.is_accepted(doc);
            if destination.is_equal_to(&self.walker) {
                if accepted {
                    return Ok(next_step);
                }
                break;
            }
            if accepted {
                next_step += 1;
            }
            if !self.walker.next_position(doc) {
                break;
            }
        }

        match next_step.checked_sub(1) {
            Some(previous) => Ok(previous),
            None if self.has_step_ahead(doc) => Ok(0),
            None => Err(TranslateError::Unrepresentable { node, offset }),
        }
    }

    /// Total number of steps in the document.
    pub fn step_count(&mut self, doc: &Document) -> usize {
        self.verify_root(doc);
        let anchor = self.cache.nearest_at_or_below(doc, usize::MAX);
        self.step_count_from(doc, anchor)
    }

    /// Walk the whole document once, bookmarking every paragraph the bucket
    /// spacing allows.
    pub fn prime(&mut self, doc: &Document) {
        self.verify_root(doc);
        let total = self.step_count_from(doc, self.cache.root_bookmark());
        log::debug!(
            "Primed steps cache: {total} steps, {} bookmarks",
            self.cache.len()
        );
    }

    /// Steps were inserted; bookmarks at or after the insertion point are
    /// dropped.
    pub fn notify_inserted(&mut self, doc: &Document, change: StepsChanged) {
        self.verify_root(doc);
        log::debug!(
            "{} step(s) inserted at step {}",
            change.length,
            change.position
        );
        self.cache.invalidate_from(change.position);
    }

    /// Steps were removed; bookmarks from the boundary onwards are dropped.
    pub fn notify_removed(
        &mut self,
        doc: &Document,
        change: StepsChanged,
        boundary: RemovalBoundary,
    ) {
        self.verify_root(doc);
        log::debug!(
            "{} step(s) removed at step {}",
            change.length,
            change.position
        );
        let from = match boundary {
            RemovalBoundary::Exact => change.position,
            RemovalBoundary::PrecedingStep => change.position.saturating_sub(1),
        };
        self.cache.invalidate_from(from);
    }

    /// Rebuild cache and walker when the root has been replaced.
    fn verify_root(&mut self, doc: &Document) {
        let current = (self.root_accessor)(doc);
        if current != self.root {
            log::info!(
                "Root changed from {:?} to {current:?}, resetting steps cache",
                self.root
            );
            self.root = current;
            self.cache = BookmarkCache::new(current, self.bucket_size);
            self.walker = TreeWalker::new(doc, current);
        }
    }

    fn is_accepted(&self, doc: &Document) -> bool {
        self.filter.accept_position(doc, &self.walker) == FilterResult::Accept
    }

    /// Bookmark the paragraph the walker is about to enter.
    fn update_cache(&mut self, doc: &Document, next_step: usize) {
        if self.walker.is_before_node() {
            let node = self.walker.current_node();
            if self.filter.is_paragraph(doc, node) {
                self.cache.set(next_step, node);
            }
        }
    }

    /// Put the walker at the start of the bookmarked node and return the
    /// step index of the first accepted position from there.
    fn seek(&mut self, doc: &Document, bookmark: Bookmark) -> usize {
        if bookmark.node != self.root
            && self.walker.set_before_node(doc, bookmark.node).is_ok()
        {
            return bookmark.steps;
        }
        self.walker = TreeWalker::new(doc, self.root);
        0
    }

    fn step_count_from(&mut self, doc: &Document, bookmark: Bookmark) -> usize {
        let mut next_step = self.seek(doc, bookmark);
        loop {
            self.update_cache(doc, next_step);
            if self.is_accepted(doc) {
                next_step += 1;
            }
            if !self.walker.next_position(doc) {
                return next_step;
            }
        }
    }

    fn clamp_to_root(&self, doc: &Document, node: NodeId, offset: usize) -> (NodeId, usize) {
        if doc.contains(self.root, node) {
            return (node, offset);
        }
        let root_start = TreePosition::new(self.root, 0);
        if doc
            .compare_points(TreePosition::new(node, offset), root_start)
            .is_lt()
        {
            (self.root, 0)
        } else {
            (self.root, doc.child_count(self.root))
        }
    }

    /// Move off a non-step position towards the step the callback prefers.
    /// Returns false when neither neighbour was chosen.
    fn round_to_preferred_step(
        &mut self,
        doc: &Document,
        round: Option<&dyn RoundDirection>,
    ) -> bool {
        let Some(round) = round else {
            return true;
        };
        if self.is_accepted(doc) {
            return true;
        }
        let origin = self.walker.clone();
        while self.walker.previous_position(doc) {
            if self.is_accepted(doc) {
                if self.offer(doc, round, StepDirection::Previous) {
                    return true;
                }
                break;
            }
        }
        self.walker = origin;
        while self.walker.next_position(doc) {
            if self.is_accepted(doc) {
                if self.offer(doc, round, StepDirection::Next) {
                    return true;
                }
                break;
            }
        }
        false
    }

    fn offer(&self, doc: &Document, round: &dyn RoundDirection, direction: StepDirection) -> bool {
        round.choose(
            direction,
            self.walker.container(doc),
            self.walker.unfiltered_offset(doc),
        )
    }

    fn has_step_ahead(&mut self, doc: &Document) -> bool {
        while self.walker.next_position(doc) {
            if self.is_accepted(doc) {
                return true;
            }
        }
        false
    }
}
