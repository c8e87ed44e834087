pub mod cache;
pub mod document;
pub mod filter;
pub mod io;
pub mod range;
pub mod translator;
pub mod walker;

// Re-export key types for easier usage
pub use cache::{Bookmark, BookmarkCache};
pub use document::{Document, DocumentError, NodeData, NodeId, TreePosition};
pub use filter::{
    FilterResult, NodeFilter, ParagraphNodeFilter, PositionFilter, TextNodeFilter,
    TextPositionFilter,
};
pub use io::*;
pub use range::{TreeRange, paragraphs_in_range, project, text_nodes_in_range};
pub use translator::*;
pub use walker::{TreeWalker, WalkerPoint, WalkerState};
