//! Loading markdown files into document trees.
//!
//! Block structure maps onto elements (`p`, `h`, `pre`, `blockquote`,
//! `list`, `li`, `hr`), inline markup onto `span` and `a`, and text runs onto
//! text nodes. Text that lands directly in a block container, as in tight
//! list items, is wrapped in an implicit `p` so it still has caret positions.

use crate::document::{Document, DocumentError, NodeId};
use crate::filter::TextPositionFilter;
use pulldown_cmark::{Event, Parser, Tag};
use std::fs;
use std::path::{Path, PathBuf};

/// Element names that hold caret positions in a loaded markdown tree.
pub const MARKDOWN_PARAGRAPHS: [&str; 3] = ["p", "h", "pre"];

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to build document: {0}")]
    Document(#[from] DocumentError),
}

/// Position filter matching the paragraphs produced by
/// [`document_from_markdown`].
pub fn markdown_filter() -> TextPositionFilter {
    TextPositionFilter::new(MARKDOWN_PARAGRAPHS)
}

/// Read a markdown file into a document tree rooted at `body`.
pub fn read_document(path: &Path) -> Result<Document, IoError> {
    if !path.exists() {
        return Err(IoError::NotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)?;
    Ok(document_from_markdown(&content)?)
}

/// Parse markdown into a document tree rooted at `body`.
pub fn document_from_markdown(content: &str) -> Result<Document, DocumentError> {
    let mut builder = TreeBuilder::new();
    for event in Parser::new(content) {
        builder.process_event(event)?;
    }
    Ok(builder.doc)
}

struct Open {
    node: NodeId,
    implicit: bool,
}

struct TreeBuilder {
    doc: Document,
    open: Vec<Open>,
}

impl TreeBuilder {
    fn new() -> Self {
        let doc = Document::new("body");
        let root = doc.root();
        Self {
            doc,
            open: vec![Open {
                node: root,
                implicit: false,
            }],
        }
    }

    fn top(&self) -> NodeId {
        self.open.last().map_or(self.doc.root(), |open| open.node)
    }

    fn process_event(&mut self, event: Event<'_>) -> Result<(), DocumentError> {
        match event {
            Event::Start(tag) => {
                let block = is_block(&tag);
                if block {
                    self.close_implicit();
                } else {
                    self.ensure_inline_container()?;
                }
                let element = self.doc.create_element(element_name(&tag));
                self.doc.append_child(self.top(), element)?;
                self.open.push(Open {
                    node: element,
                    implicit: false,
                });
            }
            Event::End(_) => {
                self.close_implicit();
                if self.open.len() > 1 {
                    self.open.pop();
                }
            }
            Event::Text(text) | Event::Code(text) => self.push_text(&text)?,
            Event::SoftBreak => self.push_text(" ")?,
            Event::HardBreak => self.push_text("\n")?,
            Event::Rule => {
                self.close_implicit();
                let rule = self.doc.create_element("hr");
                self.doc.append_child(self.top(), rule)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn push_text(&mut self, text: &str) -> Result<(), DocumentError> {
        self.ensure_inline_container()?;
        let parent = self.top();
        if let Some(last) = self.doc.last_child(parent)
            && self.doc.is_text(last)
        {
            let len = self.doc.node_len(last);
            return self.doc.insert_text(last, len, text);
        }
        let node = self.doc.create_text(text);
        self.doc.append_child(parent, node)
    }

    /// Open an implicit paragraph when inline content arrives in a block
    /// container.
    fn ensure_inline_container(&mut self) -> Result<(), DocumentError> {
        let top = self.top();
        if self
            .doc
            .name(top)
            .is_some_and(|name| INLINE_CONTAINERS.contains(&name))
        {
            return Ok(());
        }
        let paragraph = self.doc.create_element("p");
        self.doc.append_child(top, paragraph)?;
        self.open.push(Open {
            node: paragraph,
            implicit: true,
        });
        Ok(())
    }

    fn close_implicit(&mut self) {
        if self.open.last().is_some_and(|open| open.implicit) {
            self.open.pop();
        }
    }
}

const INLINE_CONTAINERS: [&str; 5] = ["p", "h", "pre", "span", "a"];

fn element_name(tag: &Tag<'_>) -> &'static str {
    match tag {
        Tag::Paragraph => "p",
        Tag::Heading { .. } => "h",
        Tag::CodeBlock(_) => "pre",
        Tag::BlockQuote(_) => "blockquote",
        Tag::List(_) => "list",
        Tag::Item => "li",
        Tag::Link { .. } => "a",
        Tag::Emphasis | Tag::Strong | Tag::Strikethrough => "span",
        _ if is_block(tag) => "div",
        _ => "span",
    }
}

fn is_block(tag: &Tag<'_>) -> bool {
    !matches!(
        tag,
        Tag::Emphasis
            | Tag::Strong
            | Tag::Strikethrough
            | Tag::Link { .. }
            | Tag::Image { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translator::StepsTranslator;
    use pretty_assertions::assert_eq;
    use std::fmt::Write;
    use tempfile::TempDir;

    fn outline(doc: &Document) -> String {
        fn visit(doc: &Document, node: NodeId, depth: usize, out: &mut String) {
            let indent = "  ".repeat(depth);
            match doc.text(node) {
                Some(text) => writeln!(out, "{indent}{text:?}").unwrap(),
                None => writeln!(out, "{indent}{}", doc.name(node).unwrap_or_default()).unwrap(),
            }
            for &child in doc.children(node) {
                visit(doc, child, depth + 1, out);
            }
        }
        let mut out = String::new();
        visit(doc, doc.root(), 0, &mut out);
        out
    }

    #[test]
    fn test_blocks_and_inline_markup() {
        let doc = document_from_markdown("# Title\n\nHello *world*\n\n- one\n- two\n").unwrap();
        insta::assert_snapshot!(outline(&doc), @r#"
        body
          h
            "Title"
          p
            "Hello "
            span
              "world"
          list
            li
              p
                "one"
            li
              p
                "two"
        "#);
    }

    #[test]
    fn test_soft_breaks_join_text() {
        let doc = document_from_markdown("first\nsecond\n").unwrap();
        let p = doc.first_child(doc.root()).unwrap();
        assert_eq!(doc.children(p).len(), 1);
        assert_eq!(doc.text_content(p), "first second");
    }

    #[test]
    fn test_markdown_steps() {
        let doc = document_from_markdown("# Title\n\nHello *world*\n\n- one\n- two\n").unwrap();
        let mut translator = StepsTranslator::new(&doc, markdown_filter(), 0);
        assert_eq!(translator.step_count(&doc), 6 + 12 + 4 + 4);
    }

    #[test]
    fn test_read_document_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("note.md");
        std::fs::write(&path, "Some text\n").unwrap();

        let doc = read_document(&path).unwrap();
        assert_eq!(doc.text_content(doc.root()), "Some text");
    }

    #[test]
    fn test_read_document_not_found() {
        let dir = TempDir::new().unwrap();
        let result = read_document(&dir.path().join("missing.md"));
        assert!(matches!(result, Err(IoError::NotFound(_))));
    }
}
