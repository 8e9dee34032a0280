//! # Text Runs
//!
//! The content being typeset, modelled as an arena: an immutable list of
//! source nodes plus an ordered list of active substitutions. Rendered text
//! is always recomputed from `source + substitutions`, so undoing an edit is
//! just dropping its record. Nothing depends on the order edits were made in
//! matching the order of the rendered structure.

pub mod splice;

use serde::{Deserialize, Serialize};

pub use splice::{Replacement, ReplacementUnit, SpanRef, Substitution, SubstitutionId, NBSP};

/// One source node of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Node {
    /// Plain text.
    Text { content: String },
    /// An inline element wrapping its own text (a styled span, a link).
    Element(InlineElement),
    /// A hard line break.
    Break,
}

impl Node {
    pub fn text(content: impl Into<String>) -> Self {
        Node::Text {
            content: content.into(),
        }
    }

    /// The spliceable text this node holds, if any.
    pub fn content(&self) -> Option<&str> {
        match self {
            Node::Text { content } => Some(content),
            Node::Element(element) => Some(&element.text),
            Node::Break => None,
        }
    }
}

/// An inline element with a single text child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineElement {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default)]
    pub text: String,
}

impl InlineElement {
    pub fn new(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            class: None,
            text: text.into(),
        }
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }
}

/// One piece of rendered output. Every segment remembers the source node it
/// came from so measurement fragments can be mapped back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Segment {
    Text {
        node: usize,
        text: String,
    },
    Element {
        node: usize,
        tag: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        class: Option<String>,
        text: String,
        /// Set when this element was transplanted in by a substitution.
        #[serde(skip_serializing_if = "Option::is_none")]
        substitution: Option<SubstitutionId>,
    },
    Break {
        node: usize,
    },
}

impl Segment {
    pub fn text(&self) -> &str {
        match self {
            Segment::Text { text, .. } | Segment::Element { text, .. } => text,
            Segment::Break { .. } => "\n",
        }
    }

    pub fn node(&self) -> usize {
        match self {
            Segment::Text { node, .. }
            | Segment::Element { node, .. }
            | Segment::Break { node } => *node,
        }
    }
}

/// A run of text together with the substitutions currently applied to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextRun {
    nodes: Vec<Node>,
    substitutions: Vec<Substitution>,
    next_id: u32,
}

impl TextRun {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes,
            substitutions: Vec::new(),
            next_id: 0,
        }
    }

    /// A run made of one plain text node.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(vec![Node::text(text)])
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Active substitutions, oldest first.
    pub fn substitutions(&self) -> &[Substitution] {
        &self.substitutions
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.iter().all(|n| n.content().is_some_and(str::is_empty))
    }

    /// The source text with no substitutions applied.
    pub fn source_text(&self) -> String {
        self.nodes
            .iter()
            .map(|node| node.content().unwrap_or("\n"))
            .collect()
    }

    /// The rendered text: source with every active substitution applied.
    pub fn text(&self) -> String {
        self.segments().iter().map(Segment::text).collect()
    }

    /// Rendered segments in document order.
    pub fn segments(&self) -> Vec<Segment> {
        let mut segments = Vec::new();
        for (index, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Break => segments.push(Segment::Break { node: index }),
                Node::Text { content } => {
                    self.render_node(index, content, None, &mut segments);
                }
                Node::Element(element) => {
                    self.render_node(index, &element.text, Some(element), &mut segments);
                }
            }
        }
        segments
    }

    fn render_node(
        &self,
        index: usize,
        content: &str,
        parent: Option<&InlineElement>,
        out: &mut Vec<Segment>,
    ) {
        let mut active: Vec<&Substitution> = self
            .substitutions
            .iter()
            .filter(|s| s.span.node == index)
            .collect();
        active.sort_by_key(|s| s.span.offset);

        let mut pending = String::new();
        let mut cursor = 0;
        for sub in active {
            pending.push_str(&content[cursor..sub.span.offset]);
            match &sub.replacement {
                ReplacementUnit::Text(text) => pending.push_str(text),
                ReplacementUnit::Element(element) => {
                    flush(index, parent, &mut pending, out);
                    out.push(Segment::Element {
                        node: index,
                        tag: element.tag.clone(),
                        class: element.class.clone(),
                        text: element.text.clone(),
                        substitution: Some(sub.id),
                    });
                }
            }
            cursor = sub.span.offset + sub.original.len();
        }
        pending.push_str(&content[cursor..]);
        flush(index, parent, &mut pending, out);
    }
}

fn flush(index: usize, parent: Option<&InlineElement>, pending: &mut String, out: &mut Vec<Segment>) {
    if pending.is_empty() {
        return;
    }
    let text = std::mem::take(pending);
    match parent {
        None => out.push(Segment::Text { node: index, text }),
        Some(element) => out.push(Segment::Element {
            node: index,
            tag: element.tag.clone(),
            class: element.class.clone(),
            text,
            substitution: None,
        }),
    }
}
