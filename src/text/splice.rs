//! Reversible substitution of spans of a [`TextRun`].
//!
//! A splice swaps `len` bytes at a node offset for a replacement unit: either
//! plain text, which is merged into the surrounding text, or an inline
//! element, which splits the surrounding text around it. Every splice is
//! recorded with the exact text it replaced; undoing removes the record.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{InlineElement, Node, TextRun};
use crate::error::FitError;

/// The standard no-break space.
pub const NBSP: &str = "\u{a0}";

/// Identity of an active substitution within its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SubstitutionId(pub u32);

/// A byte position inside one text-bearing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpanRef {
    pub node: usize,
    pub offset: usize,
}

/// What actually gets spliced in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReplacementUnit {
    Text(String),
    Element(InlineElement),
}

/// One applied, reversible edit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Substitution {
    pub id: SubstitutionId,
    pub span: SpanRef,
    /// The exact source text that was replaced.
    pub original: String,
    pub replacement: ReplacementUnit,
}

/// A source of replacement units, as configured by the user.
#[derive(Clone)]
pub enum Replacement {
    /// Spliced straight into the text node.
    Text(String),
    /// Rendered as its own inline element. Each substitution gets a fresh
    /// instance built from this template.
    Element(InlineElement),
    /// Called once per substitution.
    Factory(Arc<dyn Fn() -> Node + Send + Sync>),
}

impl Default for Replacement {
    fn default() -> Self {
        Replacement::Text(NBSP.to_string())
    }
}

impl fmt::Debug for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Replacement::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Replacement::Element(element) => f.debug_tuple("Element").field(element).finish(),
            Replacement::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

impl Replacement {
    /// Build the unit for one substitution.
    pub fn produce(&self) -> Result<ReplacementUnit, FitError> {
        let node = match self {
            Replacement::Text(text) => Node::text(text.clone()),
            Replacement::Element(template) => Node::Element(template.clone()),
            Replacement::Factory(factory) => factory(),
        };
        match node {
            Node::Text { content } if content.is_empty() => Err(FitError::UnsupportedReplacement(
                "empty text cannot stand in for a space".to_string(),
            )),
            Node::Text { content } => Ok(ReplacementUnit::Text(content)),
            Node::Element(element) => Ok(ReplacementUnit::Element(element)),
            Node::Break => Err(FitError::UnsupportedReplacement(
                "a hard line break is not a non-breaking unit".to_string(),
            )),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawReplacement {
    Text(String),
    Element(InlineElement),
}

impl<'de> Deserialize<'de> for Replacement {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawReplacement::deserialize(deserializer)? {
            RawReplacement::Text(text) => Replacement::Text(text),
            RawReplacement::Element(element) => Replacement::Element(element),
        })
    }
}

impl TextRun {
    /// Replace `len` bytes at `span` with `replacement`.
    ///
    /// The span must lie on character boundaries of a text-bearing node and
    /// must not overlap an active substitution.
    pub fn splice(
        &mut self,
        span: SpanRef,
        len: usize,
        replacement: ReplacementUnit,
    ) -> Result<SubstitutionId, FitError> {
        let content = self
            .nodes
            .get(span.node)
            .and_then(Node::content)
            .ok_or_else(|| {
                FitError::InvalidSplice(format!("node {} holds no text", span.node))
            })?;

        let end = span.offset + len;
        if len == 0 || end > content.len() {
            return Err(FitError::InvalidSplice(format!(
                "span {}..{} is outside node {} ({} bytes)",
                span.offset,
                end,
                span.node,
                content.len()
            )));
        }
        if !content.is_char_boundary(span.offset) || !content.is_char_boundary(end) {
            return Err(FitError::InvalidSplice(format!(
                "span {}..{} splits a character",
                span.offset, end
            )));
        }
        if self.is_covered(span.node, span.offset, end) {
            return Err(FitError::InvalidSplice(format!(
                "span {}..{} of node {} is already substituted",
                span.offset, end, span.node
            )));
        }

        let original = content[span.offset..end].to_string();
        let id = SubstitutionId(self.next_id);
        self.next_id += 1;
        trace!(node = span.node, offset = span.offset, ?replacement, "splice");
        self.substitutions.push(Substitution {
            id,
            span,
            original,
            replacement,
        });
        Ok(id)
    }

    /// Remove an active substitution, restoring the text it replaced.
    pub fn undo(&mut self, id: SubstitutionId) -> Result<Substitution, FitError> {
        let index = self
            .substitutions
            .iter()
            .position(|s| s.id == id)
            .ok_or(FitError::UnknownSubstitution(id.0))?;
        Ok(self.substitutions.remove(index))
    }

    /// Undo every substitution, newest first. Returns how many were removed.
    pub fn undo_all(&mut self) -> usize {
        let count = self.substitutions.len();
        self.substitutions.clear();
        count
    }

    /// The last plain U+0020 space in the run that isn't already substituted.
    pub fn last_plain_space(&self) -> Option<SpanRef> {
        self.nodes.iter().enumerate().rev().find_map(|(node, n)| {
            let content = n.content()?;
            content
                .char_indices()
                .rev()
                .filter(|&(_, ch)| ch == ' ')
                .map(|(offset, _)| offset)
                .find(|&offset| !self.is_covered(node, offset, offset + 1))
                .map(|offset| SpanRef { node, offset })
        })
    }

    fn is_covered(&self, node: usize, start: usize, end: usize) -> bool {
        self.substitutions.iter().any(|s| {
            s.span.node == node
                && s.span.offset < end
                && start < s.span.offset + s.original.len()
        })
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn undo_in_reverse_is_byte_exact(
            words in proptest::collection::vec("[a-zé]{1,8}", 1..12),
            count in 0usize..12,
            element in any::<bool>(),
        ) {
            let source = words.join(" ");
            let mut run = TextRun::new(vec![Node::text(source.clone()), Node::Break, Node::text("tail end")]);
            let before = run.text();
            let mut ids = Vec::new();
            for _ in 0..count {
                let Some(span) = run.last_plain_space() else { break };
                let unit = if element {
                    ReplacementUnit::Element(InlineElement::new("span", NBSP))
                } else {
                    ReplacementUnit::Text(NBSP.to_string())
                };
                ids.push(run.splice(span, 1, unit).unwrap());
            }
            for id in ids.into_iter().rev() {
                run.undo(id).unwrap();
            }
            prop_assert_eq!(run.text(), before);
            prop_assert!(run.substitutions().is_empty());
        }
    }
}
