//! # Documents
//!
//! The JSON input the CLI and [`crate::fit_json`] accept: some content, the
//! container it sits in, and a configuration (optionally on top of a named
//! preset).
//!
//! ```json
//! {
//!   "content": "Islay single malt Scotch whisky",
//!   "container": { "width": 245, "fontSize": 16 },
//!   "preset": "headline",
//!   "presets": { "headline": { "tighten": { "minScale": 0.95 } } },
//!   "config": { "widows": { "minLineWidth": "20%" } }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{FitConfig, PresetRegistry};
use crate::error::FitError;
use crate::layout::simulated::ContainerStyle;
use crate::style::AppliedParams;
use crate::text::{Node, Segment, Substitution, TextRun};
use crate::typesetter::ReflowReport;

/// Text content: a plain string or a list of nodes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Nodes(Vec<Node>),
}

impl Content {
    pub fn into_run(self) -> TextRun {
        match self {
            Content::Text(text) => TextRun::from_text(text),
            Content::Nodes(nodes) => TextRun::new(nodes),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub content: Content,
    pub container: ContainerStyle,
    /// Raw configuration JSON. Kept as a value so it can be merged over a
    /// preset before it's interpreted.
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub presets: Map<String, Value>,
}

impl Document {
    /// The effective configuration: the preset (if any) with `config` merged
    /// on top.
    pub fn resolve_config(&self) -> Result<FitConfig, FitError> {
        match &self.preset {
            Some(name) => {
                let mut registry = PresetRegistry::default();
                for (preset, value) in &self.presets {
                    registry.insert(preset.clone(), value.clone());
                }
                registry.resolve(name, &self.config)
            }
            None if self.config.is_null() => Ok(FitConfig::default()),
            None => Ok(FitConfig::deserialize(&self.config)?),
        }
    }
}

/// What a fit produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FitOutput {
    /// Line widths before any adjustment.
    pub before: Vec<f64>,
    /// Line widths after the reflow.
    pub after: Vec<f64>,
    /// `None` when fitting is disabled.
    pub report: Option<ReflowReport>,
    pub applied: AppliedParams,
    pub substitutions: Vec<Substitution>,
    pub segments: Vec<Segment>,
    pub text: String,
}
