//! Font-load observation.
//!
//! The observer does not load anything itself. The embedding application
//! reports each font as loaded or failed, and polls [`FontObserver::check_timeouts`]
//! so fonts that never arrive are marked failed once their timeout elapses.
//! When the whole set finishes loading the caller fires a `FontsLoaded`
//! reflow, since real glyph metrics usually change line breaks.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default per-font timeout when neither the font nor the observer sets one.
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// A CSS font weight: `700` or `"bold"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FontWeight {
    Number(u16),
    Keyword(String),
}

/// One font variation to wait for. Deserializes from a bare family name or
/// an object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FontDescriptor {
    pub family: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<FontWeight>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stretch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_string: Option<String>,
    /// Milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl FontDescriptor {
    pub fn family(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            weight: None,
            style: None,
            stretch: None,
            test_string: None,
            timeout: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDescriptor {
    Family(String),
    #[serde(rename_all = "camelCase")]
    Full {
        family: String,
        #[serde(default)]
        weight: Option<FontWeight>,
        #[serde(default)]
        style: Option<String>,
        #[serde(default)]
        stretch: Option<String>,
        #[serde(default)]
        test_string: Option<String>,
        #[serde(default)]
        timeout: Option<u64>,
    },
}

impl<'de> Deserialize<'de> for FontDescriptor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawDescriptor::deserialize(deserializer)? {
            RawDescriptor::Family(family) => FontDescriptor::family(family),
            RawDescriptor::Full {
                family,
                weight,
                style,
                stretch,
                test_string,
                timeout,
            } => FontDescriptor {
                family,
                weight,
                style,
                stretch,
                test_string,
                timeout,
            },
        })
    }
}

/// Load state of one observed font.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FontStatus {
    #[serde(flatten)]
    pub font: FontDescriptor,
    pub loaded: bool,
    pub error: Option<String>,
}

/// Aggregate status of every observed font.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObserverStatus {
    pub fonts: Vec<FontStatus>,
    /// Every font loaded.
    pub loaded: bool,
    /// The first failure, if any.
    pub error: Option<String>,
}

/// Tracks a set of fonts until each one loads or fails.
#[derive(Debug, Clone)]
pub struct FontObserver {
    fonts: Vec<FontStatus>,
    started: Option<Instant>,
}

impl FontObserver {
    /// Observe `fonts`, filling in the observer-wide `test_string` and
    /// `timeout_ms` where a font doesn't set its own.
    pub fn new(
        fonts: Vec<FontDescriptor>,
        test_string: Option<&str>,
        timeout_ms: Option<u64>,
    ) -> Self {
        let fonts = fonts
            .into_iter()
            .map(|mut font| {
                if font.test_string.is_none() {
                    font.test_string = test_string.map(str::to_string);
                }
                if font.timeout.is_none() {
                    font.timeout = Some(timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS));
                }
                FontStatus {
                    font,
                    loaded: false,
                    error: None,
                }
            })
            .collect();
        Self {
            fonts,
            started: None,
        }
    }

    /// Start the timeout clock. Calling it again has no effect.
    pub fn start(&mut self, now: Instant) {
        self.started.get_or_insert(now);
    }

    pub fn fonts(&self) -> &[FontStatus] {
        &self.fonts
    }

    /// Record that font `index` loaded. Returns `true` when this completed
    /// the set.
    pub fn mark_loaded(&mut self, index: usize) -> bool {
        let was_loaded = self.is_loaded();
        let Some(status) = self.fonts.get_mut(index) else {
            return false;
        };
        if status.error.is_some() {
            return false;
        }
        status.loaded = true;
        debug!(family = %status.font.family, "font loaded");
        !was_loaded && self.is_loaded()
    }

    /// Record that font `index` failed to load.
    pub fn mark_failed(&mut self, index: usize, error: impl Into<String>) {
        if let Some(status) = self.fonts.get_mut(index) {
            if !status.loaded && status.error.is_none() {
                let error = error.into();
                warn!(family = %status.font.family, %error, "font failed to load");
                status.error = Some(error);
            }
        }
    }

    /// Fail every still-pending font whose timeout has elapsed. Returns how
    /// many were failed by this call.
    pub fn check_timeouts(&mut self, now: Instant) -> usize {
        let Some(started) = self.started else {
            return 0;
        };
        let elapsed = now.saturating_duration_since(started);
        let mut failed = 0;
        for index in 0..self.fonts.len() {
            let status = &self.fonts[index];
            let timeout = Duration::from_millis(status.font.timeout.unwrap_or(DEFAULT_TIMEOUT_MS));
            if !status.loaded && status.error.is_none() && elapsed >= timeout {
                let message = format!("{}ms timeout exceeded", timeout.as_millis());
                self.mark_failed(index, message);
                failed += 1;
            }
        }
        failed
    }

    pub fn is_loaded(&self) -> bool {
        self.fonts.iter().all(|f| f.loaded)
    }

    pub fn status(&self) -> ObserverStatus {
        ObserverStatus {
            fonts: self.fonts.clone(),
            loaded: self.is_loaded(),
            error: self.fonts.iter().find_map(|f| f.error.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fonts() -> Vec<FontDescriptor> {
        serde_json::from_str(
            r#"["Source Serif Pro", { "family": "Inter", "weight": 700, "timeout": 500 }]"#,
        )
        .unwrap()
    }

    #[test]
    fn descriptors_deserialize_from_string_or_object() {
        let fonts = fonts();
        assert_eq!(fonts[0], FontDescriptor::family("Source Serif Pro"));
        assert_eq!(fonts[1].weight, Some(FontWeight::Number(700)));
        assert_eq!(fonts[1].timeout, Some(500));
    }

    #[test]
    fn inherits_observer_defaults() {
        let observer = FontObserver::new(fonts(), Some("BESbswy"), None);
        let first = &observer.fonts()[0].font;
        assert_eq!(first.test_string.as_deref(), Some("BESbswy"));
        assert_eq!(first.timeout, Some(DEFAULT_TIMEOUT_MS));
        assert_eq!(observer.fonts()[1].font.timeout, Some(500));
    }

    #[test]
    fn reports_completion_once() {
        let mut observer = FontObserver::new(fonts(), None, None);
        assert!(!observer.mark_loaded(0));
        assert!(observer.mark_loaded(1));
        assert!(!observer.mark_loaded(1));
        assert!(observer.status().loaded);
    }

    #[test]
    fn timeouts_fail_pending_fonts() {
        let mut observer = FontObserver::new(fonts(), None, None);
        let start = Instant::now();
        assert_eq!(observer.check_timeouts(start + Duration::from_secs(10)), 0);
        observer.start(start);
        assert_eq!(observer.check_timeouts(start + Duration::from_millis(600)), 1);
        let status = observer.status();
        assert!(!status.loaded);
        assert_eq!(status.error.as_deref(), Some("500ms timeout exceeded"));
        // A failed font never counts as loaded.
        assert!(!observer.mark_loaded(1));
    }
}
