//! # Typesetter
//!
//! Owns one run of text and the host it renders into, and decides when the
//! fitting passes run. Triggers only ever schedule a reflow; the work happens
//! when the caller polls with [`Typesetter::poll`] and the scheduler says the
//! reflow is due. While one reflow is pending, further triggers coalesce into
//! it.
//!
//! A reflow undoes the previous widow substitutions, runs the tighten pass
//! against the unmodified text, then runs the widow pass on top of whatever
//! tightening left applied.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info_span, trace};

use crate::config::{FitConfig, ReflowTrigger};
use crate::error::FitError;
use crate::layout::tighten::{TightenEngine, TightenReport};
use crate::layout::widows::{WidowGuard, WidowReport};
use crate::layout::LayoutHost;
use crate::schedule::{FrameScheduler, ReflowToken, Scheduler};
use crate::text::TextRun;

/// What asked for a reflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "key", rename_all = "camelCase")]
pub enum ReflowCause {
    Mount,
    ContentChanged,
    ConfigChanged,
    GeometryChanged,
    FontsLoaded,
    KeyChanged(String),
}

impl fmt::Display for ReflowCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReflowCause::Mount => f.write_str("mount"),
            ReflowCause::ContentChanged => f.write_str("content changed"),
            ReflowCause::ConfigChanged => f.write_str("config changed"),
            ReflowCause::GeometryChanged => f.write_str("geometry changed"),
            ReflowCause::FontsLoaded => f.write_str("fonts loaded"),
            ReflowCause::KeyChanged(key) => write!(f, "key changed to {key:?}"),
        }
    }
}

/// What one reflow did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflowReport {
    pub cause: ReflowCause,
    /// `None` when tightening is turned off.
    pub tighten: Option<TightenReport>,
    /// `None` when widow prevention is turned off.
    pub widows: Option<WidowReport>,
    #[serde(rename = "elapsedMs", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: serde::Serializer>(elapsed: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(elapsed.as_secs_f64() * 1000.0)
}

#[derive(Debug, Clone)]
struct Pending {
    token: ReflowToken,
    cause: ReflowCause,
}

/// Controller for one typeset run.
pub struct Typesetter<H: LayoutHost, S: Scheduler = FrameScheduler> {
    host: H,
    run: TextRun,
    config: FitConfig,
    tighten: TightenEngine,
    widows: WidowGuard,
    scheduler: S,
    pending: Option<Pending>,
    key: Option<String>,
    torn_down: bool,
}

impl<H: LayoutHost> Typesetter<H, FrameScheduler> {
    pub fn new(host: H, run: TextRun, config: FitConfig) -> Self {
        Self::with_scheduler(host, run, config, FrameScheduler::default())
    }
}

impl<H: LayoutHost, S: Scheduler> Typesetter<H, S> {
    pub fn with_scheduler(host: H, run: TextRun, config: FitConfig, scheduler: S) -> Self {
        Self {
            host,
            run,
            tighten: TightenEngine::new(config.tighten.clone()),
            widows: WidowGuard::new(config.widows.clone()),
            config,
            scheduler,
            pending: None,
            key: None,
            torn_down: false,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable access to the host, e.g. to resize it. Follow up with
    /// [`Typesetter::geometry_changed`].
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn run(&self) -> &TextRun {
        &self.run
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    pub fn tighten(&self) -> &TightenEngine {
        &self.tighten
    }

    pub fn widows(&self) -> &WidowGuard {
        &self.widows
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Schedule a reflow for `cause`. Returns whether one was scheduled;
    /// `false` means the trigger was ignored or merged into a pending one.
    pub fn trigger(&mut self, cause: ReflowCause, now: Instant) -> bool {
        if self.torn_down {
            return false;
        }
        if self.config.disabled {
            trace!(%cause, "disabled, ignoring trigger");
            return false;
        }
        if cause == ReflowCause::GeometryChanged && self.config.reflow.trigger == ReflowTrigger::Manual {
            trace!("manual reflow, ignoring geometry change");
            return false;
        }
        if let Some(pending) = &self.pending {
            trace!(%cause, pending = %pending.cause, "coalesced into pending reflow");
            return false;
        }

        let delay = self.config.reflow.timeout_ms.map(Duration::from_millis);
        let token = self.scheduler.schedule_once(delay, now);
        debug!(%cause, ?delay, "reflow scheduled");
        self.pending = Some(Pending { token, cause });
        true
    }

    pub fn mount(&mut self, now: Instant) -> bool {
        self.trigger(ReflowCause::Mount, now)
    }

    pub fn geometry_changed(&mut self, now: Instant) -> bool {
        self.trigger(ReflowCause::GeometryChanged, now)
    }

    pub fn fonts_loaded(&mut self, now: Instant) -> bool {
        self.trigger(ReflowCause::FontsLoaded, now)
    }

    /// Change the reflow key. Only a key that differs from the current one
    /// triggers.
    pub fn set_key(&mut self, key: impl Into<String>, now: Instant) -> bool {
        let key = key.into();
        if self.key.as_deref() == Some(key.as_str()) {
            return false;
        }
        self.key = Some(key.clone());
        self.trigger(ReflowCause::KeyChanged(key), now)
    }

    /// Replace the content. Substitutions on the old content are dropped.
    pub fn set_content(&mut self, run: TextRun, now: Instant) -> bool {
        self.widows.forget();
        self.run = run;
        self.trigger(ReflowCause::ContentChanged, now)
    }

    /// Replace the configuration. Disabling keeps the last applied state.
    pub fn set_config(&mut self, config: FitConfig, now: Instant) -> bool {
        self.tighten.set_options(config.tighten.clone());
        self.widows.set_options(config.widows.clone());
        self.config = config;
        self.trigger(ReflowCause::ConfigChanged, now)
    }

    /// Run the pending reflow if the scheduler says it's due.
    pub fn poll(&mut self, now: Instant) -> Option<Result<ReflowReport, FitError>> {
        loop {
            let token = self.scheduler.take_due(now)?;
            match self.pending.take() {
                Some(pending) if pending.token == token => {
                    return Some(self.reflow_now(pending.cause));
                }
                other => {
                    // Stale token from a reflow that was cancelled or forced.
                    self.pending = other;
                }
            }
        }
    }

    /// Run a reflow right away, dropping any pending one.
    pub fn reflow_now(&mut self, cause: ReflowCause) -> Result<ReflowReport, FitError> {
        if let Some(pending) = self.pending.take() {
            self.scheduler.cancel(pending.token);
        }
        let span = info_span!("reflow", %cause);
        let _enter = span.enter();
        let started = Instant::now();

        let previous = self.widows.undo(&mut self.run);
        let previous_params = self.tighten.applied();

        let tighten = if self.config.tighten.enabled {
            Some(self.tighten.reflow(&mut self.host, &self.run))
        } else {
            self.tighten.reset(&mut self.host);
            None
        };

        let widows = if self.config.widows.enabled {
            match self.widows.reflow_undone(&mut self.host, &mut self.run, previous) {
                Ok(report) => Some(report),
                Err(e) => {
                    // The widow guard already restored its substitutions.
                    self.tighten.restore(&mut self.host, previous_params);
                    return Err(e);
                }
            }
        } else {
            None
        };

        let elapsed = started.elapsed();
        debug!(elapsed_ms = elapsed.as_secs_f64() * 1000.0, "reflow completed");
        Ok(ReflowReport {
            cause,
            tighten,
            widows,
            elapsed,
        })
    }

    /// Cancel any pending reflow and stop reacting to triggers.
    pub fn teardown(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.scheduler.cancel(pending.token);
            debug!(cause = %pending.cause, "cancelled pending reflow");
        }
        self.torn_down = true;
    }

    /// Give back the host and the run in their current state.
    pub fn into_parts(self) -> (H, TextRun) {
        (self.host, self.run)
    }
}
