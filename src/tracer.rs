//! Call-stack energy attribution
//!
//! The tracer receives entry/exit events in program order and brackets each
//! instrumented activation with a backend measurement window. Windows are
//! kept on an ordered stack, not keyed by call-site, so recursive and
//! mutually recursive activations of one key each get their own window and
//! LIFO order pairs every exit with the innermost open entry.
//!
//! Backend failures never unbalance the stack: a failed `start()` still
//! pushes a frame (with no window), a failed `stop()` still pops. The one
//! measurement is dropped with a warning and tracing continues.
//!
//! Line granularity additionally closes and reopens the innermost window at
//! every statement boundary. The stop/start pair's own cost lands inside the
//! next slice, so line mode trades accuracy for temporal resolution.

use crate::backend::{EnergyBackend, Measurement};
use crate::filter::IgnoreFilter;
use crate::results::ProfileResults;
use crate::stats::FunctionStats;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// A function at a source location
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSite {
    /// Source identifier matched against ignore patterns
    pub source: String,
    pub function: String,
}

impl CallSite {
    pub fn new(source: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            function: function.into(),
        }
    }

    /// Aggregation key: `<source>:<function>`
    pub fn key(&self) -> String {
        format!("{}:{}", self.source, self.function)
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.function)
    }
}

/// Build a [`CallSite`] for the current source file
///
/// ```
/// let site = vatio::call_site!("parse_header");
/// assert!(site.key().ends_with(":parse_header"));
/// ```
#[macro_export]
macro_rules! call_site {
    ($function:expr) => {
        $crate::tracer::CallSite::new(file!(), $function)
    };
}

/// How finely energy is attributed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Granularity {
    /// One window per call, entry to exit
    #[default]
    Function,
    /// One window per statement slice of the innermost call
    Line,
}

/// Explicit instrumentation boundary
///
/// Whatever drives the target (wrapper functions, generated code, an event
/// channel) reports entry, exit and statement events through this trait.
pub trait Instrument {
    fn on_call(&mut self, site: &CallSite);
    fn on_return(&mut self);
    fn on_line(&mut self);
}

#[derive(Debug)]
enum Frame {
    /// Instrumented activation; `window_open` is false when `start()` failed
    Measured { key: String, window_open: bool },
    /// Activation skipped by the ignore filter
    Ignored,
}

/// Attribution engine for one run
pub struct EnergyTracer<B: EnergyBackend = Box<dyn EnergyBackend>> {
    backend: B,
    filter: IgnoreFilter,
    granularity: Granularity,
    stack: Vec<Frame>,
    stats: HashMap<String, FunctionStats>,
    dropped: u64,
}

impl<B: EnergyBackend> EnergyTracer<B> {
    /// Function-level tracer with no ignore patterns
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            filter: IgnoreFilter::none(),
            granularity: Granularity::Function,
            stack: Vec::new(),
            stats: HashMap::new(),
            dropped: 0,
        }
    }

    pub fn with_filter(mut self, filter: IgnoreFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn line_level(&self) -> bool {
        self.granularity == Granularity::Line
    }

    /// Entry event: open a window for `site` unless it is ignored
    ///
    /// Returns whether the activation is instrumented.
    pub fn enter(&mut self, site: &CallSite) -> bool {
        if self.filter.should_ignore(&site.source) {
            tracing::trace!("Ignoring {}", site);
            self.stack.push(Frame::Ignored);
            return false;
        }

        let key = site.key();
        let window_open = match self.backend.start() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Energy measurement failed to start for {}: {}", key, e);
                self.dropped += 1;
                false
            }
        };
        self.stack.push(Frame::Measured { key, window_open });
        true
    }

    /// Exit event: close the innermost activation's window
    ///
    /// An exit with nothing on the stack is a stray exit and does nothing.
    pub fn exit(&mut self) -> Option<Measurement> {
        let Some(frame) = self.stack.pop() else {
            tracing::trace!("Stray exit with empty call stack");
            return None;
        };
        match frame {
            Frame::Measured {
                key,
                window_open: true,
            } => self.close_window(key),
            Frame::Measured { .. } | Frame::Ignored => None,
        }
    }

    /// Statement boundary: attribute the slice so far to the innermost
    /// traced call
    ///
    /// Ignored activations are skipped, so a statement inside an ignored
    /// callee slices its nearest traced caller. No-op at function
    /// granularity or when no traced call is open.
    pub fn line(&mut self) {
        if self.granularity != Granularity::Line {
            return;
        }
        let traced = self.stack.iter_mut().rev().find_map(|frame| match frame {
            Frame::Measured { key, window_open } => Some((key, window_open)),
            Frame::Ignored => None,
        });
        let Some((key, window_open)) = traced else {
            return;
        };

        if *window_open {
            match self.backend.stop() {
                Ok(m) => self.stats.entry(key.clone()).or_default().record(m),
                Err(e) => {
                    tracing::warn!("Line-level energy measurement failed for {}: {}", key, e);
                    self.dropped += 1;
                }
            }
        }

        *window_open = match self.backend.start() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Energy measurement failed to restart for {}: {}", key, e);
                self.dropped += 1;
                false
            }
        };
    }

    fn close_window(&mut self, key: String) -> Option<Measurement> {
        match self.backend.stop() {
            Ok(m) => {
                self.stats.entry(key).or_default().record(m);
                Some(m)
            }
            Err(e) => {
                tracing::warn!("Energy measurement failed for {}: {}", key, e);
                self.dropped += 1;
                None
            }
        }
    }

    /// Force-close every open activation, innermost first
    ///
    /// Used when the run ends early; windows that close successfully are
    /// recorded. Returns the number of frames drained.
    pub fn drain(&mut self) -> usize {
        let open = self.stack.len();
        if open > 0 {
            tracing::warn!("Force-closing {} open call-site(s)", open);
        }
        while !self.stack.is_empty() {
            self.exit();
        }
        open
    }

    /// Wrap `f` in an instrumented activation of `site`
    ///
    /// The activation is closed even if `f` panics.
    pub fn measure<F, R>(&mut self, site: &CallSite, f: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        let mut scope = self.scope(site);
        f(&mut scope)
    }

    /// Enter `site` and exit when the returned guard drops
    pub fn scope(&mut self, site: &CallSite) -> Scope<'_, B> {
        self.enter(site);
        Scope { tracer: self }
    }

    /// Snapshot the statistics into a results document
    pub fn results(&self) -> ProfileResults {
        ProfileResults::from_stats(self.backend.name(), self.line_level(), &self.stats)
    }

    /// Drain open activations and produce the final results
    pub fn finish(mut self) -> ProfileResults {
        self.drain();
        if self.dropped > 0 {
            tracing::warn!("{} measurement(s) dropped during the run", self.dropped);
        }
        self.results()
    }

    /// Active frames, ignored activations included
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn stats(&self) -> &HashMap<String, FunctionStats> {
        &self.stats
    }

    pub fn stats_for(&self, key: &str) -> Option<&FunctionStats> {
        self.stats.get(key)
    }

    /// Number of windows whose measurement failed and was discarded
    pub fn dropped_measurements(&self) -> u64 {
        self.dropped
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: EnergyBackend> Instrument for EnergyTracer<B> {
    fn on_call(&mut self, site: &CallSite) {
        self.enter(site);
    }

    fn on_return(&mut self) {
        self.exit();
    }

    fn on_line(&mut self) {
        self.line();
    }
}

/// RAII activation returned by [`EnergyTracer::scope`]
///
/// Derefs to the tracer so nested scopes can be opened through it.
pub struct Scope<'t, B: EnergyBackend> {
    tracer: &'t mut EnergyTracer<B>,
}

impl<B: EnergyBackend> Deref for Scope<'_, B> {
    type Target = EnergyTracer<B>;

    fn deref(&self) -> &Self::Target {
        self.tracer
    }
}

impl<B: EnergyBackend> DerefMut for Scope<'_, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.tracer
    }
}

impl<B: EnergyBackend> Drop for Scope<'_, B> {
    fn drop(&mut self) {
        self.tracer.exit();
    }
}
