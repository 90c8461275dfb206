//! Energy measurement backends
//!
//! A backend brackets a measurement window with `start()`/`stop()` and
//! reports the energy and wall time consumed inside it. Windows nest: the
//! tracer opens one window per active call-site, so every backend keeps a
//! LIFO stack of start samples and `stop()` always closes the innermost one.
//!
//! Backends, in auto-selection preference order:
//! - `rapl`: cumulative hardware energy counter (exact delta)
//! - `hwmon`: instantaneous power sensor file (two-point average)
//! - `cpu_est`: CPU utilization × TDP estimate (always available)
//! - `mock`: fixed energy per window, for tests

mod estimate;
mod hwmon;
mod mock;
mod rapl;
mod registry;

pub use estimate::{CpuLoad, EstimateBackend, SystemCpuLoad, DEFAULT_TDP_WATTS};
pub use hwmon::HwmonBackend;
pub use mock::{MockBackend, DEFAULT_ENERGY_PER_CALL_MJ};
pub use rapl::RaplBackend;
pub use registry::{select, select_auto, BackendKind, BackendSettings};

use crate::error::{ProfileError, Result};
use std::time::Instant;

/// Energy and wall time consumed during one measurement window
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Measurement {
    /// Energy in millijoules
    pub energy_mj: f64,
    /// Elapsed wall time in milliseconds
    pub time_ms: f64,
}

impl Measurement {
    pub fn new(energy_mj: f64, time_ms: f64) -> Self {
        Self { energy_mj, time_ms }
    }
}

/// Contract every measurement strategy implements
pub trait EnergyBackend: Send {
    /// Open a measurement window
    fn start(&mut self) -> Result<()>;

    /// Close the most recently opened window
    ///
    /// The window is consumed even when the closing read fails.
    fn stop(&mut self) -> Result<Measurement>;

    /// Capability probe with no effect on measurement state
    fn is_available(&self) -> bool;

    /// Stable identifier used in results metadata and CLI selection
    fn name(&self) -> &'static str;
}

impl EnergyBackend for Box<dyn EnergyBackend> {
    fn start(&mut self) -> Result<()> {
        (**self).start()
    }

    fn stop(&mut self) -> Result<Measurement> {
        (**self).stop()
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Open window stamped with its start instant and a backend-specific sample
#[derive(Debug, Clone, Copy)]
pub(crate) struct Window<S> {
    pub started: Instant,
    pub sample: S,
}

/// LIFO stack of open windows shared by all backends
#[derive(Debug)]
pub(crate) struct WindowStack<S> {
    backend: &'static str,
    open: Vec<Window<S>>,
}

impl<S> WindowStack<S> {
    pub fn new(backend: &'static str) -> Self {
        Self {
            backend,
            open: Vec::new(),
        }
    }

    pub fn push(&mut self, sample: S) {
        self.open.push(Window {
            started: Instant::now(),
            sample,
        });
    }

    pub fn pop(&mut self) -> Result<Window<S>> {
        self.open.pop().ok_or(ProfileError::NoOpenWindow {
            backend: self.backend,
        })
    }

    pub fn depth(&self) -> usize {
        self.open.len()
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_stack_lifo() {
        let mut stack = WindowStack::new("test");
        stack.push(1u64);
        stack.push(2u64);
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.pop().unwrap().sample, 2);
        assert_eq!(stack.pop().unwrap().sample, 1);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_window_stack_underflow_is_reported() {
        let mut stack: WindowStack<u64> = WindowStack::new("test");
        match stack.pop() {
            Err(ProfileError::NoOpenWindow { backend }) => assert_eq!(backend, "test"),
            other => panic!("Expected NoOpenWindow, got {:?}", other.map(|w| w.sample)),
        }
    }

    #[test]
    fn test_boxed_backend_delegates() {
        let mut backend: Box<dyn EnergyBackend> = Box::new(MockBackend::new(3.0));
        assert_eq!(EnergyBackend::name(&backend), "mock");
        assert!(EnergyBackend::is_available(&backend));
        EnergyBackend::start(&mut backend).unwrap();
        let m = EnergyBackend::stop(&mut backend).unwrap();
        assert_eq!(m.energy_mj, 3.0);
    }
}
