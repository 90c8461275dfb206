//! Estimation backend: CPU utilization × thermal design power
//!
//! The universal fallback. Precision is coarse: utilization is a
//! system-wide figure sampled at window boundaries, and the TDP is a
//! user-supplied constant rather than a measured draw.

use super::{elapsed_ms, EnergyBackend, Measurement, WindowStack};
use crate::error::{ProfileError, Result};
use sysinfo::System;

/// TDP used when none is configured (typical mobile CPU)
pub const DEFAULT_TDP_WATTS: f64 = 15.0;

const NAME: &str = "cpu_est";

/// Source of a global CPU utilization percentage (0-100)
pub trait CpuLoad: Send {
    /// Utilization since the previous call
    fn sample_percent(&mut self) -> f64;
}

/// Utilization from the operating system via sysinfo
pub struct SystemCpuLoad {
    system: System,
}

impl SystemCpuLoad {
    pub fn new() -> Self {
        let mut system = System::new();
        // Prime the counters so the first sample has a baseline
        system.refresh_cpu_usage();
        Self { system }
    }
}

impl Default for SystemCpuLoad {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuLoad for SystemCpuLoad {
    fn sample_percent(&mut self) -> f64 {
        self.system.refresh_cpu_usage();
        let percent = f64::from(self.system.global_cpu_usage());
        if percent.is_finite() {
            percent.clamp(0.0, 100.0)
        } else {
            0.0
        }
    }
}

pub struct EstimateBackend<L: CpuLoad = SystemCpuLoad> {
    tdp_watts: f64,
    load: L,
    /// Start samples are utilization percentages
    windows: WindowStack<f64>,
}

impl EstimateBackend<SystemCpuLoad> {
    /// Estimate with the OS utilization source
    pub fn new(tdp_watts: f64) -> Result<Self> {
        Self::with_load(tdp_watts, SystemCpuLoad::new())
    }
}

impl Default for EstimateBackend<SystemCpuLoad> {
    fn default() -> Self {
        Self {
            tdp_watts: DEFAULT_TDP_WATTS,
            load: SystemCpuLoad::new(),
            windows: WindowStack::new(NAME),
        }
    }
}

impl<L: CpuLoad> EstimateBackend<L> {
    /// Estimate with a custom utilization source
    pub fn with_load(tdp_watts: f64, load: L) -> Result<Self> {
        if !tdp_watts.is_finite() || tdp_watts <= 0.0 {
            return Err(ProfileError::unavailable(
                NAME,
                format!("TDP must be a positive number of watts, got {}", tdp_watts),
            ));
        }
        Ok(Self {
            tdp_watts,
            load,
            windows: WindowStack::new(NAME),
        })
    }

    pub fn tdp_watts(&self) -> f64 {
        self.tdp_watts
    }
}

impl<L: CpuLoad> EnergyBackend for EstimateBackend<L> {
    fn start(&mut self) -> Result<()> {
        let percent = self.load.sample_percent();
        self.windows.push(percent);
        Ok(())
    }

    fn stop(&mut self) -> Result<Measurement> {
        let window = self.windows.pop()?;
        let end_percent = self.load.sample_percent();
        let time_ms = elapsed_ms(window.started);

        let avg_percent = (window.sample + end_percent) / 2.0;
        let watts = self.tdp_watts * avg_percent / 100.0;
        // W * ms = mJ
        Ok(Measurement::new(watts * time_ms, time_ms))
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

impl<L: CpuLoad> std::fmt::Debug for EstimateBackend<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EstimateBackend")
            .field("tdp_watts", &self.tdp_watts)
            .field("open_windows", &self.windows.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays a fixed sequence of utilization readings
    struct ScriptedLoad(VecDeque<f64>);

    impl ScriptedLoad {
        fn new(readings: &[f64]) -> Self {
            Self(readings.iter().copied().collect())
        }
    }

    impl CpuLoad for ScriptedLoad {
        fn sample_percent(&mut self) -> f64 {
            self.0.pop_front().unwrap_or(0.0)
        }
    }

    #[test]
    fn test_estimate_uses_average_utilization() {
        let mut backend = EstimateBackend::with_load(20.0, ScriptedLoad::new(&[40.0, 60.0])).unwrap();
        backend.start().unwrap();
        let m = backend.stop().unwrap();
        // 50% of 20 W = 10 W
        assert!((m.energy_mj - 10.0 * m.time_ms).abs() < 1e-9);
    }

    #[test]
    fn test_estimate_idle_cpu_costs_nothing() {
        let mut backend = EstimateBackend::with_load(15.0, ScriptedLoad::new(&[0.0, 0.0])).unwrap();
        backend.start().unwrap();
        assert_eq!(backend.stop().unwrap().energy_mj, 0.0);
    }

    #[test]
    fn test_estimate_nested_windows_pair_samples() {
        // outer start 100, inner start 0, inner stop 0, outer stop 100
        let mut backend =
            EstimateBackend::with_load(10.0, ScriptedLoad::new(&[100.0, 0.0, 0.0, 100.0])).unwrap();
        backend.start().unwrap();
        backend.start().unwrap();
        let inner = backend.stop().unwrap();
        let outer = backend.stop().unwrap();

        assert_eq!(inner.energy_mj, 0.0);
        assert!((outer.energy_mj - 10.0 * outer.time_ms).abs() < 1e-9);
    }

    #[test]
    fn test_estimate_rejects_bad_tdp() {
        assert!(EstimateBackend::with_load(0.0, ScriptedLoad::new(&[])).is_err());
        assert!(EstimateBackend::with_load(-5.0, ScriptedLoad::new(&[])).is_err());
        assert!(EstimateBackend::with_load(f64::NAN, ScriptedLoad::new(&[])).is_err());
    }

    #[test]
    fn test_estimate_always_available() {
        let backend = EstimateBackend::new(DEFAULT_TDP_WATTS).unwrap();
        assert!(backend.is_available());
        assert_eq!(backend.name(), "cpu_est");
        assert_eq!(backend.tdp_watts(), 15.0);
    }

    #[test]
    fn test_system_load_in_range() {
        let mut load = SystemCpuLoad::new();
        let percent = load.sample_percent();
        assert!((0.0..=100.0).contains(&percent));
    }
}
