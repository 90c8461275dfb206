//! Per-call-site energy statistics
//!
//! One accumulator per call-site key, updated once per closed measurement
//! window. Averages are derived on read rather than stored.

use crate::backend::Measurement;

/// Running totals for a single call-site
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionStats {
    /// Number of recorded measurement windows
    pub calls: u64,
    /// Sum of window energies (millijoules)
    pub total_energy_mj: f64,
    /// Sum of window wall times (milliseconds)
    pub total_time_ms: f64,
    /// Smallest window energy; unset until the first update
    min_energy_mj: Option<f64>,
    /// Largest window energy
    pub max_energy_mj: f64,
}

impl FunctionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one measurement into the totals
    pub fn update(&mut self, energy_mj: f64, time_ms: f64) {
        self.calls += 1;
        self.total_energy_mj += energy_mj;
        self.total_time_ms += time_ms;
        self.min_energy_mj = Some(match self.min_energy_mj {
            Some(min) => min.min(energy_mj),
            None => energy_mj,
        });
        self.max_energy_mj = self.max_energy_mj.max(energy_mj);
    }

    pub fn record(&mut self, measurement: Measurement) {
        self.update(measurement.energy_mj, measurement.time_ms);
    }

    /// Smallest recorded energy, 0.0 before the first update
    pub fn min_energy_mj(&self) -> f64 {
        self.min_energy_mj.unwrap_or(0.0)
    }

    pub fn avg_energy_mj(&self) -> f64 {
        if self.calls > 0 {
            self.total_energy_mj / self.calls as f64
        } else {
            0.0
        }
    }

    pub fn avg_time_ms(&self) -> f64 {
        if self.calls > 0 {
            self.total_time_ms / self.calls as f64
        } else {
            0.0
        }
    }
}
