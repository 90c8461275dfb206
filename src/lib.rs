//! Vatio - per-function energy attribution
//!
//! This library measures the energy each instrumented call-site consumes,
//! using a pluggable measurement backend (RAPL counters, hwmon power
//! sensors, or a CPU-utilization estimate), and compares runs to catch
//! energy regressions.
//!
//! ```
//! use vatio::backend::MockBackend;
//! use vatio::tracer::EnergyTracer;
//!
//! let mut tracer = EnergyTracer::new(MockBackend::new(5.0));
//! let sum = tracer.measure(&vatio::call_site!("sum"), |_| (1..=10).sum::<u32>());
//! assert_eq!(sum, 55);
//!
//! let results = tracer.finish();
//! assert_eq!(results.summary.total_energy_mj, 5.0);
//! ```

pub mod backend;
pub mod badge;
pub mod cli;
pub mod compare;
pub mod config;
pub mod error;
pub mod filter;
pub mod report;
pub mod results;
pub mod runner;
pub mod stats;
pub mod tracer;

pub use error::{ProfileError, Result};
