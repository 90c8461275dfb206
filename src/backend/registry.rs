//! Backend registry and auto-selection
//!
//! Explicit names construct exactly that backend, available or not; the
//! caller decides what an unavailable choice means. `auto` walks the
//! preference chain rapl → hwmon → cpu_est and never fails.

use super::estimate::DEFAULT_TDP_WATTS;
use super::rapl::DEFAULT_POWERCAP_ROOT;
use super::{EnergyBackend, EstimateBackend, HwmonBackend, MockBackend, RaplBackend};
use crate::error::{ProfileError, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Selector accepted by `select`
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendKind {
    /// Best available backend
    Auto,
    /// RAPL hardware energy counter
    Rapl,
    /// hwmon power sensor file
    Hwmon,
    /// CPU utilization × TDP estimate
    #[value(name = "cpu_est")]
    CpuEst,
    /// Fixed energy per call (testing)
    Mock,
}

impl BackendKind {
    /// Auto-selection preference order
    pub const PREFERENCE: [BackendKind; 3] =
        [BackendKind::Rapl, BackendKind::Hwmon, BackendKind::CpuEst];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Auto => "auto",
            BackendKind::Rapl => "rapl",
            BackendKind::Hwmon => "hwmon",
            BackendKind::CpuEst => "cpu_est",
            BackendKind::Mock => "mock",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendKind::Auto),
            "rapl" => Ok(BackendKind::Rapl),
            "hwmon" => Ok(BackendKind::Hwmon),
            "cpu_est" => Ok(BackendKind::CpuEst),
            "mock" => Ok(BackendKind::Mock),
            _ => Err(ProfileError::UnknownBackend(s.to_string())),
        }
    }
}

/// Inputs backends need at construction time
#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// Thermal design power for the estimation backend
    pub tdp_watts: f64,
    /// Energy charged per window by the mock backend
    pub mock_energy_mj: f64,
    /// powercap sysfs root (RAPL)
    pub powercap_root: PathBuf,
    /// hwmon sysfs root; `None` uses the process-wide cached discovery
    pub hwmon_root: Option<PathBuf>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            tdp_watts: DEFAULT_TDP_WATTS,
            mock_energy_mj: super::mock::DEFAULT_ENERGY_PER_CALL_MJ,
            powercap_root: PathBuf::from(DEFAULT_POWERCAP_ROOT),
            hwmon_root: None,
        }
    }
}

impl BackendSettings {
    pub fn with_tdp(tdp_watts: f64) -> Self {
        Self {
            tdp_watts,
            ..Self::default()
        }
    }
}

/// Construct the backend named by `name` ("auto" runs the fallback chain)
///
/// # Errors
/// `UnknownBackend` for an unrecognized name. An explicitly named backend
/// is returned even when it reports unavailable.
///
/// # Example
/// ```
/// use vatio::backend::{select, BackendSettings, EnergyBackend};
///
/// let backend = select("mock", &BackendSettings::default()).unwrap();
/// assert_eq!(backend.name(), "mock");
/// assert!(select("nvml", &BackendSettings::default()).is_err());
/// ```
pub fn select(name: &str, settings: &BackendSettings) -> Result<Box<dyn EnergyBackend>> {
    let kind: BackendKind = name.parse()?;
    match kind {
        BackendKind::Auto => Ok(select_auto(settings)),
        explicit => construct(explicit, settings),
    }
}

/// First available backend in preference order, else the estimation backend
pub fn select_auto(settings: &BackendSettings) -> Box<dyn EnergyBackend> {
    for kind in BackendKind::PREFERENCE {
        match construct(kind, settings) {
            Ok(backend) if backend.is_available() => {
                tracing::info!("Using {} backend", backend.name());
                return backend;
            }
            Ok(backend) => {
                tracing::debug!("Skipping {} backend: not available", backend.name());
            }
            Err(e) => {
                tracing::debug!("Skipping {} backend: {}", kind, e);
            }
        }
    }

    tracing::info!("Using cpu_est backend (fallback)");
    let backend = EstimateBackend::new(settings.tdp_watts).unwrap_or_else(|e| {
        tracing::warn!("{}; falling back to {} W", e, DEFAULT_TDP_WATTS);
        EstimateBackend::default()
    });
    Box::new(backend)
}

fn construct(kind: BackendKind, settings: &BackendSettings) -> Result<Box<dyn EnergyBackend>> {
    let backend: Box<dyn EnergyBackend> = match kind {
        BackendKind::Auto => return Ok(select_auto(settings)),
        BackendKind::Rapl => Box::new(RaplBackend::with_root(&settings.powercap_root)),
        BackendKind::Hwmon => match &settings.hwmon_root {
            Some(root) => Box::new(HwmonBackend::with_root(root)),
            None => Box::new(HwmonBackend::new()),
        },
        BackendKind::CpuEst => Box::new(EstimateBackend::new(settings.tdp_watts)?),
        BackendKind::Mock => Box::new(MockBackend::new(settings.mock_energy_mj)),
    };
    Ok(backend)
}
