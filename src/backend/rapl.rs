//! Hardware-counter backend over the Linux powercap RAPL interface
//!
//! `energy_uj` is a monotonically increasing package energy counter in
//! microjoules. Energy for a window is the exact counter delta; when the
//! counter wraps, `max_energy_range_uj` gives the modulus.

use super::{elapsed_ms, EnergyBackend, Measurement, WindowStack};
use crate::error::{ProfileError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Default powercap sysfs root
pub const DEFAULT_POWERCAP_ROOT: &str = "/sys/class/powercap";

/// Package-0 RAPL zone
const PACKAGE_ZONE: &str = "intel-rapl:0";

const NAME: &str = "rapl";

#[derive(Debug)]
pub struct RaplBackend {
    zone: PathBuf,
    max_range_uj: Option<u64>,
    unavailable: Option<String>,
    windows: WindowStack<u64>,
}

impl RaplBackend {
    /// Probe the package zone under the default powercap root
    pub fn new() -> Self {
        Self::with_root(DEFAULT_POWERCAP_ROOT)
    }

    /// Probe the package zone under `root`
    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        let zone = root.as_ref().join(PACKAGE_ZONE);
        let unavailable = match read_uj(&zone.join("energy_uj")) {
            Ok(_) => None,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => Some(format!(
                "permission denied reading {} (needs root or read access)",
                zone.join("energy_uj").display()
            )),
            Err(e) => Some(format!("{}: {}", zone.display(), e)),
        };
        let max_range_uj = read_uj(&zone.join("max_energy_range_uj")).ok();

        if let Some(reason) = &unavailable {
            tracing::debug!("RAPL probe failed: {}", reason);
        }

        Self {
            zone,
            max_range_uj,
            unavailable,
            windows: WindowStack::new(NAME),
        }
    }

    fn read_counter(&self) -> Result<u64> {
        read_uj(&self.zone.join("energy_uj"))
            .map_err(|e| ProfileError::measurement(NAME, format!("reading energy_uj: {}", e)))
    }

    fn ensure_available(&self) -> Result<()> {
        match &self.unavailable {
            Some(reason) => Err(ProfileError::unavailable(NAME, reason.clone())),
            None => Ok(()),
        }
    }

    /// Counter delta in microjoules, accounting for one wraparound
    fn delta_uj(&self, start: u64, end: u64) -> Result<u64> {
        if end >= start {
            return Ok(end - start);
        }
        match self.max_range_uj {
            Some(range) if range >= start => Ok(range - start + end),
            _ => Err(ProfileError::measurement(
                NAME,
                format!(
                    "counter went backwards ({} -> {}) with no usable max_energy_range_uj",
                    start, end
                ),
            )),
        }
    }
}

impl Default for RaplBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl EnergyBackend for RaplBackend {
    fn start(&mut self) -> Result<()> {
        self.ensure_available()?;
        let sample = self.read_counter()?;
        self.windows.push(sample);
        Ok(())
    }

    fn stop(&mut self) -> Result<Measurement> {
        self.ensure_available()?;
        let window = self.windows.pop()?;
        let end = self.read_counter()?;
        let time_ms = elapsed_ms(window.started);
        let delta = self.delta_uj(window.sample, end)?;
        Ok(Measurement::new(delta as f64 / 1000.0, time_ms))
    }

    fn is_available(&self) -> bool {
        self.unavailable.is_none()
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

fn read_uj(path: &Path) -> std::io::Result<u64> {
    let raw = fs::read_to_string(path)?;
    raw.trim()
        .parse::<u64>()
        .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))
}
