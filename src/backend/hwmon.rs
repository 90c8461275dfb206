//! Sensor-file backend over Linux hwmon power sensors
//!
//! Common on ARM boards (Raspberry Pi, Jetson) where no cumulative energy
//! counter exists. The sensor reports instantaneous power in microwatts;
//! energy for a window is the mean of the start and stop readings times the
//! elapsed time.

use super::{elapsed_ms, EnergyBackend, Measurement, WindowStack};
use crate::error::{ProfileError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Default hwmon sysfs root
pub const DEFAULT_HWMON_ROOT: &str = "/sys/class/hwmon";

const NAME: &str = "hwmon";

/// Sensor discovered under the default root, resolved once per process
static DEFAULT_SENSOR: OnceLock<Option<PathBuf>> = OnceLock::new();

#[derive(Debug)]
pub struct HwmonBackend {
    sensor: Option<PathBuf>,
    /// Start samples are power readings in milliwatts
    windows: WindowStack<f64>,
}

impl HwmonBackend {
    /// Use the sensor discovered under the default root (cached)
    pub fn new() -> Self {
        let sensor = DEFAULT_SENSOR
            .get_or_init(|| discover_sensor(Path::new(DEFAULT_HWMON_ROOT)))
            .clone();
        Self::from_sensor(sensor)
    }

    /// Discover a sensor under `root` without touching the process cache
    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        Self::from_sensor(discover_sensor(root.as_ref()))
    }

    fn from_sensor(sensor: Option<PathBuf>) -> Self {
        match &sensor {
            Some(path) => tracing::debug!("hwmon sensor: {}", path.display()),
            None => tracing::debug!("No hwmon power*_input sensor found"),
        }
        Self {
            sensor,
            windows: WindowStack::new(NAME),
        }
    }

    /// Path of the sensor file in use, if any
    pub fn sensor(&self) -> Option<&Path> {
        self.sensor.as_deref()
    }

    fn read_power_mw(&self) -> Result<f64> {
        let path = self
            .sensor
            .as_ref()
            .ok_or_else(|| ProfileError::unavailable(NAME, "no power sensor discovered"))?;
        let raw = fs::read_to_string(path).map_err(|e| {
            ProfileError::measurement(NAME, format!("reading {}: {}", path.display(), e))
        })?;
        let microwatts: f64 = raw.trim().parse().map_err(|e| {
            ProfileError::measurement(
                NAME,
                format!("parsing {} value {:?}: {}", path.display(), raw.trim(), e),
            )
        })?;
        Ok(microwatts / 1000.0)
    }
}

impl Default for HwmonBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl EnergyBackend for HwmonBackend {
    fn start(&mut self) -> Result<()> {
        let power_mw = self.read_power_mw()?;
        self.windows.push(power_mw);
        Ok(())
    }

    fn stop(&mut self) -> Result<Measurement> {
        if self.sensor.is_none() {
            return Err(ProfileError::unavailable(NAME, "no power sensor discovered"));
        }
        let window = self.windows.pop()?;
        let end_mw = self.read_power_mw()?;
        let time_ms = elapsed_ms(window.started);
        let avg_mw = (window.sample + end_mw) / 2.0;
        // mW * s = mJ
        Ok(Measurement::new(avg_mw * time_ms / 1000.0, time_ms))
    }

    fn is_available(&self) -> bool {
        self.sensor.is_some()
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

/// First `hwmon*/power*_input` file under `root`, in sorted order
fn discover_sensor(root: &Path) -> Option<PathBuf> {
    let chips = sorted_entries(root, |name| name.starts_with("hwmon"));
    chips.into_iter().find_map(|chip| {
        sorted_entries(&chip, |name| {
            name.starts_with("power") && name.ends_with("_input")
        })
        .into_iter()
        .next()
    })
}

fn sorted_entries(dir: &Path, keep: impl Fn(&str) -> bool) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_str().is_some_and(&keep))
        .map(|entry| entry.path())
        .collect();
    paths.sort();
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn fake_hwmon(sensors: &[(&str, &str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (chip, file, value) in sensors {
            let chip_dir = dir.path().join(chip);
            fs::create_dir_all(&chip_dir).unwrap();
            fs::write(chip_dir.join(file), value).unwrap();
        }
        dir
    }

    #[test]
    fn test_hwmon_unavailable_when_no_sensor() {
        let dir = fake_hwmon(&[("hwmon0", "temp1_input", "42000")]);
        let mut backend = HwmonBackend::with_root(dir.path());
        assert!(!backend.is_available());
        assert!(matches!(
            backend.start(),
            Err(ProfileError::BackendUnavailable { backend: "hwmon", .. })
        ));
    }

    #[test]
    fn test_hwmon_discovers_first_sorted_sensor() {
        let dir = fake_hwmon(&[
            ("hwmon1", "power1_input", "1000"),
            ("hwmon0", "temp1_input", "42000"),
            ("hwmon0", "power2_input", "2000"),
        ]);
        let backend = HwmonBackend::with_root(dir.path());
        let sensor = backend.sensor().unwrap();
        assert!(sensor.ends_with("hwmon0/power2_input"));
    }

    #[test]
    fn test_hwmon_energy_is_average_power_times_time() {
        // 5 W constant
        let dir = fake_hwmon(&[("hwmon0", "power1_input", "5000000\n")]);
        let mut backend = HwmonBackend::with_root(dir.path());

        backend.start().unwrap();
        thread::sleep(Duration::from_millis(10));
        let m = backend.stop().unwrap();

        assert!(m.time_ms >= 10.0);
        assert!((m.energy_mj - 5.0 * m.time_ms).abs() < 1e-9);
    }

    #[test]
    fn test_hwmon_averages_start_and_stop_samples() {
        let dir = fake_hwmon(&[("hwmon0", "power1_input", "2000000")]);
        let mut backend = HwmonBackend::with_root(dir.path());

        backend.start().unwrap();
        fs::write(dir.path().join("hwmon0/power1_input"), "4000000").unwrap();
        let m = backend.stop().unwrap();

        // mean of 2000 mW and 4000 mW
        assert!((m.energy_mj - 3.0 * m.time_ms).abs() < 1e-9);
    }

    #[test]
    fn test_hwmon_unreadable_value_is_measurement_error() {
        let dir = fake_hwmon(&[("hwmon0", "power1_input", "1000")]);
        let mut backend = HwmonBackend::with_root(dir.path());
        backend.start().unwrap();
        fs::write(dir.path().join("hwmon0/power1_input"), "").unwrap();

        let err = backend.stop().unwrap_err();
        assert!(err.is_recoverable());
        assert!(matches!(
            backend.stop(),
            Err(ProfileError::NoOpenWindow { .. })
        ));
    }

    #[test]
    fn test_hwmon_missing_root() {
        let backend = HwmonBackend::with_root("/nonexistent/vatio/hwmon");
        assert!(!backend.is_available());
        assert_eq!(backend.name(), "hwmon");
    }
}
