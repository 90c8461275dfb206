use super::{elapsed_ms, EnergyBackend, Measurement, WindowStack};
use crate::error::Result;

/// Default energy charged per window
pub const DEFAULT_ENERGY_PER_CALL_MJ: f64 = 10.0;

/// Deterministic backend: every window costs a fixed amount of energy
///
/// Wall time is still measured for real, only the energy is synthetic.
#[derive(Debug)]
pub struct MockBackend {
    energy_per_call_mj: f64,
    windows: WindowStack<()>,
}

impl MockBackend {
    pub fn new(energy_per_call_mj: f64) -> Self {
        Self {
            energy_per_call_mj,
            windows: WindowStack::new("mock"),
        }
    }

    pub fn energy_per_call_mj(&self) -> f64 {
        self.energy_per_call_mj
    }

    /// Number of windows currently open
    pub fn open_windows(&self) -> usize {
        self.windows.depth()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(DEFAULT_ENERGY_PER_CALL_MJ)
    }
}

impl EnergyBackend for MockBackend {
    fn start(&mut self) -> Result<()> {
        self.windows.push(());
        Ok(())
    }

    fn stop(&mut self) -> Result<Measurement> {
        let window = self.windows.pop()?;
        Ok(Measurement::new(
            self.energy_per_call_mj,
            elapsed_ms(window.started),
        ))
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProfileError;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_mock_fixed_energy() {
        let mut backend = MockBackend::new(25.0);
        backend.start().unwrap();
        let m = backend.stop().unwrap();
        assert_eq!(m.energy_mj, 25.0);
        assert!(m.time_ms >= 0.0);
    }

    #[test]
    fn test_mock_default_energy() {
        let backend = MockBackend::default();
        assert_eq!(backend.energy_per_call_mj(), DEFAULT_ENERGY_PER_CALL_MJ);
        assert_eq!(backend.name(), "mock");
        assert!(backend.is_available());
    }

    #[test]
    fn test_mock_nested_windows_measure_independently() {
        let mut backend = MockBackend::default();
        backend.start().unwrap();
        thread::sleep(Duration::from_millis(5));
        backend.start().unwrap();
        let inner = backend.stop().unwrap();
        let outer = backend.stop().unwrap();

        assert!(outer.time_ms >= inner.time_ms);
        assert!(outer.time_ms >= 5.0);
        assert_eq!(backend.open_windows(), 0);
    }

    #[test]
    fn test_mock_stop_without_start() {
        let mut backend = MockBackend::default();
        assert!(matches!(
            backend.stop(),
            Err(ProfileError::NoOpenWindow { backend: "mock" })
        ));
    }
}
