//! Layered configuration
//!
//! Sources, later overriding earlier:
//! 1. `~/.vatio.toml`
//! 2. `[package.metadata.vatio]` in `./Cargo.toml`
//! 3. `./.vatio.toml`
//! 4. `VATIO_BACKEND`, `VATIO_TDP_WATTS`, `VATIO_ENERGY_BUDGET_MJ`
//!
//! A file only overrides the keys it sets. Unreadable or malformed files are
//! reported and skipped; a malformed environment value is an error.

use crate::backend::{BackendKind, BackendSettings, DEFAULT_TDP_WATTS};
use crate::filter::IgnoreFilter;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = ".vatio.toml";

pub const ENV_BACKEND: &str = "VATIO_BACKEND";
pub const ENV_TDP_WATTS: &str = "VATIO_TDP_WATTS";
pub const ENV_ENERGY_BUDGET_MJ: &str = "VATIO_ENERGY_BUDGET_MJ";

/// Effective settings for a run
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Backend selector (`auto`, `rapl`, `hwmon`, `cpu_est`, `mock`)
    pub backend: String,
    /// TDP for the estimation backend (watts)
    pub tdp_watts: f64,
    /// Total energy above which `profile` fails (millijoules)
    pub energy_budget_mj: f64,
    /// Glob patterns for source locations left uninstrumented
    pub ignore: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Auto.to_string(),
            tdp_watts: DEFAULT_TDP_WATTS,
            energy_budget_mj: 1000.0,
            ignore: vec!["tests/*".to_string()],
        }
    }
}

/// Keys a single source may set
#[derive(Debug, Default, Deserialize)]
struct Overrides {
    backend: Option<String>,
    tdp_watts: Option<f64>,
    energy_budget_mj: Option<f64>,
    ignore: Option<Vec<String>>,
}

impl Settings {
    /// Load from the user's home directory, the current directory and the
    /// environment
    pub fn load() -> Result<Self> {
        let home = env::var_os("HOME").map(PathBuf::from);
        let project = env::current_dir().context("Failed to determine current directory")?;
        Self::load_from(home.as_deref(), &project)
    }

    /// Load with explicit home and project directories
    pub fn load_from(home: Option<&Path>, project_dir: &Path) -> Result<Self> {
        let mut settings = Settings::default();

        if let Some(home) = home {
            settings.apply_file(&home.join(CONFIG_FILE_NAME));
        }
        settings.apply_cargo_metadata(&project_dir.join("Cargo.toml"));
        settings.apply_file(&project_dir.join(CONFIG_FILE_NAME));
        settings.apply_env()?;

        tracing::debug!("Effective configuration: {:?}", settings);
        Ok(settings)
    }

    fn apply(&mut self, overrides: Overrides) {
        if let Some(backend) = overrides.backend {
            self.backend = backend;
        }
        if let Some(tdp) = overrides.tdp_watts {
            self.tdp_watts = tdp;
        }
        if let Some(budget) = overrides.energy_budget_mj {
            self.energy_budget_mj = budget;
        }
        if let Some(ignore) = overrides.ignore {
            self.ignore = ignore;
        }
    }

    fn apply_file(&mut self, path: &Path) {
        if !path.exists() {
            return;
        }
        match read_overrides(path) {
            Ok(overrides) => {
                tracing::debug!("Loaded configuration from {}", path.display());
                self.apply(overrides);
            }
            Err(e) => tracing::warn!("Could not load config from {}: {:#}", path.display(), e),
        }
    }

    fn apply_cargo_metadata(&mut self, manifest: &Path) {
        if !manifest.exists() {
            return;
        }
        match read_cargo_metadata(manifest) {
            Ok(Some(overrides)) => {
                tracing::debug!("Loaded [package.metadata.vatio] from {}", manifest.display());
                self.apply(overrides);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Could not load config from {}: {:#}", manifest.display(), e),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(backend) = non_empty_var(ENV_BACKEND) {
            self.backend = backend;
        }
        if let Some(tdp) = non_empty_var(ENV_TDP_WATTS) {
            self.tdp_watts = tdp
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number, got {:?}", ENV_TDP_WATTS, tdp))?;
        }
        if let Some(budget) = non_empty_var(ENV_ENERGY_BUDGET_MJ) {
            self.energy_budget_mj = budget.trim().parse().with_context(|| {
                format!("{} must be a number, got {:?}", ENV_ENERGY_BUDGET_MJ, budget)
            })?;
        }
        Ok(())
    }

    /// Check value ranges
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.tdp_watts.is_finite() || self.tdp_watts <= 0.0 {
            return Err(format!("tdp_watts must be positive, got {}", self.tdp_watts));
        }

        if !self.energy_budget_mj.is_finite() || self.energy_budget_mj < 0.0 {
            return Err(format!(
                "energy_budget_mj must be non-negative, got {}",
                self.energy_budget_mj
            ));
        }

        Ok(())
    }

    /// Construction inputs for the backend registry
    pub fn backend_settings(&self) -> BackendSettings {
        BackendSettings::with_tdp(self.tdp_watts)
    }

    /// Compile the ignore patterns
    pub fn ignore_filter(&self) -> Result<IgnoreFilter> {
        IgnoreFilter::from_patterns(&self.ignore)
    }
}

fn read_overrides(path: &Path) -> Result<Overrides> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn read_cargo_metadata(manifest: &Path) -> Result<Option<Overrides>> {
    let content = fs::read_to_string(manifest)
        .with_context(|| format!("Failed to read {}", manifest.display()))?;
    let doc: toml::Table = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", manifest.display()))?;

    let Some(section) = doc
        .get("package")
        .and_then(|p| p.get("metadata"))
        .and_then(|m| m.get("vatio"))
    else {
        return Ok(None);
    };

    let overrides: Overrides = section
        .clone()
        .try_into()
        .context("Invalid [package.metadata.vatio] section")?;
    Ok(Some(overrides))
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
