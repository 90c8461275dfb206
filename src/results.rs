//! Results document
//!
//! Immutable snapshot of one profiling run, persisted as JSON. This is the
//! only format other tools (comparison, badges, CI) consume, so field names
//! and nesting are stable:
//!
//! ```json
//! {
//!   "metadata": {"backend": "rapl", "line_level": false, "timestamp": 1700000000.0},
//!   "functions": {"src/lib.rs:parse": {"calls": 3, "total_energy_mj": 12.5, ...}},
//!   "summary": {"total_energy_mj": 12.5, "total_time_ms": 4.2, "function_count": 1}
//! }
//! ```

use crate::error::{ProfileError, Result};
use crate::stats::FunctionStats;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Run metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    /// Name of the backend that produced the measurements
    pub backend: String,
    pub line_level: bool,
    /// Seconds since the Unix epoch at finalization
    pub timestamp: f64,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            backend: "unknown".to_string(),
            line_level: false,
            timestamp: 0.0,
        }
    }
}

/// Per-call-site entry of the results document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionReport {
    pub calls: u64,
    pub total_energy_mj: f64,
    pub total_time_ms: f64,
    pub avg_energy_mj: f64,
    pub avg_time_ms: f64,
    pub min_energy_mj: f64,
    pub max_energy_mj: f64,
}

impl From<&FunctionStats> for FunctionReport {
    fn from(stats: &FunctionStats) -> Self {
        Self {
            calls: stats.calls,
            total_energy_mj: stats.total_energy_mj,
            total_time_ms: stats.total_time_ms,
            avg_energy_mj: stats.avg_energy_mj(),
            avg_time_ms: stats.avg_time_ms(),
            min_energy_mj: stats.min_energy_mj(),
            max_energy_mj: stats.max_energy_mj,
        }
    }
}

/// Totals across every recorded call-site
///
/// Nested calls are counted in both caller and callee, so the energy total
/// exceeds the program's true consumption whenever calls nest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Summary {
    pub total_energy_mj: f64,
    pub total_time_ms: f64,
    pub function_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileResults {
    #[serde(default)]
    pub metadata: Metadata,
    pub functions: BTreeMap<String, FunctionReport>,
    pub summary: Summary,
}

impl ProfileResults {
    /// Snapshot accumulated statistics, dropping call-sites with no calls
    pub fn from_stats(
        backend: &str,
        line_level: bool,
        stats: &HashMap<String, FunctionStats>,
    ) -> Self {
        let functions: BTreeMap<String, FunctionReport> = stats
            .iter()
            .filter(|(_, s)| s.calls > 0)
            .map(|(key, s)| (key.clone(), FunctionReport::from(s)))
            .collect();

        let summary = Summary {
            total_energy_mj: functions.values().map(|f| f.total_energy_mj).sum(),
            total_time_ms: functions.values().map(|f| f.total_time_ms).sum(),
            function_count: functions.len(),
        };

        Self {
            metadata: Metadata {
                backend: backend.to_string(),
                line_level,
                timestamp: unix_timestamp(),
            },
            functions,
            summary,
        }
    }

    /// Sum of `calls` over all call-sites
    pub fn total_calls(&self) -> u64 {
        self.functions.values().map(|f| f.calls).sum()
    }

    pub fn function(&self, key: &str) -> Option<&FunctionReport> {
        self.functions.get(key)
    }

    /// True when the summary total is above `budget_mj`
    pub fn exceeds_budget(&self, budget_mj: f64) -> bool {
        self.summary.total_energy_mj > budget_mj
    }

    /// Serialize as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ProfileError::ResultsFormat {
            source_name: "<results>".to_string(),
            reason: e.to_string(),
        })
    }

    /// Parse a results document; `source_name` labels errors
    pub fn from_json(json: &str, source_name: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ProfileError::ResultsFormat {
            source_name: source_name.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path, json + "\n")?;
        tracing::debug!("Results written to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| ProfileError::ResultsFormat {
            source_name: path.display().to_string(),
            reason: match e.kind() {
                io::ErrorKind::NotFound => "file not found".to_string(),
                _ => e.to_string(),
            },
        })?;
        Self::from_json(&json, &path.display().to_string())
    }
}

fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
