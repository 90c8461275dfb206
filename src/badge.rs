//! Shields-style SVG badges for README and CI artifacts

use crate::results::ProfileResults;
use std::fs;
use std::path::Path;

const GREEN: &str = "#4c1";
const YELLOW: &str = "#dfb317";
const RED: &str = "#e05d44";

/// Headroom above target still shown as a warning rather than a failure
const WARN_FACTOR: f64 = 1.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeStatus {
    Pass,
    Warn,
    Fail,
}

impl BadgeStatus {
    pub fn for_energy(total_mj: f64, target_mj: f64) -> Self {
        if total_mj <= target_mj {
            BadgeStatus::Pass
        } else if total_mj <= target_mj * WARN_FACTOR {
            BadgeStatus::Warn
        } else {
            BadgeStatus::Fail
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            BadgeStatus::Pass => GREEN,
            BadgeStatus::Warn => YELLOW,
            BadgeStatus::Fail => RED,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BadgeStatus::Pass => "PASS",
            BadgeStatus::Warn => "WARN",
            BadgeStatus::Fail => "FAIL",
        }
    }
}

/// Badge showing total energy, colored against `target_mj`
pub fn energy_badge(results: &ProfileResults, target_mj: f64) -> String {
    let total = results.summary.total_energy_mj;
    let status = BadgeStatus::for_energy(total, target_mj);
    render("Energy", &format!("{:.0}mJ", total), status.color(), 80, 120)
}

/// Binary PASS/FAIL badge; no warning band
pub fn status_badge(results: &ProfileResults, target_mj: f64) -> String {
    let status = if results.summary.total_energy_mj <= target_mj {
        BadgeStatus::Pass
    } else {
        BadgeStatus::Fail
    };
    render("Energy", status.label(), status.color(), 60, 60)
}

pub fn write_badge(
    results: &ProfileResults,
    target_mj: f64,
    path: &Path,
    status_only: bool,
) -> std::io::Result<()> {
    let svg = if status_only {
        status_badge(results, target_mj)
    } else {
        energy_badge(results, target_mj)
    };
    fs::write(path, svg)
}

fn render(label: &str, value: &str, color: &str, label_width: u32, value_width: u32) -> String {
    let width = label_width + value_width;
    let label_x = label_width / 2;
    let value_x = label_width + value_width / 2;

    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="20">
  <linearGradient id="b" x2="0" y2="100%">
    <stop offset="0" stop-color="#bbb" stop-opacity=".1"/>
    <stop offset="1" stop-opacity=".1"/>
  </linearGradient>
  <mask id="a">
    <rect width="{width}" height="20" rx="3" fill="#fff"/>
  </mask>
  <g mask="url(#a)">
    <path fill="#555" d="M0 0h{label_width}v20H0z"/>
    <path fill="{color}" d="M{label_width} 0h{value_width}v20H{label_width}z"/>
    <path fill="url(#b)" d="M0 0h{width}v20H0z"/>
  </g>
  <g fill="#fff" text-anchor="middle" font-family="DejaVu Sans,Verdana,Geneva,sans-serif" font-size="11">
    <text x="{label_x}" y="15" fill="#010101" fill-opacity=".3">{label}</text>
    <text x="{label_x}" y="14">{label}</text>
    <text x="{value_x}" y="15" fill="#010101" fill-opacity=".3">{value}</text>
    <text x="{value_x}" y="14">{value}</text>
  </g>
</svg>
"##
    )
}
