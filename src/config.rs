use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::geodesy::METERS_PER_MILE;

/// One configured catchment distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusTier {
    pub miles: f64,
}

impl RadiusTier {
    pub fn new(miles: f64) -> Self {
        Self { miles }
    }

    /// Threshold in the same unit the distance function returns.
    pub fn meters(&self) -> f64 {
        self.miles * METERS_PER_MILE
    }

    /// Label used in wide output column names, e.g. "3" or "2.5".
    pub fn label(&self) -> String {
        if self.miles.fract() == 0.0 {
            format!("{}", self.miles as i64)
        } else {
            format!("{}", self.miles)
        }
    }
}

/// Which derived output tables the run emits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputToggles {
    pub population_wide: bool,
    pub population_long: bool,
    pub tract_counts: bool,
    pub radius_detail: bool,
    pub assignment: bool,
    pub assignment_urban: bool,
    pub census_table: bool,
}

impl Default for OutputToggles {
    fn default() -> Self {
        Self {
            population_wide: true,
            population_long: true,
            tract_counts: true,
            radius_detail: true,
            assignment: true,
            assignment_urban: true,
            census_table: false,
        }
    }
}

/// Immutable run configuration, deserialized from a JSON file and passed by
/// reference into the pipeline entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory of polygon shard archives (`*.zip`, one shapefile each).
    pub shards_dir: PathBuf,
    /// Facility CSV with columns: facility_id, lat, lon.
    pub facilities_csv: PathBuf,
    /// Headerless fixed-column demographic feed.
    pub census_csv: PathBuf,
    /// Output directory (created if missing).
    pub out_dir: PathBuf,
    /// Catchment radii in miles, in the order wide columns should appear.
    #[serde(default = "default_tiers_miles")]
    pub radius_tiers_miles: Vec<f64>,
    #[serde(default)]
    pub outputs: OutputToggles,
}

fn default_tiers_miles() -> Vec<f64> {
    vec![3.0, 5.0, 10.0]
}

impl PipelineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.radius_tiers_miles.is_empty(),
            "at least one radius tier is required"
        );
        for &miles in &self.radius_tiers_miles {
            ensure!(
                miles.is_finite() && miles > 0.0,
                "radius tiers must be positive and finite, got {miles}"
            );
        }
        Ok(())
    }

    pub fn tiers(&self) -> Vec<RadiusTier> {
        self.radius_tiers_miles.iter().map(|&m| RadiusTier::new(m)).collect()
    }
}
