//! Run configuration.
//!
//! Values come from an optional TOML file; the command line overrides them.

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::schedule::{RandomFillPolicy, SolveOptions};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub solver: SolverConfig,
    pub cohorts: CohortConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub schedule: PathBuf,
    pub preferences: PathBuf,
    /// Pre-committed placements, optional
    pub forced: Option<PathBuf>,
}

impl Default for InputConfig {
    fn default() -> Self {
        InputConfig {
            schedule: PathBuf::from("workshop_schedule.csv"),
            preferences: PathBuf::from("student_preferences.csv"),
            forced: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Wall-clock budget per solve
    pub time_limit_secs: u64,
    /// Cost of an activity the participant did not rank
    pub unranked_penalty: u32,
    pub random_fill: RandomFillPolicy,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            time_limit_secs: 60,
            unranked_penalty: 99,
            random_fill: RandomFillPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CohortConfig {
    #[serde(deserialize_with = "deserialize_cutoffs")]
    pub cutoffs: Vec<NaiveDateTime>,
    pub diagnose_on_failure: bool,
}

impl Default for CohortConfig {
    fn default() -> Self {
        CohortConfig {
            cutoffs: Vec::new(),
            diagnose_on_failure: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub assignments: PathBuf,
    /// JSON run report, optional
    pub report: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            assignments: PathBuf::from("assignments.csv"),
            report: None,
        }
    }
}

/// Accepts `2025-06-23T08:00:00`, `2025-06-23 08:00:00` or a bare date (midnight)
pub fn parse_cutoff(text: &str) -> Result<NaiveDateTime, String> {
    let text = text.trim();
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(at) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(at);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| format!("'{}' is not a date or date-time (YYYY-MM-DD[THH:MM[:SS]])", text))
}

fn deserialize_cutoffs<'de, D>(deserializer: D) -> std::result::Result<Vec<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    raw.iter()
        .map(|text| parse_cutoff(text).map_err(serde::de::Error::custom))
        .collect()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.solver.time_limit_secs == 0 {
            bail!("solver.time_limit_secs must be at least 1");
        }
        if let Some(pair) = self.cohorts.cutoffs.windows(2).find(|w| w[0] >= w[1]) {
            bail!(
                "cohorts.cutoffs must be strictly increasing ({} is followed by {})",
                pair[0],
                pair[1]
            );
        }
        Ok(())
    }

    pub fn solve_options(&self) -> SolveOptions {
        SolveOptions {
            time_limit: Duration::from_secs(self.solver.time_limit_secs),
            unranked_penalty: self.solver.unranked_penalty,
            random_fill: self.solver.random_fill,
        }
    }
}
