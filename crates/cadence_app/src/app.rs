use std::path::PathBuf;

use anyhow::Result;
use cadence_service::read_snapshots;
use chrono::Local;
use tracing::{debug, info, warn};

use crate::timeline::{build_timeline, render_entry};

pub const MAX_TIMELINE_DAYS: u32 = 31;
pub const MAX_REFRESH_HOURS: u32 = 24;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) snapshot_path: PathBuf,
    pub(crate) timeline_days: u32,
    pub(crate) refresh_hours: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("CADENCE_SNAPSHOT") {
            if !path.trim().is_empty() {
                config.snapshot_path = PathBuf::from(path);
            }
        }
        if let Some(days) = std::env::var("CADENCE_TIMELINE_DAYS")
            .ok()
            .and_then(|raw| parse_override("CADENCE_TIMELINE_DAYS", &raw, MAX_TIMELINE_DAYS))
        {
            config.timeline_days = days;
        }
        if let Some(hours) = std::env::var("CADENCE_REFRESH_HOURS")
            .ok()
            .and_then(|raw| parse_override("CADENCE_REFRESH_HOURS", &raw, MAX_REFRESH_HOURS))
        {
            config.refresh_hours = hours;
        }
        Ok(config)
    }

    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = path.into();
        self
    }

    pub fn snapshot_path(&self) -> &PathBuf {
        &self.snapshot_path
    }
}

/// Positive override, capped at `max`. Zero and unparsable values keep the
/// default.
fn parse_override(var: &str, raw: &str, max: u32) -> Option<u32> {
    let value = raw.trim().parse::<u32>().ok().filter(|value| *value > 0)?;
    if value > max {
        warn!(var, value, max, "override too large; capped");
        return Some(max);
    }
    Some(value)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("cadence-snapshot.json"),
            timeline_days: 3,
            refresh_hours: 2,
        }
    }
}

pub fn run(config: AppConfig) -> Result<()> {
    info!(path = %config.snapshot_path.display(), "loading task snapshot");
    let snapshots = read_snapshots(&config.snapshot_path)?;
    let now = Local::now().naive_local();
    let timeline = build_timeline(&snapshots, now, config.timeline_days, config.refresh_hours);
    debug!(tasks = snapshots.len(), entries = timeline.len(), "timeline built");
    for entry in &timeline {
        println!("{}", render_entry(entry));
    }
    Ok(())
}
