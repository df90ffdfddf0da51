//! Age-based retention for archived frames.
//!
//! A sweep walks a root directory recursively and deletes every frame file
//! whose modification time is strictly older than `now - window`. Files
//! exactly at the cutoff survive. Per-file failures are logged and counted;
//! they never stop the sweep.

use anyhow::Result;
use std::path::Path;
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

const SECS_PER_DAY: u64 = 60 * 60 * 24;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Never delete anything.
    Disabled,
    /// Delete frames older than this age.
    MaxAge(Duration),
}

impl RetentionPolicy {
    /// Negative day counts disable retention.
    pub fn from_days(days: i64) -> Self {
        match u64::try_from(days) {
            Ok(days) => Self::MaxAge(Duration::from_secs(days.saturating_mul(SECS_PER_DAY))),
            Err(_) => Self::Disabled,
        }
    }

    /// Fixed 24 hour window.
    pub fn daily() -> Self {
        Self::MaxAge(Duration::from_secs(SECS_PER_DAY))
    }

    /// Instant before which frames are purged, or `None` when disabled.
    pub fn cutoff(&self, now: SystemTime) -> Option<SystemTime> {
        match self {
            Self::Disabled => None,
            Self::MaxAge(window) => {
                Some(now.checked_sub(*window).unwrap_or(SystemTime::UNIX_EPOCH))
            }
        }
    }
}

/// Outcome of one sweep over a root.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub purged: usize,
    pub errors: usize,
}

impl SweepReport {
    pub fn merge(&mut self, other: SweepReport) {
        self.examined += other.examined;
        self.purged += other.purged;
        self.errors += other.errors;
    }
}

/// Delete frames under `root` that are strictly older than the policy allows.
///
/// A missing root yields an empty report.
pub fn sweep(root: &Path, policy: RetentionPolicy, now: SystemTime) -> Result<SweepReport> {
    let mut report = SweepReport::default();
    let Some(cutoff) = policy.cutoff(now) else {
        return Ok(report);
    };
    if !root.exists() {
        return Ok(report);
    }

    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("retention walk error under {}: {}", root.display(), e);
                report.errors += 1;
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || !crate::is_frame_file(path) {
            continue;
        }
        report.examined += 1;

        let modified = match modified_time(&entry) {
            Ok(modified) => modified,
            Err(e) => {
                log::warn!("retention error for {}: {}", path.display(), e);
                report.errors += 1;
                continue;
            }
        };
        if modified >= cutoff {
            continue;
        }

        match std::fs::remove_file(path) {
            Ok(()) => {
                log::info!("🗑️  purged old: {}", path.display());
                report.purged += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                log::warn!("retention error for {}: {}", path.display(), e);
                report.errors += 1;
            }
        }
    }

    Ok(report)
}

fn modified_time(entry: &walkdir::DirEntry) -> Result<SystemTime> {
    Ok(entry.metadata()?.modified()?)
}
