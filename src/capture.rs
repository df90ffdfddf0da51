//! Per-camera capture loop.
//!
//! Cameras are processed one at a time in catalog order. A camera that
//! fails is logged and skipped; nothing a single camera does can abort the
//! run. Counters live in the returned [`CaptureReport`].

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use crate::catalog::{Camera, CameraEntry};
use crate::ingest::{CaptureRequest, FrameGrabber};
use crate::storage::{copy_preserving, remove_if_exists};
use crate::FRAME_EXTENSION;

/// `strftime` layout of frame file stems.
pub const STAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Timestamp shared by every frame captured in one run.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FrameStamp(String);

impl FrameStamp {
    pub fn now() -> Self {
        Self::at(&chrono::Local::now().naive_local())
    }

    pub fn at(time: &NaiveDateTime) -> Self {
        Self(time.format(STAMP_FORMAT).to_string())
    }

    /// Parse the stamp back out of a frame file name.
    pub fn parse_file_name(name: &str) -> Option<NaiveDateTime> {
        let stem = name.strip_suffix(FRAME_EXTENSION)?.strip_suffix('.')?;
        NaiveDateTime::parse_from_str(stem, STAMP_FORMAT).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.0, FRAME_EXTENSION)
    }
}

impl std::fmt::Display for FrameStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug)]
pub struct CaptureSettings {
    pub staging_dir: PathBuf,
    /// Per-frame publish target; `None` keeps frames in staging only.
    pub publish_dir: Option<PathBuf>,
    pub quality: String,
    /// Stop after this many successful captures.
    pub max_captures: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CaptureReport {
    /// Entries that reached the grabber.
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Entries dropped for missing or unusable fields.
    pub skipped: usize,
    /// Ids captured (and published, when enabled) this run; sorted, unique.
    pub touched: Vec<String>,
}

/// Capture one frame for every valid entry, in order.
pub fn capture_all<'c>(
    entries: impl IntoIterator<Item = &'c CameraEntry>,
    grabber: &mut dyn FrameGrabber,
    settings: &CaptureSettings,
    stamp: &FrameStamp,
) -> CaptureReport {
    let mut report = CaptureReport::default();
    let mut touched = BTreeSet::new();

    for entry in entries {
        if let Some(max) = settings.max_captures {
            if report.succeeded >= max {
                log::info!("capture cap of {} reached, skipping remaining cameras", max);
                break;
            }
        }
        let Some(camera) = entry.camera() else {
            report.skipped += 1;
            continue;
        };

        report.attempted += 1;
        match capture_camera(&camera, grabber, settings, stamp) {
            Ok(()) => {
                report.succeeded += 1;
                touched.insert(camera.id);
            }
            Err(e) => {
                report.failed += 1;
                log::error!(
                    "failed to capture {} ({}): {:#}",
                    camera.id,
                    camera.stream_url,
                    e
                );
            }
        }
    }

    report.touched = touched.into_iter().collect();
    report
}

fn capture_camera(
    camera: &Camera,
    grabber: &mut dyn FrameGrabber,
    settings: &CaptureSettings,
    stamp: &FrameStamp,
) -> Result<()> {
    let stage_dir = settings.staging_dir.join(&camera.id);
    fs::create_dir_all(&stage_dir)
        .with_context(|| format!("create {}", stage_dir.display()))?;
    let file_name = stamp.file_name();
    let stage_path = stage_dir.join(&file_name);

    log::info!("🎥 capturing {}…", camera.id);
    let request = CaptureRequest {
        stream_url: &camera.stream_url,
        quality: &settings.quality,
        output: &stage_path,
    };
    if let Err(e) = grabber.grab(&request) {
        if let Err(cleanup) = remove_if_exists(&stage_path) {
            log::warn!("could not discard partial frame: {:#}", cleanup);
        }
        return Err(e);
    }
    log::info!("✅ saved {}", stage_path.display());

    if let Some(publish_dir) = &settings.publish_dir {
        let publish_cam = publish_dir.join(&camera.id);
        fs::create_dir_all(&publish_cam)
            .with_context(|| format!("create {}", publish_cam.display()))?;
        let publish_path = publish_cam.join(&file_name);
        copy_preserving(&stage_path, &publish_path)?;
        log::info!("➡️  published to {}", publish_path.display());
    }
    Ok(())
}
