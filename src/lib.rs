//! Traffic Timelapse
//!
//! Batch capture of still frames from public traffic camera streams into a
//! rolling, per-camera timelapse archive that a static website can serve.
//!
//! # Pipeline
//!
//! Each invocation runs once, strictly in order:
//!
//! 1. **Config**: defaults, settings file, environment, then CLI flags.
//! 2. **Catalog**: region-grouped camera list flattened to descriptors.
//! 3. **Retention**: frames older than the window are purged.
//! 4. **Capture**: one frame per camera via an external grabber.
//! 5. **Manifests**: `frames.json` rebuilt for each indexed camera.
//!
//! Nothing is kept between runs except the files on disk.
//!
//! # Module Structure
//!
//! - `config`: layered settings, path expansion, catalog lookup
//! - `catalog`: camera catalog parsing and selection
//! - `retention`: age-based frame sweeping
//! - `ingest`: the `FrameGrabber` seam (ffmpeg, synthetic `stub://`)
//! - `capture`: per-camera capture loop with failure isolation
//! - `manifest`: frame listings and wholesale publish
//! - `pipeline`: one full run wired end to end
//! - `storage`: metadata-preserving copies and atomic writes

pub mod capture;
pub mod catalog;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod manifest;
pub mod pipeline;
pub mod retention;
pub mod storage;

pub use capture::{capture_all, CaptureReport, CaptureSettings, FrameStamp};
pub use catalog::{Camera, CameraEntry, Catalog, Region};
pub use config::{
    expand_path, locate_catalog, ManifestScopeSetting, Overrides, PublishMode, TimelapseConfig,
};
pub use ingest::{CaptureRequest, FfmpegConfig, FfmpegGrabber, FrameGrabber, StreamGrabber};
pub use manifest::{list_frames, mirror_tree, rebuild, write_manifest, ManifestScope};
pub use pipeline::{run, Pipeline, RunSummary};
pub use retention::{sweep, RetentionPolicy, SweepReport};

/// Extension of every frame file in the archive.
pub const FRAME_EXTENSION: &str = "jpg";

/// Manifest file written inside each camera directory.
pub const MANIFEST_FILE: &str = "frames.json";

/// `true` when `path` names a frame file by extension alone.
pub fn is_frame_file(path: &std::path::Path) -> bool {
    path.extension().map_or(false, |ext| ext == FRAME_EXTENSION)
}
