//! One full timelapse run.
//!
//! catalog -> directories -> retention -> capture -> publish -> manifests.
//! Each step is exposed on [`Pipeline`] so a front end can time or report
//! them individually; [`run`] chains them in order.

use anyhow::Result;
use std::path::PathBuf;
use std::time::SystemTime;

use crate::capture::{capture_all, CaptureReport, CaptureSettings, FrameStamp};
use crate::catalog::Catalog;
use crate::config::{locate_catalog, ManifestScopeSetting, PublishMode, TimelapseConfig};
use crate::ingest::FrameGrabber;
use crate::manifest::{mirror_tree, rebuild, ManifestScope};
use crate::retention::{sweep, SweepReport};

#[derive(Clone, Debug)]
pub struct RunSummary {
    pub stamp: FrameStamp,
    pub catalog_path: PathBuf,
    pub index_root: PathBuf,
    pub swept: SweepReport,
    pub capture: CaptureReport,
    /// Files copied by a mirror publish, `None` for other modes.
    pub mirrored: Option<usize>,
    /// Camera ids whose manifest was rewritten.
    pub indexed: Vec<String>,
}

pub struct Pipeline<'a> {
    cfg: &'a TimelapseConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(cfg: &'a TimelapseConfig) -> Self {
        Self { cfg }
    }

    /// Locate and parse the catalog. Both failures are fatal.
    pub fn load_catalog(&self) -> Result<(PathBuf, Catalog)> {
        let path = locate_catalog(&self.cfg.cams_file)?;
        let catalog = Catalog::load(&path)?;
        Ok((path, catalog))
    }

    pub fn prepare(&self) -> Result<()> {
        self.cfg.prepare_directories()
    }

    /// Sweep staging, and the publish tree when frames are published one by one.
    pub fn sweep(&self, now: SystemTime) -> Result<SweepReport> {
        let mut report = sweep(&self.cfg.staging_dir, self.cfg.retention, now)?;
        if self.incremental_publish() {
            report.merge(sweep(&self.cfg.publish_dir, self.cfg.retention, now)?);
        }
        Ok(report)
    }

    pub fn capture(
        &self,
        catalog: &Catalog,
        grabber: &mut dyn FrameGrabber,
        stamp: &FrameStamp,
    ) -> CaptureReport {
        let settings = CaptureSettings {
            staging_dir: self.cfg.staging_dir.clone(),
            publish_dir: self
                .incremental_publish()
                .then(|| self.cfg.publish_dir.clone()),
            quality: self.cfg.quality.clone(),
            max_captures: self.cfg.max_captures,
        };
        capture_all(catalog.select(self.cfg.limit), grabber, &settings, stamp)
    }

    /// Mirror staging over the publish tree when running in mirror mode.
    pub fn publish(&self) -> Result<Option<usize>> {
        if !self.mirror_publish() {
            return Ok(None);
        }
        let copied = mirror_tree(&self.cfg.staging_dir, &self.cfg.publish_dir)?;
        log::info!(
            "➡️  mirrored {} file(s) to {}",
            copied,
            self.cfg.publish_dir.display()
        );
        Ok(Some(copied))
    }

    /// Rewrite manifests under the index root.
    ///
    /// A mirror publish recreates every camera directory without its
    /// manifest, so that mode always indexes them all.
    pub fn index(&self, capture: &CaptureReport) -> Result<Vec<String>> {
        let scope = match self.cfg.manifest_scope {
            ManifestScopeSetting::Touched if !self.mirror_publish() => {
                ManifestScope::Touched(capture.touched.clone())
            }
            _ => ManifestScope::All,
        };
        rebuild(self.cfg.index_root(), &scope)
    }

    fn incremental_publish(&self) -> bool {
        self.cfg.publish && self.cfg.publish_mode == PublishMode::Incremental
    }

    fn mirror_publish(&self) -> bool {
        self.cfg.publish && self.cfg.publish_mode == PublishMode::Mirror
    }
}

/// Run every step once with a single timestamp for all frames.
pub fn run(
    cfg: &TimelapseConfig,
    grabber: &mut dyn FrameGrabber,
    stamp: FrameStamp,
    now: SystemTime,
) -> Result<RunSummary> {
    let pipeline = Pipeline::new(cfg);
    let (catalog_path, catalog) = pipeline.load_catalog()?;
    pipeline.prepare()?;
    let swept = pipeline.sweep(now)?;
    let capture = pipeline.capture(&catalog, grabber, &stamp);
    let mirrored = pipeline.publish()?;
    let indexed = pipeline.index(&capture)?;
    Ok(RunSummary {
        stamp,
        catalog_path,
        index_root: cfg.index_root().to_path_buf(),
        swept,
        capture,
        mirrored,
        indexed,
    })
}
