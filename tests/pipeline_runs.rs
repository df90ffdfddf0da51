//! End-to-end runs of the capture pipeline against temp directories.
//!
//! Frames come from a fake grabber (or the synthetic `stub://` grabber), so
//! no ffmpeg or network is needed.

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use traffic_timelapse::config::{ManifestScopeSetting, PublishMode, TimelapseConfig};
use traffic_timelapse::ingest::{CaptureRequest, FfmpegConfig, FrameGrabber, StreamGrabber};
use traffic_timelapse::{run, FrameStamp, RetentionPolicy, MANIFEST_FILE};

const TWO_REGIONS: &str = r#"[
    {"county": "Kanawha", "cams": [
        {"id": "kan-1", "stream": "https://cams.example/kan-1.m3u8"},
        {"id": "kan-2"}
    ]},
    {"county": "Cabell", "cams": [
        {"id": "cab-1", "stream": "https://cams.example/cab-1.m3u8"},
        {"id": "cab-2", "stream": "https://cams.example/cab-2.m3u8"}
    ]}
]"#;

#[derive(Default)]
struct RecordingGrabber {
    failing: Vec<String>,
    calls: Vec<String>,
}

impl FrameGrabber for RecordingGrabber {
    fn grab(&mut self, request: &CaptureRequest<'_>) -> Result<()> {
        self.calls.push(request.stream_url.to_string());
        if self.failing.iter().any(|url| url == request.stream_url) {
            fs::write(request.output, b"partial")?;
            return Err(anyhow!("exit status: 1"));
        }
        fs::write(request.output, b"\xFF\xD8\xFF\xD9")?;
        Ok(())
    }
}

fn config(root: &Path, catalog: &str) -> Result<TimelapseConfig> {
    let cams_file = root.join("cams.json");
    fs::write(&cams_file, catalog)?;
    Ok(TimelapseConfig {
        cams_file,
        staging_dir: root.join("staging"),
        publish_dir: root.join("site/timelapse"),
        publish: true,
        publish_mode: PublishMode::Incremental,
        retention: RetentionPolicy::from_days(14),
        quality: "2".to_string(),
        limit: None,
        max_captures: None,
        manifest_scope: ManifestScopeSetting::Touched,
        ffmpeg: FfmpegConfig::default(),
    })
}

fn stamp(hour: u32) -> FrameStamp {
    let time = NaiveDate::from_ymd_opt(2025, 6, 1)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .expect("valid time");
    FrameStamp::at(&time)
}

fn manifest(dir: &Path) -> Result<Vec<String>> {
    Ok(serde_json::from_slice(&fs::read(dir.join(MANIFEST_FILE))?)?)
}

fn camera_dirs(root: &Path) -> Result<Vec<String>> {
    let mut names = fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect::<Vec<_>>();
    names.sort();
    Ok(names)
}

#[test]
fn two_regions_with_one_incomplete_camera() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = config(dir.path(), TWO_REGIONS)?;
    let mut grabber = RecordingGrabber::default();

    let summary = run(&cfg, &mut grabber, stamp(8), SystemTime::now())?;

    assert_eq!(summary.capture.succeeded, 3);
    assert_eq!(summary.capture.skipped, 1);
    assert_eq!(summary.indexed, vec!["cab-1", "cab-2", "kan-1"]);
    assert_eq!(summary.index_root, cfg.publish_dir);
    assert_eq!(camera_dirs(&cfg.staging_dir)?, vec!["cab-1", "cab-2", "kan-1"]);
    assert_eq!(camera_dirs(&cfg.publish_dir)?, vec!["cab-1", "cab-2", "kan-1"]);
    for id in ["cab-1", "cab-2", "kan-1"] {
        let frames = manifest(&cfg.publish_dir.join(id))?;
        assert_eq!(frames, vec!["2025-06-01T08-00-00.jpg"]);
        assert!(FrameStamp::parse_file_name(&frames[0]).is_some());
        assert!(!cfg.staging_dir.join(id).join(MANIFEST_FILE).exists());
    }
    Ok(())
}

#[test]
fn limit_slots_are_consumed_by_skipped_entries() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut cfg = config(dir.path(), TWO_REGIONS)?;
    cfg.limit = Some(3);
    let mut grabber = RecordingGrabber::default();

    let summary = run(&cfg, &mut grabber, stamp(8), SystemTime::now())?;

    assert_eq!(
        grabber.calls,
        vec!["https://cams.example/kan-1.m3u8", "https://cams.example/cab-1.m3u8"]
    );
    assert_eq!(summary.capture.attempted, 2);
    assert_eq!(summary.capture.skipped, 1);
    assert_eq!(summary.indexed, vec!["cab-1", "kan-1"]);
    Ok(())
}

#[test]
fn failing_camera_does_not_block_the_rest() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = config(dir.path(), TWO_REGIONS)?;
    let mut grabber = RecordingGrabber {
        failing: vec!["https://cams.example/kan-1.m3u8".to_string()],
        ..Default::default()
    };

    let summary = run(&cfg, &mut grabber, stamp(8), SystemTime::now())?;

    assert_eq!(summary.capture.failed, 1);
    assert_eq!(summary.indexed, vec!["cab-1", "cab-2"]);
    assert!(fs::read_dir(cfg.staging_dir.join("kan-1"))?.next().is_none());
    assert!(!cfg.publish_dir.join("kan-1").exists());
    Ok(())
}

#[test]
fn second_run_appends_and_manifest_is_stable() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = config(dir.path(), TWO_REGIONS)?;
    let mut grabber = RecordingGrabber::default();

    run(&cfg, &mut grabber, stamp(8), SystemTime::now())?;
    run(&cfg, &mut grabber, stamp(9), SystemTime::now())?;
    let cam = cfg.publish_dir.join("cab-1");
    let before = fs::read(cam.join(MANIFEST_FILE))?;
    assert_eq!(
        manifest(&cam)?,
        vec!["2025-06-01T08-00-00.jpg", "2025-06-01T09-00-00.jpg"]
    );

    traffic_timelapse::manifest::rebuild(
        &cfg.publish_dir,
        &traffic_timelapse::ManifestScope::All,
    )?;
    assert_eq!(fs::read(cam.join(MANIFEST_FILE))?, before);
    Ok(())
}

#[test]
fn retention_sweeps_staging_and_publish() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = config(dir.path(), "[]")?;
    let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_750_000_000);
    let old_age = Duration::from_secs(15 * 24 * 60 * 60);
    let mut old_frames = Vec::new();
    for root in [&cfg.staging_dir, &cfg.publish_dir] {
        let path = root.join("cam-x/2025-01-01T00-00-00.jpg");
        fs::create_dir_all(path.parent().expect("parent"))?;
        File::create(&path)?.set_modified(now - old_age)?;
        old_frames.push(path);
    }

    let summary = run(&cfg, &mut RecordingGrabber::default(), stamp(8), now)?;

    assert_eq!(summary.swept.purged, 2);
    assert!(old_frames.iter().all(|path| !path.exists()));
    Ok(())
}

#[test]
fn no_publish_indexes_under_staging() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut cfg = config(dir.path(), TWO_REGIONS)?;
    cfg.publish = false;

    let summary = run(&cfg, &mut RecordingGrabber::default(), stamp(8), SystemTime::now())?;

    assert_eq!(summary.index_root, cfg.staging_dir);
    assert_eq!(manifest(&cfg.staging_dir.join("kan-1"))?.len(), 1);
    assert!(!cfg.publish_dir.exists());
    Ok(())
}

#[test]
fn mirror_mode_replaces_publish_tree() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut cfg = config(dir.path(), TWO_REGIONS)?;
    cfg.publish_mode = PublishMode::Mirror;
    cfg.manifest_scope = ManifestScopeSetting::All;
    let stale = cfg.publish_dir.join("retired/2020-01-01T00-00-00.jpg");
    fs::create_dir_all(stale.parent().expect("parent"))?;
    fs::write(&stale, b"old")?;

    let summary = run(&cfg, &mut RecordingGrabber::default(), stamp(8), SystemTime::now())?;

    assert_eq!(summary.mirrored, Some(3));
    assert!(!stale.exists());
    assert_eq!(summary.indexed, vec!["cab-1", "cab-2", "kan-1"]);
    assert_eq!(
        manifest(&cfg.publish_dir.join("cab-2"))?,
        vec!["2025-06-01T08-00-00.jpg"]
    );
    Ok(())
}

#[test]
fn mirror_mode_keeps_manifests_for_cameras_that_failed_this_run() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut cfg = config(dir.path(), TWO_REGIONS)?;
    cfg.publish_mode = PublishMode::Mirror;
    cfg.manifest_scope = ManifestScopeSetting::Touched;

    run(&cfg, &mut RecordingGrabber::default(), stamp(8), SystemTime::now())?;
    let mut grabber = RecordingGrabber {
        failing: vec!["https://cams.example/kan-1.m3u8".to_string()],
        ..Default::default()
    };
    let summary = run(&cfg, &mut grabber, stamp(9), SystemTime::now())?;

    assert_eq!(summary.capture.failed, 1);
    assert!(!summary.capture.touched.contains(&"kan-1".to_string()));
    assert_eq!(summary.indexed, vec!["cab-1", "cab-2", "kan-1"]);
    assert_eq!(
        manifest(&cfg.publish_dir.join("kan-1"))?,
        vec!["2025-06-01T08-00-00.jpg"]
    );
    assert_eq!(
        manifest(&cfg.publish_dir.join("cab-1"))?,
        vec!["2025-06-01T08-00-00.jpg", "2025-06-01T09-00-00.jpg"]
    );
    Ok(())
}

#[test]
fn global_cap_stops_after_n_successes() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut cfg = config(dir.path(), TWO_REGIONS)?;
    cfg.max_captures = Some(2);

    let summary = run(&cfg, &mut RecordingGrabber::default(), stamp(8), SystemTime::now())?;

    assert_eq!(summary.capture.succeeded, 2);
    assert_eq!(summary.indexed, vec!["cab-1", "kan-1"]);
    Ok(())
}

#[test]
fn stub_streams_run_without_ffmpeg() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let catalog = r#"[{"cams": [
        {"id": "lab-1", "stream": "stub://lab-1"},
        {"id": "lab-2", "stream": "stub://fail/lab-2"}
    ]}]"#;
    let cfg = config(dir.path(), catalog)?;
    let mut grabber = StreamGrabber::new(FfmpegConfig {
        program: PathBuf::from("/nonexistent/ffmpeg"),
        timeout: None,
    });

    let summary = run(&cfg, &mut grabber, stamp(8), SystemTime::now())?;

    assert_eq!(summary.capture.succeeded, 1);
    assert_eq!(summary.capture.failed, 1);
    assert_eq!(summary.indexed, vec!["lab-1"]);
    Ok(())
}

#[test]
fn missing_catalog_is_fatal() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut cfg = config(dir.path(), "[]")?;
    cfg.cams_file = dir.path().join("elsewhere/cams.json");
    if Path::new("cams.json").exists() || Path::new("/cams.json").exists() {
        return Ok(());
    }

    let err = run(&cfg, &mut RecordingGrabber::default(), stamp(8), SystemTime::now())
        .unwrap_err();

    assert!(err.to_string().contains("cams.json not found"));
    assert!(!cfg.staging_dir.exists());
    Ok(())
}

#[test]
fn unparseable_catalog_is_fatal() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = config(dir.path(), "{\"cams\": 3}")?;

    let err = run(&cfg, &mut RecordingGrabber::default(), stamp(8), SystemTime::now())
        .unwrap_err();

    assert!(err.to_string().contains("invalid catalog"));
    Ok(())
}
