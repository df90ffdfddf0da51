//! timelapse_capture - grab one frame per traffic camera into the timelapse archive
//!
//! One invocation:
//! 1. Resolves settings (file, `TIMELAPSE_*` env, flags) and finds the catalog
//! 2. Purges frames older than the retention window
//! 3. Captures one frame per camera, publishing as configured
//! 4. Rebuilds `frames.json` under the index root

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use traffic_timelapse::{
    FrameStamp, ManifestScopeSetting, Overrides, Pipeline, PublishMode, RetentionPolicy,
    StreamGrabber, TimelapseConfig,
};

#[path = "../ui.rs"]
mod ui;

use ui::Stage;

#[derive(Parser, Debug)]
#[command(author, version, about = "Capture timelapse frames for traffic cams.")]
struct Args {
    /// Capture only the first N catalog entries (testing). Omit or pass a negative value for all.
    #[arg(short = 'n', long, allow_negative_numbers = true)]
    limit: Option<i64>,
    /// Do NOT copy frames to the publish dir; keep everything in staging and index there.
    #[arg(long)]
    no_publish: bool,
    /// How frames reach the publish dir (incremental copy or full mirror).
    #[arg(long, value_enum)]
    publish_mode: Option<PublishMode>,
    /// Retention window in days (default 14). Use -1 to disable.
    #[arg(long, allow_negative_numbers = true)]
    keep_days: Option<i64>,
    /// ffmpeg -q:v value (lower = higher quality). Default 2.
    #[arg(long)]
    quality: Option<String>,
    /// Path to cams.json. Default: cams.json next to the executable.
    #[arg(long)]
    cams_file: Option<PathBuf>,
    /// Where new frames are written. Default: ./timelapse
    #[arg(long)]
    staging_dir: Option<PathBuf>,
    /// Published folder served by the site (ignored with --no-publish).
    #[arg(long)]
    publish_dir: Option<PathBuf>,
    /// Stop after this many successful captures.
    #[arg(long)]
    max_captures: Option<usize>,
    /// Rebuild manifests for cameras captured this run, or for every camera dir.
    #[arg(long, value_enum)]
    manifest_scope: Option<ManifestScopeSetting>,
    /// ffmpeg binary to run.
    #[arg(long, value_name = "PATH")]
    ffmpeg: Option<PathBuf>,
    /// Kill a single grab after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// JSON settings file (also TIMELAPSE_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,
    /// UI mode for stderr progress.
    #[arg(long, value_enum, default_value_t = ui::UiMode::Auto, value_name = "MODE")]
    ui: ui::UiMode,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            config_path: self.config.clone(),
            cams_file: self.cams_file.clone(),
            staging_dir: self.staging_dir.clone(),
            publish_dir: self.publish_dir.clone(),
            no_publish: self.no_publish,
            publish_mode: self.publish_mode,
            keep_days: self.keep_days,
            quality: self.quality.clone(),
            limit: self.limit,
            max_captures: self.max_captures,
            manifest_scope: self.manifest_scope,
            ffmpeg_program: self.ffmpeg.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

fn main() {
    traffic_timelapse::logging::init();
    if let Err(e) = run(Args::parse()) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let ui = ui::Ui::new(
        args.ui,
        std::io::stderr().is_terminal(),
        !std::io::stdout().is_terminal(),
    );
    let cfg = TimelapseConfig::load(&args.overrides())?;
    let pipeline = Pipeline::new(&cfg);

    let (catalog_path, catalog) = {
        let mut stage = ui.stage(Stage::Catalog);
        let (path, catalog) = pipeline.load_catalog()?;
        stage.cameras(catalog.len());
        (path, catalog)
    };
    if catalog.is_empty() {
        log::warn!("catalog {} lists no cameras", catalog_path.display());
    }
    print_paths(&cfg, &catalog_path);

    pipeline.prepare()?;
    {
        let mut stage = ui.stage(Stage::Purge);
        stage.swept(&pipeline.sweep(SystemTime::now())?);
    }

    let stamp = FrameStamp::now();
    let mut grabber = StreamGrabber::new(cfg.ffmpeg.clone());
    let capture = {
        let mut stage = ui.stage(Stage::Capture);
        let capture = pipeline.capture(&catalog, &mut grabber, &stamp);
        stage.captured(&capture);
        capture
    };

    if cfg.publish && cfg.publish_mode == PublishMode::Mirror {
        let mut stage = ui.stage(Stage::Mirror);
        if let Some(files) = pipeline.publish()? {
            stage.mirrored(files);
        }
    }

    let indexed = {
        let mut stage = ui.stage(Stage::Manifests);
        let indexed = pipeline.index(&capture)?;
        stage.indexed(&indexed);
        indexed
    };

    println!(
        "✅ Timelapse updated. Indexed {} cam(s) under: {}",
        indexed.len(),
        cfg.index_root().display()
    );
    Ok(())
}

fn print_paths(cfg: &TimelapseConfig, catalog_path: &Path) {
    println!("📁 Using paths/mode:");
    println!("   cams_file     = {}", catalog_path.display());
    println!("   staging_dir   = {}", cfg.staging_dir.display());
    if cfg.publish {
        println!("   publish_dir   = {}", cfg.publish_dir.display());
        println!("   publish_mode  = {:?}", cfg.publish_mode);
        println!("   index_root    = publish");
    } else {
        println!("   publish_dir   = (disabled)");
        println!("   index_root    = staging (frames.json written under staging)");
    }
    match cfg.retention {
        RetentionPolicy::Disabled => println!("   retention     = (disabled)"),
        RetentionPolicy::MaxAge(window) => {
            println!("   retention     = {} day(s)", window.as_secs() / 86_400)
        }
    }
}
