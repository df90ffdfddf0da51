use anyhow::{anyhow, Context, Result};
use regex::{Captures, Regex};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use crate::ingest::FfmpegConfig;
use crate::retention::RetentionPolicy;

const DEFAULT_CAMS_FILE: &str = "cams.json";
const DEFAULT_STAGING_DIR: &str = "./timelapse";
const DEFAULT_PUBLISH_DIR: &str = "~/wv-cam-ssr/dist/client/timelapse";
const DEFAULT_KEEP_DAYS: i64 = 14;
const DEFAULT_QUALITY: &str = "2";
const ROOT_CAMS_FILE: &str = "/cams.json";

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(?:\{(\w+)\}|(\w+))").unwrap());

#[derive(Debug, Deserialize, Default)]
struct TimelapseConfigFile {
    cams_file: Option<PathBuf>,
    staging_dir: Option<PathBuf>,
    publish_dir: Option<PathBuf>,
    publish: Option<bool>,
    publish_mode: Option<PublishMode>,
    keep_days: Option<i64>,
    quality: Option<String>,
    limit: Option<i64>,
    max_captures: Option<usize>,
    manifest_scope: Option<ManifestScopeSetting>,
    ffmpeg: Option<FfmpegConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct FfmpegConfigFile {
    program: Option<PathBuf>,
    timeout_secs: Option<u64>,
}

/// How captured frames reach the publish directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PublishMode {
    /// Copy each new frame into `<publish>/<camera>/` as it is captured.
    Incremental,
    /// Replace the whole publish tree with the staging tree after capture.
    Mirror,
}

/// Which camera directories get a fresh manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ManifestScopeSetting {
    /// Only cameras captured successfully in this run.
    Touched,
    /// Every camera directory under the index root.
    All,
}

/// Values supplied on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub cams_file: Option<PathBuf>,
    pub staging_dir: Option<PathBuf>,
    pub publish_dir: Option<PathBuf>,
    pub no_publish: bool,
    pub publish_mode: Option<PublishMode>,
    pub keep_days: Option<i64>,
    pub quality: Option<String>,
    pub limit: Option<i64>,
    pub max_captures: Option<usize>,
    pub manifest_scope: Option<ManifestScopeSetting>,
    pub ffmpeg_program: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct TimelapseConfig {
    pub cams_file: PathBuf,
    pub staging_dir: PathBuf,
    pub publish_dir: PathBuf,
    pub publish: bool,
    pub publish_mode: PublishMode,
    pub retention: RetentionPolicy,
    pub quality: String,
    pub limit: Option<usize>,
    pub max_captures: Option<usize>,
    pub manifest_scope: ManifestScopeSetting,
    pub ffmpeg: FfmpegConfig,
}

impl TimelapseConfig {
    /// Defaults, then the settings file, then `TIMELAPSE_*` env, then `overrides`.
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let config_path = overrides.config_path.clone().or_else(|| {
            std::env::var("TIMELAPSE_CONFIG")
                .ok()
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from)
        });
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.apply_overrides(overrides);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: TimelapseConfigFile) -> Self {
        let cams_file = file.cams_file.unwrap_or_else(|| {
            executable_dir()
                .map(|dir| dir.join(DEFAULT_CAMS_FILE))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CAMS_FILE))
        });
        let ffmpeg = FfmpegConfig {
            program: file
                .ffmpeg
                .as_ref()
                .and_then(|ffmpeg| ffmpeg.program.clone())
                .unwrap_or_else(|| FfmpegConfig::default().program),
            timeout: file
                .ffmpeg
                .and_then(|ffmpeg| ffmpeg.timeout_secs)
                .map(Duration::from_secs),
        };
        Self {
            cams_file,
            staging_dir: file
                .staging_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STAGING_DIR)),
            publish_dir: file
                .publish_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PUBLISH_DIR)),
            publish: file.publish.unwrap_or(true),
            publish_mode: file.publish_mode.unwrap_or(PublishMode::Incremental),
            retention: RetentionPolicy::from_days(file.keep_days.unwrap_or(DEFAULT_KEEP_DAYS)),
            quality: file.quality.unwrap_or_else(|| DEFAULT_QUALITY.to_string()),
            limit: file.limit.and_then(limit_from),
            max_captures: file.max_captures,
            manifest_scope: file.manifest_scope.unwrap_or(ManifestScopeSetting::Touched),
            ffmpeg,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(path) = non_blank_env("TIMELAPSE_CAMS_FILE") {
            self.cams_file = PathBuf::from(path);
        }
        if let Some(path) = non_blank_env("TIMELAPSE_STAGING_DIR") {
            self.staging_dir = PathBuf::from(path);
        }
        if let Some(path) = non_blank_env("TIMELAPSE_PUBLISH_DIR") {
            self.publish_dir = PathBuf::from(path);
        }
        if let Some(quality) = non_blank_env("TIMELAPSE_QUALITY") {
            self.quality = quality;
        }
        if let Some(program) = non_blank_env("TIMELAPSE_FFMPEG") {
            self.ffmpeg.program = PathBuf::from(program);
        }
        if let Some(days) = non_blank_env("TIMELAPSE_KEEP_DAYS") {
            let days: i64 = days
                .trim()
                .parse()
                .map_err(|_| anyhow!("TIMELAPSE_KEEP_DAYS must be an integer number of days"))?;
            self.retention = RetentionPolicy::from_days(days);
        }
        if let Some(secs) = non_blank_env("TIMELAPSE_FFMPEG_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                anyhow!("TIMELAPSE_FFMPEG_TIMEOUT_SECS must be an integer number of seconds")
            })?;
            self.ffmpeg.timeout = Some(Duration::from_secs(secs));
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(path) = &overrides.cams_file {
            self.cams_file = path.clone();
        }
        if let Some(path) = &overrides.staging_dir {
            self.staging_dir = path.clone();
        }
        if let Some(path) = &overrides.publish_dir {
            self.publish_dir = path.clone();
        }
        if overrides.no_publish {
            self.publish = false;
        }
        if let Some(mode) = overrides.publish_mode {
            self.publish_mode = mode;
        }
        if let Some(days) = overrides.keep_days {
            self.retention = RetentionPolicy::from_days(days);
        }
        if let Some(quality) = &overrides.quality {
            self.quality = quality.clone();
        }
        if let Some(limit) = overrides.limit {
            self.limit = limit_from(limit);
        }
        if let Some(max) = overrides.max_captures {
            self.max_captures = Some(max);
        }
        if let Some(scope) = overrides.manifest_scope {
            self.manifest_scope = scope;
        }
        if let Some(program) = &overrides.ffmpeg_program {
            self.ffmpeg.program = program.clone();
        }
        if let Some(secs) = overrides.timeout_secs {
            self.ffmpeg.timeout = Some(Duration::from_secs(secs));
        }
    }

    fn validate(&mut self) -> Result<()> {
        if self.quality.trim().is_empty() {
            return Err(anyhow!("quality must not be empty"));
        }
        if self.max_captures == Some(0) {
            return Err(anyhow!("max_captures must be greater than zero"));
        }
        if self.ffmpeg.timeout == Some(Duration::ZERO) {
            return Err(anyhow!("ffmpeg timeout must be greater than zero"));
        }
        self.cams_file = expand_path(&self.cams_file)?;
        self.staging_dir = expand_path(&self.staging_dir)?;
        self.publish_dir = expand_path(&self.publish_dir)?;
        if self.publish
            && (self.staging_dir.starts_with(&self.publish_dir)
                || self.publish_dir.starts_with(&self.staging_dir))
        {
            return Err(anyhow!(
                "staging dir {} and publish dir {} must not be the same or nested",
                self.staging_dir.display(),
                self.publish_dir.display()
            ));
        }
        Ok(())
    }

    /// Directory that receives `frames.json` files for this run.
    pub fn index_root(&self) -> &Path {
        if self.publish {
            self.publish_dir.as_path()
        } else {
            self.staging_dir.as_path()
        }
    }

    /// Create the staging directory, and the publish directory when publishing.
    pub fn prepare_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.staging_dir).with_context(|| {
            format!("create staging dir {}", self.staging_dir.display())
        })?;
        if self.publish {
            std::fs::create_dir_all(&self.publish_dir).with_context(|| {
                format!("create publish dir {}", self.publish_dir.display())
            })?;
        }
        Ok(())
    }
}

/// Ordered places to look for the catalog when the configured one is absent.
pub fn catalog_candidates(primary: &Path) -> Vec<PathBuf> {
    let mut candidates = vec![primary.to_path_buf()];
    if let Some(dir) = executable_dir() {
        candidates.push(dir.join(DEFAULT_CAMS_FILE));
    }
    candidates.push(PathBuf::from(".").join(DEFAULT_CAMS_FILE));
    candidates.push(PathBuf::from(ROOT_CAMS_FILE));
    candidates
}

/// First existing candidate from [`catalog_candidates`], expanded to an absolute path.
pub fn locate_catalog(primary: &Path) -> Result<PathBuf> {
    let candidates = catalog_candidates(primary);
    for candidate in &candidates {
        let path = expand_path(candidate)?;
        if path.exists() {
            return Ok(path);
        }
    }
    let tried = candidates
        .iter()
        .map(|c| c.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Err(anyhow!("cams.json not found in any of: {}", tried))
}

/// Expand `$VAR`/`${VAR}` and a leading `~`, then make the path absolute.
///
/// Unset variables are left verbatim. The result is normalised lexically;
/// symlinks are not resolved.
pub fn expand_path(raw: &Path) -> Result<PathBuf> {
    let text = raw.to_string_lossy();
    let expanded = expand_home(&expand_env_vars(&text));
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()
            .context("resolve current directory")?
            .join(expanded)
    };
    Ok(normalize(&absolute))
}

fn expand_env_vars(text: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(text, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

fn expand_home(text: &str) -> PathBuf {
    let rest = if text == "~" {
        Some("")
    } else {
        text.strip_prefix("~/")
    };
    match (rest, dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(text),
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn executable_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

fn limit_from(raw: i64) -> Option<usize> {
    usize::try_from(raw).ok()
}

fn non_blank_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<TimelapseConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
