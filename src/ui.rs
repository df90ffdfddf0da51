use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use traffic_timelapse::{CaptureReport, SweepReport};

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

/// Steps of one capture run, in the order they are reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Catalog,
    Purge,
    Capture,
    Mirror,
    Manifests,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Catalog => "Load catalog",
            Stage::Purge => "Purge old frames",
            Stage::Capture => "Capture frames",
            Stage::Mirror => "Mirror publish dir",
            Stage::Manifests => "Rebuild manifests",
        }
    }
}

/// Stage reporting on stderr: spinners on a terminal, plain lines otherwise.
#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    fn pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, stage: Stage) -> StageGuard {
        let name = stage.label();
        if self.pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name, Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name, None)
        }
    }
}

/// Prints the stage result with its elapsed time when dropped.
pub struct StageGuard {
    name: &'static str,
    outcome: Option<String>,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: &'static str, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            outcome: None,
            start: Instant::now(),
            spinner,
        }
    }

    pub fn cameras(&mut self, count: usize) {
        self.outcome = Some(format!("{} camera(s)", count));
    }

    pub fn swept(&mut self, report: &SweepReport) {
        self.outcome = Some(sweep_outcome(report));
    }

    pub fn captured(&mut self, report: &CaptureReport) {
        self.outcome = Some(capture_outcome(report));
    }

    pub fn mirrored(&mut self, files: usize) {
        self.outcome = Some(format!("{} file(s) copied", files));
    }

    pub fn indexed(&mut self, ids: &[String]) {
        self.outcome = Some(format!("{} manifest(s)", ids.len()));
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = format_duration(self.start.elapsed());
        let message = match &self.outcome {
            Some(outcome) => format!("✔ {} ({}): {}", self.name, elapsed, outcome),
            None => format!("✔ {} ({})", self.name, elapsed),
        };
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn sweep_outcome(report: &SweepReport) -> String {
    if report.errors == 0 {
        format!("{} of {} frame(s) purged", report.purged, report.examined)
    } else {
        format!(
            "{} of {} frame(s) purged, {} error(s)",
            report.purged, report.examined, report.errors
        )
    }
}

fn capture_outcome(report: &CaptureReport) -> String {
    let mut outcome = format!("{}/{} captured", report.succeeded, report.attempted);
    if report.failed > 0 {
        outcome.push_str(&format!(", {} failed", report.failed));
    }
    if report.skipped > 0 {
        outcome.push_str(&format!(", {} skipped", report.skipped));
    }
    outcome
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
