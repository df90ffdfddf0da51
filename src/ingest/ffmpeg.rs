//! Single-frame grabs through the `ffmpeg` command-line tool.
//!
//! The tool's stdout and stderr are discarded; only the exit status counts.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use super::{CaptureRequest, FrameGrabber};

const DEFAULT_PROGRAM: &str = "ffmpeg";
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FfmpegConfig {
    /// Program name or path of the ffmpeg binary.
    pub program: PathBuf,
    /// Kill the grab after this long. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            timeout: None,
        }
    }
}

pub struct FfmpegGrabber {
    config: FfmpegConfig,
}

impl FfmpegGrabber {
    pub fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }

    /// `ffmpeg -y -i <url> -frames:v 1 -q:v <quality> <output>`
    pub fn command(&self, request: &CaptureRequest<'_>) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.arg("-y")
            .arg("-i")
            .arg(request.stream_url)
            .args(["-frames:v", "1", "-q:v"])
            .arg(request.quality)
            .arg(request.output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }
}

impl FrameGrabber for FfmpegGrabber {
    fn grab(&mut self, request: &CaptureRequest<'_>) -> Result<()> {
        let mut child = self.command(request).spawn().with_context(|| {
            format!("failed to launch {}", self.config.program.display())
        })?;
        let status = match self.config.timeout {
            Some(timeout) => wait_with_timeout(&mut child, timeout)?,
            None => child.wait().context("wait for ffmpeg")?,
        };
        if status.success() {
            Ok(())
        } else {
            Err(anyhow!("ffmpeg exited with {}", status))
        }
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExitStatus> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait().context("poll ffmpeg")? {
            return Ok(status);
        }
        if started.elapsed() >= timeout {
            if let Err(e) = child.kill() {
                log::warn!("failed to kill stalled ffmpeg: {}", e);
            }
            if let Err(e) = child.wait() {
                log::warn!("failed to reap stalled ffmpeg: {}", e);
            }
            return Err(anyhow!("ffmpeg timed out after {}s", timeout.as_secs_f64()));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}
