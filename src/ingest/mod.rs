//! Frame grabbing.
//!
//! Grabbing one still from a live stream is delegated to an external tool.
//! Everything above this module talks to the [`FrameGrabber`] trait only:
//! - `FfmpegGrabber` runs `ffmpeg` once per camera
//! - `SyntheticGrabber` serves `stub://` streams without any network (testing)
//! - `StreamGrabber` picks between the two by URL scheme
//!
//! A grabber either leaves a complete file at the requested output path and
//! returns `Ok`, or returns an error. Cleaning up partial output after an
//! error is the caller's job.

mod ffmpeg;
mod synthetic;

use anyhow::Result;
use std::path::Path;

pub use ffmpeg::{FfmpegConfig, FfmpegGrabber};
pub use synthetic::{SyntheticGrabber, STUB_FAIL_PREFIX, STUB_SCHEME};

/// One single-frame grab.
#[derive(Clone, Copy, Debug)]
pub struct CaptureRequest<'a> {
    pub stream_url: &'a str,
    /// Encoder quality parameter passed through verbatim (lower is better for ffmpeg).
    pub quality: &'a str,
    pub output: &'a Path,
}

pub trait FrameGrabber {
    fn grab(&mut self, request: &CaptureRequest<'_>) -> Result<()>;
}

/// Default grabber: synthetic for `stub://` streams, ffmpeg for the rest.
pub struct StreamGrabber {
    ffmpeg: FfmpegGrabber,
    synthetic: SyntheticGrabber,
}

impl StreamGrabber {
    pub fn new(config: FfmpegConfig) -> Self {
        Self {
            ffmpeg: FfmpegGrabber::new(config),
            synthetic: SyntheticGrabber::new(),
        }
    }
}

impl FrameGrabber for StreamGrabber {
    fn grab(&mut self, request: &CaptureRequest<'_>) -> Result<()> {
        if request.stream_url.starts_with(STUB_SCHEME) {
            self.synthetic.grab(request)
        } else {
            self.ffmpeg.grab(request)
        }
    }
}
