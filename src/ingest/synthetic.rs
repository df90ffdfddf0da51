//! Synthetic grabber for `stub://` streams.
//!
//! Writes a tiny fixed JPEG so the whole pipeline can run without cameras.
//! Streams starting with `stub://fail` always fail and write nothing.

use anyhow::{anyhow, Context, Result};

use super::{CaptureRequest, FrameGrabber};

pub const STUB_SCHEME: &str = "stub://";
pub const STUB_FAIL_PREFIX: &str = "stub://fail";

// SOI, a bare JFIF APP0 segment, EOI.
const PLACEHOLDER_JPEG: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00,
    0x01, 0x00, 0x01, 0x00, 0x00, 0xFF, 0xD9,
];

#[derive(Debug, Default)]
pub struct SyntheticGrabber;

impl SyntheticGrabber {
    pub fn new() -> Self {
        Self
    }
}

impl FrameGrabber for SyntheticGrabber {
    fn grab(&mut self, request: &CaptureRequest<'_>) -> Result<()> {
        if request.stream_url.starts_with(STUB_FAIL_PREFIX) {
            return Err(anyhow!("synthetic stream {} is down", request.stream_url));
        }
        std::fs::write(request.output, PLACEHOLDER_JPEG)
            .with_context(|| format!("write {}", request.output.display()))?;
        Ok(())
    }
}
