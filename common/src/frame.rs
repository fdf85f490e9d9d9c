use image::{DynamicImage, GrayImage, ImageReader};
use std::io::Cursor;
use std::time::Instant;

/// A single JPEG image captured from a frame source.
///
/// `captured_at` is monotonic and drives the stability filter;
/// `captured_at_ms` is wall-clock Unix millis for logs and file names.
#[derive(Debug, Clone)]
pub struct Frame {
    pub jpeg: Vec<u8>,
    pub captured_at: Instant,
    pub captured_at_ms: i64,
    pub seq: u64,
}

impl Frame {
    /// Create a frame stamped with the current monotonic and wall-clock time.
    pub fn now(jpeg: Vec<u8>, seq: u64) -> Self {
        Self {
            jpeg,
            captured_at: Instant::now(),
            captured_at_ms: chrono::Utc::now().timestamp_millis(),
            seq,
        }
    }

    pub fn new(jpeg: Vec<u8>, captured_at: Instant, captured_at_ms: i64, seq: u64) -> Self {
        Self {
            jpeg,
            captured_at,
            captured_at_ms,
            seq,
        }
    }

    /// Decode the JPEG payload.
    pub fn decode(&self) -> Result<DynamicImage, FrameError> {
        ImageReader::new(Cursor::new(&self.jpeg))
            .with_guessed_format()
            .map_err(|e| FrameError::Decode(e.to_string()))?
            .decode()
            .map_err(|e| FrameError::Decode(e.to_string()))
    }

    /// Decode the JPEG payload to 8-bit grayscale.
    pub fn decode_luma(&self) -> Result<GrayImage, FrameError> {
        Ok(self.decode()?.to_luma8())
    }

    /// File name for a saved copy of this frame.
    /// e.g. "20260218T093000000Z_000007.jpg"
    pub fn snapshot_name(&self) -> String {
        let dt = chrono::DateTime::from_timestamp_millis(self.captured_at_ms)
            .unwrap_or_else(chrono::Utc::now);
        let ts = dt.format("%Y%m%dT%H%M%S%3fZ");
        format!("{ts}_{seq:06}.jpg", seq = self.seq)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("failed to decode frame image: {0}")]
    Decode(String),
}
