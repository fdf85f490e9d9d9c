pub mod ffmpeg;
pub mod mjpeg;

use greenscan_common::config::CameraConfig;
use greenscan_common::frame::Frame;
use std::time::Duration;

use crate::UnknownMode;
use ffmpeg::FfmpegSource;
use mjpeg::MjpegSource;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("camera unavailable: {0}")]
    Unavailable(String),
    #[error("HTTP stream error: {0}")]
    Stream(reqwest::Error),
    #[error("failed to read capture output: {0}")]
    Read(std::io::Error),
    #[error(transparent)]
    UnknownSource(#[from] UnknownMode),
}

/// Anything that yields camera frames one at a time.
///
/// `Ok(None)` means the stream ended normally.
#[allow(async_fn_in_trait)]
pub trait FrameSource {
    async fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;
}

/// The frame source selected by `[camera] source`.
pub enum CameraSource {
    Ffmpeg(FfmpegSource),
    Mjpeg(MjpegSource),
}

impl CameraSource {
    pub async fn open(config: &CameraConfig) -> Result<Self, CaptureError> {
        match config.source.as_str() {
            "ffmpeg" => {
                ffmpeg::check_ffmpeg_available(&config.ffmpeg).await;
                Ok(Self::Ffmpeg(FfmpegSource::spawn(config)?))
            }
            "mjpeg" => {
                let url = config.url.as_deref().ok_or_else(|| {
                    CaptureError::Unavailable("no [camera] url configured for mjpeg source".into())
                })?;
                let timeout = Duration::from_secs(config.connect_timeout_secs);
                Ok(Self::Mjpeg(MjpegSource::connect(url, timeout).await?))
            }
            other => Err(UnknownMode {
                kind: "camera source",
                value: other.to_string(),
                expected: "ffmpeg, mjpeg",
            }
            .into()),
        }
    }
}

impl FrameSource for CameraSource {
    async fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        match self {
            Self::Ffmpeg(source) => source.next_frame().await,
            Self::Mjpeg(source) => source.next_frame().await,
        }
    }
}
