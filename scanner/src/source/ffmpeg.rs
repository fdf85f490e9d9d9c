use bytes::BytesMut;
use greenscan_common::config::CameraConfig;
use greenscan_common::frame::Frame;
use std::collections::VecDeque;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{CaptureError, FrameSource};

const SOI: &[u8] = &[0xFF, 0xD8];
const EOI: &[u8] = &[0xFF, 0xD9];
const READ_CHUNK: usize = 64 * 1024;
const STDERR_TAIL_LINES: usize = 8;

/// Splits a concatenated JPEG byte stream (ffmpeg `image2pipe`) into images.
///
/// Entropy-coded JPEG data byte-stuffs `0xFF`, so the first EOI marker after
/// an SOI ends the image.
#[derive(Default)]
pub struct JpegSplitter {
    buffer: BytesMut,
    /// Offset from which to resume the EOI search inside the current image.
    scan_from: usize,
}

impl JpegSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    pub fn next_image(&mut self) -> Option<Vec<u8>> {
        if self.scan_from == 0 {
            match find_subsequence(&self.buffer, SOI) {
                Some(pos) => {
                    let _ = self.buffer.split_to(pos);
                    self.scan_from = SOI.len();
                }
                None => {
                    // A trailing 0xFF may be the first half of the next SOI
                    let keep = usize::from(self.buffer.last() == Some(&0xFF));
                    let _ = self.buffer.split_to(self.buffer.len() - keep);
                    return None;
                }
            }
        }

        match find_subsequence(&self.buffer[self.scan_from..], EOI) {
            Some(pos) => {
                let end = self.scan_from + pos + EOI.len();
                self.scan_from = 0;
                Some(self.buffer.split_to(end).to_vec())
            }
            None => {
                self.scan_from = self.buffer.len().saturating_sub(1).max(SOI.len());
                None
            }
        }
    }
}

/// Frames from a local capture device, read through an ffmpeg subprocess.
pub struct FfmpegSource {
    child: Child,
    stdout: ChildStdout,
    stderr_tail: Option<JoinHandle<String>>,
    splitter: JpegSplitter,
    read_buf: Vec<u8>,
    seq: u64,
}

impl FfmpegSource {
    /// Spawn ffmpeg reading `config.device` and writing MJPEG to stdout.
    pub fn spawn(config: &CameraConfig) -> Result<Self, CaptureError> {
        let fps = config.fps.to_string();

        let mut cmd = Command::new(&config.ffmpeg);
        cmd.args([
            "-hide_banner",
            "-loglevel", "error",
            "-f", config.input_format.as_str(),
            "-framerate", fps.as_str(),
            "-i", config.device.as_str(),
            "-f", "image2pipe",
            "-vcodec", "mjpeg",
            "-q:v", "3",
            "pipe:1",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            CaptureError::Unavailable(format!("failed to spawn {}: {e}", config.ffmpeg))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::Unavailable("could not get ffmpeg stdout handle".into()))?;

        let stderr_tail = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(line, "ffmpeg");
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                Vec::from(tail).join("\n")
            })
        });

        info!(
            program = config.ffmpeg,
            device = config.device,
            input_format = config.input_format,
            fps = config.fps,
            "ffmpeg capture started"
        );

        Ok(Self {
            child,
            stdout,
            stderr_tail,
            splitter: JpegSplitter::new(),
            read_buf: vec![0; READ_CHUNK],
            seq: 0,
        })
    }

    /// Wait for ffmpeg to exit and describe why it stopped.
    async fn exit_reason(&mut self) -> String {
        let status = match self.child.wait().await {
            Ok(status) => status.to_string(),
            Err(e) => format!("unknown status ({e})"),
        };
        let tail = match self.stderr_tail.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };
        if tail.is_empty() {
            format!("ffmpeg {status}")
        } else {
            format!("ffmpeg {status}: {tail}")
        }
    }
}

impl FrameSource for FfmpegSource {
    async fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        loop {
            if let Some(jpeg) = self.splitter.next_image() {
                let frame = Frame::now(jpeg, self.seq);
                self.seq += 1;
                debug!(seq = frame.seq, bytes = frame.jpeg.len(), "captured frame");
                return Ok(Some(frame));
            }

            let n = self
                .stdout
                .read(&mut self.read_buf)
                .await
                .map_err(CaptureError::Read)?;
            if n == 0 {
                let reason = self.exit_reason().await;
                if self.seq == 0 {
                    // Never produced a frame: the device could not be opened.
                    return Err(CaptureError::Unavailable(reason));
                }
                info!(frames = self.seq, reason, "capture ended");
                return Ok(None);
            }
            self.splitter.push(&self.read_buf[..n]);
        }
    }
}

/// Check whether ffmpeg is available. Logs a warning if not found.
pub async fn check_ffmpeg_available(program: &str) {
    match Command::new(program).arg("-version").output().await {
        Ok(out) if out.status.success() => {
            debug!(program, "ffmpeg is available");
        }
        Ok(_) => {
            warn!(program, "ffmpeg returned non-zero for -version; capture may fail");
        }
        Err(e) => {
            warn!(
                program,
                error = %e,
                "ffmpeg not found; camera capture will fail. \
                 Install ffmpeg or set [camera] source = \"mjpeg\"."
            );
        }
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
