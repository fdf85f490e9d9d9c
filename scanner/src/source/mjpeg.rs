use bytes::{Bytes, BytesMut};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use greenscan_common::frame::Frame;
use std::time::Duration;
use tracing::{debug, info};

use super::{CaptureError, FrameSource};

const DEFAULT_BOUNDARY: &str = "frame";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// Parse state for a `multipart/x-mixed-replace` stream.
enum ParseState {
    /// Looking for the boundary marker `--{boundary}\r\n`.
    SeekingBoundary,
    /// Found boundary, now looking for end of part headers `\r\n\r\n`.
    SeekingHeaderEnd,
    /// Collecting JPEG bytes until the next boundary.
    CollectingJpeg,
}

/// Incremental splitter for MJPEG multipart bodies.
///
/// Feed it chunks as they arrive with [`push`](Self::push), then drain
/// complete parts with [`next_part`](Self::next_part).
pub struct MultipartParser {
    boundary: Vec<u8>,
    buffer: BytesMut,
    state: ParseState,
    jpeg_start: usize,
}

impl MultipartParser {
    /// `boundary` may be given with or without the leading `--`.
    pub fn new(boundary: &str) -> Self {
        let boundary = boundary.trim_start_matches("--");
        Self {
            boundary: format!("--{boundary}\r\n").into_bytes(),
            buffer: BytesMut::with_capacity(256 * 1024),
            state: ParseState::SeekingBoundary,
            jpeg_start: 0,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete part body, or `None` until more data arrives.
    pub fn next_part(&mut self) -> Option<Vec<u8>> {
        let marker_len = self.boundary.len();
        loop {
            match self.state {
                ParseState::SeekingBoundary => {
                    if let Some(pos) = find_subsequence(&self.buffer, &self.boundary) {
                        let _ = self.buffer.split_to(pos + marker_len);
                        self.state = ParseState::SeekingHeaderEnd;
                    } else {
                        // Keep the tail in case the boundary spans chunks
                        if self.buffer.len() > marker_len {
                            let _ = self.buffer.split_to(self.buffer.len() - marker_len);
                        }
                        return None;
                    }
                }
                ParseState::SeekingHeaderEnd => {
                    if let Some(pos) = find_subsequence(&self.buffer, HEADER_END) {
                        let _ = self.buffer.split_to(pos + HEADER_END.len());
                        self.jpeg_start = 0;
                        self.state = ParseState::CollectingJpeg;
                    } else {
                        return None;
                    }
                }
                ParseState::CollectingJpeg => {
                    let Some(pos) = find_subsequence(&self.buffer[self.jpeg_start..], &self.boundary)
                    else {
                        // Resume the search near the end next time
                        self.jpeg_start = self.buffer.len().saturating_sub(marker_len);
                        return None;
                    };
                    let jpeg_end = self.jpeg_start + pos;
                    // Strip trailing \r\n before boundary
                    let end = if self.buffer[..jpeg_end].ends_with(b"\r\n") {
                        jpeg_end - 2
                    } else {
                        jpeg_end
                    };
                    let jpeg = self.buffer[..end].to_vec();
                    let _ = self.buffer.split_to(jpeg_end + marker_len);
                    self.state = ParseState::SeekingHeaderEnd;
                    if !jpeg.is_empty() {
                        return Some(jpeg);
                    }
                }
            }
        }
    }
}

/// Frames from an HTTP MJPEG stream (IP cameras, phone camera apps).
pub struct MjpegSource {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    parser: MultipartParser,
    seq: u64,
}

impl MjpegSource {
    /// Open the stream. Connection failures and non-success statuses mean the
    /// camera is unavailable.
    pub async fn connect(url: &str, connect_timeout: Duration) -> Result<Self, CaptureError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| CaptureError::Unavailable(format!("HTTP client: {e}")))?;

        info!(url, "connecting to MJPEG stream");
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| CaptureError::Unavailable(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(CaptureError::Unavailable(format!(
                "{url}: HTTP status {}",
                response.status().as_u16()
            )));
        }

        let boundary = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(boundary_from_content_type)
            .unwrap_or_else(|| DEFAULT_BOUNDARY.to_string());

        info!(status = %response.status(), boundary, "connected to MJPEG stream");

        Ok(Self {
            body: response.bytes_stream().boxed(),
            parser: MultipartParser::new(&boundary),
            seq: 0,
        })
    }
}

impl FrameSource for MjpegSource {
    async fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        loop {
            if let Some(jpeg) = self.parser.next_part() {
                let frame = Frame::now(jpeg, self.seq);
                self.seq += 1;
                debug!(seq = frame.seq, bytes = frame.jpeg.len(), "MJPEG frame");
                return Ok(Some(frame));
            }
            match self.body.next().await {
                Some(chunk) => self.parser.push(&chunk.map_err(CaptureError::Stream)?),
                None => return Ok(None),
            }
        }
    }
}

/// Extract the `boundary` parameter from a multipart content type.
fn boundary_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.trim().split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("boundary")
            .then(|| value.trim().trim_matches('"').to_string())
            .filter(|b| !b.is_empty())
    })
}

/// Find the position of `needle` in `haystack`.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use axum::routing::get;
    use axum::Router;

    fn part(body: &[u8]) -> Vec<u8> {
        let mut out = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        out.extend_from_slice(body);
        out.extend_from_slice(b"\r\n");
        out
    }

    #[test]
    fn splits_parts_across_chunk_boundaries() {
        let mut stream = Vec::new();
        stream.extend(part(b"\xFF\xD8first\xFF\xD9"));
        stream.extend(part(b"\xFF\xD8second\xFF\xD9"));
        stream.extend_from_slice(b"--frame\r\n");

        let mut parser = MultipartParser::new("frame");
        let mut parts = Vec::new();
        for chunk in stream.chunks(5) {
            parser.push(chunk);
            while let Some(p) = parser.next_part() {
                parts.push(p);
            }
        }
        assert_eq!(parts, vec![b"\xFF\xD8first\xFF\xD9".to_vec(), b"\xFF\xD8second\xFF\xD9".to_vec()]);
    }

    #[test]
    fn skips_preamble_and_empty_parts() {
        let mut parser = MultipartParser::new("--frame");
        parser.push(b"garbage before the first boundary");
        parser.push(b"--frame\r\n\r\n\r\n");
        parser.push(&part(b"data"));
        parser.push(b"--frame\r\n");
        assert_eq!(parser.next_part(), Some(b"data".to_vec()));
        assert_eq!(parser.next_part(), None);
    }

    #[test]
    fn boundary_parsing() {
        assert_eq!(
            boundary_from_content_type("multipart/x-mixed-replace; boundary=myboundary").as_deref(),
            Some("myboundary")
        );
        assert_eq!(
            boundary_from_content_type("multipart/x-mixed-replace;Boundary=\"--abc\"").as_deref(),
            Some("--abc")
        );
        assert_eq!(boundary_from_content_type("image/jpeg"), None);
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn reads_frames_until_end_of_stream() {
        let router = Router::new().route(
            "/video",
            get(|| async {
                let mut body = Vec::new();
                for i in 0..3u8 {
                    body.extend_from_slice(b"--cam\r\nContent-Type: image/jpeg\r\n\r\n");
                    body.extend_from_slice(&[0xFF, 0xD8, i, 0xFF, 0xD9]);
                    body.extend_from_slice(b"\r\n");
                }
                body.extend_from_slice(b"--cam\r\n");
                (
                    [(header::CONTENT_TYPE, "multipart/x-mixed-replace; boundary=cam")],
                    body,
                )
            }),
        );
        let base = serve(router).await;

        let mut source = MjpegSource::connect(&format!("{base}/video"), Duration::from_secs(2))
            .await
            .unwrap();
        let mut seen = Vec::new();
        while let Some(frame) = source.next_frame().await.unwrap() {
            seen.push((frame.seq, frame.jpeg[2]));
        }
        assert_eq!(seen, vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[tokio::test]
    async fn error_status_means_unavailable() {
        let router = Router::new().route(
            "/video",
            get(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "busy") }),
        );
        let base = serve(router).await;

        let err = MjpegSource::connect(&format!("{base}/video"), Duration::from_secs(2))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CaptureError::Unavailable(ref msg) if msg.contains("503")));
    }
}
