use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::decode::BarcodeDecoder;
use crate::display::{DisplaySink, Overlay};
use crate::filter::traits::ScanFilter;
use crate::filter::{ConfirmedBarcode, Decision, ScanSample};
use crate::source::{CaptureError, FrameSource};

/// How a scanning session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Confirmed(ConfirmedBarcode),
    /// The frame source ran out of frames.
    EndOfStream,
    /// The stop signal was raised.
    Stopped,
    /// The configured frame limit was reached.
    FrameLimit,
}

/// Frame-by-frame scan loop: capture, decode, filter, display.
pub struct ScanSession<S, D> {
    source: S,
    decoder: D,
    filter: Box<dyn ScanFilter>,
    display: Box<dyn DisplaySink>,
    frame_limit: u64,
}

impl<S: FrameSource, D: BarcodeDecoder> ScanSession<S, D> {
    pub fn new(
        source: S,
        decoder: D,
        filter: Box<dyn ScanFilter>,
        display: Box<dyn DisplaySink>,
    ) -> Self {
        Self {
            source,
            decoder,
            filter,
            display,
            frame_limit: 0,
        }
    }

    /// Stop after `limit` frames. 0 means no limit.
    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = limit;
        self
    }

    /// Run until a barcode is confirmed, the source ends, the frame limit is
    /// hit, or `stop` becomes `true`.
    pub async fn run(&mut self, stop: &mut watch::Receiver<bool>) -> Result<ScanOutcome, CaptureError> {
        let mut frames: u64 = 0;
        info!(filter = self.filter.name(), frame_limit = self.frame_limit, "scanning started");

        loop {
            if *stop.borrow() {
                info!(frames, "stop requested");
                return Ok(ScanOutcome::Stopped);
            }
            if self.frame_limit > 0 && frames >= self.frame_limit {
                info!(frames, "frame limit reached");
                return Ok(ScanOutcome::FrameLimit);
            }

            let next = tokio::select! {
                biased;
                _ = wait_for_stop(stop) => {
                    info!(frames, "stop requested");
                    return Ok(ScanOutcome::Stopped);
                }
                next = self.source.next_frame() => next?,
            };
            let Some(frame) = next else {
                info!(frames, "frame source ended");
                return Ok(ScanOutcome::EndOfStream);
            };
            frames += 1;

            let barcodes = match self.decoder.decode(&frame) {
                Ok(b) => b,
                Err(e) => {
                    warn!(error = %e, seq = frame.seq, "failed to decode frame, skipping");
                    continue;
                }
            };

            // First decoded wins; decoder order is unspecified.
            let first = barcodes.first();
            match first {
                Some(barcode) => debug!(
                    seq = frame.seq,
                    value = barcode.value,
                    format = barcode.format,
                    count = barcodes.len(),
                    "barcode decoded"
                ),
                None => trace!(seq = frame.seq, "no barcode in frame"),
            }

            let sample = ScanSample::new(first.map(|b| b.value.clone()), frame.captured_at);
            let decision = self.filter.observe(&sample);
            self.display.show(
                &frame,
                &Overlay {
                    barcodes: &barcodes,
                    decision: &decision,
                },
            );

            if let Decision::Confirmed(code) = decision {
                let code = match first {
                    Some(barcode) => code.with_format(barcode.format.clone()),
                    None => code,
                };
                info!(
                    barcode = %code,
                    format = code.format(),
                    frames,
                    filter = self.filter.name(),
                    "barcode confirmed"
                );
                return Ok(ScanOutcome::Confirmed(code));
            }
        }
    }
}

/// Resolves once the stop flag is set. Never resolves if the sender is gone.
async fn wait_for_stop(stop: &mut watch::Receiver<bool>) {
    if stop.wait_for(|stopped| *stopped).await.is_err() {
        std::future::pending::<()>().await;
    }
}
