use greenscan_common::config::DisplayConfig;
use greenscan_common::frame::Frame;
use image::{ImageFormat, Rgb, RgbImage};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::decode::{BoundingBox, DecodedBarcode};
use crate::filter::Decision;
use crate::UnknownMode;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: u32 = 2;
/// Linear barcodes yield a zero-height box; draw at least this tall.
const MIN_BOX_HEIGHT: u32 = 12;

/// What the scanner knows about a frame at the moment it is shown.
pub struct Overlay<'a> {
    pub barcodes: &'a [DecodedBarcode],
    pub decision: &'a Decision,
}

pub trait DisplaySink {
    fn show(&mut self, frame: &Frame, overlay: &Overlay<'_>);
}

/// Discards everything.
pub struct NoDisplay;

impl DisplaySink for NoDisplay {
    fn show(&mut self, _frame: &Frame, _overlay: &Overlay<'_>) {}
}

/// One structured log event per frame with detections.
pub struct LogDisplay;

impl DisplaySink for LogDisplay {
    fn show(&mut self, frame: &Frame, overlay: &Overlay<'_>) {
        for barcode in overlay.barcodes {
            info!(
                seq = frame.seq,
                value = barcode.value,
                format = barcode.format,
                bbox = ?barcode.bounding_box,
                decision = ?overlay.decision,
                "barcode in view"
            );
        }
    }
}

/// Writes annotated copies of frames with detections into a directory.
pub struct SnapshotDisplay {
    dir: PathBuf,
}

impl SnapshotDisplay {
    pub fn new(dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn write(&self, frame: &Frame, barcodes: &[DecodedBarcode]) -> Result<PathBuf, String> {
        let mut img = frame.decode().map_err(|e| e.to_string())?.to_rgb8();
        for bbox in barcodes.iter().filter_map(|b| b.bounding_box) {
            draw_box(&mut img, bbox);
        }
        let path = self.dir.join(frame.snapshot_name());
        img.save_with_format(&path, ImageFormat::Jpeg)
            .map_err(|e| e.to_string())?;
        Ok(path)
    }
}

impl DisplaySink for SnapshotDisplay {
    fn show(&mut self, frame: &Frame, overlay: &Overlay<'_>) {
        if overlay.barcodes.is_empty() {
            return;
        }
        match self.write(frame, overlay.barcodes) {
            Ok(path) => debug!(path = %path.display(), seq = frame.seq, "snapshot written"),
            Err(e) => warn!(error = e, seq = frame.seq, "failed to write snapshot"),
        }
    }
}

/// Build the sink named by `[display] mode`.
pub fn from_config(config: &DisplayConfig) -> Result<Box<dyn DisplaySink>, DisplayError> {
    match config.mode.as_str() {
        "none" => Ok(Box::new(NoDisplay)),
        "log" => Ok(Box::new(LogDisplay)),
        "snapshot" => {
            let sink = SnapshotDisplay::new(&config.snapshot_dir).map_err(|e| {
                DisplayError::SnapshotDir(config.snapshot_dir.display().to_string(), e)
            })?;
            Ok(Box::new(sink))
        }
        other => Err(UnknownMode {
            kind: "display mode",
            value: other.to_string(),
            expected: "none, log, snapshot",
        }
        .into()),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("failed to create snapshot directory {0}: {1}")]
    SnapshotDir(String, std::io::Error),
    #[error(transparent)]
    UnknownMode(#[from] UnknownMode),
}

/// Outline `bbox` on `img`, clipped to the image.
fn draw_box(img: &mut RgbImage, bbox: BoundingBox) {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let pad = MIN_BOX_HEIGHT.saturating_sub(bbox.height) / 2;
    let left = bbox.x.min(w - 1);
    let right = (bbox.x + bbox.width).min(w - 1);
    let top = bbox.y.saturating_sub(pad).min(h - 1);
    let bottom = (bbox.y + bbox.height + pad).min(h - 1);

    for t in 0..BOX_THICKNESS {
        for x in left..=right {
            img.put_pixel(x, (top + t).min(bottom), BOX_COLOR);
            img.put_pixel(x, bottom.saturating_sub(t).max(top), BOX_COLOR);
        }
        for y in top..=bottom {
            img.put_pixel((left + t).min(right), y, BOX_COLOR);
            img.put_pixel(right.saturating_sub(t).max(left), y, BOX_COLOR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;
    use std::io::Cursor;

    fn frame(seq: u64) -> Frame {
        let img = RgbImage::from_pixel(40, 30, Rgb([0, 0, 0]));
        let mut jpeg = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut jpeg, ImageFormat::Jpeg)
            .unwrap();
        Frame::now(jpeg.into_inner(), seq)
    }

    fn barcode(bbox: Option<BoundingBox>) -> DecodedBarcode {
        DecodedBarcode {
            value: "5449000000996".into(),
            format: "EAN_13".into(),
            bounding_box: bbox,
        }
    }

    #[test]
    fn draw_box_outlines_and_clips() {
        let mut img = RgbImage::new(20, 20);
        draw_box(&mut img, BoundingBox { x: 2, y: 10, width: 30, height: 0 });
        // Zero-height box is padded vertically around y=10.
        assert_eq!(*img.get_pixel(2, 4), BOX_COLOR);
        assert_eq!(*img.get_pixel(10, 4), BOX_COLOR);
        assert_eq!(*img.get_pixel(19, 10), BOX_COLOR);
        assert_eq!(*img.get_pixel(10, 10), Rgb([0, 0, 0]));
    }

    #[test]
    fn snapshot_written_only_with_detections() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = SnapshotDisplay::new(dir.path()).unwrap();

        sink.show(&frame(1), &Overlay { barcodes: &[], decision: &Decision::Reset });
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        let found = [barcode(Some(BoundingBox { x: 5, y: 5, width: 20, height: 10 }))];
        let f = frame(2);
        sink.show(&f, &Overlay { barcodes: &found, decision: &Decision::Pending });
        let written = dir.path().join(f.snapshot_name());
        assert!(written.exists());
        assert!(image::open(&written).is_ok());
    }

    #[test]
    fn unreadable_frame_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = SnapshotDisplay::new(dir.path()).unwrap();
        let bad = Frame::now(vec![1, 2, 3], 9);
        sink.show(&bad, &Overlay { barcodes: &[barcode(None)], decision: &Decision::Reset });
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn sinks_from_config() {
        let mut config = DisplayConfig::default();
        assert!(from_config(&config).is_ok());
        config.mode = "log".into();
        assert!(from_config(&config).is_ok());
        config.mode = "window".into();
        assert!(matches!(from_config(&config).err(), Some(DisplayError::UnknownMode(_))));
    }
}
