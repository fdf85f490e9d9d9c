use greenscan_common::frame::{Frame, FrameError};
use tracing::trace;

/// Axis-aligned box around a decoded barcode, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Smallest box containing every point. Linear barcodes report only the
    /// two ends of the scan line, so the height may be zero.
    pub fn enclosing(points: impl IntoIterator<Item = (f32, f32)>) -> Option<Self> {
        let mut points = points.into_iter().filter(|(x, y)| x.is_finite() && y.is_finite());
        let (x0, y0) = points.next()?;
        let (min_x, min_y, max_x, max_y) = points.fold((x0, y0, x0, y0), |(a, b, c, d), (x, y)| {
            (a.min(x), b.min(y), c.max(x), d.max(y))
        });
        let left = min_x.max(0.0).round() as u32;
        let top = min_y.max(0.0).round() as u32;
        Some(Self {
            x: left,
            y: top,
            width: (max_x.max(0.0).round() as u32).saturating_sub(left),
            height: (max_y.max(0.0).round() as u32).saturating_sub(top),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBarcode {
    pub value: String,
    /// Symbology as reported by the decoder, e.g. `EAN_13`.
    pub format: String,
    pub bounding_box: Option<BoundingBox>,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Finds barcodes in a frame. An empty list means nothing was found.
///
/// Order of the returned barcodes is whatever the decoder produces; callers
/// must not assume a spatial or scan order.
pub trait BarcodeDecoder {
    fn decode(&self, frame: &Frame) -> Result<Vec<DecodedBarcode>, DecodeError>;
}

/// Multi-format decoder backed by `rxing`.
#[derive(Debug, Clone, Default)]
pub struct RxingDecoder;

impl RxingDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl BarcodeDecoder for RxingDecoder {
    fn decode(&self, frame: &Frame) -> Result<Vec<DecodedBarcode>, DecodeError> {
        let luma = frame.decode_luma()?;
        let (width, height) = luma.dimensions();

        let results = match rxing::helpers::detect_multiple_in_luma(luma.into_raw(), width, height) {
            Ok(results) => results,
            Err(e) => {
                // rxing reports "nothing found" as an error
                trace!(seq = frame.seq, error = %e, "no barcode detected");
                return Ok(Vec::new());
            }
        };

        Ok(results
            .iter()
            .map(|r| DecodedBarcode {
                value: r.getText().to_string(),
                format: format!("{:?}", r.getBarcodeFormat()),
                bounding_box: BoundingBox::enclosing(r.getPoints().iter().map(|p| (p.x, p.y))),
            })
            .filter(|b| !b.value.is_empty())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageFormat, Luma};
    use std::io::Cursor;

    #[test]
    fn bounding_box_of_scan_line() {
        let bbox = BoundingBox::enclosing([(120.4, 80.0), (20.0, 80.2)]).unwrap();
        assert_eq!(bbox, BoundingBox { x: 20, y: 80, width: 100, height: 0 });
    }

    #[test]
    fn bounding_box_clamps_negative_coordinates() {
        let bbox = BoundingBox::enclosing([(-5.0, -3.0), (10.0, 12.0), (4.0, f32::NAN)]).unwrap();
        assert_eq!(bbox, BoundingBox { x: 0, y: 0, width: 10, height: 12 });
        assert!(BoundingBox::enclosing(std::iter::empty()).is_none());
    }

    #[test]
    fn blank_frame_has_no_barcodes() {
        let img = GrayImage::from_pixel(64, 48, Luma([200]));
        let mut jpeg = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(img)
            .write_to(&mut jpeg, ImageFormat::Jpeg)
            .unwrap();
        let frame = Frame::now(jpeg.into_inner(), 0);
        assert!(RxingDecoder::new().decode(&frame).unwrap().is_empty());
    }

    #[test]
    fn corrupt_frame_is_an_error() {
        let frame = Frame::now(b"not a jpeg".to_vec(), 0);
        assert!(RxingDecoder::new().decode(&frame).is_err());
    }
}
