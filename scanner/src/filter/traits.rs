use std::fmt;
use std::time::Instant;

/// One per-frame scan result: the first decoded barcode, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSample {
    value: Option<String>,
    timestamp: Instant,
}

impl ScanSample {
    /// An empty string is stored as "no barcode".
    pub fn new(value: Option<String>, timestamp: Instant) -> Self {
        Self {
            value: value.filter(|v| !v.is_empty()),
            timestamp,
        }
    }

    pub fn read(value: impl Into<String>, timestamp: Instant) -> Self {
        Self::new(Some(value.into()), timestamp)
    }

    pub fn empty(timestamp: Instant) -> Self {
        Self::new(None, timestamp)
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }
}

/// A barcode accepted by a scan filter. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedBarcode {
    value: String,
    format: Option<String>,
}

impl ConfirmedBarcode {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: None,
        }
    }

    /// Attach the symbology reported by the decoder, e.g. `EAN_13`.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn into_inner(self) -> String {
        self.value
    }
}

impl fmt::Display for ConfirmedBarcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Same value as before, not yet held long enough.
    Pending,
    /// Value changed or disappeared; accumulated stability was discarded.
    Reset,
    Confirmed(ConfirmedBarcode),
}

/// Acceptance policy for per-frame scan results.
///
/// Implementations see one sample per captured frame and decide when a
/// reading is trustworthy enough to end the scanning session.
pub trait ScanFilter: Send {
    fn observe(&mut self, sample: &ScanSample) -> Decision;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_no_reading() {
        let sample = ScanSample::read("", Instant::now());
        assert_eq!(sample.value(), None);
        assert_eq!(sample, ScanSample::empty(sample.timestamp()));
    }

    #[test]
    fn confirmed_barcode_displays_value() {
        let code = ConfirmedBarcode::new("5449000000996");
        assert_eq!(code.to_string(), "5449000000996");
        assert_eq!(code.as_str(), "5449000000996");
        assert_eq!(code.format(), None);

        let code = code.with_format("EAN_13");
        assert_eq!(code.to_string(), "5449000000996");
        assert_eq!(code.format(), Some("EAN_13"));
    }
}
