use super::traits::{ConfirmedBarcode, Decision, ScanFilter, ScanSample};

/// Accepts the first non-empty reading as-is.
///
/// Single-shot behaviour: no debouncing, so a transient misread ends the
/// session. Useful with still images or a very clean capture.
#[derive(Debug, Clone, Default)]
pub struct ImmediateFilter;

impl ImmediateFilter {
    pub fn new() -> Self {
        Self
    }
}

impl ScanFilter for ImmediateFilter {
    fn observe(&mut self, sample: &ScanSample) -> Decision {
        match sample.value() {
            Some(value) => Decision::Confirmed(ConfirmedBarcode::new(value)),
            None => Decision::Reset,
        }
    }

    fn name(&self) -> &str {
        "immediate"
    }
}
