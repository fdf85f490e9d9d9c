use std::time::{Duration, Instant};
use tracing::debug;

use super::traits::{ConfirmedBarcode, Decision, ScanFilter, ScanSample};

/// Debounce filter for barcode readings.
///
/// A reading is confirmed only after the same non-empty value has been seen
/// continuously for `required` time. The clock starts at the second identical
/// sample; any empty or different sample discards it.
#[derive(Debug, Clone)]
pub struct StabilityFilter {
    last_value: Option<String>,
    /// Set only while `last_value` is non-empty and repeated.
    stable_since: Option<Instant>,
    required: Duration,
}

impl StabilityFilter {
    pub fn new(required: Duration) -> Self {
        Self {
            last_value: None,
            stable_since: None,
            required,
        }
    }

    pub fn required(&self) -> Duration {
        self.required
    }

    /// Feed one sample against an explicit stability threshold.
    pub fn observe_for(&mut self, sample: &ScanSample, required: Duration) -> Decision {
        let value = match (sample.value(), self.last_value.as_deref()) {
            (Some(value), Some(last)) if value == last => value,
            (value, _) => {
                self.last_value = value.map(str::to_owned);
                self.stable_since = None;
                return Decision::Reset;
            }
        };

        let Some(since) = self.stable_since else {
            self.stable_since = Some(sample.timestamp());
            return Decision::Pending;
        };

        // Out-of-order timestamps count as zero elapsed.
        let elapsed = sample.timestamp().saturating_duration_since(since);
        if elapsed >= required {
            debug!(value, elapsed_ms = elapsed.as_millis() as u64, "reading held long enough");
            Decision::Confirmed(ConfirmedBarcode::new(value))
        } else {
            Decision::Pending
        }
    }
}

impl ScanFilter for StabilityFilter {
    fn observe(&mut self, sample: &ScanSample) -> Decision {
        self.observe_for(sample, self.required)
    }

    fn name(&self) -> &str {
        "stable"
    }
}
