pub mod immediate;
pub mod stability;
pub mod traits;

use std::time::{Duration, TryFromFloatSecsError};

use greenscan_common::config::ScannerConfig;

use crate::UnknownMode;
use immediate::ImmediateFilter;
use stability::StabilityFilter;
use traits::ScanFilter;

pub use traits::{ConfirmedBarcode, Decision, ScanSample};

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error(transparent)]
    UnknownMode(#[from] UnknownMode),
    #[error("invalid stability window of {secs} seconds: {source}")]
    Window {
        secs: f64,
        #[source]
        source: TryFromFloatSecsError,
    },
}

/// Build the scan filter named by `[scanner] filter`.
pub fn from_config(config: &ScannerConfig) -> Result<Box<dyn ScanFilter>, FilterError> {
    match config.filter.as_str() {
        "stable" => {
            let required = Duration::try_from_secs_f64(config.stable_secs).map_err(|source| {
                FilterError::Window {
                    secs: config.stable_secs,
                    source,
                }
            })?;
            Ok(Box::new(StabilityFilter::new(required)))
        }
        "immediate" => Ok(Box::new(ImmediateFilter::new())),
        other => Err(UnknownMode {
            kind: "scan filter",
            value: other.to_string(),
            expected: "stable, immediate",
        }
        .into()),
    }
}
