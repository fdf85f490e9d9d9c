pub mod decode;
pub mod display;
pub mod filter;
pub mod session;
pub mod source;

/// A configured mode name that is not one of the known choices.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} '{value}', expected one of: {expected}")]
pub struct UnknownMode {
    pub kind: &'static str,
    pub value: String,
    pub expected: &'static str,
}
