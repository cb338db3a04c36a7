//! Error taxonomy for a single conversion run.

use std::path::PathBuf;
use thiserror::Error;

/// Everything that can abort the conversion of one input file.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The probe tool could not be run or exited with an error.
    #[error("probing {} failed: {reason}", .path.display())]
    Probe { path: PathBuf, reason: String },

    /// The structured probe output did not have the expected shape.
    #[error("malformed probe output: {0}")]
    MalformedProbe(#[source] serde_json::Error),

    /// The subtitle extraction tool could not be run or exited with an error.
    #[error("subtitle extraction for {} failed: {reason}", .path.display())]
    Extraction { path: PathBuf, reason: String },

    /// The encoder binary could not be started at all.
    #[error("encoding {} failed: {reason}", .path.display())]
    Encode { path: PathBuf, reason: String },

    /// The encoder produced nothing, or something too small to be the
    /// converted source.
    #[error(
        "rejected output for {}: {output_size} bytes from a {source_size} byte source",
        .path.display()
    )]
    RejectedOutput {
        path: PathBuf,
        output_size: u64,
        source_size: u64,
    },

    /// A stream has several disposition flags set and there is no rule for
    /// picking one of them.
    #[error("stream {stream} has multiple disposition flags set: {}", .flags.join(", "))]
    AmbiguousDisposition { stream: String, flags: Vec<String> },

    /// The plan could not be rendered for the diagnostic report.
    #[error("could not render plan report: {0}")]
    Report(#[source] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    /// Process exit status to report for this failure.
    /// Rejected output keeps its own status so scripts can tell it apart.
    pub fn exit_code(&self) -> u8 {
        match self {
            ConvertError::RejectedOutput { .. } => 1,
            _ => 2,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
