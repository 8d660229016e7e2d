//! Error types for the pipeline stage.

use std::io;

use thiserror::Error;

/// An external tool invocation failed.
///
/// Frame sampling and OCR are fallible external services, never infallible
/// library calls; every failure mode carries the tool name so per-menu logs
/// stay diagnosable.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The tool binary could not be found.
    #[error("{tool} is not installed or not on PATH")]
    Missing {
        /// Name of the tool binary.
        tool: String,
    },

    /// The invocation exceeded its hard timeout.
    #[error("{tool} timed out after {seconds}s")]
    TimedOut {
        /// Name of the tool binary.
        tool: String,
        /// The timeout that elapsed.
        seconds: u64,
    },

    /// The process could not be run at all.
    #[error("could not run {tool}: {source}")]
    Io {
        /// Name of the tool binary.
        tool: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The tool ran but exited unsuccessfully.
    #[error("{tool} failed ({status}): {stderr}")]
    Failed {
        /// Name of the tool binary.
        tool: String,
        /// Exit status description.
        status: String,
        /// A truncated slice of stderr.
        stderr: String,
    },

    /// The tool succeeded but its output could not be used.
    #[error("{tool} produced unusable output: {reason}")]
    BadOutput {
        /// Name of the tool binary.
        tool: String,
        /// What was wrong with the output.
        reason: String,
    },
}

/// A broken internal invariant, such as an output path escaping the stage
/// directory.  Unlike packet- or menu-level trouble this is always fatal:
/// the process exits non-zero rather than writing a questionable artifact.
#[derive(Debug, Error)]
#[error("invariant violation: {message}")]
pub struct InvariantViolation {
    message: String,
}

impl InvariantViolation {
    /// Create a new violation with the given description.
    pub fn new<S: Into<String>>(message: S) -> InvariantViolation {
        InvariantViolation {
            message: message.into(),
        }
    }
}
