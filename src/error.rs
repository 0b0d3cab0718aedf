//! Error types for scan runs
//!
//! Only conditions that abort a run become error values. An inconsistent
//! oracle (quick check detected, pristine bytes later undetected) is logged
//! by the pipeline and absorbed into `Appraisal::Unknown` instead; a
//! recursion hitting the resolution floor or a verification window larger
//! than its match are ordinary outcomes, not errors.

use std::fmt;
use std::io;

/// Result type alias for scan operations
pub type RunResult<T> = Result<T, ScanError>;

/// Errors that can occur while localizing a signature
#[derive(Debug)]
pub enum ScanError {
    /// I/O error (file read/write)
    Io(io::Error),
    /// The file could not be parsed by any adapter
    UnsupportedFile(String),
    /// The oracle is unreachable or returned a transport error
    OracleUnavailable(String),
    /// A payload edit fell outside the buffer bounds
    Mutation(String),
    /// The run was cancelled before an oracle call
    Cancelled,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Io(e) => write!(f, "I/O error: {}", e),
            ScanError::UnsupportedFile(e) => write!(f, "Unsupported file: {}", e),
            ScanError::OracleUnavailable(e) => write!(f, "Oracle unavailable: {}", e),
            ScanError::Mutation(e) => write!(f, "Payload mutation failed: {}", e),
            ScanError::Cancelled => write!(f, "Run cancelled"),
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScanError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ScanError {
    fn from(err: io::Error) -> Self {
        ScanError::Io(err)
    }
}
