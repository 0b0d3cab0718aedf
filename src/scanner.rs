//! Scanner oracle interface
//!
//! The core treats the scanner as a black-box boolean function over
//! `(bytes, filename)`. Two transports ship with the crate: a local
//! pattern-matching engine (mostly used as a synthetic oracle in tests) and
//! an HTTP client for remote scanning services behind the `rest-scanner`
//! feature. All oracle traffic goes through [`Oracle`], which enforces
//! cooperative cancellation and keeps the running call count.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::ScanError;

pub mod pattern;
#[cfg(feature = "rest-scanner")]
pub mod rest;

/// Black-box detection oracle
pub trait Scanner {
    /// Short identifier used in logs and outcomes
    fn name(&self) -> &str;

    /// Whether the scanner flags the supplied bytes as malicious
    fn detects(&self, bytes: &[u8], filename: &str) -> Result<bool, ScanError>;

    /// Reachability probe, called once before any reduction
    fn health(&self) -> Result<(), ScanError>;
}

/// Shared running count of oracle calls
///
/// Oracle calls are the only bounded resource of a run, so the count is kept
/// observable while a scan is in flight.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicU64>);

impl CallCounter {
    pub fn new() -> Self {
        CallCounter::default()
    }

    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Cooperative cancellation flag, checked immediately before each oracle call
///
/// A cancelled run unwinds without emitting partial matches.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Scanner handle carrying the call counter and cancellation token
///
/// All components issue their oracle traffic through this wrapper so the
/// accounting and the cancellation point stay in one place.
pub struct Oracle<'a> {
    scanner: &'a dyn Scanner,
    calls: CallCounter,
    cancel: CancelToken,
}

impl<'a> Oracle<'a> {
    pub fn new(scanner: &'a dyn Scanner, calls: CallCounter, cancel: CancelToken) -> Self {
        Oracle {
            scanner,
            calls,
            cancel,
        }
    }

    pub fn scanner_name(&self) -> &str {
        self.scanner.name()
    }

    pub fn calls(&self) -> u64 {
        self.calls.get()
    }

    /// Submit bytes to the scanner. Checks for cancellation first and counts
    /// the call.
    pub fn detects(&self, bytes: &[u8], filename: &str) -> Result<bool, ScanError> {
        if self.cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        self.calls.bump();
        self.scanner.detects(bytes, filename)
    }

    pub fn health(&self) -> Result<(), ScanError> {
        self.scanner.health()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysDetects;

    impl Scanner for AlwaysDetects {
        fn name(&self) -> &str {
            "always"
        }

        fn detects(&self, _bytes: &[u8], _filename: &str) -> Result<bool, ScanError> {
            Ok(true)
        }

        fn health(&self) -> Result<(), ScanError> {
            Ok(())
        }
    }

    #[test]
    fn test_oracle_counts_calls() {
        let scanner = AlwaysDetects;
        let calls = CallCounter::new();
        let oracle = Oracle::new(&scanner, calls.clone(), CancelToken::new());
        assert!(oracle.detects(b"x", "f").unwrap());
        assert!(oracle.detects(b"y", "f").unwrap());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_cancelled_oracle_refuses_calls() {
        let scanner = AlwaysDetects;
        let calls = CallCounter::new();
        let cancel = CancelToken::new();
        let oracle = Oracle::new(&scanner, calls.clone(), cancel.clone());
        cancel.cancel();
        assert!(matches!(
            oracle.detects(b"x", "f"),
            Err(ScanError::Cancelled)
        ));
        // The refused call is not counted
        assert_eq!(calls.get(), 0);
    }
}
