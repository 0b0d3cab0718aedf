//! Local pattern-matching oracle
//!
//! Detects when configured byte patterns occur anywhere in the submitted
//! bytes. Useful as a stand-in for a real scanner when exercising the
//! pipeline against known signatures, and as the synthetic oracle in tests.

use memchr::memmem;
use tracing::trace;

use super::Scanner;
use crate::error::ScanError;

/// Scanner that flags bytes containing configured patterns
pub struct PatternScanner {
    name: String,
    patterns: Vec<Vec<u8>>,
    /// When set, every pattern must be present (conjunctive rule set);
    /// otherwise any single pattern triggers detection.
    require_all: bool,
}

impl PatternScanner {
    /// Oracle that detects when ANY pattern is present
    pub fn any(name: &str, patterns: Vec<Vec<u8>>) -> Self {
        PatternScanner {
            name: name.to_string(),
            patterns,
            require_all: false,
        }
    }

    /// Oracle that detects only when ALL patterns are present
    pub fn all(name: &str, patterns: Vec<Vec<u8>>) -> Self {
        PatternScanner {
            name: name.to_string(),
            patterns,
            require_all: true,
        }
    }
}

impl Scanner for PatternScanner {
    fn name(&self) -> &str {
        &self.name
    }

    fn detects(&self, bytes: &[u8], filename: &str) -> Result<bool, ScanError> {
        let mut hits = 0usize;
        for pattern in &self.patterns {
            if memmem::find(bytes, pattern).is_some() {
                hits += 1;
                if !self.require_all {
                    break;
                }
            }
        }
        let detected = if self.require_all {
            !self.patterns.is_empty() && hits == self.patterns.len()
        } else {
            hits > 0
        };
        trace!(filename, detected, "Pattern scan");
        Ok(detected)
    }

    fn health(&self) -> Result<(), ScanError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_mode() {
        let scanner = PatternScanner::any("p", vec![b"EVIL".to_vec(), b"HARM".to_vec()]);
        assert!(scanner.detects(b"xxEVILxx", "f").unwrap());
        assert!(scanner.detects(b"xxHARMxx", "f").unwrap());
        assert!(!scanner.detects(b"benign", "f").unwrap());
    }

    #[test]
    fn test_all_mode() {
        let scanner = PatternScanner::all("p", vec![b"EVIL".to_vec(), b"HARM".to_vec()]);
        assert!(!scanner.detects(b"xxEVILxx", "f").unwrap());
        assert!(scanner.detects(b"EVIL...HARM", "f").unwrap());
    }

    #[test]
    fn test_no_patterns_never_detects() {
        let any = PatternScanner::any("p", Vec::new());
        let all = PatternScanner::all("p", Vec::new());
        assert!(!any.detects(b"anything", "f").unwrap());
        assert!(!all.detects(b"anything", "f").unwrap());
    }
}
