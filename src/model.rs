//! Shared types for scan outcomes
//!
//! This module contains the data model produced by the pipeline: located
//! matches, verification records and the whole-file appraisal. Everything
//! here serializes with serde so callers can persist or transport outcomes
//! in whatever format they choose.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A localized byte range believed to contain (part of) a signature
///
/// The interval is half-open: `[offset, offset + size)` into the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// Ordinal index assigned after reduction, in start-offset order
    pub idx: usize,
    /// Start offset into the payload
    pub offset: usize,
    /// Length in bytes
    pub size: usize,
}

impl Match {
    pub fn new(idx: usize, offset: usize, size: usize) -> Self {
        Match { idx, offset, size }
    }

    pub fn start(&self) -> usize {
        self.offset
    }

    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id:{}  offset:{:X}  len:{}", self.idx, self.offset, self.size)
    }
}

/// Convert sorted, merged intervals into indexed matches
pub fn matches_from_intervals(intervals: &[(usize, usize)]) -> Vec<Match> {
    intervals
        .iter()
        .enumerate()
        .map(|(idx, &(start, end))| Match::new(idx, start, end - start))
        .collect()
}

/// Result of a single verification scan against one match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanResult {
    Detected,
    NotDetected,
    /// The match was too small for the modification window
    NotScanned,
}

/// Traversal order of a verification run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOrder {
    /// Each match modified on a fresh copy of the file
    Isolated,
    /// Modifications accumulate left to right on a shared copy
    Incremental,
    /// Modifications accumulate right to left on a shared copy
    Decremental,
}

/// Kind of modification applied to a match during verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchModify {
    /// 8 bytes centered at the match midpoint
    Middle8,
    /// Two 8-byte windows at one and two thirds of the match
    Thirds8,
    /// The entire match range
    Full,
}

/// One verification run: an (order, modification) pair with one scan result
/// per match, aligned by match index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationEntry {
    pub index: usize,
    pub order: MatchOrder,
    pub modify: MatchModify,
    pub results: Vec<ScanResult>,
}

impl VerificationEntry {
    pub fn new(index: usize, order: MatchOrder, modify: MatchModify) -> Self {
        VerificationEntry {
            index,
            order,
            modify,
            results: Vec::new(),
        }
    }
}

impl fmt::Display for VerificationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}", self.order, self.modify)
    }
}

/// Per-match verdict derived from the isolated verification runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerifyStatus {
    /// Partial middle modification alone defeats detection
    Good,
    /// Only a full modification defeats detection
    Ok,
    /// Even a full modification does not defeat detection in isolation
    Bad,
}

/// Verdicts for all matches, aligned by match index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConclusion {
    pub status: Vec<VerifyStatus>,
}

impl MatchConclusion {
    pub fn new(status: Vec<VerifyStatus>) -> Self {
        MatchConclusion { status }
    }

    pub fn count(&self, status: VerifyStatus) -> usize {
        self.status.iter().filter(|&&s| s == status).count()
    }
}

/// Verification runs plus the conclusions drawn from them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub entries: Vec<VerificationEntry>,
    pub conclusions: MatchConclusion,
}

/// Whole-file classification of how the scanner detects the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Appraisal {
    Unknown,
    Undetected,
    /// Whole-file hash signature; no byte range to localize
    Hash,
    /// A single effective signature
    One,
    /// Disjunctive signature set: any one site triggers detection
    OrSig,
    /// Conjunctive signature: several sites must all be broken
    AndSig,
}

impl fmt::Display for Appraisal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Appraisal::Unknown => "Unknown",
            Appraisal::Undetected => "Undetected",
            Appraisal::Hash => "Hash",
            Appraisal::One => "One",
            Appraisal::OrSig => "Or-Signature",
            Appraisal::AndSig => "And-Signature",
        };
        write!(f, "{}", s)
    }
}

/// Identity of the scanned file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    /// Size of the oracle-visible bytes
    pub size: usize,
    /// SHA-256 of the oracle-visible bytes, hex encoded
    pub sha256: String,
    /// Adapter kind ("pe", "office", "plain")
    pub ident: String,
}

impl fmt::Display for FileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} size: {}  ident: {}", self.name, self.size, self.ident)
    }
}

/// Aggregate record of a full pipeline run
///
/// The staging flags are monotonic: they only transition false to true, and
/// each gates the corresponding pipeline stage so re-running a stage on an
/// already-processed outcome is a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub file_info: FileInfo,
    pub matches: Vec<Match>,
    pub verification: Verification,
    pub appraisal: Appraisal,

    pub is_detected: bool,
    pub is_scanned: bool,
    pub is_verified: bool,

    pub scanner_name: String,
    /// Comma-joined tags describing which analysis strategies ran
    pub scanner_info: String,
    pub scan_time: Option<DateTime<Utc>>,
    /// Running count of oracle calls spent on this outcome
    pub oracle_calls: u64,
}

impl Outcome {
    /// Fresh outcome with no stage completed
    pub fn new(file_info: FileInfo) -> Self {
        Outcome {
            file_info,
            matches: Vec::new(),
            verification: Verification::default(),
            appraisal: Appraisal::Unknown,
            is_detected: false,
            is_scanned: false,
            is_verified: false,
            scanner_name: String::new(),
            scanner_info: String::new(),
            scan_time: None,
            oracle_calls: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_interval() {
        let m = Match::new(0, 100, 28);
        assert_eq!(m.start(), 100);
        assert_eq!(m.end(), 128);
    }

    #[test]
    fn test_matches_from_intervals() {
        let matches = matches_from_intervals(&[(10, 20), (40, 80)]);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].idx, 0);
        assert_eq!(matches[0].size, 10);
        assert_eq!(matches[1].idx, 1);
        assert_eq!(matches[1].offset, 40);
    }

    #[test]
    fn test_conclusion_count() {
        let c = MatchConclusion::new(vec![
            VerifyStatus::Good,
            VerifyStatus::Bad,
            VerifyStatus::Bad,
        ]);
        assert_eq!(c.count(VerifyStatus::Bad), 2);
        assert_eq!(c.count(VerifyStatus::Good), 1);
        assert_eq!(c.count(VerifyStatus::Ok), 0);
    }

    #[test]
    fn test_appraisal_display() {
        assert_eq!(Appraisal::OrSig.to_string(), "Or-Signature");
        assert_eq!(Appraisal::AndSig.to_string(), "And-Signature");
        assert_eq!(Appraisal::Hash.to_string(), "Hash");
    }

    #[test]
    fn test_outcome_serializes() {
        let outcome = Outcome::new(FileInfo {
            name: "sample.exe".to_string(),
            size: 4096,
            sha256: "00".repeat(32),
            ident: "pe".to_string(),
        });
        let json = serde_json::to_string(&outcome).unwrap();
        let back: Outcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back.file_info.name, "sample.exe");
        assert!(!back.is_scanned);
    }
}
