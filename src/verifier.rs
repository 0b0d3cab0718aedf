//! Match verification
//!
//! Checks how the located matches combine by mutating them independently,
//! incrementally and decrementally, then draws a per-match verdict from the
//! isolated runs. A match whose middle alone breaks detection is tight and
//! locally breakable; one that only yields to a full wipe is fuzzier; one
//! that survives even a full wipe in isolation is redundant with another
//! site.

use tracing::info;

use crate::buffer::{ByteBuffer, FillKind};
use crate::error::ScanError;
use crate::formats::FileFormat;
use crate::model::{
    Match, MatchConclusion, MatchModify, MatchOrder, ScanResult, Verification,
    VerificationEntry, VerifyStatus,
};
use crate::scanner::Oracle;

/// Modification window in bytes, centered on the target offset
const WINDOW: usize = 8;

/// Verify matches against the scanner and conclude a per-match verdict
pub fn verify(
    file: &dyn FileFormat,
    matches: &[Match],
    oracle: &Oracle,
) -> Result<Verification, ScanError> {
    let entries = run_verifications(file, matches, oracle)?;
    let conclusions = conclude(&entries);
    Ok(Verification {
        entries,
        conclusions,
    })
}

/// Scan result for one mutated payload
fn scan_payload(
    file: &dyn FileFormat,
    payload: &ByteBuffer,
    oracle: &Oracle,
) -> Result<ScanResult, ScanError> {
    let bytes = file.materialize_with(payload)?;
    if oracle.detects(&bytes, file.filename())? {
        Ok(ScanResult::Detected)
    } else {
        Ok(ScanResult::NotDetected)
    }
}

/// Fill the 8-byte window centered at the match midpoint
fn fill_middle(payload: &mut ByteBuffer, m: &Match) -> Result<(), String> {
    let offset = m.offset + m.size / 2 - WINDOW / 2;
    payload.fill(offset, WINDOW, FillKind::LowEntropy)
}

/// Fill two 8-byte windows at one and two thirds of the match
fn fill_thirds(payload: &mut ByteBuffer, m: &Match) -> Result<(), String> {
    let first = m.offset + m.size / 3 - WINDOW / 2;
    let second = m.offset + (m.size / 3) * 2 - WINDOW / 2;
    payload.fill(first, WINDOW, FillKind::LowEntropy)?;
    payload.fill(second, WINDOW, FillKind::LowEntropy)
}

fn fill_full(payload: &mut ByteBuffer, m: &Match) -> Result<(), String> {
    payload.fill(m.offset, m.size, FillKind::LowEntropy)
}

fn run_verifications(
    file: &dyn FileFormat,
    matches: &[Match],
    oracle: &Oracle,
) -> Result<Vec<VerificationEntry>, ScanError> {
    let mut runs: Vec<VerificationEntry> = Vec::new();
    if matches.is_empty() {
        return Ok(runs);
    }
    info!(count = matches.len(), "Verifying matches");

    // Isolated, middle window
    let mut run = VerificationEntry::new(runs.len(), MatchOrder::Isolated, MatchModify::Middle8);
    info!(run = %run, "Verification run");
    for m in matches {
        if m.size < 2 * WINDOW {
            run.results.push(ScanResult::NotScanned);
            continue;
        }
        let mut payload = file.data().clone();
        fill_middle(&mut payload, m).map_err(ScanError::Mutation)?;
        run.results.push(scan_payload(file, &payload, oracle)?);
    }
    runs.push(run);

    // Isolated, thirds
    let mut run = VerificationEntry::new(runs.len(), MatchOrder::Isolated, MatchModify::Thirds8);
    info!(run = %run, "Verification run");
    for m in matches {
        if m.size < 3 * WINDOW {
            run.results.push(ScanResult::NotScanned);
            continue;
        }
        let mut payload = file.data().clone();
        fill_thirds(&mut payload, m).map_err(ScanError::Mutation)?;
        run.results.push(scan_payload(file, &payload, oracle)?);
    }
    runs.push(run);

    // Isolated, full wipe
    let mut run = VerificationEntry::new(runs.len(), MatchOrder::Isolated, MatchModify::Full);
    info!(run = %run, "Verification run");
    for m in matches {
        let mut payload = file.data().clone();
        fill_full(&mut payload, m).map_err(ScanError::Mutation)?;
        run.results.push(scan_payload(file, &payload, oracle)?);
    }
    runs.push(run);

    // Cumulative orders say nothing new about a single match
    if matches.len() == 1 {
        return Ok(runs);
    }

    // Incremental, middle window: edits accumulate left to right
    let mut run =
        VerificationEntry::new(runs.len(), MatchOrder::Incremental, MatchModify::Middle8);
    info!(run = %run, "Verification run");
    let mut payload = file.data().clone();
    for m in matches {
        if m.size < 2 * WINDOW {
            run.results.push(ScanResult::NotScanned);
            continue;
        }
        fill_middle(&mut payload, m).map_err(ScanError::Mutation)?;
        run.results.push(scan_payload(file, &payload, oracle)?);
    }
    runs.push(run);

    // Incremental, full wipe
    let mut run = VerificationEntry::new(runs.len(), MatchOrder::Incremental, MatchModify::Full);
    info!(run = %run, "Verification run");
    let mut payload = file.data().clone();
    for m in matches {
        fill_full(&mut payload, m).map_err(ScanError::Mutation)?;
        run.results.push(scan_payload(file, &payload, oracle)?);
    }
    runs.push(run);

    // Decremental, full wipe: right to left, results realigned to match order
    let mut run = VerificationEntry::new(runs.len(), MatchOrder::Decremental, MatchModify::Full);
    info!(run = %run, "Verification run");
    let mut payload = file.data().clone();
    for m in matches.iter().rev() {
        fill_full(&mut payload, m).map_err(ScanError::Mutation)?;
        run.results.push(scan_payload(file, &payload, oracle)?);
    }
    run.results.reverse();
    runs.push(run);

    Ok(runs)
}

fn results_for(
    runs: &[VerificationEntry],
    order: MatchOrder,
    modify: MatchModify,
) -> Option<&[ScanResult]> {
    runs.iter()
        .find(|r| r.order == order && r.modify == modify)
        .map(|r| r.results.as_slice())
}

/// Per-match verdicts, drawn from the isolated runs only
fn conclude(runs: &[VerificationEntry]) -> MatchConclusion {
    let mut status = Vec::new();
    if runs.is_empty() {
        return MatchConclusion::new(status);
    }

    let middle = results_for(runs, MatchOrder::Isolated, MatchModify::Middle8);
    let full = results_for(runs, MatchOrder::Isolated, MatchModify::Full);
    let match_count = runs[0].results.len();

    for idx in 0..match_count {
        let mut verdict = VerifyStatus::Bad;
        if middle.and_then(|r| r.get(idx)) == Some(&ScanResult::NotDetected) {
            // Best case: a partial modification of the isolated match evades
            verdict = VerifyStatus::Good;
        } else if full.and_then(|r| r.get(idx)) == Some(&ScanResult::NotDetected) {
            verdict = VerifyStatus::Ok;
        }
        status.push(verdict);
    }
    MatchConclusion::new(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::PlainFile;
    use crate::scanner::{pattern::PatternScanner, CallCounter, CancelToken};

    fn oracle_for(scanner: &PatternScanner) -> Oracle<'_> {
        Oracle::new(scanner, CallCounter::new(), CancelToken::new())
    }

    fn payload_with(patterns: &[(usize, &[u8])]) -> Vec<u8> {
        let mut payload = vec![0u8; 4096];
        for &(offset, pattern) in patterns {
            payload[offset..offset + pattern.len()].copy_from_slice(pattern);
        }
        payload
    }

    #[test]
    fn test_single_match_runs_isolated_only() {
        let file = PlainFile::new("s.bin", payload_with(&[(1000, b"EVILEVILEVILEVIL")]));
        let scanner = PatternScanner::any("p", vec![b"EVIL".to_vec()]);
        let oracle = oracle_for(&scanner);
        let matches = [Match::new(0, 992, 32)];

        let verification = verify(&file, &matches, &oracle).unwrap();

        assert_eq!(verification.entries.len(), 3);
        assert!(verification
            .entries
            .iter()
            .all(|r| r.order == MatchOrder::Isolated));
        assert_eq!(verification.conclusions.status.len(), 1);
    }

    #[test]
    fn test_disjunctive_matches_are_bad() {
        // Either pattern triggers detection, so wiping one match in
        // isolation never evades
        let file = PlainFile::new(
            "s.bin",
            payload_with(&[(500, b"EVILEVILEVILEVIL"), (3000, b"HARMHARMHARMHARM")]),
        );
        let scanner = PatternScanner::any(
            "p",
            vec![b"EVILEVILEVILEVIL".to_vec(), b"HARMHARMHARMHARM".to_vec()],
        );
        let oracle = oracle_for(&scanner);
        let matches = [Match::new(0, 500, 16), Match::new(1, 3000, 16)];

        let verification = verify(&file, &matches, &oracle).unwrap();

        assert_eq!(verification.entries.len(), 6);
        assert_eq!(
            verification.conclusions.status,
            vec![VerifyStatus::Bad, VerifyStatus::Bad]
        );

        // The cumulative wipe evades once the last site falls
        let incremental = results_for(
            &verification.entries,
            MatchOrder::Incremental,
            MatchModify::Full,
        )
        .unwrap();
        assert_eq!(
            incremental,
            &[ScanResult::Detected, ScanResult::NotDetected]
        );
        let decremental = results_for(
            &verification.entries,
            MatchOrder::Decremental,
            MatchModify::Full,
        )
        .unwrap();
        assert_eq!(
            decremental,
            &[ScanResult::NotDetected, ScanResult::Detected]
        );
    }

    #[test]
    fn test_conjunctive_matches_are_good() {
        // Both patterns must be present, so breaking the middle of either
        // match alone evades
        let file = PlainFile::new(
            "s.bin",
            payload_with(&[(500, b"EVILEVILEVILEVIL"), (3000, b"HARMHARMHARMHARM")]),
        );
        let scanner = PatternScanner::all(
            "p",
            vec![b"EVILEVILEVILEVIL".to_vec(), b"HARMHARMHARMHARM".to_vec()],
        );
        let oracle = oracle_for(&scanner);
        let matches = [Match::new(0, 500, 16), Match::new(1, 3000, 16)];

        let verification = verify(&file, &matches, &oracle).unwrap();
        assert_eq!(
            verification.conclusions.status,
            vec![VerifyStatus::Good, VerifyStatus::Good]
        );
    }

    #[test]
    fn test_small_match_is_not_scanned_for_windows() {
        let file = PlainFile::new("s.bin", payload_with(&[(1000, b"EVIL")]));
        let scanner = PatternScanner::any("p", vec![b"EVIL".to_vec()]);
        let oracle = oracle_for(&scanner);
        // 4 bytes is below both the 16-byte middle and 24-byte thirds floors
        let matches = [Match::new(0, 1000, 4)];

        let verification = verify(&file, &matches, &oracle).unwrap();

        let middle = results_for(
            &verification.entries,
            MatchOrder::Isolated,
            MatchModify::Middle8,
        )
        .unwrap();
        assert_eq!(middle, &[ScanResult::NotScanned]);
        let thirds = results_for(
            &verification.entries,
            MatchOrder::Isolated,
            MatchModify::Thirds8,
        )
        .unwrap();
        assert_eq!(thirds, &[ScanResult::NotScanned]);

        // The full wipe still runs and evades, so the verdict is Ok
        assert_eq!(verification.conclusions.status, vec![VerifyStatus::Ok]);
    }

    #[test]
    fn test_no_matches_no_runs() {
        let file = PlainFile::new("s.bin", vec![0u8; 64]);
        let scanner = PatternScanner::any("p", vec![b"EVIL".to_vec()]);
        let oracle = oracle_for(&scanner);

        let verification = verify(&file, &[], &oracle).unwrap();
        assert!(verification.entries.is_empty());
        assert!(verification.conclusions.status.is_empty());
    }
}
