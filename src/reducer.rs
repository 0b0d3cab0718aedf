//! Recursive byte-range reducer
//!
//! Halves a detected range, nulls one half at a time and recurses where
//! detection persists. When both halves trigger detection on their own, each
//! half is examined against a copy with the other half already nulled, so
//! the signatures stay isolated from each other. When neither half triggers
//! alone the signature straddles the midpoint; the range is emitted once the
//! half size drops under [`SIG_SIZE`].

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::buffer::{ByteBuffer, FillKind};
use crate::error::ScanError;
use crate::formats::FileFormat;
use crate::scanner::Oracle;

/// Resolution floor: ranges are not halved further once a half would be
/// smaller than this
pub const SIG_SIZE: usize = 128;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Binary-search signature localizer over one file and one oracle
pub struct Reducer<'a> {
    file: &'a dyn FileFormat,
    oracle: &'a Oracle<'a>,
    chunks_tested: u64,
    last_progress: Instant,
}

impl<'a> Reducer<'a> {
    pub fn new(file: &'a dyn FileFormat, oracle: &'a Oracle<'a>) -> Self {
        Reducer {
            file,
            oracle,
            chunks_tested: 0,
            last_progress: Instant::now(),
        }
    }

    /// Number of halving probes issued so far
    pub fn chunks_tested(&self) -> u64 {
        self.chunks_tested
    }

    /// Localize signatures inside `[start, end)` of the payload.
    ///
    /// Returns sorted, merged half-open intervals. The caller must already
    /// know the range triggers detection; an undetected range returns empty.
    pub fn scan(&mut self, start: usize, end: usize) -> Result<Vec<(usize, usize)>, ScanError> {
        let mut intervals = Vec::new();
        let data = self.file.data().clone();
        self.scan_range(&data, start, end, &mut intervals)?;
        Ok(merge_intervals(intervals))
    }

    fn scan_payload(&mut self, payload: &ByteBuffer) -> Result<bool, ScanError> {
        let bytes = self.file.materialize_with(payload)?;
        self.oracle.detects(&bytes, self.file.filename())
    }

    fn scan_range(
        &mut self,
        data: &ByteBuffer,
        start: usize,
        end: usize,
        intervals: &mut Vec<(usize, usize)>,
    ) -> Result<(), ScanError> {
        let size = end - start;
        let half = size / 2;
        // An odd byte goes to the top half
        let mid = start + (size - half);
        self.progress();

        if half < 2 {
            debug!(start, end, "Range below resolution floor, ignoring");
            return Ok(());
        }

        let mut top_nulled = data.clone();
        top_nulled
            .fill(start, mid - start, FillKind::Null)
            .map_err(ScanError::Mutation)?;
        let mut bottom_nulled = data.clone();
        bottom_nulled
            .fill(mid, end - mid, FillKind::Null)
            .map_err(ScanError::Mutation)?;

        let detect_top_nulled = self.scan_payload(&top_nulled)?;
        let detect_bottom_nulled = self.scan_payload(&bottom_nulled)?;

        if detect_top_nulled && detect_bottom_nulled {
            // Both halves trigger on their own. Recurse into each half with
            // the opposite half nulled so the signatures stay isolated.
            self.scan_range(&bottom_nulled, start, mid, intervals)?;
            self.scan_range(&top_nulled, mid, end, intervals)?;
        } else if !detect_top_nulled && !detect_bottom_nulled {
            // Neither half triggers alone: the signature straddles the
            // midpoint, or the range is approaching signature size.
            if half < SIG_SIZE {
                info!(start, end, size, "Emitting match");
                intervals.push((start, end));
            } else {
                self.scan_range(data, start, mid, intervals)?;
                self.scan_range(data, mid, end, intervals)?;
            }
        } else if !detect_top_nulled {
            // Nulling the top half killed detection: the signature is there
            self.scan_range(data, start, mid, intervals)?;
        } else {
            self.scan_range(data, mid, end, intervals)?;
        }

        Ok(())
    }

    fn progress(&mut self) {
        self.chunks_tested += 1;
        if self.last_progress.elapsed() >= PROGRESS_INTERVAL {
            self.last_progress = Instant::now();
            info!(chunks = self.chunks_tested, "Reducing");
        }
    }
}

/// Sort intervals and merge any that overlap or touch
pub(crate) fn merge_intervals(mut intervals: Vec<(usize, usize)>) -> Vec<(usize, usize)> {
    intervals.sort_unstable();
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(intervals.len());
    for (start, end) in intervals {
        match merged.last_mut() {
            Some((_, last_end)) if start <= *last_end => {
                *last_end = (*last_end).max(end);
            }
            _ => merged.push((start, end)),
        }
    }
    merged
}
