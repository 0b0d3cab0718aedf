//! Hash-signature probe
//!
//! A whole-file hash signature makes every bit position load-bearing, so a
//! single-byte change anywhere kills detection. Two one-byte probes at well
//! separated offsets distinguish that case from content-based signatures for
//! the cost of two oracle calls, before any binary search is spent.

use tracing::debug;

use crate::buffer::FillKind;
use crate::error::ScanError;
use crate::formats::FileFormat;
use crate::scanner::Oracle;

/// Whether detection of `file` is based on a whole-file hash
///
/// Mutates one byte at a third and at two thirds of the payload. If both
/// mutated files are no longer detected, the signature is a content hash.
pub fn is_hash_signature(file: &dyn FileFormat, oracle: &Oracle) -> Result<bool, ScanError> {
    let size = file.data().len();
    if size < 3 {
        // Too small for two distinct probe offsets
        return Ok(false);
    }

    let first_offset = size / 3;
    let second_offset = (size / 3) * 2;

    let mut first = file.data().clone();
    first
        .fill(first_offset, 1, FillKind::Null)
        .map_err(ScanError::Mutation)?;
    let first_detected = oracle.detects(&file.materialize_with(&first)?, file.filename())?;

    let mut second = file.data().clone();
    second
        .fill(second_offset, 1, FillKind::Null)
        .map_err(ScanError::Mutation)?;
    let second_detected = oracle.detects(&file.materialize_with(&second)?, file.filename())?;

    debug!(
        first_offset,
        first_detected, second_offset, second_detected, "Hash probe"
    );
    Ok(!first_detected && !second_detected)
}
