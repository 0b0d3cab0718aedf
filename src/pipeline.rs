//! Scan pipeline
//!
//! Composes the stages into one run: health check, quick detection check,
//! hash probe, section-aware reduction, verification and the whole-file
//! appraisal. The stages gate on the outcome's staging flags, so feeding an
//! already-scanned outcome back in re-runs nothing.
//!
//! Create one pipeline per input file; the oracle-call counter spans the
//! lifetime of the pipeline.

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::analyzer::{analyze, AnalyzerOptions};
use crate::error::ScanError;
use crate::formats::{FileFormat, LoadedFile};
use crate::model::{Appraisal, FileInfo, Outcome, VerifyStatus};
use crate::probe::is_hash_signature;
use crate::scanner::{CallCounter, CancelToken, Oracle, Scanner};
use crate::verifier::verify;

/// Orchestrates a full signature-localization run against one scanner
pub struct Pipeline<'a> {
    scanner: &'a dyn Scanner,
    calls: CallCounter,
    cancel: CancelToken,
}

impl<'a> Pipeline<'a> {
    pub fn new(scanner: &'a dyn Scanner) -> Self {
        Pipeline {
            scanner,
            calls: CallCounter::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Handle for cancelling the run from another thread
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Running count of oracle calls issued so far
    pub fn oracle_calls(&self) -> u64 {
        self.calls.get()
    }

    fn oracle(&self) -> Oracle<'a> {
        Oracle::new(self.scanner, self.calls.clone(), self.cancel.clone())
    }

    /// Run the full pipeline on a loaded file
    pub fn run(&self, file: &LoadedFile, options: AnalyzerOptions) -> Result<Outcome, ScanError> {
        let mut outcome = Outcome::new(file_info(file));
        self.scan_stage(&mut outcome, file, options)?;

        if !outcome.is_detected || outcome.appraisal == Appraisal::Hash {
            info!(
                detected = outcome.is_detected,
                appraisal = %outcome.appraisal,
                "Nothing to verify"
            );
            return Ok(outcome);
        }
        if outcome.matches.is_empty() {
            // Degenerate scan, already appraised Unknown
            return Ok(outcome);
        }

        self.verify_stage(&mut outcome, file)?;
        Ok(outcome)
    }

    /// Quick check, hash probe and reduction. Populates the match set.
    pub fn scan_stage(
        &self,
        outcome: &mut Outcome,
        file: &LoadedFile,
        options: AnalyzerOptions,
    ) -> Result<(), ScanError> {
        if outcome.is_scanned {
            return Ok(());
        }
        self.scanner.health()?;
        let oracle = self.oracle();
        outcome.scanner_name = self.scanner.name().to_string();
        outcome.scan_time = Some(Utc::now());

        let detected = oracle.detects(file.as_oracle_bytes(), file.filename())?;
        if !detected {
            warn!(
                filename = file.filename(),
                scanner = self.scanner.name(),
                "Quick check: file is not detected"
            );
            outcome.is_detected = false;
            outcome.is_scanned = true;
            outcome.appraisal = Appraisal::Undetected;
            outcome.oracle_calls = self.calls.get();
            return Ok(());
        }
        info!(
            filename = file.filename(),
            scanner = self.scanner.name(),
            "Quick check: file is detected"
        );
        outcome.is_detected = true;

        // Defeat hash signatures before spending many scans on binary search
        if is_hash_signature(file, &oracle)? {
            info!("Quick check: signature is hash based");
            outcome.is_scanned = true;
            outcome.appraisal = Appraisal::Hash;
            outcome.oracle_calls = self.calls.get();
            return Ok(());
        }

        info!("Scanning for matches");
        let (matches, scanner_info) = analyze(file, &oracle, options)?;
        info!(count = matches.len(), "Reduction finished");

        // The reducer's branches only mean anything if the original bytes
        // are still detected. A flaky oracle would otherwise yield
        // spurious matches.
        let still_detected = oracle.detects(file.as_oracle_bytes(), file.filename())?;
        if !still_detected {
            warn!("Oracle inconsistent: original bytes no longer detected, abandoning run");
            outcome.matches = Vec::new();
            outcome.scanner_info = scanner_info;
            outcome.appraisal = Appraisal::Unknown;
            outcome.is_scanned = true;
            outcome.oracle_calls = self.calls.get();
            return Ok(());
        }

        outcome.matches = matches;
        outcome.scanner_info = scanner_info;
        outcome.is_scanned = true;
        outcome.oracle_calls = self.calls.get();
        Ok(())
    }

    /// Verification runs and the whole-file appraisal
    pub fn verify_stage(&self, outcome: &mut Outcome, file: &LoadedFile) -> Result<(), ScanError> {
        if outcome.is_verified {
            return Ok(());
        }
        self.scanner.health()?;
        let oracle = self.oracle();

        info!("Verifying matches");
        let verification = verify(file, &outcome.matches, &oracle)?;

        let all = verification.conclusions.status.len();
        let bad = verification.conclusions.count(VerifyStatus::Bad);
        let good_or_ok = verification.conclusions.count(VerifyStatus::Good)
            + verification.conclusions.count(VerifyStatus::Ok);

        outcome.appraisal = if all > 0 && bad == all {
            Appraisal::OrSig
        } else if good_or_ok == 1 {
            Appraisal::One
        } else if good_or_ok > 1 {
            Appraisal::AndSig
        } else {
            Appraisal::Unknown
        };
        info!(appraisal = %outcome.appraisal, "Verification finished");

        outcome.verification = verification;
        outcome.is_verified = true;
        outcome.oracle_calls = self.calls.get();
        Ok(())
    }
}

/// Identity record for the oracle-visible bytes
fn file_info(file: &LoadedFile) -> FileInfo {
    let bytes = file.as_oracle_bytes();
    FileInfo {
        name: file.filename().to_string(),
        size: bytes.len(),
        sha256: hex::encode(Sha256::digest(bytes)),
        ident: file.kind().ident().to_string(),
    }
}
