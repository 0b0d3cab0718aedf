//! Section-aware analysis
//!
//! Entry point for turning a detected file into a set of matches. Plain
//! files and Office payloads reduce over the whole payload. PE files first
//! probe which sections carry the signature, then reduce inside those
//! sections only, falling back to a whole-file reduction when the section
//! probes come up empty.

use tracing::info;

use crate::error::ScanError;
use crate::formats::pe::{PeFile, PeSection, RESOURCES_NAME, VERSION_INFO_NAME};
use crate::formats::{FileFormat, LoadedFile};
use crate::model::{matches_from_intervals, Match};
use crate::reducer::{merge_intervals, Reducer};
use crate::scanner::Oracle;

/// Options recognized by the PE section analyzer
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct AnalyzerOptions {
    /// Probe sections by isolating each (zero all others) instead of
    /// zeroing each in turn
    pub isolate: bool,
    /// Hide resource and version-info data before analysis
    pub remove: bool,
    /// Skip `.text` during per-section reduction
    pub ignore_text: bool,
}

/// Locate matches in a detected file.
///
/// Returns the match set and comma-joined tags describing which strategies
/// ran, for the outcome record.
pub fn analyze(
    file: &LoadedFile,
    oracle: &Oracle,
    options: AnalyzerOptions,
) -> Result<(Vec<Match>, String), ScanError> {
    match file {
        LoadedFile::Pe(pe) => analyze_pe(pe, oracle, options),
        _ => Ok((analyze_whole(file, oracle)?, String::new())),
    }
}

/// Reduce over the entire payload
fn analyze_whole(file: &dyn FileFormat, oracle: &Oracle) -> Result<Vec<Match>, ScanError> {
    let mut reducer = Reducer::new(file, oracle);
    let intervals = reducer.scan(0, file.data().len())?;
    Ok(matches_from_intervals(&intervals))
}

/// Section-aware analysis of a PE file
fn analyze_pe(
    pe: &PeFile,
    oracle: &Oracle,
    options: AnalyzerOptions,
) -> Result<(Vec<Match>, String), ScanError> {
    let mut tags: Vec<&str> = Vec::new();
    let mut work = pe.clone();

    if options.remove {
        info!("Removing resource and version-info data before analysis");
        tags.push("remove-sections");
        work.hide_section(RESOURCES_NAME);
        work.hide_section(VERSION_INFO_NAME);
    }

    let detected_sections = if options.isolate {
        info!("Section probe: isolating sections (zero all others)");
        tags.push("isolate-sections");
        find_detected_sections_isolate(&work, oracle)?
    } else {
        info!("Section probe: zeroing one section at a time");
        tags.push("zero-sections");
        find_detected_sections_zero(&work, oracle)?
    };
    info!(
        count = detected_sections.len(),
        "Sections triggering the scanner independently"
    );
    for section in &detected_sections {
        info!(section = %section.name, "Detected section");
    }

    let mut intervals = Vec::new();
    if detected_sections.is_empty() {
        info!("Section probe found nothing, falling back to whole-file reduction");
        tags.push("flat-scan1");
        let mut reducer = Reducer::new(&work, oracle);
        intervals = reducer.scan(0, work.data().len())?;
    } else {
        for section in &detected_sections {
            // Reducing code may not work well, its bytes are entwined with
            // program semantics
            if options.ignore_text && section.name == ".text" {
                info!(section = %section.name, "Skipping per ignore_text");
                continue;
            }
            info!(section = %section.name, "Reducing section");
            let mut reducer = Reducer::new(&work, oracle);
            intervals.extend(reducer.scan(section.file_offset, section.end())?);
        }

        if intervals.is_empty() {
            info!("Section reduction yielded no matches, falling back to whole-file reduction");
            tags.push("flat-scan2");
            let mut reducer = Reducer::new(&work, oracle);
            intervals = reducer.scan(0, work.data().len())?;
        } else {
            tags.push("section-scan");
        }
    }

    let intervals = merge_intervals(intervals);
    Ok((matches_from_intervals(&intervals), tags.join(",")))
}

/// Zero mode: a section carries (part of) the signature when zeroing it
/// stops detection
fn find_detected_sections_zero(
    pe: &PeFile,
    oracle: &Oracle,
) -> Result<Vec<PeSection>, ScanError> {
    let mut detected = Vec::new();
    for section in pe.sections().iter().filter(|s| s.scannable) {
        let mut copy = pe.clone();
        copy.hide_section(&section.name);
        let status = oracle.detects(copy.as_oracle_bytes(), copy.filename())?;
        info!(section = %section.name, detected = status, "Hide probe");
        if !status {
            detected.push(section.clone());
        }
    }
    Ok(detected)
}

/// Isolate mode: a section alone can trigger detection when it stays
/// detected with every other section zeroed
fn find_detected_sections_isolate(
    pe: &PeFile,
    oracle: &Oracle,
) -> Result<Vec<PeSection>, ScanError> {
    let mut detected = Vec::new();
    for section in pe.sections().iter().filter(|s| s.scannable) {
        let mut copy = pe.clone();
        copy.hide_all_sections_except(&section.name);
        let status = oracle.detects(copy.as_oracle_bytes(), copy.filename())?;
        info!(section = %section.name, detected = status, "Isolate probe");
        if status {
            detected.push(section.clone());
        }
    }
    Ok(detected)
}
