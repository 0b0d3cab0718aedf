//! sigsift - Signature Localization Library
//!
//! Given an opaque scanner that answers "detected / not detected" for a byte
//! sequence, this library locates the byte ranges inside a file that cause
//! the detection, classifies how those ranges combine, and reports the
//! result as a structured [`Outcome`].
//!
//! ## Pipeline
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  Pipeline (pipeline.rs)                                    │
//! │   health check → quick check → hash probe → analysis       │
//! │   → verification → appraisal                               │
//! ├────────────────────────────────────────────────────────────┤
//! │  Analysis (analyzer.rs, reducer.rs, probe.rs)              │
//! │   - PE: per-section probes narrow the search space         │
//! │   - recursive halving localizes signature ranges           │
//! ├────────────────────────────────────────────────────────────┤
//! │  Format Adapters (formats/)                                │
//! │   ┌──────────┬────────┬───────────┐                        │
//! │   │ plain.rs │ pe.rs  │ office.rs │                        │
//! │   └──────────┴────────┴───────────┘                        │
//! ├────────────────────────────────────────────────────────────┤
//! │  Oracle (scanner.rs)                                       │
//! │   - pattern.rs: local pattern engine                       │
//! │   - rest.rs: HTTP scanning service client (feature)        │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use sigsift::{load_file, AnalyzerOptions, PatternScanner, Pipeline};
//!
//! # fn main() -> Result<(), sigsift::ScanError> {
//! let file = load_file(std::path::Path::new("sample.exe"))?;
//! let scanner = PatternScanner::any("demo", vec![b"EVIL".to_vec()]);
//! let pipeline = Pipeline::new(&scanner);
//! let outcome = pipeline.run(&file, AnalyzerOptions::default())?;
//! println!("{}: {}", outcome.file_info.name, outcome.appraisal);
//! # Ok(())
//! # }
//! ```
//!
//! All oracle calls are sequential; scanners commonly rate-limit, and the
//! reducer's branching depends on each previous verdict. Runs can be
//! cancelled cooperatively through [`Pipeline::cancel_token`].

pub mod analyzer;
pub mod buffer;
pub mod common;
pub mod error;
pub mod formats;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod probe;
pub mod reducer;
pub mod scanner;
pub mod verifier;

pub use analyzer::{analyze, AnalyzerOptions};
pub use buffer::{ByteBuffer, FillKind};
pub use error::{RunResult, ScanError};
pub use formats::{load_file, FileFormat, FileKind, LoadedFile, OfficeFile, PeFile, PlainFile};
pub use model::{
    Appraisal, FileInfo, Match, MatchConclusion, MatchModify, MatchOrder, Outcome, ScanResult,
    Verification, VerificationEntry, VerifyStatus,
};
pub use pipeline::Pipeline;
pub use probe::is_hash_signature;
pub use reducer::{Reducer, SIG_SIZE};
pub use scanner::pattern::PatternScanner;
#[cfg(feature = "rest-scanner")]
pub use scanner::rest::RestScanner;
pub use scanner::{CallCounter, CancelToken, Oracle, Scanner};
pub use verifier::verify;
