//! File format adapters
//!
//! An adapter is a view over a loaded file that separates the payload the
//! reducer mutates from the outer bytes the oracle scans. For raw files the
//! two coincide; for container formats the adapter re-wraps a mutated payload
//! into a valid outer file. Adapters guarantee that re-wrapping the original
//! payload reproduces the oracle bytes exactly, so mutated scans differ from
//! the quick-check scan only where the experiment touched the payload.

use std::path::Path;

use tracing::info;

use crate::buffer::ByteBuffer;
use crate::error::ScanError;

pub mod office;
pub mod pe;
pub mod plain;

pub use office::OfficeFile;
pub use pe::PeFile;
pub use plain::PlainFile;

/// Capability interface shared by all file adapters
pub trait FileFormat {
    /// Display filename presented to the oracle
    fn filename(&self) -> &str;

    /// Adapter kind
    fn kind(&self) -> FileKind;

    /// The payload buffer the reducer mutates
    fn data(&self) -> &ByteBuffer;

    /// The full file as presented to the scanner
    fn as_oracle_bytes(&self) -> &[u8];

    /// The full file with the payload replaced by `payload`
    ///
    /// Invariant: `materialize_with(data())` equals `as_oracle_bytes()`
    /// byte-for-byte.
    fn materialize_with(&self, payload: &ByteBuffer) -> Result<Vec<u8>, ScanError>;
}

/// Supported scan target kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FileKind {
    Pe,
    Office,
    Plain,
}

impl FileKind {
    pub fn ident(&self) -> &'static str {
        match self {
            FileKind::Pe => "pe",
            FileKind::Office => "office",
            FileKind::Plain => "plain",
        }
    }

    /// Pick the adapter for a file, magic bytes first, extension as
    /// tie-break (an Office document is a ZIP, so `PK` alone is not enough)
    pub fn detect(filename: &str, header: &[u8]) -> FileKind {
        let lower = filename.to_lowercase();
        if header.len() >= 2 && &header[..2] == b"MZ" {
            return FileKind::Pe;
        }
        let is_zip = header.len() >= 4 && &header[..4] == b"PK\x03\x04";
        if is_zip && has_office_extension(&lower) {
            return FileKind::Office;
        }
        if lower.ends_with(".exe") || lower.ends_with(".dll") {
            return FileKind::Pe;
        }
        if has_office_extension(&lower) {
            return FileKind::Office;
        }
        FileKind::Plain
    }
}

fn has_office_extension(lower: &str) -> bool {
    [".docx", ".docm", ".dotm", ".doc", ".xlsm", ".pptm"]
        .iter()
        .any(|ext| lower.ends_with(ext))
}

/// A loaded file behind the adapter matching its kind
pub enum LoadedFile {
    Plain(PlainFile),
    Pe(PeFile),
    Office(OfficeFile),
}

impl LoadedFile {
    /// Build the right adapter for in-memory bytes
    pub fn from_bytes(filename: &str, bytes: Vec<u8>) -> Result<Self, ScanError> {
        let kind = FileKind::detect(filename, &bytes);
        info!(filename, kind = kind.ident(), "Using adapter");
        match kind {
            FileKind::Pe => Ok(LoadedFile::Pe(PeFile::parse(filename, bytes)?)),
            FileKind::Office => Ok(LoadedFile::Office(OfficeFile::parse(filename, bytes)?)),
            FileKind::Plain => Ok(LoadedFile::Plain(PlainFile::new(filename, bytes))),
        }
    }

    fn inner(&self) -> &dyn FileFormat {
        match self {
            LoadedFile::Plain(f) => f,
            LoadedFile::Pe(f) => f,
            LoadedFile::Office(f) => f,
        }
    }
}

impl FileFormat for LoadedFile {
    fn filename(&self) -> &str {
        self.inner().filename()
    }

    fn kind(&self) -> FileKind {
        self.inner().kind()
    }

    fn data(&self) -> &ByteBuffer {
        self.inner().data()
    }

    fn as_oracle_bytes(&self) -> &[u8] {
        self.inner().as_oracle_bytes()
    }

    fn materialize_with(&self, payload: &ByteBuffer) -> Result<Vec<u8>, ScanError> {
        self.inner().materialize_with(payload)
    }
}

/// Load a file from disk behind the adapter matching its kind
pub fn load_file(path: &Path) -> Result<LoadedFile, ScanError> {
    let bytes = std::fs::read(path)?;
    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    LoadedFile::from_bytes(&filename, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_pe_by_magic() {
        assert_eq!(FileKind::detect("sample.bin", b"MZ\x90\x00"), FileKind::Pe);
    }

    #[test]
    fn test_detect_office_needs_zip_or_extension() {
        let zip_header = [0x50, 0x4B, 0x03, 0x04];
        assert_eq!(FileKind::detect("report.docm", &zip_header), FileKind::Office);
        // A plain ZIP is not an Office document
        assert_eq!(FileKind::detect("backup.zip", &zip_header), FileKind::Plain);
    }

    #[test]
    fn test_detect_plain_fallback() {
        assert_eq!(FileKind::detect("notes.txt", b"hello"), FileKind::Plain);
        assert_eq!(FileKind::detect("script.ps1", &[]), FileKind::Plain);
    }

    #[test]
    fn test_detect_pe_by_extension_without_magic() {
        assert_eq!(FileKind::detect("tool.exe", &[]), FileKind::Pe);
    }

    #[test]
    fn test_load_file_from_disk() {
        use std::io::Write;
        let mut temp = tempfile::NamedTempFile::new().unwrap();
        temp.write_all(b"some plain bytes").unwrap();

        let file = load_file(temp.path()).unwrap();
        assert_eq!(file.kind(), FileKind::Plain);
        assert_eq!(file.data().bytes(), b"some plain bytes");
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = load_file(Path::new("/nonexistent/sample.bin"));
        assert!(matches!(result, Err(ScanError::Io(_))));
    }
}
