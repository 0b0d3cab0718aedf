//! Office document adapter
//!
//! The scanned payload is the VBA macro stream (`word/vbaProject.bin`)
//! inside the ZIP container. Re-wrapping copies every other entry raw, so
//! their compressed bytes, flags and timestamps survive, and writes the
//! replacement macro with the stored compression method and timestamp.
//!
//! An arbitrary input ZIP cannot be reproduced bit-for-bit by any writer,
//! so the adapter canonicalizes at load time: the oracle-visible bytes are
//! the container re-emitted once with the original macro. From then on
//! `materialize_with(data())` equals `as_oracle_bytes()` exactly, and a
//! mutated scan differs from the quick-check only inside the macro entry.

use std::io::{Cursor, Write};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::buffer::ByteBuffer;
use crate::error::ScanError;

use super::{FileFormat, FileKind};

/// Payload path inside the container
pub const MACRO_PATH: &str = "word/vbaProject.bin";

/// Adapter for archive-packaged Office documents with VBA macros
#[derive(Clone)]
pub struct OfficeFile {
    filename: String,
    /// Original container bytes, source of the raw entry copies
    container: Vec<u8>,
    /// Canonical container with the original macro, as the oracle sees it
    oracle_bytes: Vec<u8>,
    payload: ByteBuffer,
    macro_method: CompressionMethod,
    macro_mtime: Option<zip::DateTime>,
}

impl OfficeFile {
    /// Parse a document from owned bytes, extracting the macro stream
    pub fn parse(filename: &str, bytes: Vec<u8>) -> Result<Self, ScanError> {
        let mut archive = ZipArchive::new(Cursor::new(&bytes[..]))
            .map_err(|e| ScanError::UnsupportedFile(format!("Not a valid ZIP container: {}", e)))?;

        let (macro_bytes, macro_method, macro_mtime) = {
            let mut entry = archive.by_name(MACRO_PATH).map_err(|_| {
                ScanError::UnsupportedFile(format!("No {} entry in container", MACRO_PATH))
            })?;
            let mut data = Vec::with_capacity(entry.size() as usize);
            std::io::copy(&mut entry, &mut data)
                .map_err(|e| ScanError::UnsupportedFile(format!("Macro stream unreadable: {}", e)))?;
            (data, entry.compression(), entry.last_modified())
        };

        debug!(
            filename,
            macro_size = macro_bytes.len(),
            method = ?macro_method,
            "Extracted macro stream"
        );

        let mut file = OfficeFile {
            filename: filename.to_string(),
            container: bytes,
            oracle_bytes: Vec::new(),
            payload: ByteBuffer::new(macro_bytes),
            macro_method,
            macro_mtime,
        };
        // Canonicalize: the oracle sees the container as this writer emits it
        file.oracle_bytes = file.rebuild(file.payload.bytes())?;
        Ok(file)
    }

    /// Re-emit the container with the macro entry replaced by `payload`
    fn rebuild(&self, payload: &[u8]) -> Result<Vec<u8>, ScanError> {
        let zip_err =
            |e: zip::result::ZipError| ScanError::UnsupportedFile(format!("ZIP rebuild failed: {}", e));

        let mut reader =
            ZipArchive::new(Cursor::new(&self.container[..])).map_err(zip_err)?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for index in 0..reader.len() {
            let entry = reader.by_index_raw(index).map_err(zip_err)?;
            if entry.name() == MACRO_PATH {
                continue;
            }
            writer.raw_copy_file(entry).map_err(zip_err)?;
        }

        let mut options = SimpleFileOptions::default().compression_method(self.macro_method);
        if let Some(mtime) = self.macro_mtime {
            options = options.last_modified_time(mtime);
        }
        writer.start_file(MACRO_PATH, options).map_err(zip_err)?;
        writer.write_all(payload)?;

        let cursor = writer.finish().map_err(zip_err)?;
        Ok(cursor.into_inner())
    }
}

impl FileFormat for OfficeFile {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn kind(&self) -> FileKind {
        FileKind::Office
    }

    fn data(&self) -> &ByteBuffer {
        &self.payload
    }

    fn as_oracle_bytes(&self) -> &[u8] {
        &self.oracle_bytes
    }

    fn materialize_with(&self, payload: &ByteBuffer) -> Result<Vec<u8>, ScanError> {
        self.rebuild(payload.bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::FillKind;

    fn build_docx(macro_bytes: &[u8]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        writer.start_file("[Content_Types].xml", stored).unwrap();
        writer.write_all(b"<Types/>").unwrap();
        writer.start_file("word/document.xml", stored).unwrap();
        writer.write_all(b"<document/>").unwrap();
        writer.start_file(MACRO_PATH, stored).unwrap();
        writer.write_all(macro_bytes).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_extracts_macro_payload() {
        let docx = build_docx(b"Attribute VB_Name EVIL");
        let file = OfficeFile::parse("doc.docm", docx).unwrap();
        assert_eq!(file.data().bytes(), b"Attribute VB_Name EVIL");
    }

    #[test]
    fn test_materialize_round_trip() {
        let docx = build_docx(b"macro body");
        let file = OfficeFile::parse("doc.docm", docx).unwrap();
        assert_eq!(
            file.materialize_with(file.data()).unwrap(),
            file.as_oracle_bytes()
        );
    }

    #[test]
    fn test_materialize_substitutes_macro_only() {
        let docx = build_docx(b"AAAABBBBCCCC");
        let file = OfficeFile::parse("doc.docm", docx).unwrap();

        let mut mutated = file.data().clone();
        mutated.fill(4, 4, FillKind::Null).unwrap();
        let bytes = file.materialize_with(&mutated).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(&bytes[..])).unwrap();
        {
            let mut entry = archive.by_name(MACRO_PATH).unwrap();
            let mut data = Vec::new();
            std::io::copy(&mut entry, &mut data).unwrap();
            assert_eq!(data, b"AAAA\0\0\0\0CCCC");
        }
        {
            let mut entry = archive.by_name("word/document.xml").unwrap();
            let mut data = Vec::new();
            std::io::copy(&mut entry, &mut data).unwrap();
            assert_eq!(data, b"<document/>");
        }
    }

    #[test]
    fn test_rejects_container_without_macro() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        writer.start_file("word/document.xml", stored).unwrap();
        writer.write_all(b"<document/>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        assert!(OfficeFile::parse("doc.docm", bytes).is_err());
    }

    #[test]
    fn test_rejects_non_zip() {
        assert!(OfficeFile::parse("doc.docm", b"plain text".to_vec()).is_err());
    }
}
