//! Raw file adapter: the scanned content is the file

use crate::buffer::ByteBuffer;
use crate::error::ScanError;

use super::{FileFormat, FileKind};

/// Adapter for files scanned as-is
#[derive(Clone)]
pub struct PlainFile {
    filename: String,
    payload: ByteBuffer,
}

impl PlainFile {
    pub fn new(filename: &str, bytes: Vec<u8>) -> Self {
        PlainFile {
            filename: filename.to_string(),
            payload: ByteBuffer::new(bytes),
        }
    }
}

impl FileFormat for PlainFile {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn kind(&self) -> FileKind {
        FileKind::Plain
    }

    fn data(&self) -> &ByteBuffer {
        &self.payload
    }

    fn as_oracle_bytes(&self) -> &[u8] {
        self.payload.bytes()
    }

    fn materialize_with(&self, payload: &ByteBuffer) -> Result<Vec<u8>, ScanError> {
        Ok(payload.bytes().to_vec())
    }
}
