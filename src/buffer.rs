//! Mutable payload buffer with patch, fill and swap operations
//!
//! Every reduction and verification experiment runs against an owned copy of
//! this buffer; the file adapter then re-wraps the copy into the bytes the
//! scanner actually sees.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Fill strategy used when hiding a byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillKind {
    /// 0x00 repeated
    Null,
    /// 0x20 repeated
    Space,
    /// Cryptographic random bytes
    HighEntropy,
    /// Base64 of random bytes, truncated to size. Printable output with low
    /// structural entropy, useful when zero bytes themselves trip a signature.
    LowEntropy,
}

/// Owned octet sequence the reducer and verifier mutate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteBuffer {
    data: Vec<u8>,
}

impl ByteBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        ByteBuffer { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Borrow the half-open range `[start, end)`, clamped to the buffer
    pub fn range(&self, start: usize, end: usize) -> &[u8] {
        let end = end.min(self.data.len());
        let start = start.min(end);
        &self.data[start..end]
    }

    /// Overwrite bytes at `offset` with `replace`, length-preserving
    pub fn overwrite(&mut self, offset: usize, replace: &[u8]) -> Result<(), String> {
        let end = offset
            .checked_add(replace.len())
            .ok_or_else(|| "Patch range overflows".to_string())?;
        if end > self.data.len() {
            return Err(format!(
                "Patch of {} bytes at offset {} exceeds buffer length {}",
                replace.len(),
                offset,
                self.data.len()
            ));
        }
        self.data[offset..end].copy_from_slice(replace);
        Ok(())
    }

    /// Overwrite `size` bytes at `offset` with the given fill strategy
    pub fn fill(&mut self, offset: usize, size: usize, kind: FillKind) -> Result<(), String> {
        let fill = match kind {
            FillKind::Null => vec![0u8; size],
            FillKind::Space => vec![0x20u8; size],
            FillKind::HighEntropy => {
                let mut buf = vec![0u8; size];
                rand::thread_rng().fill_bytes(&mut buf);
                buf
            }
            FillKind::LowEntropy => {
                let mut raw = vec![0u8; size];
                rand::thread_rng().fill_bytes(&mut raw);
                let mut encoded = BASE64.encode(&raw).into_bytes();
                encoded.truncate(size);
                encoded
            }
        };
        self.overwrite(offset, &fill)
    }

    /// Swap two non-overlapping spans in place. The spans may have different
    /// sizes; the bytes between them shift accordingly and the total length
    /// is preserved.
    pub fn swap(
        &mut self,
        a_off: usize,
        a_size: usize,
        b_off: usize,
        b_size: usize,
    ) -> Result<(), String> {
        // Normalize so `a` comes first
        let (a_off, a_size, b_off, b_size) = if a_off <= b_off {
            (a_off, a_size, b_off, b_size)
        } else {
            (b_off, b_size, a_off, a_size)
        };
        let a_end = a_off
            .checked_add(a_size)
            .ok_or_else(|| "Swap range overflows".to_string())?;
        let b_end = b_off
            .checked_add(b_size)
            .ok_or_else(|| "Swap range overflows".to_string())?;
        if a_end > b_off {
            return Err(format!(
                "Swap ranges overlap: [{}, {}) and [{}, {})",
                a_off, a_end, b_off, b_end
            ));
        }
        if b_end > self.data.len() {
            return Err(format!(
                "Swap range [{}, {}) exceeds buffer length {}",
                b_off,
                b_end,
                self.data.len()
            ));
        }

        let mut rebuilt = Vec::with_capacity(self.data.len());
        rebuilt.extend_from_slice(&self.data[..a_off]);
        rebuilt.extend_from_slice(&self.data[b_off..b_end]);
        rebuilt.extend_from_slice(&self.data[a_end..b_off]);
        rebuilt.extend_from_slice(&self.data[a_off..a_end]);
        rebuilt.extend_from_slice(&self.data[b_end..]);
        self.data = rebuilt;
        Ok(())
    }
}
