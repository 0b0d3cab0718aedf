// Shared binary reading utilities for header parsers
//
// Provides consistent little-endian reading from in-memory buffers

/// Read u16 little-endian at specific offset
pub fn read_u16_at(data: &[u8], offset: usize) -> Result<u16, String> {
    let bytes = data
        .get(offset..offset + 2)
        .ok_or_else(|| format!("Failed to read u16 at offset {}", offset))?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Read u32 little-endian at specific offset
pub fn read_u32_at(data: &[u8], offset: usize) -> Result<u32, String> {
    let bytes = data
        .get(offset..offset + 4)
        .ok_or_else(|| format!("Failed to read u32 at offset {}", offset))?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Convert bytes to null-terminated string
pub fn bytes_to_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).to_string()
}
