//! PE/COFF adapter
//!
//! Owns the file bytes and parses the header with `goblin` once at load
//! time. The payload the reducer mutates is the whole file; what this
//! adapter adds is the section table that lets the analyzer narrow the
//! search, plus in-place section hiding for the zero/isolate probes.
//!
//! The section table is the COFF list with a leading pseudo-section for the
//! header region, which is never scannable (zeroing it would corrupt the
//! binary for reasons unrelated to signatures). The resource data directory
//! and the RT_VERSION leaf are resolved to file ranges so `Resources` and
//! `VersionInfo` can be hidden by name even though they live inside `.rsrc`.
//! Overlay data past the mapped image is not modeled.

use goblin::pe::PE;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::buffer::{ByteBuffer, FillKind};
use crate::common::binary::{bytes_to_string, read_u16_at, read_u32_at};
use crate::error::ScanError;

use super::{FileFormat, FileKind};

/// Resource type id of VS_VERSION_INFO in the resource directory
const RT_VERSION: u32 = 16;

/// Names resolved through the data directories instead of the COFF table
pub const RESOURCES_NAME: &str = "Resources";
pub const VERSION_INFO_NAME: &str = "VersionInfo";

/// One entry of the section table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeSection {
    pub name: String,
    /// Offset of the raw section data in the file
    pub file_offset: usize,
    /// Raw data size, clamped to the file
    pub size: usize,
    pub virtual_address: u32,
    /// Sections whose mutation would corrupt the binary for unrelated
    /// reasons are excluded from analysis
    pub scannable: bool,
}

impl PeSection {
    pub fn end(&self) -> usize {
        self.file_offset + self.size
    }

    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.file_offset && offset < self.end()
    }
}

/// Adapter for PE/COFF executables
#[derive(Clone)]
pub struct PeFile {
    filename: String,
    payload: ByteBuffer,
    sections: Vec<PeSection>,
    is_dotnet: bool,
    resource_range: Option<(usize, usize)>,
    version_range: Option<(usize, usize)>,
}

impl PeFile {
    /// Parse a PE image from owned bytes
    pub fn parse(filename: &str, bytes: Vec<u8>) -> Result<Self, ScanError> {
        let pe = PE::parse(&bytes)
            .map_err(|e| ScanError::UnsupportedFile(format!("Not a valid PE file: {}", e)))?;

        let size_of_headers = pe
            .header
            .optional_header
            .as_ref()
            .map(|oh| oh.windows_fields.size_of_headers as usize)
            .unwrap_or(0)
            .min(bytes.len());

        let mut sections = Vec::with_capacity(pe.sections.len() + 1);
        sections.push(PeSection {
            name: "header".to_string(),
            file_offset: 0,
            size: size_of_headers,
            virtual_address: 0,
            scannable: false,
        });

        for section in &pe.sections {
            let name = section
                .name()
                .map(str::to_string)
                .unwrap_or_else(|_| bytes_to_string(&section.name));
            let file_offset = (section.pointer_to_raw_data as usize).min(bytes.len());
            let size = (section.size_of_raw_data as usize).min(bytes.len() - file_offset);
            sections.push(PeSection {
                name,
                file_offset,
                size,
                virtual_address: section.virtual_address,
                scannable: size > 0 && file_offset > 0,
            });
        }

        let is_dotnet = pe
            .header
            .optional_header
            .as_ref()
            .and_then(|oh| oh.data_directories.get_clr_runtime_header())
            .map(|dir| dir.size > 0)
            .unwrap_or(false);

        let resource_dir = pe
            .header
            .optional_header
            .as_ref()
            .and_then(|oh| oh.data_directories.get_resource_table())
            .copied();

        let resource_range = resource_dir.and_then(|dir| {
            rva_to_offset(dir.virtual_address, &sections).map(|off| {
                let size = (dir.size as usize).min(bytes.len().saturating_sub(off));
                (off, size)
            })
        });

        let version_range = resource_range
            .and_then(|(res_off, _)| find_version_resource(&bytes, res_off, &sections));

        debug!(
            filename,
            section_count = sections.len() - 1,
            is_dotnet,
            has_resources = resource_range.is_some(),
            has_version_info = version_range.is_some(),
            "PE headers parsed"
        );

        Ok(PeFile {
            filename: filename.to_string(),
            payload: ByteBuffer::new(bytes),
            sections,
            is_dotnet,
            resource_range,
            version_range,
        })
    }

    /// The section table, header pseudo-section first
    pub fn sections(&self) -> &[PeSection] {
        &self.sections
    }

    /// Whether the image carries a CLR runtime header (managed binary)
    pub fn is_dotnet(&self) -> bool {
        self.is_dotnet
    }

    pub fn section_by_name(&self, name: &str) -> Option<&PeSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Section containing the given file offset
    pub fn section_for_offset(&self, offset: usize) -> Option<&PeSection> {
        self.sections.iter().find(|s| s.contains(offset))
    }

    /// Resolve a name to the byte range it covers. `Resources` and
    /// `VersionInfo` resolve through the data directories.
    fn range_for_name(&self, name: &str) -> Option<(usize, usize)> {
        match name {
            RESOURCES_NAME => self.resource_range,
            VERSION_INFO_NAME => self.version_range,
            _ => self
                .section_by_name(name)
                .map(|s| (s.file_offset, s.size)),
        }
    }

    /// Zero one section (or named resource range) in place
    pub fn hide_section(&mut self, name: &str) {
        match self.range_for_name(name) {
            Some((offset, size)) if size > 0 => {
                info!(name, offset, size, "Hide section");
                if let Err(e) = self.payload.fill(offset, size, FillKind::Null) {
                    warn!(name, error = %e, "Could not hide section");
                }
            }
            _ => warn!(name, "Section not found, nothing hidden"),
        }
    }

    /// Zero every scannable section except the named one
    pub fn hide_all_sections_except(&mut self, name: &str) {
        let ranges: Vec<(usize, usize)> = self
            .sections
            .iter()
            .filter(|s| s.scannable && s.name != name)
            .map(|s| (s.file_offset, s.size))
            .collect();
        for (offset, size) in ranges {
            if let Err(e) = self.payload.fill(offset, size, FillKind::Null) {
                warn!(offset, size, error = %e, "Could not hide section");
            }
        }
    }
}

impl FileFormat for PeFile {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn kind(&self) -> FileKind {
        FileKind::Pe
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

/// Translate a relative virtual address to a file offset via the section table
fn rva_to_offset(rva: u32, sections: &[PeSection]) -> Option<usize> {
    for section in sections {
        if section.virtual_address == 0 && section.file_offset == 0 {
            // header pseudo-section, identity mapped
            continue;
        }
        let start = section.virtual_address;
        let end = match start.checked_add(section.size as u32) {
            Some(end) => end,
            None => continue,
        };
        if rva >= start && rva < end {
            return Some(section.file_offset + (rva - start) as usize);
        }
    }
    None
}

/// Walk the resource directory to the RT_VERSION data entry and resolve its
/// file range. Returns None when the tree is absent or malformed; version
/// info is an optional target, not a parse requirement.
fn find_version_resource(
    data: &[u8],
    res_off: usize,
    sections: &[PeSection],
) -> Option<(usize, usize)> {
    let named = read_u16_at(data, res_off + 12).ok()? as usize;
    let ids = read_u16_at(data, res_off + 14).ok()? as usize;

    for i in 0..named + ids {
        let entry = res_off + 16 + i * 8;
        let id = read_u32_at(data, entry).ok()?;
        if id != RT_VERSION {
            continue;
        }

        // Descend the name and language levels, taking the first entry each
        let mut node = read_u32_at(data, entry + 4).ok()?;
        for _ in 0..2 {
            if node & 0x8000_0000 == 0 {
                break;
            }
            let sub = res_off + (node & 0x7FFF_FFFF) as usize;
            let entries =
                read_u16_at(data, sub + 12).ok()? as usize + read_u16_at(data, sub + 14).ok()? as usize;
            if entries == 0 {
                return None;
            }
            node = read_u32_at(data, sub + 16 + 4).ok()?;
        }
        if node & 0x8000_0000 != 0 {
            // deeper nesting than the standard three levels
            return None;
        }

        let data_entry = res_off + node as usize;
        let rva = read_u32_at(data, data_entry).ok()?;
        let size = read_u32_at(data, data_entry + 4).ok()? as usize;
        let offset = rva_to_offset(rva, sections)?;
        return Some((offset, size.min(data.len().saturating_sub(offset))));
    }
    None
}
