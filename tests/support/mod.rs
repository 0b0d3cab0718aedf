//! Shared fixtures for integration tests: synthetic PE images and Office
//! containers with known content.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Minimal PE32+ image with the given named sections, raw data aligned to
/// 0x200. Enough structure for the PE adapter to parse headers and sections.
pub fn build_pe(sections: &[(&str, &[u8])]) -> Vec<u8> {
    const FILE_ALIGN: usize = 0x200;
    const SECT_ALIGN: u32 = 0x1000;
    let opt_size = 240usize;
    let headers_len = 0x80 + 4 + 20 + opt_size + sections.len() * 40;
    let size_of_headers = headers_len.div_ceil(FILE_ALIGN) * FILE_ALIGN;

    let mut image = vec![0u8; size_of_headers];
    image[0] = b'M';
    image[1] = b'Z';
    image[0x3C..0x40].copy_from_slice(&0x80u32.to_le_bytes());
    image[0x80..0x84].copy_from_slice(b"PE\0\0");

    // COFF header
    let coff = 0x84;
    image[coff..coff + 2].copy_from_slice(&0x8664u16.to_le_bytes()); // x86_64
    image[coff + 2..coff + 4].copy_from_slice(&(sections.len() as u16).to_le_bytes());
    image[coff + 16..coff + 18].copy_from_slice(&(opt_size as u16).to_le_bytes());
    image[coff + 18..coff + 20].copy_from_slice(&0x0022u16.to_le_bytes());

    // Optional header, PE32+
    let opt = coff + 20;
    image[opt..opt + 2].copy_from_slice(&0x020Bu16.to_le_bytes());
    let win = opt + 24;
    image[win..win + 8].copy_from_slice(&0x1_4000_0000u64.to_le_bytes()); // image base
    image[win + 8..win + 12].copy_from_slice(&SECT_ALIGN.to_le_bytes());
    image[win + 12..win + 16].copy_from_slice(&(FILE_ALIGN as u32).to_le_bytes());
    let size_of_image = SECT_ALIGN * (sections.len() as u32 + 1);
    image[win + 32..win + 36].copy_from_slice(&size_of_image.to_le_bytes());
    image[win + 36..win + 40].copy_from_slice(&(size_of_headers as u32).to_le_bytes());
    image[win + 44..win + 46].copy_from_slice(&3u16.to_le_bytes()); // console subsystem
    image[win + 84..win + 88].copy_from_slice(&16u32.to_le_bytes()); // rva-and-size count

    // Section headers and raw data
    let mut raw_offset = size_of_headers;
    for (i, (name, data)) in sections.iter().enumerate() {
        let hdr = opt + opt_size + i * 40;
        let name_bytes = name.as_bytes();
        image[hdr..hdr + name_bytes.len().min(8)]
            .copy_from_slice(&name_bytes[..name_bytes.len().min(8)]);
        let raw_size = data.len().div_ceil(FILE_ALIGN) * FILE_ALIGN;
        let virt_addr = SECT_ALIGN * (i as u32 + 1);
        image[hdr + 8..hdr + 12].copy_from_slice(&(data.len() as u32).to_le_bytes());
        image[hdr + 12..hdr + 16].copy_from_slice(&virt_addr.to_le_bytes());
        image[hdr + 16..hdr + 20].copy_from_slice(&(raw_size as u32).to_le_bytes());
        image[hdr + 20..hdr + 24].copy_from_slice(&(raw_offset as u32).to_le_bytes());
        image[hdr + 36..hdr + 40].copy_from_slice(&0x40000040u32.to_le_bytes());

        let mut raw = vec![0u8; raw_size];
        raw[..data.len()].copy_from_slice(data);
        image.extend_from_slice(&raw);
        raw_offset += raw_size;
    }

    image
}

/// Minimal DOCX-style container with the macro stream stored uncompressed,
/// so planted patterns stay visible to byte-level oracles.
pub fn build_docx(macro_bytes: &[u8]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    writer.start_file("[Content_Types].xml", stored).unwrap();
    writer.write_all(b"<Types/>").unwrap();
    writer.start_file("word/document.xml", stored).unwrap();
    writer.write_all(b"<w:document/>").unwrap();
    writer.start_file("word/vbaProject.bin", stored).unwrap();
    writer.write_all(macro_bytes).unwrap();
    writer.finish().unwrap().into_inner()
}
