//! Common test utilities and helpers.
//!
//! `PeBuilder` synthesizes small PE32 images in memory; `fixture` builds the
//! standard two-section image most integration tests run against.

use std::io::Write;
use tempfile::NamedTempFile;

/// File offset of the `PE\0\0` signature in built images
pub const HEADER_OFFSET: usize = 0x80;
const SECTION_TABLE: usize = HEADER_OFFSET + 248;

/// One section of a synthesized image
pub struct SectionSpec {
    pub name: &'static str,
    pub virtual_address: u32,
    pub virtual_size: u32,
    pub pointer_to_raw_data: u32,
    pub size_of_raw_data: u32,
    pub characteristics: u32,
    pub contents: Vec<u8>,
}

/// Builds a minimal PE32 image: DOS stub, headers, section table, section data.
pub struct PeBuilder {
    entry_point: u32,
    image_base: u32,
    directories: Vec<(usize, u32, u32)>,
    sections: Vec<SectionSpec>,
}

impl PeBuilder {
    pub fn new() -> Self {
        Self {
            entry_point: 0,
            image_base: 0x40_0000,
            directories: Vec::new(),
            sections: Vec::new(),
        }
    }

    pub fn entry_point(mut self, rva: u32) -> Self {
        self.entry_point = rva;
        self
    }

    pub fn image_base(mut self, base: u32) -> Self {
        self.image_base = base;
        self
    }

    pub fn directory(mut self, index: usize, rva: u32, size: u32) -> Self {
        self.directories.push((index, rva, size));
        self
    }

    pub fn section(mut self, section: SectionSpec) -> Self {
        self.sections.push(section);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let end = self
            .sections
            .iter()
            .map(|s| (s.pointer_to_raw_data + s.size_of_raw_data) as usize)
            .max()
            .unwrap_or(0)
            .max(SECTION_TABLE + 40 * self.sections.len());
        let mut data = vec![0u8; end];

        data[0..2].copy_from_slice(b"MZ");
        put_u32(&mut data, 0x3C, HEADER_OFFSET as u32);

        let at = HEADER_OFFSET;
        data[at..at + 4].copy_from_slice(b"PE\0\0");
        put_u16(&mut data, at + 4, 0x14C); // i386
        put_u16(&mut data, at + 6, self.sections.len() as u16);
        put_u16(&mut data, at + 20, 0xE0);
        put_u16(&mut data, at + 22, 0x0102);

        put_u16(&mut data, at + 24, 0x10B);
        put_u32(&mut data, at + 40, self.entry_point);
        put_u32(&mut data, at + 52, self.image_base);
        put_u32(&mut data, at + 56, 0x1000);
        put_u32(&mut data, at + 60, 0x200);
        put_u16(&mut data, at + 92, 3); // console
        put_u32(&mut data, at + 116, 16);

        for &(index, rva, size) in &self.directories {
            put_u32(&mut data, at + 120 + index * 8, rva);
            put_u32(&mut data, at + 124 + index * 8, size);
        }

        for (i, s) in self.sections.iter().enumerate() {
            let entry = SECTION_TABLE + i * 40;
            let name = s.name.as_bytes();
            data[entry..entry + name.len().min(8)].copy_from_slice(&name[..name.len().min(8)]);
            put_u32(&mut data, entry + 8, s.virtual_size);
            put_u32(&mut data, entry + 12, s.virtual_address);
            put_u32(&mut data, entry + 16, s.size_of_raw_data);
            put_u32(&mut data, entry + 20, s.pointer_to_raw_data);
            put_u32(&mut data, entry + 36, s.characteristics);

            let raw = s.pointer_to_raw_data as usize;
            data[raw..raw + s.contents.len()].copy_from_slice(&s.contents);
        }

        data
    }
}

pub fn put_u16(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

pub fn put_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// The standard test image.
///
/// `.text` (RVA 0x1000, file 0x400):
///
/// ```text
/// 1000  push ebp
/// 1001  mov ebp, esp
/// 1003  call 1010
/// 1008  call 1020
/// 100D  pop ebp
/// 100E  ret
/// 100F  int3
/// 1010  jmp 1020                    ; stub
/// 1015  int3 x 11
/// 1020  push 0
/// 1022  call [402060]               ; KERNEL32.dll!ExitProcess
/// 1028  ret
/// 1029  int3 x 23
/// ```
///
/// `.idata` (RVA 0x2000, file 0x600) imports `KERNEL32.dll!ExitProcess`
/// with hint 0x120 through the slot at RVA 0x2060.
pub mod fixture {
    use super::*;

    pub const ENTRY_POINT: u32 = 0x1000;
    pub const IMAGE_BASE: u32 = 0x40_0000;
    pub const TEXT_RVA: u32 = 0x1000;
    pub const TEXT_RAW: u32 = 0x400;
    pub const TEXT_SIZE: u32 = 0x40;
    pub const IDATA_RVA: u32 = 0x2000;
    pub const IDATA_RAW: u32 = 0x600;
    pub const EXIT_PROCESS_SLOT: u32 = 0x2060;
    pub const EXIT_PROCESS_HINT: u16 = 0x120;

    pub fn text() -> Vec<u8> {
        let mut code = vec![0xCC; TEXT_SIZE as usize];
        let body: &[(usize, &[u8])] = &[
            (0x00, &[0x55]),
            (0x01, &[0x8B, 0xEC]),
            (0x03, &[0xE8, 0x08, 0x00, 0x00, 0x00]),
            (0x08, &[0xE8, 0x13, 0x00, 0x00, 0x00]),
            (0x0D, &[0x5D]),
            (0x0E, &[0xC3]),
            (0x10, &[0xE9, 0x0B, 0x00, 0x00, 0x00]),
            (0x20, &[0x6A, 0x00]),
            (0x22, &[0xFF, 0x15, 0x60, 0x20, 0x40, 0x00]),
            (0x28, &[0xC3]),
        ];
        for &(offset, bytes) in body {
            code[offset..offset + bytes.len()].copy_from_slice(bytes);
        }
        code
    }

    /// `.idata` contents; offsets are relative to `IDATA_RVA`.
    pub fn idata() -> Vec<u8> {
        let mut data = vec![0u8; 0x100];
        // Descriptor 0, then an all-zero terminator at 0x14
        put_u32(&mut data, 0x00, 0x2040);
        put_u32(&mut data, 0x0C, 0x2080);
        put_u32(&mut data, 0x10, EXIT_PROCESS_SLOT);
        // Lookup and address tables
        put_u32(&mut data, 0x40, 0x20A0);
        put_u32(&mut data, 0x60, 0x20A0);
        data[0x80..0x8D].copy_from_slice(b"KERNEL32.dll\0");
        put_u16(&mut data, 0xA0, EXIT_PROCESS_HINT);
        data[0xA2..0xAE].copy_from_slice(b"ExitProcess\0");
        data
    }

    pub fn builder() -> PeBuilder {
        PeBuilder::new()
            .entry_point(ENTRY_POINT)
            .image_base(IMAGE_BASE)
            .directory(1, IDATA_RVA, 40)
            .directory(12, EXIT_PROCESS_SLOT, 8)
            .section(SectionSpec {
                name: ".text",
                virtual_address: TEXT_RVA,
                virtual_size: TEXT_SIZE,
                pointer_to_raw_data: TEXT_RAW,
                size_of_raw_data: 0x200,
                characteristics: 0x6000_0020,
                contents: text(),
            })
            .section(SectionSpec {
                name: ".idata",
                virtual_address: IDATA_RVA,
                virtual_size: 0x100,
                pointer_to_raw_data: IDATA_RAW,
                size_of_raw_data: 0x200,
                characteristics: 0xC000_0040,
                contents: idata(),
            })
    }

    pub fn image() -> Vec<u8> {
        builder().build()
    }
}

/// Creates a temporary file with the given content.
pub fn create_temp_file(content: &[u8]) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content).unwrap();
    temp_file
}
