//! PE header parsing

use std::fmt;

use memchr::memmem;

use crate::formats::pe::types::*;
use crate::formats::pe::utils::{FieldCursor, ReadExt};

/// Locate the `PE\0\0` signature by scanning the whole buffer.
pub fn find_pe_signature(data: &[u8]) -> Result<usize> {
    memmem::find(data, &PE_SIGNATURE).ok_or(PeError::SignatureNotFound)
}

fn fixed_record(data: &[u8], offset: usize, size: usize) -> Result<&[u8]> {
    data.read_slice_at(offset, size)
        .ok_or(PeError::TruncatedHeader {
            expected: offset.saturating_add(size),
            actual: data.len(),
        })
}

// Only reachable if a record shorter than its declared size slips through.
fn short_record(offset: usize, data: &[u8]) -> PeError {
    PeError::TruncatedHeader {
        expected: offset,
        actual: data.len(),
    }
}

/// Parse the COFF header (signature included) at offset
pub fn parse_coff_header(data: &[u8], offset: usize) -> Result<CoffHeader> {
    let record = fixed_record(data, offset, COFF_HEADER_SIZE)?;
    let mut c = FieldCursor::new(record);
    let mut read = || -> Option<CoffHeader> {
        Some(CoffHeader {
            signature: c.u32()?,
            machine: Machine::from(c.u16()?),
            number_of_sections: c.u16()?,
            time_date_stamp: c.u32()?,
            pointer_to_symbol_table: c.u32()?,
            number_of_symbols: c.u32()?,
            size_of_optional_header: c.u16()?,
            characteristics: c.u16()?,
        })
    };
    read().ok_or_else(|| short_record(offset, data))
}

/// Parse the optional header standard fields at offset
pub fn parse_standard_fields(data: &[u8], offset: usize) -> Result<StandardFields> {
    let record = fixed_record(data, offset, STANDARD_FIELDS_SIZE)?;
    let magic = record
        .read_u16_le_at(0)
        .ok_or_else(|| short_record(offset, data))?;
    if magic != PE32_MAGIC {
        return Err(PeError::UnsupportedMagic(magic));
    }

    let mut c = FieldCursor::new(record);
    let mut read = || -> Option<StandardFields> {
        Some(StandardFields {
            magic: c.u16()?,
            major_linker_version: c.u8()?,
            minor_linker_version: c.u8()?,
            size_of_code: c.u32()?,
            size_of_initialized_data: c.u32()?,
            size_of_uninitialized_data: c.u32()?,
            address_of_entry_point: c.u32()?,
            base_of_code: c.u32()?,
            base_of_data: c.u32()?,
        })
    };
    read().ok_or_else(|| short_record(offset, data))
}

/// Parse the optional header Windows-specific fields at offset
pub fn parse_windows_fields(data: &[u8], offset: usize) -> Result<WindowsFields> {
    let record = fixed_record(data, offset, WINDOWS_FIELDS_SIZE)?;
    let mut c = FieldCursor::new(record);
    let mut read = || -> Option<WindowsFields> {
        Some(WindowsFields {
            image_base: c.u32()?,
            section_alignment: c.u32()?,
            file_alignment: c.u32()?,
            major_operating_system_version: c.u16()?,
            minor_operating_system_version: c.u16()?,
            major_image_version: c.u16()?,
            minor_image_version: c.u16()?,
            major_subsystem_version: c.u16()?,
            minor_subsystem_version: c.u16()?,
            win32_version_value: c.u32()?,
            size_of_image: c.u32()?,
            size_of_headers: c.u32()?,
            check_sum: c.u32()?,
            subsystem: Subsystem::from(c.u16()?),
            dll_characteristics: c.u16()?,
            size_of_stack_reserve: c.u32()?,
            size_of_stack_commit: c.u32()?,
            size_of_heap_reserve: c.u32()?,
            size_of_heap_commit: c.u32()?,
            loader_flags: c.u32()?,
            number_of_rva_and_sizes: c.u32()?,
        })
    };
    read().ok_or_else(|| short_record(offset, data))
}

/// Parse the 15 named data directories and trailing padding at offset
pub fn parse_data_directories(data: &[u8], offset: usize) -> Result<DataDirectories> {
    let record = fixed_record(data, offset, DATA_DIRECTORIES_SIZE)?;
    let mut c = FieldCursor::new(record);
    let mut directories = DataDirectories::default();

    for entry in directories.entries.iter_mut() {
        let rva = c.u32().ok_or_else(|| short_record(offset, data))?;
        let size = c.u32().ok_or_else(|| short_record(offset, data))?;
        *entry = DataDirectory { rva, size };
    }
    directories.padding = c.u64().ok_or_else(|| short_record(offset, data))?;

    Ok(directories)
}

/// Parse the full fixed-layout header starting at the signature offset
pub fn parse_pe_header(data: &[u8], offset: usize) -> Result<PeHeader> {
    // Check the whole structure fits before reading any part of it
    fixed_record(data, offset, PE_HEADER_SIZE)?;

    let coff_header = parse_coff_header(data, offset)?;
    let standard_offset = offset + COFF_HEADER_SIZE;
    let standard_fields = parse_standard_fields(data, standard_offset)?;
    let windows_offset = standard_offset + STANDARD_FIELDS_SIZE;
    let windows_fields = parse_windows_fields(data, windows_offset)?;
    let data_directories = parse_data_directories(data, windows_offset + WINDOWS_FIELDS_SIZE)?;

    Ok(PeHeader {
        coff_header,
        standard_fields,
        windows_fields,
        data_directories,
    })
}

/// Parse `count` section-table records starting at offset
pub fn parse_section_declarations(
    data: &[u8],
    offset: usize,
    count: u16,
) -> Result<Vec<SectionDeclaration>> {
    let mut declarations = Vec::with_capacity(count as usize);

    for i in 0..count as usize {
        let record_offset = offset + i * SECTION_DECLARATION_SIZE;
        let record = fixed_record(data, record_offset, SECTION_DECLARATION_SIZE)?;
        let mut c = FieldCursor::new(record);
        let mut read = || -> Option<SectionDeclaration> {
            Some(SectionDeclaration {
                name: c.bytes::<8>()?,
                virtual_size: c.u32()?,
                virtual_address: c.u32()?,
                size_of_raw_data: c.u32()?,
                pointer_to_raw_data: c.u32()?,
                pointer_to_relocations: c.u32()?,
                pointer_to_linenumbers: c.u32()?,
                number_of_relocations: c.u16()?,
                number_of_linenumbers: c.u16()?,
                characteristics: SectionCharacteristics::from_bits_retain(c.u32()?),
            })
        };
        declarations.push(read().ok_or_else(|| short_record(record_offset, data))?);
    }

    Ok(declarations)
}

impl fmt::Display for PeHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let coff = &self.coff_header;
        let standard = &self.standard_fields;
        let win = &self.windows_fields;

        writeln!(f, "COFF Header")?;
        writeln!(f, "\tSignature: 0x{:08X}", coff.signature)?;
        writeln!(f, "\tMachine: {:?}", coff.machine)?;
        writeln!(f, "\tNumberOfSections: {}", coff.number_of_sections)?;
        writeln!(f, "\tTimeDateStamp: 0x{:08X}", coff.time_date_stamp)?;
        writeln!(f, "\tPointerToSymbolTable: 0x{:X}", coff.pointer_to_symbol_table)?;
        writeln!(f, "\tNumberOfSymbols: {}", coff.number_of_symbols)?;
        writeln!(f, "\tSizeOfOptionalHeader: 0x{:X}", coff.size_of_optional_header)?;
        writeln!(f, "\tCharacteristics: 0x{:04X}", coff.characteristics)?;

        writeln!(f, "Standard Fields")?;
        writeln!(f, "\tMagic: 0x{:X}", standard.magic)?;
        writeln!(
            f,
            "\tLinkerVersion: {}.{}",
            standard.major_linker_version, standard.minor_linker_version
        )?;
        writeln!(f, "\tSizeOfCode: 0x{:X}", standard.size_of_code)?;
        writeln!(f, "\tSizeOfInitializedData: 0x{:X}", standard.size_of_initialized_data)?;
        writeln!(
            f,
            "\tSizeOfUninitializedData: 0x{:X}",
            standard.size_of_uninitialized_data
        )?;
        writeln!(f, "\tAddressOfEntryPoint: 0x{:X}", standard.address_of_entry_point)?;
        writeln!(f, "\tBaseOfCode: 0x{:X}", standard.base_of_code)?;
        writeln!(f, "\tBaseOfData: 0x{:X}", standard.base_of_data)?;

        writeln!(f, "Windows Fields")?;
        writeln!(f, "\tImageBase: 0x{:X}", win.image_base)?;
        writeln!(f, "\tSectionAlignment: 0x{:X}", win.section_alignment)?;
        writeln!(f, "\tFileAlignment: 0x{:X}", win.file_alignment)?;
        writeln!(
            f,
            "\tOperatingSystemVersion: {}.{}",
            win.major_operating_system_version, win.minor_operating_system_version
        )?;
        writeln!(
            f,
            "\tImageVersion: {}.{}",
            win.major_image_version, win.minor_image_version
        )?;
        writeln!(
            f,
            "\tSubsystemVersion: {}.{}",
            win.major_subsystem_version, win.minor_subsystem_version
        )?;
        writeln!(f, "\tWin32VersionValue: {}", win.win32_version_value)?;
        writeln!(f, "\tSizeOfImage: 0x{:X}", win.size_of_image)?;
        writeln!(f, "\tSizeOfHeaders: 0x{:X}", win.size_of_headers)?;
        writeln!(f, "\tCheckSum: 0x{:X}", win.check_sum)?;
        writeln!(f, "\tSubsystem: {:?}", win.subsystem)?;
        writeln!(f, "\tDllCharacteristics: 0x{:04X}", win.dll_characteristics)?;
        writeln!(f, "\tSizeOfStackReserve: 0x{:X}", win.size_of_stack_reserve)?;
        writeln!(f, "\tSizeOfStackCommit: 0x{:X}", win.size_of_stack_commit)?;
        writeln!(f, "\tSizeOfHeapReserve: 0x{:X}", win.size_of_heap_reserve)?;
        writeln!(f, "\tSizeOfHeapCommit: 0x{:X}", win.size_of_heap_commit)?;
        writeln!(f, "\tLoaderFlags: 0x{:X}", win.loader_flags)?;
        writeln!(f, "\tNumberOfRvaAndSizes: {}", win.number_of_rva_and_sizes)?;

        writeln!(f, "Data Directories")?;
        for (name, dir) in DATA_DIRECTORY_NAMES
            .iter()
            .zip(self.data_directories.entries.iter())
        {
            writeln!(f, "\t{}: rva 0x{:X}, size 0x{:X}", name, dir.rva, dir.size)?;
        }
        Ok(())
    }
}
