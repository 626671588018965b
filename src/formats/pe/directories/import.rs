//! Import table parsing

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, trace};

use crate::config::ParseLimits;
use crate::core::address::AddressPointer;
use crate::core::segment::{ArraySegment, ByteSegment};
use crate::formats::pe::types::*;
use crate::formats::pe::utils::FieldCursor;
use crate::formats::pe::ImageReader;

/// One imported function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionImport {
    /// Function name, or `#<ordinal>` for ordinal imports
    pub name: String,
    /// Export-table hint from the hint/name record
    pub hint: Option<u16>,
    pub ordinal: Option<u16>,
    /// Import-address slot the loader patches; calls go through it
    pub call_site: AddressPointer,
}

impl fmt::Display for FunctionImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.hint, self.ordinal) {
            (Some(hint), _) => write!(f, "{} ({}, hint 0x{:X})", self.name, self.call_site, hint),
            (None, Some(ordinal)) => {
                write!(f, "{} ({}, ordinal {})", self.name, self.call_site, ordinal)
            }
            (None, None) => write!(f, "{} ({})", self.name, self.call_site),
        }
    }
}

/// One imported module and its functions, in descriptor order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageImport {
    pub name: String,
    pub descriptor: ImportDescriptor,
    pub functions: Vec<FunctionImport>,
}

impl fmt::Display for ImageImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} functions imported):",
            self.name,
            self.functions.len()
        )?;
        for function in &self.functions {
            write!(f, "\n\t{}", function)?;
        }
        Ok(())
    }
}

/// Import table containing all imports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportTable {
    /// Span of the descriptor array including its terminator
    pub directory: Option<ByteSegment>,
    pub imports: Vec<ImageImport>,
}

impl ImportTable {
    /// Get total imported function count
    pub fn count(&self) -> usize {
        self.imports.iter().map(|i| i.functions.len()).sum()
    }

    /// Check if a function is imported by name
    pub fn has_import(&self, name: &str) -> bool {
        self.imports
            .iter()
            .any(|i| i.functions.iter().any(|f| f.name == name))
    }

    /// Get imports by DLL name (case-insensitive)
    pub fn imports_from_dll(&self, dll: &str) -> Option<&[FunctionImport]> {
        self.imports
            .iter()
            .find(|i| i.name.eq_ignore_ascii_case(dll))
            .map(|i| i.functions.as_slice())
    }

    /// Map absolute slot VA (image base + slot RVA) to `dll!function`
    pub fn slot_map(&self, image_base: u32) -> BTreeMap<u32, String> {
        let mut map = BTreeMap::new();
        for image in &self.imports {
            for function in &image.functions {
                let va = image_base.wrapping_add(function.call_site.address);
                map.insert(va, format!("{}!{}", image.name, function.name));
            }
        }
        map
    }
}

impl fmt::Display for ImportTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Import Table ({} dlls imported)", self.imports.len())?;
        for image in &self.imports {
            write!(f, "\n\n{}", image)?;
        }
        Ok(())
    }
}

/// Parse the import directory named by the header
pub fn parse_imports(reader: &ImageReader<'_>, limits: &ParseLimits) -> Result<ImportTable> {
    let mut table = ImportTable::default();

    let dir = match reader.header().data_directory(IMAGE_DIRECTORY_ENTRY_IMPORT) {
        Some(dir) if dir.is_present() => dir,
        _ => return Ok(table),
    };

    let start = AddressPointer::virtual_address(dir.rva);
    let section = reader
        .section_for_pointer(start)
        .ok_or(PeError::NoOwningSection { pointer: start })?;
    let section_end = section.backed_segment().end();
    let descriptors = ArraySegment::<ImportDescriptor>::unbounded(start);

    for index in 0..limits.max_import_descriptors {
        let pointer = descriptors
            .element(index)
            .ok_or_else(|| PeError::import("descriptor array overflows the address space"))?;
        if pointer.address as u64 + IMPORT_DESCRIPTOR_SIZE as u64 > section_end as u64 {
            return Err(PeError::import(format!(
                "no terminating descriptor before end of section {}",
                section.name()
            )));
        }

        let record = reader.read_bytes(ByteSegment::new(pointer, IMPORT_DESCRIPTOR_SIZE as u32))?;
        let descriptor = parse_descriptor(record)?;

        if descriptor.is_terminator() {
            table.directory = Some(ByteSegment::new(
                start,
                (index + 1) * IMPORT_DESCRIPTOR_SIZE as u32,
            ));
            debug!(
                modules = table.imports.len(),
                functions = table.count(),
                "parsed import table"
            );
            return Ok(table);
        }

        if descriptor.name == 0 {
            debug!(index, "skipping import descriptor without a name");
            continue;
        }

        table
            .imports
            .push(parse_image_import(reader, descriptor, limits)?);
    }

    Err(PeError::import(format!(
        "more than {} descriptors without a terminator",
        limits.max_import_descriptors
    )))
}

fn parse_descriptor(record: &[u8]) -> Result<ImportDescriptor> {
    let mut c = FieldCursor::new(record);
    let mut read = || -> Option<ImportDescriptor> {
        Some(ImportDescriptor {
            original_first_thunk: c.u32()?,
            time_date_stamp: c.u32()?,
            forwarder_chain: c.u32()?,
            name: c.u32()?,
            first_thunk: c.u32()?,
        })
    };
    read().ok_or_else(|| PeError::import("short import descriptor"))
}

fn parse_image_import(
    reader: &ImageReader<'_>,
    descriptor: ImportDescriptor,
    limits: &ParseLimits,
) -> Result<ImageImport> {
    let name = reader.read_cstring(
        AddressPointer::virtual_address(descriptor.name),
        limits.max_name_length,
    )?;

    // OriginalFirstThunk when present, else the IAT itself
    let lookup_rva = if descriptor.original_first_thunk != 0 {
        descriptor.original_first_thunk
    } else {
        descriptor.first_thunk
    };

    let functions = if lookup_rva == 0 {
        Vec::new()
    } else {
        parse_thunks(reader, lookup_rva, descriptor.first_thunk, limits)?
    };

    trace!(dll = %name, functions = functions.len(), "parsed import descriptor");

    Ok(ImageImport {
        name,
        descriptor,
        functions,
    })
}

fn parse_thunks(
    reader: &ImageReader<'_>,
    lookup_rva: u32,
    first_thunk: u32,
    limits: &ParseLimits,
) -> Result<Vec<FunctionImport>> {
    let lookup = ArraySegment::<u32>::unbounded(AddressPointer::virtual_address(lookup_rva));
    let slots = ArraySegment::<u32>::unbounded(AddressPointer::virtual_address(first_thunk));

    let section = reader
        .section_for_pointer(lookup.pointer)
        .ok_or(PeError::NoOwningSection {
            pointer: lookup.pointer,
        })?;
    let section_end = section.backed_segment().end() as u64;

    let mut functions = Vec::new();

    for index in 0..limits.max_thunks_per_import {
        let overflow = || PeError::import("thunk array overflows the address space");
        let pointer = lookup.element(index).ok_or_else(overflow)?;
        if pointer.address as u64 + lookup.element_size() as u64 > section_end {
            return Err(PeError::import(format!(
                "thunk array at 0x{:X} runs past end of section {}",
                lookup_rva,
                section.name()
            )));
        }

        let value = reader.read_u32(pointer)?;
        if value == 0 {
            return Ok(functions);
        }

        let call_site = slots.element(index).ok_or_else(overflow)?;
        check_slot(reader, first_thunk, call_site)?;

        if value & IMAGE_ORDINAL_FLAG32 != 0 {
            let ordinal = (value & 0xFFFF) as u16;
            functions.push(FunctionImport {
                name: format!("#{}", ordinal),
                hint: None,
                ordinal: Some(ordinal),
                call_site,
            });
            continue;
        }

        // A hint/name record inside the thunks walked so far would loop
        if value >= lookup_rva && (value as u64) < pointer.address as u64 + 4 {
            return Err(PeError::import(format!(
                "self-referential thunk at {}",
                pointer
            )));
        }

        let record = AddressPointer::virtual_address(value);
        let hint = reader.read_u16(record)?;
        let name_pointer = record
            .checked_add(2)
            .ok_or_else(|| PeError::import("hint/name record overflows the address space"))?;
        let name = reader.read_cstring(name_pointer, limits.max_function_name_length)?;

        functions.push(FunctionImport {
            name,
            hint: Some(hint),
            ordinal: None,
            call_site,
        });
    }

    Err(PeError::import(format!(
        "more than {} thunks at 0x{:X}",
        limits.max_thunks_per_import, lookup_rva
    )))
}

/// The slot a call goes through must be a real IAT entry inside a section
fn check_slot(reader: &ImageReader<'_>, first_thunk: u32, slot: AddressPointer) -> Result<()> {
    if first_thunk == 0 {
        return Err(PeError::import(
            "descriptor names functions but has no import address table",
        ));
    }
    let section = reader.section_for_pointer(slot).ok_or_else(|| {
        PeError::import(format!("import address slot {} outside every section", slot))
    })?;
    if slot.address as u64 + 4 > section.virtual_segment().end() as u64 {
        return Err(PeError::import(format!(
            "import address slot {} runs past end of section {}",
            slot,
            section.name()
        )));
    }
    Ok(())
}
