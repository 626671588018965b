//! Section management for PE files

use std::fmt;

use crate::core::address::{AddressPointer, AddressSpace};
use crate::core::segment::ByteSegment;
use crate::formats::pe::types::*;
use crate::formats::pe::utils::ReadExt;

/// A section-table entry bound to the file bytes it describes.
#[derive(Debug, Clone, Copy)]
pub struct Section<'data> {
    pub declaration: SectionDeclaration,
    file: &'data [u8],
}

impl<'data> Section<'data> {
    pub fn new(declaration: SectionDeclaration, file: &'data [u8]) -> Self {
        Self { declaration, file }
    }

    pub fn name(&self) -> String {
        self.declaration.name()
    }

    pub fn is_executable(&self) -> bool {
        self.declaration.is_executable()
    }

    /// Mapped size; linkers that leave `virtual_size` zero get the raw size.
    fn mapped_size(&self) -> u32 {
        match self.declaration.virtual_size {
            0 => self.declaration.size_of_raw_data,
            size => size,
        }
    }

    /// `[virtual_address, virtual_address + virtual_size)` in the virtual space.
    pub fn virtual_segment(&self) -> ByteSegment {
        ByteSegment::new(
            AddressPointer::virtual_address(self.declaration.virtual_address),
            self.mapped_size(),
        )
    }

    /// `[pointer_to_raw_data, pointer_to_raw_data + size_of_raw_data)` in the raw space.
    pub fn raw_segment(&self) -> ByteSegment {
        ByteSegment::new(
            AddressPointer::raw(self.declaration.pointer_to_raw_data),
            self.declaration.size_of_raw_data,
        )
    }

    /// Virtual span backed by file bytes: the part worth disassembling.
    pub fn backed_segment(&self) -> ByteSegment {
        ByteSegment::new(
            AddressPointer::virtual_address(self.declaration.virtual_address),
            self.mapped_size().min(self.declaration.size_of_raw_data),
        )
    }

    /// Check the span that matches the pointer's space.
    pub fn contains_pointer(&self, pointer: AddressPointer) -> bool {
        match pointer.space {
            AddressSpace::Virtual => self.virtual_segment().contains(pointer),
            AddressSpace::Raw => self.raw_segment().contains(pointer),
        }
    }

    /// File bytes behind `backed_segment`.
    pub fn backed_data(&self) -> Result<&'data [u8]> {
        let offset = self.declaration.pointer_to_raw_data;
        let size = self.backed_segment().size;
        self.file
            .read_slice_at(offset as usize, size as usize)
            .ok_or(PeError::OutOfBounds {
                offset: offset as u64,
                len: size as u64,
                available: self.file.len(),
            })
    }
}

impl fmt::Display for Section<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let decl = &self.declaration;
        let flags: Vec<&str> = decl
            .characteristics
            .iter_names()
            .map(|(name, _)| name)
            .collect();

        writeln!(f, "{}", self.name())?;
        writeln!(f, "\t{}", self.virtual_segment())?;
        writeln!(f, "\t{}", self.raw_segment())?;
        writeln!(
            f,
            "\tRelocations: {} at 0x{:X}",
            decl.number_of_relocations, decl.pointer_to_relocations
        )?;
        writeln!(
            f,
            "\tLinenumbers: {} at 0x{:X}",
            decl.number_of_linenumbers, decl.pointer_to_linenumbers
        )?;
        write!(
            f,
            "\tCharacteristics: 0x{:08X} ({})",
            decl.characteristics.bits(),
            flags.join(" | ")
        )
    }
}

/// Section table for address resolution
#[derive(Debug, Clone, Default)]
pub struct SectionTable<'data> {
    sections: Vec<Section<'data>>,
}

impl<'data> SectionTable<'data> {
    /// Create a new section table, keeping file order
    pub fn new(sections: Vec<Section<'data>>) -> Self {
        Self { sections }
    }

    /// Get all sections
    pub fn sections(&self) -> &[Section<'data>] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Find section by name
    pub fn section_by_name(&self, name: &str) -> Option<&Section<'data>> {
        self.sections.iter().find(|s| s.name() == name)
    }

    /// Find the section whose span (in the pointer's space) contains it
    pub fn section_for_pointer(&self, pointer: AddressPointer) -> Option<&Section<'data>> {
        self.sections.iter().find(|s| s.contains_pointer(pointer))
    }

    /// Get executable sections in file order
    pub fn executable_sections(&self) -> impl Iterator<Item = &Section<'data>> {
        self.sections.iter().filter(|s| s.is_executable())
    }
}

/// Bind parsed declarations to the file bytes
pub fn create_sections(declarations: Vec<SectionDeclaration>, file: &[u8]) -> Vec<Section<'_>> {
    declarations
        .into_iter()
        .map(|declaration| Section::new(declaration, file))
        .collect()
}
