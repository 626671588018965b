//! PE32 image reader: header, section table and address translation

use std::cell::OnceCell;

use tracing::debug;

pub mod directories;
pub mod headers;
pub mod sections;
pub mod types;
pub mod utils;

use crate::config::ParseLimits;
use crate::core::address::AddressPointer;
use crate::core::segment::ByteSegment;

pub use directories::import::{FunctionImport, ImageImport, ImportTable};
use headers::*;
pub use sections::{Section, SectionTable};
use sections::create_sections;
pub use types::*;
use utils::{read_cstring, ReadExt};

/// Owns the image bytes and resolves addresses against its section table
pub struct ImageReader<'data> {
    data: &'data [u8],
    header_offset: usize,
    header: PeHeader,
    section_table: SectionTable<'data>,
    limits: ParseLimits,

    // Lazy-loaded data
    imports: OnceCell<ImportTable>,
}

impl<'data> ImageReader<'data> {
    /// Create reader with default limits
    pub fn new(data: &'data [u8]) -> Result<Self> {
        Self::with_limits(data, ParseLimits::default())
    }

    /// Create reader with custom limits
    pub fn with_limits(data: &'data [u8], limits: ParseLimits) -> Result<Self> {
        let header_offset = find_pe_signature(data)?;
        let header = parse_pe_header(data, header_offset)?;

        // Section table follows the optional header
        let section_offset = header_offset
            + COFF_HEADER_SIZE
            + header.coff_header.size_of_optional_header as usize;
        let declarations =
            parse_section_declarations(data, section_offset, header.number_of_sections())?;
        let section_table = SectionTable::new(create_sections(declarations, data));

        debug!(
            header_offset,
            sections = section_table.len(),
            entry_point = format_args!("0x{:X}", header.entry_point()),
            "parsed PE32 header"
        );

        Ok(Self {
            data,
            header_offset,
            header,
            section_table,
            limits,
            imports: OnceCell::new(),
        })
    }

    /// The raw image bytes
    pub fn data(&self) -> &'data [u8] {
        self.data
    }

    /// File offset of the `PE\0\0` signature
    pub fn header_offset(&self) -> usize {
        self.header_offset
    }

    pub fn header(&self) -> &PeHeader {
        &self.header
    }

    pub fn limits(&self) -> &ParseLimits {
        &self.limits
    }

    // Section access methods

    pub fn sections(&self) -> &[Section<'data>] {
        self.section_table.sections()
    }

    pub fn section_table(&self) -> &SectionTable<'data> {
        &self.section_table
    }

    /// Find the section containing a pointer in its own space
    pub fn section_for_pointer(&self, pointer: AddressPointer) -> Option<&Section<'data>> {
        self.section_table.section_for_pointer(pointer)
    }

    /// Entry point as a virtual pointer
    pub fn entry_point(&self) -> AddressPointer {
        AddressPointer::virtual_address(self.header.entry_point())
    }

    // Address translation

    /// Translate a virtual pointer to a file offset. Raw pointers pass through.
    ///
    /// Header-region RVAs below the first section are not owned by any
    /// section and fail with `NoOwningSection`.
    pub fn virtual_to_raw(&self, pointer: AddressPointer) -> Result<AddressPointer> {
        if pointer.is_raw() {
            return Ok(pointer);
        }
        let section = self
            .section_for_pointer(pointer)
            .ok_or(PeError::NoOwningSection { pointer })?;
        let decl = &section.declaration;
        let offset = pointer.address - decl.virtual_address;
        decl.pointer_to_raw_data
            .checked_add(offset)
            .map(AddressPointer::raw)
            .ok_or(PeError::NoOwningSection { pointer })
    }

    /// Translate a file offset back to a virtual pointer. Virtual pointers pass through.
    pub fn raw_to_virtual(&self, pointer: AddressPointer) -> Result<AddressPointer> {
        if pointer.is_virtual() {
            return Ok(pointer);
        }
        let section = self
            .section_for_pointer(pointer)
            .ok_or(PeError::NoOwningSection { pointer })?;
        let decl = &section.declaration;
        let offset = pointer.address - decl.pointer_to_raw_data;
        decl.virtual_address
            .checked_add(offset)
            .map(AddressPointer::virtual_address)
            .ok_or(PeError::NoOwningSection { pointer })
    }

    // Reading

    /// Bytes covered by a segment, translated to the file
    pub fn read_bytes(&self, segment: ByteSegment) -> Result<&'data [u8]> {
        let raw = self.virtual_to_raw(segment.pointer)?;
        self.data
            .read_slice_at(raw.address as usize, segment.size as usize)
            .ok_or(PeError::OutOfBounds {
                offset: raw.address as u64,
                len: segment.size as u64,
                available: self.data.len(),
            })
    }

    pub fn read_u16(&self, pointer: AddressPointer) -> Result<u16> {
        let bytes = self.read_bytes(ByteSegment::new(pointer, 2))?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&self, pointer: AddressPointer) -> Result<u32> {
        let bytes = self.read_bytes(ByteSegment::new(pointer, 4))?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a NUL-terminated string of at most `max_len` bytes at a pointer
    pub fn read_cstring(&self, pointer: AddressPointer, max_len: usize) -> Result<String> {
        let raw = self.virtual_to_raw(pointer)?;
        let tail = self
            .data
            .get(raw.address as usize..)
            .ok_or(PeError::OutOfBounds {
                offset: raw.address as u64,
                len: 1,
                available: self.data.len(),
            })?;
        read_cstring(tail, pointer, max_len)
    }

    // Directories

    /// Import table (lazy-loaded)
    pub fn imports(&self) -> Result<&ImportTable> {
        if let Some(imports) = self.imports.get() {
            return Ok(imports);
        }

        let imports = directories::import::parse_imports(self, &self.limits)?;
        Ok(self.imports.get_or_init(|| imports))
    }
}
