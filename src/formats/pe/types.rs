//! Core PE data types and structures

use bitflags::bitflags;
use std::fmt;

use crate::core::address::AddressPointer;
use crate::core::segment::WireElement;

// PE constants
pub const PE_SIGNATURE: [u8; 4] = *b"PE\0\0";
pub const PE32_MAGIC: u16 = 0x10B;
pub const PE32PLUS_MAGIC: u16 = 0x20B;

// Wire sizes (1-byte packing, no implicit padding)
pub const COFF_HEADER_SIZE: usize = 24;
pub const STANDARD_FIELDS_SIZE: usize = 28;
pub const WINDOWS_FIELDS_SIZE: usize = 68;
pub const DATA_DIRECTORIES_SIZE: usize = 128;
pub const PE_HEADER_SIZE: usize =
    COFF_HEADER_SIZE + STANDARD_FIELDS_SIZE + WINDOWS_FIELDS_SIZE + DATA_DIRECTORIES_SIZE;
pub const SECTION_DECLARATION_SIZE: usize = 40;
pub const IMPORT_DESCRIPTOR_SIZE: usize = 20;

// Data directory indices
pub const IMAGE_DIRECTORY_ENTRY_EXPORT: usize = 0;
pub const IMAGE_DIRECTORY_ENTRY_IMPORT: usize = 1;
pub const IMAGE_DIRECTORY_ENTRY_RESOURCE: usize = 2;
pub const IMAGE_DIRECTORY_ENTRY_EXCEPTION: usize = 3;
pub const IMAGE_DIRECTORY_ENTRY_SECURITY: usize = 4;
pub const IMAGE_DIRECTORY_ENTRY_BASERELOC: usize = 5;
pub const IMAGE_DIRECTORY_ENTRY_DEBUG: usize = 6;
pub const IMAGE_DIRECTORY_ENTRY_ARCHITECTURE: usize = 7;
pub const IMAGE_DIRECTORY_ENTRY_GLOBALPTR: usize = 8;
pub const IMAGE_DIRECTORY_ENTRY_TLS: usize = 9;
pub const IMAGE_DIRECTORY_ENTRY_LOAD_CONFIG: usize = 10;
pub const IMAGE_DIRECTORY_ENTRY_BOUND_IMPORT: usize = 11;
pub const IMAGE_DIRECTORY_ENTRY_IAT: usize = 12;
pub const IMAGE_DIRECTORY_ENTRY_DELAY_IMPORT: usize = 13;
pub const IMAGE_DIRECTORY_ENTRY_COM_DESCRIPTOR: usize = 14;
pub const NAMED_DATA_DIRECTORIES: usize = 15;

pub const DATA_DIRECTORY_NAMES: [&str; NAMED_DATA_DIRECTORIES] = [
    "ExportTable",
    "ImportTable",
    "ResourceTable",
    "ExceptionTable",
    "CertificateTable",
    "BaseRelocationTable",
    "Debug",
    "Architecture",
    "GlobalPtr",
    "TLSTable",
    "LoadConfigTable",
    "BoundImport",
    "ImportAddressTable",
    "DelayImportDescriptor",
    "CLRRuntimeHeader",
];

/// Thunk entries with this bit set import by ordinal.
pub const IMAGE_ORDINAL_FLAG32: u32 = 0x8000_0000;

bitflags! {
    /// Section characteristics flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SectionCharacteristics: u32 {
        const CNT_CODE = 0x0000_0020;
        const CNT_INITIALIZED_DATA = 0x0000_0040;
        const CNT_UNINITIALIZED_DATA = 0x0000_0080;
        const LNK_INFO = 0x0000_0200;
        const LNK_REMOVE = 0x0000_0800;
        const LNK_COMDAT = 0x0000_1000;
        const GPREL = 0x0000_8000;
        const LNK_NRELOC_OVFL = 0x0100_0000;
        const MEM_DISCARDABLE = 0x0200_0000;
        const MEM_NOT_CACHED = 0x0400_0000;
        const MEM_NOT_PAGED = 0x0800_0000;
        const MEM_SHARED = 0x1000_0000;
        const MEM_EXECUTE = 0x2000_0000;
        const MEM_READ = 0x4000_0000;
        const MEM_WRITE = 0x8000_0000;
    }
}

/// Broad classification of a `PeError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeErrorKind {
    /// Signature not found or a fixed-size structure does not fit
    MalformedHeader,
    /// Pointer outside every section or outside the buffer
    InvalidAddress,
    /// Import directory cannot be walked safely
    MalformedImportTable,
}

/// PE parsing error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeError {
    SignatureNotFound,
    TruncatedHeader { expected: usize, actual: usize },
    UnsupportedMagic(u16),
    NoOwningSection { pointer: AddressPointer },
    OutOfBounds { offset: u64, len: u64, available: usize },
    MalformedImportTable { reason: String },
    InvalidString { pointer: AddressPointer },
}

impl PeError {
    pub fn kind(&self) -> PeErrorKind {
        match self {
            Self::SignatureNotFound | Self::TruncatedHeader { .. } | Self::UnsupportedMagic(_) => {
                PeErrorKind::MalformedHeader
            }
            Self::NoOwningSection { .. } | Self::OutOfBounds { .. } => PeErrorKind::InvalidAddress,
            Self::MalformedImportTable { .. } | Self::InvalidString { .. } => {
                PeErrorKind::MalformedImportTable
            }
        }
    }

    pub(crate) fn import(reason: impl Into<String>) -> Self {
        Self::MalformedImportTable {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for PeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignatureNotFound => write!(f, "Malformed header: PE signature not found"),
            Self::TruncatedHeader { expected, actual } => {
                write!(
                    f,
                    "Malformed header: expected {} bytes, got {}",
                    expected, actual
                )
            }
            Self::UnsupportedMagic(m) => {
                write!(f, "Malformed header: unsupported optional header magic 0x{:04x}", m)
            }
            Self::NoOwningSection { pointer } => {
                write!(f, "Invalid address: no section contains {}", pointer)
            }
            Self::OutOfBounds {
                offset,
                len,
                available,
            } => write!(
                f,
                "Invalid address: {} bytes at offset 0x{:x} exceed buffer of {} bytes",
                len, offset, available
            ),
            Self::MalformedImportTable { reason } => {
                write!(f, "Malformed import table: {}", reason)
            }
            Self::InvalidString { pointer } => {
                write!(f, "Malformed import table: unterminated string at {}", pointer)
            }
        }
    }
}

impl std::error::Error for PeError {}

pub type Result<T> = std::result::Result<T, PeError>;

/// Machine types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Machine {
    Unknown,
    I386,   // 0x014c
    X86_64, // 0x8664
    Arm,    // 0x01c0
    Arm64,  // 0xaa64
    ArmNT,  // 0x01c4
    IA64,   // 0x0200
    EBC,    // 0x0ebc
    Other(u16),
}

impl From<u16> for Machine {
    fn from(value: u16) -> Self {
        match value {
            0x014c => Self::I386,
            0x8664 => Self::X86_64,
            0x01c0 => Self::Arm,
            0xaa64 => Self::Arm64,
            0x01c4 => Self::ArmNT,
            0x0200 => Self::IA64,
            0x0ebc => Self::EBC,
            0 => Self::Unknown,
            other => Self::Other(other),
        }
    }
}

/// Subsystem types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsystem {
    Unknown,
    Native,                 // 1
    WindowsGui,             // 2
    WindowsCui,             // 3
    Os2Cui,                 // 5
    PosixCui,               // 7
    WindowsCeGui,           // 9
    EfiApplication,         // 10
    EfiBootServiceDriver,   // 11
    EfiRuntimeDriver,       // 12
    EfiRom,                 // 13
    Xbox,                   // 14
    WindowsBootApplication, // 16
    Other(u16),
}

impl From<u16> for Subsystem {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::Unknown,
            1 => Self::Native,
            2 => Self::WindowsGui,
            3 => Self::WindowsCui,
            5 => Self::Os2Cui,
            7 => Self::PosixCui,
            9 => Self::WindowsCeGui,
            10 => Self::EfiApplication,
            11 => Self::EfiBootServiceDriver,
            12 => Self::EfiRuntimeDriver,
            13 => Self::EfiRom,
            14 => Self::Xbox,
            16 => Self::WindowsBootApplication,
            other => Self::Other(other),
        }
    }
}

/// COFF header including the leading signature (24 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoffHeader {
    pub signature: u32,
    pub machine: Machine,
    pub number_of_sections: u16,
    pub time_date_stamp: u32,
    pub pointer_to_symbol_table: u32,
    pub number_of_symbols: u32,
    pub size_of_optional_header: u16,
    pub characteristics: u16,
}

/// Optional header standard fields (28 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardFields {
    pub magic: u16,
    pub major_linker_version: u8,
    pub minor_linker_version: u8,
    pub size_of_code: u32,
    pub size_of_initialized_data: u32,
    pub size_of_uninitialized_data: u32,
    pub address_of_entry_point: u32,
    pub base_of_code: u32,
    pub base_of_data: u32,
}

/// Optional header Windows-specific fields (68 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowsFields {
    pub image_base: u32,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub major_operating_system_version: u16,
    pub minor_operating_system_version: u16,
    pub major_image_version: u16,
    pub minor_image_version: u16,
    pub major_subsystem_version: u16,
    pub minor_subsystem_version: u16,
    pub win32_version_value: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub check_sum: u32,
    pub subsystem: Subsystem,
    pub dll_characteristics: u16,
    pub size_of_stack_reserve: u32,
    pub size_of_stack_commit: u32,
    pub size_of_heap_reserve: u32,
    pub size_of_heap_commit: u32,
    pub loader_flags: u32,
    pub number_of_rva_and_sizes: u32,
}

/// Data directory entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataDirectory {
    pub rva: u32,
    pub size: u32,
}

impl DataDirectory {
    pub fn is_present(&self) -> bool {
        self.rva != 0 && self.size > 0
    }
}

/// The 15 named data directories plus trailing padding (128 bytes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataDirectories {
    pub entries: [DataDirectory; NAMED_DATA_DIRECTORIES],
    pub padding: u64,
}

impl DataDirectories {
    pub fn get(&self, index: usize) -> Option<&DataDirectory> {
        self.entries.get(index)
    }

    pub fn import(&self) -> DataDirectory {
        self.entries[IMAGE_DIRECTORY_ENTRY_IMPORT]
    }

    pub fn import_address(&self) -> DataDirectory {
        self.entries[IMAGE_DIRECTORY_ENTRY_IAT]
    }
}

/// The fixed-layout PE32 header starting at the signature (248 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeHeader {
    pub coff_header: CoffHeader,
    pub standard_fields: StandardFields,
    pub windows_fields: WindowsFields,
    pub data_directories: DataDirectories,
}

impl PeHeader {
    pub fn entry_point(&self) -> u32 {
        self.standard_fields.address_of_entry_point
    }

    pub fn image_base(&self) -> u32 {
        self.windows_fields.image_base
    }

    pub fn machine(&self) -> Machine {
        self.coff_header.machine
    }

    pub fn subsystem(&self) -> Subsystem {
        self.windows_fields.subsystem
    }

    pub fn number_of_sections(&self) -> u16 {
        self.coff_header.number_of_sections
    }

    /// Data directory by index, honoring `number_of_rva_and_sizes`.
    pub fn data_directory(&self, index: usize) -> Option<DataDirectory> {
        if index as u64 >= self.windows_fields.number_of_rva_and_sizes as u64 {
            return None;
        }
        self.data_directories.get(index).copied()
    }
}

/// Raw section-table record (40 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionDeclaration {
    pub name: [u8; 8],
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub pointer_to_relocations: u32,
    pub pointer_to_linenumbers: u32,
    pub number_of_relocations: u16,
    pub number_of_linenumbers: u16,
    pub characteristics: SectionCharacteristics,
}

impl WireElement for SectionDeclaration {
    const SIZE: u32 = SECTION_DECLARATION_SIZE as u32;
}

impl SectionDeclaration {
    /// Section name with NUL padding trimmed.
    pub fn name(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(8);
        String::from_utf8_lossy(&self.name[..end]).to_string()
    }

    pub fn is_executable(&self) -> bool {
        self.characteristics
            .contains(SectionCharacteristics::MEM_EXECUTE)
    }

    pub fn is_readable(&self) -> bool {
        self.characteristics.contains(SectionCharacteristics::MEM_READ)
    }

    pub fn is_writable(&self) -> bool {
        self.characteristics
            .contains(SectionCharacteristics::MEM_WRITE)
    }

    pub fn contains_code(&self) -> bool {
        self.characteristics.contains(SectionCharacteristics::CNT_CODE)
    }
}

/// Import directory descriptor (20 bytes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportDescriptor {
    pub original_first_thunk: u32,
    pub time_date_stamp: u32,
    pub forwarder_chain: u32,
    pub name: u32,
    pub first_thunk: u32,
}

impl WireElement for ImportDescriptor {
    const SIZE: u32 = IMPORT_DESCRIPTOR_SIZE as u32;
}

impl ImportDescriptor {
    pub fn is_terminator(&self) -> bool {
        *self == Self::default()
    }
}
