//! Static PE32 parsing and annotated disassembly listings.
//!
//! `formats::pe::ImageReader` parses the header and section table and
//! translates between virtual and raw addresses. The `listing` module sweeps
//! executable sections with an `InstructionDecoder`, collects labels,
//! cross-references and import names in an `AddressWriter`, and renders the
//! result. `report` ties the pieces into the five output documents.

/// Core data types module
pub mod core;

pub mod config;
pub mod disasm;
pub mod error;
pub mod formats;
pub mod io;
pub mod listing;
pub mod logging;
pub mod report;

pub use crate::config::ListingConfig;
pub use crate::core::address::{AddressPointer, AddressSpace};
pub use crate::core::segment::{ArraySegment, ByteSegment};
pub use crate::error::{ListingError, Result};
pub use crate::formats::pe::{ImageReader, PeError, PeErrorKind};
pub use crate::listing::{AddressWriter, build_listing};
pub use crate::report::Report;
