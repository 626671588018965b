//! Annotated disassembly listing.
//!
//! `driver` sweeps executable sections and records what it finds in an
//! `AddressWriter`; `render` turns the table into text.

pub mod driver;
pub mod render;
pub mod writer;

pub use driver::disassemble;
pub use writer::{AddressAnnotations, AddressWriter, Category};

use crate::config::ListingConfig;
use crate::disasm::IcedDecoder;
use crate::formats::pe::ImageReader;

/// Disassemble with the x86 decoder and render the listing.
pub fn build_listing(reader: &ImageReader<'_>, config: &ListingConfig) -> String {
    let writer = disassemble(reader, &IcedDecoder::new(), config);
    writer.render(&config.render)
}
