//! Linear-sweep disassembly of executable sections into an `AddressWriter`.

use std::collections::BTreeMap;

use tracing::{debug, info_span, warn};

use crate::config::ListingConfig;
use crate::core::address::AddressPointer;
use crate::disasm::{DecodedInstruction, InstructionDecoder};
use crate::formats::pe::sections::Section;
use crate::formats::pe::utils::hex_bytes;
use crate::formats::pe::ImageReader;
use crate::listing::writer::{
    AddressWriter, BRANCH_LABEL_PREFIX, CODE_CATEGORY, FUNCTION_LABEL_PREFIX,
};

/// Category of the section-name marker at a section's first address
pub const SECTION_CATEGORY: &str = "Section";
pub const XREF_CATEGORY: &str = "XREF";
pub const IMPORT_CATEGORY: &str = "IMPORT";
pub const ERROR_CATEGORY: &str = "ERROR";

const SECTION_PRIORITY: i32 = i32::MAX;
const XREF_PRIORITY: i32 = -1;
const IMPORT_PRIORITY: i32 = -2;
const ERROR_PRIORITY: i32 = -3;

/// Disassemble every executable section, then label the entry point.
///
/// Per-section and per-instruction failures are logged and recorded in the
/// listing; they never stop the sweep.
pub fn disassemble<D: InstructionDecoder + ?Sized>(
    reader: &ImageReader<'_>,
    decoder: &D,
    config: &ListingConfig,
) -> AddressWriter {
    let mut writer = AddressWriter::new();
    let slots = import_slots(reader, config);

    for section in reader.section_table().executable_sections() {
        disassemble_section(section, decoder, &slots, config, &mut writer);
    }

    writer.set_label(reader.entry_point(), config.render.entry_point_label.clone());
    writer
}

/// Absolute import-slot addresses to `dll!function`, when enabled
fn import_slots(reader: &ImageReader<'_>, config: &ListingConfig) -> BTreeMap<u32, String> {
    if !config.disasm.resolve_imports {
        return BTreeMap::new();
    }
    match reader.imports() {
        Ok(table) => table.slot_map(reader.header().image_base()),
        Err(e) => {
            warn!(error = %e, "import table unavailable; indirect calls stay unnamed");
            BTreeMap::new()
        }
    }
}

/// Sweep one section from its first backed byte to its last.
pub fn disassemble_section<D: InstructionDecoder + ?Sized>(
    section: &Section<'_>,
    decoder: &D,
    slots: &BTreeMap<u32, String>,
    config: &ListingConfig,
    writer: &mut AddressWriter,
) {
    let name = section.name();
    let span = info_span!("section", name = %name, decoder = decoder.name());
    let _guard = span.enter();

    let segment = section.backed_segment();
    writer.add_annotation(segment.pointer, name.clone(), SECTION_CATEGORY, SECTION_PRIORITY);

    let bytes = match section.backed_data() {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "section bytes unreadable");
            writer.add_annotation(segment.pointer, e.to_string(), ERROR_CATEGORY, ERROR_PRIORITY);
            return;
        }
    };

    let window = decoder.max_instruction_length().max(1);
    let mut offset = 0usize;
    let mut decoded = 0usize;
    let mut undecodable = 0usize;

    while offset < bytes.len() {
        let pointer = segment.pointer + offset as u32;
        let end = bytes.len().min(offset + window);
        match decoder.decode(pointer.address, &bytes[offset..end]) {
            Ok(instruction) => {
                let length = instruction.length.clamp(1, bytes.len() - offset);
                record_instruction(
                    writer,
                    pointer,
                    &instruction,
                    &bytes[offset..offset + length],
                    slots,
                    config,
                );
                offset += length;
                decoded += 1;
            }
            Err(e) => {
                // Resynchronize one byte further on
                warn!(address = format_args!("0x{:X}", pointer.address), "{}", e);
                writer.add_annotation(
                    pointer,
                    format!("db 0x{:02X}", bytes[offset]),
                    CODE_CATEGORY,
                    0,
                );
                writer.add_annotation(pointer, e.to_string(), ERROR_CATEGORY, ERROR_PRIORITY);
                offset += 1;
                undecodable += 1;
            }
        }
    }

    debug!(decoded, undecodable, size = bytes.len(), "section disassembled");
}

fn record_instruction(
    writer: &mut AddressWriter,
    pointer: AddressPointer,
    instruction: &DecodedInstruction,
    bytes: &[u8],
    slots: &BTreeMap<u32, String>,
    config: &ListingConfig,
) {
    writer.add_annotation(pointer, instruction.text.clone(), CODE_CATEGORY, 0);
    if config.disasm.annotate_bytes {
        writer.add_annotation(pointer, hex_bytes(bytes), CODE_CATEGORY, 0);
    }

    if let Some(address) = instruction.near_branch_target {
        let target = AddressPointer::virtual_address(address);
        writer.add_annotation(
            target,
            format!("0x{:X} ({})", pointer.address, instruction.code),
            XREF_CATEGORY,
            XREF_PRIORITY,
        );
        label_branch_target(writer, target, instruction.is_call);
        writer.set_target(pointer, target);
    }

    if let Some(name) = instruction.memory_target.and_then(|va| slots.get(&va)) {
        writer.add_annotation(pointer, name.clone(), IMPORT_CATEGORY, IMPORT_PRIORITY);
    }
}

/// `FUN_` for call targets, `LAB_` otherwise. A call target stays `FUN_`
/// even when a later jump reaches it.
fn label_branch_target(writer: &mut AddressWriter, target: AddressPointer, is_call: bool) {
    let entry = writer.annotations_mut(target);
    let prefix = if is_call {
        FUNCTION_LABEL_PREFIX
    } else {
        BRANCH_LABEL_PREFIX
    };
    let keep = entry
        .label
        .as_deref()
        .is_some_and(|label| label.starts_with(FUNCTION_LABEL_PREFIX));
    if !keep {
        entry.label = Some(format!("{}{:X}", prefix, target.address));
    }
}
