//! Listing produced for the standard fixture.

use crate::common::fixture;
use pelisting::disasm::IcedDecoder;
use pelisting::formats::pe::ImageReader;
use pelisting::listing::{build_listing, disassemble};
use pelisting::{AddressPointer, ListingConfig};

fn va(address: u32) -> AddressPointer {
    AddressPointer::virtual_address(address)
}

fn listing() -> String {
    let data = fixture::image();
    let reader = ImageReader::new(&data).unwrap();
    build_listing(&reader, &ListingConfig::default())
}

fn line_starting<'a>(text: &'a str, prefix: &str) -> &'a str {
    text.lines()
        .find(|l| l.starts_with(prefix))
        .unwrap_or_else(|| panic!("no line starting with {:?} in\n{}", prefix, text))
}

#[test]
fn labels_and_targets() {
    let data = fixture::image();
    let reader = ImageReader::new(&data).unwrap();
    let writer = disassemble(&reader, &IcedDecoder::new(), &ListingConfig::default());

    assert_eq!(writer.label(va(0x1000)), Some("entry_point"));
    assert_eq!(writer.label(va(0x1010)), Some("FUN_1010"));
    // Called once and jumped to once; stays a function
    assert_eq!(writer.label(va(0x1020)), Some("FUN_1020"));

    let stub = writer.get(va(0x1010)).unwrap();
    assert_eq!(stub.target, Some(va(0x1020)));
    assert_eq!(writer.effective_label(stub).as_deref(), Some("THUNK_FUN_1020"));

    let xrefs = &writer.get(va(0x1020)).unwrap().category("XREF").unwrap().entries;
    assert_eq!(
        xrefs,
        &vec![
            "0x1008 (Call_rel32_32)".to_string(),
            "0x1010 (Jmp_rel32_32)".to_string()
        ]
    );
}

#[test]
fn import_call_is_named() {
    let data = fixture::image();
    let reader = ImageReader::new(&data).unwrap();
    let writer = disassemble(&reader, &IcedDecoder::new(), &ListingConfig::default());

    let call = writer.get(va(0x1022)).unwrap();
    assert_eq!(
        call.category("IMPORT").unwrap().entries,
        vec!["KERNEL32.dll!ExitProcess".to_string()]
    );
}

#[test]
fn import_resolution_can_be_disabled() {
    let data = fixture::image();
    let reader = ImageReader::new(&data).unwrap();
    let mut config = ListingConfig::default();
    config.disasm.resolve_imports = false;
    let writer = disassemble(&reader, &IcedDecoder::new(), &config);
    assert!(writer.get(va(0x1022)).unwrap().category("IMPORT").is_none());
}

#[test]
fn rendered_blocks() {
    let text = listing();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "----0x1000: entry_point");
    assert_eq!(lines[1], "----        Section[1]: .text");
    assert_eq!(lines[2], "----        push ebp");
    assert_eq!(lines[3], "----        55");

    assert_eq!(line_starting(&text, "----0x1010:"), "----0x1010: THUNK_FUN_1020");
    assert!(line_starting(&text, "----0x1020:").ends_with("FUN_1020"));
    assert!(text.contains("XREF[2]: 0x1008 (Call_rel32_32)"));
    assert!(text.contains("IMPORT[1]: KERNEL32.dll!ExitProcess"));
    assert!(text.contains("// -> FUN_1020"));
}

#[test]
fn nesting_follows_returns() {
    let text = listing();

    // Inside entry_point until its ret
    assert!(line_starting(&text, "----0x100E:").contains("ret"));
    // Back at depth zero for the padding after it
    assert!(line_starting(&text, "0x100F:").contains("int3"));
    // The stub ends on its jmp
    assert!(line_starting(&text, "0x1015:").contains("int3"));
    // FUN_1020 closes on its ret
    assert!(line_starting(&text, "----0x1028:").contains("ret"));
    assert!(line_starting(&text, "0x1029:").contains("int3"));
}

#[test]
fn deterministic() {
    assert_eq!(listing(), listing());
}
