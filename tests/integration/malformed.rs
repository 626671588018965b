//! Corrupt and truncated input yields errors, never panics.

use crate::common::{fixture, put_u32, HEADER_OFFSET};
use pelisting::formats::pe::ImageReader;
use pelisting::report::{DISASSEMBLY, HEADER, IMPORTS, SECTIONS};
use pelisting::{ListingConfig, PeError, PeErrorKind, Report};

#[test]
fn missing_signature_is_malformed_header() {
    let mut data = fixture::image();
    data[HEADER_OFFSET..HEADER_OFFSET + 4].copy_from_slice(b"XX\0\0");

    let err = ImageReader::new(&data).err().unwrap();
    assert_eq!(err, PeError::SignatureNotFound);
    assert_eq!(err.kind(), PeErrorKind::MalformedHeader);
}

#[test]
fn empty_input() {
    let err = ImageReader::new(&[0u8; 0]).err().unwrap();
    assert_eq!(err.kind(), PeErrorKind::MalformedHeader);
}

#[test]
fn signature_without_room_for_header() {
    let mut data = vec![0u8; 0x100];
    data[0xF0..0xF4].copy_from_slice(b"PE\0\0");
    let err = ImageReader::new(&data).err().unwrap();
    assert!(matches!(err, PeError::TruncatedHeader { .. }));
}

#[test]
fn pe32_plus_is_rejected() {
    let mut data = fixture::image();
    data[HEADER_OFFSET + 24..HEADER_OFFSET + 26].copy_from_slice(&0x20Bu16.to_le_bytes());
    let err = ImageReader::new(&data).err().unwrap();
    assert_eq!(err, PeError::UnsupportedMagic(0x20B));
}

#[test]
fn every_truncation_is_handled() {
    let data = fixture::image();
    let config = ListingConfig::default();
    for len in (0..data.len()).step_by(7) {
        let prefix = &data[..len];
        if let Ok(reader) = ImageReader::new(prefix) {
            let _ = reader.imports();
        }
        let report = Report::build(prefix, &config);
        assert_eq!(report.documents().len(), 5);
    }
}

#[test]
fn import_failure_leaves_other_documents() {
    let mut data = fixture::image();
    // Point the only name-lookup entry back at the lookup table itself
    put_u32(&mut data, (fixture::IDATA_RAW + 0x40) as usize, 0x2040);

    let report = Report::build(&data, &ListingConfig::default());
    let imports = report.document(IMPORTS).unwrap();
    assert!(imports.is_error());
    assert!(imports.text().starts_with("error: Malformed import table"));

    for name in [HEADER, SECTIONS, DISASSEMBLY] {
        assert!(!report.document(name).unwrap().is_error(), "{} failed", name);
    }
}

#[test]
fn import_directory_outside_sections() {
    let mut data = fixture::image();
    put_u32(&mut data, HEADER_OFFSET + 128, 0x9000);

    let reader = ImageReader::new(&data).unwrap();
    let err = reader.imports().unwrap_err();
    assert_eq!(err.kind(), PeErrorKind::InvalidAddress);
}

#[test]
fn section_data_past_end_of_file() {
    let mut data = fixture::image();
    // Move .text's raw data beyond the buffer
    let text_entry = HEADER_OFFSET + 248;
    put_u32(&mut data, text_entry + 20, 0x10_0000);

    let reader = ImageReader::new(&data).unwrap();
    assert!(reader.sections()[0].backed_data().is_err());

    let report = Report::build(&data, &ListingConfig::default());
    let listing = report.document(DISASSEMBLY).unwrap().text();
    assert!(listing.contains("ERROR[1]: Invalid address"));
}
