//! Configuration loaded from JSON drives the listing.

use crate::common::{create_temp_file, fixture};
use pelisting::formats::pe::ImageReader;
use pelisting::listing::build_listing;
use pelisting::{ListingConfig, ListingError};

#[test]
fn partial_file_keeps_defaults() {
    let file = create_temp_file(br#"{"render": {"indent_char": "*"}}"#);
    let config = ListingConfig::from_json_file(file.path()).unwrap();

    assert_eq!(config.render.indent_char, '*');
    assert_eq!(config.render.indent_width, 4);
    assert!(config.disasm.annotate_bytes);
    assert_eq!(config.limits, ListingConfig::default().limits);
}

#[test]
fn render_options_reach_the_listing() {
    let file = create_temp_file(
        br#"{
            "render": {"indent_width": 1, "indent_char": "|", "entry_point_label": "start"},
            "disasm": {"annotate_bytes": false}
        }"#,
    );
    let config = ListingConfig::from_json_file(file.path()).unwrap();

    let data = fixture::image();
    let reader = ImageReader::new(&data).unwrap();
    let text = build_listing(&reader, &config);
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "|0x1000: start");
    assert_eq!(lines[1], "|        Section[1]: .text");
    assert_eq!(lines[2], "|        push ebp");
    // No byte line before the next address
    assert!(lines[3].starts_with("|0x1001:"));
}

#[test]
fn tight_limits_fail_imports() {
    let config = ListingConfig::from_json_str(r#"{"limits": {"max_name_length": 4}}"#).unwrap();
    let data = fixture::image();
    let reader = ImageReader::with_limits(&data, config.limits).unwrap();
    assert!(reader.imports().is_err());
}

#[test]
fn invalid_json() {
    let file = create_temp_file(b"{ not json");
    let err = ListingConfig::from_json_file(file.path()).unwrap_err();
    assert!(matches!(err, ListingError::Config(_)));
}

#[test]
fn missing_file() {
    let err = ListingConfig::from_json_file("/nonexistent/pelisting.json").unwrap_err();
    assert!(matches!(err, ListingError::StdIo(_)));
}
