//! Report documents for the standard fixture, in memory and on disk.

use crate::common::{create_temp_file, fixture};
use pelisting::io::{load_image, write_report, IOLimits};
use pelisting::report::{DISASSEMBLY, DOCUMENT_NAMES, ENTRY_POINT, HEADER, IMPORTS, SECTIONS};
use pelisting::{ListingConfig, Report};

fn report() -> Report {
    Report::build(&fixture::image(), &ListingConfig::default())
}

#[test]
fn every_document_builds() {
    let report = report();
    let names: Vec<&str> = report.documents().iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, DOCUMENT_NAMES);
    assert!(report.documents().iter().all(|d| !d.is_error()));
}

#[test]
fn entry_point_document() {
    assert_eq!(
        report().document(ENTRY_POINT).unwrap().text(),
        "Entrypoint at section .text\nvirtual address 0x1000\nraw address 0x400"
    );
}

#[test]
fn imports_document() {
    assert_eq!(
        report().document(IMPORTS).unwrap().text(),
        "Import Table (1 dlls imported)\n\n\
         KERNEL32.dll (1 functions imported):\n\
         \tExitProcess (Virtual 0x2060, hint 0x120)"
    );
}

#[test]
fn header_and_sections_documents() {
    let report = report();
    let header = report.document(HEADER).unwrap().text();
    assert!(header.contains("Magic: 0x10B"));

    let sections = report.document(SECTIONS).unwrap().text();
    assert!(sections.contains(".text"));
    assert!(sections.contains(".idata"));
    assert_eq!(sections.split("\n\n").count(), 2);
}

#[test]
fn disassembly_document_is_the_listing() {
    let report = report();
    let listing = report.document(DISASSEMBLY).unwrap().text();
    assert!(listing.starts_with("----0x1000: entry_point\n"));
}

#[test]
fn written_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("output");
    let report = report();

    let written = write_report(&out, &report).unwrap();
    assert_eq!(written.len(), 5);
    for name in DOCUMENT_NAMES {
        let path = out.join(format!("{}.txt", name));
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, report.document(name).unwrap().text());
    }
}

#[test]
fn loaded_from_file() {
    let file = create_temp_file(&fixture::image());
    let data = load_image(file.path(), IOLimits::default()).unwrap();
    assert_eq!(&data[..], &fixture::image()[..]);
    assert_eq!(Report::build(&data, &ListingConfig::default()), report());
}

#[test]
fn oversized_file_is_refused() {
    let file = create_temp_file(&fixture::image());
    assert!(load_image(file.path(), IOLimits::whole_file(16)).is_err());
}
