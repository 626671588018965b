//! Parsing the standard fixture recovers what was written into it.

use crate::common::fixture;
use pelisting::formats::pe::{ImageReader, Machine, Subsystem};
use pelisting::AddressPointer;

#[test]
fn header_fields() {
    let data = fixture::image();
    let reader = ImageReader::new(&data).unwrap();
    let header = reader.header();

    assert_eq!(reader.header_offset(), crate::common::HEADER_OFFSET);
    assert_eq!(header.entry_point(), fixture::ENTRY_POINT);
    assert_eq!(header.image_base(), fixture::IMAGE_BASE);
    assert_eq!(header.machine(), Machine::I386);
    assert_eq!(header.subsystem(), Subsystem::WindowsCui);
    assert_eq!(header.number_of_sections(), 2);
    assert_eq!(header.data_directories.import().rva, fixture::IDATA_RVA);
    assert_eq!(header.data_directories.import_address().rva, fixture::EXIT_PROCESS_SLOT);
}

#[test]
fn sections() {
    let data = fixture::image();
    let reader = ImageReader::new(&data).unwrap();

    let names: Vec<String> = reader.sections().iter().map(|s| s.name()).collect();
    assert_eq!(names, vec![".text", ".idata"]);

    let executable: Vec<String> = reader
        .section_table()
        .executable_sections()
        .map(|s| s.name())
        .collect();
    assert_eq!(executable, vec![".text"]);
}

#[test]
fn address_translation() {
    let data = fixture::image();
    let reader = ImageReader::new(&data).unwrap();

    let entry = reader.virtual_to_raw(reader.entry_point()).unwrap();
    assert_eq!(entry, AddressPointer::raw(fixture::TEXT_RAW));
    assert_eq!(reader.virtual_to_raw(entry).unwrap(), entry);
    assert_eq!(reader.raw_to_virtual(entry).unwrap(), reader.entry_point());

    let slot = reader
        .virtual_to_raw(AddressPointer::virtual_address(fixture::EXIT_PROCESS_SLOT))
        .unwrap();
    assert_eq!(slot, AddressPointer::raw(fixture::IDATA_RAW + 0x60));
}

#[test]
fn imports() {
    let data = fixture::image();
    let reader = ImageReader::new(&data).unwrap();
    let table = reader.imports().unwrap();

    assert_eq!(table.imports.len(), 1);
    let kernel32 = &table.imports[0];
    assert_eq!(kernel32.name, "KERNEL32.dll");

    let exit = &kernel32.functions[0];
    assert_eq!(exit.name, "ExitProcess");
    assert_eq!(exit.hint, Some(fixture::EXIT_PROCESS_HINT));
    assert_eq!(
        exit.call_site,
        AddressPointer::virtual_address(fixture::EXIT_PROCESS_SLOT)
    );
}

#[test]
fn imports_are_cached() {
    let data = fixture::image();
    let reader = ImageReader::new(&data).unwrap();
    let first = reader.imports().unwrap() as *const _;
    let second = reader.imports().unwrap() as *const _;
    assert_eq!(first, second);
}
