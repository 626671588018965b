#![no_main]
use libfuzzer_sys::fuzz_target;
use pelisting::formats::pe::ImageReader;

fuzz_target!(|data: &[u8]| {
    if let Ok(reader) = ImageReader::new(data) {
        let _ = reader.imports();
        for section in reader.sections() {
            let _ = reader.read_bytes(section.backed_segment());
        }
    }
});
