#![no_main]
use libfuzzer_sys::fuzz_target;
use pelisting::{ListingConfig, Report};

fuzz_target!(|data: &[u8]| {
    let _ = Report::build(data, &ListingConfig::default()).to_string();
});
