#![no_main]
use fabric_core::fablob::Fablob;
use fabric_core::validation::validate;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Feed arbitrary bytes to the snapshot decoder.
    // Must not panic -- returning Err is fine.
    if let Ok(fabric) = Fablob::from_bytes(data.to_vec()).to_fabric() {
        let _ = validate(&fabric);
        let _ = Fablob::from_fabric(&fabric);
    }
});
