#![no_main]

use certservice_provisioner::properties::unsupported_properties;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = unsupported_properties(data);
});
