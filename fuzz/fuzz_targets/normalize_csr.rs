#![no_main]

use certservice_provisioner::normalize;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let split = data.first().map_or(0, |&b| b as usize).min(data.len());
    let (csr, key) = data.split_at(split);
    let _ = normalize(csr, key);
});
