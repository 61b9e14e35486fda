#![no_main]

use certservice_provisioner::{assemble, CertificatesResponse};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(response) = serde_json::from_slice::<CertificatesResponse>(data) {
        let _ = assemble(&response.certificate_chain);
        let _ = assemble(&response.trusted_certificates);
    }
});
