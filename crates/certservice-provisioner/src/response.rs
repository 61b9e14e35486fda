//! Assembly of CA responses into PEM byte streams.

use crate::{Error, Result};
use pem::{EncodeConfig, LineEnding, Pem};
use serde::{Deserialize, Serialize};

/// PEM block type written for every assembled certificate.
pub const CERTIFICATE_PEM_TAG: &str = "CERTIFICATE";

/// Successful body of the CertService certificate endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificatesResponse {
    /// Issued certificate chain, leaf first.
    pub certificate_chain: Vec<String>,
    /// Trust anchors, independently ordered.
    pub trusted_certificates: Vec<String>,
}

/// Error body of the CertService API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ErrorResponse {
    pub error_message: String,
}

/// Decodes each PEM string and re-encodes it as a `CERTIFICATE` block.
///
/// Input order is preserved. An empty input yields an empty buffer.
///
/// # Errors
///
/// Returns [`Error::ResponseParse`] naming the index of the first entry
/// that holds no PEM block.
pub fn assemble(pem_strings: &[String]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();

    for (index, entry) in pem_strings.iter().enumerate() {
        let block = pem::parse(entry).map_err(|e| {
            Error::ResponseParse(format!("certificate at index {index} is not PEM: {e}"))
        })?;
        let encoded = pem::encode_config(
            &Pem::new(CERTIFICATE_PEM_TAG, block.into_contents()),
            EncodeConfig::new().set_line_ending(LineEnding::LF),
        );
        buffer.extend_from_slice(encoded.as_bytes());
    }

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pem_block(contents: &[u8]) -> String {
        pem::encode(&Pem::new(CERTIFICATE_PEM_TAG, contents.to_vec()))
    }

    #[test]
    fn test_assemble_empty() {
        assert!(assemble(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_assemble_preserves_order() {
        let input = vec![pem_block(b"cert-0"), pem_block(b"cert-1")];
        let output = String::from_utf8(assemble(&input).unwrap()).unwrap();

        let blocks = pem::parse_many(&output).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].contents(), b"cert-0");
        assert_eq!(blocks[1].contents(), b"cert-1");
        assert!(blocks.iter().all(|b| b.tag() == CERTIFICATE_PEM_TAG));
        assert!(output.find("Y2VydC0w").unwrap() < output.find("Y2VydC0x").unwrap());
    }

    #[test]
    fn test_assemble_retags_blocks() {
        let input = vec![pem::encode(&Pem::new("TRUSTED CERTIFICATE", b"cert-2".to_vec()))];
        let output = String::from_utf8(assemble(&input).unwrap()).unwrap();
        assert_eq!(
            output,
            "-----BEGIN CERTIFICATE-----\nY2VydC0y\n-----END CERTIFICATE-----\n"
        );
    }

    #[test]
    fn test_assemble_rejects_non_pem() {
        let input = vec![pem_block(b"cert-0"), "not-pem".to_string()];
        match assemble(&input).unwrap_err() {
            Error::ResponseParse(msg) => assert!(msg.contains("index 1"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_response_json_shape() {
        let body = r#"{"certificateChain":["a","b"],"trustedCertificates":["c"]}"#;
        let response: CertificatesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.certificate_chain, vec!["a", "b"]);
        assert_eq!(response.trusted_certificates, vec!["c"]);

        let error: ErrorResponse =
            serde_json::from_str(r#"{"errorMessage":"RA not found"}"#).unwrap();
        assert_eq!(error.error_message, "RA not found");
    }
}
