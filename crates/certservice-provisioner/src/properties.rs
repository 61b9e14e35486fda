//! Reporting of request properties the CertService API ignores.
//!
//! The CA decides validity, key usages, and CA-ness on its own, and it
//! cannot encode IP, URI, or email SANs. It also never sees the subject
//! fields that normalization strips. None of this fails a request, but
//! callers should be told, so these helpers surface each such property.

use crate::csr::{decode_csr_pem, ip_addr, STRIPPED_ATTRIBUTES};
use crate::{Error, Result};
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::prelude::FromDer;

const CERT_SERVICE_NAME: &str = "Cert Service API";

/// Settings a caller asked for alongside the CSR.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestedProperties {
    pub duration: Option<Duration>,
    pub usages: Vec<String>,
    pub is_ca: bool,
}

/// How the CA treats a reported property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Treatment {
    /// The CA replaces the value with its own.
    Overridden,
    /// The CA does not support the property at all.
    Unsupported,
}

/// One property the CA will not honor as requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyNotice {
    pub property: String,
    pub values: Vec<String>,
    pub treatment: Treatment,
}

impl PropertyNotice {
    fn new(property: impl Into<String>, values: Vec<String>, treatment: Treatment) -> Self {
        Self {
            property: property.into(),
            values,
            treatment,
        }
    }
}

impl fmt::Display for PropertyNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self.values.join(", ");
        match self.treatment {
            Treatment::Overridden => write!(
                f,
                "Property '{}' with value: {values}, will be overridden by {CERT_SERVICE_NAME}",
                self.property
            ),
            Treatment::Unsupported => write!(
                f,
                "Property '{}' with value: {values} is not supported by {CERT_SERVICE_NAME}",
                self.property
            ),
        }
    }
}

/// Lists caller-requested settings the CA overrides.
pub fn overridden_properties(requested: &RequestedProperties) -> Vec<PropertyNotice> {
    let mut notices = Vec::new();
    if let Some(duration) = requested.duration.filter(|d| !d.is_zero()) {
        notices.push(PropertyNotice::new(
            "duration",
            vec![format!("{}s", duration.as_secs())],
            Treatment::Overridden,
        ));
    }
    if !requested.usages.is_empty() {
        notices.push(PropertyNotice::new(
            "usages",
            requested.usages.clone(),
            Treatment::Overridden,
        ));
    }
    if requested.is_ca {
        notices.push(PropertyNotice::new(
            "isCA",
            vec!["true".to_string()],
            Treatment::Overridden,
        ));
    }
    notices
}

/// Lists CSR contents the CA API does not support.
///
/// # Errors
///
/// Returns [`Error::CsrDecode`] if `csr_pem` is not a parseable request.
pub fn unsupported_properties(csr_pem: &[u8]) -> Result<Vec<PropertyNotice>> {
    let der = decode_csr_pem(csr_pem)?;
    let (_, request) = X509CertificationRequest::from_der(&der)
        .map_err(|e| Error::CsrDecode(format!("failed to parse certificate request: {e}")))?;

    let mut ip_addresses = Vec::new();
    let mut uris = Vec::new();
    let mut emails = Vec::new();
    for extension in request.requested_extensions().into_iter().flatten() {
        let ParsedExtension::SubjectAlternativeName(san) = extension else {
            continue;
        };
        for name in &san.general_names {
            match name {
                GeneralName::IPAddress(bytes) => ip_addresses.push(ip_addr(bytes)?.to_string()),
                GeneralName::URI(uri) => uris.push(uri.to_string()),
                GeneralName::RFC822Name(email) => emails.push(email.to_string()),
                _ => {}
            }
        }
    }

    let mut notices = Vec::new();
    for (property, values) in [
        ("ipAddresses", ip_addresses),
        ("uris", uris),
        ("emailAddresses", emails),
    ] {
        if !values.is_empty() {
            notices.push(PropertyNotice::new(property, values, Treatment::Unsupported));
        }
    }

    let subject = &request.certification_request_info.subject;
    for (oid, name) in STRIPPED_ATTRIBUTES {
        let values: Vec<String> = subject
            .iter_attributes()
            .filter(|attr| attr.attr_type().to_id_string() == *oid)
            .filter_map(|attr| attr.as_str().ok().map(str::to_string))
            .collect();
        if !values.is_empty() {
            notices.push(PropertyNotice::new(
                format!("subject.{name}"),
                values,
                Treatment::Unsupported,
            ));
        }
    }

    Ok(notices)
}

/// Logs every overridden and unsupported property of a request.
pub fn log_request_properties(csr_pem: &[u8], requested: &RequestedProperties) {
    for notice in overridden_properties(requested) {
        info!(property = %notice.property, "{notice}");
    }

    match unsupported_properties(csr_pem) {
        Ok(notices) => {
            for notice in notices {
                warn!(property = %notice.property, "{notice}");
            }
        }
        Err(e) => warn!(error = %e, "cannot parse certificate request"),
    }
}
