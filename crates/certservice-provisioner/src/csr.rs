//! CSR normalization.
//!
//! The CertService API rejects certificate requests whose subject carries a
//! street address, postal code, or serial number, whatever their values.
//! [`normalize`] decodes an inbound request, checks its self-signature,
//! rebuilds the subject without those attributes, and re-signs the request
//! with the caller's private key. The key pair is never regenerated, so the
//! public key of the filtered request always equals the original's.
//!
//! # Example
//!
//! ```
//! use certservice_provisioner::csr::normalize;
//!
//! let key = rcgen::KeyPair::generate().unwrap();
//! let params = rcgen::CertificateParams::new(vec!["app.example.com".to_string()]).unwrap();
//! let csr = params.serialize_request(&key).unwrap().pem().unwrap();
//!
//! let filtered = normalize(csr.as_bytes(), key.serialize_pem().as_bytes()).unwrap();
//! assert!(filtered.as_str().starts_with("-----BEGIN CERTIFICATE REQUEST-----"));
//! ```

use crate::{Error, Result};
use pem::{EncodeConfig, LineEnding, Pem};
use rcgen::string::{BmpString, Ia5String, PrintableString, TeletexString, UniversalString};
use rcgen::{CertificateParams, DistinguishedName, DnType, DnValue, KeyPair, SanType};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::prelude::FromDer;
use x509_parser::x509::AttributeTypeAndValue;

/// PEM block type of a certificate signing request.
pub const CSR_PEM_TAG: &str = "CERTIFICATE REQUEST";

/// PEM block type of a PKCS#8 private key.
pub const PRIVATE_KEY_PEM_TAG: &str = "PRIVATE KEY";

/// Maps the subject attributes copied into the filtered request.
fn kept_attribute(oid: &str) -> Option<DnType> {
    match oid {
        "2.5.4.3" => Some(DnType::CommonName),
        "2.5.4.10" => Some(DnType::OrganizationName),
        "2.5.4.11" => Some(DnType::OrganizationalUnitName),
        "2.5.4.6" => Some(DnType::CountryName),
        "2.5.4.8" => Some(DnType::StateOrProvinceName),
        "2.5.4.7" => Some(DnType::LocalityName),
        _ => None,
    }
}

/// Subject attributes the CA API does not accept.
pub(crate) const STRIPPED_ATTRIBUTES: &[(&str, &str)] = &[
    ("2.5.4.9", "streetAddress"),
    ("2.5.4.17", "postalCode"),
    ("2.5.4.5", "serialNumber"),
];

/// A re-signed certificate request containing only CA-supported subject fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredCsr {
    pem: String,
    removed: Vec<&'static str>,
}

impl FilteredCsr {
    /// Returns the PEM-encoded request.
    pub fn as_str(&self) -> &str {
        &self.pem
    }

    /// Returns the PEM-encoded request as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.pem.as_bytes()
    }

    /// Names of the subject attributes that were present and got removed.
    pub fn removed_fields(&self) -> &[&'static str] {
        &self.removed
    }

    /// Consumes self and returns the PEM bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.pem.into_bytes()
    }
}

/// Normalizes `csr_pem` into a request the CA API accepts.
///
/// # Errors
///
/// - [`Error::CsrDecode`] if the PEM block is missing, has trailing data,
///   has the wrong type, or does not parse as a PKCS#10 request
/// - [`Error::SignatureVerification`] if the request's self-signature is invalid
/// - [`Error::PrivateKeyDecode`] if `private_key_pem` is not a PKCS#8 key
/// - [`Error::KeyMismatch`] if the key does not belong to the request
/// - [`Error::CsrCreation`] if re-signing fails or a kept subject attribute
///   carries more than two values
pub fn normalize(csr_pem: &[u8], private_key_pem: &[u8]) -> Result<FilteredCsr> {
    let der = decode_csr_pem(csr_pem)?;
    let (rest, request) = X509CertificationRequest::from_der(&der)
        .map_err(|e| Error::CsrDecode(format!("failed to parse certificate request: {e}")))?;
    if !rest.is_empty() {
        return Err(Error::CsrDecode(
            "trailing data after certificate request".to_string(),
        ));
    }

    request
        .verify_signature()
        .map_err(|e| Error::SignatureVerification(e.to_string()))?;

    let key_pair = decode_private_key(private_key_pem)?;

    let info = &request.certification_request_info;
    let mut distinguished_name = DistinguishedName::new();
    let mut removed = Vec::new();
    for attribute in info.subject.iter_attributes() {
        let oid = attribute.attr_type().to_id_string();

        if let Some((_, name)) = STRIPPED_ATTRIBUTES.iter().find(|(id, _)| *id == oid) {
            if !removed.contains(name) {
                removed.push(*name);
            }
            continue;
        }

        let Some(dn_type) = kept_attribute(&oid) else {
            continue;
        };
        let value = subject_value(attribute, &oid)?;
        if distinguished_name.get(&dn_type).is_none() {
            distinguished_name.push(dn_type, value);
            continue;
        }
        // A repeated attribute goes in under its numeric OID, which rcgen
        // keys separately from the named type.
        let alias = DnType::CustomDnType(oid_arcs(&oid)?);
        if distinguished_name.get(&alias).is_some() {
            return Err(Error::CsrCreation(format!(
                "subject attribute {oid} has more than two values"
            )));
        }
        distinguished_name.push(alias, value);
    }

    let mut params = CertificateParams::new(Vec::<String>::new())
        .map_err(|e| Error::CsrCreation(format!("failed to create params: {e}")))?;
    params.distinguished_name = distinguished_name;
    params.subject_alt_names = subject_alt_names(&request)?;

    let signed = params
        .serialize_request(&key_pair)
        .map_err(|e| Error::CsrCreation(format!("CSR serialization failed: {e}")))?;
    let signed_der: &[u8] = signed.der().as_ref();

    let (_, filtered) = X509CertificationRequest::from_der(signed_der)
        .map_err(|e| Error::CsrCreation(format!("filtered request does not parse: {e}")))?;
    if filtered.certification_request_info.subject_pki.raw != info.subject_pki.raw {
        return Err(Error::KeyMismatch);
    }

    let pem = pem::encode_config(
        &Pem::new(CSR_PEM_TAG, signed_der.to_vec()),
        EncodeConfig::new().set_line_ending(LineEnding::LF),
    );

    Ok(FilteredCsr { pem, removed })
}

/// Decodes a single `CERTIFICATE REQUEST` PEM block, rejecting trailing data.
pub(crate) fn decode_csr_pem(csr_pem: &[u8]) -> Result<Vec<u8>> {
    let text = std::str::from_utf8(csr_pem)
        .map_err(|_| Error::CsrDecode("CSR is not valid PEM text".to_string()))?;
    if text.trim().is_empty() {
        return Err(Error::CsrDecode("no PEM block found".to_string()));
    }

    let block =
        pem::parse(text).map_err(|e| Error::CsrDecode(format!("no PEM block found: {e}")))?;
    if block.tag() != CSR_PEM_TAG {
        return Err(Error::CsrDecode(format!(
            "unexpected PEM block type '{}'",
            block.tag()
        )));
    }

    let end_marker = format!("-----END {}-----", block.tag());
    let trailing = text
        .find(&end_marker)
        .map(|at| &text[at + end_marker.len()..])
        .unwrap_or_default();
    if !trailing.trim().is_empty() {
        return Err(Error::CsrDecode("trailing data after PEM block".to_string()));
    }

    Ok(block.into_contents())
}

fn decode_private_key(private_key_pem: &[u8]) -> Result<KeyPair> {
    let text = std::str::from_utf8(private_key_pem)
        .map_err(|_| Error::PrivateKeyDecode("key is not valid PEM text".to_string()))?;
    let block = pem::parse(text).map_err(|e| Error::PrivateKeyDecode(e.to_string()))?;
    if block.tag() != PRIVATE_KEY_PEM_TAG {
        return Err(Error::PrivateKeyDecode(format!(
            "expected PKCS#8 '{PRIVATE_KEY_PEM_TAG}' block, got '{}'",
            block.tag()
        )));
    }
    KeyPair::from_pem(text).map_err(|e| Error::PrivateKeyDecode(e.to_string()))
}

/// Re-creates an attribute value with its original ASN.1 string type.
fn subject_value(attribute: &AttributeTypeAndValue<'_>, oid: &str) -> Result<DnValue> {
    let any = attribute.attr_value();
    let bytes = any.as_bytes();
    let unreadable =
        |reason: String| Error::CsrDecode(format!("unreadable subject attribute {oid}: {reason}"));

    let value = match any.tag().0 {
        12 => DnValue::Utf8String(utf8(bytes).map_err(unreadable)?),
        // NumericString has no rcgen counterpart; its charset is a subset of PrintableString.
        18 | 19 => DnValue::PrintableString(
            PrintableString::try_from(utf8(bytes).map_err(unreadable)?)
                .map_err(|e| unreadable(e.to_string()))?,
        ),
        22 => DnValue::Ia5String(
            Ia5String::try_from(utf8(bytes).map_err(unreadable)?)
                .map_err(|e| unreadable(e.to_string()))?,
        ),
        // T61 bytes outside rcgen's charset are read as Latin-1.
        20 => match utf8(bytes).ok().and_then(|text| TeletexString::try_from(text).ok()) {
            Some(teletex) => DnValue::TeletexString(teletex),
            None => DnValue::Utf8String(bytes.iter().map(|&b| char::from(b)).collect()),
        },
        30 => DnValue::BmpString(
            BmpString::from_utf16be(bytes.to_vec()).map_err(|e| unreadable(e.to_string()))?,
        ),
        28 => DnValue::UniversalString(
            UniversalString::from_utf32be(bytes.to_vec())
                .map_err(|e| unreadable(e.to_string()))?,
        ),
        tag => return Err(unreadable(format!("unsupported string tag {tag}"))),
    };
    Ok(value)
}

fn utf8(bytes: &[u8]) -> std::result::Result<String, String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| e.to_string())
}

fn oid_arcs(oid: &str) -> Result<Vec<u64>> {
    oid.split('.')
        .map(str::parse::<u64>)
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| Error::CsrDecode(format!("invalid attribute OID {oid}: {e}")))
}

fn subject_alt_names(request: &X509CertificationRequest<'_>) -> Result<Vec<SanType>> {
    let mut names = Vec::new();
    let Some(extensions) = request.requested_extensions() else {
        return Ok(names);
    };

    for extension in extensions {
        let ParsedExtension::SubjectAlternativeName(san) = extension else {
            continue;
        };
        for general_name in &san.general_names {
            match general_name {
                GeneralName::DNSName(dns) => names.push(SanType::DnsName(ia5(dns)?)),
                GeneralName::URI(uri) => names.push(SanType::URI(ia5(uri)?)),
                GeneralName::RFC822Name(email) => names.push(SanType::Rfc822Name(ia5(email)?)),
                GeneralName::IPAddress(bytes) => names.push(SanType::IpAddress(ip_addr(bytes)?)),
                _ => {}
            }
        }
    }
    Ok(names)
}

fn ia5(value: &str) -> Result<Ia5String> {
    Ia5String::try_from(value.to_string())
        .map_err(|e| Error::CsrCreation(format!("invalid SAN '{value}': {e}")))
}

pub(crate) fn ip_addr(bytes: &[u8]) -> Result<IpAddr> {
    if let Ok(octets) = <[u8; 4]>::try_from(bytes) {
        return Ok(IpAddr::V4(Ipv4Addr::from(octets)));
    }
    if let Ok(octets) = <[u8; 16]>::try_from(bytes) {
        return Ok(IpAddr::V6(Ipv6Addr::from(octets)));
    }
    Err(Error::CsrDecode(format!(
        "IP address SAN has invalid length {}",
        bytes.len()
    )))
}
