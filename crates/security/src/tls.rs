//! Self-signed TLS certificates for the HTTPS proxy.

use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::PKey;
use openssl::x509::extension::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
};
use openssl::x509::{X509NameBuilder, X509NameRef, X509};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use wte_common::fs::{remove_if_exists, write_file_with_mode};
use wte_common::{Error, Result};

/// Parameters of a self-signed server certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateOptions {
    pub common_name: String,
    pub organization: String,
    pub country: String,
    pub valid_days: u32,
    /// Literal addresses. Entries that do not parse are skipped.
    pub ip_addresses: Vec<String>,
    pub dns_names: Vec<String>,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl CertificateOptions {
    /// Options for a proxy reachable at `ip`, valid for a year.
    pub fn for_server(ip: &str, cert_path: &Path, key_path: &Path) -> Self {
        Self {
            common_name: ip.to_string(),
            organization: "WTE Proxy".to_string(),
            country: "XX".to_string(),
            valid_days: 365,
            ip_addresses: vec![ip.to_string(), "127.0.0.1".to_string()],
            dns_names: vec!["localhost".to_string()],
            cert_path: cert_path.to_path_buf(),
            key_path: key_path.to_path_buf(),
        }
    }
}

/// Generate a P-256 key and a self-signed certificate for it.
///
/// The certificate is written world-readable, the key owner-only.
pub fn issue_certificate(opts: &CertificateOptions) -> Result<()> {
    let (cert_pem, key_pem) =
        build_certificate(opts).map_err(|e| Error::Certificate(e.to_string()))?;

    write_file_with_mode(&opts.cert_path, &cert_pem, 0o644)?;
    write_file_with_mode(&opts.key_path, &key_pem, 0o600)?;
    debug!("Certificate written to {:?}", opts.cert_path);
    Ok(())
}

fn build_certificate(opts: &CertificateOptions) -> std::result::Result<(Vec<u8>, Vec<u8>), ErrorStack> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
    let ec_key = EcKey::generate(&group)?;
    let pkey = PKey::from_ec_key(ec_key.clone())?;

    let mut name = X509NameBuilder::new()?;
    name.append_entry_by_nid(Nid::COMMONNAME, &opts.common_name)?;
    name.append_entry_by_nid(Nid::ORGANIZATIONNAME, &opts.organization)?;
    name.append_entry_by_nid(Nid::COUNTRYNAME, &opts.country)?;
    let name = name.build();

    let mut serial = BigNum::new()?;
    serial.rand(128, MsbOption::MAYBE_ZERO, false)?;

    let mut builder = X509::builder()?;
    builder.set_version(2)?;
    let serial = serial.to_asn1_integer()?;
    builder.set_serial_number(&serial)?;
    builder.set_subject_name(&name)?;
    builder.set_issuer_name(&name)?;
    builder.set_pubkey(&pkey)?;
    let not_before = Asn1Time::days_from_now(0)?;
    let not_after = Asn1Time::days_from_now(opts.valid_days)?;
    builder.set_not_before(&not_before)?;
    builder.set_not_after(&not_after)?;

    builder.append_extension(BasicConstraints::new().build()?)?;
    builder.append_extension(
        KeyUsage::new()
            .critical()
            .digital_signature()
            .key_encipherment()
            .build()?,
    )?;
    builder.append_extension(ExtendedKeyUsage::new().server_auth().build()?)?;

    let mut san = SubjectAlternativeName::new();
    for ip in &opts.ip_addresses {
        if ip.parse::<IpAddr>().is_ok() {
            san.ip(ip);
        } else {
            warn!("Skipping invalid certificate IP address: {}", ip);
        }
    }
    for dns in &opts.dns_names {
        san.dns(dns);
    }
    let san = san.build(&builder.x509v3_context(None, None))?;
    builder.append_extension(san)?;

    builder.sign(&pkey, MessageDigest::sha256())?;
    let cert = builder.build();

    Ok((cert.to_pem()?, ec_key.private_key_to_pem()?))
}

/// Both the certificate and its key exist.
pub fn certificate_exists(cert_path: &Path, key_path: &Path) -> bool {
    cert_path.exists() && key_path.exists()
}

/// Delete the certificate and key. Returns whether anything was removed.
pub fn remove_certificates(cert_path: &Path, key_path: &Path) -> Result<bool> {
    let cert = remove_if_exists(cert_path)?;
    let key = remove_if_exists(key_path)?;
    Ok(cert || key)
}

/// Summary of an installed certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub not_before: String,
    pub not_after: String,
    pub is_expired: bool,
    pub days_left: i64,
    pub ip_addresses: Vec<String>,
    pub dns_names: Vec<String>,
}

fn common_name(name: &X509NameRef) -> String {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|cn| cn.to_string())
        .unwrap_or_default()
}

/// Read a PEM certificate and summarise it.
pub fn certificate_info(cert_path: &Path) -> Result<CertificateInfo> {
    let pem = std::fs::read(cert_path)?;
    let certificate_error = |e: ErrorStack| Error::Certificate(e.to_string());

    let cert = X509::from_pem(&pem).map_err(certificate_error)?;
    let now = Asn1Time::days_from_now(0).map_err(certificate_error)?;
    let remaining = now.diff(cert.not_after()).map_err(certificate_error)?;

    let mut ip_addresses = Vec::new();
    let mut dns_names = Vec::new();
    if let Some(names) = cert.subject_alt_names() {
        for name in names.iter() {
            if let Some(dns) = name.dnsname() {
                dns_names.push(dns.to_string());
            }
            if let Some(ip) = name.ipaddress().and_then(ip_from_bytes) {
                ip_addresses.push(ip.to_string());
            }
        }
    }

    Ok(CertificateInfo {
        subject: common_name(cert.subject_name()),
        issuer: common_name(cert.issuer_name()),
        not_before: cert.not_before().to_string(),
        not_after: cert.not_after().to_string(),
        is_expired: remaining.days < 0 || remaining.secs < 0,
        days_left: i64::from(remaining.days),
        ip_addresses,
        dns_names,
    })
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => <[u8; 4]>::try_from(bytes).ok().map(IpAddr::from),
        16 => <[u8; 16]>::try_from(bytes).ok().map(IpAddr::from),
        _ => None,
    }
}
