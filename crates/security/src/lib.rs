//! Secret generation and TLS material for wte.

pub mod password;
pub mod tls;

pub use password::{
    generate_alphanumeric, generate_password, generate_secure_password, generate_token,
    is_strong_password, DEFAULT_PASSWORD_LENGTH,
};
pub use tls::{
    certificate_exists, certificate_info, issue_certificate, remove_certificates,
    CertificateInfo, CertificateOptions,
};
