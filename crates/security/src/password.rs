//! Cryptographically secure password and token generation.
//!
//! All randomness comes from the thread-local CSPRNG. Generated secrets are
//! never logged.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use rand::distr::Alphanumeric;
use rand::Rng;

/// Length used when a caller asks for a zero-length password.
pub const DEFAULT_PASSWORD_LENGTH: usize = 16;

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const MIN_SECURE_LENGTH: usize = 8;

/// Generate a password of exactly `length` characters.
///
/// Characters come from base64 of random bytes with `+`, `/` and `=`
/// stripped, so the result is safe inside URLs and YAML. Stripping can
/// shorten a batch, in which case more random bytes top it up.
pub fn generate_password(length: usize) -> String {
    let length = if length == 0 {
        DEFAULT_PASSWORD_LENGTH
    } else {
        length
    };

    let mut rng = rand::rng();
    let mut password = String::with_capacity(length + 4);
    while password.len() < length {
        let mut bytes = vec![0u8; length - password.len()];
        rng.fill(&mut bytes[..]);
        password.extend(
            STANDARD
                .encode(&bytes)
                .chars()
                .filter(|c| !matches!(c, '+' | '/' | '=')),
        );
    }

    password.truncate(length);
    password
}

/// Generate an alphanumeric password.
pub fn generate_alphanumeric(length: usize) -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Generate a password with at least one lowercase letter, one uppercase
/// letter and one digit. Lengths below 8 are raised to 8.
pub fn generate_secure_password(length: usize) -> String {
    let length = length.max(MIN_SECURE_LENGTH);
    let mut rng = rand::rng();
    let pick = |rng: &mut rand::rngs::ThreadRng, set: &[u8]| set[rng.random_range(0..set.len())];

    let mut chars = Vec::with_capacity(length);
    chars.push(pick(&mut rng, LOWERCASE));
    chars.push(pick(&mut rng, UPPERCASE));
    chars.push(pick(&mut rng, DIGITS));
    while chars.len() < length {
        chars.push(rng.sample(Alphanumeric));
    }

    // Fisher-Yates
    for i in (1..chars.len()).rev() {
        let j = rng.random_range(0..=i);
        chars.swap(i, j);
    }

    chars.into_iter().map(char::from).collect()
}

/// URL-safe base64 of `byte_length` random bytes.
pub fn generate_token(byte_length: usize) -> String {
    let mut bytes = vec![0u8; byte_length];
    rand::rng().fill(&mut bytes[..]);
    URL_SAFE.encode(bytes)
}

/// At least 8 characters with a lowercase letter, an uppercase letter and a digit.
pub fn is_strong_password(password: &str) -> bool {
    password.len() >= MIN_SECURE_LENGTH
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_length_and_alphabet() {
        for length in [1, 2, 7, 16, 33, 64] {
            for _ in 0..50 {
                let password = generate_password(length);
                assert_eq!(password.len(), length);
                assert!(!password.contains(['+', '/', '=']));
                assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
            }
        }
    }

    #[test]
    fn test_zero_length_uses_default() {
        assert_eq!(generate_password(0).len(), DEFAULT_PASSWORD_LENGTH);
    }

    #[test]
    fn test_passwords_differ() {
        assert_ne!(generate_password(16), generate_password(16));
    }

    #[test]
    fn test_secure_password_classes() {
        for _ in 0..100 {
            let password = generate_secure_password(12);
            assert_eq!(password.len(), 12);
            assert!(is_strong_password(&password));
        }
        assert_eq!(generate_secure_password(3).len(), 8);
    }

    #[test]
    fn test_alphanumeric_and_token() {
        let password = generate_alphanumeric(24);
        assert_eq!(password.len(), 24);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));

        let token = generate_token(32);
        assert_eq!(token.len(), 44);
        assert!(!token.contains(['+', '/']));
    }

    #[test]
    fn test_strength_check() {
        assert!(is_strong_password("Abcdefg1"));
        assert!(!is_strong_password("Abcdef1"));
        assert!(!is_strong_password("abcdefg1"));
        assert!(!is_strong_password("ABCDEFG1"));
        assert!(!is_strong_password("Abcdefgh"));
    }
}
