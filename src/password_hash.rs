//! SHA-512 crypt salts and hash validation.
//!
//! Hashing itself is done by an external tool (see `accounts::PasswordHasher`);
//! this module owns the two things the tool must not be trusted with: drawing
//! the salt from a CSPRNG and checking that what comes back is really a
//! `$6$` modular crypt string before it is written to the shadow file.

use std::fmt;
use std::sync::OnceLock;

use rand::{CryptoRng, Rng};
use regex::Regex;

/// Characters allowed in a crypt salt and digest.
pub const CRYPT_ALPHABET: &[u8; 64] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789./";

/// Salt length used for every generated hash.
pub const SALT_LEN: usize = 16;

fn hash_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\$6\$[A-Za-z0-9./]+\$[A-Za-z0-9./]{43,}$").expect("static regex is valid")
    })
}

/// Draw a 16-character salt from `[A-Za-z0-9./]`.
///
/// The alphabet has exactly 64 symbols, so `random_range` is uniform.
pub fn generate_salt<R: Rng + CryptoRng>(rng: &mut R) -> String {
    (0..SALT_LEN)
        .map(|_| CRYPT_ALPHABET[rng.random_range(0..CRYPT_ALPHABET.len())] as char)
        .collect()
}

/// A validated `$6$<salt>$<digest>` string.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Validate raw hashing-tool output. Surrounding whitespace is trimmed;
    /// anything else that does not match is returned unchanged as the error.
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        let trimmed = raw.trim();
        if hash_pattern().is_match(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The salt segment between the second and third `$`.
    pub fn salt(&self) -> &str {
        self.0.split('$').nth(2).unwrap_or_default()
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PasswordHash($6${}$...)", self.salt())
    }
}
