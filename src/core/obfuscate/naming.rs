//! Deterministic replacement names.
//!
//! `prefix + hex(sha256(identifier))[..hash_length]`, extended or salted when
//! the candidate is already taken.

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

pub const DEFAULT_PREFIX: &str = "v-";
pub const DEFAULT_HASH_LENGTH: usize = 8;
pub const MIN_HASH_LENGTH: usize = 4;
pub const MAX_HASH_LENGTH: usize = 64;

/// Hex chars added per extension step on collision.
const EXTEND_STEP: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameGenerator {
    prefix: String,
    hash_length: usize,
}

impl Default for NameGenerator {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            hash_length: DEFAULT_HASH_LENGTH,
        }
    }
}

impl NameGenerator {
    /// Validates that generated names are themselves valid class/id names.
    pub fn new(prefix: &str, hash_length: usize) -> Result<Self> {
        let starts_ok = prefix
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false);
        let body_ok = prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

        if !starts_ok || !body_ok {
            return Err(Error::config_invalid_value(
                "prefix",
                Some(prefix.to_string()),
                "must start with a letter or underscore and contain only letters, digits, '-' or '_'",
            ));
        }

        if !(MIN_HASH_LENGTH..=MAX_HASH_LENGTH).contains(&hash_length) {
            return Err(Error::config_invalid_value(
                "hash_length",
                Some(hash_length.to_string()),
                format!("must be between {} and {}", MIN_HASH_LENGTH, MAX_HASH_LENGTH),
            ));
        }

        Ok(Self {
            prefix: prefix.to_string(),
            hash_length,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn hash_length(&self) -> usize {
        self.hash_length
    }

    /// The collision-free replacement for `identifier`.
    ///
    /// `is_taken` reports whether a candidate is already in use. Candidates
    /// are tried in a fixed order, so the result depends only on the
    /// identifier, the configuration, and which names were taken before.
    pub fn generate(&self, identifier: &str, is_taken: impl Fn(&str) -> bool) -> String {
        let digest = hex_digest(identifier);

        let mut length = self.hash_length;
        loop {
            let candidate = format!("{}{}", self.prefix, &digest[..length]);
            if !is_taken(&candidate) {
                return candidate;
            }
            if length == MAX_HASH_LENGTH {
                break;
            }
            length = (length + EXTEND_STEP).min(MAX_HASH_LENGTH);
        }

        // Full digest exhausted: salt with a counter until unique.
        let mut salt: u64 = 1;
        loop {
            let salted = hex_digest(&format!("{}#{}", identifier, salt));
            let candidate = format!("{}{}", self.prefix, &salted[..self.hash_length]);
            if !is_taken(&candidate) {
                return candidate;
            }
            salt += 1;
        }
    }
}

fn hex_digest(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
