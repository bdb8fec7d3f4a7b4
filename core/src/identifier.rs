//! Opaque identifiers for authoring and draft entities.
//!
//! Identifiers are fixed-length random strings drawn from an alphabet that
//! excludes visually ambiguous characters (`0`/`O`, `1`/`l`/`I`). They are
//! assigned once and never change.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of characters in a generated identifier.
pub const IDENTIFIER_LENGTH: usize = 12;

/// Characters that generated identifiers are drawn from.
const IDENTIFIER_ALPHABET: &[u8] = b"23456789abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ";

/// An opaque, immutable identifier.
///
/// # Examples
///
/// ```
/// use pattern_toolkit_core::Identifier;
///
/// let a = Identifier::generate();
/// let b = Identifier::generate();
/// assert_eq!(a.as_str().len(), 12);
/// assert_ne!(a, b);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Generates a new random identifier.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let id = (0..IDENTIFIER_LENGTH)
            .map(|_| IDENTIFIER_ALPHABET[rng.random_range(0..IDENTIFIER_ALPHABET.len())] as char)
            .collect();
        Self(id)
    }

    /// Wraps an existing identifier, e.g. one read back from a dehydrated bag.
    pub fn from_existing(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_identifier_uses_restricted_alphabet() {
        for _ in 0..100 {
            let id = Identifier::generate();
            assert_eq!(id.as_str().len(), IDENTIFIER_LENGTH);
            assert!(
                id.as_str()
                    .bytes()
                    .all(|b| IDENTIFIER_ALPHABET.contains(&b))
            );
            assert!(!id.as_str().contains(['0', '1', 'l', 'I', 'O']));
        }
    }

    #[test]
    fn test_from_existing_preserves_value() {
        let id = Identifier::from_existing("abc123");
        assert_eq!(id.to_string(), "abc123");
    }
}
