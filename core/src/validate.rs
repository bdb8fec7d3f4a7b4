//! Name validation for pattern elements, attributes and automations.
//!
//! Names become path segments (`Blog.Post.title`) and template keys, so they
//! must match a strict identifier grammar, must not collide with reserved
//! tokens, and must be unique among the attributes, elements and automations
//! of a single parent.
//!
//! # Examples
//!
//! ```
//! use pattern_toolkit_core::{validate_name, ToolkitError};
//!
//! assert!(validate_name("title").is_ok());
//! assert!(matches!(validate_name("2fast"), Err(ToolkitError::InvalidIdentifier(_))));
//! assert!(matches!(validate_name("Parent"), Err(ToolkitError::ReservedName(_))));
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, ToolkitError};

/// Names that collide with keys the draft dictionary generates itself.
///
/// Compared case-insensitively.
pub const RESERVED_NAMES: &[&str] = &[
    "Id",
    "DisplayName",
    "Description",
    "Parent",
    "Items",
    "ConfigurePath",
    "Schema",
];

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,49}$").expect("identifier regex"));

/// Returns `true` if `name` matches the identifier grammar.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name)
}

/// Returns `true` if `name` is one of [`RESERVED_NAMES`].
pub fn is_reserved_name(name: &str) -> bool {
    RESERVED_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// Validates a name against the identifier grammar and the reserved names.
///
/// # Errors
///
/// Returns [`ToolkitError::InvalidIdentifier`] or [`ToolkitError::ReservedName`].
pub fn validate_name(name: &str) -> Result<()> {
    if !is_valid_identifier(name) {
        return Err(ToolkitError::InvalidIdentifier(name.to_string()));
    }
    if is_reserved_name(name) {
        return Err(ToolkitError::ReservedName(name.to_string()));
    }
    Ok(())
}

/// Fails with [`ToolkitError::DuplicateName`] when `name` is already taken.
///
/// `existing` yields the names already used in the parent scope. Names are
/// compared exactly, as paths are case-sensitive.
pub fn ensure_unique_name<'a>(
    name: &str,
    parent: &str,
    mut existing: impl Iterator<Item = &'a str>,
) -> Result<()> {
    if existing.any(|taken| taken == name) {
        return Err(ToolkitError::DuplicateName {
            name: name.to_string(),
            parent: parent.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name_accepts_identifiers() {
        for name in ["title", "_hidden", "Post2", "a_b_c"] {
            assert!(validate_name(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn test_validate_name_rejects_bad_grammar() {
        for name in ["", "2fast", "has space", "dash-name", "dotted.name"] {
            assert!(matches!(
                validate_name(name),
                Err(ToolkitError::InvalidIdentifier(_))
            ));
        }
        let too_long = "a".repeat(51);
        assert!(validate_name(&too_long).is_err());
    }

    #[test]
    fn test_validate_name_rejects_reserved_names_case_insensitively() {
        assert!(matches!(
            validate_name("items"),
            Err(ToolkitError::ReservedName(_))
        ));
        assert!(matches!(
            validate_name("PARENT"),
            Err(ToolkitError::ReservedName(_))
        ));
    }

    #[test]
    fn test_ensure_unique_name_detects_duplicates() {
        let names = ["title", "Post"];
        assert!(ensure_unique_name("author", "Blog", names.iter().copied()).is_ok());
        let err = ensure_unique_name("Post", "Blog", names.iter().copied()).unwrap_err();
        assert!(matches!(err, ToolkitError::DuplicateName { .. }));
    }
}
