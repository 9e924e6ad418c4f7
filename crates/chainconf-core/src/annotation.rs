//! Annotation parsing
//!
//! Field annotations are blobs of `key:"value"` segments, e.g.
//! `env:"DB_HOST" config:"availableAs=DB_HOST" validate:"required"`.
//! This module extracts variable declarations (`availableAs=NAME` inside the
//! `config` segment), scans text for `${NAME}` references, and performs
//! textual substitution against a resolved-value context. All functions are
//! stateless.

use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::error::{Error, Result};

/// Segment key that holds interpolation declarations
pub const CONFIG_KEY: &str = "config";

/// Marker introducing a variable declaration inside the config segment
pub const DECLARATION_MARKER: &str = "availableAs=";

/// Reference pattern: `${NAME}` where NAME is alphanumeric, underscore, or
/// hyphen. Malformed forms (unclosed, nested, invalid characters) simply do
/// not match.
fn reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([A-Za-z0-9_-]+)\}").expect("reference pattern is valid"))
}

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("name pattern is valid"))
}

/// Extract a named segment from an annotation blob.
///
/// Equivalent to looking up one key in a Go-style struct tag:
/// `segment(r#"env:"PORT" config:"availableAs=PORT""#, "config")` returns
/// `Some("availableAs=PORT")`. Returns `None` for absent keys or malformed
/// blobs.
pub fn segment<'a>(annotation: &'a str, key: &str) -> Option<&'a str> {
    let mut rest = annotation;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return None;
        }
        let colon = rest.find(':')?;
        let name = &rest[..colon];
        let after = rest[colon + 1..].strip_prefix('"')?;
        let end = after.find('"')?;
        if name == key {
            return Some(&after[..end]);
        }
        rest = &after[end + 1..];
    }
}

/// Parse a config segment for an `availableAs=NAME` declaration.
///
/// Only the first `=`-delimited token after the marker is taken; a comma or
/// space ends the name. Errors carry the placeholder field `"<unknown>"`
/// because the parser does not know which field the segment belongs to; the
/// engine overwrites it.
pub fn parse_declaration(text: &str) -> Result<String> {
    if text.is_empty() {
        return Err(Error::annotation(CONFIG_KEY, "empty config segment"));
    }

    let idx = text
        .find(DECLARATION_MARKER)
        .ok_or_else(|| Error::annotation(CONFIG_KEY, "availableAs not found in config segment"))?;

    let mut value = &text[idx + DECLARATION_MARKER.len()..];
    if let Some(comma) = value.find(',') {
        value = &value[..comma];
    }
    if let Some(space) = value.find(' ') {
        value = &value[..space];
    }

    let value = value.trim();
    if value.is_empty() {
        return Err(Error::annotation(CONFIG_KEY, "empty availableAs value"));
    }

    validate_name(value)?;
    Ok(value.to_string())
}

/// Check that a variable name is non-empty and uses only alphanumerics,
/// underscore, and hyphen.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::annotation(CONFIG_KEY, "variable name cannot be empty"));
    }
    if !name_regex().is_match(name) {
        return Err(Error::annotation(
            CONFIG_KEY,
            format!(
                "variable name '{}' contains invalid characters (only alphanumeric, underscore, and hyphen allowed)",
                name
            ),
        ));
    }
    Ok(())
}

/// Extract every `${NAME}` reference from a string, in order of occurrence.
/// Duplicates are kept.
pub fn find_references(text: &str) -> Vec<String> {
    reference_regex()
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Check if a string contains at least one well-formed reference
pub fn contains_reference(text: &str) -> bool {
    reference_regex().is_match(text)
}

/// Replace every well-formed reference with its context value.
///
/// Missing names are collected exhaustively; if any are missing the whole
/// substitution fails reporting the complete missing set (deduplicated, in
/// order of first occurrence).
pub fn interpolate(text: &str, context: &IndexMap<String, String>) -> Result<String> {
    let mut missing: Vec<String> = Vec::new();

    let result = reference_regex().replace_all(text, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match context.get(name) {
            Some(value) => value.clone(),
            None => {
                if !missing.iter().any(|m| m == name) {
                    missing.push(name.to_string());
                }
                // Keep the original token; the error below discards the text
                caps[0].to_string()
            }
        }
    });

    if !missing.is_empty() {
        return Err(Error::missing_variables(missing));
    }

    Ok(result.into_owned())
}
