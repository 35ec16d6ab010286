//! Turning command line tweet references into canonical numeric IDs.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

static NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());
static URL_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://").unwrap());

/// Normalize a single reference: a bare numeric ID is returned as-is, a URL
/// yields its last path segment, which must itself be numeric.
pub fn normalize(reference: &str) -> Result<String> {
    if NUMERIC.is_match(reference) {
        return Ok(reference.to_string());
    }

    if URL_SCHEME.is_match(reference) {
        let path = reference.split(['?', '#']).next().unwrap_or_default();
        let id = path.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
        if NUMERIC.is_match(id) {
            return Ok(id.to_string());
        }
    }

    Err(Error::InvalidReference(reference.to_string()))
}

/// Normalize every reference, failing on the first invalid one. Repeated IDs
/// are kept once, in order of first appearance.
pub fn normalize_all<S: AsRef<str>>(references: &[S]) -> Result<Vec<String>> {
    let mut ids: Vec<String> = Vec::with_capacity(references.len());
    for r in references {
        let id = normalize(r.as_ref())?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}
