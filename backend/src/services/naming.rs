//! Document naming rules.
//!
//! Every upload must be named after the cell it lands in:
//! `{product}_{category}_v{version}` (with an `EN_` prefix for the US
//! catalog). Spaces and underscores are interchangeable. Also hosts the slug
//! helper used for archive folder and file names.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{AppError, Result};

/// Country whose documents carry the English-language prefix.
const ENGLISH_PREFIX_COUNTRY: &str = "US";

/// Expected extension-less filename for a cell and version.
pub fn expected_base_name(
    country_code: Option<&str>,
    product_name: &str,
    category_name: &str,
    version: &str,
) -> String {
    match country_code {
        Some(ENGLISH_PREFIX_COUNTRY) => {
            format!("EN_{}_{}_v{}", product_name, category_name, version)
        }
        _ => format!("{}_{}_v{}", product_name, category_name, version),
    }
}

/// Split off the final extension. A leading dot does not start an
/// extension, so `.env` has none.
pub fn strip_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(idx) if filename[..idx].chars().any(|c| c != '.') => &filename[..idx],
        _ => filename,
    }
}

/// Treat spaces and underscores as the same character.
pub fn normalize(name: &str) -> String {
    name.replace(' ', "_")
}

/// Check an uploaded filename against the naming convention.
pub fn validate_filename(
    country_code: Option<&str>,
    product_name: &str,
    category_name: &str,
    version: &str,
    filename: &str,
) -> Result<()> {
    let expected = expected_base_name(country_code, product_name, category_name, version);
    let actual = strip_extension(filename);

    if normalize(&expected) == normalize(actual) {
        Ok(())
    } else {
        Err(AppError::FilenameMismatch {
            expected,
            actual: actual.to_string(),
        })
    }
}

fn strip_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s-]").unwrap())
}

fn dash_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-\s]+").unwrap())
}

/// Filesystem-safe slug. Letters of any script are kept so Korean and
/// Japanese names stay readable; everything else collapses to dashes.
pub fn slugify(value: &str) -> String {
    let lowered = value.to_lowercase();
    let stripped = strip_regex().replace_all(&lowered, "");
    let dashed = dash_regex().replace_all(stripped.trim(), "-");
    dashed.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// Slug with a fallback for names that reduce to nothing.
pub fn slugify_or(value: &str, fallback: &str) -> String {
    let slug = slugify(value);
    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug
    }
}
