/*!
 * Locale utilities for content translation.
 *
 * Locales are stored lower-cased with `-` separators (`en`, `pt-br`). Only the
 * primary subtag is checked against ISO 639-1 and ISO 639-2.
 */

use anyhow::{Result, anyhow};
use isolang::Language;
use std::collections::HashSet;

/// Language code type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageCodeType {
    /// ISO 639-1 (2-letter) code
    Part1,
    /// ISO 639-2/T (3-letter) code
    Part2T,
    /// ISO 639-2/B (3-letter) code
    Part2B,
}

/// ISO 639-2/B codes that differ from their 639-2/T form
const PART2B_CODES: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Validate a bare ISO 639-1 or ISO 639-2 language code
pub fn validate_language_code(code: &str) -> Result<LanguageCodeType> {
    let normalized_code = code.trim().to_lowercase();

    match normalized_code.len() {
        2 if Language::from_639_1(&normalized_code).is_some() => Ok(LanguageCodeType::Part1),
        3 if Language::from_639_3(&normalized_code).is_some() => Ok(LanguageCodeType::Part2T),
        3 if PART2B_CODES.iter().any(|(b, _)| *b == normalized_code) => Ok(LanguageCodeType::Part2B),
        _ => Err(anyhow!("Invalid language code: {}", code)),
    }
}

/// Trim, lower-case and use `-` as the subtag separator
pub fn normalize_locale(locale: &str) -> String {
    locale.trim().to_lowercase().replace('_', "-")
}

/// Language part of a locale (`pt-br` -> `pt`)
pub fn primary_subtag(locale: &str) -> &str {
    locale.split(['-', '_']).next().unwrap_or("").trim()
}

/// Normalize a locale and check its primary subtag is a known language
pub fn validate_locale(locale: &str) -> Result<String> {
    let normalized = normalize_locale(locale);
    if normalized.is_empty() {
        return Err(anyhow!("Locale is empty"));
    }
    validate_language_code(primary_subtag(&normalized))
        .map_err(|_| anyhow!("Invalid locale: {}", locale))?;
    Ok(normalized)
}

/// Normalize a list of locales, dropping blanks and duplicates in order
pub fn normalize_locale_list(locales: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    locales
        .iter()
        .map(|l| normalize_locale(l))
        .filter(|l| !l.is_empty())
        .filter(|l| seen.insert(l.clone()))
        .collect()
}

/// Check if two locales refer to the same language and region
pub fn locales_match(left: &str, right: &str) -> bool {
    normalize_locale(left) == normalize_locale(right)
}

/// Get the English name of a locale's language
pub fn get_language_name(locale: &str) -> Result<String> {
    let normalized = normalize_locale(locale);
    let code = primary_subtag(&normalized);

    let language = match validate_language_code(code)? {
        LanguageCodeType::Part1 => Language::from_639_1(code),
        LanguageCodeType::Part2T => Language::from_639_3(code),
        LanguageCodeType::Part2B => PART2B_CODES
            .iter()
            .find(|(b, _)| *b == code)
            .and_then(|(_, t)| Language::from_639_3(t)),
    };

    language
        .map(|lang| lang.to_name().to_string())
        .ok_or_else(|| anyhow!("Invalid locale: {}", locale))
}
