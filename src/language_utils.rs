use anyhow::{Result, anyhow};
use isolang::Language;

/// Language utilities for target language handling
///
/// The target language may be given as an ISO 639-1 code, an ISO 639-2
/// (T or B) code, or an English language name. Backends are always
/// addressed with the English name, file names with the short code.

/// ISO 639-2/B codes that differ from their 639-2/T counterpart
const BIBLIOGRAPHIC_CODES: &[(&str, &str)] = &[
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("dut", "nld"),
    ("fre", "fra"),
    ("geo", "kat"),
    ("ger", "deu"),
    ("gre", "ell"),
    ("ice", "isl"),
    ("mac", "mkd"),
    ("may", "msa"),
    ("per", "fas"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

fn bibliographic_to_terminology(code: &str) -> Option<&'static str> {
    BIBLIOGRAPHIC_CODES
        .iter()
        .find(|(b, _)| *b == code)
        .map(|(_, t)| *t)
}

/// Look up a language from a code or an English name
pub fn find_language(input: &str) -> Option<Language> {
    let normalized = input.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }

    let by_code = match normalized.len() {
        2 => Language::from_639_1(&normalized),
        3 => {
            let part2t = bibliographic_to_terminology(&normalized).unwrap_or(normalized.as_str());
            Language::from_639_3(part2t)
        }
        _ => None,
    };

    by_code.or_else(|| {
        // Names are matched case-insensitively against the English name
        let mut chars = normalized.chars();
        let capitalized: String = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => return None,
        };
        Language::from_name(&capitalized)
    })
}

/// Normalize a language code to ISO 639-2/T (3-letter) format
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    find_language(code)
        .map(|lang| lang.to_639_3().to_string())
        .ok_or_else(|| anyhow!("Cannot normalize invalid language code: {}", code))
}

/// Normalize to ISO 639-1 if the language has one, ISO 639-2/T otherwise
pub fn normalize_to_part1_or_part2t(code: &str) -> Result<String> {
    let lang = find_language(code)
        .ok_or_else(|| anyhow!("Cannot normalize invalid language code: {}", code))?;

    Ok(lang
        .to_639_1()
        .map(str::to_string)
        .unwrap_or_else(|| lang.to_639_3().to_string()))
}

/// English name of a language given as code or name
pub fn resolve_language_name(input: &str) -> Result<String> {
    find_language(input)
        .map(|lang| lang.to_name().to_string())
        .ok_or_else(|| anyhow!("Unknown target language: {}", input))
}
