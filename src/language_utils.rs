use anyhow::{Result, anyhow};
use isolang::Language;

/// Language utilities for language tag handling
///
/// Engines disagree on how languages are spelled: ISO 639-1 codes for most,
/// uppercase codes with script or region suffixes for DeepL, `zh-CN`/`zh-TW`
/// for Google. Everything inside the crate uses lowercase ISO 639-1 codes plus
/// the `zh-Hans`/`zh-Hant` script tags, and converts at the provider edge.

/// Pseudo-code meaning "let the engine detect the source language"
pub const AUTO_DETECT: &str = "auto";

/// Chinese script variant, the one case where the base code is not enough
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChineseScript {
    Simplified,
    Traditional,
}

/// ISO 639-2/B codes that differ from their 639-2/T counterpart
fn part2b_to_part2t(code: &str) -> Option<&'static str> {
    Some(match code {
        "fre" => "fra",
        "ger" => "deu",
        "dut" => "nld",
        "gre" => "ell",
        "chi" => "zho",
        "cze" => "ces",
        "ice" => "isl",
        "per" => "fas",
        "rum" => "ron",
        "slo" => "slk",
        _ => return None,
    })
}

/// Whether the code asks for source language detection
pub fn is_auto(code: &str) -> bool {
    let code = code.trim();
    code.is_empty() || code.eq_ignore_ascii_case(AUTO_DETECT)
}

/// Chinese script implied by a tag such as `zh-Hans`, `zh-TW` or `zh_CN`
pub fn chinese_script(code: &str) -> Option<ChineseScript> {
    let lowered = code.trim().to_lowercase().replace('_', "-");
    match lowered.as_str() {
        "zh" | "zh-hans" | "zh-cn" | "zh-sg" | "zh-hans-cn" | "zho" | "chi" => Some(ChineseScript::Simplified),
        "zh-hant" | "zh-tw" | "zh-hk" | "zh-mo" | "zh-hant-tw" => Some(ChineseScript::Traditional),
        _ => None,
    }
}

/// Primary subtag of a language tag, lowercased (`en-US` -> `en`)
pub fn base_code(code: &str) -> String {
    code.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Normalize a language code to ISO 639-1 (2-letter) format if possible
/// Falls back to ISO 639-2/T if no ISO 639-1 code exists
pub fn normalize_to_part1_or_part2t(code: &str) -> Result<String> {
    let normalized_code = base_code(code);

    if normalized_code.len() == 2 {
        if Language::from_639_1(&normalized_code).is_some() {
            return Ok(normalized_code);
        }
    } else if normalized_code.len() == 3 {
        let part2t = part2b_to_part2t(&normalized_code).unwrap_or(&normalized_code);
        if let Some(lang) = Language::from_639_3(part2t) {
            if let Some(code_639_1) = lang.to_639_1() {
                return Ok(code_639_1.to_string());
            }
            return Ok(part2t.to_string());
        }
    }

    Err(anyhow!("Cannot normalize invalid language code: {}", code))
}

/// Validate a language tag; `auto` is accepted
pub fn validate_language_code(code: &str) -> Result<()> {
    if is_auto(code) {
        return Ok(());
    }
    normalize_to_part1_or_part2t(code).map(|_| ())
}

/// Check if two language codes match (represent the same language and script)
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    if chinese_script(code1).is_some() || chinese_script(code2).is_some() {
        return chinese_script(code1) == chinese_script(code2);
    }
    match (normalize_to_part1_or_part2t(code1), normalize_to_part1_or_part2t(code2)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Get the English language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    match chinese_script(code) {
        Some(ChineseScript::Simplified) => return Ok("Simplified Chinese".to_string()),
        Some(ChineseScript::Traditional) => return Ok("Traditional Chinese".to_string()),
        None => {}
    }
    let normalized = normalize_to_part1_or_part2t(code)?;
    let lang = if normalized.len() == 2 {
        Language::from_639_1(&normalized)
    } else {
        Language::from_639_3(&normalized)
    }
    .ok_or_else(|| anyhow!("Failed to get language from code: {}", normalized))?;

    Ok(lang.to_name().to_string())
}

/// Language name for prompts; unknown codes are passed through verbatim
pub fn display_language_name(code: &str) -> String {
    get_language_name(code).unwrap_or_else(|_| code.trim().to_string())
}

/// DeepL language code (`EN-US`, `ZH-HANS`); target languages need a variant for English and Portuguese
pub fn to_deepl_code(code: &str, is_target: bool) -> String {
    if let Some(script) = chinese_script(code) {
        if !is_target {
            return "ZH".to_string();
        }
        return match script {
            ChineseScript::Simplified => "ZH-HANS",
            ChineseScript::Traditional => "ZH-HANT",
        }
        .to_string();
    }
    let base = base_code(code);
    let region = code.trim().to_lowercase().replace('_', "-");
    match (base.as_str(), is_target) {
        ("en", true) => {
            if region.ends_with("-gb") {
                "EN-GB".to_string()
            } else {
                "EN-US".to_string()
            }
        }
        ("pt", true) => {
            if region.ends_with("-pt") {
                "PT-PT".to_string()
            } else {
                "PT-BR".to_string()
            }
        }
        _ => base.to_uppercase(),
    }
}

/// Google Translation v2 language code
pub fn to_google_code(code: &str) -> String {
    match chinese_script(code) {
        Some(ChineseScript::Simplified) => "zh-CN".to_string(),
        Some(ChineseScript::Traditional) => "zh-TW".to_string(),
        None => base_code(code),
    }
}

/// MTranServer language code
pub fn to_mtran_code(code: &str) -> String {
    if is_auto(code) {
        return AUTO_DETECT.to_string();
    }
    match chinese_script(code) {
        Some(ChineseScript::Simplified) => "zh-Hans".to_string(),
        Some(ChineseScript::Traditional) => "zh-Hant".to_string(),
        None => base_code(code),
    }
}
