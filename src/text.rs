//! Title normalization and language sniffing helpers.

pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercases, drops punctuation and folds separators to single spaces.
pub fn normalize_text(value: &str) -> String {
    let mut normalized = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch.is_alphanumeric() {
            normalized.extend(ch.to_lowercase());
        } else if ch.is_whitespace() || matches!(ch, '-' | '_' | '/' | ':' | '.' | '×') {
            normalized.push(' ');
        }
    }
    collapse_whitespace(&normalized)
}

/// Prepares a local title for the search endpoint ("3×3 Eyes: Seima" -> "3x3 Eyes  Seima").
pub fn clean_title_for_api(title: &str) -> String {
    title.replace(':', " ").replace('×', "x").trim().to_string()
}

const FRENCH_INDICATORS: &[&str] = &[
    " le ", " la ", " les ", " des ", " un ", " une ", " du ", " de la ", " à ", " est ", "ç",
    "é", "è", "ê", "â", "ô", "î", "û", "ë", "ï", "ü",
];

fn indicators_for_language(language: &str) -> &'static [&'static str] {
    match language.trim().to_ascii_lowercase().as_str() {
        "french" | "français" | "francais" | "fr" => FRENCH_INDICATORS,
        _ => &[],
    }
}

/// Cheap heuristic: more than two marker words/characters means the text is
/// already in `language`. Languages without markers always answer `false`.
pub fn appears_to_be_language(text: &str, language: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    let lowered = text.to_lowercase();
    let hits = indicators_for_language(language)
        .iter()
        .filter(|indicator| lowered.contains(*indicator))
        .count();
    hits > 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text_collapses_symbols_and_case() {
        assert_eq!(normalize_text("  Steins;Gate:  ZERO "), "steinsgate zero");
        assert_eq!(normalize_text("Re:Zero - Starting Life"), "re zero starting life");
    }

    #[test]
    fn test_clean_title_for_api_handles_special_characters() {
        assert_eq!(clean_title_for_api(" 3×3 Eyes: Seima "), "3x3 Eyes  Seima");
    }

    #[test]
    fn test_french_text_is_detected() {
        let plot = "Dans un futur lointain, le héros est un chasseur de primes à la recherche de la vérité.";
        assert!(appears_to_be_language(plot, "French"));
    }

    #[test]
    fn test_english_text_is_not_french() {
        let plot = "In the year 2071, a ragtag crew of bounty hunters chases criminals across the solar system.";
        assert!(!appears_to_be_language(plot, "French"));
    }

    #[test]
    fn test_unknown_language_never_matches() {
        assert!(!appears_to_be_language("le la les des un une", "Klingon"));
    }
}
