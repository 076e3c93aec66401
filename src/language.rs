use serde::{Deserialize, Serialize};

/// Language tag attached to each outgoing request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Fr,
    Es,
    En,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Fr => "fr",
            Language::Es => "es",
            Language::En => "en",
        }
    }
}

const FRENCH_LETTERS: &[char] = &['é', 'è', 'ê', 'à', 'ù', 'ç', 'ô', 'î', 'û'];
const SPANISH_LETTERS: &[char] = &['ñ', 'á', 'é', 'í', 'ó', 'ú', 'ü'];

fn contains_any(text: &str, letters: &[char]) -> bool {
    text.chars()
        .flat_map(char::to_lowercase)
        .any(|c| letters.contains(&c))
}

/// Character-set heuristic. French is checked first; anything without a signal is English.
pub fn detect(text: &str) -> Language {
    if contains_any(text, FRENCH_LETTERS) {
        Language::Fr
    } else if contains_any(text, SPANISH_LETTERS) {
        Language::Es
    } else {
        Language::En
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_french() {
        assert_eq!(detect("Ça va très bien"), Language::Fr);
        assert_eq!(detect("où est la gare"), Language::Fr);
    }

    #[test]
    fn test_detect_spanish() {
        assert_eq!(detect("¿Cómo estás, señor?"), Language::Es);
        assert_eq!(detect("PINGÜINO"), Language::Es);
    }

    #[test]
    fn test_french_check_precedes_spanish() {
        assert_eq!(detect("mañana à la plage"), Language::Fr);
        // é belongs to both sets
        assert_eq!(detect("café"), Language::Fr);
    }

    #[test]
    fn test_defaults_to_english() {
        assert_eq!(detect("hello there"), Language::En);
        assert_eq!(detect(""), Language::En);
        assert_eq!(detect("naïve"), Language::En);
    }

    #[test]
    fn test_uppercase_accents_count() {
        assert_eq!(detect("ÉCOLE"), Language::Fr);
        assert_eq!(detect("AÑO"), Language::Es);
    }
}
