use lazy_static::lazy_static;
use regex::Regex;

use super::Tokenizer;

const SPANISH_NUMBERS: [(&str, &str); 10] = [
    ("cero", "0"),
    ("uno", "1"),
    ("dos", "2"),
    ("tres", "3"),
    ("cuatro", "4"),
    ("cinco", "5"),
    ("seis", "6"),
    ("siete", "7"),
    ("ocho", "8"),
    ("nueve", "9"),
];

const SPANISH_LETTERS: &str = "áéíóúüñ";

lazy_static! {
    static ref SPANISH_FORBIDDEN_CHARS: Regex =
        Regex::new(r##"[^a-záéíóúüñ0-9\s.,?'"!@#$%^&*()_=+;:<>/\\|{}\[\]`~-]"##).unwrap();
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SpanishTokenizer;

impl Tokenizer for SpanishTokenizer {
    fn ngram_width(&self) -> usize {
        3
    }

    fn numbers_map(&self) -> &'static [(&'static str, &'static str)] {
        &SPANISH_NUMBERS
    }

    fn forbidden_chars(&self) -> &Regex {
        &SPANISH_FORBIDDEN_CHARS
    }

    fn is_letter(&self, c: char) -> bool {
        c.is_ascii_lowercase() || SPANISH_LETTERS.contains(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_sentence() {
        // Given
        let tokenizer = SpanishTokenizer;

        // When
        let sanitized = tokenizer.sanitize_sentence("¿Pon una CANCIÓN de Niño?");

        // Then
        assert_eq!("pon una canción de niño?", sanitized);
    }

    #[test]
    fn test_split_sentence_to_words() {
        let tokenizer = SpanishTokenizer;
        assert_eq!(
            vec!["qué", "tiempo", "hace", "mañana"],
            tokenizer.split_sentence_to_words("¿Qué tiempo hace mañana?")
        );
    }
}
