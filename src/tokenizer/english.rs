use lazy_static::lazy_static;
use regex::Regex;

use super::Tokenizer;

const ENGLISH_NUMBERS: [(&str, &str); 10] = [
    ("zero", "0"),
    ("one", "1"),
    ("two", "2"),
    ("three", "3"),
    ("four", "4"),
    ("five", "5"),
    ("six", "6"),
    ("seven", "7"),
    ("eight", "8"),
    ("nine", "9"),
];

lazy_static! {
    static ref ENGLISH_FORBIDDEN_CHARS: Regex =
        Regex::new(r##"[^a-z0-9\s.,?'"!@#$%^&*()_=+;:<>/\\|{}\[\]`~-]"##).unwrap();
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EnglishTokenizer;

impl Tokenizer for EnglishTokenizer {
    fn ngram_width(&self) -> usize {
        2
    }

    fn numbers_map(&self) -> &'static [(&'static str, &'static str)] {
        &ENGLISH_NUMBERS
    }

    fn forbidden_chars(&self) -> &Regex {
        &ENGLISH_FORBIDDEN_CHARS
    }

    fn is_letter(&self, c: char) -> bool {
        c.is_ascii_lowercase()
    }
}
