mod english;
mod spanish;

use lazy_static::lazy_static;
use regex::Regex;

pub use self::english::EnglishTokenizer;
pub use self::spanish::SpanishTokenizer;

/// Key of the dictionary entry used for every unknown word or n-gram. Its vector is all zeros.
pub const UNKNOWN_NGRAM_KEY: &str = "__";

lazy_static! {
    static ref WORD_SEPARATORS: Regex =
        Regex::new(r##"[\s.,;:!?%*=+|`~"()\[\]{}<>/\\-]+"##).unwrap();
}

/// Language specific rules used to turn raw sentences into words and sub-word n-grams.
///
/// All operations are pure: the same input always produces the same output.
pub trait Tokenizer: Send + Sync {
    /// Width of the character windows produced by `split_word_to_ngrams`
    fn ngram_width(&self) -> usize;

    /// Spelled-out digits of the language paired with the digit they stand for
    fn numbers_map(&self) -> &'static [(&'static str, &'static str)];

    /// Matches every character which is removed during sanitization
    fn forbidden_chars(&self) -> &Regex;

    fn is_letter(&self, c: char) -> bool;

    fn is_allowed_char(&self, c: char) -> bool {
        let mut buffer = [0; 4];
        !self.forbidden_chars().is_match(c.encode_utf8(&mut buffer))
    }

    fn is_alphanumeric(&self, key: &str) -> bool {
        !key.is_empty() && key.chars().all(|c| c.is_ascii_digit() || self.is_letter(c))
    }

    fn sanitize_sentence(&self, sentence: &str) -> String {
        let lowercased = sentence.to_lowercase();
        self.forbidden_chars()
            .replace_all(&lowercased, "")
            .trim()
            .to_string()
    }

    fn split_sentence_to_words(&self, sentence: &str) -> Vec<String> {
        let sanitized = self.sanitize_sentence(sentence);
        WORD_SEPARATORS
            .split(&sanitized)
            .map(str::trim)
            .filter(|word| !word.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn split_word_to_ngrams(&self, word: &str) -> Vec<String> {
        let chars: Vec<char> = word.chars().collect();
        let width = self.ngram_width();
        if width == 0 || chars.len() < width {
            return vec![];
        }
        chars
            .windows(width)
            .map(|window| window.iter().collect())
            .collect()
    }

    fn join_words_to_sentence(&self, words: &[String]) -> String {
        words.join(" ")
    }

    fn number_for_word(&self, word: &str) -> Option<&'static str> {
        self.numbers_map()
            .iter()
            .find(|(spelled, _)| *spelled == word)
            .map(|(_, digit)| *digit)
    }
}
