//! Offline reduction of the fastText `.vec` text format into a small sub-word dictionary.
//!
//! Only characters, n-grams up to the tokenizer width and spelled-out digits are kept in the
//! main dictionary, n-grams one character longer go to an extension dictionary.

use std::collections::HashSet;
use std::io::BufRead;

use log::{info, warn};

use super::{DictionaryEntry, PretrainedDictionary};
use crate::errors::*;
use crate::language::Language;
use crate::tokenizer::UNKNOWN_NGRAM_KEY;

pub struct FastTextDictionaries {
    pub main: PretrainedDictionary,
    pub extension: Option<PretrainedDictionary>,
}

#[derive(Default)]
struct EntriesAccumulator {
    keys: HashSet<String>,
    entries: Vec<DictionaryEntry>,
}

impl EntriesAccumulator {
    fn insert(&mut self, key: &str, vector: &[f32]) -> bool {
        if self.keys.contains(key) {
            return false;
        }
        self.keys.insert(key.to_string());
        self.entries.push((key.to_string(), vector.to_vec()));
        true
    }
}

pub fn dictionary_from_fasttext<R: BufRead>(
    reader: R,
    language: Language,
) -> Result<FastTextDictionaries> {
    let tokenizer = language.tokenizer();
    let width = tokenizer.ngram_width();
    let mut dimensions: Option<usize> = None;
    let mut main = EntriesAccumulator::default();
    let mut extension = EntriesAccumulator::default();

    for (line_index, line) in reader.lines().enumerate() {
        let line = line?;
        let mut values = line.trim().split(' ').filter(|value| !value.is_empty());
        let keyword = match values.next() {
            Some(keyword) => keyword.to_lowercase(),
            None => continue,
        };
        let raw_values: Vec<&str> = values.collect();

        if line_index == 0 && raw_values.len() == 1 {
            let header_dimensions = raw_values[0].parse::<usize>()?;
            info!(
                "fastText vectors: {} words, {} dimensions",
                keyword, header_dimensions
            );
            dimensions = Some(header_dimensions);
            continue;
        }

        if !keyword.chars().all(|c| tokenizer.is_allowed_char(c)) {
            continue;
        }
        let vector = match raw_values
            .iter()
            .map(|value| value.parse::<f32>())
            .collect::<::std::result::Result<Vec<f32>, _>>()
        {
            Ok(vector) => vector,
            Err(_) => {
                warn!("Skipping unparsable vector of '{}'", keyword);
                continue;
            }
        };
        let expected_dimensions = *dimensions.get_or_insert(vector.len());
        if vector.len() != expected_dimensions || expected_dimensions == 0 {
            warn!(
                "Skipping vector of '{}' with {} dimensions instead of {}",
                keyword,
                vector.len(),
                expected_dimensions
            );
            continue;
        }

        if let Some(digit) = tokenizer.number_for_word(&keyword) {
            if main.insert(&keyword, &vector) {
                main.insert(digit, &vector);
            }
            continue;
        }
        let length = keyword.chars().count();
        if length == 1 || (length <= width && tokenizer.is_alphanumeric(&keyword)) {
            main.insert(&keyword, &vector);
        } else if length == width + 1 && tokenizer.is_alphanumeric(&keyword) {
            extension.insert(&keyword, &vector);
        }
    }

    let dimensions = dimensions.unwrap_or(0);
    let mut main_entries = vec![(UNKNOWN_NGRAM_KEY.to_string(), vec![0.0; dimensions])];
    main_entries.extend(main.entries);
    let extension = if extension.entries.is_empty() {
        None
    } else {
        let mut extension_entries = vec![(UNKNOWN_NGRAM_KEY.to_string(), vec![0.0; dimensions])];
        extension_entries.extend(extension.entries);
        Some(PretrainedDictionary::from_entries(extension_entries)?)
    };
    Ok(FastTextDictionaries {
        main: PretrainedDictionary::from_entries(main_entries)?,
        extension,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dictionary_from_fasttext() {
        // Given
        let vectors: &[u8] = r#"9 2
The 0.1 0.2
a 1.0 0.0
!! 0.3 0.3
ab 0.5 0.5
seven 0.7 0.7
café 0.9 0.9
abc 0.4 0.4
a 2.0 2.0
x 1.0
"#
        .as_ref();

        // When
        let dictionaries = dictionary_from_fasttext(vectors, Language::EN).unwrap();

        // Then
        let main = dictionaries.main;
        assert_eq!(Some(0), main.id(UNKNOWN_NGRAM_KEY));
        assert_eq!(2, main.dimensions());
        assert_eq!(Some(1), main.id("a"));
        assert_eq!(Some(2), main.id("ab"));
        assert_eq!(main.vector("seven"), main.vector("7"));
        assert!(main.vector("7").is_some());
        assert_eq!(None, main.id("!!"));
        assert_eq!(None, main.id("the"));
        assert_eq!(None, main.id("café"));
        assert_eq!(None, main.id("x"));
        assert_eq!(ndarray::array![1.0f32, 0.0], main.vector("a").unwrap());
        let extension = dictionaries.extension.unwrap();
        assert_eq!(Some(1), extension.id("the"));
        assert_eq!(Some(2), extension.id("abc"));
    }
}
