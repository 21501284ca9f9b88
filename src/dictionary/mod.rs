pub mod fasttext;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use failure::ResultExt;
use log::{info, warn};
use ndarray::prelude::*;

use crate::errors::*;
use crate::tokenizer::UNKNOWN_NGRAM_KEY;

pub type DictionaryEntry = (String, Vec<f32>);

/// Pre-trained vectors of characters, n-grams and a few whole words.
///
/// Ids follow the order of the entries. The first entry is always the unknown key `__`
/// whose vector is all zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct PretrainedDictionary {
    id_to_word: Vec<String>,
    word_to_id: HashMap<String, u32>,
    vectors: Array2<f32>,
}

impl PretrainedDictionary {
    pub fn from_entries(entries: Vec<DictionaryEntry>) -> Result<Self> {
        let dimensions = match entries.iter().find(|(key, _)| key != UNKNOWN_NGRAM_KEY) {
            Some((_, vector)) => vector.len(),
            None => entries.first().map(|(_, vector)| vector.len()).unwrap_or(0),
        };
        if dimensions == 0 {
            return Err(NluError::InvalidDataset(
                "dictionary vectors must have at least one dimension".to_string()
            )
            .into());
        }

        let mut id_to_word = vec![UNKNOWN_NGRAM_KEY.to_string()];
        let mut word_to_id = HashMap::with_capacity(entries.len() + 1);
        word_to_id.insert(UNKNOWN_NGRAM_KEY.to_string(), 0);
        let mut flat_vectors = vec![0.0; dimensions];

        for (key, vector) in entries {
            if key == UNKNOWN_NGRAM_KEY {
                continue;
            }
            if vector.len() != dimensions {
                return Err(NluError::InvalidDataset(format!(
                    "vector of '{}' has {} dimensions instead of {}",
                    key,
                    vector.len(),
                    dimensions
                ))
                .into());
            }
            if word_to_id.contains_key(&key) {
                warn!("Duplicate dictionary key '{}' ignored", key);
                continue;
            }
            word_to_id.insert(key.clone(), id_to_word.len() as u32);
            id_to_word.push(key);
            flat_vectors.extend(vector);
        }

        let vectors = Array2::from_shape_vec((id_to_word.len(), dimensions), flat_vectors)?;
        Ok(Self {
            id_to_word,
            word_to_id,
            vectors,
        })
    }

    /// Reads a JSON list of `[key, vector]` pairs
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let entries: Vec<DictionaryEntry> = serde_json::from_reader(reader)?;
        Self::from_entries(entries)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading dictionary ({:?}) ...", path);
        let file = File::open(path)
            .with_context(|_| NluError::ModelLoad(path.to_string_lossy().to_string()))?;
        let dictionary = Self::from_reader(BufReader::new(file))
            .with_context(|_| format!("Invalid dictionary file {:?}", path))?;
        info!(
            "Dictionary loaded: {} keys, {} dimensions",
            dictionary.len(),
            dictionary.dimensions()
        );
        Ok(dictionary)
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let entries: Vec<(&str, Vec<f32>)> = self
            .id_to_word
            .iter()
            .zip(self.vectors.outer_iter())
            .map(|(key, vector)| (key.as_str(), vector.to_vec()))
            .collect();
        serde_json::to_writer(writer, &entries)?;
        Ok(())
    }

    pub fn id(&self, key: &str) -> Option<u32> {
        self.word_to_id.get(key).cloned()
    }

    pub fn word(&self, id: u32) -> Option<&str> {
        self.id_to_word.get(id as usize).map(String::as_str)
    }

    pub fn vector(&self, key: &str) -> Option<ArrayView1<f32>> {
        self.id(key).map(|id| self.vectors.row(id as usize))
    }

    pub fn len(&self) -> usize {
        self.id_to_word.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_word.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn vectors(&self) -> &Array2<f32> {
        &self.vectors
    }

    pub fn ngram_to_id(&self) -> &HashMap<String, u32> {
        &self.word_to_id
    }
}

/// Writes the key to id mapping used to reload a pipeline without its dictionary
pub fn write_ngram_to_id<W: Write>(ngram_to_id: &HashMap<String, u32>, writer: W) -> Result<()> {
    serde_json::to_writer(writer, ngram_to_id)?;
    Ok(())
}

pub fn read_ngram_to_id<R: Read>(reader: R) -> Result<HashMap<String, u32>> {
    let ngram_to_id: HashMap<String, u32> = serde_json::from_reader(reader)?;
    if ngram_to_id.get(UNKNOWN_NGRAM_KEY) != Some(&0) {
        return Err(NluError::InvalidDataset(format!(
            "the key '{}' must have the id 0",
            UNKNOWN_NGRAM_KEY
        ))
        .into());
    }
    Ok(ngram_to_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::assert_epsilon_eq_array1;

    #[test]
    fn test_dictionary_from_reader() {
        // Given
        let data: &[u8] = r#"[
            ["__", [0.0, 0.0]],
            ["a", [1.0, 0.0]],
            ["b", [0.0, 1.0]],
            ["ab", [0.5, 0.5]]
        ]"#
        .as_ref();

        // When
        let dictionary = PretrainedDictionary::from_reader(data).unwrap();

        // Then
        assert_eq!(4, dictionary.len());
        assert_eq!(2, dictionary.dimensions());
        assert_eq!(Some(3), dictionary.id("ab"));
        assert_eq!(Some("b"), dictionary.word(2));
        assert_eq!(None, dictionary.id("ba"));
        assert_epsilon_eq_array1(
            &dictionary.vector("ab").unwrap().to_owned(),
            &array![0.5, 0.5],
            1e-6,
        );
    }

    #[test]
    fn test_sentinel_is_inserted_and_zeroed() {
        // Given
        let entries = vec![
            ("x".to_string(), vec![1.0, 2.0]),
            ("__".to_string(), vec![3.0, 3.0]),
        ];

        // When
        let dictionary = PretrainedDictionary::from_entries(entries).unwrap();

        // Then
        assert_eq!(Some(0), dictionary.id(UNKNOWN_NGRAM_KEY));
        assert_eq!(Some(1), dictionary.id("x"));
        assert_eq!(array![0.0f32, 0.0], dictionary.vectors().row(0));
    }

    #[test]
    fn test_duplicate_keys_keep_first_position() {
        let entries = vec![
            ("__".to_string(), vec![0.0]),
            ("a".to_string(), vec![1.0]),
            ("b".to_string(), vec![2.0]),
            ("a".to_string(), vec![3.0]),
        ];

        let dictionary = PretrainedDictionary::from_entries(entries).unwrap();

        assert_eq!(3, dictionary.len());
        assert_eq!(Some(1), dictionary.id("a"));
        assert_eq!(array![1.0f32], dictionary.vector("a").unwrap());
    }

    #[test]
    fn test_inconsistent_dimensions_are_rejected() {
        let entries = vec![
            ("a".to_string(), vec![1.0, 0.0]),
            ("b".to_string(), vec![1.0]),
        ];
        assert!(PretrainedDictionary::from_entries(entries).is_err());
    }

    #[test]
    fn test_word_id_round_trip() {
        let dictionary = crate::testutils::test_dictionary(4);
        for id in 0..dictionary.len() as u32 {
            let word = dictionary.word(id).unwrap();
            assert_eq!(Some(id), dictionary.id(word));
        }
    }

    #[test]
    fn test_ngram_to_id_persistence() {
        // Given
        let dictionary = crate::testutils::test_dictionary(4);
        let mut buffer = vec![];

        // When
        write_ngram_to_id(dictionary.ngram_to_id(), &mut buffer).unwrap();
        let ngram_to_id = read_ngram_to_id(buffer.as_slice()).unwrap();

        // Then
        assert_eq!(dictionary.ngram_to_id(), &ngram_to_id);
    }

    #[test]
    fn test_dictionary_to_writer() {
        let dictionary = crate::testutils::test_dictionary(3);
        let mut buffer = vec![];

        dictionary.to_writer(&mut buffer).unwrap();
        let reloaded = PretrainedDictionary::from_reader(buffer.as_slice()).unwrap();

        assert_eq!(dictionary, reloaded);
    }
}
