use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use candle_core::{DType, Device, Tensor};
use candle_nn::{Embedding, Module};
use failure::{format_err, ResultExt};
use log::{info, warn};
use ndarray::prelude::*;

use crate::dictionary::PretrainedDictionary;
use crate::errors::*;
use crate::language::Language;
use crate::models::{DatasetParams, PipelineDefinition};
use crate::utils::write_atomically;

/// Name of the embedding table inside its safetensors file
const EMBEDDINGS_KEY: &str = "embeddings";

/// Where the frozen embedding table comes from
pub enum EmbeddingSource {
    Dictionary(Arc<PretrainedDictionary>),
    Pretrained {
        ngram_to_id: HashMap<String, u32>,
        weights: PathBuf,
    },
}

/// Turns sentences into fixed-shape id tensors and combines the frozen sub-word vectors
/// into one vector per word
pub struct EmbeddingEncoder {
    language: Language,
    ngram_to_id: HashMap<String, u32>,
    max_words: usize,
    max_ngrams: usize,
    max_chars_per_word: usize,
    embedding_dimensions: usize,
    embeddings: Embedding,
    device: Device,
}

impl EmbeddingEncoder {
    pub fn new(
        source: EmbeddingSource,
        dataset_params: &DatasetParams,
        definition: &PipelineDefinition,
        device: &Device,
    ) -> Result<Self> {
        let (ngram_to_id, table) = match source {
            EmbeddingSource::Dictionary(dictionary) => {
                let vectors = dictionary.vectors();
                let table = Tensor::from_vec(
                    vectors.iter().cloned().collect::<Vec<f32>>(),
                    vectors.dim(),
                    device,
                )?;
                (dictionary.ngram_to_id().clone(), table)
            }
            EmbeddingSource::Pretrained {
                ngram_to_id,
                weights,
            } => {
                info!("Loading embedding weights ({:?}) ...", weights);
                (ngram_to_id, Self::load_table(&weights, device)?)
            }
        };

        let (nb_vectors, embedding_dimensions) = table.dims2()?;
        if embedding_dimensions != definition.default.embedding_dimensions {
            return Err(NluError::InvalidConfiguration(format!(
                "embedding table has {} dimensions but embeddingDimensions is {}",
                embedding_dimensions, definition.default.embedding_dimensions
            ))
            .into());
        }
        if let Some(max_id) = ngram_to_id.values().max() {
            if *max_id as usize >= nb_vectors {
                return Err(NluError::InvalidConfiguration(format!(
                    "id {} is out of the {} rows of the embedding table",
                    max_id, nb_vectors
                ))
                .into());
            }
        }

        Ok(Self {
            language: dataset_params.language,
            ngram_to_id,
            max_words: dataset_params.max_words_per_sentence,
            max_ngrams: definition.default.max_ngrams,
            max_chars_per_word: definition.ner.max_chars_per_word,
            embedding_dimensions,
            embeddings: Embedding::new(table, embedding_dimensions),
            device: device.clone(),
        })
    }

    fn load_table(path: &Path, device: &Device) -> Result<Tensor> {
        let tensors = candle_core::safetensors::load(path, device)
            .with_context(|_| NluError::ModelLoad(path.to_string_lossy().to_string()))?;
        let table = tensors
            .get(EMBEDDINGS_KEY)
            .ok_or_else(|| format_err!("No '{}' tensor in {:?}", EMBEDDINGS_KEY, path))?;
        Ok(table.to_dtype(DType::F32)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let tensors: HashMap<String, Tensor> = vec![(
            EMBEDDINGS_KEY.to_string(),
            self.embeddings.embeddings().clone(),
        )]
        .into_iter()
        .collect();
        write_atomically(path, |temp_path| {
            candle_core::safetensors::save(&tensors, temp_path)?;
            Ok(())
        })
    }

    pub fn max_words(&self) -> usize {
        self.max_words
    }

    pub fn max_chars_per_word(&self) -> usize {
        self.max_chars_per_word
    }

    pub fn embedding_dimensions(&self) -> usize {
        self.embedding_dimensions
    }

    pub fn ngram_to_id(&self) -> &HashMap<String, u32> {
        &self.ngram_to_id
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Ids representing a single word: the word itself when known, else its n-grams when all
    /// of them are known, else its known characters
    fn word_ngram_ids(&self, word: &str) -> Vec<u32> {
        if let Some(id) = self.ngram_to_id.get(word) {
            return vec![*id];
        }
        let ngrams = self.language.tokenizer().split_word_to_ngrams(word);
        if !ngrams.is_empty() {
            let ngram_ids: Option<Vec<u32>> = ngrams
                .iter()
                .map(|ngram| self.ngram_to_id.get(ngram).cloned())
                .collect();
            if let Some(ngram_ids) = ngram_ids {
                return ngram_ids;
            }
        }
        word.chars()
            .filter_map(|c| self.ngram_to_id.get(&c.to_string()).cloned())
            .collect()
    }

    fn sentence_words(&self, sentence: &str) -> Vec<String> {
        let mut words = self.language.tokenizer().split_sentence_to_words(sentence);
        if words.len() > self.max_words {
            warn!(
                "Sentence '{}' has {} words, only the first {} are used",
                sentence,
                words.len(),
                self.max_words
            );
            words.truncate(self.max_words);
        }
        words
    }

    /// `[batch, maxWords, maxNgrams]` ids, 0 everywhere nothing is mapped
    pub fn sentences_to_word_ids<S: AsRef<str>>(&self, sentences: &[S]) -> Array3<u32> {
        let mut ids = Array3::<u32>::zeros((sentences.len(), self.max_words, self.max_ngrams));
        for (sentence_index, sentence) in sentences.iter().enumerate() {
            for (word_index, word) in self.sentence_words(sentence.as_ref()).iter().enumerate() {
                let word_ids = self.word_ngram_ids(word);
                if word_ids.len() > self.max_ngrams {
                    warn!(
                        "Word '{}' has {} n-grams, only the first {} are used",
                        word,
                        word_ids.len(),
                        self.max_ngrams
                    );
                }
                for (ngram_index, id) in word_ids.into_iter().take(self.max_ngrams).enumerate() {
                    ids[[sentence_index, word_index, ngram_index]] = id;
                }
            }
        }
        ids
    }

    /// `[batch, maxWords, maxCharsPerWord]` character ids, 0 for unknown characters
    pub fn sentences_to_character_ids<S: AsRef<str>>(&self, sentences: &[S]) -> Array3<u32> {
        let mut ids =
            Array3::<u32>::zeros((sentences.len(), self.max_words, self.max_chars_per_word));
        for (sentence_index, sentence) in sentences.iter().enumerate() {
            for (word_index, word) in self.sentence_words(sentence.as_ref()).iter().enumerate() {
                for (char_index, c) in word.chars().take(self.max_chars_per_word).enumerate() {
                    if let Some(id) = self.ngram_to_id.get(&c.to_string()) {
                        ids[[sentence_index, word_index, char_index]] = *id;
                    }
                }
            }
        }
        ids
    }

    /// Character fingerprints `[batch, maxWords, maxCharsPerWord * embeddingDimensions]`
    pub fn sentences_to_character_vectors<S: AsRef<str>>(&self, sentences: &[S]) -> Result<Tensor> {
        let ids = self.sentences_to_character_ids(sentences);
        let (batch, words, chars) = ids.dim();
        let ids = Tensor::from_vec(ids.into_raw_vec(), (batch, words, chars), &self.device)?;
        let vectors = self.embeddings.forward(&ids)?;
        Ok(vectors.reshape((batch, words, chars * self.embedding_dimensions))?)
    }

    /// Word vectors `[batch, maxWords, embeddingDimensions]`
    pub fn embed<S: AsRef<str>>(&self, sentences: &[S]) -> Result<Tensor> {
        let ids = self.sentences_to_word_ids(sentences);
        let (batch, words, ngrams) = ids.dim();
        let ids = Tensor::from_vec(ids.into_raw_vec(), (batch, words, ngrams), &self.device)?;
        let vectors = self.embeddings.forward(&ids)?;
        Ok(combine_ngrams(&vectors)?)
    }
}

/// Sums `[batch, words, ngrams, dims]` vectors over the n-gram axis and L2 normalizes the
/// result, zero vectors stay zero
pub fn combine_ngrams(vectors: &Tensor) -> candle_core::Result<Tensor> {
    let summed = vectors.sum(2)?;
    let norms = summed.sqr()?.sum_keepdim(2)?.maximum(1e-12)?.sqrt()?;
    summed.broadcast_div(&norms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::*;

    fn encoder(max_words: usize) -> EmbeddingEncoder {
        let dictionary = Arc::new(test_dictionary(4));
        let params = test_dataset_params(max_words, true);
        let definition = test_pipeline_definition(4);
        EmbeddingEncoder::new(
            EmbeddingSource::Dictionary(dictionary),
            &params,
            &definition,
            &Device::Cpu,
        )
        .unwrap()
    }

    #[test]
    fn test_word_ids_fallbacks() {
        // Given
        let dictionary = test_dictionary(4);
        let encoder = encoder(4);
        let id = |key: &str| dictionary.id(key).unwrap();

        // When
        let ids = encoder.sentences_to_word_ids(&["play yes dz"]);

        // Then
        assert_eq!((1, 4, 6), ids.dim());
        assert_eq!(array![id("play"), 0, 0, 0, 0, 0], ids.slice(s![0, 0, ..]));
        assert_eq!(array![id("ye"), id("es"), 0, 0, 0, 0], ids.slice(s![0, 1, ..]));
        assert_eq!(array![id("d"), id("z"), 0, 0, 0, 0], ids.slice(s![0, 2, ..]));
        assert_eq!(Array1::<u32>::zeros(6), ids.slice(s![0, 3, ..]));
    }

    #[test]
    fn test_word_ids_truncation() {
        // Given
        let encoder = encoder(2);

        // When
        let ids = encoder.sentences_to_word_ids(&["one two three", "abcdefghij"]);

        // Then
        assert_eq!((2, 2, 6), ids.dim());
        assert!(ids.slice(s![0, 1, ..]).iter().any(|id| *id != 0));
        assert!(ids.slice(s![1, 0, ..]).iter().all(|id| *id != 0));
    }

    #[test]
    fn test_empty_sentence_yields_zero_ids() {
        let encoder = encoder(3);
        let ids = encoder.sentences_to_word_ids(&[""]);
        assert!(ids.iter().all(|id| *id == 0));
    }

    #[test]
    fn test_embed_shape_and_padding() {
        // Given
        let encoder = encoder(8);

        // When
        let embedded = encoder
            .embed(&["play Yesterday by the Beatles!"])
            .unwrap();

        // Then
        assert_eq!(&[1, 8, 4], embedded.dims());
        let rows = embedded.squeeze(0).unwrap().to_vec2::<f32>().unwrap();
        for row in &rows[..5] {
            let norm: f32 = row.iter().map(|value| value * value).sum::<f32>().sqrt();
            assert!(epsilon_eq(1.0, norm, 1e-4));
        }
        for row in &rows[5..] {
            assert!(row.iter().all(|value| *value == 0.0));
        }
    }

    #[test]
    fn test_character_vectors() {
        // Given
        let dictionary = test_dictionary(4);
        let encoder = encoder(2);

        // When
        let vectors = encoder.sentences_to_character_vectors(&["ab"]).unwrap();

        // Then
        assert_eq!(&[1, 2, 16], vectors.dims());
        let rows = vectors.squeeze(0).unwrap().to_vec2::<f32>().unwrap();
        let mut expected = dictionary.vector("a").unwrap().to_vec();
        expected.extend(dictionary.vector("b").unwrap().to_vec());
        expected.extend(vec![0.0; 8]);
        assert_eq!(expected, rows[0]);
        assert!(rows[1].iter().all(|value| *value == 0.0));
    }

    #[test]
    fn test_combine_ngrams_guards_zero_vectors() {
        let vectors = Tensor::zeros((1, 2, 3, 4), DType::F32, &Device::Cpu).unwrap();
        let combined = combine_ngrams(&vectors).unwrap();
        let values = combined.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!(values.iter().all(|value| *value == 0.0));
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let params = test_dataset_params(4, true);
        let definition = test_pipeline_definition(8);
        let result = EmbeddingEncoder::new(
            EmbeddingSource::Dictionary(Arc::new(test_dictionary(4))),
            &params,
            &definition,
            &Device::Cpu,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_save_and_reload_table() {
        // Given
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("embedding.safetensors");
        let encoder = encoder(4);
        encoder.save(&path).unwrap();

        // When
        let reloaded = EmbeddingEncoder::new(
            EmbeddingSource::Pretrained {
                ngram_to_id: encoder.ngram_to_id().clone(),
                weights: path,
            },
            &test_dataset_params(4, true),
            &test_pipeline_definition(4),
            &Device::Cpu,
        )
        .unwrap();

        // Then
        let sentences = ["weather in paris"];
        let expected = encoder.embed(&sentences).unwrap().flatten_all().unwrap();
        let actual = reloaded.embed(&sentences).unwrap().flatten_all().unwrap();
        assert_eq!(
            expected.to_vec1::<f32>().unwrap(),
            actual.to_vec1::<f32>().unwrap()
        );
    }
}
