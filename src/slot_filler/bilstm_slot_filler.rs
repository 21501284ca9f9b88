use std::path::Path;
use std::sync::Arc;

use candle_core::{DType, Device, Tensor, D};
use candle_nn::ops::softmax;
use candle_nn::{AdamW, Optimizer, VarBuilder, VarMap};
use failure::ResultExt;
use log::{debug, error, info, warn};

use super::{BiLstmTaggerNetwork, SlotFiller, TaggerDimensions};
use crate::embeddings::EmbeddingEncoder;
use crate::errors::*;
use crate::intent_classifier::intent_labels;
use crate::models::{
    ClassificationPrediction, DatasetParams, ModelSource, NerPrediction, PipelineDefinition,
    PredictionStats, TestingExamples, TrainingExamples, WordTagPrediction,
};
use crate::slot_utils::reduce_word_tags;
use crate::training::{
    adam_params, batch_ranges, fit, train_in_batches, BatchStats, BatchTrainingConfig,
    FitConfig, TrainingReport,
};
use crate::utils::{argmax, one_hot, write_atomically};

/// Number of sentences tagged at once while testing
const TEST_CHUNK_SIZE: usize = 100;

pub struct BiLstmSlotFiller {
    dataset_params: Arc<DatasetParams>,
    encoder: Arc<EmbeddingEncoder>,
    definition: PipelineDefinition,
    varmap: VarMap,
    network: BiLstmTaggerNetwork,
}

impl BiLstmSlotFiller {
    pub fn new(
        dataset_params: Arc<DatasetParams>,
        encoder: Arc<EmbeddingEncoder>,
        definition: PipelineDefinition,
        source: &ModelSource,
    ) -> Result<Self> {
        let dimensions = TaggerDimensions {
            nb_intents: dataset_params.nb_intents(),
            nb_slots: dataset_params.nb_slots(),
            embedding_dimensions: encoder.embedding_dimensions(),
            max_chars_per_word: encoder.max_chars_per_word(),
            num_filters: definition.ner.num_filters,
            rnn_size: definition
                .ner
                .rnn_size
                .unwrap_or(dataset_params.max_words_per_sentence),
        };
        let mut varmap = VarMap::new();
        let network = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, encoder.device());
            BiLstmTaggerNetwork::new(
                &dimensions,
                definition.ner.add_attention,
                definition.default.drop,
                vb.pp("slot_tagger"),
            )?
        };
        if let ModelSource::Pretrained(path) = source {
            info!("Loading slot tagger weights ({:?}) ...", path);
            varmap
                .load(path)
                .with_context(|_| NluError::ModelLoad(path.to_string_lossy().to_string()))?;
        }
        Ok(Self {
            dataset_params,
            encoder,
            definition,
            varmap,
            network,
        })
    }

    /// Model tensors held between batches: the variables plus the shared embedding table
    fn tensors_in_memory(&self) -> usize {
        self.varmap.all_vars().len() + 1
    }

    /// One-hot of the predicted intents, unknown intents are encoded as zeros
    fn intents_one_hot(&self, classifications: &[ClassificationPrediction]) -> Result<Tensor> {
        let nb_intents = self.dataset_params.nb_intents();
        let indexes: Vec<usize> = classifications
            .iter()
            .map(|prediction| {
                self.dataset_params
                    .intent_index(&prediction.intent)
                    .unwrap_or(nb_intents)
            })
            .collect();
        Ok(Tensor::from_vec(
            one_hot(&indexes, nb_intents),
            (indexes.len(), nb_intents),
            self.encoder.device(),
        )?)
    }
}

/// One-hot tag labels `[batch, maxWords, slots]`, tag sequences are right-padded with `O`
pub fn tag_labels(
    tags: &[Vec<usize>],
    max_words: usize,
    nb_slots: usize,
    device: &Device,
) -> Result<Tensor> {
    let mut padded = Vec::with_capacity(tags.len() * max_words);
    for sentence_tags in tags {
        if let Some(tag) = sentence_tags.iter().find(|tag| **tag >= nb_slots) {
            return Err(NluError::InvalidDataset(format!(
                "slot id {} is out of the {} known slots",
                tag, nb_slots
            ))
            .into());
        }
        if sentence_tags.len() > max_words {
            warn!(
                "{} slot tags found for at most {} words, extra tags are ignored",
                sentence_tags.len(),
                max_words
            );
        }
        padded.extend(sentence_tags.iter().cloned().take(max_words));
        padded.extend(::std::iter::repeat(0).take(max_words.saturating_sub(sentence_tags.len())));
    }
    Ok(Tensor::from_vec(
        one_hot(&padded, nb_slots),
        (tags.len(), max_words, nb_slots),
        device,
    )?)
}

/// Counts one tested sentence, correct only when every expected tag was predicted
fn record_tagging(
    stats: &mut PredictionStats,
    sentence: &str,
    expected_tags: &[usize],
    predicted_tags: &[WordTagPrediction],
    max_words: usize,
) {
    let is_correct = expected_tags
        .iter()
        .take(max_words)
        .zip(predicted_tags)
        .all(|(expected, predicted)| *expected == predicted.highest_index);
    let predicted: Vec<usize> = predicted_tags
        .iter()
        .take(expected_tags.len())
        .map(|tag| tag.highest_index)
        .collect();
    if is_correct {
        stats.correct += 1;
        debug!("CORRECT: '{}' tagged as {:?}", sentence, predicted);
    } else {
        stats.wrong += 1;
        error!(
            "WRONG: '{}' tagged as {:?}, expected {:?}",
            sentence, predicted, expected_tags
        );
    }
}

impl SlotFiller for BiLstmSlotFiller {
    fn raw_prediction(
        &self,
        sentences: &[String],
        classifications: &[ClassificationPrediction],
    ) -> Result<Vec<Vec<WordTagPrediction>>> {
        if sentences.len() != classifications.len() {
            return Err(NluError::InvalidDataset(format!(
                "{} sentences but {} intent predictions",
                sentences.len(),
                classifications.len()
            ))
            .into());
        }
        if sentences.is_empty() {
            return Ok(vec![]);
        }
        let intents = self.intents_one_hot(classifications)?;
        let words = self.encoder.embed(sentences)?;
        let chars = self.encoder.sentences_to_character_vectors(sentences)?;
        let logits = self.network.forward_t(&intents, &words, &chars, false)?;
        let probabilities = softmax(&logits, D::Minus1)?.to_vec3::<f32>()?;
        Ok(probabilities
            .into_iter()
            .map(|sentence| {
                sentence
                    .iter()
                    .map(|word| {
                        let (highest_index, confidence) = argmax(word).unwrap_or((0, 0.0));
                        WordTagPrediction {
                            highest_index,
                            confidence,
                        }
                    })
                    .collect()
            })
            .collect())
    }

    fn predict(
        &self,
        sentences: &[String],
        classifications: &[ClassificationPrediction],
    ) -> Result<Vec<NerPrediction>> {
        let raw_predictions = self.raw_prediction(sentences, classifications)?;
        let tokenizer = self.dataset_params.language.tokenizer();
        let slot_names = self.dataset_params.slot_names();
        let threshold = self.definition.ner.low_confidence_threshold;
        Ok(sentences
            .iter()
            .zip(raw_predictions)
            .map(|(sentence, tags)| {
                let words = tokenizer.split_sentence_to_words(sentence);
                NerPrediction {
                    sentence: sentence.clone(),
                    slots: reduce_word_tags(&words, &tags, &slot_names, threshold),
                }
            })
            .collect())
    }

    fn train(
        &mut self,
        examples: &TrainingExamples,
        on_batch: &mut dyn FnMut(&BatchStats),
    ) -> Result<TrainingReport> {
        let labelled = examples.labelled()?;
        let mut optimizer = AdamW::new(self.varmap.all_vars(), adam_params())?;
        let nb_intents = self.dataset_params.nb_intents();
        let nb_slots = self.dataset_params.nb_slots();
        let max_words = self.dataset_params.max_words_per_sentence;
        let fit_config = FitConfig {
            epochs: self.definition.ner.epochs,
            validation_split: self.definition.default.training_validation_split,
        };
        let batch_config = BatchTrainingConfig {
            batch_size: self.definition.default.batch_size,
            epochs: self.definition.ner.epochs,
            loss_threshold: self.definition.default.loss_threshold_to_stop_training,
        };
        let encoder = &self.encoder;
        let network = &self.network;

        train_in_batches(
            "Slot tagger",
            labelled.len(),
            batch_config,
            |range| {
                let batch = labelled.slice(range.start, range.end);
                let intents = intent_labels(batch.intents, nb_intents, encoder.device())?;
                let words = encoder.embed(batch.sentences)?;
                let chars = encoder.sentences_to_character_vectors(batch.sentences)?;
                let labels = tag_labels(batch.tags, max_words, nb_slots, encoder.device())?;
                fit(
                    &mut optimizer,
                    &[intents, words, chars],
                    &labels,
                    fit_config,
                    |inputs, train| network.forward_t(&inputs[0], &inputs[1], &inputs[2], train),
                )
            },
            || self.tensors_in_memory(),
            on_batch,
        )
    }

    fn test(&self, examples: &TestingExamples) -> Result<PredictionStats> {
        let labelled = examples.labelled()?;
        let max_words = self.dataset_params.max_words_per_sentence;
        let mut stats = PredictionStats::default();

        for range in batch_ranges(labelled.len(), TEST_CHUNK_SIZE) {
            let batch = labelled.slice(range.start, range.end);
            let classifications = batch
                .sentences
                .iter()
                .zip(batch.intents)
                .map(|(sentence, intent)| -> Result<ClassificationPrediction> {
                    let intent = self.dataset_params.intents.get(*intent).ok_or_else(|| {
                        NluError::InvalidDataset(format!("unknown intent id {}", intent))
                    })?;
                    Ok(ClassificationPrediction {
                        sentence: sentence.clone(),
                        intent: intent.clone(),
                        confidence: 1.0,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let raw_predictions = self.raw_prediction(batch.sentences, &classifications)?;

            for ((sentence, expected_tags), predicted_tags) in batch
                .sentences
                .iter()
                .zip(batch.tags)
                .zip(&raw_predictions)
            {
                record_tagging(&mut stats, sentence, expected_tags, predicted_tags, max_words);
            }
        }

        info!("Slot tagger test results: {:?}", stats);
        Ok(stats)
    }

    fn save(&self, path: &Path) -> Result<()> {
        write_atomically(path, |temp_path| {
            self.varmap.save(temp_path)?;
            Ok(())
        })
    }
}
