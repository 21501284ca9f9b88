mod generator;

use std::cmp;
use std::collections::HashMap;
use std::iter;
use std::path::Path;

use indexmap::IndexSet;
use itertools::Itertools;
use log::info;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::errors::*;
use crate::language::Language;
use crate::models::{DatasetParams, TestingExamples, TrainingExamples, NO_SLOT_TAG};
use crate::tokenizer::Tokenizer;
use crate::utils::{write_json, IntentName, SlotName};

pub use self::generator::{
    read_generated_dataset, GeneratedDataset, SentenceGenerator, SentenceToken,
};

const DATASET_PARAMS_FILE: &str = "dataset_params.json";
const TRAINING_FILE: &str = "dataset_training.json";
const TESTING_FILE: &str = "dataset_testing.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntentSplitStats {
    pub intent: IntentName,
    pub training: usize,
    pub testing: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub params: DatasetParams,
    pub training: TrainingExamples,
    pub testing: TestingExamples,
    pub stats: Vec<IntentSplitStats>,
}

impl Dataset {
    pub fn write_to_dir<P: AsRef<Path>>(&self, directory: P) -> Result<()> {
        let directory = directory.as_ref();
        write_json(directory.join(DATASET_PARAMS_FILE), &self.params)?;
        write_json(directory.join(TRAINING_FILE), &self.training)?;
        write_json(directory.join(TESTING_FILE), &self.testing)?;
        info!("Dataset written in {:?}", directory);
        Ok(())
    }
}

struct LabelledSentence {
    sentence: String,
    intent: usize,
    tags: Vec<usize>,
}

struct VocabularyBuilder {
    tokenizer: &'static dyn Tokenizer,
    slots_to_id: HashMap<SlotName, usize>,
    intents_with_slots: IndexSet<IntentName>,
    max_words: usize,
}

impl VocabularyBuilder {
    fn new(tokenizer: &'static dyn Tokenizer) -> Self {
        let mut slots_to_id = HashMap::new();
        slots_to_id.insert(NO_SLOT_TAG.to_string(), 0);
        Self {
            tokenizer,
            slots_to_id,
            intents_with_slots: IndexSet::new(),
            max_words: 0,
        }
    }

    fn slot_id(&mut self, slot: &str) -> usize {
        let next_id = self.slots_to_id.len();
        *self.slots_to_id.entry(slot.to_string()).or_insert(next_id)
    }

    fn label(&mut self, intent: &str, intent_id: usize, tokens: &[SentenceToken]) -> LabelledSentence {
        let sentence = tokens.iter().map(|token| &token.value).join("");
        let mut tags = vec![];
        for token in tokens {
            let nb_words = self.tokenizer.split_sentence_to_words(&token.value).len();
            let tag = match &token.slot {
                Some(slot) => {
                    self.intents_with_slots.insert(intent.to_string());
                    self.slot_id(slot)
                }
                None => 0,
            };
            tags.extend(iter::repeat(tag).take(nb_words));
        }
        let nb_words = self.tokenizer.split_sentence_to_words(&sentence).len();
        self.max_words = cmp::max(self.max_words, nb_words);
        LabelledSentence {
            sentence,
            intent: intent_id,
            tags,
        }
    }

    fn label_all(
        &mut self,
        intent: &str,
        intent_id: usize,
        sentences: &[Vec<SentenceToken>],
    ) -> Vec<LabelledSentence> {
        sentences
            .iter()
            .map(|tokens| self.label(intent, intent_id, tokens))
            .collect_vec()
    }

    fn into_params(self, intents: Vec<IntentName>, language: Language) -> DatasetParams {
        DatasetParams {
            max_words_per_sentence: self.max_words,
            slots_to_id: self.slots_to_id,
            intents,
            intents_with_slots: self.intents_with_slots,
            language,
        }
    }
}

fn training_examples(sentences: Vec<LabelledSentence>) -> TrainingExamples {
    let mut examples = TrainingExamples::default();
    for labelled in sentences {
        examples.train_x.push(labelled.sentence);
        examples.train_y.push(labelled.intent);
        examples.train_y2.push(labelled.tags);
    }
    examples
}

fn testing_examples(sentences: Vec<LabelledSentence>) -> TestingExamples {
    let mut examples = TestingExamples::default();
    for labelled in sentences {
        examples.test_x.push(labelled.sentence);
        examples.test_y.push(labelled.intent);
        examples.test_y2.push(labelled.tags);
    }
    examples
}

/// Turns generated sentences into label encoded, shuffled training and testing sets
pub struct DatasetBuilder {
    language: Language,
}

impl DatasetBuilder {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    /// Intents are the ones of `training`, `testing` must not introduce new intents
    pub fn build_from_split<R: Rng>(
        &self,
        training: &GeneratedDataset,
        testing: &GeneratedDataset,
        rng: &mut R,
    ) -> Result<Dataset> {
        if training.is_empty() {
            return Err(NluError::InvalidDataset("no training intents".to_string()).into());
        }
        if let Some(intent) = testing.keys().find(|intent| !training.contains_key(*intent)) {
            return Err(NluError::UnknownIntent(intent.clone()).into());
        }

        let mut vocabulary = VocabularyBuilder::new(self.language.tokenizer());
        let mut training_sentences = vec![];
        let mut testing_sentences = vec![];
        let mut stats = vec![];
        for (intent_id, (intent, sentences)) in training.iter().enumerate() {
            let intent_training = vocabulary.label_all(intent, intent_id, sentences);
            let intent_testing = match testing.get(intent) {
                Some(sentences) => vocabulary.label_all(intent, intent_id, sentences),
                None => vec![],
            };
            stats.push(IntentSplitStats {
                intent: intent.clone(),
                training: intent_training.len(),
                testing: intent_testing.len(),
            });
            training_sentences.extend(intent_training);
            testing_sentences.extend(intent_testing);
        }

        let intents = training.keys().cloned().collect();
        Ok(self.finish(vocabulary, intents, training_sentences, testing_sentences, stats, rng))
    }

    /// Each intent contributes at most `max_training_examples_per_intent` randomly picked
    /// sentences to the training set, the others go to the testing set
    pub fn build_from_combined<R: Rng>(
        &self,
        dataset: &GeneratedDataset,
        max_training_examples_per_intent: usize,
        rng: &mut R,
    ) -> Result<Dataset> {
        if dataset.is_empty() {
            return Err(NluError::InvalidDataset("no intents".to_string()).into());
        }
        let mut vocabulary = VocabularyBuilder::new(self.language.tokenizer());
        let mut training_sentences = vec![];
        let mut testing_sentences = vec![];
        let mut stats = vec![];
        for (intent_id, (intent, sentences)) in dataset.iter().enumerate() {
            let mut labelled = vocabulary.label_all(intent, intent_id, sentences);
            labelled.shuffle(rng);
            let nb_training = cmp::min(max_training_examples_per_intent, labelled.len());
            let intent_testing = labelled.split_off(nb_training);
            stats.push(IntentSplitStats {
                intent: intent.clone(),
                training: labelled.len(),
                testing: intent_testing.len(),
            });
            training_sentences.extend(labelled);
            testing_sentences.extend(intent_testing);
        }

        let intents = dataset.keys().cloned().collect();
        Ok(self.finish(vocabulary, intents, training_sentences, testing_sentences, stats, rng))
    }

    /// Generates the sentences of every grammar and merges them by intent before splitting
    pub fn build_from_grammars<G: SentenceGenerator, R: Rng>(
        &self,
        generator: &G,
        grammars: &[&str],
        max_training_examples_per_intent: usize,
        rng: &mut R,
    ) -> Result<Dataset> {
        let mut merged = GeneratedDataset::new();
        for grammar in grammars {
            for (intent, sentences) in generator.generate(grammar)? {
                merged.entry(intent).or_insert_with(Vec::new).extend(sentences);
            }
        }
        self.build_from_combined(&merged, max_training_examples_per_intent, rng)
    }

    fn finish<R: Rng>(
        &self,
        vocabulary: VocabularyBuilder,
        intents: Vec<IntentName>,
        mut training_sentences: Vec<LabelledSentence>,
        mut testing_sentences: Vec<LabelledSentence>,
        stats: Vec<IntentSplitStats>,
        rng: &mut R,
    ) -> Dataset {
        training_sentences.shuffle(rng);
        testing_sentences.shuffle(rng);
        let params = vocabulary.into_params(intents, self.language);
        info!(
            "Dataset built: {} training and {} testing examples, {} intents, {} slot tags, {} words per sentence",
            training_sentences.len(),
            testing_sentences.len(),
            params.nb_intents(),
            params.nb_slots(),
            params.max_words_per_sentence
        );
        Dataset {
            params,
            training: training_examples(training_sentences),
            testing: testing_examples(testing_sentences),
            stats,
        }
    }
}
