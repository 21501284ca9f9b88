use ndarray::prelude::*;

use indexmap::IndexSet;
use maplit::hashmap;

use crate::dictionary::PretrainedDictionary;
use crate::language::Language;
use crate::models::{DatasetParams, PipelineDefinition, TestingExamples, TrainingExamples};
use crate::tokenizer::UNKNOWN_NGRAM_KEY;

pub fn assert_epsilon_eq_array1(a: &Array1<f32>, b: &Array1<f32>, epsilon: f32) {
    assert_eq!(a.dim(), b.dim());
    for (index, elem_a) in a.indexed_iter() {
        assert!(epsilon_eq(*elem_a, b[index], epsilon))
    }
}

pub fn epsilon_eq(a: f32, b: f32, epsilon: f32) -> bool {
    let diff = a - b;
    diff < epsilon && diff > -epsilon
}

const TEST_WORDS: [&str; 6] = ["play", "the", "beatles", "weather", "in", "paris"];
const TEST_NGRAMS: [&str; 8] = ["pl", "la", "ay", "ye", "es", "st", "te", "er"];

fn test_vector(seed: usize, dimensions: usize) -> Vec<f32> {
    (0..dimensions)
        .map(|d| (((seed + 1) * 7 + d * 3) % 11) as f32 / 10.0 - 0.45)
        .collect()
}

/// Small deterministic dictionary with every ascii letter and digit, a few bigrams and words
pub fn test_dictionary(dimensions: usize) -> PretrainedDictionary {
    let keys = ('a'..='z')
        .chain('0'..='9')
        .map(|c| c.to_string())
        .chain(TEST_NGRAMS.iter().map(|ngram| ngram.to_string()))
        .chain(TEST_WORDS.iter().map(|word| word.to_string()));
    let mut entries = vec![(UNKNOWN_NGRAM_KEY.to_string(), vec![0.0; dimensions])];
    entries.extend(
        keys.enumerate()
            .map(|(index, key)| (key, test_vector(index, dimensions))),
    );
    PretrainedDictionary::from_entries(entries).unwrap()
}

pub fn test_dataset_params(max_words: usize, with_slots: bool) -> DatasetParams {
    let slots_to_id = if with_slots {
        hashmap!["O".to_string() => 0, "artist".to_string() => 1, "city".to_string() => 2]
    } else {
        hashmap!["O".to_string() => 0]
    };
    let intents_with_slots: IndexSet<String> = if with_slots {
        vec!["playMusic".to_string(), "getWeather".to_string()]
            .into_iter()
            .collect()
    } else {
        IndexSet::new()
    };
    DatasetParams {
        max_words_per_sentence: max_words,
        slots_to_id,
        intents: vec!["playMusic".to_string(), "getWeather".to_string()],
        intents_with_slots,
        language: Language::EN,
    }
}

/// Tiny networks which train in a few milliseconds
pub fn test_pipeline_definition(dimensions: usize) -> PipelineDefinition {
    let mut definition = PipelineDefinition::default();
    definition.default.batch_size = 4;
    definition.default.drop = 0.1;
    definition.default.embedding_dimensions = dimensions;
    definition.default.max_ngrams = 6;
    definition.classification.epochs = 2;
    definition.classification.filter_sizes = [1, 2, 3];
    definition.classification.num_filters = 4;
    definition.ner.epochs = 2;
    definition.ner.max_chars_per_word = 4;
    definition.ner.num_filters = [4, 4];
    definition
}

pub fn test_training_examples() -> TrainingExamples {
    TrainingExamples {
        train_x: vec![
            "play the beatles".to_string(),
            "weather in paris".to_string(),
            "play yesterday by the beatles".to_string(),
            "what is the weather in paris".to_string(),
            "play beatles".to_string(),
            "weather paris".to_string(),
        ],
        train_y: vec![0, 1, 0, 1, 0, 1],
        train_y2: vec![
            vec![0, 0, 1],
            vec![0, 0, 2],
            vec![0, 0, 0, 0, 1],
            vec![0, 0, 0, 0, 0, 2],
            vec![0, 1],
            vec![0, 2],
        ],
    }
}

pub fn test_testing_examples() -> TestingExamples {
    let training = test_training_examples();
    TestingExamples {
        test_x: training.train_x,
        test_y: training.train_y,
        test_y2: training.train_y2,
    }
}
