pub mod dataset;
pub mod dictionary;
mod embeddings;
pub mod errors;
mod intent_classifier;
mod language;
mod layers;
pub mod models;
mod nlu_pipeline;
mod slot_filler;
mod slot_utils;
#[cfg(test)]
mod testutils;
mod tokenizer;
pub mod training;
mod utils;

pub const MODEL_VERSION: &str = "0.1.0";

pub use crate::dataset::{Dataset, DatasetBuilder, GeneratedDataset, SentenceGenerator};
pub use crate::dictionary::PretrainedDictionary;
pub use crate::embeddings::{combine_ngrams, EmbeddingEncoder, EmbeddingSource};
pub use crate::errors::*;
pub use crate::intent_classifier::{ConvIntentClassifier, IntentClassifier};
pub use crate::language::Language;
pub use crate::models::*;
pub use crate::nlu_pipeline::{NluPipeline, PretrainedModels, SavePaths};
pub use crate::slot_filler::{BiLstmSlotFiller, SlotFiller};
pub use crate::slot_utils::reduce_word_tags;
pub use crate::tokenizer::{EnglishTokenizer, SpanishTokenizer, Tokenizer, UNKNOWN_NGRAM_KEY};
pub use crate::training::{LoggingStatsHandler, TrainStatsHandler};
pub use crate::utils::{IntentName, SlotName};
