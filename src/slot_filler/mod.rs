mod attention;
mod bilstm_slot_filler;
mod network;

use std::path::Path;

use crate::errors::*;
use crate::models::{
    ClassificationPrediction, NerPrediction, PredictionStats, TestingExamples, TrainingExamples,
    WordTagPrediction,
};
use crate::training::{BatchStats, TrainingReport};

pub use self::bilstm_slot_filler::BiLstmSlotFiller;
pub use self::network::{BiLstmTaggerNetwork, TaggerDimensions};

pub trait SlotFiller: Send + Sync {
    /// Most likely tag of every word position, `maxWordsPerSentence` entries per sentence
    fn raw_prediction(
        &self,
        sentences: &[String],
        classifications: &[ClassificationPrediction],
    ) -> Result<Vec<Vec<WordTagPrediction>>>;

    fn predict(
        &self,
        sentences: &[String],
        classifications: &[ClassificationPrediction],
    ) -> Result<Vec<NerPrediction>>;

    fn train(
        &mut self,
        examples: &TrainingExamples,
        on_batch: &mut dyn FnMut(&BatchStats),
    ) -> Result<TrainingReport>;

    fn test(&self, examples: &TestingExamples) -> Result<PredictionStats>;

    fn save(&self, path: &Path) -> Result<()>;
}
