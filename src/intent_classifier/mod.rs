mod conv_intent_classifier;
mod network;

use std::path::Path;

use crate::errors::*;
use crate::models::{ClassificationPrediction, PredictionStats, TestingExamples, TrainingExamples};
use crate::training::{BatchStats, TrainingReport};

pub use self::conv_intent_classifier::{intent_labels, ConvIntentClassifier};
pub use self::network::ConvIntentNetwork;

pub trait IntentClassifier: Send + Sync {
    fn predict(&self, sentences: &[String]) -> Result<Vec<ClassificationPrediction>>;

    fn train(
        &mut self,
        examples: &TrainingExamples,
        on_batch: &mut dyn FnMut(&BatchStats),
    ) -> Result<TrainingReport>;

    fn test(&self, examples: &TestingExamples) -> Result<PredictionStats>;

    fn save(&self, path: &Path) -> Result<()>;
}
