use std::path::Path;
use std::sync::Arc;

use candle_core::{DType, Device, Tensor, D};
use candle_nn::ops::softmax;
use candle_nn::{AdamW, Optimizer, VarBuilder, VarMap};
use failure::{format_err, ResultExt};
use log::{debug, error, info, warn};

use super::{ConvIntentNetwork, IntentClassifier};
use crate::embeddings::EmbeddingEncoder;
use crate::errors::*;
use crate::models::{
    ClassificationPrediction, DatasetParams, ModelSource, PipelineDefinition, PredictionStats,
    TestingExamples, TrainingExamples,
};
use crate::training::{
    adam_params, batch_ranges, fit, train_in_batches, BatchStats, BatchTrainingConfig,
    FitConfig, TrainingReport,
};
use crate::utils::{argmax, one_hot, write_atomically};

pub struct ConvIntentClassifier {
    dataset_params: Arc<DatasetParams>,
    encoder: Arc<EmbeddingEncoder>,
    definition: PipelineDefinition,
    varmap: VarMap,
    network: ConvIntentNetwork,
}

impl ConvIntentClassifier {
    pub fn new(
        dataset_params: Arc<DatasetParams>,
        encoder: Arc<EmbeddingEncoder>,
        definition: PipelineDefinition,
        source: &ModelSource,
    ) -> Result<Self> {
        let mut varmap = VarMap::new();
        let network = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, encoder.device());
            ConvIntentNetwork::new(
                encoder.embedding_dimensions(),
                &definition.classification.filter_sizes,
                definition.classification.num_filters,
                dataset_params.nb_intents(),
                definition.default.drop,
                vb.pp("intent_classifier"),
            )?
        };
        if let ModelSource::Pretrained(path) = source {
            info!("Loading intent classifier weights ({:?}) ...", path);
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
}

/// One-hot intent labels `[batch, intents]`
pub fn intent_labels(intents: &[usize], nb_intents: usize, device: &Device) -> Result<Tensor> {
    if let Some(intent) = intents.iter().find(|intent| **intent >= nb_intents) {
        return Err(NluError::InvalidDataset(format!(
            "intent id {} is out of the {} known intents",
            intent, nb_intents
        ))
        .into());
    }
    Ok(Tensor::from_vec(
        one_hot(intents, nb_intents),
        (intents.len(), nb_intents),
        device,
    )?)
}

/// Counts one tested sentence, a confidence below `threshold` wins over correctness
fn record_classification(
    stats: &mut PredictionStats,
    prediction: &ClassificationPrediction,
    expected_intent: &str,
    threshold: f32,
) {
    if prediction.confidence < threshold {
        stats.low_confidence = Some(stats.low_confidence.unwrap_or(0) + 1);
        warn!(
            "LOW CONFIDENCE: '{}' predicted as {} ({:.3}), expected {}",
            prediction.sentence, prediction.intent, prediction.confidence, expected_intent
        );
    } else if prediction.intent == expected_intent {
        stats.correct += 1;
        debug!(
            "CORRECT: '{}' predicted as {} ({:.3})",
            prediction.sentence, prediction.intent, prediction.confidence
        );
    } else {
        stats.wrong += 1;
        error!(
            "WRONG: '{}' predicted as {} ({:.3}), expected {}",
            prediction.sentence, prediction.intent, prediction.confidence, expected_intent
        );
    }
}

impl IntentClassifier for ConvIntentClassifier {
    fn predict(&self, sentences: &[String]) -> Result<Vec<ClassificationPrediction>> {
        if sentences.is_empty() {
            return Ok(vec![]);
        }
        let embedded = self.encoder.embed(sentences)?;
        let logits = self.network.forward_t(&embedded, false)?;
        let probabilities = softmax(&logits, D::Minus1)?.to_vec2::<f32>()?;
        sentences
            .iter()
            .zip(probabilities)
            .map(|(sentence, probabilities)| -> Result<ClassificationPrediction> {
                let (index, confidence) = argmax(&probabilities)
                    .ok_or_else(|| format_err!("No intent probabilities for '{}'", sentence))?;
                let intent = self
                    .dataset_params
                    .intents
                    .get(index)
                    .ok_or_else(|| format_err!("Predicted intent index {} is unknown", index))?;
                Ok(ClassificationPrediction {
                    sentence: sentence.clone(),
                    intent: intent.clone(),
                    confidence,
                })
            })
            .collect()
    }

    fn train(
        &mut self,
        examples: &TrainingExamples,
        on_batch: &mut dyn FnMut(&BatchStats),
    ) -> Result<TrainingReport> {
        let labelled = examples.labelled()?;
        let mut optimizer = AdamW::new(self.varmap.all_vars(), adam_params())?;
        let nb_intents = self.dataset_params.nb_intents();
        let fit_config = FitConfig {
            epochs: self.definition.classification.epochs,
            validation_split: self.definition.default.training_validation_split,
        };
        let batch_config = BatchTrainingConfig {
            batch_size: self.definition.default.batch_size,
            epochs: self.definition.classification.epochs,
            loss_threshold: self.definition.default.loss_threshold_to_stop_training,
        };
        let encoder = &self.encoder;
        let network = &self.network;

        train_in_batches(
            "Intent classifier",
            labelled.len(),
            batch_config,
            |range| {
                let batch = labelled.slice(range.start, range.end);
                let embedded = encoder.embed(batch.sentences)?;
                let labels = intent_labels(batch.intents, nb_intents, encoder.device())?;
                fit(
                    &mut optimizer,
                    &[embedded],
                    &labels,
                    fit_config,
                    |inputs, train| network.forward_t(&inputs[0], train),
                )
            },
            || self.tensors_in_memory(),
            on_batch,
        )
    }

    fn test(&self, examples: &TestingExamples) -> Result<PredictionStats> {
        let labelled = examples.labelled()?;
        let threshold = self.definition.classification.low_confidence_threshold;
        let mut stats = PredictionStats {
            low_confidence: Some(0),
            ..PredictionStats::default()
        };

        for range in batch_ranges(labelled.len(), self.definition.default.batch_size) {
            let batch = labelled.slice(range.start, range.end);
            let predictions = self.predict(batch.sentences)?;
            for (prediction, expected) in predictions.iter().zip(batch.intents) {
                let expected_intent =
                    self.dataset_params.intents.get(*expected).ok_or_else(|| {
                        NluError::InvalidDataset(format!("unknown intent id {}", expected))
                    })?;
                record_classification(&mut stats, prediction, expected_intent, threshold);
            }
        }

        info!("Intent classifier test results: {:?}", stats);
        Ok(stats)
    }

    fn save(&self, path: &Path) -> Result<()> {
        write_atomically(path, |temp_path| {
            self.varmap.save(temp_path)?;
            Ok(())
        })
    }
}
