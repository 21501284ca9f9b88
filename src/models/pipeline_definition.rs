use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use failure::ResultExt;
use serde::{Deserialize, Serialize};

use crate::errors::*;

/// Hyper-parameters shared by the intent classifier and the slot tagger
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DefaultParams {
    pub batch_size: usize,
    pub drop: f32,
    pub embedding_dimensions: usize,
    /// Training stops once both training and validation losses fall below this value,
    /// 0 disables early stopping
    pub loss_threshold_to_stop_training: f32,
    pub max_ngrams: usize,
    pub training_validation_split: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassificationParams {
    pub epochs: usize,
    pub filter_sizes: [usize; 3],
    pub low_confidence_threshold: f32,
    pub num_filters: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NerParams {
    pub add_attention: bool,
    pub epochs: usize,
    pub low_confidence_threshold: f32,
    pub max_chars_per_word: usize,
    /// Filters of the word convolutions and of the character convolutions
    pub num_filters: [usize; 2],
    /// Units of each LSTM direction, defaults to the max number of words per sentence
    pub rnn_size: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineDefinition {
    pub default: DefaultParams,
    pub classification: ClassificationParams,
    pub ner: NerParams,
}

/// Configuration used whenever a field is not provided
pub const DEFAULT_PIPELINE_DEFINITION: PipelineDefinition = PipelineDefinition {
    default: DefaultParams {
        batch_size: 50,
        drop: 0.5,
        embedding_dimensions: 300,
        loss_threshold_to_stop_training: 0.0,
        max_ngrams: 20,
        training_validation_split: 0.3,
    },
    classification: ClassificationParams {
        epochs: 5,
        filter_sizes: [2, 4, 8],
        low_confidence_threshold: 0.3,
        num_filters: 128,
    },
    ner: NerParams {
        add_attention: false,
        epochs: 5,
        low_confidence_threshold: 0.2,
        max_chars_per_word: 20,
        num_filters: [128, 128],
        rnn_size: None,
    },
};

impl Default for PipelineDefinition {
    fn default() -> Self {
        DEFAULT_PIPELINE_DEFINITION
    }
}

impl Default for DefaultParams {
    fn default() -> Self {
        DEFAULT_PIPELINE_DEFINITION.default
    }
}

impl Default for ClassificationParams {
    fn default() -> Self {
        DEFAULT_PIPELINE_DEFINITION.classification
    }
}

impl Default for NerParams {
    fn default() -> Self {
        DEFAULT_PIPELINE_DEFINITION.ner
    }
}

fn check(condition: bool, message: &str) -> Result<()> {
    if !condition {
        return Err(NluError::InvalidConfiguration(message.to_string()).into());
    }
    Ok(())
}

impl PipelineDefinition {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|_| NluError::ModelLoad(path.to_string_lossy().to_string()))?;
        let definition: PipelineDefinition = serde_json::from_reader(BufReader::new(file))
            .with_context(|_| format!("Invalid pipeline definition file {:?}", path))?;
        definition.validate()?;
        Ok(definition)
    }

    pub fn validate(&self) -> Result<()> {
        let default = &self.default;
        check(default.batch_size > 0, "default.batchSize must be positive")?;
        check(
            default.drop >= 0.0 && default.drop < 1.0,
            "default.drop must be in [0, 1)",
        )?;
        check(
            default.embedding_dimensions > 0,
            "default.embeddingDimensions must be positive",
        )?;
        check(default.max_ngrams > 0, "default.maxNgrams must be positive")?;
        check(
            default.training_validation_split >= 0.0 && default.training_validation_split < 1.0,
            "default.trainingValidationSplit must be in [0, 1)",
        )?;
        check(
            default.loss_threshold_to_stop_training >= 0.0,
            "default.lossThresholdToStopTraining must not be negative",
        )?;

        let classification = &self.classification;
        check(classification.epochs > 0, "classification.epochs must be positive")?;
        check(
            classification.filter_sizes.iter().all(|size| *size > 0),
            "classification.filterSizes must be positive",
        )?;
        check(
            classification.num_filters > 0,
            "classification.numFilters must be positive",
        )?;
        check(
            (0.0..=1.0).contains(&classification.low_confidence_threshold),
            "classification.lowConfidenceThreshold must be in [0, 1]",
        )?;

        let ner = &self.ner;
        check(ner.epochs > 0, "ner.epochs must be positive")?;
        check(
            ner.max_chars_per_word > 0,
            "ner.maxCharsPerWord must be positive",
        )?;
        check(
            ner.num_filters.iter().all(|filters| *filters > 0),
            "ner.numFilters must be positive",
        )?;
        check(
            ner.rnn_size.map_or(true, |size| size > 0),
            "ner.rnnSize must be positive",
        )?;
        check(
            (0.0..=1.0).contains(&ner.low_confidence_threshold),
            "ner.lowConfidenceThreshold must be in [0, 1]",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_definition_is_merged_with_defaults() {
        // Given
        let data = r#"{
            "default": {"batchSize": 10, "embeddingDimensions": 16},
            "ner": {"addAttention": true}
        }"#;

        // When
        let definition: PipelineDefinition = serde_json::from_str(data).unwrap();

        // Then
        assert_eq!(10, definition.default.batch_size);
        assert_eq!(16, definition.default.embedding_dimensions);
        assert_eq!(0.5, definition.default.drop);
        assert_eq!(DEFAULT_PIPELINE_DEFINITION.classification, definition.classification);
        assert!(definition.ner.add_attention);
        assert_eq!([128, 128], definition.ner.num_filters);
        assert!(definition.validate().is_ok());
    }

    #[test]
    fn test_empty_document_yields_defaults() {
        let definition: PipelineDefinition = serde_json::from_str("{}").unwrap();
        assert_eq!(DEFAULT_PIPELINE_DEFINITION, definition);
    }

    #[test]
    fn test_validate_rejects_invalid_values() {
        let mut definition = PipelineDefinition::default();
        definition.default.drop = 1.0;
        assert!(definition.validate().is_err());

        let mut definition = PipelineDefinition::default();
        definition.classification.filter_sizes = [2, 0, 8];
        assert!(definition.validate().is_err());

        let mut definition = PipelineDefinition::default();
        definition.default.batch_size = 0;
        assert!(definition.validate().is_err());
    }
}
