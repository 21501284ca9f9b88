use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::utils::{IntentName, SlotName};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationPrediction {
    pub sentence: String,
    pub intent: IntentName,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotPrediction {
    pub confidence: f32,
    pub value: String,
}

pub type SlotsPredicted = HashMap<SlotName, Vec<SlotPrediction>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NerPrediction {
    pub sentence: String,
    pub slots: SlotsPredicted,
}

/// Most likely tag of a single word
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordTagPrediction {
    pub highest_index: usize,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionStats {
    pub correct: usize,
    pub wrong: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub low_confidence: Option<usize>,
}

impl PredictionStats {
    pub fn total(&self) -> usize {
        self.correct + self.wrong + self.low_confidence.unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelinePrediction {
    pub classification: Vec<ClassificationPrediction>,
    pub ner: Vec<NerPrediction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTestStats {
    pub classification_stats: PredictionStats,
    pub ner_stats: PredictionStats,
}
