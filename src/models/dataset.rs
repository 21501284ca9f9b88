use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use failure::ResultExt;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::errors::*;
use crate::language::Language;
use crate::utils::{IntentName, SlotName};

/// Tag of the words which are not part of any slot
pub const NO_SLOT_TAG: &str = "O";

/// Vocabulary and shape information shared by every component of a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetParams {
    pub max_words_per_sentence: usize,
    pub slots_to_id: HashMap<SlotName, usize>,
    pub intents: Vec<IntentName>,
    pub intents_with_slots: IndexSet<IntentName>,
    pub language: Language,
}

impl DatasetParams {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|_| NluError::ModelLoad(path.to_string_lossy().to_string()))?;
        let params = serde_json::from_reader(BufReader::new(file))
            .with_context(|_| format!("Invalid dataset params file {:?}", path))?;
        Ok(params)
    }

    pub fn nb_intents(&self) -> usize {
        self.intents.len()
    }

    pub fn nb_slots(&self) -> usize {
        self.slots_to_id.len()
    }

    /// Slot tagging only makes sense when there is at least one tag besides `O`
    pub fn has_slots(&self) -> bool {
        self.nb_slots() >= 2
    }

    pub fn intent_index(&self, intent: &str) -> Option<usize> {
        self.intents.iter().position(|name| name == intent)
    }

    /// Slot names ordered by id
    pub fn slot_names(&self) -> Vec<&str> {
        let mut names = vec![""; self.slots_to_id.len()];
        for (name, id) in &self.slots_to_id {
            if let Some(slot) = names.get_mut(*id) {
                *slot = name.as_str();
            }
        }
        names
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_words_per_sentence == 0 {
            return Err(NluError::InvalidConfiguration(
                "maxWordsPerSentence must be strictly positive".to_string()
            )
            .into());
        }
        if self.intents.is_empty() {
            return Err(NluError::InvalidConfiguration(
                "at least one intent is required".to_string()
            )
            .into());
        }
        if self.slots_to_id.get(NO_SLOT_TAG) != Some(&0) {
            return Err(NluError::InvalidConfiguration(format!(
                "slotsToId must map '{}' to 0",
                NO_SLOT_TAG
            ))
            .into());
        }
        let mut ids: Vec<usize> = self.slots_to_id.values().cloned().collect();
        ids.sort_unstable();
        if ids.iter().enumerate().any(|(expected, id)| expected != *id) {
            return Err(NluError::InvalidConfiguration(format!(
                "slot ids must be dense, found {:?}",
                ids
            ))
            .into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingExamples {
    pub train_x: Vec<String>,
    pub train_y: Vec<usize>,
    pub train_y2: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestingExamples {
    pub test_x: Vec<String>,
    pub test_y: Vec<usize>,
    pub test_y2: Vec<Vec<usize>>,
}

/// Borrowed view over labelled sentences, shared by the training and testing code paths
#[derive(Debug, Clone, Copy)]
pub struct LabelledSentences<'a> {
    pub sentences: &'a [String],
    pub intents: &'a [usize],
    pub tags: &'a [Vec<usize>],
}

impl<'a> LabelledSentences<'a> {
    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn slice(&self, start: usize, end: usize) -> LabelledSentences<'a> {
        LabelledSentences {
            sentences: &self.sentences[start..end],
            intents: &self.intents[start..end],
            tags: &self.tags[start..end],
        }
    }

    fn validate(&self) -> Result<()> {
        if self.sentences.len() != self.intents.len() || self.sentences.len() != self.tags.len() {
            return Err(NluError::InvalidDataset(format!(
                "found {} sentences, {} intent labels and {} tag sequences",
                self.sentences.len(),
                self.intents.len(),
                self.tags.len()
            ))
            .into());
        }
        Ok(())
    }
}

impl TrainingExamples {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|_| NluError::ModelLoad(path.to_string_lossy().to_string()))?;
        let examples = serde_json::from_reader(BufReader::new(file))
            .with_context(|_| format!("Invalid training dataset file {:?}", path))?;
        Ok(examples)
    }

    pub fn labelled(&self) -> Result<LabelledSentences> {
        let labelled = LabelledSentences {
            sentences: &self.train_x,
            intents: &self.train_y,
            tags: &self.train_y2,
        };
        labelled.validate()?;
        Ok(labelled)
    }
}

impl TestingExamples {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|_| NluError::ModelLoad(path.to_string_lossy().to_string()))?;
        let examples = serde_json::from_reader(BufReader::new(file))
            .with_context(|_| format!("Invalid testing dataset file {:?}", path))?;
        Ok(examples)
    }

    pub fn labelled(&self) -> Result<LabelledSentences> {
        let labelled = LabelledSentences {
            sentences: &self.test_x,
            intents: &self.test_y,
            tags: &self.test_y2,
        };
        labelled.validate()?;
        Ok(labelled)
    }
}
