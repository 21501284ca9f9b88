use std::io::Read;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::*;
use crate::utils::{IntentName, SlotName};

/// Fragment of a generated sentence, tagged with the slot it fills if any
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceToken {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<SlotName>,
}

impl SentenceToken {
    pub fn text(value: &str) -> Self {
        Self {
            value: value.to_string(),
            slot: None,
        }
    }

    pub fn slot(value: &str, slot: &str) -> Self {
        Self {
            value: value.to_string(),
            slot: Some(slot.to_string()),
        }
    }
}

/// Generated sentences grouped by intent, in generation order
pub type GeneratedDataset = IndexMap<IntentName, Vec<Vec<SentenceToken>>>;

/// Expands a grammar into example sentences.
///
/// Syntax errors are reported as `NluError::GrammarSyntax` with the location of the error.
pub trait SentenceGenerator {
    fn generate(&self, grammar: &str) -> Result<GeneratedDataset>;
}

/// Reads sentences previously generated and stored as JSON
pub fn read_generated_dataset<R: Read>(reader: R) -> Result<GeneratedDataset> {
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_generated_dataset() {
        // Given
        let data: &[u8] = r#"{
            "playMusic": [
                [{"type": "Text", "value": "play "}, {"type": "Slot", "value": "the beatles", "slot": "artist"}]
            ],
            "greet": [[{"type": "Text", "value": "hello"}]]
        }"#
        .as_ref();

        // When
        let dataset = read_generated_dataset(data).unwrap();

        // Then
        let intents: Vec<&str> = dataset.keys().map(String::as_str).collect();
        assert_eq!(vec!["playMusic", "greet"], intents);
        assert_eq!(
            vec![
                SentenceToken::text("play "),
                SentenceToken::slot("the beatles", "artist")
            ],
            dataset["playMusic"][0]
        );
    }
}
