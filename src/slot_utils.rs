use crate::models::{SlotPrediction, SlotsPredicted, WordTagPrediction};

/// Id of the `O` tag
const NO_SLOT_ID: usize = 0;

struct OpenSpan<'a> {
    tag: usize,
    words: Vec<&'a str>,
    confidence: f32,
}

impl<'a> OpenSpan<'a> {
    fn new(tag: usize, word: &'a str, confidence: f32) -> Self {
        Self {
            tag,
            words: vec![word],
            confidence,
        }
    }

    /// Each new word is averaged with the running confidence of the span
    fn extend(&mut self, word: &'a str, confidence: f32) {
        self.confidence = (self.confidence + confidence) / 2.0;
        self.words.push(word);
    }

    fn flush(self, slot_names: &[&str], threshold: f32, slots: &mut SlotsPredicted) {
        if self.tag == NO_SLOT_ID || self.confidence < threshold {
            return;
        }
        if let Some(slot_name) = slot_names.get(self.tag) {
            slots
                .entry(slot_name.to_string())
                .or_insert_with(Vec::new)
                .push(SlotPrediction {
                    confidence: self.confidence,
                    value: self.words.join(" "),
                });
        }
    }
}

/// Merges consecutive words sharing a tag into slot values.
///
/// The confidence of a span is the running average of its word confidences, spans tagged `O` or below
/// `threshold` are dropped. Words without a tag prediction are ignored.
pub fn reduce_word_tags<S: AsRef<str>>(
    words: &[S],
    tags: &[WordTagPrediction],
    slot_names: &[&str],
    threshold: f32,
) -> SlotsPredicted {
    let mut slots = SlotsPredicted::new();
    let mut open_span: Option<OpenSpan> = None;

    for (word, tag) in words.iter().zip(tags) {
        let word = word.as_ref();
        open_span = match open_span {
            Some(mut span) if span.tag == tag.highest_index => {
                span.extend(word, tag.confidence);
                Some(span)
            }
            Some(span) => {
                span.flush(slot_names, threshold, &mut slots);
                Some(OpenSpan::new(tag.highest_index, word, tag.confidence))
            }
            None => Some(OpenSpan::new(tag.highest_index, word, tag.confidence)),
        };
    }
    if let Some(span) = open_span {
        span.flush(slot_names, threshold, &mut slots);
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::epsilon_eq;

    fn tag(highest_index: usize, confidence: f32) -> WordTagPrediction {
        WordTagPrediction {
            highest_index,
            confidence,
        }
    }

    const SLOT_NAMES: [&str; 3] = ["O", "date", "city"];

    #[test]
    fn test_reduce_merges_same_tags() {
        // Given
        let words = vec!["wake", "me", "next", "monday", "please"];
        let tags = vec![
            tag(0, 0.9),
            tag(0, 0.8),
            tag(1, 0.6),
            tag(1, 0.9),
            tag(0, 0.7),
        ];

        // When
        let slots = reduce_word_tags(&words, &tags, &SLOT_NAMES, 0.2);

        // Then
        assert_eq!(1, slots.len());
        let dates = &slots["date"];
        assert_eq!(1, dates.len());
        assert_eq!("next monday", dates[0].value);
        assert!(epsilon_eq(0.75, dates[0].confidence, 1e-6));
    }

    #[test]
    fn test_reduce_averages_each_word_with_the_running_confidence() {
        // Given
        let words = vec!["a", "b", "c"];
        let tags = vec![tag(2, 0.3), tag(2, 0.6), tag(2, 0.9)];

        // When
        let slots = reduce_word_tags(&words, &tags, &SLOT_NAMES, 0.0);

        // Then
        assert_eq!("a b c", slots["city"][0].value);
        assert!(epsilon_eq(0.675, slots["city"][0].confidence, 1e-6));
    }

    #[test]
    fn test_reduce_keeps_repeated_slots_separately() {
        let words = vec!["paris", "or", "london"];
        let tags = vec![tag(2, 0.9), tag(0, 0.9), tag(2, 0.8)];

        let slots = reduce_word_tags(&words, &tags, &SLOT_NAMES, 0.2);

        let values: Vec<&str> = slots["city"].iter().map(|slot| slot.value.as_str()).collect();
        assert_eq!(vec!["paris", "london"], values);
    }

    #[test]
    fn test_reduce_drops_low_confidence_spans() {
        let words = vec!["paris", "tomorrow"];
        let tags = vec![tag(2, 0.1), tag(1, 0.5)];

        let slots = reduce_word_tags(&words, &tags, &SLOT_NAMES, 0.2);

        assert!(!slots.contains_key("city"));
        assert_eq!("tomorrow", slots["date"][0].value);
    }

    #[test]
    fn test_reduce_ignores_words_without_predictions() {
        let words = vec!["paris", "london", "rome"];
        let tags = vec![tag(2, 0.9)];

        let slots = reduce_word_tags(&words, &tags, &SLOT_NAMES, 0.2);

        assert_eq!("paris", slots["city"][0].value);
    }
}
