mod fit;

use std::ops::Range;

use log::info;
use serde::Serialize;

use crate::errors::*;

pub use self::fit::{
    adam_params, categorical_accuracy, categorical_crossentropy, fit, EpochMetrics, FitConfig,
    History,
};

/// Progress of one training batch, reported once the batch has been fitted
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    pub batch: usize,
    pub total_batches: usize,
    pub batch_epochs: usize,
    pub current_batch_size: usize,
    pub training_loss: f32,
    pub training_accuracy: f32,
    pub validation_loss: Option<f32>,
    pub validation_accuracy: Option<f32>,
    /// Model tensors held once the batch tensors have been released
    pub tensors_in_memory: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingReport {
    pub batches: Vec<BatchStats>,
    pub stopped_early: bool,
    pub diverged_batches: usize,
}

impl TrainingReport {
    pub fn last_batch(&self) -> Option<&BatchStats> {
        self.batches.last()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineTrainingReport {
    pub classification: TrainingReport,
    pub ner: Option<TrainingReport>,
}

/// Receives the stats of every training batch of the pipeline
pub trait TrainStatsHandler {
    fn classification(&mut self, _stats: &BatchStats) {}
    fn ner(&mut self, _stats: &BatchStats) {}
}

/// Handler which only logs the progress
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingStatsHandler;

impl TrainStatsHandler for LoggingStatsHandler {
    fn classification(&mut self, stats: &BatchStats) {
        log_batch_stats("Intent classifier", stats)
    }

    fn ner(&mut self, stats: &BatchStats) {
        log_batch_stats("Slot tagger", stats)
    }
}

fn log_batch_stats(model_name: &str, stats: &BatchStats) {
    info!(
        "{}: batch {}/{} ({} examples, {} epochs), loss {:.4}, accuracy {:.4}, validation loss {:?}, validation accuracy {:?}",
        model_name,
        stats.batch,
        stats.total_batches,
        stats.current_batch_size,
        stats.batch_epochs,
        stats.training_loss,
        stats.training_accuracy,
        stats.validation_loss,
        stats.validation_accuracy
    );
}

/// Splits `nb_examples` into consecutive batches of `batch_size`
pub fn batch_ranges(nb_examples: usize, batch_size: usize) -> Vec<Range<usize>> {
    if batch_size == 0 {
        return vec![];
    }
    (0..nb_examples)
        .step_by(batch_size)
        .map(|start| start..(start + batch_size).min(nb_examples))
        .collect()
}

fn loss_below_threshold(metrics: &EpochMetrics, threshold: f32) -> bool {
    threshold > 0.0
        && metrics.loss < threshold
        && metrics.validation_loss.map_or(true, |loss| loss < threshold)
}

/// Settings of the outer batching loop
#[derive(Debug, Clone, Copy)]
pub struct BatchTrainingConfig {
    pub batch_size: usize,
    pub epochs: usize,
    pub loss_threshold: f32,
}

/// Runs `fit_batch` on consecutive batches of examples and reports each of them.
///
/// Tensors created by `fit_batch` are dropped before the stats of its batch are emitted.
/// The loop stops once the losses of a batch fall below a non-zero threshold.
pub fn train_in_batches<F, T, H>(
    model_name: &str,
    nb_examples: usize,
    config: BatchTrainingConfig,
    mut fit_batch: F,
    tensors_in_memory: T,
    mut on_batch: H,
) -> Result<TrainingReport>
where
    F: FnMut(Range<usize>) -> Result<History>,
    T: Fn() -> usize,
    H: FnMut(&BatchStats),
{
    let ranges = batch_ranges(nb_examples, config.batch_size);
    let total_batches = ranges.len();
    let mut report = TrainingReport::default();
    info!(
        "{}: training on {} examples in {} batches",
        model_name, nb_examples, total_batches
    );

    for (batch_index, range) in ranges.into_iter().enumerate() {
        if range.is_empty() {
            continue;
        }
        let current_batch_size = range.len();
        let history = fit_batch(range)?;
        if history.diverged {
            report.diverged_batches += 1;
        }
        let last_epoch = match history.last() {
            Some(metrics) => *metrics,
            None => continue,
        };
        let stats = BatchStats {
            batch: batch_index + 1,
            total_batches,
            batch_epochs: config.epochs,
            current_batch_size,
            training_loss: last_epoch.loss,
            training_accuracy: last_epoch.accuracy,
            validation_loss: last_epoch.validation_loss,
            validation_accuracy: last_epoch.validation_accuracy,
            tensors_in_memory: tensors_in_memory(),
        };
        on_batch(&stats);
        report.batches.push(stats);

        if loss_below_threshold(&last_epoch, config.loss_threshold) {
            info!(
                "{}: loss below {}, stopping training after batch {}",
                model_name,
                config.loss_threshold,
                batch_index + 1
            );
            report.stopped_early = true;
            break;
        }
    }
    Ok(report)
}
