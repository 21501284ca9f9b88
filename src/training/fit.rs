use std::ops::Range;

use candle_core::{DType, Tensor, D};
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use log::warn;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::errors::*;

/// Size of the gradient steps taken inside a training batch
const MINI_BATCH_SIZE: usize = 32;
const SHUFFLE_SEED: u64 = 42;

/// Adam settings shared by every network of the pipeline
pub fn adam_params() -> ParamsAdamW {
    ParamsAdamW {
        lr: 0.0066,
        beta1: 0.0025,
        beta2: 0.1,
        eps: 1e-7,
        weight_decay: 0.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochMetrics {
    pub loss: f32,
    pub accuracy: f32,
    pub validation_loss: Option<f32>,
    pub validation_accuracy: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    pub epochs: Vec<EpochMetrics>,
    /// Set when a non-finite loss aborted the remaining epochs
    pub diverged: bool,
}

impl History {
    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FitConfig {
    pub epochs: usize,
    pub validation_split: f32,
}

/// Mean categorical cross-entropy between `logits` and one-hot `labels` over the last axis
pub fn categorical_crossentropy(logits: &Tensor, labels: &Tensor) -> candle_core::Result<Tensor> {
    let log_probabilities = candle_nn::ops::log_softmax(logits, D::Minus1)?;
    labels
        .mul(&log_probabilities)?
        .sum(D::Minus1)?
        .neg()?
        .mean_all()
}

pub fn categorical_accuracy(logits: &Tensor, labels: &Tensor) -> candle_core::Result<f32> {
    logits
        .argmax(D::Minus1)?
        .eq(&labels.argmax(D::Minus1)?)?
        .to_dtype(DType::F32)?
        .mean_all()?
        .to_scalar::<f32>()
}

fn select_rows(tensors: &[Tensor], indexes: &Tensor) -> candle_core::Result<Vec<Tensor>> {
    tensors
        .iter()
        .map(|tensor| tensor.index_select(indexes, 0))
        .collect()
}

fn evaluate<F>(
    inputs: &[Tensor],
    labels: &Tensor,
    rows: Range<usize>,
    forward: &F,
) -> Result<(f32, f32)>
where
    F: Fn(&[Tensor], bool) -> candle_core::Result<Tensor>,
{
    let mut total_loss = 0.0;
    let mut total_accuracy = 0.0;
    let mut start = rows.start;
    while start < rows.end {
        let length = MINI_BATCH_SIZE.min(rows.end - start);
        let xs = inputs
            .iter()
            .map(|input| input.narrow(0, start, length))
            .collect::<candle_core::Result<Vec<_>>>()?;
        let ys = labels.narrow(0, start, length)?;
        let logits = forward(&xs, false)?;
        total_loss += categorical_crossentropy(&logits, &ys)?.to_scalar::<f32>()? * length as f32;
        total_accuracy += categorical_accuracy(&logits, &ys)? * length as f32;
        start += length;
    }
    let count = rows.len() as f32;
    Ok((total_loss / count, total_accuracy / count))
}

/// Trains a network on one batch of examples.
///
/// The trailing `validation_split` fraction of the rows is held out and evaluated at the end
/// of every epoch, the remaining rows are shuffled each epoch and fed by mini-batches.
pub fn fit<F>(
    optimizer: &mut AdamW,
    inputs: &[Tensor],
    labels: &Tensor,
    config: FitConfig,
    forward: F,
) -> Result<History>
where
    F: Fn(&[Tensor], bool) -> candle_core::Result<Tensor>,
{
    let nb_rows = labels.dim(0)?;
    let mut history = History::default();
    if nb_rows == 0 {
        return Ok(history);
    }
    let nb_training_rows = ((nb_rows as f32 * (1.0 - config.validation_split)).floor() as usize)
        .max(1)
        .min(nb_rows);
    let validation_rows = nb_training_rows..nb_rows;
    let mut rng = ChaCha8Rng::seed_from_u64(SHUFFLE_SEED);
    let mut order: Vec<u32> = (0..nb_training_rows as u32).collect();

    for epoch in 0..config.epochs {
        order.shuffle(&mut rng);
        let mut total_loss = 0.0;
        let mut total_accuracy = 0.0;
        for chunk in order.chunks(MINI_BATCH_SIZE) {
            let indexes = Tensor::from_vec(chunk.to_vec(), chunk.len(), labels.device())?;
            let xs = select_rows(inputs, &indexes)?;
            let ys = labels.index_select(&indexes, 0)?;
            let logits = forward(&xs, true)?;
            let loss = categorical_crossentropy(&logits, &ys)?;
            let loss_value = loss.to_scalar::<f32>()?;
            if !loss_value.is_finite() {
                warn!(
                    "Non finite loss at epoch {}, abandoning the remaining epochs of this batch",
                    epoch + 1
                );
                history.diverged = true;
                return Ok(history);
            }
            total_accuracy += categorical_accuracy(&logits, &ys)? * chunk.len() as f32;
            optimizer.backward_step(&loss)?;
            total_loss += loss_value * chunk.len() as f32;
        }

        let (validation_loss, validation_accuracy) = if validation_rows.is_empty() {
            (None, None)
        } else {
            let (loss, accuracy) = evaluate(inputs, labels, validation_rows.clone(), &forward)?;
            (Some(loss), Some(accuracy))
        };
        history.epochs.push(EpochMetrics {
            loss: total_loss / nb_training_rows as f32,
            accuracy: total_accuracy / nb_training_rows as f32,
            validation_loss,
            validation_accuracy,
        });
    }
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::epsilon_eq;
    use candle_core::Device;
    use candle_nn::{linear, Module, VarBuilder, VarMap};

    #[test]
    fn test_categorical_crossentropy() {
        // Given
        let logits = Tensor::new(&[[0.0f32, 0.0], [0.0, 0.0]], &Device::Cpu).unwrap();
        let labels = Tensor::new(&[[1.0f32, 0.0], [0.0, 1.0]], &Device::Cpu).unwrap();

        // When
        let loss = categorical_crossentropy(&logits, &labels)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();

        // Then
        assert!(epsilon_eq(2.0f32.ln(), loss, 1e-5));
    }

    #[test]
    fn test_categorical_accuracy() {
        let logits = Tensor::new(&[[2.0f32, 0.0], [2.0, 0.0]], &Device::Cpu).unwrap();
        let labels = Tensor::new(&[[1.0f32, 0.0], [0.0, 1.0]], &Device::Cpu).unwrap();
        let accuracy = categorical_accuracy(&logits, &labels).unwrap();
        assert!(epsilon_eq(0.5, accuracy, 1e-6));
    }

    #[test]
    fn test_fit_learns_separable_data() {
        // Given
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let layer = linear(2, 2, vb.pp("dense")).unwrap();
        let mut optimizer = AdamW::new(
            varmap.all_vars(),
            ParamsAdamW {
                lr: 0.1,
                ..adam_params()
            },
        )
        .unwrap();
        let inputs = Tensor::new(
            &[[1.0f32, 0.0], [0.0, 1.0], [1.0, 0.0], [0.0, 1.0], [1.0, 0.0], [0.0, 1.0]],
            &device,
        )
        .unwrap();
        let labels = inputs.clone();

        // When
        let history = fit(
            &mut optimizer,
            &[inputs],
            &labels,
            FitConfig {
                epochs: 30,
                validation_split: 0.3,
            },
            |xs, _| layer.forward(&xs[0]),
        )
        .unwrap();

        // Then
        assert_eq!(30, history.epochs.len());
        assert!(!history.diverged);
        let first = history.epochs[0];
        let last = history.last().unwrap();
        assert!(last.loss < first.loss);
        assert!(last.validation_loss.is_some());
    }

    #[test]
    fn test_fit_stops_on_non_finite_loss() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let layer = linear(2, 2, vb.pp("dense")).unwrap();
        let mut optimizer = AdamW::new(varmap.all_vars(), adam_params()).unwrap();
        let inputs = Tensor::new(&[[f32::NAN, 0.0], [0.0, 1.0]], &device).unwrap();
        let labels = Tensor::new(&[[1.0f32, 0.0], [0.0, 1.0]], &device).unwrap();

        let history = fit(
            &mut optimizer,
            &[inputs],
            &labels,
            FitConfig {
                epochs: 3,
                validation_split: 0.0,
            },
            |xs, _| layer.forward(&xs[0]),
        )
        .unwrap();

        assert!(history.diverged);
        assert!(history.epochs.is_empty());
    }
}
