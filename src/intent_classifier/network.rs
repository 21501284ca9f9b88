use candle_core::Tensor;
use candle_nn::{linear, Conv1d, Linear, Module, VarBuilder};

use crate::layers::{conv1d, dropout};

/// Parallel convolutions of several widths over the word vectors, each max-pooled over time.
///
/// The pooled features go through dropout and are concatenated with the un-dropped features
/// of the first branch before the dense output layer.
pub struct ConvIntentNetwork {
    branches: Vec<(usize, Conv1d)>,
    output: Linear,
    drop: f32,
}

impl ConvIntentNetwork {
    pub fn new(
        embedding_dimensions: usize,
        filter_sizes: &[usize],
        num_filters: usize,
        nb_intents: usize,
        drop: f32,
        vb: VarBuilder,
    ) -> candle_core::Result<Self> {
        let branches = filter_sizes
            .iter()
            .enumerate()
            .map(|(index, kernel_size)| {
                let conv = conv1d(
                    embedding_dimensions,
                    num_filters,
                    *kernel_size,
                    vb.pp(format!("conv{}", index)),
                )?;
                Ok((*kernel_size, conv))
            })
            .collect::<candle_core::Result<Vec<_>>>()?;
        let features = num_filters * (filter_sizes.len() + 1);
        let output = linear(features, nb_intents, vb.pp("output"))?;
        Ok(Self {
            branches,
            output,
            drop,
        })
    }

    /// Logits `[batch, intents]` of word vectors `[batch, words, dims]`
    pub fn forward_t(&self, embedded: &Tensor, train: bool) -> candle_core::Result<Tensor> {
        let xs = embedded.transpose(1, 2)?.contiguous()?;
        let widest_kernel = self
            .branches
            .iter()
            .map(|(kernel_size, _)| *kernel_size)
            .max()
            .unwrap_or(1);
        let steps = xs.dim(2)?;
        let xs = if steps < widest_kernel {
            xs.pad_with_zeros(2, 0, widest_kernel - steps)?
        } else {
            xs
        };

        let pooled = self
            .branches
            .iter()
            .map(|(_, conv)| conv.forward(&xs)?.relu()?.max(2))
            .collect::<candle_core::Result<Vec<_>>>()?;
        let concatenated = Tensor::cat(&pooled, 1)?;
        let dropped = dropout(concatenated, self.drop, train)?;
        let features = Tensor::cat(&[&dropped, &pooled[0]], 1)?;
        self.output.forward(&features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn test_forward_pads_short_inputs() {
        // Given
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let network = ConvIntentNetwork::new(4, &[2, 4, 8], 3, 5, 0.5, vb).unwrap();
        let embedded = Tensor::ones((2, 3, 4), DType::F32, &Device::Cpu).unwrap();

        // When
        let logits = network.forward_t(&embedded, true).unwrap();

        // Then
        assert_eq!(&[2, 5], logits.dims());
    }
}
