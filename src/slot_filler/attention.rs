use candle_core::{Tensor, D};
use candle_nn::ops::softmax;
use candle_nn::{linear, Init, Linear, Module, VarBuilder};

/// Self-attention over the time steps of a sequence
///
/// Each step is scored by a dense softmax layer and projected by a dense tanh layer, the
/// projections are matched against the inputs to attend every step to every other step.
pub struct TimeSeriesAttention {
    scores: Linear,
    projection: Linear,
}

impl TimeSeriesAttention {
    pub fn new(dimensions: usize, vb: VarBuilder) -> candle_core::Result<Self> {
        let scores_weight = vb.pp("scores").get_with_hints(
            (dimensions, dimensions),
            "weight",
            Init::Const(0.0),
        )?;
        let scores_bias = vb
            .pp("scores")
            .get_with_hints(dimensions, "bias", Init::Const(0.0))?;
        Ok(Self {
            scores: Linear::new(scores_weight, Some(scores_bias)),
            projection: linear(dimensions, dimensions, vb.pp("projection"))?,
        })
    }

    /// Attended sequence with the shape of `xs`, `[batch, time, dims]`
    pub fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let scores = softmax(&self.scores.forward(xs)?, D::Minus1)?;
        let encoded = self.projection.forward(&scores)?.tanh()?;
        let self_attend = xs.matmul(&encoded.transpose(1, 2)?.contiguous()?)?;
        let attention = softmax(&self_attend, D::Minus1)?;
        attention.transpose(1, 2)?.contiguous()?.matmul(xs)
    }
}
