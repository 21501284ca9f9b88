use candle_core::Tensor;
use candle_nn::{Conv1d, Conv1dConfig, Init, VarBuilder};

const KERNEL_INIT: Init = Init::Randn {
    mean: 0.0,
    stdev: 0.05,
};

/// 1-D convolution over `[batch, channels, time]` with random normal kernels
pub fn conv1d(
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    vb: VarBuilder,
) -> candle_core::Result<Conv1d> {
    let weight = vb.get_with_hints(
        (out_channels, in_channels, kernel_size),
        "weight",
        KERNEL_INIT,
    )?;
    let bias = vb.get_with_hints(out_channels, "bias", Init::Const(0.0))?;
    Ok(Conv1d::new(weight, Some(bias), Conv1dConfig::default()))
}

pub fn dropout(xs: Tensor, drop: f32, train: bool) -> candle_core::Result<Tensor> {
    if train && drop > 0.0 {
        candle_nn::ops::dropout(&xs, drop)
    } else {
        Ok(xs)
    }
}

/// Reverses the time axis of `[batch, time, features]`
pub fn reverse_time(xs: &Tensor) -> candle_core::Result<Tensor> {
    let steps = xs.dim(1)?;
    let indexes: Vec<u32> = (0..steps as u32).rev().collect();
    let indexes = Tensor::from_vec(indexes, steps, xs.device())?;
    xs.index_select(&indexes, 1)
}
