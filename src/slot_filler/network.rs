use candle_core::Tensor;
use candle_nn::{linear, lstm, Conv1d, LSTMConfig, Linear, Module, VarBuilder, LSTM, RNN};

use super::attention::TimeSeriesAttention;
use crate::layers::{conv1d, dropout, reverse_time};

pub struct TaggerDimensions {
    pub nb_intents: usize,
    pub nb_slots: usize,
    pub embedding_dimensions: usize,
    pub max_chars_per_word: usize,
    pub num_filters: [usize; 2],
    pub rnn_size: usize,
}

/// Intent conditioned BiLSTM tagger over word vectors and character fingerprints
pub struct BiLstmTaggerNetwork {
    word_conv: Conv1d,
    word_conv_projection: Conv1d,
    char_conv: Conv1d,
    char_conv_projection: Conv1d,
    forward_lstm: LSTM,
    backward_lstm: LSTM,
    attention: Option<TimeSeriesAttention>,
    output: Linear,
    drop: f32,
}

impl BiLstmTaggerNetwork {
    pub fn new(
        dimensions: &TaggerDimensions,
        add_attention: bool,
        drop: f32,
        vb: VarBuilder,
    ) -> candle_core::Result<Self> {
        let [word_filters, char_filters] = dimensions.num_filters;
        let char_features = dimensions.max_chars_per_word * dimensions.embedding_dimensions;
        let word_conv = conv1d(
            dimensions.embedding_dimensions,
            word_filters,
            1,
            vb.pp("word_conv"),
        )?;
        let word_conv_projection =
            conv1d(word_filters, word_filters, 1, vb.pp("word_conv_projection"))?;
        let char_conv = conv1d(char_features, char_filters, 1, vb.pp("char_conv"))?;
        let char_conv_projection =
            conv1d(char_filters, char_filters, 1, vb.pp("char_conv_projection"))?;

        let lstm_input = dimensions.nb_intents
            + dimensions.embedding_dimensions
            + word_filters
            + char_filters;
        let forward_lstm = lstm(
            lstm_input,
            dimensions.rnn_size,
            LSTMConfig::default(),
            vb.pp("forward_lstm"),
        )?;
        let backward_lstm = lstm(
            lstm_input,
            dimensions.rnn_size,
            LSTMConfig::default(),
            vb.pp("backward_lstm"),
        )?;

        let recurrent_features = 2 * dimensions.rnn_size;
        let attention = if add_attention {
            Some(TimeSeriesAttention::new(
                recurrent_features,
                vb.pp("attention"),
            )?)
        } else {
            None
        };
        let output_features = if add_attention {
            2 * recurrent_features
        } else {
            recurrent_features
        };
        let output = linear(output_features, dimensions.nb_slots, vb.pp("output"))?;

        Ok(Self {
            word_conv,
            word_conv_projection,
            char_conv,
            char_conv_projection,
            forward_lstm,
            backward_lstm,
            attention,
            output,
            drop,
        })
    }

    /// Applies a kernel-1 convolution stack to `[batch, time, features]` inputs
    fn time_distributed<F>(xs: &Tensor, layers: F) -> candle_core::Result<Tensor>
    where
        F: FnOnce(Tensor) -> candle_core::Result<Tensor>,
    {
        let channels_first = xs.transpose(1, 2)?.contiguous()?;
        layers(channels_first)?.transpose(1, 2)?.contiguous()
    }

    fn bidirectional(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let forward_states = self.forward_lstm.seq(xs)?;
        let forward = self.forward_lstm.states_to_tensor(&forward_states)?;
        let reversed = reverse_time(xs)?;
        let backward_states = self.backward_lstm.seq(&reversed)?;
        let backward = reverse_time(&self.backward_lstm.states_to_tensor(&backward_states)?)?;
        Tensor::cat(&[&forward, &backward], 2)
    }

    /// Tag logits `[batch, words, slots]`
    ///
    /// `intents` is `[batch, intents]`, `words` is `[batch, words, dims]` and `chars` is
    /// `[batch, words, maxCharsPerWord * dims]`.
    pub fn forward_t(
        &self,
        intents: &Tensor,
        words: &Tensor,
        chars: &Tensor,
        train: bool,
    ) -> candle_core::Result<Tensor> {
        let steps = words.dim(1)?;
        let repeated_intents = intents.unsqueeze(1)?.repeat((1, steps, 1))?;
        let word_features = Self::time_distributed(words, |xs| {
            let xs = self.word_conv.forward(&xs)?.relu()?;
            self.word_conv_projection.forward(&xs)?.relu()
        })?;
        let char_features = Self::time_distributed(chars, |xs| {
            let xs = self.char_conv.forward(&xs)?.relu()?;
            let xs = dropout(xs, self.drop, train)?;
            self.char_conv_projection.forward(&xs)?.relu()
        })?;

        let features = Tensor::cat(
            &[&repeated_intents, words, &word_features, &char_features],
            2,
        )?
        .contiguous()?;
        let hidden = self.bidirectional(&features)?;
        let hidden = match &self.attention {
            Some(attention) => Tensor::cat(&[&hidden, &attention.forward(&hidden)?], 2)?,
            None => hidden,
        };
        self.output.forward(&hidden)
    }
}
