//! 2D convolution with optional weight normalization.
//!
//! With weight norm the kernel is parameterized as `w = g * v / ||v||`, one
//! gain `g` per output channel. `g` starts at `||v||`, so a freshly built
//! layer computes the same function with or without weight norm.

use burn::{
    config::Config,
    module::{Module, Param},
    tensor::{
        backend::Backend,
        module::conv2d,
        ops::ConvOptions,
        Distribution, Tensor,
    },
};

const NORM_EPS: f32 = 1e-8;
const INIT_EPS: f32 = 1e-6;

/// Configuration of a [`WnConv2d`] layer
#[derive(Config, Debug)]
pub struct WnConv2dConfig {
    /// `[in_channels, out_channels]`
    pub channels: [usize; 2],
    /// Square kernel size, must be odd
    pub kernel_size: usize,
    /// Pad to keep the spatial size, otherwise no padding
    #[config(default = true)]
    pub same_padding: bool,
    #[config(default = false)]
    pub weightnorm: bool,
}

impl WnConv2dConfig {
    /// Glorot-uniform kernel, zero bias.
    pub fn init<B: Backend>(&self, device: &B::Device) -> WnConv2d<B> {
        let [c_in, c_out] = self.channels;
        let k = self.kernel_size;
        let fan_sum = (c_in + c_out) * k * k;
        let limit = (6.0 / fan_sum as f64).sqrt();

        let weight = Tensor::<B, 4>::random([c_out, c_in, k, k], Distribution::Uniform(-limit, limit), device);
        let gain = self
            .weightnorm
            .then(|| Param::from_tensor(channel_norm(&weight)));

        WnConv2d {
            weight: Param::from_tensor(weight),
            bias: Param::from_tensor(Tensor::zeros([c_out], device)),
            gain,
            padding: if self.same_padding { k / 2 } else { 0 },
        }
    }
}

/// Convolution layer, stride 1
#[derive(Module, Debug)]
pub struct WnConv2d<B: Backend> {
    /// Kernel `[out, in, k, k]`, the direction `v` under weight norm
    pub weight: Param<Tensor<B, 4>>,
    pub bias: Param<Tensor<B, 1>>,
    /// Per-channel gain `g`, present only with weight norm
    pub gain: Option<Param<Tensor<B, 1>>>,
    padding: usize,
}

impl<B: Backend> WnConv2d<B> {
    pub fn is_weight_normalized(&self) -> bool {
        self.gain.is_some()
    }

    /// The kernel actually applied to the input.
    pub fn effective_weight(&self) -> Tensor<B, 4> {
        let v = self.weight.val();
        match &self.gain {
            None => v,
            Some(gain) => {
                let [c_out, ..] = v.dims();
                let scale = (gain.val() / channel_norm(&v)).reshape([c_out, 1, 1, 1]);
                v * scale
            }
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        conv2d(x, self.effective_weight(), Some(self.bias.val()), self.options())
    }

    /// Data-based initialization of gain and bias.
    ///
    /// Chooses `g` and `b` so that the layer's output on `x` has zero mean and
    /// unit variance per channel, and returns that output for the next layer.
    /// Layers without weight norm are left unchanged.
    pub fn init_from_data(self, x: Tensor<B, 4>) -> (Self, Tensor<B, 4>) {
        let Some(gain) = self.gain.as_ref().map(|g| g.val()) else {
            let y = self.forward(x);
            return (self, y);
        };

        let t = conv2d(x, self.effective_weight(), None, self.options()).detach();
        let [n, c, h, w] = t.dims();

        let flat = t.clone().swap_dims(0, 1).reshape([c, n * h * w]);
        let mean = flat.clone().mean_dim(1);
        let var = (flat - mean.clone()).powf_scalar(2.0).mean_dim(1);
        let std = (var + INIT_EPS).sqrt().reshape([c]);
        let mean = mean.reshape([c]);

        let gain = (gain / std.clone()).detach();
        let bias = (mean.clone().neg() / std.clone()).detach();
        let y = (t - mean.reshape([1, c, 1, 1])) / std.reshape([1, c, 1, 1]);

        let layer = Self {
            gain: Some(Param::from_tensor(gain)),
            bias: Param::from_tensor(bias),
            ..self
        };
        (layer, y)
    }

    fn options(&self) -> ConvOptions<2> {
        ConvOptions::new([1, 1], [self.padding, self.padding], [1, 1], 1)
    }
}

/// L2 norm of each output channel's kernel, `[out]`.
fn channel_norm<B: Backend>(v: &Tensor<B, 4>) -> Tensor<B, 1> {
    let [c_out, c_in, kh, kw] = v.dims();
    v.clone()
        .powf_scalar(2.0)
        .reshape([c_out, c_in * kh * kw])
        .sum_dim(1)
        .sqrt()
        .reshape([c_out])
        + NORM_EPS
}
