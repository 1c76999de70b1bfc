//! EDSR: enhanced deep residual network.
//!
//! Head conv, a body of residual blocks with a global skip connection,
//! sub-pixel upsampling and a reconstruction conv. All convolutions use
//! same padding, so the output is exactly `scale` times the input.

use burn::{
    module::Module,
    tensor::{activation::relu, backend::Backend, Tensor},
};
use sr_core::Scale;

use super::common::{denormalize, normalize, pixel_shuffle};
use super::conv::{WnConv2d, WnConv2dConfig};
use super::SrModelConfig;

/// conv - relu - conv with a scaled residual connection
#[derive(Module, Debug)]
pub struct EdsrBlock<B: Backend> {
    conv1: WnConv2d<B>,
    conv2: WnConv2d<B>,
    res_scaling: f64,
}

impl<B: Backend> EdsrBlock<B> {
    fn new(num_filters: usize, res_scaling: f64, weightnorm: bool, device: &B::Device) -> Self {
        let conv = || {
            WnConv2dConfig::new([num_filters, num_filters], 3)
                .with_weightnorm(weightnorm)
                .init(device)
        };
        Self {
            conv1: conv(),
            conv2: conv(),
            res_scaling,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let y = relu(self.conv1.forward(x.clone()));
        let y = self.conv2.forward(y);
        x + y * self.res_scaling
    }

    fn init_from_data(self, x: Tensor<B, 4>) -> (Self, Tensor<B, 4>) {
        let (conv1, y) = self.conv1.init_from_data(x.clone());
        let (conv2, y) = self.conv2.init_from_data(relu(y));
        let out = x + y * self.res_scaling;
        (
            Self {
                conv1,
                conv2,
                res_scaling: self.res_scaling,
            },
            out,
        )
    }
}

/// EDSR network
#[derive(Module, Debug)]
pub struct Edsr<B: Backend> {
    head: WnConv2d<B>,
    body: Vec<EdsrBlock<B>>,
    body_conv: WnConv2d<B>,
    upsample: Vec<WnConv2d<B>>,
    tail: WnConv2d<B>,
    upsample_factor: usize,
}

impl<B: Backend> Edsr<B> {
    pub fn new(config: &SrModelConfig, device: &B::Device) -> Self {
        let nf = config.num_filters;
        let wn = config.weightnorm;
        let conv = |c_in: usize, c_out: usize| {
            WnConv2dConfig::new([c_in, c_out], 3)
                .with_weightnorm(wn)
                .init(device)
        };

        let res_scaling = config.res_scaling.unwrap_or(1.0);
        let body = (0..config.num_res_blocks)
            .map(|_| EdsrBlock::new(nf, res_scaling, wn, device))
            .collect();

        // x4 is built from two x2 steps
        let (factor, steps) = match config.scale {
            Scale::X3 => (3, 1),
            Scale::X4 => (2, 2),
            _ => (2, 1),
        };
        let upsample = (0..steps).map(|_| conv(nf, nf * factor * factor)).collect();

        Self {
            head: conv(3, nf),
            body,
            body_conv: conv(nf, nf),
            upsample,
            tail: conv(nf, 3),
            upsample_factor: factor,
        }
    }

    /// `[N, 3, H, W]` on the 0-255 scale to `[N, 3, H*s, W*s]`.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.head.forward(normalize(x));

        let mut b = x.clone();
        for block in &self.body {
            b = block.forward(b);
        }
        let mut x = x + self.body_conv.forward(b);

        for conv in &self.upsample {
            x = pixel_shuffle(conv.forward(x), self.upsample_factor);
        }

        denormalize(self.tail.forward(x))
    }

    /// Data-based weight norm initialization, layer by layer in forward order.
    pub fn data_based_init(self, x: Tensor<B, 4>) -> Self {
        let Self {
            head,
            body,
            body_conv,
            upsample,
            tail,
            upsample_factor,
        } = self;

        let (head, x) = head.init_from_data(normalize(x));

        let mut b = x.clone();
        let body: Vec<_> = body
            .into_iter()
            .map(|block| {
                let (block, y) = block.init_from_data(b.clone());
                b = y;
                block
            })
            .collect();
        let (body_conv, b) = body_conv.init_from_data(b);
        let mut x = x + b;

        let upsample: Vec<_> = upsample
            .into_iter()
            .map(|conv| {
                let (conv, y) = conv.init_from_data(x.clone());
                x = pixel_shuffle(y, upsample_factor);
                conv
            })
            .collect();
        let (tail, _) = tail.init_from_data(x);

        Self {
            head,
            body,
            body_conv,
            upsample,
            tail,
            upsample_factor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Distribution;
    use burn_ndarray::NdArray;
    use sr_core::Architecture;

    type TestBackend = NdArray<f32>;

    fn tiny(scale: Scale) -> SrModelConfig {
        SrModelConfig::new(Architecture::Edsr, scale)
            .with_num_filters(8)
            .with_num_res_blocks(2)
    }

    #[test]
    fn test_output_is_scale_times_input() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::random([2, 3, 6, 5], Distribution::Uniform(0.0, 255.0), &device);

        for (scale, s) in [(Scale::X2, 2), (Scale::X3, 3), (Scale::X4, 4)] {
            let model = Edsr::<TestBackend>::new(&tiny(scale), &device);
            assert_eq!(model.forward(x.clone()).dims(), [2, 3, 6 * s, 5 * s]);
        }
    }

    #[test]
    fn test_x4_uses_two_upsampling_steps() {
        let device = Default::default();
        let model = Edsr::<TestBackend>::new(&tiny(Scale::X4), &device);
        assert_eq!(model.upsample.len(), 2);
        assert_eq!(model.upsample_factor, 2);
    }

    #[test]
    fn test_data_based_init_keeps_shapes() {
        let device = Default::default();
        let config = tiny(Scale::X2).with_weightnorm(true);
        let model = Edsr::<TestBackend>::new(&config, &device);
        let params = model.num_params();
        let x = Tensor::<TestBackend, 4>::random([2, 3, 8, 8], Distribution::Uniform(0.0, 255.0), &device);

        let model = model.data_based_init(x.clone());
        assert_eq!(model.num_params(), params);
        assert_eq!(model.forward(x).dims(), [2, 3, 16, 16]);
    }
}
