//! WDSR: wide-activation super-resolution networks.
//!
//! The main branch runs valid-padded head and tail convolutions around a
//! body of wide-activation blocks, the skip branch a single valid 5x5 conv.
//! Both end in a sub-pixel shuffle to `scale` and are summed. Without
//! padding the output loses `2 * scale` pixels on each side; in evaluation
//! the input is mirrored by 2 pixels first so the output matches
//! `scale` times the input.

use burn::{
    module::Module,
    tensor::{activation::relu, backend::Backend, Tensor},
};
use sr_core::Architecture;

use super::common::{denormalize, normalize, pad_symmetric, pixel_shuffle};
use super::conv::{WnConv2d, WnConv2dConfig};
use super::{Phase, SrModelConfig};

/// Pixels lost per side of the LR input by the valid convolutions
pub const INPUT_MARGIN: usize = 2;

/// Share of `num_filters` kept by the low-rank 1x1 conv of WDSR-B blocks
const LOW_RANK_RATIO: f64 = 0.8;

/// WDSR-A block: wide 3x3 conv with ReLU, 3x3 projection back
#[derive(Module, Debug)]
pub struct WdsrBlockA<B: Backend> {
    expand: WnConv2d<B>,
    project: WnConv2d<B>,
    res_scaling: f64,
}

/// WDSR-B block: wide 1x1 conv with ReLU, low-rank 1x1, 3x3 projection
#[derive(Module, Debug)]
pub struct WdsrBlockB<B: Backend> {
    expand: WnConv2d<B>,
    reduce: WnConv2d<B>,
    project: WnConv2d<B>,
    res_scaling: f64,
}

/// Residual block of the body, one variant per architecture
#[derive(Module, Debug)]
pub enum WdsrBlock<B: Backend> {
    /// WDSR-A
    Wide(WdsrBlockA<B>),
    /// WDSR-B
    LowRank(WdsrBlockB<B>),
}

impl<B: Backend> WdsrBlock<B> {
    fn new(config: &SrModelConfig, device: &B::Device) -> Self {
        let nf = config.num_filters;
        let wide = nf * config.res_expansion;
        let res_scaling = config.res_scaling.unwrap_or(1.0);
        let conv = |c_in: usize, c_out: usize, k: usize| {
            WnConv2dConfig::new([c_in, c_out], k)
                .with_weightnorm(config.weightnorm)
                .init(device)
        };

        match config.architecture {
            Architecture::WdsrB => {
                let low_rank = ((nf as f64 * LOW_RANK_RATIO) as usize).max(1);
                WdsrBlock::LowRank(WdsrBlockB {
                    expand: conv(nf, wide, 1),
                    reduce: conv(wide, low_rank, 1),
                    project: conv(low_rank, nf, 3),
                    res_scaling,
                })
            }
            _ => WdsrBlock::Wide(WdsrBlockA {
                expand: conv(nf, wide, 3),
                project: conv(wide, nf, 3),
                res_scaling,
            }),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let (y, res_scaling) = match self {
            WdsrBlock::Wide(block) => {
                let y = relu(block.expand.forward(x.clone()));
                (block.project.forward(y), block.res_scaling)
            }
            WdsrBlock::LowRank(block) => {
                let y = relu(block.expand.forward(x.clone()));
                let y = block.reduce.forward(y);
                (block.project.forward(y), block.res_scaling)
            }
        };
        x + y * res_scaling
    }

    fn init_from_data(self, x: Tensor<B, 4>) -> (Self, Tensor<B, 4>) {
        match self {
            WdsrBlock::Wide(block) => {
                let (expand, y) = block.expand.init_from_data(x.clone());
                let (project, y) = block.project.init_from_data(relu(y));
                let out = x + y * block.res_scaling;
                let block = WdsrBlockA {
                    expand,
                    project,
                    res_scaling: block.res_scaling,
                };
                (WdsrBlock::Wide(block), out)
            }
            WdsrBlock::LowRank(block) => {
                let (expand, y) = block.expand.init_from_data(x.clone());
                let (reduce, y) = block.reduce.init_from_data(relu(y));
                let (project, y) = block.project.init_from_data(y);
                let out = x + y * block.res_scaling;
                let block = WdsrBlockB {
                    expand,
                    reduce,
                    project,
                    res_scaling: block.res_scaling,
                };
                (WdsrBlock::LowRank(block), out)
            }
        }
    }
}

/// WDSR-A or WDSR-B network, depending on its blocks
#[derive(Module, Debug)]
pub struct Wdsr<B: Backend> {
    head: WnConv2d<B>,
    body: Vec<WdsrBlock<B>>,
    tail: WnConv2d<B>,
    skip: WnConv2d<B>,
    scale: usize,
}

impl<B: Backend> Wdsr<B> {
    pub fn new(config: &SrModelConfig, device: &B::Device) -> Self {
        let nf = config.num_filters;
        let s = config.scale.as_usize();
        let valid = |c_in: usize, c_out: usize, k: usize| {
            WnConv2dConfig::new([c_in, c_out], k)
                .with_same_padding(false)
                .with_weightnorm(config.weightnorm)
                .init(device)
        };

        Self {
            head: valid(3, nf, 3),
            body: (0..config.num_res_blocks)
                .map(|_| WdsrBlock::new(config, device))
                .collect(),
            tail: valid(nf, 3 * s * s, 3),
            skip: valid(3, 3 * s * s, 5),
            scale: s,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>, phase: Phase) -> Tensor<B, 4> {
        let x = self.prepare(x, phase);

        let mut m = self.head.forward(x.clone());
        for block in &self.body {
            m = block.forward(m);
        }
        let m = pixel_shuffle(self.tail.forward(m), self.scale);
        let s = pixel_shuffle(self.skip.forward(x), self.scale);

        denormalize(m + s)
    }

    /// Data-based weight norm initialization on training-phase inputs.
    pub fn data_based_init(self, x: Tensor<B, 4>) -> Self {
        let Self {
            head,
            body,
            tail,
            skip,
            scale,
        } = self;

        let x = normalize(x);
        let (head, mut m) = head.init_from_data(x.clone());
        let body: Vec<_> = body
            .into_iter()
            .map(|block| {
                let (block, y) = block.init_from_data(m.clone());
                m = y;
                block
            })
            .collect();
        let (tail, _) = tail.init_from_data(m);
        let (skip, _) = skip.init_from_data(x);

        Self {
            head,
            body,
            tail,
            skip,
            scale,
        }
    }

    fn prepare(&self, x: Tensor<B, 4>, phase: Phase) -> Tensor<B, 4> {
        let x = normalize(x);
        match phase {
            Phase::Train => x,
            Phase::Eval => pad_symmetric(x, INPUT_MARGIN),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Distribution;
    use burn_ndarray::NdArray;
    use sr_core::Scale;

    type TestBackend = NdArray<f32>;

    fn tiny(architecture: Architecture, scale: Scale) -> SrModelConfig {
        SrModelConfig::new(architecture, scale)
            .with_num_filters(8)
            .with_num_res_blocks(2)
            .with_res_expansion(2)
    }

    #[test]
    fn test_eval_output_is_scale_times_input() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::random([1, 3, 10, 12], Distribution::Uniform(0.0, 255.0), &device);

        for architecture in [Architecture::WdsrA, Architecture::WdsrB] {
            for (scale, s) in [(Scale::X2, 2), (Scale::X3, 3), (Scale::X4, 4)] {
                let model = Wdsr::<TestBackend>::new(&tiny(architecture, scale), &device);
                assert_eq!(model.forward(x.clone(), Phase::Eval).dims(), [1, 3, 10 * s, 12 * s]);
            }
        }
    }

    #[test]
    fn test_train_output_loses_margin() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::random([2, 3, 12, 12], Distribution::Uniform(0.0, 255.0), &device);
        let model = Wdsr::<TestBackend>::new(&tiny(Architecture::WdsrA, Scale::X2), &device);

        // HR crop is 24x24, output loses 2 * scale on each side
        assert_eq!(model.forward(x, Phase::Train).dims(), [2, 3, 16, 16]);
    }

    #[test]
    fn test_wdsr_b_block_layout() {
        let device = Default::default();
        let model = Wdsr::<TestBackend>::new(&tiny(Architecture::WdsrB, Scale::X2).with_num_filters(10), &device);
        match &model.body[0] {
            WdsrBlock::LowRank(block) => {
                assert_eq!(block.expand.weight.val().dims(), [20, 10, 1, 1]);
                assert_eq!(block.reduce.weight.val().dims(), [8, 20, 1, 1]);
                assert_eq!(block.project.weight.val().dims(), [10, 8, 3, 3]);
            }
            WdsrBlock::Wide(_) => panic!("expected a WDSR-B block"),
        }
    }

    #[test]
    fn test_data_based_init() {
        let device = Default::default();
        let config = tiny(Architecture::WdsrB, Scale::X3).with_weightnorm(true);
        let model = Wdsr::<TestBackend>::new(&config, &device);
        let x = Tensor::<TestBackend, 4>::random([2, 3, 9, 9], Distribution::Uniform(0.0, 255.0), &device);

        let model = model.data_based_init(x.clone());
        assert_eq!(model.forward(x, Phase::Eval).dims(), [2, 3, 27, 27]);
    }
}
