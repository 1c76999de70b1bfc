//! Copying weights from a pretrained model.
//!
//! Parameters of both models are listed in visiting order and aligned by
//! shape with a longest common subsequence, preferring earlier matches.
//! This keeps the body of a network aligned when only its upsampling tail
//! differs (another scale), or when one side carries weight norm gains.

use burn::{
    module::{Module, ModuleMapper, ModuleVisitor, ParamId},
    tensor::{backend::Backend, Tensor, TensorData},
};
use tracing::info;

/// How many target parameters received pretrained values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReport {
    pub copied: usize,
    pub total: usize,
}

#[derive(Default)]
struct ParamCollector {
    params: Vec<TensorData>,
}

impl<B: Backend> ModuleVisitor<B> for ParamCollector {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        self.params.push(tensor.to_data());
    }
}

#[derive(Default)]
struct ShapeCollector {
    shapes: Vec<Vec<usize>>,
}

impl<B: Backend> ModuleVisitor<B> for ShapeCollector {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        self.shapes.push(tensor.dims().to_vec());
    }
}

struct ParamWriter {
    plan: Vec<Option<TensorData>>,
    position: usize,
}

impl<B: Backend> ModuleMapper<B> for ParamWriter {
    fn map_float<const D: usize>(&mut self, _id: ParamId, tensor: Tensor<B, D>) -> Tensor<B, D> {
        let slot = self.plan.get_mut(self.position).and_then(Option::take);
        self.position += 1;

        match slot {
            Some(data) => {
                let copied = Tensor::<B, D>::from_data(data, &tensor.device());
                if tensor.is_require_grad() {
                    copied.require_grad()
                } else {
                    copied
                }
            }
            None => tensor,
        }
    }
}

/// Float parameters of `module` in visiting order.
pub(crate) fn parameter_data<B: Backend, M: Module<B>>(module: &M) -> Vec<TensorData> {
    let mut collector = ParamCollector::default();
    module.visit(&mut collector);
    collector.params
}

/// For each target position, the source position it is copied from.
fn align(source: &[Vec<usize>], target: &[Vec<usize>]) -> Vec<Option<usize>> {
    let (n, m) = (target.len(), source.len());
    // lcs[i][j]: alignment length of target[i..] and source[j..]
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if target[i] == source[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut matches = vec![None; n];
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if target[i] == source[j] && lcs[i][j] == lcs[i + 1][j + 1] + 1 {
            matches[i] = Some(j);
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    matches
}

/// Copy every parameter of `from` whose aligned position and shape match into `to`.
pub fn copy_weights<B, M>(from: &M, to: M) -> (M, TransferReport)
where
    B: Backend,
    M: Module<B>,
{
    let source = parameter_data(from);
    let source_shapes: Vec<Vec<usize>> = source.iter().map(|d| d.shape.clone()).collect();

    let mut target = ShapeCollector::default();
    to.visit(&mut target);

    let matches = align(&source_shapes, &target.shapes);
    let mut source_params: Vec<Option<TensorData>> = source.into_iter().map(Some).collect();
    let plan: Vec<Option<TensorData>> = matches
        .iter()
        .map(|m| m.and_then(|j| source_params[j].take()))
        .collect();

    let report = TransferReport {
        copied: plan.iter().filter(|p| p.is_some()).count(),
        total: plan.len(),
    };
    info!(
        "Copied {}/{} parameter tensors from pretrained model",
        report.copied, report.total
    );

    let mut writer = ParamWriter { plan, position: 0 };
    (to.map(&mut writer), report)
}
