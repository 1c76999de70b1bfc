//! Backend selection and compute sessions.
//!
//! The `ndarray` feature (default) runs on the CPU, `cuda` on an NVIDIA GPU.
//! `cuda` wins when both are enabled.

use burn::backend::Autodiff;
use burn::tensor::backend::Backend;
use sr_core::{Result, SessionConfig};
use tracing::info;

#[cfg(feature = "cuda")]
pub type DefaultBackend = burn_cuda::Cuda;

#[cfg(all(feature = "ndarray", not(feature = "cuda")))]
pub type DefaultBackend = burn_ndarray::NdArray<f32>;

#[cfg(not(any(feature = "ndarray", feature = "cuda")))]
compile_error!("enable the `ndarray` or `cuda` feature of sr-training");

/// The default autodiff backend for training
pub type TrainingBackend = Autodiff<DefaultBackend>;

/// Device of the default backend with the given accelerator index.
pub fn default_device(device_index: usize) -> <DefaultBackend as Backend>::Device {
    #[cfg(feature = "cuda")]
    {
        burn_cuda::CudaDevice::new(device_index)
    }
    #[cfg(all(feature = "ndarray", not(feature = "cuda")))]
    {
        let _ = device_index;
        burn_ndarray::NdArrayDevice::Cpu
    }
}

/// Human-readable name of the default backend
pub fn backend_name() -> &'static str {
    #[cfg(feature = "cuda")]
    {
        "CUDA (GPU)"
    }
    #[cfg(all(feature = "ndarray", not(feature = "cuda")))]
    {
        "NdArray (CPU)"
    }
}

/// Device of a validated [`SessionConfig`].
///
/// Models are always constructed through a session, so no model is built
/// before the settings were checked.
#[derive(Debug, Clone)]
pub struct Session<B: Backend> {
    device: B::Device,
}

impl<B: Backend> Session<B> {
    pub fn new(config: SessionConfig, device: B::Device) -> Result<Self> {
        config.validate()?;
        info!(
            "Session on {:?}, gpu memory fraction {:.2}",
            device, config.gpu_memory_fraction
        );
        Ok(Self { device })
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }
}

/// Session on the default device selected by `config.device_index`.
pub fn default_session<B>(config: SessionConfig) -> Result<Session<B>>
where
    B: Backend<Device = <DefaultBackend as Backend>::Device>,
{
    let device = default_device(config.device_index);
    Session::new(config, device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_validates_memory_fraction() {
        assert!(default_session::<DefaultBackend>(SessionConfig::new(0.5)).is_ok());
        assert!(default_session::<TrainingBackend>(SessionConfig::new(0.5)).is_ok());
        assert!(default_session::<DefaultBackend>(SessionConfig::new(1.5)).is_err());
    }
}
