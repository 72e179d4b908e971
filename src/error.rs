use crate::{
    gpu::Gpu,
    tensor::Residency,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no adapter found")]
    NoAdapter,

    #[error("could not request device from adapter")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
}

#[derive(Debug, thiserror::Error)]
#[error("gpu mismatch: '{}' != '{}'", first.name(), second.name())]
pub struct GpuMismatch {
    pub first: Gpu,
    pub second: Gpu,
}

#[derive(Debug, thiserror::Error)]
#[error("size mismatch: {first} != {second}")]
pub struct SizeMismatch {
    pub first: usize,
    pub second: usize,
}

impl SizeMismatch {
    pub fn new(first: usize, second: usize) -> Self {
        Self { first, second }
    }
}

/// Failures of the accelerated add path. These are never retried here; the
/// dispatcher in [`crate::ops`] decides whether to degrade to the fallback.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("size mismatch")]
    SizeMismatch(#[from] SizeMismatch),

    #[error("gpu mismatch")]
    GpuMismatch(#[from] GpuMismatch),

    #[error("operand does not reside on the compute device")]
    NotOnDevice,

    #[error(
        "launch of {num_elements} elements needs {workgroup_count} workgroups, device limit is {limit}"
    )]
    UnsupportedLaunch {
        num_elements: usize,
        workgroup_count: u64,
        limit: u32,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum FallbackError {
    #[error("size mismatch")]
    SizeMismatch(#[from] SizeMismatch),

    #[error("residency mismatch: {first:?} != {second:?}")]
    ResidencyMismatch { first: Residency, second: Residency },

    #[error("transfer error")]
    Transfer(#[from] TransferError),
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("buffer async error")]
    BufferAsync(#[from] wgpu::BufferAsyncError),
}
