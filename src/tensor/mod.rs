pub mod buffer;

use std::{
    mem::size_of,
    sync::Arc,
};

use derivative::Derivative;

use self::buffer::{
    TensorBuffer,
    TensorBufferUsage,
};
use crate::{
    element::Element,
    error::TransferError,
    gpu::Gpu,
    utils,
};

/// Where a tensor's backing memory lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Residency {
    Host,
    Device,
}

/// A fixed-length, contiguous 1-D buffer of [`Element`]s, resident either in
/// host memory or on the compute device.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct Tensor<T: Element> {
    len: usize,

    #[derivative(Debug = "ignore")]
    storage: Storage<T>,
}

#[derive(Clone)]
enum Storage<T> {
    Host(Arc<Vec<T>>),
    Device { gpu: Gpu, buffer: TensorBuffer },
}

impl<T: Element> Tensor<T> {
    pub fn from_vec(values: Vec<T>) -> Self {
        Self {
            len: values.len(),
            storage: Storage::Host(Arc::new(values)),
        }
    }

    pub fn splat(len: usize, value: T) -> Self {
        Self::from_vec(vec![value; len])
    }

    pub fn zeros(len: usize) -> Self {
        Self::splat(len, T::zero())
    }

    pub fn ones(len: usize) -> Self {
        Self::splat(len, T::one())
    }

    pub(crate) fn from_device_buffer(gpu: Gpu, buffer: TensorBuffer, len: usize) -> Self {
        Self {
            len,
            storage: Storage::Device { gpu, buffer },
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn residency(&self) -> Residency {
        match &self.storage {
            Storage::Host(_) => Residency::Host,
            Storage::Device { .. } => Residency::Device,
        }
    }

    pub fn is_on_device(&self) -> bool {
        self.residency() == Residency::Device
    }

    pub fn as_host_slice(&self) -> Option<&[T]> {
        match &self.storage {
            Storage::Host(values) => Some(values),
            Storage::Device { .. } => None,
        }
    }

    pub(crate) fn device_parts(&self) -> Option<(&Gpu, &TensorBuffer)> {
        match &self.storage {
            Storage::Host(_) => None,
            Storage::Device { gpu, buffer } => Some((gpu, buffer)),
        }
    }

    fn upload(gpu: &Gpu, values: &[T]) -> Self {
        let buffer = TensorBuffer::from_bytes(
            gpu,
            bytemuck::cast_slice(values),
            TensorBufferUsage::Compute,
            "Tensor::to_device",
        );

        Self::from_device_buffer(gpu.clone(), buffer, values.len())
    }

    /// Move the tensor to `gpu`. A no-op for tensors already resident there.
    pub async fn to_device(&self, gpu: &Gpu) -> Result<Tensor<T>, TransferError> {
        match &self.storage {
            Storage::Host(values) => Ok(Self::upload(gpu, values)),
            Storage::Device { gpu: current, .. } if current.is_same(gpu) => Ok(self.clone()),
            Storage::Device { .. } => {
                let values = self.to_vec().await?;
                Ok(Self::upload(gpu, &values))
            }
        }
    }

    pub async fn to_host(&self) -> Result<Tensor<T>, TransferError> {
        match &self.storage {
            Storage::Host(_) => Ok(self.clone()),
            Storage::Device { .. } => Ok(Self::from_vec(self.to_vec().await?)),
        }
    }

    pub async fn to_vec(&self) -> Result<Vec<T>, TransferError> {
        match &self.storage {
            Storage::Host(values) => Ok(values.as_ref().clone()),
            Storage::Device { gpu, buffer } => {
                let byte_len = self.len * size_of::<T>();
                let bytes = buffer.read_bytes(gpu, byte_len).await?;
                // the staging readback is padded; the cast copies, so the
                // byte vector's alignment doesn't matter
                Ok(bytemuck::pod_collect_to_vec(&bytes[..byte_len]))
            }
        }
    }
}

impl Tensor<f32> {
    /// Fresh random operand, uniform in [-1, 1).
    pub fn random(len: usize) -> Self {
        Self::from_vec(utils::random_vec(len))
    }
}
