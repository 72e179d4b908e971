use std::sync::Arc;

use wgpu::{
    BindingResource,
    BufferAddress,
    BufferDescriptor,
    BufferUsages,
    CommandEncoderDescriptor,
    MapMode,
    COPY_BUFFER_ALIGNMENT,
};
use wgpu_async::AsyncBuffer;

use crate::{
    error::TransferError,
    gpu::Gpu,
};

#[derive(Debug)]
struct TensorBufferInner {
    buffer: AsyncBuffer,
    usage: TensorBufferUsage,
}

impl Drop for TensorBufferInner {
    fn drop(&mut self) {
        self.buffer.destroy();
    }
}

#[derive(Clone, Debug)]
pub struct TensorBuffer {
    inner: Arc<TensorBufferInner>,
}

/// Valid vulkan usage is
/// 1. buffer size must be a multiple of COPY_BUFFER_ALIGNMENT.
/// 2. buffer size must be greater than 0.
/// Therefore we round the value up to the nearest multiple, and ensure it's at
/// least COPY_BUFFER_ALIGNMENT.
pub(crate) fn padded_size(unpadded_size: BufferAddress) -> BufferAddress {
    let align_mask = COPY_BUFFER_ALIGNMENT - 1;
    ((unpadded_size + align_mask) & !align_mask).max(COPY_BUFFER_ALIGNMENT)
}

impl TensorBuffer {
    /// Allocate an uninitialized tensor buffer.
    pub fn allocate(gpu: &Gpu, byte_size: usize, usage: TensorBufferUsage, label: &str) -> Self {
        let size = padded_size(byte_size as BufferAddress);

        let buffer = gpu.device().create_buffer(&BufferDescriptor {
            label: Some(label),
            size,
            usage: usage.into(),
            mapped_at_creation: false,
        });

        Self {
            inner: Arc::new(TensorBufferInner { buffer, usage }),
        }
    }

    /// Allocate a tensor buffer and fill it with `bytes`. The buffer is mapped
    /// at creation, written through the mapping and unmapped before use.
    pub fn from_bytes(gpu: &Gpu, bytes: &[u8], usage: TensorBufferUsage, label: &str) -> Self {
        let size = padded_size(bytes.len() as BufferAddress);

        let buffer = gpu.device().create_buffer(&BufferDescriptor {
            label: Some(label),
            size,
            usage: usage.into(),
            mapped_at_creation: true,
        });

        {
            let slice = buffer.slice(..);
            let mut view = slice.get_mapped_range_mut();
            view[..bytes.len()].copy_from_slice(bytes);
        }
        buffer.unmap();

        Self {
            inner: Arc::new(TensorBufferInner { buffer, usage }),
        }
    }

    pub fn buffer(&self) -> &AsyncBuffer {
        &self.inner.buffer
    }

    pub fn usage(&self) -> TensorBufferUsage {
        self.inner.usage
    }

    pub fn size(&self) -> BufferAddress {
        self.inner.buffer.size()
    }

    pub fn as_binding(&self) -> BindingResource {
        if self.inner.usage == TensorBufferUsage::CopyToHost {
            panic!(
                "can't bind tensor buffer to kernel. usage={:?}",
                self.inner.usage
            );
        }
        self.inner.buffer.as_entire_binding()
    }

    /// Copy the first `byte_len` bytes through a staging buffer into host
    /// memory. The returned vector is padded to COPY_BUFFER_ALIGNMENT.
    pub async fn read_bytes(&self, gpu: &Gpu, byte_len: usize) -> Result<Vec<u8>, TransferError> {
        let copy_size = padded_size(byte_len as BufferAddress);
        assert!(copy_size <= self.size());

        let staging = gpu.device().create_buffer(&BufferDescriptor {
            label: Some("TensorBuffer::read_bytes"),
            size: copy_size,
            usage: TensorBufferUsage::CopyToHost.into(),
            mapped_at_creation: false,
        });

        let mut encoder = gpu
            .device()
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("TensorBuffer::read_bytes"),
            });
        encoder.copy_buffer_to_buffer(self.buffer(), 0, &staging, 0, copy_size);

        gpu.queue().submit([encoder.finish()]).await;

        let slice = staging.slice(..);
        slice.map_async(MapMode::Read).await?;
        let bytes = {
            let view = slice.get_mapped_range();
            view.to_vec()
        };
        staging.unmap();

        Ok(bytes)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TensorBufferUsage {
    Compute,
    Uniform,
    CopyToHost,
}

impl From<TensorBufferUsage> for BufferUsages {
    fn from(value: TensorBufferUsage) -> Self {
        match value {
            TensorBufferUsage::Compute => BufferUsages::STORAGE | BufferUsages::COPY_SRC,
            TensorBufferUsage::Uniform => BufferUsages::UNIFORM,
            TensorBufferUsage::CopyToHost => BufferUsages::MAP_READ | BufferUsages::COPY_DST,
        }
    }
}
