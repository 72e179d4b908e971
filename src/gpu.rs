use std::sync::Arc;

use wgpu::{
    util::initialize_adapter_from_env_or_default,
    Adapter,
    AdapterInfo,
    DeviceDescriptor,
    Instance,
    Limits,
};
use wgpu_async::{
    AsyncDevice,
    AsyncQueue,
};

use crate::{
    error::{
        Error,
        GpuMismatch,
        KernelError,
    },
    kernel::{
        executor::KernelExecutor,
        Kernel,
    },
    tensor::buffer::TensorBuffer,
};

/// Block size used for 1-D kernel launches, clamped to the device limits at
/// [`Gpu`] construction.
pub const DEFAULT_BLOCK_SIZE: u32 = 1024;

#[derive(Debug)]
struct Inner {
    adapter: Adapter,
    device: AsyncDevice,
    queue: AsyncQueue,
    executor: KernelExecutor,
    limits: Limits,
    workgroup_size: u32,
}

/// Handle to the compute device. Cheap to clone; all clones share the same
/// adapter, device, queue and pipeline cache.
#[derive(Debug, Clone)]
pub struct Gpu {
    inner: Arc<Inner>,
}

impl Gpu {
    pub async fn new() -> Result<Self, Error> {
        let instance = Instance::default();
        let adapter = initialize_adapter_from_env_or_default(&instance, None)
            .await
            .ok_or(Error::NoAdapter)?;
        Self::from_adapter(adapter).await
    }

    pub async fn from_adapter(adapter: Adapter) -> Result<Self, Error> {
        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: None,
                    required_features: Default::default(),
                    required_limits: Default::default(),
                },
                None,
            )
            .await?;

        let (device, queue) = wgpu_async::wrap(Arc::new(device), Arc::new(queue));

        let executor = KernelExecutor::new();
        let limits = Limits::default();

        let workgroup_size = DEFAULT_BLOCK_SIZE
            .min(limits.max_compute_workgroup_size_x)
            .min(limits.max_compute_invocations_per_workgroup);

        Ok(Self {
            inner: Arc::new(Inner {
                adapter,
                device,
                queue,
                executor,
                limits,
                workgroup_size,
            }),
        })
    }

    pub(crate) fn device(&self) -> &AsyncDevice {
        &self.inner.device
    }

    pub(crate) fn queue(&self) -> &AsyncQueue {
        &self.inner.queue
    }

    pub(crate) fn limits(&self) -> &Limits {
        &self.inner.limits
    }

    /// Number of invocations per workgroup for 1-D launches.
    pub fn workgroup_size(&self) -> u32 {
        self.inner.workgroup_size
    }

    pub fn is_same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn check_same(&self, other: &Self) -> Result<(), GpuMismatch> {
        if self.is_same(other) {
            Ok(())
        }
        else {
            Err(GpuMismatch {
                first: self.clone(),
                second: other.clone(),
            })
        }
    }

    pub(crate) async fn run_binary<K: Kernel>(
        &self,
        operand_1: &TensorBuffer,
        operand_2: &TensorBuffer,
        result: &TensorBuffer,
        num_elements: usize,
    ) -> Result<(), KernelError> {
        self.inner
            .executor
            .run_binary::<K>(self, operand_1, operand_2, result, num_elements)
            .await
    }

    pub fn name(&self) -> String {
        self.inner.adapter.get_info().name
    }

    pub fn info(&self) -> AdapterInfo {
        self.inner.adapter.get_info()
    }
}
