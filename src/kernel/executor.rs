use std::{
    any::{
        type_name,
        TypeId,
    },
    collections::HashMap,
    sync::Arc,
};

use async_lock::Mutex;
use wgpu::{
    BindGroupDescriptor,
    BindGroupEntry,
    CommandEncoderDescriptor,
    ComputePassDescriptor,
    ComputePipeline,
};

use super::{
    Kernel,
    TaskPartition,
};
use crate::{
    error::KernelError,
    gpu::Gpu,
    tensor::buffer::{
        TensorBuffer,
        TensorBufferUsage,
    },
};

#[derive(Debug)]
pub struct KernelExecutor {
    compute_pipelines: Mutex<HashMap<(TypeId, u32), Arc<ComputePipeline>>>,
}

impl KernelExecutor {
    pub fn new() -> Self {
        Self {
            compute_pipelines: Mutex::new(HashMap::new()),
        }
    }

    /// Launch `K` over `num_elements` index slots. The workgroup count covers
    /// the index space; the shader masks off out-of-range invocations of the
    /// final partial block. The submit future resolves once the device has
    /// finished the launch.
    pub async fn run_binary<K: Kernel>(
        &self,
        gpu: &Gpu,
        operand_1: &TensorBuffer,
        operand_2: &TensorBuffer,
        result: &TensorBuffer,
        num_elements: usize,
    ) -> Result<(), KernelError> {
        let kernel_id = TypeId::of::<K>();
        let task_partition = TaskPartition::for_elements(gpu, num_elements)?;

        // fetch from cache or create compute pipeline
        // we only lock the cache for a short period to get the compute pipeline, which
        // we clone then.
        let compute_pipeline = {
            let mut compute_pipelines = self.compute_pipelines.lock().await;
            let compute_pipeline = compute_pipelines
                .entry((kernel_id, task_partition.workgroup_size))
                .or_insert_with(|| {
                    Arc::new(K::create_compute_pipeline(
                        gpu,
                        task_partition.workgroup_size,
                    ))
                });
            compute_pipeline.clone()
        };

        // element count as a uniform, padded to 16 bytes
        let parameters = [num_elements as u32, 0, 0, 0];
        let parameter_buffer = TensorBuffer::from_bytes(
            gpu,
            bytemuck::bytes_of(&parameters),
            TensorBufferUsage::Uniform,
            "kernel parameters",
        );

        let bind_group_layout = compute_pipeline.get_bind_group_layout(0);
        let bind_group = gpu.device().create_bind_group(&BindGroupDescriptor {
            label: Some(K::LABEL),
            layout: &bind_group_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: operand_1.as_binding(),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: operand_2.as_binding(),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: result.as_binding(),
                },
                BindGroupEntry {
                    binding: 3,
                    resource: parameter_buffer.as_binding(),
                },
            ],
        });

        let mut encoder = gpu
            .device()
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some(type_name::<K>()),
            });

        {
            let mut compute_pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some(type_name::<K>()),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&compute_pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            compute_pass.dispatch_workgroups(task_partition.workgroup_count, 1, 1);
        }

        gpu.queue().submit([encoder.finish()]).await;

        Ok(())
    }
}
