pub mod binary;
pub mod executor;

use askama::Template;
use wgpu::{
    ComputePipeline,
    ComputePipelineDescriptor,
    ShaderModuleDescriptor,
    ShaderSource,
};

use crate::{
    error::KernelError,
    gpu::Gpu,
};

/// A compute kernel over the fixed binary bind group layout: two read-only
/// operand buffers, one read-write result buffer and the element count as a
/// uniform. `BODY` runs once per in-range index; out-of-range invocations of
/// the final partial block are masked off in the template.
pub trait Kernel: 'static {
    const LABEL: &'static str;
    const BODY: &'static str;
    const ELEMENT: &'static str;

    fn source(workgroup_size: u32) -> String {
        let template = BinaryKernelTemplate {
            label: Self::LABEL,
            element: Self::ELEMENT,
            workgroup_size,
            body: Self::BODY,
        };

        template.render().expect("kernel render failed")
    }

    fn create_compute_pipeline(gpu: &Gpu, workgroup_size: u32) -> ComputePipeline {
        let source = Self::source(workgroup_size);

        tracing::debug!("shader source for {}", Self::LABEL);
        tracing::debug!("{source}");

        let module = gpu.device().create_shader_module(ShaderModuleDescriptor {
            label: Some(&format!("shader module: {}", Self::LABEL)),
            source: ShaderSource::Wgsl(source.into()),
        });

        let pipeline = gpu
            .device()
            .create_compute_pipeline(&ComputePipelineDescriptor {
                label: Some(&format!("compute pipeline: {}", Self::LABEL)),
                layout: None,
                module: &module,
                entry_point: "main",
            });

        pipeline
    }
}

#[derive(Debug, Template)]
#[template(path = "binary.wgsl", escape = "none")]
pub struct BinaryKernelTemplate {
    label: &'static str,
    element: &'static str,
    workgroup_size: u32,
    body: &'static str,
}

/// Per-launch partition of the 1-D index space into contiguous blocks, one
/// workgroup per block. Recomputed for every invocation, never persisted.
#[derive(Copy, Clone, Debug)]
pub struct TaskPartition {
    pub workgroup_size: u32,
    pub workgroup_count: u32,
}

impl TaskPartition {
    pub fn for_elements(gpu: &Gpu, num_elements: usize) -> Result<Self, KernelError> {
        let workgroup_size = gpu.workgroup_size();
        let workgroup_count = num_elements.div_ceil(workgroup_size as usize) as u64;

        let limit = gpu.limits().max_compute_workgroups_per_dimension;
        if workgroup_count > u64::from(limit) {
            return Err(KernelError::UnsupportedLaunch {
                num_elements,
                workgroup_count,
                limit,
            });
        }

        Ok(TaskPartition {
            workgroup_size,
            workgroup_count: workgroup_count as u32,
        })
    }
}
