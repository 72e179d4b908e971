//! Benchmark and correctness validation for the two add executors.

use std::time::{
    Duration,
    Instant,
};

use serde::Serialize;
use wgpu::AdapterInfo;

use crate::{
    error::{
        FallbackError,
        KernelError,
        TransferError,
    },
    ops::{
        fallback_add,
        kernel_add,
    },
    utils::{
        allclose,
        max_abs_diff,
    },
    Gpu,
    Tensor,
};

pub const DEFAULT_BENCH_SIZES: &[usize] = &[1000, 10_000, 100_000, 1_000_000];
pub const DEFAULT_VALIDATE_SIZES: &[usize] = &[100, 1000, 10_000];

/// Untimed invocations per executor before measuring, to keep one-time
/// pipeline compilation out of the numbers.
const WARMUP_RUNS: usize = 3;

pub const ACCURACY_TOLERANCE: f64 = 1e-6;

/// Environment variable naming a path the benchmark profile is written to.
pub const PROFILE_PATH_VAR: &str = "PGL_PROFILE_PATH";

/// Per-size measurements of one benchmark run. Lists stay empty when no
/// adapter is available.
#[derive(Clone, Debug, Default, Serialize)]
pub struct BenchmarkResults {
    pub sizes: Vec<usize>,
    pub kernel_times_ms: Vec<f64>,
    pub fallback_times_ms: Vec<f64>,
    pub speedup_ratios: Vec<f64>,
    pub accuracy_checks: Vec<bool>,
    pub max_abs_diffs: Vec<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("kernel error")]
    Kernel(#[from] KernelError),

    #[error("fallback error")]
    Fallback(#[from] FallbackError),

    #[error("transfer error")]
    Transfer(#[from] TransferError),
}

fn mean_ms(times: &[Duration]) -> f64 {
    if times.is_empty() {
        return 0.0;
    }
    let total: f64 = times.iter().map(Duration::as_secs_f64).sum();
    total / times.len() as f64 * 1000.0
}

/// Time both executors over `sizes`. Every timed window spans a full
/// submit-to-completion round trip, so asynchronous launch queuing can't
/// corrupt the measurements.
pub async fn benchmark_add(sizes: &[usize], num_runs: usize) -> Result<BenchmarkResults, BenchError> {
    let mut results = BenchmarkResults {
        sizes: sizes.to_vec(),
        ..Default::default()
    };

    let gpu = match Gpu::new().await {
        Ok(gpu) => gpu,
        Err(error) => {
            tracing::warn!(%error, "no accelerator available, skipping benchmark");
            return Ok(results);
        }
    };

    tracing::info!(?sizes, num_runs, "starting add benchmark");

    for &size in sizes {
        tracing::info!(size, "benchmarking");

        let x = Tensor::random(size).to_device(&gpu).await?;
        let y = Tensor::random(size).to_device(&gpu).await?;

        for _ in 0..WARMUP_RUNS {
            kernel_add(&x, &y).await?;
            fallback_add(&x, &y).await?;
        }

        let mut kernel_times = Vec::with_capacity(num_runs);
        for _ in 0..num_runs {
            let start = Instant::now();
            kernel_add(&x, &y).await?;
            kernel_times.push(start.elapsed());
        }

        let mut fallback_times = Vec::with_capacity(num_runs);
        for _ in 0..num_runs {
            let start = Instant::now();
            fallback_add(&x, &y).await?;
            fallback_times.push(start.elapsed());
        }

        let kernel_ms = mean_ms(&kernel_times);
        let fallback_ms = mean_ms(&fallback_times);
        let speedup = if kernel_ms > 0.0 {
            fallback_ms / kernel_ms
        }
        else {
            0.0
        };

        let kernel_values = kernel_add(&x, &y).await?.to_vec().await?;
        let fallback_values = fallback_add(&x, &y).await?.to_vec().await?;
        let agrees = allclose(&kernel_values, &fallback_values, ACCURACY_TOLERANCE);
        let max_diff = max_abs_diff(&kernel_values, &fallback_values);

        tracing::info!(size, kernel_ms, fallback_ms, speedup, agrees, max_diff, "measured");

        results.kernel_times_ms.push(kernel_ms);
        results.fallback_times_ms.push(fallback_ms);
        results.speedup_ratios.push(speedup);
        results.accuracy_checks.push(agrees);
        results.max_abs_diffs.push(max_diff);
    }

    Ok(results)
}

/// Check the kernel against the fallback and an independently computed host
/// reference, across a battery of input patterns. Returns false when no
/// accelerator is present or any pattern disagrees at any size.
pub async fn validate_correctness(sizes: &[usize]) -> bool {
    let gpu = match Gpu::new().await {
        Ok(gpu) => gpu,
        Err(error) => {
            tracing::warn!(%error, "no accelerator available, skipping validation");
            return false;
        }
    };

    let mut all_passed = true;

    for &size in sizes {
        tracing::info!(size, "validating");

        let patterns: Vec<(&str, Tensor<f32>)> = vec![
            ("random", Tensor::random(size)),
            ("zeros", Tensor::zeros(size)),
            ("ones", Tensor::ones(size)),
            ("constant", Tensor::splat(size, 0.5)),
        ];

        for (pattern, x_host) in patterns {
            let y_host = Tensor::random(size);

            match check_pattern(&gpu, &x_host, &y_host).await {
                Ok(true) => {
                    tracing::debug!(size, pattern, "validation passed");
                }
                Ok(false) => {
                    tracing::error!(size, pattern, "validation failed");
                    all_passed = false;
                }
                Err(error) => {
                    tracing::error!(size, pattern, %error, "validation errored");
                    all_passed = false;
                }
            }
        }
    }

    all_passed
}

async fn check_pattern(
    gpu: &Gpu,
    x_host: &Tensor<f32>,
    y_host: &Tensor<f32>,
) -> Result<bool, BenchError> {
    let x_values = x_host.to_vec().await?;
    let y_values = y_host.to_vec().await?;
    let reference: Vec<f32> = x_values
        .iter()
        .zip(&y_values)
        .map(|(a, b)| a + b)
        .collect();

    let x = x_host.to_device(gpu).await?;
    let y = y_host.to_device(gpu).await?;

    let kernel_values = kernel_add(&x, &y).await?.to_vec().await?;
    let fallback_values = fallback_add(&x, &y).await?.to_vec().await?;

    Ok(allclose(&kernel_values, &fallback_values, ACCURACY_TOLERANCE)
        && allclose(&kernel_values, &reference, ACCURACY_TOLERANCE))
}

/// Adapter info and the kernel block size, or `None` without an adapter.
pub async fn system_info() -> Option<(AdapterInfo, u32)> {
    match Gpu::new().await {
        Ok(gpu) => Some((gpu.info(), gpu.workgroup_size())),
        Err(error) => {
            tracing::warn!(%error, "no adapter available");
            None
        }
    }
}
