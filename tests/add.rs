#![allow(dead_code)]

mod common;

use common::{
    allclose,
    gpu,
    host_add,
};
use pgl::{
    error::FallbackError,
    ops,
    tensor::Residency,
    Gpu,
    Tensor,
};

const ATOL: f32 = 1e-6;

#[tokio::test]
async fn it_adds_on_device_at_non_block_aligned_sizes() {
    let Some(gpu) = gpu().await else {
        return;
    };

    for size in [1, 5, 1000, 4096, 1_000_000] {
        let x_host = Tensor::random(size);
        let y_host = Tensor::random(size);
        let expected = host_add(
            x_host.as_host_slice().unwrap(),
            y_host.as_host_slice().unwrap(),
        );

        let x = x_host.to_device(&gpu).await.unwrap();
        let y = y_host.to_device(&gpu).await.unwrap();

        let result = ops::kernel_add(&x, &y).await.unwrap();
        assert_eq!(result.residency(), Residency::Device);
        assert_eq!(result.len(), size);

        let values = result.to_vec().await.unwrap();
        assert!(allclose(&values, &expected, ATOL), "size {size}");
    }
}

#[tokio::test]
async fn it_matches_the_fallback_across_patterns() {
    let Some(gpu) = gpu().await else {
        return;
    };

    let size = 1000;
    let patterns = [
        Tensor::random(size),
        Tensor::zeros(size),
        Tensor::ones(size),
        Tensor::splat(size, 0.5),
        Tensor::splat(size, -0.5),
    ];

    for x_host in patterns {
        let y_host = Tensor::random(size);

        let x = x_host.to_device(&gpu).await.unwrap();
        let y = y_host.to_device(&gpu).await.unwrap();

        let kernel_values = ops::kernel_add(&x, &y).await.unwrap().to_vec().await.unwrap();
        let fallback_values = ops::fallback_add(&x, &y)
            .await
            .unwrap()
            .to_vec()
            .await
            .unwrap();

        assert!(allclose(&kernel_values, &fallback_values, ATOL));
    }
}

#[tokio::test]
async fn it_writes_the_final_partial_block_correctly() {
    let Some(gpu) = gpu().await else {
        return;
    };

    // two full blocks plus a single trailing element
    let size = gpu.workgroup_size() as usize * 2 + 1;

    let x_host = Tensor::random(size);
    let y_host = Tensor::random(size);
    let expected = host_add(
        x_host.as_host_slice().unwrap(),
        y_host.as_host_slice().unwrap(),
    );

    let x = x_host.to_device(&gpu).await.unwrap();
    let y = y_host.to_device(&gpu).await.unwrap();

    let values = ops::kernel_add(&x, &y).await.unwrap().to_vec().await.unwrap();

    assert_eq!(values.len(), size);
    assert!((values[size - 1] - expected[size - 1]).abs() <= ATOL);
    assert!(allclose(&values, &expected, ATOL));
}

#[tokio::test]
async fn it_rejects_host_operands_on_the_kernel_path() {
    let Some(gpu) = gpu().await else {
        return;
    };

    let x = Tensor::random(16).to_device(&gpu).await.unwrap();
    let y = Tensor::random(16);

    assert!(ops::kernel_add(&x, &y).await.is_err());
}

#[tokio::test]
async fn it_runs_the_fallback_on_device_tensors() {
    let Some(gpu) = gpu().await else {
        return;
    };

    let x_host = Tensor::random(512);
    let y_host = Tensor::random(512);
    let expected = host_add(
        x_host.as_host_slice().unwrap(),
        y_host.as_host_slice().unwrap(),
    );

    let x = x_host.to_device(&gpu).await.unwrap();
    let y = y_host.to_device(&gpu).await.unwrap();

    let result = ops::fallback_add(&x, &y).await.unwrap();
    assert_eq!(result.residency(), Residency::Device);
    assert!(allclose(&result.to_vec().await.unwrap(), &expected, ATOL));
}

#[tokio::test]
async fn it_dispatches_host_tensors_to_the_fallback() {
    let x = Tensor::from_vec(vec![1.0_f32, 2.0, 3.0]);
    let y = Tensor::from_vec(vec![0.5_f32, -0.5, 1.5]);

    let result = ops::add(&x, &y, true).await.unwrap();
    assert_eq!(result.residency(), Residency::Host);
    assert_eq!(result.as_host_slice().unwrap(), &[1.5, 1.5, 4.5]);
}

#[tokio::test]
async fn it_ignores_the_accelerated_path_when_not_preferred() {
    let Some(gpu) = gpu().await else {
        return;
    };

    let x_host = Tensor::random(100);
    let y_host = Tensor::random(100);
    let expected = host_add(
        x_host.as_host_slice().unwrap(),
        y_host.as_host_slice().unwrap(),
    );

    let x = x_host.to_device(&gpu).await.unwrap();
    let y = y_host.to_device(&gpu).await.unwrap();

    let result = ops::add(&x, &y, false).await.unwrap();
    assert!(allclose(&result.to_vec().await.unwrap(), &expected, ATOL));
}

/// Forcing the kernel path to fail (operands on two distinct device handles)
/// must degrade transparently to the fallback result.
#[tokio::test]
async fn it_degrades_to_the_fallback_when_the_kernel_fails() {
    let Some(_) = gpu().await else {
        return;
    };
    let (Ok(first), Ok(second)) = (Gpu::new().await, Gpu::new().await) else {
        return;
    };

    let x_host = Tensor::random(256);
    let y_host = Tensor::random(256);
    let expected = host_add(
        x_host.as_host_slice().unwrap(),
        y_host.as_host_slice().unwrap(),
    );

    let x = x_host.to_device(&first).await.unwrap();
    let y = y_host.to_device(&second).await.unwrap();

    assert!(ops::kernel_add(&x, &y).await.is_err());

    let result = ops::add(&x, &y, true).await.unwrap();
    assert_eq!(result.residency(), Residency::Device);
    assert!(allclose(&result.to_vec().await.unwrap(), &expected, ATOL));
}

#[tokio::test]
async fn it_surfaces_size_mismatches_from_the_fallback() {
    let x = Tensor::from_vec(vec![1.0_f32; 3]);
    let y = Tensor::from_vec(vec![1.0_f32; 4]);

    assert!(matches!(
        ops::add(&x, &y, true).await,
        Err(FallbackError::SizeMismatch(_))
    ));
}

#[tokio::test]
async fn it_rejects_mixed_residency_in_the_fallback() {
    let Some(gpu) = gpu().await else {
        return;
    };

    let x = Tensor::random(8).to_device(&gpu).await.unwrap();
    let y = Tensor::random(8);

    assert!(matches!(
        ops::fallback_add(&x, &y).await,
        Err(FallbackError::ResidencyMismatch { .. })
    ));
}
