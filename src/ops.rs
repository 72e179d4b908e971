//! The two add executors and the dispatch policy between them.

use crate::{
    element::Element,
    error::{
        FallbackError,
        KernelError,
        SizeMismatch,
    },
    tensor::Tensor,
};

/// Accelerated add: masked block kernel over a 1-D grid. Both operands must
/// already reside on the device.
pub async fn kernel_add<T: Element>(
    x: &Tensor<T>,
    y: &Tensor<T>,
) -> Result<Tensor<T>, KernelError> {
    x.add(y).await
}

/// Host-library add. Works for host- and device-resident operands; the result
/// matches the operands' residency. Device operands are read back, added on
/// the host and the result uploaded again.
pub async fn fallback_add<T: Element>(
    x: &Tensor<T>,
    y: &Tensor<T>,
) -> Result<Tensor<T>, FallbackError> {
    if x.len() != y.len() {
        return Err(SizeMismatch::new(x.len(), y.len()).into());
    }

    if let (Some(a), Some(b)) = (x.as_host_slice(), y.as_host_slice()) {
        return Ok(Tensor::from_vec(host_add(a, b)));
    }

    if let (Some((gpu, _)), Some(_)) = (x.device_parts(), y.device_parts()) {
        let x_values = x.to_vec().await?;
        let y_values = y.to_vec().await?;
        let values = host_add(&x_values, &y_values);
        return Ok(Tensor::from_vec(values).to_device(gpu).await?);
    }

    Err(FallbackError::ResidencyMismatch {
        first: x.residency(),
        second: y.residency(),
    })
}

fn host_add<T: Element>(x: &[T], y: &[T]) -> Vec<T> {
    x.iter().zip(y).map(|(&a, &b)| a + b).collect()
}

/// Dispatch an add to the best available executor.
///
/// With `prefer_accelerated` set and both operands device-resident, the
/// kernel path is attempted once; any failure is logged and degraded
/// transparently to the fallback. In every other case the fallback runs
/// directly, so the caller always gets a correct result or the fallback's own
/// error.
pub async fn add<T: Element>(
    x: &Tensor<T>,
    y: &Tensor<T>,
    prefer_accelerated: bool,
) -> Result<Tensor<T>, FallbackError> {
    if prefer_accelerated && x.is_on_device() && y.is_on_device() {
        match kernel_add(x, y).await {
            Ok(result) => return Ok(result),
            Err(error) => {
                tracing::warn!(%error, "accelerated add failed, falling back to host path");
            }
        }
    }

    fallback_add(x, y).await
}
