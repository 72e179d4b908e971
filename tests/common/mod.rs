use pgl::Gpu;
use tokio::sync::OnceCell;

static GPU: OnceCell<Option<Gpu>> = OnceCell::const_new();

/// Shared adapter for device tests. `None` when the machine has no compute
/// adapter; tests skip themselves in that case.
pub async fn gpu() -> Option<Gpu> {
    GPU.get_or_init(|| async { Gpu::new().await.ok() })
        .await
        .clone()
}

pub fn allclose(a: &[f32], b: &[f32], atol: f32) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() <= atol)
}

pub fn host_add(a: &[f32], b: &[f32]) -> Vec<f32> {
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}
