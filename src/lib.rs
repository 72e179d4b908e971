pub mod bench;
pub mod element;
pub mod error;
pub mod export;
pub mod gpu;
pub mod graph;
pub mod kernel;
pub mod ops;
pub mod tensor;
mod utils;

pub use crate::{
    gpu::Gpu,
    tensor::Tensor,
};
