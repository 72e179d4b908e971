use num::ToPrimitive;
use rand::{
    thread_rng,
    Rng,
    SeedableRng,
};
use rand_xorshift::XorShiftRng;

use crate::element::Element;

fn abs_diff<T: Element>(x: T, y: T) -> f64 {
    let x = x.to_f64().unwrap_or(f64::NAN);
    let y = y.to_f64().unwrap_or(f64::NAN);
    (x - y).abs()
}

/// Elementwise agreement within an absolute tolerance. NaNs never agree.
pub(crate) fn allclose<T: Element>(a: &[T], b: &[T], atol: f64) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(&x, &y)| abs_diff(x, y) <= atol)
}

pub(crate) fn max_abs_diff<T: Element>(a: &[T], b: &[T]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| abs_diff(x, y))
        .fold(0.0, f64::max)
}

/// Uniform samples in [-1, 1).
pub(crate) fn random_vec(len: usize) -> Vec<f32> {
    let mut rng = XorShiftRng::seed_from_u64(thread_rng().gen());
    (0..len).map(|_| rng.gen::<f32>() * 2.0 - 1.0).collect()
}
