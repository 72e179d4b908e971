use std::fmt::Debug;

use bytemuck::Pod;
use num::{
    Num,
    ToPrimitive,
};

/// Scalar types that can live in tensor buffers and WGSL storage arrays.
pub trait Element:
    Pod + Num + ToPrimitive + PartialOrd + Debug + Send + Sync + 'static
{
    const WGSL_TYPE: &'static str;
}

macro_rules! impl_element {
    ($ty:ident, $wgsl:literal) => {
        impl Element for $ty {
            const WGSL_TYPE: &'static str = $wgsl;
        }
    };
}

impl_element!(f32, "f32");
impl_element!(i32, "i32");
impl_element!(u32, "u32");
