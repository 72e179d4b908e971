use std::{
    marker::PhantomData,
    mem::size_of,
};

use super::Kernel;
use crate::{
    element::Element,
    error::{
        KernelError,
        SizeMismatch,
    },
    tensor::{
        buffer::{
            TensorBuffer,
            TensorBufferUsage,
        },
        Tensor,
    },
};

pub struct ElementwiseAddition<T>(PhantomData<T>);

impl<T: Element> Kernel for ElementwiseAddition<T> {
    const LABEL: &'static str = "ElementwiseAddition";
    const BODY: &'static str = "result[index] = operand_1[index] + operand_2[index];";
    const ELEMENT: &'static str = T::WGSL_TYPE;
}

impl<T: Element> Tensor<T> {
    /// Run a binary elementwise kernel over `self` and `other`. Both operands
    /// must be device-resident on the same [`crate::Gpu`] and of equal
    /// length. Allocates the result buffer; operands are not mutated.
    pub async fn binary_elementwise<K: Kernel>(
        &self,
        other: &Tensor<T>,
    ) -> Result<Tensor<T>, KernelError> {
        if self.len() != other.len() {
            return Err(SizeMismatch::new(self.len(), other.len()).into());
        }

        let (gpu, operand_1) = self.device_parts().ok_or(KernelError::NotOnDevice)?;
        let (other_gpu, operand_2) = other.device_parts().ok_or(KernelError::NotOnDevice)?;
        gpu.check_same(other_gpu)?;

        let result = TensorBuffer::allocate(
            gpu,
            self.len() * size_of::<T>(),
            TensorBufferUsage::Compute,
            "Tensor::binary_elementwise",
        );

        gpu.run_binary::<K>(operand_1, operand_2, &result, self.len())
            .await?;

        Ok(Tensor::from_device_buffer(gpu.clone(), result, self.len()))
    }

    pub async fn add(&self, other: &Tensor<T>) -> Result<Tensor<T>, KernelError> {
        self.binary_elementwise::<ElementwiseAddition<T>>(other)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Gpu;

    /// The mask has to guard stores: with a launch covering more index slots
    /// than `num_elements`, slots past the end must keep their old contents.
    #[tokio::test]
    async fn it_masks_stores_past_the_element_count() {
        let Ok(gpu) = Gpu::new().await else {
            return;
        };

        const SENTINEL: f32 = -99.0;
        let num_elements = 5;
        let slots = 8;

        let operand_1 = TensorBuffer::from_bytes(
            &gpu,
            bytemuck::cast_slice(&vec![1.0_f32; slots]),
            TensorBufferUsage::Compute,
            "test operand 1",
        );
        let operand_2 = TensorBuffer::from_bytes(
            &gpu,
            bytemuck::cast_slice(&vec![2.0_f32; slots]),
            TensorBufferUsage::Compute,
            "test operand 2",
        );
        let result = TensorBuffer::from_bytes(
            &gpu,
            bytemuck::cast_slice(&vec![SENTINEL; slots]),
            TensorBufferUsage::Compute,
            "test result",
        );

        gpu.run_binary::<ElementwiseAddition<f32>>(&operand_1, &operand_2, &result, num_elements)
            .await
            .unwrap();

        let bytes = result
            .read_bytes(&gpu, slots * size_of::<f32>())
            .await
            .unwrap();
        let values: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes[..slots * size_of::<f32>()]);

        assert_eq!(&values[..num_elements], &[3.0; 5]);
        assert_eq!(&values[num_elements..], &[SENTINEL; 3]);
    }
}
