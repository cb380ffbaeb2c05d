//! Caller-owned tensors passed into and out of a forward pass.
//!
//! Both types start empty and release their buffers when dropped, so an early
//! `?` return never leaks. `clear()` resets a value for reuse.

use ndarray::{ArrayD, IxDyn};
use rand::Rng;

use crate::error::{PoseError, Result};

/// A shaped `f32` buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: ArrayD<f32>,
}

impl Tensor {
    /// Create an empty tensor (shape `[0]`, no elements).
    pub fn new() -> Self {
        Self {
            data: ArrayD::zeros(IxDyn(&[0])),
        }
    }

    /// Wrap an existing array.
    pub fn from_array(data: ArrayD<f32>) -> Self {
        Self { data }
    }

    /// Build a tensor from a shape and a flat row-major buffer.
    pub fn from_shape_vec(shape: &[usize], values: Vec<f32>) -> Result<Self> {
        let data = ArrayD::from_shape_vec(IxDyn(shape), values)
            .map_err(|e| PoseError::tensor(format!("Array shape error: {}", e)))?;
        Ok(Self { data })
    }

    /// Create a tensor of the given shape filled with uniform values in `[0, 1)`.
    pub fn random<R: Rng + ?Sized>(shape: &[usize], rng: &mut R) -> Self {
        Self {
            data: ArrayD::from_shape_simple_fn(IxDyn(shape), || rng.gen::<f32>()),
        }
    }

    /// Release the buffer and return to the empty state.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Get the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Get the number of dimensions.
    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Get the total number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the tensor is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the underlying array.
    pub fn data(&self) -> &ArrayD<f32> {
        &self.data
    }

    /// Take ownership of the underlying array.
    pub fn into_array(self) -> ArrayD<f32> {
        self.data
    }

    /// Contiguous row-major view of the elements, if the layout allows it.
    pub fn as_slice(&self) -> Option<&[f32]> {
        self.data.as_slice()
    }
}

impl Default for Tensor {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ArrayD<f32>> for Tensor {
    fn from(data: ArrayD<f32>) -> Self {
        Self::from_array(data)
    }
}

/// Ordered outputs of a forward pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TensorVector {
    tensors: Vec<Tensor>,
}

impl TensorVector {
    /// Create an empty vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every tensor. The allocation for the list itself is kept.
    pub fn clear(&mut self) {
        self.tensors.clear();
    }

    /// Append a tensor.
    pub fn push(&mut self, tensor: Tensor) {
        self.tensors.push(tensor);
    }

    /// Number of tensors.
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Check if the vector holds no tensors.
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Get the tensor at `index`.
    pub fn get(&self, index: usize) -> Option<&Tensor> {
        self.tensors.get(index)
    }

    /// Iterate over the tensors in output order.
    pub fn iter(&self) -> std::slice::Iter<'_, Tensor> {
        self.tensors.iter()
    }

    pub(crate) fn reserve(&mut self, additional: usize) {
        self.tensors.reserve(additional);
    }
}

impl std::ops::Index<usize> for TensorVector {
    type Output = Tensor;

    fn index(&self, index: usize) -> &Tensor {
        &self.tensors[index]
    }
}

impl IntoIterator for TensorVector {
    type Item = Tensor;
    type IntoIter = std::vec::IntoIter<Tensor>;

    fn into_iter(self) -> Self::IntoIter {
        self.tensors.into_iter()
    }
}

impl<'a> IntoIterator for &'a TensorVector {
    type Item = &'a Tensor;
    type IntoIter = std::slice::Iter<'a, Tensor>;

    fn into_iter(self) -> Self::IntoIter {
        self.tensors.iter()
    }
}
