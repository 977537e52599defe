//! # Runtime Tensors
//!
//! The blob type stored in a [`crate::Workspace`]: a dynamic shape plus
//! row-major `f32` data. Operations that combine tensors return
//! `Result` so that a bad graph surfaces as an operator failure instead of a
//! panic on a worker thread.

use std::fmt;

use crate::error::KernelError;

/// A dynamically shaped `f32` tensor.
#[derive(Clone, PartialEq, Default)]
pub struct Tensor {
    /// Shape of the tensor
    pub shape: Vec<usize>,
    /// Flattened data in row-major order
    pub data: Vec<f32>,
}

impl Tensor {
    /// A tensor with no shape and no data, as created by
    /// [`crate::Workspace::create_blob`].
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a scalar tensor.
    pub fn scalar(value: f32) -> Self {
        Self {
            shape: vec![],
            data: vec![value],
        }
    }

    /// Create a 1D vector tensor.
    pub fn vector(data: Vec<f32>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    /// Check if this is a scalar.
    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty() && self.data.len() == 1
    }

    /// Element-wise addition.
    pub fn add(&self, other: &Tensor) -> Result<Tensor, KernelError> {
        self.zip_with(other, |a, b| a + b)
    }

    /// Element-wise multiplication.
    pub fn mul(&self, other: &Tensor) -> Result<Tensor, KernelError> {
        self.zip_with(other, |a, b| a * b)
    }

    /// Element-wise ReLU.
    pub fn relu(&self) -> Tensor {
        self.map(|x| x.max(0.0))
    }

    /// Sum all elements to a scalar.
    pub fn sum_all(&self) -> Tensor {
        Tensor::scalar(self.data.iter().sum())
    }

    /// Apply a function to each element.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Tensor {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }

    fn zip_with(&self, other: &Tensor, f: impl Fn(f32, f32) -> f32) -> Result<Tensor, KernelError> {
        if self.shape != other.shape {
            return Err(KernelError::ShapeMismatch {
                left: self.shape.clone(),
                right: other.shape.clone(),
            });
        }
        Ok(Tensor {
            shape: self.shape.clone(),
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_scalar() {
            write!(f, "Tensor(scalar={})", self.data[0])
        } else if self.shape.len() == 1 {
            write!(f, "Tensor(vec[{}]={:?})", self.shape[0], self.data)
        } else {
            write!(f, "Tensor(shape={:?}, data={:?})", self.shape, self.data)
        }
    }
}
