//! Core tensor data structures for volumetric fields.
//!
//! # Field Layout
//!
//! A field is a rank-5 [`Tensor`] indexed as `(batch, channel, depth, height, width)`
//! and stored flat in row-major order, so `width` is the fastest-moving index.
//!
//! - Vector fields carry 3 channels, one per spatial [`Axis`] (`x`, `y`, `z`).
//! - Scalar fields (divergence values and their gradients) carry 1 channel.
//!
//! ## Design Highlights
//! - Tensors are strongly typed: `Tensor<T>` for any element type (usually `f64`)
//! - Shape is stored as a `Vec<usize>` and enforced at runtime
//! - `WithGrad<T>` pairs any value with its gradient for autograd
//! - Rank checks on fields return [`DivError::ShapeMismatch`] instead of panicking
//!
//! ## Example
//!
//! ```rust
//! use volume_div::tensors::Tensor;
//! let t = Tensor::new(vec![1, 3, 2, 2, 2], vec![0.0; 24]);
//! assert_eq!(t.dims5("example").unwrap(), [1, 3, 2, 2, 2]);
//! ```

use core::fmt;

use crate::error::{DivError, Result};

/// Represents an N-dimensional tensor with a shape and flat row-major data.
///
/// - All elements must be the same type (`T`).
/// - `shape` defines the structure, e.g., `[1, 3, 4, 4, 4]` for one 3-channel 4×4×4 field.
/// - `data` holds the flattened content in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    pub shape: Vec<usize>,
    pub data: Vec<T>,
}

/// Double precision tensor, the element type every operator in this crate works on.
pub type Ten64 = Tensor<f64>;

impl<T> Tensor<T> {
    /// Creates a new tensor with the given shape and flat data.
    ///
    /// # Panics
    /// Panics if the number of elements in `data` does not match the shape product.
    pub fn new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Self {
        let shape = shape.into();
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "shape {:?} is incompatible with {} data elements",
            shape,
            data.len()
        );
        Self { shape, data }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the tensor holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the shape as `[batch, channel, depth, height, width]`.
    ///
    /// # Errors
    /// [`DivError::ShapeMismatch`] if the tensor is not rank 5. `op` names the
    /// caller in the error message.
    pub fn dims5(&self, op: &'static str) -> Result<[usize; 5]> {
        <[usize; 5]>::try_from(self.shape.as_slice()).map_err(|_| DivError::ShapeMismatch {
            op,
            expected: "rank 5 (batch, channel, depth, height, width)".into(),
            actual: self.shape.clone(),
        })
    }
}

impl<T: Clone> Tensor<T> {
    /// Creates a tensor of the given shape with every element set to `value`.
    pub fn full(shape: impl Into<Vec<usize>>, value: T) -> Self {
        let shape = shape.into();
        let len = shape.iter().product();
        Self { data: vec![value; len], shape }
    }
}

impl Ten64 {
    /// Creates a zero-filled tensor.
    pub fn zeros(shape: impl Into<Vec<usize>>) -> Self {
        Self::full(shape, 0.0)
    }

    /// Creates a zero-filled tensor shaped like `other`.
    pub fn zeros_like(other: &Self) -> Self {
        Self::zeros(other.shape.clone())
    }

    /// Creates a one-filled tensor shaped like `other`.
    pub fn ones_like(other: &Self) -> Self {
        Self::full(other.shape.clone(), 1.0)
    }

    /// Builds a rank-5 field by evaluating `f(b, c, d, h, w)` at every index.
    pub fn from_fn5(dims: [usize; 5], mut f: impl FnMut(usize, usize, usize, usize, usize) -> f64) -> Self {
        let [nb, nc, nd, nh, nw] = dims;
        let mut data = Vec::with_capacity(dims.iter().product());
        for b in 0..nb {
            for c in 0..nc {
                for d in 0..nd {
                    for h in 0..nh {
                        for w in 0..nw {
                            data.push(f(b, c, d, h, w));
                        }
                    }
                }
            }
        }
        Self::new(dims.to_vec(), data)
    }

    /// Reads the element at `(b, c, d, h, w)` of a rank-5 tensor.
    ///
    /// # Panics
    /// Panics if the tensor is not rank 5 or the index is out of bounds.
    pub fn at5(&self, b: usize, c: usize, d: usize, h: usize, w: usize) -> f64 {
        let [_, nc, nd, nh, nw] = <[usize; 5]>::try_from(self.shape.as_slice())
            .unwrap_or_else(|_| panic!("at5 on tensor of shape {:?}", self.shape));
        self.data[(((b * nc + c) * nd + d) * nh + h) * nw + w]
    }

    /// Sum of all elements.
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }
}

/// A container for tracking gradients of values (used in autograd).
///
/// Typically used as `WithGrad<Ten64>`.
#[derive(Debug, Clone)]
pub struct WithGrad<T> {
    pub value: T,
    pub grad: T,
}

impl WithGrad<Ten64> {
    /// Wraps a tensor with a zeroed gradient of the same shape.
    pub fn new(value: Ten64) -> Self {
        let grad = Ten64::zeros_like(&value);
        Self { value, grad }
    }

    /// Adds `grad` into the tracked gradient.
    ///
    /// # Errors
    /// [`DivError::ShapeMismatch`] if `grad` is shaped differently from the value.
    pub fn accumulate(&mut self, grad: &Ten64) -> Result<()> {
        if grad.shape != self.grad.shape {
            return Err(DivError::ShapeMismatch {
                op: "accumulate",
                expected: format!("{:?}", self.grad.shape),
                actual: grad.shape.clone(),
            });
        }
        for (g, &dg) in self.grad.data.iter_mut().zip(&grad.data) {
            *g += dg;
        }
        Ok(())
    }
}

/// A spatial axis of a volumetric field.
///
/// Each axis owns one channel of a vector field and one spatial dimension:
///
/// | axis | channel | dimension |
/// |------|---------|-----------|
/// | `X`  | 0       | width (4) |
/// | `Y`  | 1       | height (3)|
/// | `Z`  | 2       | depth (2) |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Horizontal axis, along width.
    X,
    /// Vertical axis, along height.
    Y,
    /// Depth axis.
    Z,
}

impl Axis {
    /// All axes in channel order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// The vector-field channel this axis reads.
    pub const fn channel(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Index of this axis in a `(batch, channel, depth, height, width)` shape.
    pub const fn dim(self) -> usize {
        match self {
            Axis::X => 4,
            Axis::Y => 3,
            Axis::Z => 2,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        })
    }
}
