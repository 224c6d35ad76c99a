//! Stateful operators for use inside a training loop.
//!
//! [`Divergence`] owns its three directional kernels and the scratch buffers
//! its passes reuse between calls. [`Directional`] exposes a single
//! directional derivative on its own.
//!
//! Neither has trainable parameters, which [`Operator::TRAINABLE`] states
//! explicitly; there is no gradient-accumulation step to call.
//!
//! # Example
//!
//! ```rust
//! use volume_div::layer::{Divergence, Operator};
//! use volume_div::kernel::StepSize;
//! use volume_div::tensors::Ten64;
//!
//! let mut div = Divergence::new(StepSize::default()).unwrap();
//! let field = Ten64::from_fn5([1, 3, 4, 4, 4], |_, c, d, h, w| [w, h, d][c] as f64);
//! let out = div.forward(&field).unwrap();
//! assert_eq!(out.shape, vec![1, 1, 4, 4, 4]);
//! assert!(out.data.iter().all(|&v| (v - 3.0).abs() < 1e-12));
//!
//! let grad = div.backward(&field, &Ten64::ones_like(&out)).unwrap();
//! assert_eq!(grad.shape, field.shape);
//! ```

use crate::error::{DivError, Result};
use crate::kernel::{DirectionalKernel, StepSize};
use crate::ops::dispatch::{self, AxisScratch};
use crate::tensors::{Axis, Ten64};

/// A differentiable operator with an explicit forward and backward pass.
pub trait Operator {
    /// Whether the operator holds parameters that receive gradients.
    const TRAINABLE: bool;

    /// Computes the output for `input`.
    ///
    /// # Errors
    /// [`DivError::ShapeMismatch`] if `input` is not a field this operator accepts.
    fn forward(&mut self, input: &Ten64) -> Result<Ten64>;

    /// Maps `dL/d(output)` to `dL/d(input)` for the forward call made with `input`.
    ///
    /// # Errors
    /// [`DivError::ShapeMismatch`] if either tensor is shaped wrongly or they disagree.
    fn backward(&mut self, input: &Ten64, grad_output: &Ten64) -> Result<Ten64>;

    /// Number of trainable scalars.
    fn parameter_count(&self) -> usize {
        0
    }
}

/// Checks that `grad_output` is the single-channel companion of an input shaped `dims`.
fn check_grad_output(grad_output: &Ten64, dims: [usize; 5]) -> Result<()> {
    let expected = [dims[0], 1, dims[2], dims[3], dims[4]];
    if grad_output.shape != expected {
        return Err(DivError::ShapeMismatch {
            op: "backward",
            expected: format!("{expected:?}"),
            actual: grad_output.shape.clone(),
        });
    }
    Ok(())
}

/// Validates a 3-channel vector field and returns its dimensions.
pub(crate) fn vector_field_dims(input: &Ten64, op: &'static str) -> Result<[usize; 5]> {
    let dims = input.dims5(op)?;
    if dims[1] != 3 {
        return Err(DivError::ShapeMismatch {
            op,
            expected: "3 channels (x, y, z)".into(),
            actual: input.shape.clone(),
        });
    }
    Ok(dims)
}

/// Validates the output gradient against the input of the forward call.
pub(crate) fn backward_dims(input: &Ten64, grad_output: &Ten64) -> Result<[usize; 5]> {
    let dims = vector_field_dims(input, "backward")?;
    check_grad_output(grad_output, dims)?;
    Ok(dims)
}

/// Central-difference derivative of one channel along one axis.
///
/// Borders use replicated samples and are **not** corrected: the first and
/// last positions along the axis hold half the one-sided difference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Directional {
    kernel: DirectionalKernel,
}

impl Directional {
    /// Builds the sub-operator for `axis` with grid spacing `step`.
    ///
    /// # Errors
    /// [`DivError::Configuration`] if `step` is not finite and strictly positive.
    pub fn new(axis: Axis, step: f64) -> Result<Self> {
        Ok(Self {
            kernel: DirectionalKernel::new(axis, step)?,
        })
    }

    fn input_dims(&self, input: &Ten64, op: &'static str) -> Result<[usize; 5]> {
        let dims = input.dims5(op)?;
        let channel = self.kernel.axis().channel();
        if dims[1] <= channel {
            return Err(DivError::ShapeMismatch {
                op,
                expected: format!("at least {} channels", channel + 1),
                actual: input.shape.clone(),
            });
        }
        Ok(dims)
    }
}

impl Operator for Directional {
    const TRAINABLE: bool = false;

    fn forward(&mut self, input: &Ten64) -> Result<Ten64> {
        let dims = self.input_dims(input, "forward")?;
        log::trace!("{} directional forward on {dims:?}", self.kernel.axis());
        Ok(dispatch::directional_forward(input, dims, &self.kernel))
    }

    fn backward(&mut self, input: &Ten64, grad_output: &Ten64) -> Result<Ten64> {
        let dims = self.input_dims(input, "backward")?;
        check_grad_output(grad_output, dims)?;
        log::trace!("{} directional backward on {dims:?}", self.kernel.axis());
        Ok(dispatch::directional_backward(grad_output, dims, &self.kernel))
    }
}

/// Volumetric divergence of a 3-channel vector field.
///
/// Sums the `x`, `y` and `z` directional derivatives of channels 0, 1 and 2,
/// doubling each one at its own axis' borders so that the replicated padding
/// yields the full one-sided difference there.
///
/// The scratch buffers make an instance unsuitable for concurrent use; give
/// each thread its own operator.
#[derive(Debug, Clone)]
pub struct Divergence {
    steps: StepSize,
    kernels: [DirectionalKernel; 3],
    scratch: [AxisScratch; 3],
}

impl Divergence {
    /// Builds the operator for the given grid spacing.
    ///
    /// # Errors
    /// [`DivError::Configuration`] naming the first axis whose step is not
    /// finite and strictly positive.
    pub fn new(steps: StepSize) -> Result<Self> {
        let kernels = steps.kernels()?;
        log::debug!("divergence operator with steps x={} y={} z={}", steps.x, steps.y, steps.z);
        Ok(Self {
            steps,
            kernels,
            scratch: Default::default(),
        })
    }

    /// Grid spacing this operator was built with.
    pub const fn steps(&self) -> StepSize {
        self.steps
    }

    /// The directional sub-operator for `axis`.
    pub fn component(&self, axis: Axis) -> Directional {
        Directional {
            kernel: self.kernels[axis.channel()],
        }
    }

    /// Releases the scratch buffers. They are reallocated on the next call.
    pub fn clear_state(&mut self) {
        log::debug!("clearing divergence scratch ({} bytes)", self.scratch_bytes());
        self.scratch = Default::default();
    }

    /// Bytes currently held by the scratch buffers.
    pub fn scratch_bytes(&self) -> usize {
        self.scratch.iter().map(AxisScratch::capacity_bytes).sum()
    }
}

impl Default for Divergence {
    fn default() -> Self {
        Self {
            steps: StepSize::default(),
            kernels: Axis::ALL.map(DirectionalKernel::unit),
            scratch: Default::default(),
        }
    }
}

impl Operator for Divergence {
    const TRAINABLE: bool = false;

    fn forward(&mut self, input: &Ten64) -> Result<Ten64> {
        let dims = vector_field_dims(input, "forward")?;
        log::trace!("divergence forward on {dims:?}");
        Ok(dispatch::divergence_forward(input, dims, &self.kernels, &mut self.scratch))
    }

    fn backward(&mut self, input: &Ten64, grad_output: &Ten64) -> Result<Ten64> {
        let dims = backward_dims(input, grad_output)?;
        log::trace!("divergence backward on {dims:?}");
        Ok(dispatch::divergence_backward(grad_output, dims, &self.kernels, &mut self.scratch))
    }
}
