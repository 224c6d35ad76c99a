//! Differentiable operations in closure style.
//!
//! # Autograd Pattern
//!
//! Each operation follows the same pattern as the rest of the host framework:
//! 1. **Inputs** are references to `WithGrad<Ten64>`.
//! 2. **Forward Pass** computes an output `Ten64`.
//! 3. **Backward Pass** returns a closure capturing the input by reference
//!    that maps `dL/d(out)` to `dL/d(input)`.
//! 4. **Gradient Application** adds the result into the input's `grad` with
//!    [`WithGrad::accumulate`].
//!
//! Unlike [`layer::Divergence`](crate::layer::Divergence), these functions keep
//! no scratch between calls; each pass allocates what it needs.
//!
//! ## Usage Guidelines
//!
//! - Shape problems are returned as [`DivError::ShapeMismatch`](crate::error::DivError),
//!   from the forward call and from the backward closure alike.
//! - The backward closures implement `Fn`, allowing multiple invocations if needed.

use crate::error::Result;
use crate::kernel::StepSize;
use crate::layer::{backward_dims, vector_field_dims, Directional, Operator};
use crate::ops::dispatch;
use crate::tensors::{Axis, Ten64, WithGrad};

/// Backward closure: `dL/d(out)` to `dL/d(input)`.
pub type Backward<'a> = dyn Fn(&Ten64) -> Result<Ten64> + 'a;

/// Computes the volumetric divergence of a `(batch, 3, depth, height, width)` field.
///
/// # Returns
/// - `out`: `(batch, 1, depth, height, width)` divergence, borders corrected to
///   the one-sided difference along each axis.
/// - `back`: Closure mapping `dL/d(out)` to `dL/d(input)`.
///
/// # Errors
/// - [`DivError::Configuration`](crate::error::DivError) for an invalid step.
/// - [`DivError::ShapeMismatch`](crate::error::DivError) if `input` is not a
///   rank-5, 3-channel field, or (from `back`) if the gradient does not match it.
///
/// # Example
/// ```rust
/// use volume_div::backprop::divergence;
/// use volume_div::kernel::StepSize;
/// use volume_div::tensors::{Ten64, WithGrad};
///
/// let mut field = WithGrad::new(Ten64::full(vec![1, 3, 3, 3, 3], 5.0));
/// let (out, back) = divergence(&field, StepSize::default()).unwrap();
/// assert!(out.data.iter().all(|&v| v == 0.0));
///
/// let grad = back(&Ten64::ones_like(&out)).unwrap();
/// drop(back);
/// field.accumulate(&grad).unwrap();
/// ```
pub fn divergence(input: &WithGrad<Ten64>, steps: StepSize) -> Result<(Ten64, Box<Backward<'_>>)> {
    let kernels = steps.kernels()?;
    let dims = vector_field_dims(&input.value, "forward")?;
    let out = dispatch::divergence_forward(&input.value, dims, &kernels, &mut Default::default());

    let value = &input.value;
    let back = move |grad_output: &Ten64| {
        let dims = backward_dims(value, grad_output)?;
        Ok(dispatch::divergence_backward(grad_output, dims, &kernels, &mut Default::default()))
    };

    Ok((out, Box::new(back)))
}

/// Central-difference derivative of channel `axis.channel()` along `axis`.
///
/// Borders are left uncorrected (half the one-sided difference), exactly as
/// each term of [`divergence`] before its border doubling.
///
/// # Errors
/// - [`DivError::Configuration`](crate::error::DivError) for an invalid step.
/// - [`DivError::ShapeMismatch`](crate::error::DivError) if `input` is not rank 5
///   or lacks the axis' channel.
pub fn directional(input: &WithGrad<Ten64>, axis: Axis, step: f64) -> Result<(Ten64, Box<Backward<'_>>)> {
    let mut op = Directional::new(axis, step)?;
    let out = op.forward(&input.value)?;

    let value = &input.value;
    let back = move |grad_output: &Ten64| {
        let mut op = op;
        op.backward(value, grad_output)
    };

    Ok((out, Box::new(back)))
}
