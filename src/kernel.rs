//! Grid spacing and the fixed finite-difference kernels derived from it.
//!
//! A [`DirectionalKernel`] is the 3-tap central difference
//! `{-1/(2s), 0, +1/(2s)}` laid along one [`Axis`]. Its weights are computed
//! once from the step size and never change afterwards; there is nothing to
//! learn or update.

use briny::prelude::*;

use crate::error::{DivError, Result};
use crate::tensors::Axis;

/// Grid spacing along each spatial axis.
///
/// Every step must be finite, strictly positive, and large enough that
/// `1 / (2·step)` stays finite. This is checked when a
/// kernel or operator is built from it, not when the struct is created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepSize {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for StepSize {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

impl StepSize {
    /// Creates a step size with independent spacing per axis.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Same spacing on all three axes.
    pub const fn uniform(step: f64) -> Self {
        Self::new(step, step, step)
    }

    /// Spacing along `axis`.
    pub const fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Builds the `x`, `y` and `z` kernels, in channel order.
    ///
    /// # Errors
    /// [`DivError::Configuration`] naming the first axis whose step is not
    /// finite and strictly positive.
    pub fn kernels(&self) -> Result<[DirectionalKernel; 3]> {
        Ok([
            DirectionalKernel::new(Axis::X, self.x)?,
            DirectionalKernel::new(Axis::Y, self.y)?,
            DirectionalKernel::new(Axis::Z, self.z)?,
        ])
    }
}

/// A single grid step, validated before it is turned into kernel weights.
struct Step(f64);

impl Validate for Step {
    fn validate(&self) -> core::result::Result<(), ValidationError> {
        if !self.0.is_finite() || self.0 <= 0.0 {
            return Err(ValidationError);
        }
        // subnormal steps overflow the tap weight
        if !(1.0 / (2.0 * self.0)).is_finite() {
            return Err(ValidationError);
        }
        Ok(())
    }
}

fn check_step(axis: Axis, step: f64) -> Result<()> {
    Step(step)
        .validate()
        .map_err(|_| DivError::Configuration { axis, value: step })
}

/// Immutable central-difference kernel along one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalKernel {
    axis: Axis,
    step: f64,
    weights: [f64; 3],
}

impl DirectionalKernel {
    /// Builds the kernel `{-1/(2·step), 0, 1/(2·step)}` for `axis`.
    ///
    /// # Errors
    /// [`DivError::Configuration`] if `step` is not finite and strictly positive,
    /// or so small that `1 / (2·step)` overflows.
    pub fn new(axis: Axis, step: f64) -> Result<Self> {
        check_step(axis, step)?;
        let half = 1.0 / (2.0 * step);
        Ok(Self {
            axis,
            step,
            weights: [-half, 0.0, half],
        })
    }

    /// The kernel for unit grid spacing, `{-0.5, 0, 0.5}`.
    pub const fn unit(axis: Axis) -> Self {
        Self {
            axis,
            step: 1.0,
            weights: [-0.5, 0.0, 0.5],
        }
    }

    /// The axis this kernel differentiates along.
    pub const fn axis(&self) -> Axis {
        self.axis
    }

    /// The grid step the weights were derived from.
    pub const fn step(&self) -> f64 {
        self.step
    }

    /// Taps applied to the previous, current and next sample.
    pub const fn weights(&self) -> [f64; 3] {
        self.weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_weights() {
        let k = DirectionalKernel::new(Axis::Y, 0.5).unwrap();
        assert_eq!(k.weights(), [-1.0, 0.0, 1.0]);
        assert_eq!(k.axis(), Axis::Y);
        assert_eq!(k.step(), 0.5);
    }

    #[test]
    fn test_rejects_bad_steps() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e-310, f64::MIN_POSITIVE / 16.0] {
            let err = DirectionalKernel::new(Axis::Z, bad).unwrap_err();
            assert!(matches!(err, DivError::Configuration { axis: Axis::Z, .. }));
        }
    }

    #[test]
    fn test_smallest_normal_step_is_accepted() {
        let k = DirectionalKernel::new(Axis::X, f64::MIN_POSITIVE).unwrap();
        assert!(k.weights().iter().all(|w| w.is_finite()));
    }

    #[test]
    fn test_kernels_report_first_bad_axis() {
        let [kx, _, kz] = StepSize::new(2.0, 1.0, 0.25).kernels().unwrap();
        assert_eq!(kx.weights(), [-0.25, 0.0, 0.25]);
        assert_eq!(kz.axis(), Axis::Z);
        let err = StepSize::new(1.0, -2.0, 0.0).kernels().unwrap_err();
        assert_eq!(err, DivError::Configuration { axis: Axis::Y, value: -2.0 });
    }
}
