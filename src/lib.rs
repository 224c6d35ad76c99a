//! volume_div: a differentiable volumetric divergence operator.
//!
//! Computes `∂u/∂x + ∂v/∂y + ∂w/∂z` of a 3-channel vector field stored as a
//! `(batch, 3, depth, height, width)` tensor, together with the exact adjoint
//! for use in gradient-based training loops.
//!
//! # Method
//!
//! Each partial derivative is a fixed 3-tap central difference
//! `(f[i+1] - f[i-1]) / (2·step)` over a replication-padded field. At the two
//! borders of each axis that leaves half the one-sided difference, so those
//! positions are doubled before the three terms are summed. The backward pass
//! applies the same doubling to the incoming gradient and then runs the
//! transposed stencil, channel by channel.
//!
//! # Modules
//!
//! - [`tensors`] — Field storage, the `WithGrad` pair and spatial [`Axis`](tensors::Axis).
//! - [`kernel`] — Grid spacing and the fixed difference kernels.
//! - [`layer`] — Stateful [`Divergence`](layer::Divergence) and
//!   [`Directional`](layer::Directional) operators with reusable scratch.
//! - [`backprop`] — Closure-style forward/backward functions.
//! - [`backend`] — Serial or `rayon`-forked execution of the three axes.
//! - [`ops`] — Numeric kernels.
//! - [`approx`] — Tolerance-based comparison of fields.
//! - [`error`] — Error type.
//!
//! # Example
//!
//! ```rust
//! use volume_div::backprop::divergence;
//! use volume_div::kernel::StepSize;
//! use volume_div::tensors::{Ten64, WithGrad};
//!
//! // u = x, v = y, w = z has divergence 3 everywhere
//! let field = Ten64::from_fn5([1, 3, 3, 3, 3], |_, c, d, h, w| [w, h, d][c] as f64);
//! let input = WithGrad::new(field);
//! let (out, _back) = divergence(&input, StepSize::default()).unwrap();
//! assert!(out.data.iter().all(|&v| (v - 3.0).abs() < 1e-12));
//! ```

pub mod approx;
pub mod backend;
pub mod backprop;
pub mod error;
pub mod kernel;
pub mod layer;
pub mod ops;
pub mod tensors;

pub use error::{DivError, Result};
