//! # Numeric Kernels
//!
//! ## Submodules
//!
//! - [`cpu`] — Slab-parallel finite-difference kernels and their adjoints
//! - [`dispatch`] — Composes the kernels into full passes, serial or forked per [`Backend`](crate::backend::Backend)
//!
//! Shape checks live one level up, in [`layer`](crate::layer) and
//! [`backprop`](crate::backprop); everything here assumes consistent shapes.

pub mod cpu;
pub mod dispatch;
