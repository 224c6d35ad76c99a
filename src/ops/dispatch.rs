//! Operation Dispatch Layer
//!
//! Composes the CPU kernels into the full divergence forward and backward
//! passes, running the three directional passes either in order or forked on
//! the `rayon` pool depending on the global [`Backend`].
//!
//! # Design Highlights
//! - **Disjoint scratch**: each axis owns one [`AxisScratch`], so the passes
//!   share nothing mutable and can run concurrently
//! - **Deterministic**: the final sum is always taken in `x + y + z` order,
//!   so both backends agree bit for bit

use crate::backend::{get_backend, Backend};
use crate::kernel::DirectionalKernel;
use crate::tensors::{Axis, Ten64};

use super::cpu;

/// Reusable per-axis buffers.
///
/// Resized on every call to match the field being processed.
#[derive(Debug, Default, Clone)]
pub struct AxisScratch {
    /// Directional output (forward) or border-scaled output gradient (backward).
    pub scaled: Vec<f64>,
    /// Gradient of the full input field along this axis' path (backward only).
    pub adjoint: Vec<f64>,
}

impl AxisScratch {
    /// Bytes currently held by both buffers.
    pub fn capacity_bytes(&self) -> usize {
        (self.scaled.capacity() + self.adjoint.capacity()) * size_of::<f64>()
    }
}

/// Runs `f` once per axis, serially or concurrently according to the backend.
fn for_each_axis<F>(kernels: &[DirectionalKernel; 3], slots: &mut [AxisScratch; 3], f: F)
where
    F: Fn(&DirectionalKernel, &mut AxisScratch) + Sync,
{
    let [kx, ky, kz] = kernels;
    let [sx, sy, sz] = slots;
    match get_backend() {
        Backend::Parallel => {
            rayon::join(|| f(kx, sx), || rayon::join(|| f(ky, sy), || f(kz, sz)));
        }
        Backend::Serial => {
            f(kx, sx);
            f(ky, sy);
            f(kz, sz);
        }
    }
}

/// Resizes `buf` to `len` elements, logging when it has to grow.
fn fit(buf: &mut Vec<f64>, len: usize, axis: Axis) {
    if len > buf.capacity() {
        log::debug!("growing {axis} scratch buffer to {len} elements");
    }
    buf.clear();
    buf.resize(len, 0.0);
}

/// Full divergence forward pass.
///
/// `input` must be a 3-channel rank-5 field with shape `dims`; the caller
/// checks this. Returns a `(batch, 1, depth, height, width)` field.
pub fn divergence_forward(
    input: &Ten64,
    dims: [usize; 5],
    kernels: &[DirectionalKernel; 3],
    scratch: &mut [AxisScratch; 3],
) -> Ten64 {
    let out_len = dims[0] * cpu::slab_len(dims);

    for_each_axis(kernels, scratch, |k, s| {
        fit(&mut s.scaled, out_len, k.axis());
        cpu::directional_forward(&input.data, dims, k, &mut s.scaled);
        cpu::scale_borders(&mut s.scaled, dims, k.axis());
    });

    let [sx, sy, sz] = &*scratch;
    let mut out = sx.scaled.clone();
    cpu::sum_into(&mut out, &sy.scaled);
    cpu::sum_into(&mut out, &sz.scaled);

    Ten64::new(vec![dims[0], 1, dims[2], dims[3], dims[4]], out)
}

/// Full divergence backward pass.
///
/// `grad_output` must be shaped `(batch, 1, depth, height, width)` for the
/// input shape `dims`; the caller checks this. Returns the gradient with
/// respect to the 3-channel input.
pub fn divergence_backward(
    grad_output: &Ten64,
    dims: [usize; 5],
    kernels: &[DirectionalKernel; 3],
    scratch: &mut [AxisScratch; 3],
) -> Ten64 {
    let in_len: usize = dims.iter().product();

    for_each_axis(kernels, scratch, |k, s| {
        s.scaled.clear();
        s.scaled.extend_from_slice(&grad_output.data);
        cpu::scale_borders(&mut s.scaled, dims, k.axis());
        fit(&mut s.adjoint, in_len, k.axis());
        cpu::directional_adjoint(&s.scaled, dims, k, &mut s.adjoint);
    });

    let [sx, sy, sz] = &*scratch;
    let mut grad = sx.adjoint.clone();
    cpu::sum_into(&mut grad, &sy.adjoint);
    cpu::sum_into(&mut grad, &sz.adjoint);

    Ten64::new(dims.to_vec(), grad)
}

/// Forward pass of a single directional sub-operator, without border scaling.
pub fn directional_forward(input: &Ten64, dims: [usize; 5], kernel: &DirectionalKernel) -> Ten64 {
    let mut out = vec![0.0; dims[0] * cpu::slab_len(dims)];
    cpu::directional_forward(&input.data, dims, kernel, &mut out);
    Ten64::new(vec![dims[0], 1, dims[2], dims[3], dims[4]], out)
}

/// Backward pass of a single directional sub-operator.
///
/// The result has the input's full channel count and is zero outside the
/// kernel's channel.
pub fn directional_backward(grad_output: &Ten64, dims: [usize; 5], kernel: &DirectionalKernel) -> Ten64 {
    let mut grad = vec![0.0; dims.iter().product()];
    cpu::directional_adjoint(&grad_output.data, dims, kernel, &mut grad);
    Ten64::new(dims.to_vec(), grad)
}
