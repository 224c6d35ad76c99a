//! Parallel CPU kernels for the directional derivative and its adjoint.
//!
//! # Layout
//!
//! Fields are `(batch, channel, depth, height, width)` row-major. A *slab* is
//! the `depth × height × width` block of one `(batch, channel)` pair. Every
//! kernel here walks slabs, so batches are split across the `rayon` pool with
//! `par_chunks_mut` regardless of the active [`Backend`](crate::backend::Backend);
//! the backend only orders the three axis passes.
//!
//! # Boundary Handling
//!
//! Samples outside the slab are replaced by the nearest border sample
//! (replication padding), so the tap at index `-1` reads index `0` and the tap
//! at `n` reads `n - 1`. With the central-difference kernel this leaves half the
//! one-sided difference at both borders, which [`scale_borders`] undoes.
//!
//! ## Implemented Ops
//!
//! - [`directional_forward`]: pad + 3-tap correlation along one axis
//! - [`directional_adjoint`]: transpose of the above, scattered back into one channel
//! - [`scale_borders`]: doubles the first and last sample along an axis
//! - [`sum_into`]: elementwise accumulate

use rayon::prelude::*;

use crate::kernel::DirectionalKernel;
use crate::tensors::Axis;

/// Spatial geometry of one slab along a given axis.
#[derive(Debug, Clone, Copy)]
struct Line {
    /// Extent along the axis.
    n: usize,
    /// Flat distance between neighbours along the axis.
    stride: usize,
}

impl Line {
    fn new(dims: [usize; 5], axis: Axis) -> Self {
        let [_, _, nd, nh, nw] = dims;
        let (n, stride) = match axis {
            Axis::X => (nw, 1),
            Axis::Y => (nh, nw),
            Axis::Z => (nd, nh * nw),
        };
        Self { n, stride }
    }

    /// Position along the axis of flat slab index `i`.
    #[inline]
    fn pos(self, i: usize) -> usize {
        (i / self.stride) % self.n
    }

    /// Flat indices of the previous and next samples, clamped to the slab.
    #[inline]
    fn neighbours(self, i: usize) -> (usize, usize) {
        let pos = self.pos(i);
        let prev = if pos == 0 { i } else { i - self.stride };
        let next = if pos + 1 == self.n { i } else { i + self.stride };
        (prev, next)
    }
}

/// Number of elements in one slab.
#[inline]
pub fn slab_len(dims: [usize; 5]) -> usize {
    dims[2] * dims[3] * dims[4]
}

/// Differentiates channel `kernel.axis().channel()` of `input` along the kernel's axis.
///
/// `input` is a field with shape `dims` (any channel count covering the
/// kernel's channel). `out` receives a single-channel field of `dims[0]` slabs.
pub fn directional_forward(input: &[f64], dims: [usize; 5], kernel: &DirectionalKernel, out: &mut [f64]) {
    let slab = slab_len(dims);
    let channels = dims[1];
    let channel = kernel.axis().channel();
    debug_assert_eq!(out.len(), dims[0] * slab);
    if slab == 0 {
        return;
    }

    let line = Line::new(dims, kernel.axis());
    let [w0, w1, w2] = kernel.weights();

    out.par_chunks_mut(slab)
        .enumerate()
        .for_each(|(b, dst)| {
            let start = (b * channels + channel) * slab;
            let src = &input[start..start + slab];
            for (i, y) in dst.iter_mut().enumerate() {
                let (prev, next) = line.neighbours(i);
                *y = w0 * src[prev] + w1 * src[i] + w2 * src[next];
            }
        });
}

/// Transpose of [`directional_forward`].
///
/// `grad_output` is single-channel. The result is written into the kernel's
/// channel of `grad_input` (shape `dims`); the other channels are left as they are.
pub fn directional_adjoint(grad_output: &[f64], dims: [usize; 5], kernel: &DirectionalKernel, grad_input: &mut [f64]) {
    let slab = slab_len(dims);
    let channels = dims[1];
    let channel = kernel.axis().channel();
    debug_assert_eq!(grad_output.len(), dims[0] * slab);
    if slab == 0 {
        return;
    }

    let line = Line::new(dims, kernel.axis());
    let [w0, w1, w2] = kernel.weights();

    grad_input
        .par_chunks_mut(channels * slab)
        .zip(grad_output.par_chunks(slab))
        .for_each(|(batch, g)| {
            let dst = &mut batch[channel * slab..(channel + 1) * slab];
            dst.fill(0.0);
            for (i, &dy) in g.iter().enumerate() {
                let (prev, next) = line.neighbours(i);
                dst[prev] += w0 * dy;
                dst[i] += w1 * dy;
                dst[next] += w2 * dy;
            }
        });
}

/// Doubles every sample sitting on the first or last position along `axis`.
///
/// `buf` is a single-channel field with spatial extents taken from `dims`.
/// A sample that is both first and last (extent 1) is doubled once.
pub fn scale_borders(buf: &mut [f64], dims: [usize; 5], axis: Axis) {
    let slab = slab_len(dims);
    if slab == 0 {
        return;
    }
    let line = Line::new(dims, axis);
    buf.par_chunks_mut(slab).for_each(|s| {
        for (i, v) in s.iter_mut().enumerate() {
            let pos = line.pos(i);
            if pos == 0 || pos + 1 == line.n {
                *v *= 2.0;
            }
        }
    });
}

/// `acc += other`, elementwise.
pub fn sum_into(acc: &mut [f64], other: &[f64]) {
    debug_assert_eq!(acc.len(), other.len());
    acc.par_iter_mut().zip(other.par_iter()).for_each(|(a, &b)| *a += b);
}
