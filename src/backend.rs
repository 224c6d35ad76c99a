//! Execution backend selection.
//!
//! The divergence operator is the sum of three directional passes with no
//! data dependency between them. This module decides whether those passes
//! run one after another or concurrently. Within a pass the batch slabs are
//! always spread over the `rayon` pool, whichever backend is active.
//!
//! # Supported Backends
//!
//! - `Serial` — The three axis passes run in order (default).
//! - `Parallel` — The three axis passes are forked with `rayon::join` and
//!   joined before the final sum.
//!
//! Both backends produce bit-identical results; each pass writes its own
//! buffer and the sum is always taken in `x + y + z` order.
//!
//! The backend is stored globally using an `AtomicU8`, enabling fast
//! switching at runtime.

use core::convert::TryFrom;
use core::sync::atomic::{AtomicU8, Ordering};

/// Enumeration of supported execution backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Backend {
    /// Axis passes one after another (default).
    #[default]
    Serial = 0,
    /// Directional passes run concurrently on the `rayon` thread pool.
    Parallel,
}

impl TryFrom<u8> for Backend {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Serial),
            1 => Ok(Self::Parallel),
            _ => Err(()),
        }
    }
}

/// Internal global state for the active backend.
///
/// Relaxed switching is fine: the backend only changes between training
/// steps, never while an operator is running.
static GLOBAL_DEFAULT_BACKEND: AtomicU8 = AtomicU8::new(Backend::Serial as u8);

/// Sets the active backend.
///
/// # Example
///
/// ```
/// use volume_div::backend::{set_backend, get_backend, Backend};
/// set_backend(Backend::Parallel);
/// assert_eq!(get_backend(), Backend::Parallel);
/// set_backend(Backend::Serial);
/// ```
pub fn set_backend(b: Backend) {
    log::debug!("switching divergence backend to {b:?}");
    GLOBAL_DEFAULT_BACKEND.store(b as u8, Ordering::Release);
}

/// Returns the currently active backend.
///
/// If the stored value is invalid, defaults to [`Backend::Serial`].
pub fn get_backend() -> Backend {
    Backend::try_from(GLOBAL_DEFAULT_BACKEND.load(Ordering::Acquire)).unwrap_or_default()
}
