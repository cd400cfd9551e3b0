//! Scalar operator implementations: `extern "C"` pure scalar functions.
//!
//! These are the golden reference for correctness testing of the device
//! kernels. Every function is a plain loop with no vectorization hints so
//! the result is easy to audit.
//!
//! Reduced-precision formats are computed in f32 and narrowed
//! round-to-nearest-even, matching the device cast-through-f32 path.

pub mod blas;
