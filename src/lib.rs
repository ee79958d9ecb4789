//! SIMD-accelerated search for the bottom of a batch of `f32` samples.
//!
//! The bottom is the smallest sample and the first index holding it. Batches
//! have a fixed capacity (1024 by default); shorter batches are padded with
//! +infinity inside an aligned working buffer so the vector kernels always
//! see whole registers.
//!
//! # Components
//!
//! - **Working buffer** ([`WorkingBuffer`]): aligned staging with neutral padding
//! - **Kernels** ([`bottom_vectorized`], [`bottom_scalar`]): lane-parallel value/index tracking and its sequential twin
//! - **Strategy** ([`Strategy`]): one-time CPU capability detection
//! - **Entry point** ([`find_bottom`], [`BottomSearch`]): validation and dispatch
//!
//! # Semantics
//!
//! Comparisons are strict, so ties go to the first occurrence. NaN never wins;
//! a batch with no comparable sample reports [`BottomError::NotFound`].
//!
//! ```
//! use simd_bottom::{BottomError, find_bottom};
//!
//! let bottom = find_bottom(&[f32::NAN, 5.0, 3.0]).unwrap();
//! assert_eq!((bottom.value, bottom.index), (3.0, 2));
//! assert_eq!(find_bottom(&[]), Err(BottomError::NotFound));
//! ```

mod buffer;
mod error;
mod kernel;
mod search;
mod strategy;

pub use buffer::*;
pub use error::*;
pub use kernel::*;
pub use search::*;
pub use strategy::*;
