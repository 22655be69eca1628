//! Discretized state-action grids for viability analysis.
//!
//! This crate provides the grid layer shared by the viability solver and
//! the measure learner:
//!
//! - [`Axis`] - a validated, strictly increasing 1-D coordinate axis
//! - [`Grid`] - ordered state axes plus ordered action axes, with
//!   digitization and neighborhood queries
//! - [`DenseGrid`] - dense row-major N-D arrays indexed by bin tuples
//!
//! Digitization maps a continuous value to the **nearest** grid point,
//! ties resolved toward the lower index, clamped to the axis range. A
//! strict variant errors on out-of-range values instead.
//!
//! # Example
//!
//! ```
//! use viability_grid::{Axis, DenseGrid, Grid};
//!
//! let grid = Grid::new(
//!     vec![Axis::linspace(0.1, 0.9, 9)],
//!     vec![Axis::linspace(-0.17, 1.57, 10)],
//! )?;
//!
//! let mut q_f: DenseGrid<bool> = DenseGrid::from_elem(&grid.q_shape(), false);
//! let bin = grid.digitize_state(&[0.42])?;
//! q_f.set(&[bin[0], 3], true);
//! # Ok::<(), viability_grid::GridError>(())
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them.
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod axis;
mod dense;
mod error;
mod grid;

pub use axis::Axis;
pub use dense::DenseGrid;
pub use error::{GridError, Result};
pub use grid::Grid;
