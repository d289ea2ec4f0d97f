//! Gridfield is a library for numerical data sampled on uniform Cartesian
//! grids, as written by simulation codes. A `Grid` describes the lattice:
//! its shape, corners, spacing, ghost zones, and the refinement level,
//! component, time and iteration it was written at. A `GridData` pairs a grid
//! with real or complex samples and supports elementwise algebra,
//! reductions, finite difference derivatives, and interpolation at
//! arbitrary points. A `HierarchicalGridData` collects fields from an
//! adaptive mesh, where patches at several refinement levels may cover
//! parts of the domain, and answers point queries from the finest level
//! available.

pub mod arithmetic;
pub mod derivative;
pub mod error;
pub mod grid;
pub mod grid_data;
pub mod hierarchy;
pub mod sampling;
pub mod scalar;
pub mod spline;

pub use arithmetic::{Comparison, Operand};
pub use error::{Error, ErrorKind, Result};
pub use grid::{common_bounding_box, merge_uniform_grids, CoordinateLayout, Grid, GridSpec};
pub use grid_data::{GridData, Histogram, HistogramOptions};
pub use hierarchy::{ComponentOperation, HierarchicalGridData, Level};
pub use sampling::{sample_function, sample_function_over_grid, GridFunction};
pub use scalar::Scalar;
pub use spline::{Extrapolation, Interpolation, Method};

#[cfg(test)]
pub(crate) fn test_logging() {
    let _ = simple_logger::SimpleLogger::new().init();
}
