use ndarray::{ArrayD, Dimension, IxDyn};
use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::grid_data::GridData;
use crate::scalar::Scalar;




/**
 * A function of the coordinates of a lattice point. It is implemented for
 * closures and function items taking one to four `f64` arguments; `Args`
 * only serves to tell those implementations apart.
 */
pub trait GridFunction<Args, T> {

    /// The number of coordinates the function takes.
    const ARITY: usize;

    fn call(&self, x: &[f64]) -> T;
}

impl<F, T> GridFunction<(f64,), T> for F where F: Fn(f64) -> T {
    const ARITY: usize = 1;

    fn call(&self, x: &[f64]) -> T {
        self(x[0])
    }
}

impl<F, T> GridFunction<(f64, f64), T> for F where F: Fn(f64, f64) -> T {
    const ARITY: usize = 2;

    fn call(&self, x: &[f64]) -> T {
        self(x[0], x[1])
    }
}

impl<F, T> GridFunction<(f64, f64, f64), T> for F where F: Fn(f64, f64, f64) -> T {
    const ARITY: usize = 3;

    fn call(&self, x: &[f64]) -> T {
        self(x[0], x[1], x[2])
    }
}

impl<F, T> GridFunction<(f64, f64, f64, f64), T> for F where F: Fn(f64, f64, f64, f64) -> T {
    const ARITY: usize = 4;

    fn call(&self, x: &[f64]) -> T {
        self(x[0], x[1], x[2], x[3])
    }
}




/**
 * Evaluate a function at every lattice point of a grid. The function must
 * take exactly as many arguments as the grid has dimensions.
 */
pub fn sample_function_over_grid<F, Args, T>(f: F, grid: &Grid) -> Result<GridData<T>>
where
    F: GridFunction<Args, T>,
    T: Scalar,
{
    if F::ARITY != grid.num_dimensions() {
        return Err(Error::ArityMismatch { expected: grid.num_dimensions(), found: F::ARITY });
    }
    let data = ArrayD::from_shape_fn(IxDyn(grid.shape()), |index| f.call(&grid.coordinates_of(index.slice())));
    GridData::new(grid.clone(), data)
}




/**
 * Evaluate a function on the grid with the given shape and corners.
 */
pub fn sample_function<F, Args, T>(f: F, shape: &[usize], origin: &[f64], upper: &[f64]) -> Result<GridData<T>>
where
    F: GridFunction<Args, T>,
    T: Scalar,
{
    sample_function_over_grid(f, &Grid::with_corners(shape, origin, upper)?)
}
