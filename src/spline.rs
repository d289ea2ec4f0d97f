use std::convert::TryFrom;
use std::str::FromStr;
use log::trace;
use ndarray::{ArrayD, Axis};
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::scalar::Scalar;




/// Fractional indexes this close to an integer are snapped onto the lattice.
const SNAP: f64 = 1e-8;




#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]

/**
 * How values between lattice points are reconstructed.
 */
pub enum Method {
    /// Piecewise constant: the value of the nearest lattice point (order 0).
    Nearest,
    /// Multi-linear interpolation (order 1).
    Linear,
}

impl Default for Method {
    fn default() -> Self {
        Method::Linear
    }
}

impl TryFrom<usize> for Method {
    type Error = Error;

    fn try_from(order: usize) -> Result<Self> {
        match order {
            0 => Ok(Method::Nearest),
            1 => Ok(Method::Linear),
            k => Err(Error::UnsupportedInterpolationOrder(k)),
        }
    }
}




#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]

/**
 * What an interpolant does with a query point outside its grid.
 */
pub enum Extrapolation {
    /// Continue the boundary cell's reconstruction past the boundary.
    Extend,
    /// Return zero.
    Zero,
    /// Fail with `Error::OutOfDomain`.
    Raise,
}

impl Default for Extrapolation {
    fn default() -> Self {
        Extrapolation::Raise
    }
}

impl Extrapolation {

    /**
     * Decode the integer policy codes used by FITPACK-style interfaces: 0
     * extrapolates, 1 returns zero, 2 raises.
     */
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(Extrapolation::Extend),
            1 => Ok(Extrapolation::Zero),
            2 => Ok(Extrapolation::Raise),
            _ => Err(Error::UnknownExtrapolation(code.to_string())),
        }
    }
}

impl FromStr for Extrapolation {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "extend" | "extrapolate" => Ok(Extrapolation::Extend),
            "zero" | "zeros" => Ok(Extrapolation::Zero),
            "raise" | "error" => Ok(Extrapolation::Raise),
            _ => Err(Error::UnknownExtrapolation(name.to_string())),
        }
    }
}




#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]

/**
 * Per-call interpolation settings. The default is linear interpolation that
 * refuses to extrapolate.
 */
pub struct Interpolation {
    pub method: Method,
    pub extrapolation: Extrapolation,
}

impl Interpolation {

    pub fn new(method: Method, extrapolation: Extrapolation) -> Self {
        Self { method, extrapolation }
    }

    pub fn linear() -> Self {
        Self::new(Method::Linear, Extrapolation::default())
    }

    pub fn nearest() -> Self {
        Self::new(Method::Nearest, Extrapolation::default())
    }

    pub fn with_extrapolation(self, extrapolation: Extrapolation) -> Self {
        Self { extrapolation, ..self }
    }
}




/**
 * A real-valued interpolant over the extended dimensions of a uniform grid.
 * Query points are given in the full dimensionality of the grid; their
 * coordinates along flat dimensions are ignored.
 */
#[derive(Clone, Debug)]
pub struct Spline {
    axes: Vec<usize>,
    origin: Vec<f64>,
    spacing: Vec<f64>,
    shape: Vec<usize>,
    num_dimensions: usize,
    values: ArrayD<f64>,
}




// ============================================================================
impl Spline {

    pub fn new(grid: &Grid, values: ArrayD<f64>) -> Self {
        let axes: Vec<usize> = (0..grid.num_dimensions()).filter(|&k| grid.shape()[k] > 1).collect();
        let mut values = values;

        for k in (0..grid.num_dimensions()).rev() {
            if grid.shape()[k] == 1 {
                values = values.index_axis_move(Axis(k), 0);
            }
        }

        Self {
            origin: axes.iter().map(|&k| grid.origin()[k]).collect(),
            spacing: axes.iter().map(|&k| grid.spacing()[k]).collect(),
            shape: axes.iter().map(|&k| grid.shape()[k]).collect(),
            num_dimensions: grid.num_dimensions(),
            axes,
            values,
        }
    }

    /**
     * Evaluate the interpolant at one point.
     */
    pub fn evaluate(&self, point: &[f64], interpolation: Interpolation) -> Result<f64> {
        if point.len() != self.num_dimensions {
            return Err(Error::DimensionMismatch { expected: self.num_dimensions, found: point.len() });
        }
        let rank = self.axes.len();
        let mut base = Vec::with_capacity(rank);
        let mut weight = Vec::with_capacity(rank);

        for (k, &axis) in self.axes.iter().enumerate() {
            let n = self.shape[k];
            let mut f = (point[axis] - self.origin[k]) / self.spacing[k];

            if (f - f.round()).abs() < SNAP {
                f = f.round()
            }
            if f < 0.0 || f > (n - 1) as f64 || f.is_nan() {
                match interpolation.extrapolation {
                    Extrapolation::Extend => {}
                    Extrapolation::Zero => return Ok(0.0),
                    Extrapolation::Raise => return Err(Error::OutOfDomain(point.to_vec())),
                }
            }
            match interpolation.method {
                Method::Nearest => {
                    base.push(f.round().max(0.0).min((n - 1) as f64) as usize);
                    weight.push(0.0);
                }
                Method::Linear => {
                    let i0 = f.floor().max(0.0).min((n - 2) as f64);
                    base.push(i0 as usize);
                    weight.push(f - i0);
                }
            }
        }

        let mut index = vec![0; rank];
        let mut result = 0.0;

        'corners: for corner in 0..(1usize << rank) {
            let mut w = 1.0;

            for k in 0..rank {
                if corner & (1 << k) == 0 {
                    w *= 1.0 - weight[k];
                    index[k] = base[k];
                } else {
                    if weight[k] == 0.0 {
                        continue 'corners;
                    }
                    w *= weight[k];
                    index[k] = base[k] + 1;
                }
            }
            result += w * self.values[&index[..]];
        }
        Ok(result)
    }
}




/**
 * The interpolants for one field: one for real data, a pair (real and
 * imaginary parts) for complex data.
 */
#[derive(Clone, Debug)]
pub struct Splines {
    real: Spline,
    imag: Option<Spline>,
}

impl Splines {

    pub fn build<T: Scalar>(grid: &Grid, data: &ArrayD<T>) -> Self {
        trace!("building interpolant on a grid of shape {:?}", grid.shape());

        Self {
            real: Spline::new(grid, data.mapv(|x| x.re())),
            imag: if T::IS_COMPLEX {
                Some(Spline::new(grid, data.mapv(|x| x.im())))
            } else {
                None
            },
        }
    }

    pub fn evaluate<T: Scalar>(&self, point: &[f64], interpolation: Interpolation) -> Result<T> {
        let re = self.real.evaluate(point, interpolation)?;
        let im = match &self.imag {
            Some(imag) => imag.evaluate(point, interpolation)?,
            None => 0.0,
        };
        Ok(T::from_parts(re, im))
    }
}
