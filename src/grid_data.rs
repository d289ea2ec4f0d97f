use std::ops::Index;
use std::sync::OnceLock;
use log::trace;
use ndarray::{ArrayD, Axis, Dimension, IxDyn, NdIndex, Slice};
use num_complex::Complex64;
use crate::derivative::partial_derivative;
use crate::error::{Error, Result};
use crate::grid::{close, CoordinateLayout, Grid, GridSpec};
use crate::scalar::Scalar;
use crate::spline::{Extrapolation, Interpolation, Method, Splines};




/// Spacing ratios within this distance of a power of two are accepted.
const RATIO_TOLERANCE: f64 = 1e-9;




#[derive(Clone, Copy, Debug, PartialEq)]

/**
 * Binning options for [`GridData::histogram`].
 */
pub struct HistogramOptions {
    /// Lower and upper edge of the binned range; the data range if `None`.
    pub range: Option<(f64, f64)>,
    pub bins: usize,
}

impl Default for HistogramOptions {
    fn default() -> Self {
        Self { range: None, bins: 400 }
    }
}




/**
 * Counts per bin, and the `bins + 1` bin edges.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
    pub counts: Vec<f64>,
    pub edges: Vec<f64>,
}




/**
 * A dense array of samples on a uniform grid. The field owns its geometry and
 * its data; the interpolant used for evaluation between lattice points is
 * built on first use and discarded by every mutation.
 */
#[derive(Clone, Debug)]
pub struct GridData<T: Scalar = f64> {
    grid: Grid,
    data: ArrayD<T>,
    spline: OnceLock<Splines>,
}




// ============================================================================
impl<T: Scalar> GridData<T> {

    /**
     * Pair a grid with an array of samples. The array's shape must be the
     * grid's shape exactly.
     */
    pub fn new(grid: Grid, data: ArrayD<T>) -> Result<Self> {
        if grid.shape() != data.shape() {
            return Err(Error::ShapeMismatch {
                expected: grid.shape().to_vec(),
                found: data.shape().to_vec(),
            });
        }
        Ok(Self { grid, data, spline: OnceLock::new() })
    }

    /**
     * Build the grid from a geometry description, taking the shape from the
     * data, and wrap the data with it.
     */
    pub fn from_geometry_parameters(data: ArrayD<T>, spec: GridSpec) -> Result<Self> {
        let grid = spec.shape(data.shape()).build()?;
        Self::new(grid, data)
    }

    pub(crate) fn from_parts(grid: Grid, data: ArrayD<T>) -> Self {
        Self { grid, data, spline: OnceLock::new() }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn data(&self) -> &ArrayD<T> {
        &self.data
    }

    /**
     * Mutable access to the samples. The cached interpolant is dropped, since
     * the caller may change anything.
     */
    pub fn data_mut(&mut self) -> &mut ArrayD<T> {
        self.invalidate();
        &mut self.data
    }

    pub fn into_data(self) -> ArrayD<T> {
        self.data
    }

    pub fn shape(&self) -> &[usize] {
        self.grid.shape()
    }

    pub fn origin(&self) -> &[f64] {
        self.grid.origin()
    }

    pub fn upper_corner(&self) -> &[f64] {
        self.grid.upper_corner()
    }

    pub fn spacing(&self) -> &[f64] {
        self.grid.spacing()
    }

    pub fn num_ghost(&self) -> &[usize] {
        self.grid.num_ghost()
    }

    pub fn ref_level(&self) -> i32 {
        self.grid.ref_level()
    }

    pub fn component(&self) -> i32 {
        self.grid.component()
    }

    pub fn time(&self) -> Option<f64> {
        self.grid.time()
    }

    pub fn iteration(&self) -> Option<i64> {
        self.grid.iteration()
    }

    pub fn num_dimensions(&self) -> usize {
        self.grid.num_dimensions()
    }

    pub fn extended_dimensions(&self) -> Vec<bool> {
        self.grid.extended_dimensions()
    }

    pub fn num_extended_dimensions(&self) -> usize {
        self.grid.num_extended_dimensions()
    }

    pub fn dv(&self) -> f64 {
        self.grid.dv()
    }

    pub fn volume(&self) -> f64 {
        self.grid.volume()
    }

    pub fn is_complex(&self) -> bool {
        T::IS_COMPLEX
    }

    /**
     * Return true if the interpolant has to be rebuilt before the next
     * evaluation.
     */
    pub fn is_spline_stale(&self) -> bool {
        self.spline.get().is_none()
    }

    pub(crate) fn invalidate(&mut self) {
        self.spline = OnceLock::new();
    }
}




// ============================================================================
impl<T: Scalar> GridData<T> {

    /**
     * Return a copy with every flat dimension removed from both the grid and
     * the data.
     */
    pub fn flat_dimensions_removed(&self) -> Self {
        let grid = self.grid.flat_dimensions_removed();
        let mut view = self.data.view();

        for axis in (0..self.num_dimensions()).rev() {
            if view.ndim() > grid.num_dimensions() && view.shape()[axis] == 1 {
                view = view.index_axis_move(Axis(axis), 0);
            }
        }
        Self::from_parts(grid, view.to_owned())
    }

    pub fn flat_dimensions_remove(&mut self) {
        *self = self.flat_dimensions_removed()
    }

    /**
     * Return a copy with the ghost zones cut off the data and the grid.
     */
    pub fn ghost_zones_removed(&self) -> Self {
        let mut view = self.data.view();

        for (axis, (&n, &g)) in self.shape().iter().zip(self.num_ghost()).enumerate() {
            if n > 1 && g > 0 {
                view.slice_axis_inplace(Axis(axis), Slice::from(g..n - g));
            }
        }
        Self::from_parts(self.grid.ghost_zones_removed(), view.to_owned())
    }

    pub fn ghost_zones_remove(&mut self) {
        *self = self.ghost_zones_removed()
    }
}




// ============================================================================
impl<T: Scalar> GridData<T> {

    /**
     * Apply a function to every sample, producing a field on the same grid.
     */
    pub fn map<U, F>(&self, f: F) -> GridData<U>
    where
        U: Scalar,
        F: Fn(T) -> U,
    {
        GridData::from_parts(self.grid.clone(), self.data.mapv(f))
    }

    pub fn map_in_place<F>(&mut self, f: F)
    where
        F: Fn(T) -> T,
    {
        self.data.mapv_inplace(f);
        self.invalidate();
    }

    pub fn abs(&self) -> GridData<f64> {
        self.map(T::abs)
    }

    pub fn real(&self) -> GridData<f64> {
        self.map(T::re)
    }

    pub fn imag(&self) -> GridData<f64> {
        self.map(T::im)
    }

    pub fn conj(&self) -> Self {
        self.map(T::conj)
    }

    pub fn to_complex(&self) -> GridData<Complex64> {
        self.map(|x| Complex64::new(x.re(), x.im()))
    }

    pub fn powf(&self, exponent: f64) -> Self {
        self.map(|x| x.powf(exponent))
    }

    pub fn sqrt(&self) -> Self {
        self.map(T::sqrt)
    }

    pub fn exp(&self) -> Self {
        self.map(T::exp)
    }

    pub fn ln(&self) -> Self {
        self.map(T::ln)
    }

    pub fn sin(&self) -> Self {
        self.map(T::sin)
    }

    pub fn cos(&self) -> Self {
        self.map(T::cos)
    }

    pub fn tan(&self) -> Self {
        self.map(T::tan)
    }
}




// ============================================================================
impl<T: Scalar> GridData<T> {

    fn sum(&self) -> T {
        self.data.iter().fold(T::zero(), |a, &b| a + b)
    }

    fn sum_of_powers(&self, p: f64) -> f64 {
        self.data.iter().map(|x| x.abs().powf(p)).sum()
    }

    /**
     * Return the sum of the samples times the cell volume.
     */
    pub fn integral(&self) -> T {
        self.sum() * self.dv()
    }

    pub fn norm1(&self) -> f64 {
        self.sum_of_powers(1.0) * self.dv()
    }

    pub fn norm2(&self) -> f64 {
        self.norm_p(2.0)
    }

    /**
     * Return the discrete p-norm, `(sum |x|^p dv)^(1/p)`.
     */
    pub fn norm_p(&self, p: f64) -> f64 {
        (self.sum_of_powers(p) * self.dv()).powf(1.0 / p)
    }

    /**
     * Return the arithmetic mean of the samples.
     */
    pub fn average(&self) -> T {
        self.sum() / self.data.len() as f64
    }

    fn real_samples(&self) -> Result<Vec<f64>> {
        if T::IS_COMPLEX {
            Err(Error::ComplexData)
        } else {
            Ok(self.data.iter().map(|x| x.re()).collect())
        }
    }

    /**
     * Bin the samples into equal-width bins, optionally weighting each sample
     * by the matching sample of another field on the same grid. The last bin
     * includes its upper edge; samples outside the range are ignored. A
     * degenerate range is widened by a half on either side.
     */
    pub fn histogram(&self, weights: Option<&GridData<f64>>, options: HistogramOptions) -> Result<Histogram> {
        let values = self.real_samples()?;

        let weights: Option<Vec<f64>> = match weights {
            Some(w) if w.grid != self.grid => return Err(Error::IncompatibleGrids),
            Some(w) => Some(w.data.iter().copied().collect()),
            None => None,
        };
        if options.bins == 0 {
            return Err(Error::InvalidBinning("a histogram needs at least one bin".into()));
        }

        let (mut lo, mut hi) = match options.range {
            Some(range) => range,
            None => values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(a, b), &x| (a.min(x), b.max(x))),
        };
        if !(lo <= hi) || !lo.is_finite() || !hi.is_finite() {
            return Err(Error::InvalidBinning(format!("histogram range ({}, {})", lo, hi)));
        }
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }

        let bins = options.bins;
        let width = (hi - lo) / bins as f64;
        let edges: Vec<f64> = (0..=bins).map(|i| lo + i as f64 * width).collect();
        let mut counts = vec![0.0; bins];

        for (n, &x) in values.iter().enumerate() {
            if x.is_nan() || x < lo || x > hi {
                continue;
            }
            let bin = (((x - lo) / (hi - lo)) * bins as f64) as usize;
            counts[bin.min(bins - 1)] += weights.as_ref().map_or(1.0, |w| w[n]);
        }
        Ok(Histogram { counts, edges })
    }

    /**
     * Return the values below which the given fractions of the samples fall,
     * interpolating linearly between order statistics. With `relative` the
     * fractions lie in [0, 1], otherwise in [0, 100].
     */
    pub fn percentiles(&self, fractions: &[f64], relative: bool) -> Result<Vec<f64>> {
        let mut values = self.real_samples()?;
        values.sort_by(|a, b| a.total_cmp(b));

        let last = (values.len() - 1) as f64;

        fractions
            .iter()
            .map(|&fraction| {
                let q = if relative { fraction } else { fraction / 100.0 };

                if !(0.0..=1.0).contains(&q) {
                    return Err(Error::InvalidPercentile(fraction));
                }
                let position = q * last;
                let i0 = position.floor() as usize;
                let i1 = position.ceil() as usize;
                Ok(values[i0] + (values[i1] - values[i0]) * (position - i0 as f64))
            })
            .collect()
    }
}




// ============================================================================
impl GridData<f64> {

    pub fn min(&self) -> f64 {
        self.data.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}




// ============================================================================
impl<T: Scalar> GridData<T> {

    /**
     * Differentiate `order` times along `axis`, in place.
     */
    pub fn partial_derive(&mut self, axis: usize, order: usize) -> Result<()> {
        if axis >= self.num_dimensions() {
            return Err(Error::AxisOutOfRange { axis, num_dimensions: self.num_dimensions() });
        }
        partial_derivative(&mut self.data, axis, self.grid.spacing()[axis], order);
        self.invalidate();
        Ok(())
    }

    pub fn partial_derived(&self, axis: usize, order: usize) -> Result<Self> {
        let mut result = self.clone();
        result.partial_derive(axis, order)?;
        Ok(result)
    }

    /**
     * Return the partial derivatives of the given order along every axis.
     */
    pub fn gradient(&self, order: usize) -> Result<Vec<Self>> {
        (0..self.num_dimensions()).map(|axis| self.partial_derived(axis, order)).collect()
    }
}




// ============================================================================
impl<T: Scalar> GridData<T> {

    fn splines(&self) -> &Splines {
        self.spline.get_or_init(|| Splines::build(&self.grid, &self.data))
    }

    /**
     * Interpolate the field at a single point.
     */
    pub fn evaluate(&self, point: &[f64], interpolation: Interpolation) -> Result<T> {
        self.splines().evaluate(point, interpolation)
    }

    pub fn evaluate_many<P: AsRef<[f64]>>(&self, points: &[P], interpolation: Interpolation) -> Result<Vec<T>> {
        points.iter().map(|point| self.evaluate(point.as_ref(), interpolation)).collect()
    }

    /**
     * Interpolate the field at every lattice point of another grid. The
     * result lives on that grid.
     */
    pub fn evaluate_on(&self, grid: &Grid, interpolation: Interpolation) -> Result<Self> {
        if grid.num_dimensions() != self.num_dimensions() {
            return Err(Error::DimensionMismatch { expected: self.num_dimensions(), found: grid.num_dimensions() });
        }
        let splines = self.splines();
        let values = ndarray::indices(IxDyn(grid.shape()))
            .into_iter()
            .map(|index| splines.evaluate(&grid.coordinates_of(index.slice()), interpolation))
            .collect::<Result<Vec<T>>>()?;

        let data = ArrayD::from_shape_vec(IxDyn(grid.shape()), values)
            .map_err(|_| Error::ShapeMismatch { expected: grid.shape().to_vec(), found: vec![] })?;

        Ok(Self::from_parts(grid.clone(), data))
    }

    /**
     * Return the field interpolated onto another grid, which must lie inside
     * this one.
     */
    pub fn resampled(&self, grid: &Grid, method: Method) -> Result<Self> {
        self.evaluate_on(grid, Interpolation::new(method, Extrapolation::Raise))
    }

    /**
     * Resample onto a lattice with the same origin and the given spacing.
     * Each new spacing must be the old one times a power of two. The new
     * shape is the largest that fits in the old extent; ghost zones are not
     * kept.
     */
    pub fn changed_spacing(&self, spacing: &[f64]) -> Result<Self> {
        if spacing.len() != self.num_dimensions() {
            return Err(Error::DimensionMismatch { expected: self.num_dimensions(), found: spacing.len() });
        }
        let mut shape = Vec::with_capacity(spacing.len());
        let mut new_spacing = Vec::with_capacity(spacing.len());

        for axis in 0..self.num_dimensions() {
            let (n, old, new) = (self.shape()[axis], self.spacing()[axis], spacing[axis]);

            if n == 1 {
                shape.push(1);
                new_spacing.push(0.0);
                continue;
            }
            if !new.is_finite() || new <= 0.0 {
                return Err(Error::InvalidSpacing(format!("spacing {} on axis {}", new, axis)));
            }
            let exponent = (new / old).log2();

            if (exponent - exponent.round()).abs() > RATIO_TOLERANCE {
                return Err(Error::InvalidSpacing(format!("{} is not a power of two times {}", new, old)));
            }
            let points = (self.upper_corner()[axis] - self.origin()[axis]) / new;
            let points = if close(points, points.round()) { points.round() } else { points.floor() };

            shape.push(points as usize + 1);
            new_spacing.push(new);
        }

        trace!("changing spacing {:?} -> {:?}, shape {:?} -> {:?}", self.spacing(), new_spacing, self.shape(), shape);

        let mut spec = GridSpec::new(&shape)
            .origin(self.origin())
            .spacing(&new_spacing)
            .ref_level(self.ref_level())
            .component(self.component());

        if let Some(time) = self.time() {
            spec = spec.time(time)
        }
        if let Some(iteration) = self.iteration() {
            spec = spec.iteration(iteration)
        }
        self.resampled(&spec.build()?, Method::Linear)
    }

    pub fn change_spacing(&mut self, spacing: &[f64]) -> Result<()> {
        *self = self.changed_spacing(spacing)?;
        Ok(())
    }
}




// ============================================================================
impl<T: Scalar> GridData<T> {

    /**
     * Return one field per dimension whose value at each lattice point is the
     * point's coordinate along that dimension.
     */
    pub fn coordinates(&self) -> Vec<GridData<f64>> {
        self.grid
            .coordinates(CoordinateLayout::SameShape)
            .into_iter()
            .map(|x| GridData::from_parts(self.grid.clone(), x))
            .collect()
    }

    pub fn coordinates_from_grid(&self) -> Vec<ArrayD<f64>> {
        self.grid.coordinates(CoordinateLayout::Axes)
    }

    pub fn coordinates_meshgrid(&self) -> Vec<ArrayD<f64>> {
        self.grid.coordinates(CoordinateLayout::Meshgrid)
    }
}




// ============================================================================
impl<T: Scalar> PartialEq for GridData<T> {
    fn eq(&self, other: &Self) -> bool {
        self.grid == other.grid
            && self.data.shape() == other.data.shape()
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(&a, &b)| close(a.re(), b.re()) && close(a.im(), b.im()))
    }
}

impl<T: Scalar, I: NdIndex<IxDyn>> Index<I> for GridData<T> {
    type Output = T;

    fn index(&self, index: I) -> &T {
        &self.data[index]
    }
}
