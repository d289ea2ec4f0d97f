use std::convert::TryFrom;
use std::fmt;
use ndarray::{Array1, ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};




/// Relative tolerance used when comparing floating point geometry.
const RTOL: f64 = 1e-9;

/// Absolute tolerance used when comparing floating point geometry.
const ATOL: f64 = 1e-12;

/// Fraction of a lattice spacing by which `Grid::covers` widens the grid.
const COVER_TOLERANCE: f64 = 1e-9;

/// Refinement level and component tag of a grid outside any AMR hierarchy.
pub const UNTAGGED: i32 = -1;




pub(crate) fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= ATOL + RTOL * a.abs().max(b.abs())
}

pub(crate) fn all_close(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(&x, &y)| close(x, y))
}

fn check_dimensions(expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::DimensionMismatch { expected, found })
    }
}




/**
 * Layout of the coordinate arrays returned by [`Grid::coordinates`].
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinateLayout {
    /// One 1D array per dimension.
    Axes,
    /// Full N-D arrays in the `xy` meshgrid convention (first two axes
    /// swapped with respect to the lattice shape).
    Meshgrid,
    /// Full N-D arrays shaped exactly like the lattice (`ij` convention).
    SameShape,
}




#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]

/**
 * Declarative description of a uniform grid: the shape plus whichever of the
 * upper corner and the spacing is known, and the optional tags. This is the
 * record a snapshot loader fills in, and the form in which a `Grid` is
 * serialized. Use the builder-style setters, then `build`.
 */
pub struct GridSpec {
    pub shape: Vec<usize>,
    pub origin: Option<Vec<f64>>,
    pub upper: Option<Vec<f64>>,
    pub spacing: Option<Vec<f64>>,
    pub num_ghost: Option<Vec<usize>>,
    pub ref_level: i32,
    pub component: i32,
    pub time: Option<f64>,
    pub iteration: Option<i64>,
}




// ============================================================================
impl Default for GridSpec {
    fn default() -> Self {
        Self {
            shape: Vec::new(),
            origin: None,
            upper: None,
            spacing: None,
            num_ghost: None,
            ref_level: UNTAGGED,
            component: UNTAGGED,
            time: None,
            iteration: None,
        }
    }
}




// ============================================================================
impl GridSpec {

    pub fn new(shape: &[usize]) -> Self {
        Self { shape: shape.to_vec(), ..Self::default() }
    }

    pub fn shape(mut self, shape: &[usize]) -> Self {
        self.shape = shape.to_vec();
        self
    }

    pub fn origin(mut self, origin: &[f64]) -> Self {
        self.origin = Some(origin.to_vec());
        self
    }

    pub fn upper(mut self, upper: &[f64]) -> Self {
        self.upper = Some(upper.to_vec());
        self
    }

    pub fn spacing(mut self, spacing: &[f64]) -> Self {
        self.spacing = Some(spacing.to_vec());
        self
    }

    pub fn num_ghost(mut self, num_ghost: &[usize]) -> Self {
        self.num_ghost = Some(num_ghost.to_vec());
        self
    }

    pub fn ref_level(mut self, ref_level: i32) -> Self {
        self.ref_level = ref_level;
        self
    }

    pub fn component(mut self, component: i32) -> Self {
        self.component = component;
        self
    }

    pub fn time(mut self, time: f64) -> Self {
        self.time = Some(time);
        self
    }

    pub fn iteration(mut self, iteration: i64) -> Self {
        self.iteration = Some(iteration);
        self
    }

    /**
     * Validate the description and produce a grid. Exactly one of the upper
     * corner and the spacing is required; if both are given they must agree.
     * Dimensions with a single point are flat: their spacing is forced to
     * zero and their upper corner to the origin, whatever was supplied.
     */
    pub fn build(&self) -> Result<Grid> {
        let shape = self.shape.clone();
        let dim = shape.len();

        if dim == 0 {
            return Err(Error::EmptyCollection("grid dimensions"));
        }
        if shape.iter().any(|&n| n == 0) {
            return Err(Error::EmptyCollection("lattice points along an axis"));
        }

        let origin = self.origin.clone().unwrap_or_else(|| vec![0.0; dim]);
        check_dimensions(dim, origin.len())?;

        if let Some(upper) = &self.upper {
            check_dimensions(dim, upper.len())?;
        }
        if let Some(spacing) = &self.spacing {
            check_dimensions(dim, spacing.len())?;
        }

        let from_upper = match &self.upper {
            Some(upper) => {
                if shape.iter().zip(upper.iter().zip(&origin)).any(|(&n, (u, o))| n > 1 && u < o) {
                    return Err(Error::InvertedCorners { origin, upper: upper.clone() });
                }
                Some(shape
                    .iter()
                    .zip(origin.iter().zip(upper))
                    .map(|(&n, (o, u))| if n == 1 { 0.0 } else { (u - o) / (n - 1) as f64 })
                    .collect::<Vec<_>>())
            }
            None => None,
        };

        let spacing: Vec<f64> = match (from_upper, &self.spacing) {
            (None, None) => return Err(Error::MissingExtent),
            (Some(derived), None) => derived,
            (None, Some(given)) => shape.iter().zip(given).map(|(&n, &dx)| if n == 1 { 0.0 } else { dx }).collect(),
            (Some(derived), Some(given)) => {
                let consistent = shape
                    .iter()
                    .zip(derived.iter().zip(given))
                    .all(|(&n, (&a, &b))| n == 1 || close(a, b));

                if !consistent {
                    return Err(Error::InconsistentExtent {
                        spacing: given.clone(),
                        upper: self.upper.clone().unwrap_or_default(),
                    });
                }
                derived
            }
        };

        for (axis, (&n, &dx)) in shape.iter().zip(&spacing).enumerate() {
            if !dx.is_finite() || dx < 0.0 {
                return Err(Error::InvalidSpacing(format!("spacing {} on axis {}", dx, axis)));
            }
            if n > 1 && dx == 0.0 {
                return Err(Error::InvalidSpacing(format!("zero spacing on axis {} with {} points", axis, n)));
            }
        }

        let num_ghost = self.num_ghost.clone().unwrap_or_else(|| vec![0; dim]);
        check_dimensions(dim, num_ghost.len())?;

        for (axis, (&n, &ghost)) in shape.iter().zip(&num_ghost).enumerate() {
            if n > 1 && 2 * ghost >= n {
                return Err(Error::TooManyGhostZones { axis, shape: n, ghost });
            }
        }

        let upper = upper_corner(&shape, &origin, &spacing);

        Ok(Grid {
            shape,
            origin,
            spacing,
            upper,
            num_ghost,
            ref_level: self.ref_level,
            component: self.component,
            time: self.time,
            iteration: self.iteration,
        })
    }
}

fn upper_corner(shape: &[usize], origin: &[f64], spacing: &[f64]) -> Vec<f64> {
    shape
        .iter()
        .zip(origin.iter().zip(spacing))
        .map(|(&n, (&x0, &dx))| x0 + dx * (n - 1) as f64)
        .collect()
}




#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "GridSpec", into = "GridSpec")]

/**
 * Describes a uniform Cartesian lattice: shape, origin, spacing, ghost zone
 * padding and the AMR tags (refinement level, component, time, iteration).
 * A grid carries no data and is immutable; transformations return new grids.
 */
pub struct Grid {
    shape: Vec<usize>,
    origin: Vec<f64>,
    spacing: Vec<f64>,
    upper: Vec<f64>,
    num_ghost: Vec<usize>,
    ref_level: i32,
    component: i32,
    time: Option<f64>,
    iteration: Option<i64>,
}




// ============================================================================
impl Grid {

    /**
     * Start a `GridSpec` for a grid of the given shape.
     */
    pub fn spec(shape: &[usize]) -> GridSpec {
        GridSpec::new(shape)
    }

    /**
     * Construct a grid from its lower and upper corners.
     */
    pub fn with_corners(shape: &[usize], origin: &[f64], upper: &[f64]) -> Result<Self> {
        GridSpec::new(shape).origin(origin).upper(upper).build()
    }

    /**
     * Construct a grid from its origin and lattice spacing.
     */
    pub fn with_spacing(shape: &[usize], origin: &[f64], spacing: &[f64]) -> Result<Self> {
        GridSpec::new(shape).origin(origin).spacing(spacing).build()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn origin(&self) -> &[f64] {
        &self.origin
    }

    pub fn upper_corner(&self) -> &[f64] {
        &self.upper
    }

    pub fn spacing(&self) -> &[f64] {
        &self.spacing
    }

    pub fn num_ghost(&self) -> &[usize] {
        &self.num_ghost
    }

    pub fn ref_level(&self) -> i32 {
        self.ref_level
    }

    pub fn component(&self) -> i32 {
        self.component
    }

    pub fn time(&self) -> Option<f64> {
        self.time
    }

    pub fn iteration(&self) -> Option<i64> {
        self.iteration
    }

    pub fn num_dimensions(&self) -> usize {
        self.shape.len()
    }

    /**
     * Return the total number of lattice points.
     */
    pub fn num_points(&self) -> usize {
        self.shape.iter().product()
    }

    /**
     * Return, for each dimension, whether it has more than one point.
     */
    pub fn extended_dimensions(&self) -> Vec<bool> {
        self.shape.iter().map(|&n| n > 1).collect()
    }

    pub fn num_extended_dimensions(&self) -> usize {
        self.shape.iter().filter(|&&n| n > 1).count()
    }

    /**
     * Return the volume of a single cell, the product of the spacing over the
     * extended dimensions.
     */
    pub fn dv(&self) -> f64 {
        self.shape
            .iter()
            .zip(&self.spacing)
            .filter(|(&n, _)| n > 1)
            .map(|(_, &dx)| dx)
            .product()
    }

    /**
     * Return the cell volume times the number of points along the extended
     * dimensions.
     */
    pub fn volume(&self) -> f64 {
        self.dv() * self.shape.iter().filter(|&&n| n > 1).map(|&n| n as f64).product::<f64>()
    }

    /**
     * Map a lattice index to its coordinates: `origin + index * spacing`.
     */
    pub fn indices_to_coordinates(&self, index: &[i64]) -> Result<Vec<f64>> {
        check_dimensions(self.num_dimensions(), index.len())?;
        Ok(index
            .iter()
            .zip(self.origin.iter().zip(&self.spacing))
            .map(|(&i, (&x0, &dx))| x0 + i as f64 * dx)
            .collect())
    }

    pub fn indices_to_coordinates_many<I: AsRef<[i64]>>(&self, indices: &[I]) -> Result<Vec<Vec<f64>>> {
        indices.iter().map(|index| self.indices_to_coordinates(index.as_ref())).collect()
    }

    /**
     * Map coordinates to the nearest lattice index. No bounds checking is
     * done; the result is only meaningful for points on the lattice.
     */
    pub fn coordinates_to_indices(&self, point: &[f64]) -> Result<Vec<i64>> {
        check_dimensions(self.num_dimensions(), point.len())?;
        Ok(point
            .iter()
            .zip(self.origin.iter().zip(&self.spacing))
            .map(|(&x, (&x0, &dx))| if dx == 0.0 { 0 } else { ((x - x0) / dx).round() as i64 })
            .collect())
    }

    pub fn coordinates_to_indices_many<P: AsRef<[f64]>>(&self, points: &[P]) -> Result<Vec<Vec<i64>>> {
        points.iter().map(|point| self.coordinates_to_indices(point.as_ref())).collect()
    }

    /**
     * Return the coordinates of the lattice point at the given index, which
     * must address every dimension.
     */
    pub fn at(&self, index: &[usize]) -> Result<Vec<f64>> {
        check_dimensions(self.num_dimensions(), index.len())?;
        Ok(self.coordinates_of(index))
    }

    pub(crate) fn coordinates_of(&self, index: &[usize]) -> Vec<f64> {
        index
            .iter()
            .zip(self.origin.iter().zip(&self.spacing))
            .map(|(&i, (&x0, &dx))| x0 + i as f64 * dx)
            .collect()
    }

    /**
     * Determine whether a point lies within the grid, boundaries included.
     * A point of the wrong dimensionality is never contained.
     */
    pub fn contains(&self, point: &[f64]) -> bool {
        point.len() == self.num_dimensions()
            && point
                .iter()
                .zip(self.origin.iter().zip(&self.upper))
                .all(|(x, (x0, x1))| x0 <= x && x <= x1)
    }

    /**
     * Like `contains`, but the grid is widened by a tiny fraction of the
     * spacing so that lattice points accumulated with round-off are still
     * found on the boundary.
     */
    pub fn covers(&self, point: &[f64]) -> bool {
        point.len() == self.num_dimensions()
            && point
                .iter()
                .zip(self.origin.iter().zip(&self.upper))
                .zip(&self.spacing)
                .all(|((&x, (&x0, &x1)), &dx)| {
                    let tol = COVER_TOLERANCE * dx;
                    x0 - tol <= x && x <= x1 + tol
                })
    }

    /**
     * Return the 1D coordinates along each axis.
     */
    pub fn axis_coordinates(&self) -> Vec<Array1<f64>> {
        (0..self.num_dimensions())
            .map(|axis| {
                let (x0, dx) = (self.origin[axis], self.spacing[axis]);
                Array1::from_shape_fn(self.shape[axis], |i| x0 + i as f64 * dx)
            })
            .collect()
    }

    /**
     * Return the coordinates of the lattice, one array per dimension, in the
     * requested layout.
     */
    pub fn coordinates(&self, layout: CoordinateLayout) -> Vec<ArrayD<f64>> {
        match layout {
            CoordinateLayout::Axes => self
                .axis_coordinates()
                .into_iter()
                .map(|x| x.into_dyn())
                .collect(),
            CoordinateLayout::SameShape => (0..self.num_dimensions())
                .map(|axis| {
                    let (x0, dx) = (self.origin[axis], self.spacing[axis]);
                    ArrayD::from_shape_fn(IxDyn(&self.shape), |index| x0 + index[axis] as f64 * dx)
                })
                .collect(),
            CoordinateLayout::Meshgrid => self
                .coordinates(CoordinateLayout::SameShape)
                .into_iter()
                .map(|mut x| {
                    if x.ndim() > 1 {
                        x.swap_axes(0, 1);
                    }
                    x.as_standard_layout().into_owned()
                })
                .collect(),
        }
    }

    /**
     * Return a grid with every flat (single point) dimension removed. A grid
     * made only of flat dimensions keeps its first one.
     */
    pub fn flat_dimensions_removed(&self) -> Self {
        let mut keep: Vec<usize> = (0..self.num_dimensions()).filter(|&k| self.shape[k] > 1).collect();

        if keep.is_empty() {
            keep.push(0);
        }
        let pick_f = |v: &[f64]| keep.iter().map(|&k| v[k]).collect::<Vec<_>>();
        let pick_u = |v: &[usize]| keep.iter().map(|&k| v[k]).collect::<Vec<_>>();

        Self {
            shape: pick_u(&self.shape),
            origin: pick_f(&self.origin),
            spacing: pick_f(&self.spacing),
            upper: pick_f(&self.upper),
            num_ghost: pick_u(&self.num_ghost),
            ..self.clone()
        }
    }

    /**
     * Return the grid without its ghost zones. Flat dimensions are left
     * untouched.
     */
    pub fn ghost_zones_removed(&self) -> Self {
        let mut shape = self.shape.clone();
        let mut origin = self.origin.clone();

        for axis in 0..self.num_dimensions() {
            if self.shape[axis] > 1 {
                let g = self.num_ghost[axis];
                shape[axis] -= 2 * g;
                origin[axis] += g as f64 * self.spacing[axis];
            }
        }
        let upper = upper_corner(&shape, &origin, &self.spacing);

        Self {
            shape,
            origin,
            upper,
            num_ghost: vec![0; self.num_dimensions()],
            ..self.clone()
        }
    }

    /**
     * Return the grid translated by the given offset.
     */
    pub fn shifted(&self, offset: &[f64]) -> Result<Self> {
        check_dimensions(self.num_dimensions(), offset.len())?;
        let shift = |v: &[f64]| v.iter().zip(offset).map(|(x, dx)| x + dx).collect::<Vec<_>>();

        Ok(Self {
            origin: shift(&self.origin),
            upper: shift(&self.upper),
            ..self.clone()
        })
    }
}




// ============================================================================
impl PartialEq for Grid {
    fn eq(&self, other: &Self) -> bool {
        let same_time = match (self.time, other.time) {
            (None, None) => true,
            (Some(a), Some(b)) => close(a, b),
            _ => false,
        };
        self.shape == other.shape
            && all_close(&self.origin, &other.origin)
            && all_close(&self.spacing, &other.spacing)
            && self.ref_level == other.ref_level
            && self.component == other.component
            && self.iteration == other.iteration
            && same_time
    }
}

impl TryFrom<GridSpec> for Grid {
    type Error = Error;

    fn try_from(spec: GridSpec) -> Result<Self> {
        spec.build()
    }
}

impl From<Grid> for GridSpec {
    fn from(grid: Grid) -> Self {
        Self {
            shape: grid.shape,
            origin: Some(grid.origin),
            upper: None,
            spacing: Some(grid.spacing),
            num_ghost: Some(grid.num_ghost),
            ref_level: grid.ref_level,
            component: grid.component,
            time: grid.time,
            iteration: grid.iteration,
        }
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(fmt, "Shape            = {:?}", self.shape)?;
        writeln!(fmt, "Num ghost zones  = {:?}", self.num_ghost)?;
        writeln!(fmt, "Ref. level       = {}", self.ref_level)?;
        writeln!(fmt, "Component        = {}", self.component)?;
        writeln!(fmt, "x0               = {:?}", self.origin)?;
        writeln!(fmt, "x1               = {:?}", self.upper)?;
        writeln!(fmt, "Volume           = {}", self.volume())?;
        writeln!(fmt, "Delta            = {:?}", self.spacing)?;
        writeln!(fmt, "Time             = {:?}", self.time)?;
        write!(fmt, "Iteration        = {:?}", self.iteration)
    }
}




/**
 * Return the lower and upper corners of the smallest box enclosing every
 * grid in the collection.
 */
pub fn common_bounding_box<'a, I>(grids: I) -> Result<(Vec<f64>, Vec<f64>)>
where
    I: IntoIterator<Item = &'a Grid>
{
    let mut grids = grids.into_iter();
    let first = grids.next().ok_or(Error::EmptyCollection("grids"))?;
    let mut lower = first.origin.clone();
    let mut upper = first.upper.clone();

    for grid in grids {
        check_dimensions(lower.len(), grid.num_dimensions())?;

        for axis in 0..lower.len() {
            lower[axis] = lower[axis].min(grid.origin[axis]);
            upper[axis] = upper[axis].max(grid.upper[axis]);
        }
    }
    Ok((lower, upper))
}




/**
 * Return one grid spanning the bounding box of a collection of grids that
 * share a refinement level and a spacing. The component tag of the result is
 * reset, and the time and iteration are kept only when every grid agrees on
 * them.
 */
pub fn merge_uniform_grids<'a, I>(grids: I) -> Result<Grid>
where
    I: IntoIterator<Item = &'a Grid>
{
    let grids: Vec<&Grid> = grids.into_iter().collect();
    let (lower, upper) = common_bounding_box(grids.iter().copied())?;
    let first = grids[0];

    for grid in &grids[1..] {
        if grid.ref_level != first.ref_level {
            return Err(Error::IncompatibleRefinementLevels(first.ref_level, grid.ref_level));
        }
        if !all_close(&grid.spacing, &first.spacing) {
            return Err(Error::IncompatibleSpacing);
        }
    }

    let mut shape = Vec::with_capacity(lower.len());

    for axis in 0..lower.len() {
        let extent = upper[axis] - lower[axis];
        let dx = first.spacing[axis];

        if dx == 0.0 {
            if !close(lower[axis], upper[axis]) {
                return Err(Error::IncompatibleSpacing);
            }
            shape.push(1)
        } else {
            shape.push((extent / dx).round() as usize + 1)
        }
    }

    let mut spec = GridSpec::new(&shape)
        .origin(&lower)
        .spacing(&first.spacing)
        .ref_level(first.ref_level);

    if let Some(time) = first.time {
        if grids.iter().all(|g| g.time == Some(time)) {
            spec = spec.time(time)
        }
    }
    if let Some(iteration) = first.iteration {
        if grids.iter().all(|g| g.iteration == Some(iteration)) {
            spec = spec.iteration(iteration)
        }
    }
    spec.build()
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use crate::error::ErrorKind;

    fn grid(shape: &[usize], origin: &[f64], upper: &[f64]) -> Grid {
        Grid::with_corners(shape, origin, upper).unwrap()
    }

    #[test]
    fn construction_requires_consistent_dimensions() {
        assert!(matches!(
            Grid::with_corners(&[100, 200], &[1.0, 2.0, 3.0], &[2.0, 3.0]),
            Err(Error::DimensionMismatch { expected: 2, found: 3 })));
        assert_eq!(GridSpec::new(&[101, 101]).origin(&[1.0, 1.0]).build(), Err(Error::MissingExtent));
    }

    #[test]
    fn spacing_and_upper_corner_are_derived_from_each_other() {
        let g = grid(&[101, 101], &[1.0, 1.0], &[101.0, 51.0]);
        assert!(all_close(g.spacing(), &[1.0, 0.5]));

        let h = Grid::with_spacing(&[101, 101], &[1.0, 1.0], &[1.0, 0.5]).unwrap();
        assert!(all_close(h.upper_corner(), &[101.0, 51.0]));
        assert_eq!(g, h);
        assert_eq!(g.num_ghost(), &[0, 0]);
        assert_eq!(g.ref_level(), UNTAGGED);
        assert_eq!(g.component(), UNTAGGED);
    }

    #[test]
    fn inconsistent_or_inverted_extents_are_rejected() {
        let both = GridSpec::new(&[101, 51]).origin(&[1.0, 1.0]).upper(&[4.0, 4.0]).spacing(&[1.0, 1.0]).build();
        assert!(matches!(both, Err(Error::InconsistentExtent { .. })));

        let inverted = Grid::with_corners(&[101, 51], &[1.0, 1.0], &[-1.0, -1.0]);
        assert!(matches!(inverted, Err(Error::InvertedCorners { .. })));
        assert_eq!(inverted.unwrap_err().kind(), ErrorKind::Value);
    }

    #[test]
    fn flat_dimensions_force_zero_spacing() {
        let with_spacing = GridSpec::new(&[101, 101, 1])
            .origin(&[1.0, 1.0, 0.0])
            .spacing(&[1.0, 0.5, 0.0])
            .num_ghost(&[3, 3, 3])
            .time(1.0)
            .iteration(1)
            .build()
            .unwrap();
        let with_upper = GridSpec::new(&[101, 101, 1])
            .origin(&[1.0, 1.0, 0.0])
            .upper(&[101.0, 51.0, 1.0])
            .num_ghost(&[3, 3, 3])
            .time(1.0)
            .iteration(1)
            .build()
            .unwrap();

        assert_eq!(with_spacing, with_upper);
        assert_eq!(with_upper.spacing()[2], 0.0);
        assert_eq!(with_upper.upper_corner()[2], 0.0);
        assert_eq!(with_upper.extended_dimensions(), vec![true, true, false]);
        assert_eq!(with_upper.num_extended_dimensions(), 2);
    }

    #[test]
    fn flat_dimensions_ignore_an_inverted_upper_corner() {
        let g = Grid::with_corners(&[5, 1], &[0.0, 5.0], &[1.0, 0.0]).unwrap();
        assert_eq!(g.upper_corner(), &[1.0, 5.0]);
        assert_eq!(g.spacing(), &[0.25, 0.0]);
        assert!(matches!(Grid::with_corners(&[5, 2], &[0.0, 5.0], &[1.0, 0.0]), Err(Error::InvertedCorners { .. })));
    }

    #[test]
    fn volume_element_ignores_flat_dimensions() {
        let g = Grid::with_spacing(&[101, 101, 1], &[1.0, 1.0, 0.0], &[1.0, 0.5, 0.0]).unwrap();
        assert!((g.dv() - 0.5).abs() < 1e-14);
        assert!((g.volume() - 0.5 * 101.0 * 101.0).abs() < 1e-9);
    }

    #[test]
    fn indices_and_coordinates_are_inverse_on_the_lattice() {
        let g = Grid::with_spacing(&[101, 51], &[1.0, 2.0], &[1.0, 0.5]).unwrap();
        assert_eq!(g.indices_to_coordinates(&[1, 3]).unwrap(), vec![2.0, 3.5]);
        assert_eq!(g.coordinates_to_indices(&[2.0, 3.5]).unwrap(), vec![1, 3]);
        assert_eq!(
            g.indices_to_coordinates_many(&[[1_i64, 3], [2, 4]]).unwrap(),
            vec![vec![2.0, 3.5], vec![3.0, 4.0]]);

        for index in &[[0_i64, 0], [17, 23], [100, 50]] {
            let x = g.indices_to_coordinates(index).unwrap();
            assert_eq!(g.coordinates_to_indices(&x).unwrap(), index.to_vec());
        }
        assert!(g.indices_to_coordinates(&[1]).is_err());

        let indices = vec![vec![0_i64, 0], vec![17, 23], vec![100, 50]];
        let points = g.indices_to_coordinates_many(&indices[..]).unwrap();
        assert_eq!(g.coordinates_to_indices_many(&points[..]).unwrap(), indices);
        assert!(g.coordinates_to_indices_many(&[[1.0]]).is_err());
    }

    #[test]
    fn containment_includes_the_corners() {
        let g = grid(&[101, 101], &[1.0, 1.0], &[101.0, 51.0]);
        assert!(g.contains(&[50.0, 50.0]));
        assert!(g.contains(g.origin()));
        assert!(g.contains(g.upper_corner()));
        assert!(!g.contains(&[1.0, 0.0]));
        assert!(!g.contains(&[102.0, 102.0]));
        assert!(!g.contains(&[102.0, 51.0]));
        assert!(!g.contains(&[50.0]));
        assert!(g.covers(&[101.0 + 1e-12, 51.0]));
    }

    #[test]
    fn display_reports_the_ghost_zones() {
        let g = Grid::spec(&[101, 101]).origin(&[1.0, 1.0]).spacing(&[1.0, 0.5]).num_ghost(&[3, 3]).build().unwrap();
        assert!(g.to_string().contains("Num ghost zones  = [3, 3]"));
    }

    #[test]
    fn coordinates_come_in_three_layouts() {
        let g = Grid::with_spacing(&[11, 15], &[1.0, 2.0], &[1.0, 0.5]).unwrap();
        let axes = g.coordinates(CoordinateLayout::Axes);
        assert_eq!(axes[0].len(), 11);
        assert_eq!(axes[1][[14]], 9.0);

        let mesh = g.coordinates(CoordinateLayout::Meshgrid);
        assert_eq!(mesh[0].shape(), &[15, 11]);
        assert_eq!(mesh[0][[3, 4]], 5.0);
        assert_eq!(mesh[1][[3, 4]], 3.5);

        let same = g.coordinates(CoordinateLayout::SameShape);
        assert_eq!(same[0].shape(), g.shape());
        for i in 0..11 {
            assert_eq!(same[0][[i, 0]], axes[0][[i]]);
        }
    }

    #[test]
    fn index_access_requires_a_full_index() {
        let g = Grid::with_spacing(&[11, 15], &[1.0, 1.0], &[1.0, 0.5]).unwrap();
        assert!(matches!(g.at(&[1]), Err(Error::DimensionMismatch { .. })));
        assert_eq!(g.at(&[1, 3]).unwrap(), vec![2.0, 2.5]);
    }

    #[test]
    fn flat_dimensions_and_ghost_zones_can_be_removed() {
        let g = Grid::spec(&[101, 101, 1]).origin(&[1.0, 1.0, 0.0]).spacing(&[1.0, 0.5, 0.0]).num_ghost(&[3, 3, 3]).build().unwrap();
        let expected = Grid::spec(&[101, 101]).origin(&[1.0, 1.0]).spacing(&[1.0, 0.5]).num_ghost(&[3, 3]).build().unwrap();
        assert_eq!(g.flat_dimensions_removed(), expected);

        let g = Grid::spec(&[101, 101]).origin(&[1.0, 1.0]).spacing(&[1.0, 0.5]).num_ghost(&[3, 0]).build().unwrap();
        let expected = Grid::with_spacing(&[95, 101], &[4.0, 1.0], &[1.0, 0.5]).unwrap();
        assert_eq!(g.ghost_zones_removed(), expected);
        assert_eq!(g.ghost_zones_removed().num_ghost(), &[0, 0]);
    }

    #[test]
    fn too_many_ghost_zones_are_rejected() {
        let spec = Grid::spec(&[5, 5]).upper(&[1.0, 1.0]).num_ghost(&[3, 0]);
        assert!(matches!(spec.build(), Err(Error::TooManyGhostZones { axis: 0, .. })));
    }

    #[test]
    fn shifting_moves_both_corners() {
        let g = grid(&[101, 101], &[1.0, 0.0], &[3.0, 10.0]);
        let expected = grid(&[101, 101], &[3.0, -2.0], &[5.0, 8.0]);
        assert_eq!(g.shifted(&[2.0, -2.0]).unwrap(), expected);
        assert!(g.shifted(&[2.0]).is_err());
    }

    #[test]
    fn copies_are_equal_and_independent() {
        let g = grid(&[11, 11], &[0.0, 0.0], &[5.0, 5.0]);
        let h = g.clone();
        assert_eq!(g, h);
        assert_ne!(g.origin().as_ptr(), h.origin().as_ptr());
    }

    #[test]
    fn equality_distinguishes_time_and_iteration() {
        let plain = grid(&[11, 11], &[0.0, 0.0], &[5.0, 5.0]);
        let timed = Grid::spec(&[11, 11]).upper(&[5.0, 5.0]).time(1.0).build().unwrap();
        let counted = Grid::spec(&[11, 11]).upper(&[5.0, 5.0]).iteration(1).build().unwrap();

        assert_ne!(plain, timed);
        assert_ne!(plain, counted);
        assert_eq!(timed, Grid::spec(&[11, 11]).upper(&[5.0, 5.0]).time(1.0).build().unwrap());
        assert_eq!(counted, Grid::spec(&[11, 11]).upper(&[5.0, 5.0]).iteration(1).build().unwrap());
    }

    #[test]
    fn bounding_box_spans_every_grid() {
        let g1 = grid(&[101, 101], &[1.0, 1.0], &[3.0, 5.0]);
        let g2 = grid(&[101], &[1.0], &[3.0]);
        let g3 = grid(&[11, 11], &[0.0, 0.0], &[5.0, 5.0]);
        let g4 = grid(&[11, 11], &[0.0, -2.0], &[1.0, 5.0]);

        assert!(matches!(common_bounding_box(vec![&g1, &g2]), Err(Error::DimensionMismatch { .. })));
        assert!(matches!(common_bounding_box(Vec::<&Grid>::new()), Err(Error::EmptyCollection(_))));

        let (lower, upper) = common_bounding_box(vec![&g1, &g3, &g4]).unwrap();
        assert_eq!(lower, vec![0.0, -2.0]);
        assert_eq!(upper, vec![5.0, 5.0]);

        let (lower, upper) = common_bounding_box(std::iter::once(&g1)).unwrap();
        assert_eq!(lower, g1.origin());
        assert_eq!(upper, g1.upper_corner());
    }

    #[test]
    fn uniform_grids_merge_into_their_bounding_box() {
        let g1 = Grid::spec(&[101, 101]).origin(&[1.0, 1.0]).upper(&[3.0, 5.0]).ref_level(1).build().unwrap();
        let g2 = Grid::spec(&[101, 101]).origin(&[1.0, 1.0]).upper(&[10.0, 5.0]).ref_level(2).build().unwrap();
        let g3 = Grid::spec(&[101, 101]).origin(&[1.0, 1.0]).upper(&[10.0, 5.0]).ref_level(1).build().unwrap();
        let g4 = Grid::spec(&[101, 101]).origin(&[0.0, -2.0]).spacing(g1.spacing()).ref_level(1).build().unwrap();

        assert!(matches!(merge_uniform_grids(vec![&g1, &g2]), Err(Error::IncompatibleRefinementLevels(1, 2))));
        assert_eq!(merge_uniform_grids(vec![&g1, &g3]), Err(Error::IncompatibleSpacing));

        let merged = merge_uniform_grids(vec![&g1, &g4]).unwrap();
        let expected = Grid::spec(&[151, 176]).origin(&[0.0, -2.0]).spacing(g1.spacing()).ref_level(1).build().unwrap();
        assert_eq!(merged, expected);
        assert!(all_close(merged.upper_corner(), &[3.0, 5.0]));
        assert_eq!(merged.component(), UNTAGGED);
    }

    #[test]
    fn grids_survive_a_cbor_round_trip() {
        let g = Grid::spec(&[11, 21, 1]).origin(&[0.0, 1.0, 2.0]).upper(&[1.0, 2.0, 2.0]).ref_level(3).time(0.5).build().unwrap();
        let mut buffer = Vec::new();
        ciborium::ser::into_writer(&g, &mut buffer).unwrap();
        let decoded: Grid = ciborium::de::from_reader(&buffer[..]).unwrap();
        assert_eq!(decoded, g);

        let mut invalid = Vec::new();
        ciborium::ser::into_writer(&GridSpec::new(&[4, 4]), &mut invalid).unwrap();
        assert!(ciborium::de::from_reader::<Grid, _>(&invalid[..]).is_err());
    }
}
