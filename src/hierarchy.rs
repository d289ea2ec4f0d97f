use core::ops::{Add, Sub, Mul, Div, Neg, AddAssign, SubAssign, MulAssign, DivAssign};
use std::collections::BTreeMap;
use std::fmt;
use log::debug;
use ndarray::{ArrayD, Dimension, IxDyn, Slice};
use crate::error::{Error, Result};
use crate::grid::{close, common_bounding_box, merge_uniform_grids, all_close, CoordinateLayout, Grid, GridSpec, UNTAGGED};
use crate::grid_data::GridData;
use crate::scalar::Scalar;
use crate::spline::{Extrapolation, Interpolation, Method};




/**
 * The data at one refinement level: either a single field covering the
 * whole level, or the separate patches that could not be merged into one
 * rectangle, in their original order.
 */
#[derive(Clone, Debug, PartialEq)]
pub enum Level<T: Scalar> {
    Single(GridData<T>),
    Multi(Vec<GridData<T>>),
}




// ============================================================================
impl<T: Scalar> Level<T> {

    /**
     * The fields of this level as a slice, one element for a single field.
     */
    pub fn fields(&self) -> &[GridData<T>] {
        match self {
            Level::Single(field) => std::slice::from_ref(field),
            Level::Multi(fields) => fields,
        }
    }

    fn fields_mut(&mut self) -> &mut [GridData<T>] {
        match self {
            Level::Single(field) => std::slice::from_mut(field),
            Level::Multi(fields) => fields,
        }
    }

    /**
     * Iterate over the fields of this level with their component index; the
     * index is `None` for a single field.
     */
    pub fn components(&self) -> impl Iterator<Item = (Option<usize>, &GridData<T>)> + '_ {
        let multi = matches!(self, Level::Multi(_));
        self.fields().iter().enumerate().map(move |(c, f)| (Some(c).filter(|_| multi), f))
    }

    pub fn len(&self) -> usize {
        match self {
            Level::Single(_) => 1,
            Level::Multi(fields) => fields.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /**
     * Return the single field of this level, or `None` if the level is made
     * of several patches.
     */
    pub fn single(&self) -> Option<&GridData<T>> {
        match self {
            Level::Single(field) => Some(field),
            Level::Multi(_) => None,
        }
    }

    pub fn component(&self, index: usize) -> Option<&GridData<T>> {
        match self {
            Level::Single(field) => Some(field).filter(|_| index == 0),
            Level::Multi(fields) => fields.get(index),
        }
    }

    fn map<U, F>(&self, f: F) -> Result<Level<U>>
    where
        U: Scalar,
        F: Fn(&GridData<T>) -> Result<GridData<U>>,
    {
        Ok(match self {
            Level::Single(field) => Level::Single(f(field)?),
            Level::Multi(fields) => Level::Multi(fields.iter().map(f).collect::<Result<_>>()?),
        })
    }

    /**
     * Spacing shared by every patch of the level.
     */
    fn common_spacing(&self) -> Result<Vec<f64>> {
        let fields = self.fields();
        let spacing = fields.first().ok_or(Error::EmptyCollection("components"))?.spacing();

        if fields.iter().all(|f| all_close(f.spacing(), spacing)) {
            Ok(spacing.to_vec())
        } else {
            Err(Error::IncompatibleSpacing)
        }
    }
}




/**
 * Attempt to assemble patches of one refinement level into a single field.
 * This succeeds only if the patches share a spacing, sit on a common lattice,
 * and tile their bounding box exactly, with neither gaps nor overlaps.
 */
fn merge_patches<T: Scalar>(patches: &[GridData<T>]) -> Option<GridData<T>> {
    let grid = merge_uniform_grids(patches.iter().map(GridData::grid)).ok()?;

    if patches.iter().map(|p| p.grid().num_points()).sum::<usize>() != grid.num_points() {
        return None;
    }

    let mut data = ArrayD::from_elem(IxDyn(grid.shape()), T::zero());
    let mut covered = ArrayD::from_elem(IxDyn(grid.shape()), false);

    for patch in patches {
        let mut offset = Vec::with_capacity(grid.num_dimensions());

        for axis in 0..grid.num_dimensions() {
            let dx = grid.spacing()[axis];
            let shift = patch.origin()[axis] - grid.origin()[axis];
            let i = if dx == 0.0 { 0.0 } else { (shift / dx).round() };

            if !close(grid.origin()[axis] + i * dx, patch.origin()[axis]) {
                return None;
            }
            offset.push(i as usize);
        }
        let region = |ax: ndarray::AxisDescription| {
            let k = ax.axis.index();
            Slice::from(offset[k]..offset[k] + patch.shape()[k])
        };
        let mut mask = covered.slice_each_axis_mut(region);

        if mask.iter().any(|&c| c) {
            return None;
        }
        mask.map_inplace(|c| *c = true);
        data.slice_each_axis_mut(region).assign(patch.data());
    }
    Some(GridData::from_parts(grid, data))
}




/**
 * Parse check for operation names: an ASCII letter or underscore followed by
 * letters, digits and underscores.
 */
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}

fn index_argument(x: f64, what: &str) -> Result<usize> {
    if x >= 0.0 && x.fract() == 0.0 && x.is_finite() {
        Ok(x as usize)
    } else {
        Err(Error::InvalidArguments(format!("{} must be a non-negative integer, got {}", what, x)))
    }
}




/**
 * A field operation that can be applied to every component of a
 * hierarchy by name.
 */
#[derive(Clone, Debug, PartialEq)]
pub enum ComponentOperation {
    Copy,
    PartialDerived { axis: usize, order: usize },
    ChangedSpacing(Vec<f64>),
    GhostZonesRemoved,
    FlatDimensionsRemoved,
    Conjugated,
    Negated,
}




// ============================================================================
impl ComponentOperation {

    /**
     * Resolve an operation from its name and numeric arguments.
     */
    pub fn parse(name: &str, args: &[f64]) -> Result<Self> {
        if !is_identifier(name) {
            return Err(Error::InvalidOperationName(name.to_string()));
        }
        let no_arguments = |operation: Self| {
            if args.is_empty() {
                Ok(operation)
            } else {
                Err(Error::InvalidArguments(format!("{} takes no arguments", name)))
            }
        };

        match name {
            "copy" => no_arguments(ComponentOperation::Copy),
            "ghost_zones_removed" => no_arguments(ComponentOperation::GhostZonesRemoved),
            "flat_dimensions_removed" => no_arguments(ComponentOperation::FlatDimensionsRemoved),
            "conjugated" => no_arguments(ComponentOperation::Conjugated),
            "negated" => no_arguments(ComponentOperation::Negated),
            "partial_derived" => match args {
                [axis] => Ok(ComponentOperation::PartialDerived { axis: index_argument(*axis, "axis")?, order: 1 }),
                [axis, order] => Ok(ComponentOperation::PartialDerived {
                    axis: index_argument(*axis, "axis")?,
                    order: index_argument(*order, "order")?,
                }),
                _ => Err(Error::InvalidArguments("partial_derived takes an axis and an optional order".into())),
            },
            "changed_spacing" if args.is_empty() => Err(Error::InvalidArguments("changed_spacing needs a spacing".into())),
            "changed_spacing" => Ok(ComponentOperation::ChangedSpacing(args.to_vec())),
            _ => Err(Error::UnknownOperation(name.to_string())),
        }
    }

    pub fn apply<T: Scalar>(&self, field: &GridData<T>) -> Result<GridData<T>> {
        match self {
            ComponentOperation::Copy => Ok(field.clone()),
            ComponentOperation::PartialDerived { axis, order } => field.partial_derived(*axis, *order),
            ComponentOperation::ChangedSpacing(spacing) => field.changed_spacing(spacing),
            ComponentOperation::GhostZonesRemoved => Ok(field.ghost_zones_removed()),
            ComponentOperation::FlatDimensionsRemoved => Ok(field.flat_dimensions_removed()),
            ComponentOperation::Conjugated => Ok(field.conj()),
            ComponentOperation::Negated => Ok(-field),
        }
    }
}




/**
 * Fields on an adaptive mesh: a set of refinement levels, each holding one
 * field or several patches. Ghost zones are stripped on construction, and
 * the patches of a level are merged into one field whenever they tile a
 * rectangle. Point queries are answered by the finest level that covers the
 * point.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct HierarchicalGridData<T: Scalar = f64> {
    levels: BTreeMap<i32, Level<T>>,
}




// ============================================================================
impl<T: Scalar> HierarchicalGridData<T> {

    /**
     * Build a hierarchy from fields at arbitrary refinement levels. The
     * collection must be non-empty and every field must have the same
     * number of dimensions.
     */
    pub fn new(fields: Vec<GridData<T>>) -> Result<Self> {
        let num_dimensions = fields.first().ok_or(Error::EmptyCollection("grid fields"))?.num_dimensions();
        let mut grouped: BTreeMap<i32, Vec<GridData<T>>> = BTreeMap::new();

        for field in fields {
            if field.num_dimensions() != num_dimensions {
                return Err(Error::DimensionMismatch { expected: num_dimensions, found: field.num_dimensions() });
            }
            grouped.entry(field.ref_level()).or_default().push(field.ghost_zones_removed());
        }

        let levels = grouped
            .into_iter()
            .map(|(level, mut patches)| {
                if patches.len() == 1 {
                    return (level, Level::Single(patches.remove(0)));
                }
                match merge_patches(&patches) {
                    Some(merged) => {
                        debug!("refinement level {}: merged {} components into one", level, patches.len());
                        (level, Level::Single(merged))
                    }
                    None => {
                        debug!("refinement level {}: keeping {} separate components", level, patches.len());
                        (level, Level::Multi(patches))
                    }
                }
            })
            .collect();

        Ok(Self { levels })
    }

    fn from_levels(levels: BTreeMap<i32, Level<T>>) -> Self {
        Self { levels }
    }

    /**
     * Iterate over (refinement level, component, field), coarsest level
     * first.
     */
    pub fn iter(&self) -> impl Iterator<Item = (i32, Option<usize>, &GridData<T>)> + '_ {
        self.iter_from_coarsest()
    }

    pub fn iter_from_coarsest(&self) -> impl Iterator<Item = (i32, Option<usize>, &GridData<T>)> + '_ {
        self.levels
            .iter()
            .flat_map(|(&level, entry)| entry.components().map(move |(c, f)| (level, c, f)))
    }

    pub fn iter_from_finest(&self) -> impl Iterator<Item = (i32, Option<usize>, &GridData<T>)> + '_ {
        self.levels
            .iter()
            .rev()
            .flat_map(|(&level, entry)| entry.components().map(move |(c, f)| (level, c, f)))
    }

    pub fn refinement_levels(&self) -> Vec<i32> {
        self.levels.keys().copied().collect()
    }

    pub fn fields(&self) -> Vec<&GridData<T>> {
        self.iter().map(|(_, _, f)| f).collect()
    }

    pub fn first_component(&self) -> Option<&GridData<T>> {
        self.iter().next().map(|(_, _, f)| f)
    }

    /**
     * Return the number of refinement levels.
     */
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level(&self, level: i32) -> Result<&Level<T>> {
        self.levels.get(&level).ok_or(Error::MissingLevel(level))
    }

    /**
     * Mutable access to one field of a level: component 0 of a single-field
     * level, or the given patch of a level of several.
     */
    pub fn component_mut(&mut self, level: i32, component: usize) -> Result<&mut GridData<T>> {
        self.levels
            .get_mut(&level)
            .ok_or(Error::MissingLevel(level))?
            .fields_mut()
            .get_mut(component)
            .ok_or(Error::MissingComponent { level, component })
    }

    pub fn finest_level(&self) -> i32 {
        self.levels.keys().next_back().copied().unwrap_or(UNTAGGED)
    }

    pub fn coarsest_level(&self) -> i32 {
        self.levels.keys().next().copied().unwrap_or(UNTAGGED)
    }

    pub fn max_refinement_level(&self) -> i32 {
        self.finest_level()
    }

    fn single_at_level(&self, level: i32, what: &'static str) -> Result<&GridData<T>> {
        self.level(level)?.single().ok_or(Error::AmbiguousAggregate(what))
    }

    /**
     * Return the spacing at a refinement level made of a single field.
     */
    pub fn spacing_at_level(&self, level: i32) -> Result<Vec<f64>> {
        Ok(self.single_at_level(level, "spacing")?.spacing().to_vec())
    }

    pub fn coarsest_spacing(&self) -> Result<Vec<f64>> {
        self.spacing_at_level(self.coarsest_level())
    }

    pub fn finest_spacing(&self) -> Result<Vec<f64>> {
        self.spacing_at_level(self.finest_level())
    }

    /**
     * Return the lower corner of the coarsest level, which must be a single
     * field.
     */
    pub fn origin(&self) -> Result<Vec<f64>> {
        Ok(self.single_at_level(self.coarsest_level(), "origin")?.origin().to_vec())
    }

    pub fn upper_corner(&self) -> Result<Vec<f64>> {
        Ok(self.single_at_level(self.coarsest_level(), "upper corner")?.upper_corner().to_vec())
    }

    /**
     * Return the time shared by every field, or `None` if the fields
     * disagree or carry no time.
     */
    pub fn time(&self) -> Option<f64> {
        let time = self.first_component()?.time()?;
        self.iter().all(|(_, _, f)| f.time() == Some(time)).then(|| time)
    }

    pub fn iteration(&self) -> Option<i64> {
        let iteration = self.first_component()?.iteration()?;
        self.iter().all(|(_, _, f)| f.iteration() == Some(iteration)).then(|| iteration)
    }

    pub fn num_dimensions(&self) -> usize {
        self.first_component().map_or(0, GridData::num_dimensions)
    }

    pub fn num_extended_dimensions(&self) -> usize {
        self.first_component().map_or(0, GridData::num_extended_dimensions)
    }

    pub fn is_complex(&self) -> bool {
        T::IS_COMPLEX
    }
}




// ============================================================================
impl<T: Scalar> HierarchicalGridData<T> {

    /**
     * Return the refinement level, and the component for a level of
     * several patches, of the finest field that covers the point.
     */
    pub fn finest_component_at_point(&self, point: &[f64]) -> Result<(i32, Option<usize>)> {
        if point.len() != self.num_dimensions() {
            return Err(Error::DimensionMismatch { expected: self.num_dimensions(), found: point.len() });
        }
        self.iter_from_finest()
            .find(|(_, _, f)| f.grid().covers(point))
            .map(|(level, component, _)| (level, component))
            .ok_or_else(|| Error::OutOfDomain(point.to_vec()))
    }

    fn field_at(&self, level: i32, component: Option<usize>) -> Result<&GridData<T>> {
        let entry = self.level(level)?;
        let component = component.unwrap_or(0);
        entry.component(component).ok_or(Error::MissingComponent { level, component })
    }

    /**
     * Interpolate at a point using the finest field that covers it.
     */
    pub fn evaluate(&self, point: &[f64]) -> Result<T> {
        let (level, component) = self.finest_component_at_point(point)?;
        let interpolation = Interpolation::new(Method::Linear, Extrapolation::Extend);
        self.field_at(level, component)?.evaluate(point, interpolation)
    }

    pub fn evaluate_many<P: AsRef<[f64]>>(&self, points: &[P]) -> Result<Vec<T>> {
        points.iter().map(|point| self.evaluate(point.as_ref())).collect()
    }

    /**
     * Sample the hierarchy at every lattice point of a grid, each point
     * taken from the finest field that covers it.
     */
    pub fn evaluate_on(&self, grid: &Grid) -> Result<GridData<T>> {
        let values = ndarray::indices(IxDyn(grid.shape()))
            .into_iter()
            .map(|index| self.evaluate(&grid.coordinates_of(index.slice())))
            .collect::<Result<Vec<T>>>()?;

        let data = ArrayD::from_shape_vec(IxDyn(grid.shape()), values)
            .map_err(|_| Error::ShapeMismatch { expected: grid.shape().to_vec(), found: vec![] })?;

        GridData::new(grid.clone(), data)
    }

    /**
     * Resample the whole hierarchy onto one grid spanning its bounding box,
     * at the spacing of the coarsest level.
     */
    pub fn merge_refinement_levels(&self) -> Result<GridData<T>> {
        let spacing = self.level(self.coarsest_level())?.common_spacing()?;
        self.merge_refinement_levels_with_spacing(&spacing)
    }

    /**
     * Resample the whole hierarchy onto one grid spanning its bounding box,
     * at the given spacing. The grid is untagged, and carries the time and
     * iteration only if every field agrees on them.
     */
    pub fn merge_refinement_levels_with_spacing(&self, spacing: &[f64]) -> Result<GridData<T>> {
        let (lower, upper) = common_bounding_box(self.iter().map(|(_, _, f)| f.grid()))?;

        if spacing.len() != lower.len() {
            return Err(Error::DimensionMismatch { expected: lower.len(), found: spacing.len() });
        }
        let mut shape = Vec::with_capacity(spacing.len());

        for (axis, (&dx, (x0, x1))) in spacing.iter().zip(lower.iter().zip(&upper)).enumerate() {
            let extent = x1 - x0;

            if !dx.is_finite() || dx < 0.0 || (dx == 0.0 && extent > 0.0) {
                return Err(Error::InvalidSpacing(format!("spacing {} on axis {}", dx, axis)));
            }
            if dx == 0.0 {
                shape.push(1)
            } else {
                let n = extent / dx;
                shape.push(if close(n, n.round()) { n.round() as usize + 1 } else { n.floor() as usize + 1 })
            }
        }

        let mut spec = GridSpec::new(&shape).origin(&lower).spacing(spacing);

        if let Some(time) = self.time() {
            spec = spec.time(time)
        }
        if let Some(iteration) = self.iteration() {
            spec = spec.iteration(iteration)
        }
        self.evaluate_on(&spec.build()?)
    }
}




// ============================================================================
impl<T: Scalar> HierarchicalGridData<T> {

    /**
     * Apply a fallible function to every field, keeping the level and
     * component structure.
     */
    pub fn map_components<U, F>(&self, f: F) -> Result<HierarchicalGridData<U>>
    where
        U: Scalar,
        F: Fn(&GridData<T>) -> Result<GridData<U>>,
    {
        let levels = self
            .levels
            .iter()
            .map(|(&level, entry)| Ok::<_, Error>((level, entry.map(&f)?)))
            .collect::<Result<_>>()?;

        Ok(HierarchicalGridData::from_levels(levels))
    }

    pub fn map_components_in_place<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&mut GridData<T>) -> Result<()>,
    {
        for entry in self.levels.values_mut() {
            for field in entry.fields_mut() {
                f(field)?;
            }
        }
        Ok(())
    }

    /**
     * Apply a function to every sample of every field.
     */
    pub fn map_values<U, F>(&self, f: F) -> HierarchicalGridData<U>
    where
        U: Scalar,
        F: Fn(T) -> U,
    {
        let levels = self
            .levels
            .iter()
            .map(|(&level, entry)| {
                let entry = match entry {
                    Level::Single(field) => Level::Single(field.map(&f)),
                    Level::Multi(fields) => Level::Multi(fields.iter().map(|field| field.map(&f)).collect()),
                };
                (level, entry)
            })
            .collect();

        HierarchicalGridData::from_levels(levels)
    }

    pub fn map_values_in_place<F>(&mut self, f: F)
    where
        F: Fn(T) -> T,
    {
        for entry in self.levels.values_mut() {
            for field in entry.fields_mut() {
                field.map_in_place(&f)
            }
        }
    }

    /**
     * Apply a field operation, identified by name, to every component.
     */
    pub fn apply_named_component_operation(&self, name: &str, args: &[f64]) -> Result<Self> {
        let operation = ComponentOperation::parse(name, args)?;
        self.map_components(|field| operation.apply(field))
    }

    /**
     * Combine two hierarchies component by component. They must have the
     * same refinement levels, and each level the same number of patches on
     * the same grids.
     */
    pub fn combine<F>(&self, other: &Self, f: F) -> Result<Self>
    where
        F: Fn(T, T) -> T,
    {
        if self.refinement_levels() != other.refinement_levels() {
            return Err(Error::LevelMismatch { left: self.refinement_levels(), right: other.refinement_levels() });
        }
        let levels = self
            .levels
            .iter()
            .zip(other.levels.values())
            .map(|((&level, a), b)| {
                let entry = match (a, b) {
                    (Level::Single(a), Level::Single(b)) => Level::Single(a.combine(b, &f)?),
                    (Level::Multi(a), Level::Multi(b)) if a.len() == b.len() => Level::Multi(a
                        .iter()
                        .zip(b)
                        .map(|(a, b)| a.combine(b, &f))
                        .collect::<Result<_>>()?),
                    _ => return Err(Error::ComponentMismatch(level)),
                };
                Ok((level, entry))
            })
            .collect::<Result<_>>()?;

        Ok(Self::from_levels(levels))
    }

    pub fn partial_derive(&mut self, axis: usize, order: usize) -> Result<()> {
        self.map_components_in_place(|field| field.partial_derive(axis, order))
    }

    pub fn partial_derived(&self, axis: usize, order: usize) -> Result<Self> {
        self.map_components(|field| field.partial_derived(axis, order))
    }

    /**
     * Return one hierarchy of partial derivatives per dimension.
     */
    pub fn gradient(&self, order: usize) -> Result<Vec<Self>> {
        (0..self.num_dimensions()).map(|axis| self.partial_derived(axis, order)).collect()
    }

    /**
     * Return one hierarchy per dimension holding the coordinate along that
     * dimension.
     */
    pub fn coordinates(&self) -> Result<Vec<HierarchicalGridData<f64>>> {
        (0..self.num_dimensions())
            .map(|axis| {
                self.map_components(|field| {
                    let mut x = field.grid().coordinates(CoordinateLayout::SameShape);
                    Ok(GridData::from_parts(field.grid().clone(), x.swap_remove(axis)))
                })
            })
            .collect()
    }
}




// ============================================================================
impl HierarchicalGridData<f64> {

    pub fn min(&self) -> f64 {
        self.iter().map(|(_, _, f)| f.min()).fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.iter().map(|(_, _, f)| f.max()).fold(f64::NEG_INFINITY, f64::max)
    }
}




// ============================================================================
macro_rules! hierarchy_binary_op {
    ($op:ident, $method:ident, $assign_op:ident, $assign_method:ident, $symbol:tt) => {

        impl<'a, T: Scalar> $op<&'a HierarchicalGridData<T>> for &'a HierarchicalGridData<T> {
            type Output = Result<HierarchicalGridData<T>>;

            fn $method(self, rhs: &'a HierarchicalGridData<T>) -> Self::Output {
                self.combine(rhs, |x, y| x $symbol y)
            }
        }

        impl<'a, T: Scalar> $op<T> for &'a HierarchicalGridData<T> {
            type Output = HierarchicalGridData<T>;

            fn $method(self, rhs: T) -> Self::Output {
                self.map_values(|x| x $symbol rhs)
            }
        }

        impl<T: Scalar> $op<T> for HierarchicalGridData<T> {
            type Output = HierarchicalGridData<T>;

            fn $method(mut self, rhs: T) -> Self::Output {
                self.map_values_in_place(|x| x $symbol rhs);
                self
            }
        }

        impl<T: Scalar> $assign_op<T> for HierarchicalGridData<T> {
            fn $assign_method(&mut self, rhs: T) {
                self.map_values_in_place(|x| x $symbol rhs)
            }
        }
    };
}

hierarchy_binary_op!(Add, add, AddAssign, add_assign, +);
hierarchy_binary_op!(Sub, sub, SubAssign, sub_assign, -);
hierarchy_binary_op!(Mul, mul, MulAssign, mul_assign, *);
hierarchy_binary_op!(Div, div, DivAssign, div_assign, /);

impl<T: Scalar> Neg for HierarchicalGridData<T> {
    type Output = HierarchicalGridData<T>;

    fn neg(mut self) -> Self::Output {
        self.map_values_in_place(|x| -x);
        self
    }
}

impl<'a, T: Scalar> Neg for &'a HierarchicalGridData<T> {
    type Output = HierarchicalGridData<T>;

    fn neg(self) -> Self::Output {
        self.map_values(|x| -x)
    }
}




// ============================================================================
impl<T: Scalar> fmt::Display for HierarchicalGridData<T> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(fmt, "Available refinement levels (components):")?;

        for (level, entry) in &self.levels {
            writeln!(fmt, "{} ({})", level, entry.len())?;
        }
        let (coarsest, finest) = (self.coarsest_level(), self.finest_level());
        let spacing = |level| match self.level(level).and_then(Level::common_spacing) {
            Ok(dx) => format!("{:?}", dx),
            Err(_) => "mixed".to_string(),
        };

        writeln!(fmt, "Spacing at coarsest level ({}): {}", coarsest, spacing(coarsest))?;
        write!(fmt, "Spacing at finest level ({}): {}", finest, spacing(finest))
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use std::f64::consts::PI;
    use crate::error::{Error, ErrorKind};
    use crate::grid::Grid;
    use crate::grid_data::GridData;
    use crate::sampling::{sample_function, sample_function_over_grid};
    use super::*;

    fn product(x: f64, y: f64) -> f64 {
        x * (y + 2.0)
    }

    fn neg_product(x: f64, y: f64) -> f64 {
        -x * (y + 2.0)
    }

    fn tagged(shape: &[usize], origin: &[f64], upper: &[f64], level: i32) -> Grid {
        Grid::spec(shape).origin(origin).upper(upper).ref_level(level).build().unwrap()
    }

    fn quadrants() -> Vec<Grid> {
        vec![
            tagged(&[4, 5], &[0.0, 1.0], &[3.0, 5.0], 0),
            tagged(&[11, 21], &[4.0, 6.0], &[14.0, 26.0], 0),
            tagged(&[11, 5], &[4.0, 1.0], &[14.0, 5.0], 0),
            tagged(&[4, 21], &[0.0, 6.0], &[3.0, 26.0], 0),
        ]
    }

    fn sampled(grids: &[Grid]) -> Vec<GridData> {
        grids.iter().map(|g| sample_function_over_grid(product, g).unwrap()).collect()
    }

    fn full() -> GridData {
        sample_function_over_grid(product, &tagged(&[15, 26], &[0.0, 1.0], &[14.0, 26.0], 0)).unwrap()
    }

    fn full_level2() -> GridData {
        sample_function_over_grid(product, &tagged(&[15, 26], &[0.0, 1.0], &[14.0, 26.0], 2)).unwrap()
    }

    fn merged() -> HierarchicalGridData {
        HierarchicalGridData::new(sampled(&quadrants())).unwrap()
    }

    fn two_components() -> HierarchicalGridData {
        HierarchicalGridData::new(sampled(&quadrants()[..2])).unwrap()
    }

    #[test]
    fn construction_rejects_empty_or_mixed_input() {
        crate::test_logging();

        assert!(matches!(HierarchicalGridData::<f64>::new(vec![]), Err(Error::EmptyCollection(_))));

        let line = sample_function(|x: f64| x, &[101], &[0.0], &[3.0]).unwrap();
        let plane = sample_function(|x: f64, y: f64| x * y, &[101, 101], &[0.0, 0.0], &[3.0, 3.0]).unwrap();
        assert!(matches!(HierarchicalGridData::new(vec![line, plane]), Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn fields_are_grouped_by_refinement_level() {
        let line = sample_function(|x: f64| x, &[101], &[0.0], &[3.0]).unwrap();
        let one = HierarchicalGridData::new(vec![line.clone()]).unwrap();
        assert_eq!(one.refinement_levels(), vec![-1]);
        assert_eq!(one.level(-1).unwrap(), &Level::Single(line.clone()));

        let fine = sample_function_over_grid(|x: f64| x, &tagged(&[101], &[0.0], &[3.0], 2)).unwrap();
        let two = HierarchicalGridData::new(vec![line, fine.clone()]).unwrap();
        assert_eq!(two.refinement_levels(), vec![-1, 2]);
        assert_eq!(two.level(2).unwrap().single(), Some(&fine));
    }

    #[test]
    fn ghost_zones_are_stripped_on_construction() {
        let g = Grid::spec(&[21, 21]).upper(&[20.0, 20.0]).num_ghost(&[2, 2]).ref_level(0).build().unwrap();
        let field = sample_function_over_grid(product, &g).unwrap();
        let hierarchy = HierarchicalGridData::new(vec![field.clone()]).unwrap();
        assert_eq!(hierarchy.level(0).unwrap().single(), Some(&field.ghost_zones_removed()));
        assert_eq!(hierarchy.origin().unwrap(), vec![2.0, 2.0]);
    }

    #[test]
    fn tiling_patches_are_merged() {
        crate::test_logging();

        assert_eq!(merged().level(0).unwrap(), &Level::Single(full()));
        assert_eq!(HierarchicalGridData::new(vec![full()]).unwrap(), merged());

        let separate = two_components();
        assert_eq!(separate.level(0).unwrap(), &Level::Multi(sampled(&quadrants()[..2])));
        assert_eq!(separate.level(0).unwrap().len(), 2);
    }

    #[test]
    fn overlapping_patches_are_not_merged() {
        let patch = |shape: &[usize], origin: &[f64]| {
            Grid::spec(shape).origin(origin).spacing(&[1.0, 1.0]).ref_level(0).build().unwrap()
        };
        let grids = vec![
            patch(&[2, 3], &[0.0, 0.0]),
            patch(&[3, 2], &[1.0, 0.0]),
            patch(&[2, 2], &[2.0, 2.0]),
        ];
        let hierarchy = HierarchicalGridData::new(sampled(&grids)).unwrap();
        assert_eq!(hierarchy.level(0).unwrap().len(), 3);
        assert_eq!(hierarchy.level(0).unwrap().single(), None);
    }

    #[test]
    fn properties_of_the_hierarchy() {
        let mut fields = sampled(&quadrants());
        fields.push(full_level2());
        let hierarchy = HierarchicalGridData::new(fields).unwrap();

        assert_eq!(hierarchy.len(), 2);
        assert_eq!(hierarchy.refinement_levels(), vec![0, 2]);
        assert_eq!(hierarchy.fields(), vec![&full(), &full_level2()]);
        assert_eq!(hierarchy.first_component(), Some(&full()));
        assert_eq!(hierarchy.finest_level(), 2);
        assert_eq!(hierarchy.max_refinement_level(), 2);
        assert_eq!(hierarchy.coarsest_level(), 0);
        assert!(!hierarchy.is_complex());
        assert_eq!(hierarchy.origin().unwrap(), full().origin());
        assert_eq!(hierarchy.upper_corner().unwrap(), full().upper_corner());
        assert_eq!(hierarchy.spacing_at_level(0).unwrap(), vec![1.0, 1.0]);
        assert_eq!(hierarchy.coarsest_spacing().unwrap(), vec![1.0, 1.0]);
        assert_eq!(hierarchy.finest_spacing().unwrap(), vec![1.0, 1.0]);
        assert_eq!(hierarchy.num_dimensions(), 2);
        assert_eq!(hierarchy.num_extended_dimensions(), 2);
        assert_eq!(hierarchy.time(), None);
        assert_eq!(hierarchy.iteration(), None);
        assert_eq!(hierarchy.level(1).unwrap_err(), Error::MissingLevel(1));
    }

    #[test]
    fn aggregates_over_several_patches_are_ambiguous() {
        let separate = two_components();
        assert_eq!(separate.origin(), Err(Error::AmbiguousAggregate("origin")));
        assert!(matches!(separate.upper_corner(), Err(Error::AmbiguousAggregate(_))));
        assert!(matches!(separate.spacing_at_level(0), Err(Error::AmbiguousAggregate(_))));
        assert_eq!(separate.origin().unwrap_err().kind(), ErrorKind::Value);
    }

    #[test]
    fn time_and_iteration_need_agreement() {
        let a = Grid::spec(&[5]).upper(&[1.0]).ref_level(0).time(1.0).iteration(4).build().unwrap();
        let b = Grid::spec(&[5]).upper(&[1.0]).ref_level(1).time(1.0).iteration(4).build().unwrap();
        let c = Grid::spec(&[5]).upper(&[1.0]).ref_level(2).time(2.0).iteration(4).build().unwrap();
        let f = |g: &Grid| sample_function_over_grid(|x: f64| x, g).unwrap();

        let agreeing = HierarchicalGridData::new(vec![f(&a), f(&b)]).unwrap();
        assert_eq!(agreeing.time(), Some(1.0));
        assert_eq!(agreeing.iteration(), Some(4));

        let disagreeing = HierarchicalGridData::new(vec![f(&a), f(&b), f(&c)]).unwrap();
        assert_eq!(disagreeing.time(), None);
        assert_eq!(disagreeing.iteration(), Some(4));
    }

    #[test]
    fn equality_and_copies() {
        let level2 = HierarchicalGridData::new(vec![full_level2()]).unwrap();
        let both = HierarchicalGridData::new(vec![full(), full_level2()]).unwrap();
        assert_ne!(merged(), level2);
        assert_ne!(merged(), both);

        let separate = two_components();
        let mut copy = separate.clone();
        assert_eq!(copy, separate);

        copy *= 2.0;
        assert_ne!(copy, separate);
    }

    #[test]
    fn iteration_order_and_component_indices() {
        for (level, component, _) in merged().iter() {
            assert_eq!((level, component), (0, None));
        }
        let indices: Vec<_> = two_components().iter().map(|(l, c, _)| (l, c)).collect();
        assert_eq!(indices, vec![(0, Some(0)), (0, Some(1))]);

        let coarse = tagged(&[81, 3], &[0.0, 0.0], &[2.0 * PI, 1.0], 0);
        let fine = tagged(&[11, 3], &[0.0, 0.0], &[2.0 * PI, 1.0], 1);
        let sine = |x: f64, _y: f64| x.sin();
        let hierarchy = HierarchicalGridData::new(vec![
            sample_function_over_grid(sine, &coarse).unwrap(),
            sample_function_over_grid(sine, &fine).unwrap(),
        ]).unwrap();

        let levels: Vec<_> = hierarchy.iter_from_finest().map(|(l, c, _)| (l, c)).collect();
        assert_eq!(levels, vec![(1, None), (0, None)]);
    }

    #[test]
    fn reductions_and_unary_operations() {
        assert_eq!(merged().min(), 0.0);
        assert_eq!(two_components().min(), 0.0);
        assert_eq!(merged().max(), 14.0 * 28.0);

        let negated = HierarchicalGridData::new(vec![
            sample_function_over_grid(neg_product, &tagged(&[15, 26], &[0.0, 1.0], &[14.0, 26.0], 0)).unwrap(),
        ]).unwrap();
        assert_eq!(-merged(), negated);

        let separate = two_components();
        let mut flipped = separate.clone();
        for component in 0..2 {
            flipped.component_mut(0, component).unwrap().map_in_place(|x| -x);
        }
        assert_eq!(flipped.component_mut(0, 2).unwrap_err(), Error::MissingComponent { level: 0, component: 2 });
        assert_eq!(flipped.component_mut(3, 0).unwrap_err(), Error::MissingLevel(3));
        assert_eq!(-&separate, flipped);
    }

    #[test]
    fn binary_operations_need_matching_structure() {
        let negated = HierarchicalGridData::new(vec![
            sample_function_over_grid(neg_product, &tagged(&[15, 26], &[0.0, 1.0], &[14.0, 26.0], 0)).unwrap(),
        ]).unwrap();

        let mut zero = (&merged() + &negated).unwrap();
        zero += 0.0;
        assert_eq!(zero.level(0).unwrap().single().unwrap().abs().max(), 0.0);

        let level2 = HierarchicalGridData::new(vec![full_level2()]).unwrap();
        assert!(matches!(&merged() + &level2, Err(Error::LevelMismatch { .. })));
        assert_eq!(&merged() + &two_components(), Err(Error::ComponentMismatch(0)));

        let separate = two_components();
        let zero = (&separate + &(-&separate)).unwrap();
        for (_, _, field) in zero.iter() {
            assert_eq!(field.abs().max(), 0.0);
        }
    }

    #[test]
    fn points_are_located_on_the_finest_level() {
        let mut fields = sampled(&quadrants());
        fields.push(full_level2());
        let hierarchy = HierarchicalGridData::new(fields).unwrap();

        assert!(matches!(hierarchy.finest_component_at_point(&[0.0]), Err(Error::DimensionMismatch { .. })));
        assert!(matches!(hierarchy.finest_component_at_point(&[1000.0, 200.0]), Err(Error::OutOfDomain(_))));
        assert_eq!(hierarchy.finest_component_at_point(&[3.0, 4.0]).unwrap(), (2, None));

        let separate = two_components();
        assert_eq!(separate.finest_component_at_point(&[3.0, 4.0]).unwrap(), (0, Some(0)));
        assert_eq!(separate.finest_component_at_point(&[14.0, 26.0]).unwrap(), (0, Some(1)));
        assert!(separate.finest_component_at_point(&[3.5, 4.0]).is_err());
    }

    #[test]
    fn evaluation_uses_the_covering_patch() {
        for hierarchy in &[merged(), two_components()] {
            assert!((hierarchy.evaluate(&[2.0, 3.0]).unwrap() - 10.0).abs() < 1e-12);

            let values = hierarchy.evaluate_many(&[[2.0, 3.0], [3.0, 2.0]]).unwrap();
            assert!((values[0] - 10.0).abs() < 1e-12);
            assert!((values[1] - 12.0).abs() < 1e-12);
        }
        let grid = Grid::with_corners(&[3, 5], &[0.0, 1.0], &[2.0, 5.0]).unwrap();
        let expected = sample_function_over_grid(product, &grid).unwrap();
        assert_eq!(two_components().evaluate_on(&grid).unwrap(), expected);
    }

    #[test]
    fn refinement_levels_merge_onto_one_grid() {
        let patches = vec![
            tagged(&[4, 5], &[0.0, 1.0], &[3.0, 5.0], 1),
            tagged(&[11, 21], &[4.0, 6.0], &[14.0, 26.0], 1),
        ];
        let mut fields = sampled(&patches);
        fields.push(sample_function_over_grid(product, &tagged(&[16, 26], &[0.0, 1.0], &[30.0, 51.0], 0)).unwrap());
        let hierarchy = HierarchicalGridData::new(fields).unwrap();

        let coarse = hierarchy.merge_refinement_levels().unwrap();
        let expected = sample_function(product, &[16, 26], &[0.0, 1.0], &[30.0, 51.0]).unwrap();
        assert_eq!(coarse, expected);
        assert_eq!(coarse.ref_level(), -1);
        assert_eq!(coarse.component(), -1);

        let fine = hierarchy.merge_refinement_levels_with_spacing(&[1.0, 1.0]).unwrap();
        let expected = sample_function(product, &[31, 51], &[0.0, 1.0], &[30.0, 51.0]).unwrap();
        assert_eq!(fine, expected);
    }

    #[test]
    fn coordinates_follow_the_structure() {
        for hierarchy in &[merged(), two_components()] {
            let coordinates = hierarchy.coordinates().unwrap();
            assert_eq!(coordinates.len(), 2);
            assert!((coordinates[0].evaluate(&[2.0, 3.0]).unwrap() - 2.0).abs() < 1e-12);
            assert!((coordinates[1].evaluate(&[2.0, 3.0]).unwrap() - 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn display_lists_levels_and_spacing() {
        let expected = "Available refinement levels (components):\n\
                        0 (2)\n\
                        Spacing at coarsest level (0): [1.0, 1.0]\n\
                        Spacing at finest level (0): [1.0, 1.0]";
        assert_eq!(two_components().to_string(), expected);
    }

    #[test]
    fn display_marks_levels_of_mixed_spacing() {
        let coarse = Grid::spec(&[5, 5]).spacing(&[1.0, 1.0]).ref_level(0).build().unwrap();
        let fine = Grid::spec(&[5, 5]).origin(&[10.0, 10.0]).spacing(&[0.5, 0.5]).ref_level(0).build().unwrap();
        let hierarchy = HierarchicalGridData::new(sampled(&[coarse, fine])).unwrap();
        assert_eq!(hierarchy.level(0).unwrap().len(), 2);

        let expected = "Available refinement levels (components):\n\
                        0 (2)\n\
                        Spacing at coarsest level (0): mixed\n\
                        Spacing at finest level (0): mixed";
        assert_eq!(format!("{}", hierarchy), expected);
        assert_eq!(hierarchy.merge_refinement_levels(), Err(Error::IncompatibleSpacing));
    }

    #[test]
    fn merging_needs_a_usable_spacing() {
        let square = Grid::with_corners(&[5, 5], &[0.0, 0.0], &[4.0, 4.0]).unwrap();
        let hierarchy = HierarchicalGridData::new(sampled(&[square])).unwrap();

        for spacing in &[[-1.0, f64::NAN], [1.0, f64::NAN], [1.0, -1.0], [0.0, 1.0], [f64::INFINITY, 1.0]] {
            assert!(matches!(hierarchy.merge_refinement_levels_with_spacing(spacing), Err(Error::InvalidSpacing(_))));
        }
        assert!(matches!(hierarchy.merge_refinement_levels_with_spacing(&[1.0]), Err(Error::DimensionMismatch { .. })));
        assert_eq!(hierarchy.merge_refinement_levels_with_spacing(&[2.0, 0.5]).unwrap().shape(), &[3, 9]);
    }

    #[test]
    fn derivatives_are_taken_on_every_component() {
        let coarse = tagged(&[8001, 3], &[0.0, 0.0], &[2.0 * PI, 1.0], 0);
        let fine = tagged(&[10001, 3], &[0.0, 0.0], &[2.0 * PI, 1.0], 1);
        let sine = |x: f64, _y: f64| x.sin();
        let original = HierarchicalGridData::new(vec![
            sample_function_over_grid(sine, &coarse).unwrap(),
            sample_function_over_grid(sine, &fine).unwrap(),
        ]).unwrap();

        let mut derived = original.clone();
        derived.partial_derive(0, 2).unwrap();

        for ((_, _, d2), (_, _, f)) in derived.iter().zip(original.iter()) {
            assert!(d2.data().iter().zip(f.data().iter()).all(|(a, b)| (a + b).abs() < 1e-3));
        }
        assert_eq!(original.gradient(2).unwrap()[0], derived);
        assert_eq!(original.apply_named_component_operation("partial_derived", &[0.0, 2.0]).unwrap(), derived);
    }

    #[test]
    fn named_operations_are_resolved_before_use() {
        let hierarchy = merged();

        let invalid = hierarchy.apply_named_component_operation("1x", &[]);
        assert_eq!(invalid, Err(Error::InvalidOperationName("1x".into())));
        assert_eq!(invalid.unwrap_err().kind(), ErrorKind::Type);

        assert_eq!(hierarchy.apply_named_component_operation("lol", &[]), Err(Error::UnknownOperation("lol".into())));
        assert!(matches!(hierarchy.apply_named_component_operation("copy", &[1.0]), Err(Error::InvalidArguments(_))));
        assert!(matches!(hierarchy.apply_named_component_operation("partial_derived", &[0.5]), Err(Error::InvalidArguments(_))));

        assert_eq!(hierarchy.apply_named_component_operation("copy", &[]).unwrap(), hierarchy);
        assert_eq!(hierarchy.apply_named_component_operation("negated", &[]).unwrap(), -&hierarchy);

        let halved = hierarchy.apply_named_component_operation("changed_spacing", &[0.5, 0.5]).unwrap();
        assert_eq!(halved.level(0).unwrap().single().unwrap().shape(), &[29, 51]);
    }
}
