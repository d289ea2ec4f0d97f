use std::error;
use std::fmt;




/**
 * Coarse classification of an [`Error`]: whether the caller handed over the
 * wrong kind of argument, or a well-formed argument with an unacceptable
 * value.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Type,
    Value,
}




#[derive(Clone, Debug, PartialEq)]

/**
 * Error to represent invalid grid geometry, incompatible operands, or an
 * unsupported numerical configuration.
 */
pub enum Error {
    DimensionMismatch { expected: usize, found: usize },
    ShapeMismatch { expected: Vec<usize>, found: Vec<usize> },
    EmptyCollection(&'static str),
    MissingExtent,
    InconsistentExtent { spacing: Vec<f64>, upper: Vec<f64> },
    InvertedCorners { origin: Vec<f64>, upper: Vec<f64> },
    InvalidSpacing(String),
    TooManyGhostZones { axis: usize, shape: usize, ghost: usize },
    IncompatibleGrids,
    IncompatibleRefinementLevels(i32, i32),
    IncompatibleSpacing,
    OutOfDomain(Vec<f64>),
    AxisOutOfRange { axis: usize, num_dimensions: usize },
    UnsupportedInterpolationOrder(usize),
    UnknownExtrapolation(String),
    ComplexData,
    InvalidPercentile(f64),
    InvalidBinning(String),
    AmbiguousAggregate(&'static str),
    MissingLevel(i32),
    MissingComponent { level: i32, component: usize },
    LevelMismatch { left: Vec<i32>, right: Vec<i32> },
    ComponentMismatch(i32),
    ArityMismatch { expected: usize, found: usize },
    InvalidOperationName(String),
    UnknownOperation(String),
    InvalidArguments(String),
}




// ============================================================================
impl Error {

    /**
     * Return whether this error stems from the kind of an argument or from
     * its value.
     */
    pub fn kind(&self) -> ErrorKind {
        use Error::*;

        match self {
            ArityMismatch { .. } | InvalidOperationName(_) | InvalidArguments(_) => ErrorKind::Type,
            _ => ErrorKind::Value,
        }
    }
}




// ============================================================================
impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Error::*;

        match self {
            DimensionMismatch { expected, found } => write!(fmt, "expected {} dimensions, found {}", expected, found),
            ShapeMismatch { expected, found } => write!(fmt, "expected shape {:?}, found {:?}", expected, found),
            EmptyCollection(what) => write!(fmt, "empty collection of {}", what),
            MissingExtent => write!(fmt, "either the upper corner or the spacing must be given"),
            InconsistentExtent { spacing, upper } => write!(fmt, "spacing {:?} is incompatible with upper corner {:?}", spacing, upper),
            InvertedCorners { origin, upper } => write!(fmt, "upper corner {:?} lies below origin {:?}", upper, origin),
            InvalidSpacing(msg) => write!(fmt, "invalid spacing: {}", msg),
            TooManyGhostZones { axis, shape, ghost } => write!(fmt, "{} ghost zones on each side leave no points on axis {} of length {}", ghost, axis, shape),
            IncompatibleGrids => write!(fmt, "incompatible grids"),
            IncompatibleRefinementLevels(a, b) => write!(fmt, "incompatible refinement levels {} and {}", a, b),
            IncompatibleSpacing => write!(fmt, "grids have different spacing"),
            OutOfDomain(point) => write!(fmt, "point {:?} lies outside the grid", point),
            AxisOutOfRange { axis, num_dimensions } => write!(fmt, "axis {} out of range for {} dimensions", axis, num_dimensions),
            UnsupportedInterpolationOrder(k) => write!(fmt, "interpolation order {} is not supported (only 0 and 1)", k),
            UnknownExtrapolation(name) => write!(fmt, "unknown extrapolation policy: {}", name),
            ComplexData => write!(fmt, "operation requires real data"),
            InvalidPercentile(q) => write!(fmt, "percentile {} is out of range", q),
            InvalidBinning(msg) => write!(fmt, "invalid binning: {}", msg),
            AmbiguousAggregate(what) => write!(fmt, "{} is not defined for a level with multiple components", what),
            MissingLevel(level) => write!(fmt, "refinement level {} not available", level),
            MissingComponent { level, component } => write!(fmt, "refinement level {} has no component {}", level, component),
            LevelMismatch { left, right } => write!(fmt, "refinement levels {:?} and {:?} differ", left, right),
            ComponentMismatch(level) => write!(fmt, "components at refinement level {} differ", level),
            ArityMismatch { expected, found } => write!(fmt, "function takes {} arguments, grid has {} dimensions", found, expected),
            InvalidOperationName(name) => write!(fmt, "{:?} is not a valid operation name", name),
            UnknownOperation(name) => write!(fmt, "unknown operation: {}", name),
            InvalidArguments(msg) => write!(fmt, "invalid arguments: {}", msg),
        }
    }
}

impl error::Error for Error {}




pub type Result<T> = std::result::Result<T, Error>;
