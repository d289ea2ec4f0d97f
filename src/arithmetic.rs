use core::ops::{Add, Sub, Mul, Div, Neg, AddAssign, SubAssign, MulAssign, DivAssign};
use ndarray::{ArrayD, ArrayViewD, Zip};
use num_complex::Complex64;
use crate::error::{Error, Result};
use crate::grid_data::GridData;
use crate::scalar::Scalar;




/**
 * The right hand side of a binary operation on a field: a number applied to
 * every sample, an array broadcast against the field's shape, or another
 * field on an identical grid.
 */
pub enum Operand<'a, T: Scalar> {
    Scalar(T),
    Array(ArrayViewD<'a, T>),
    Field(&'a GridData<T>),
}

impl<'a, T: Scalar> From<&'a GridData<T>> for Operand<'a, T> {
    fn from(field: &'a GridData<T>) -> Self {
        Operand::Field(field)
    }
}

impl<'a, T: Scalar> From<&'a ArrayD<T>> for Operand<'a, T> {
    fn from(array: &'a ArrayD<T>) -> Self {
        Operand::Array(array.view())
    }
}

impl<'a, T: Scalar> From<ArrayViewD<'a, T>> for Operand<'a, T> {
    fn from(array: ArrayViewD<'a, T>) -> Self {
        Operand::Array(array)
    }
}




#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
}

impl Comparison {
    fn test(self, a: f64, b: f64) -> bool {
        match self {
            Comparison::Less => a < b,
            Comparison::LessEqual => a <= b,
            Comparison::Greater => a > b,
            Comparison::GreaterEqual => a >= b,
            Comparison::Equal => a == b,
            Comparison::NotEqual => a != b,
        }
    }
}




// ============================================================================
impl<T: Scalar> GridData<T> {

    fn zip_with<U, F>(&self, rhs: Operand<T>, f: F) -> Result<ArrayD<U>>
    where
        F: Fn(T, T) -> U,
    {
        match rhs {
            Operand::Scalar(y) => Ok(self.data().mapv(|x| f(x, y))),
            Operand::Array(array) => {
                let rhs = array.broadcast(self.data().raw_dim()).ok_or_else(|| Error::ShapeMismatch {
                    expected: self.shape().to_vec(),
                    found: array.shape().to_vec(),
                })?;
                Ok(Zip::from(self.data()).and(rhs).map_collect(|&x, &y| f(x, y)))
            }
            Operand::Field(other) => {
                if other.grid() != self.grid() {
                    return Err(Error::IncompatibleGrids);
                }
                Ok(Zip::from(self.data()).and(other.data()).map_collect(|&x, &y| f(x, y)))
            }
        }
    }

    /**
     * Combine this field elementwise with an operand. Fields must share the
     * grid exactly; arrays must broadcast to the field's shape.
     */
    pub fn combine<'a, O, F>(&self, rhs: O, f: F) -> Result<Self>
    where
        O: Into<Operand<'a, T>>,
        F: Fn(T, T) -> T,
    {
        let data = self.zip_with(rhs.into(), f)?;
        Ok(Self::from_parts(self.grid().clone(), data))
    }

    /**
     * Like `combine`, but overwrites this field's samples.
     */
    pub fn combine_in_place<'a, O, F>(&mut self, rhs: O, f: F) -> Result<()>
    where
        O: Into<Operand<'a, T>>,
        F: Fn(T, T) -> T,
    {
        let data = self.zip_with(rhs.into(), f)?;
        *self.data_mut() = data;
        Ok(())
    }

    /**
     * Raise every sample to the power given by the operand.
     */
    pub fn pow<'a, O: Into<Operand<'a, T>>>(&self, exponent: O) -> Result<Self> {
        self.combine(exponent, T::pow)
    }
}

impl GridData<f64> {

    /**
     * Compare the field elementwise against an operand.
     */
    pub fn compare<'a, O: Into<Operand<'a, f64>>>(&self, rhs: O, comparison: Comparison) -> Result<ArrayD<bool>> {
        self.zip_with(rhs.into(), |a, b| comparison.test(a, b))
    }
}




// ============================================================================
macro_rules! field_binary_op {
    ($op:ident, $method:ident, $assign_op:ident, $assign_method:ident, $symbol:tt) => {

        impl<'a, T: Scalar> $op<&'a GridData<T>> for &'a GridData<T> {
            type Output = Result<GridData<T>>;

            fn $method(self, rhs: &'a GridData<T>) -> Self::Output {
                self.combine(rhs, |x, y| x $symbol y)
            }
        }

        impl<'a, T: Scalar> $op<T> for &'a GridData<T> {
            type Output = GridData<T>;

            fn $method(self, rhs: T) -> Self::Output {
                self.map(|x| x $symbol rhs)
            }
        }

        impl<T: Scalar> $op<T> for GridData<T> {
            type Output = GridData<T>;

            fn $method(mut self, rhs: T) -> Self::Output {
                self.map_in_place(|x| x $symbol rhs);
                self
            }
        }

        impl<T: Scalar> $assign_op<T> for GridData<T> {
            fn $assign_method(&mut self, rhs: T) {
                self.map_in_place(|x| x $symbol rhs)
            }
        }
    };
}

field_binary_op!(Add, add, AddAssign, add_assign, +);
field_binary_op!(Sub, sub, SubAssign, sub_assign, -);
field_binary_op!(Mul, mul, MulAssign, mul_assign, *);
field_binary_op!(Div, div, DivAssign, div_assign, /);




macro_rules! scalar_lhs_op {
    ($scalar:ty, $op:ident, $method:ident, $symbol:tt) => {
        impl $op<GridData<$scalar>> for $scalar {
            type Output = GridData<$scalar>;

            fn $method(self, mut rhs: GridData<$scalar>) -> Self::Output {
                rhs.map_in_place(|x| self $symbol x);
                rhs
            }
        }

        impl<'a> $op<&'a GridData<$scalar>> for $scalar {
            type Output = GridData<$scalar>;

            fn $method(self, rhs: &'a GridData<$scalar>) -> Self::Output {
                rhs.map(|x| self $symbol x)
            }
        }
    };
}

scalar_lhs_op!(f64, Add, add, +);
scalar_lhs_op!(f64, Sub, sub, -);
scalar_lhs_op!(f64, Mul, mul, *);
scalar_lhs_op!(f64, Div, div, /);
scalar_lhs_op!(Complex64, Add, add, +);
scalar_lhs_op!(Complex64, Sub, sub, -);
scalar_lhs_op!(Complex64, Mul, mul, *);
scalar_lhs_op!(Complex64, Div, div, /);




// ============================================================================
impl<T: Scalar> Neg for GridData<T> {
    type Output = GridData<T>;

    fn neg(mut self) -> Self::Output {
        self.map_in_place(|x| -x);
        self
    }
}

impl<'a, T: Scalar> Neg for &'a GridData<T> {
    type Output = GridData<T>;

    fn neg(self) -> Self::Output {
        self.map(|x| -x)
    }
}
