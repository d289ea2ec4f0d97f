use core::fmt::Debug;
use core::ops::{Add, Sub, Mul, Div, Neg};
use num_complex::{Complex64, ComplexFloat};
use num_traits::Zero;




/**
 * The sample type of a grid field: either a real number (`f64`) or a complex
 * number (`Complex64`). The elementary functions, the real and imaginary
 * parts, the modulus and the conjugate come from `ComplexFloat`. Complex
 * values are handled as a pair of real parts wherever an algorithm is only
 * defined for reals (interpolation, ordering).
 */
pub trait Scalar:
    Copy
    + Debug
    + PartialEq
    + Send
    + Sync
    + 'static
    + Zero
    + ComplexFloat<Real = f64>
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + Mul<f64, Output = Self>
    + Div<f64, Output = Self>
{
    const IS_COMPLEX: bool;

    /**
     * Build a value from its real and imaginary parts. Real scalars discard
     * the imaginary part.
     */
    fn from_parts(re: f64, im: f64) -> Self;

    /// Raise to a power of the same type.
    fn pow(self, exponent: Self) -> Self;
}

impl Scalar for f64 {
    const IS_COMPLEX: bool = false;

    fn from_parts(re: f64, _im: f64) -> Self {
        re
    }

    fn pow(self, exponent: Self) -> Self {
        self.powf(exponent)
    }
}

impl Scalar for Complex64 {
    const IS_COMPLEX: bool = true;

    fn from_parts(re: f64, im: f64) -> Self {
        Complex64::new(re, im)
    }

    fn pow(self, exponent: Self) -> Self {
        self.powc(exponent)
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use num_complex::{Complex64, ComplexFloat};
    use super::Scalar;

    #[test]
    fn complex_parts_survive_construction() {
        let z = <Complex64 as Scalar>::from_parts(1.5, -2.0);
        assert_eq!(ComplexFloat::re(z), 1.5);
        assert_eq!(ComplexFloat::im(z), -2.0);
        assert_eq!(ComplexFloat::abs(Complex64::new(3.0, 4.0)), 5.0);
        assert!((Scalar::pow(Complex64::new(0.0, 1.0), Complex64::new(2.0, 0.0)) - Complex64::new(-1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn real_scalars_drop_the_imaginary_part() {
        assert_eq!(<f64 as Scalar>::from_parts(2.0, 7.0), 2.0);
        assert_eq!(ComplexFloat::im(2.0_f64), 0.0);
        assert_eq!(Scalar::pow(2.0_f64, 3.0), 8.0);
        assert!(!f64::IS_COMPLEX && Complex64::IS_COMPLEX);
    }
}
