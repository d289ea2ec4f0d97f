use ndarray::{ArrayD, ArrayViewMut1, Axis};
use crate::scalar::Scalar;




/**
 * Replace the values along one lane by their first derivative, with lattice
 * spacing `h`. The interior uses second order central differences and the
 * two ends second order one-sided differences. Lanes of two points get a
 * first order difference and lanes of one point a zero derivative.
 */
fn differentiate_lane<T: Scalar>(mut lane: ArrayViewMut1<T>, h: f64) {
    let n = lane.len();

    match n {
        0 => {}
        1 => lane[0] = T::zero(),
        2 => {
            let d = (lane[1] - lane[0]) / h;
            lane[0] = d;
            lane[1] = d;
        }
        _ => {
            let f: Vec<T> = lane.iter().copied().collect();

            lane[0] = (f[0] * -3.0 + f[1] * 4.0 - f[2]) / (2.0 * h);
            lane[n - 1] = (f[n - 1] * 3.0 - f[n - 2] * 4.0 + f[n - 3]) / (2.0 * h);

            for i in 1..n - 1 {
                lane[i] = (f[i + 1] - f[i - 1]) / (2.0 * h);
            }
        }
    }
}




/**
 * Differentiate an array `order` times along the given axis, in place.
 */
pub fn partial_derivative<T: Scalar>(data: &mut ArrayD<T>, axis: usize, spacing: f64, order: usize) {
    for _ in 0..order {
        for lane in data.lanes_mut(Axis(axis)) {
            differentiate_lane(lane, spacing)
        }
    }
}
