//! Shared test utilities for the solver modules
use ndarray::Array2;
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

use crate::numeric::sigmoid;

/// Values in (0.1, 0.9) with roughly `density` of the cells observed and the
/// rest set to the missing sentinel 0.0.
pub fn random_observed<R: Rng + ?Sized>(
    rows: usize,
    cols: usize,
    density: f64,
    rng: &mut R,
) -> Array2<f64> {
    let values = Array2::random_using((rows, cols), Uniform::new(0.1, 0.9), rng);
    let mask = Array2::random_using((rows, cols), Uniform::new(0.0, 1.0), rng);
    let mut out = values;
    ndarray::Zip::from(&mut out).and(&mask).for_each(|v, &m| {
        if m >= density {
            *v = 0.0;
        }
    });
    out
}

/// Fully observed matrix generated by a rank-`rank` model through the sigmoid
/// link, so that the AMF model can represent it exactly.
pub fn make_low_rank_qos<R: Rng + ?Sized>(
    rows: usize,
    cols: usize,
    rank: usize,
    rng: &mut R,
) -> Array2<f64> {
    let a = Array2::random_using((rows, rank), Uniform::new(-1.0, 1.0), rng);
    let b = Array2::random_using((cols, rank), Uniform::new(-1.0, 1.0), rng);
    a.dot(&b.t()).mapv(sigmoid)
}
