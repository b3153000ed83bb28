use ndarray::ArrayView2;

use crate::factors::FactorsRef;
use crate::samples::is_observed;

/// Unnormalized AMF objective:
///
///   sum over observed (i, j) of 0.5 * ((r_ij - pred_ij) / r_ij)^2
///   + 0.5 * lmda * (|U|^2 + |S|^2 + |p|^2 + |q|^2)
///
/// `predicted` only has to be valid on observed cells.
pub fn loss(
    factors: FactorsRef,
    observed: ArrayView2<f64>,
    predicted: ArrayView2<f64>,
    lmda: f64,
) -> f64 {
    debug_assert_eq!(observed.dim(), predicted.dim());
    let cost: f64 = observed
        .iter()
        .zip(predicted.iter())
        .filter(|(&r, _)| is_observed(r))
        .map(|(&r, &pred)| 0.5 * ((r - pred) / r).powi(2))
        .sum();

    cost + 0.5 * lmda * squared_norm(factors)
}

/// Sum of squares over every component of U, S, p and q
pub fn squared_norm(factors: FactorsRef) -> f64 {
    let sq = |v: &f64| v * v;
    factors.u.iter().map(sq).sum::<f64>()
        + factors.s.iter().map(sq).sum::<f64>()
        + factors.p.iter().map(sq).sum::<f64>()
        + factors.q.iter().map(sq).sum::<f64>()
}
