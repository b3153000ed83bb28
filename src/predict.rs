use ndarray::{Array2, ArrayView2, ArrayViewMut2};
use serde::{Deserialize, Serialize};

use crate::factors::FactorsRef;
use crate::samples::is_observed;

/// Which cells of the prediction matrix to (re)compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictMode {
    /// Only cells observed in the training matrix; others are left untouched
    ObservedOnly,
    /// Every cell, including the missing ones
    Full,
}

/// Write sigmoid(p[i] + q[j] + U[i]·S[j]) into `out`.
///
/// `observed` decides which cells are written in [`PredictMode::ObservedOnly`];
/// it is not read in [`PredictMode::Full`]. Written values lie in (0, 1) unless
/// a score is large enough for [`sigmoid`](crate::numeric::sigmoid) to
/// saturate, which can only happen with extreme factors.
pub fn predict_into(
    mode: PredictMode,
    observed: ArrayView2<f64>,
    factors: FactorsRef,
    mut out: ArrayViewMut2<f64>,
) {
    debug_assert_eq!(observed.dim(), out.dim());
    for ((i, j), cell) in out.indexed_iter_mut() {
        if mode == PredictMode::Full || is_observed(observed[(i, j)]) {
            *cell = factors.predict(i, j);
        }
    }
}

/// Allocate and fill a full prediction matrix
pub fn predict_full(factors: FactorsRef) -> Array2<f64> {
    let (num_user, num_service) = (factors.u.nrows(), factors.s.nrows());
    Array2::from_shape_fn((num_user, num_service), |(i, j)| factors.predict(i, j))
}
