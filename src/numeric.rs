//! Scalar helpers shared by the optimizer, the loss and the predictor.

/// Logistic link: 1 / (1 + e^-x)
///
/// Mathematically in (0, 1), but f64 saturates: the result is exactly 1.0
/// for x above roughly 37 and exactly 0.0 below roughly -709. Scores that
/// large only come from extreme caller-supplied factors.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Derivative of the logistic link, sigmoid(x) * (1 - sigmoid(x)),
/// written as 1 / (2 + e^-x + e^x) so it stays finite for large |x|.
#[inline]
pub fn grad_sigmoid(x: f64) -> f64 {
    1.0 / (2.0 + (-x).exp() + x.exp())
}

/// Dot product with Neumaier-compensated accumulation.
///
/// The running compensation term carries the low-order bits lost by each
/// addition, which gives the accuracy of a wider accumulator without relying
/// on a platform `long double`.
pub fn dot_product(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let mut sum = 0.0f64;
    let mut comp = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let term = x * y;
        let t = sum + term;
        if sum.abs() >= term.abs() {
            comp += (sum - t) + term;
        } else {
            comp += (term - t) + sum;
        }
        sum = t;
    }
    sum + comp
}

/// Dot product of two ndarray rows; falls back to an element walk when the
/// views are not contiguous.
pub fn dot_rows(a: ndarray::ArrayView1<f64>, b: ndarray::ArrayView1<f64>) -> f64 {
    match (a.as_slice(), b.as_slice()) {
        (Some(x), Some(y)) => dot_product(x, y),
        _ => {
            let x: Vec<f64> = a.iter().copied().collect();
            let y: Vec<f64> = b.iter().copied().collect();
            dot_product(&x, &y)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_sigmoid_values() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-15);
        assert!(sigmoid(10.0) > 0.9999);
        assert!(sigmoid(-10.0) < 1e-4);
        assert!(sigmoid(-10.0) > 0.0);
    }

    #[test]
    fn test_sigmoid_saturates_in_f64() {
        assert!(sigmoid(30.0) < 1.0);
        assert_eq!(sigmoid(40.0), 1.0);
        assert!(sigmoid(-700.0) > 0.0);
        assert_eq!(sigmoid(-800.0), 0.0);
    }

    #[test]
    fn test_grad_sigmoid_matches_closed_form() {
        for &x in &[-5.0, -1.0, -0.1, 0.0, 0.3, 2.0, 7.5] {
            let s = sigmoid(x);
            assert!((grad_sigmoid(x) - s * (1.0 - s)).abs() < 1e-12, "x = {}", x);
        }
        assert!((grad_sigmoid(0.0) - 0.25).abs() < 1e-15);
    }

    #[test]
    fn test_grad_sigmoid_extreme_inputs() {
        // e^800 overflows to inf, the gradient collapses to zero instead of NaN
        assert_eq!(grad_sigmoid(800.0), 0.0);
        assert_eq!(grad_sigmoid(-800.0), 0.0);
    }

    #[test]
    fn test_dot_product_basic() {
        assert_eq!(dot_product(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0);
        assert_eq!(dot_product(&[], &[]), 0.0);
    }

    #[test]
    fn test_dot_product_compensation() {
        // naive left-to-right summation returns 0.0 here
        let a = [1e16, 1.0, -1e16];
        let b = [1.0, 1.0, 1.0];
        assert_eq!(dot_product(&a, &b), 1.0);
    }

    #[test]
    fn test_dot_rows_non_contiguous() {
        let m = array![[1.0, 2.0], [3.0, 4.0]];
        // columns are strided views
        let d = dot_rows(m.column(0), m.column(1));
        assert_eq!(d, 1.0 * 2.0 + 3.0 * 4.0);
        assert_eq!(dot_rows(m.row(0), m.row(1)), 11.0);
    }
}
