use ndarray::ArrayView2;

/// Magnitude at or below which a QoS entry counts as missing.
pub const EPS: f64 = 1e-8;

/// One observed QoS value at (user, service)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub user: usize,
    pub service: usize,
    pub value: f64,
}

/// Whether a raw matrix entry carries a real observation
#[inline]
pub fn is_observed(value: f64) -> bool {
    value.abs() > EPS
}

/// Collect every observed entry of `observed` in row-major order.
pub fn extract_samples(observed: ArrayView2<f64>) -> Vec<Sample> {
    observed
        .indexed_iter()
        .filter(|(_, &value)| is_observed(value))
        .map(|((user, service), &value)| Sample {
            user,
            service,
            value,
        })
        .collect()
}
