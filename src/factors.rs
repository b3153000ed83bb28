//! Latent factors and bias vectors of the AMF model.
//!
//! `AmfFactors` owns its storage; `FactorsMut` / `FactorsRef` are the borrowed
//! forms the solver, the predictor and the loss operate on, so the same code
//! path serves both owned arrays and caller-provided flat buffers.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2};
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

use crate::error::AmfError;
use crate::numeric::{dot_rows, sigmoid};

/// Owned U (users x dim), S (services x dim), p (users), q (services)
#[derive(Debug, Clone, PartialEq)]
pub struct AmfFactors {
    pub u: Array2<f64>,
    pub s: Array2<f64>,
    pub p: Array1<f64>,
    pub q: Array1<f64>,
}

impl AmfFactors {
    /// All components zero
    pub fn zeros(num_user: usize, num_service: usize, dim: usize) -> Self {
        Self {
            u: Array2::zeros((num_user, dim)),
            s: Array2::zeros((num_service, dim)),
            p: Array1::zeros(num_user),
            q: Array1::zeros(num_service),
        }
    }

    /// Every component drawn from Uniform(0, 1)
    pub fn random<R: Rng + ?Sized>(
        num_user: usize,
        num_service: usize,
        dim: usize,
        rng: &mut R,
    ) -> Self {
        let dist = Uniform::new(0.0, 1.0);
        Self {
            u: Array2::random_using((num_user, dim), dist, rng),
            s: Array2::random_using((num_service, dim), dist, rng),
            p: Array1::random_using(num_user, dist, rng),
            q: Array1::random_using(num_service, dist, rng),
        }
    }

    pub fn num_user(&self) -> usize {
        self.u.nrows()
    }

    pub fn num_service(&self) -> usize {
        self.s.nrows()
    }

    pub fn dim(&self) -> usize {
        self.u.ncols()
    }

    pub fn views_mut(&mut self) -> FactorsMut<'_> {
        FactorsMut {
            u: self.u.view_mut(),
            s: self.s.view_mut(),
            p: self.p.view_mut(),
            q: self.q.view_mut(),
        }
    }

    pub fn views(&self) -> FactorsRef<'_> {
        FactorsRef {
            u: self.u.view(),
            s: self.s.view(),
            p: self.p.view(),
            q: self.q.view(),
        }
    }
}

/// Mutable borrowed factors
#[derive(Debug)]
pub struct FactorsMut<'a> {
    pub u: ArrayViewMut2<'a, f64>,
    pub s: ArrayViewMut2<'a, f64>,
    pub p: ArrayViewMut1<'a, f64>,
    pub q: ArrayViewMut1<'a, f64>,
}

impl<'a> FactorsMut<'a> {
    pub fn view(&self) -> FactorsRef<'_> {
        FactorsRef {
            u: self.u.view(),
            s: self.s.view(),
            p: self.p.view(),
            q: self.q.view(),
        }
    }

    /// Check that U, S, p and q agree with each other and with the observed
    /// matrix shape.
    pub fn check_shapes(&self, num_user: usize, num_service: usize) -> Result<(), AmfError> {
        self.view().check_shapes(num_user, num_service)
    }
}

/// Read-only borrowed factors
#[derive(Debug, Clone, Copy)]
pub struct FactorsRef<'a> {
    pub u: ArrayView2<'a, f64>,
    pub s: ArrayView2<'a, f64>,
    pub p: ArrayView1<'a, f64>,
    pub q: ArrayView1<'a, f64>,
}

impl<'a> FactorsRef<'a> {
    pub fn dim(&self) -> usize {
        self.u.ncols()
    }

    /// Linear score p[i] + q[j] + U[i]·S[j] before the link
    #[inline]
    pub fn score(&self, user: usize, service: usize) -> f64 {
        dot_rows(self.u.row(user), self.s.row(service)) + self.p[user] + self.q[service]
    }

    /// sigmoid(score)
    #[inline]
    pub fn predict(&self, user: usize, service: usize) -> f64 {
        sigmoid(self.score(user, service))
    }

    pub fn check_shapes(&self, num_user: usize, num_service: usize) -> Result<(), AmfError> {
        let dim = self.u.ncols();
        if self.u.nrows() != num_user {
            return Err(AmfError::ShapeMismatch {
                what: "U",
                expected: (num_user, dim),
                actual: self.u.dim(),
            });
        }
        if self.s.dim() != (num_service, dim) {
            return Err(AmfError::ShapeMismatch {
                what: "S",
                expected: (num_service, dim),
                actual: self.s.dim(),
            });
        }
        if self.p.len() != num_user {
            return Err(AmfError::ShapeMismatch {
                what: "p",
                expected: (num_user, 1),
                actual: (self.p.len(), 1),
            });
        }
        if self.q.len() != num_service {
            return Err(AmfError::ShapeMismatch {
                what: "q",
                expected: (num_service, 1),
                actual: (self.q.len(), 1),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_rand::rand::rngs::StdRng;
    use ndarray_rand::rand::SeedableRng;

    #[test]
    fn test_random_in_unit_interval() {
        let mut rng = StdRng::seed_from_u64(42);
        let f = AmfFactors::random(5, 7, 3, &mut rng);
        assert_eq!(f.u.dim(), (5, 3));
        assert_eq!(f.s.dim(), (7, 3));
        assert_eq!(f.p.len(), 5);
        assert_eq!(f.q.len(), 7);
        assert!(f.u.iter().chain(f.s.iter()).all(|&v| (0.0..1.0).contains(&v)));
        assert!(f.p.iter().chain(f.q.iter()).all(|&v| (0.0..1.0).contains(&v)));
    }

    #[test]
    fn test_random_is_seed_deterministic() {
        let a = AmfFactors::random(4, 4, 2, &mut StdRng::seed_from_u64(7));
        let b = AmfFactors::random(4, 4, 2, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_score_and_predict() {
        let f = AmfFactors {
            u: array![[1.0, 2.0]],
            s: array![[0.5, -0.25]],
            p: array![0.1],
            q: array![-0.1],
        };
        let r = f.views();
        assert!((r.score(0, 0) - 0.0).abs() < 1e-15);
        assert!((r.predict(0, 0) - 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_check_shapes() {
        let mut f = AmfFactors::zeros(3, 4, 2);
        assert!(f.views_mut().check_shapes(3, 4).is_ok());
        match f.views().check_shapes(3, 5) {
            Err(AmfError::ShapeMismatch { what, .. }) => assert_eq!(what, "S"),
            other => panic!("Expected S mismatch, got {:?}", other),
        }
        match f.views().check_shapes(2, 4) {
            Err(AmfError::ShapeMismatch { what, .. }) => assert_eq!(what, "U"),
            other => panic!("Expected U mismatch, got {:?}", other),
        }
    }
}
