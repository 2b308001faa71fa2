//! Population matrices and the noise samplers used to fill them.
//!
//! A population is an `n × D` row-major matrix: row `j` is the perturbation direction
//! of population member `j`, so every row has the same length as the parameter vector.

use rand::distributions::{Distribution, Normal};
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

#[derive(Clone, Debug, PartialEq)]
/// Dense `rows × dims` matrix of perturbations, stored row-major
pub struct Population {
    rows: usize,
    dims: usize,
    data: Vec<f32>,
}

impl Population {
    /// Returns a matrix of zeros
    pub fn zeros(rows: usize, dims: usize) -> Self {
        Population {
            rows: rows,
            dims: dims,
            data: vec![0f32; rows * dims],
        }
    }

    /// Builds a matrix from explicit rows.  All rows must share a length.
    pub fn from_rows(rows: &[Vec<f32>]) -> Self {
        let dims = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * dims);
        for row in rows {
            assert_eq!(row.len(), dims, "population rows must share a length");
            data.extend_from_slice(row);
        }
        Population {
            rows: rows.len(),
            dims: dims,
            data: data,
        }
    }

    /// Number of population members
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Dimensionality of each member
    #[inline]
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Perturbation of member `j`
    #[inline]
    pub fn row(&self, j: usize) -> &[f32] {
        &self.data[j * self.dims..(j + 1) * self.dims]
    }

    /// Iterates over the rows in member order
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks() panics on a zero size
        self.data.chunks(self.dims.max(1)).take(self.rows)
    }

    /// Writes the jittered point `w + sigma * N[j]` into `out`
    pub fn jitter(&self, j: usize, w: &[f32], sigma: f32, out: &mut [f32]) {
        assert_eq!(w.len(), self.dims);
        assert_eq!(out.len(), self.dims);
        for ((o, wi), ni) in out.iter_mut().zip(w).zip(self.row(j)) {
            *o = wi + sigma * ni;
        }
    }

    /// Computes `Nᵀ·weights`: a length `dims` vector where entry `d` is the sum over
    /// members of `N[j][d] * weights[j]`.  `weights` has one entry per row.
    pub fn transpose_dot(&self, weights: &[f32], out: &mut [f32]) {
        assert_eq!(weights.len(), self.rows);
        assert_eq!(out.len(), self.dims);
        for o in out.iter_mut() {
            *o = 0f32;
        }
        for (row, wj) in self.iter_rows().zip(weights) {
            for (o, n) in out.iter_mut().zip(row) {
                *o += n * wj;
            }
        }
    }
}

/// Source of standard normal noise for the optimizer
pub trait NoiseSampler {
    /// Overwrites every entry of `buf` with an independent N(0, 1) draw
    fn fill(&mut self, buf: &mut [f32]);

    /// Returns a freshly drawn `rows × dims` population
    fn sample(&mut self, rows: usize, dims: usize) -> Population {
        let mut pop = Population::zeros(rows, dims);
        self.fill(&mut pop.data);
        pop
    }

    /// Returns a freshly drawn vector, typically used as a random initial guess
    fn sample_vector(&mut self, dims: usize) -> Vec<f32> {
        let mut v = vec![0f32; dims];
        self.fill(&mut v);
        v
    }
}

/// Gaussian noise sampler around an injectable generator
pub struct GaussianSampler<R: Rng = XorShiftRng> {
    /// Normal distribution to sample from
    n: Normal,
    /// Generator to use when sampling
    rng: R,
}

impl<R: Rng> GaussianSampler<R> {
    /// Wraps the given generator
    pub fn new(rng: R) -> Self {
        GaussianSampler {
            n: Normal::new(0., 1.),
            rng: rng,
        }
    }
}

impl GaussianSampler<XorShiftRng> {
    /// Creates a sampler over a seeded XorShift generator
    pub fn seeded(seed: u64) -> Self {
        GaussianSampler::new(XorShiftRng::seed_from_u64(seed))
    }
}

impl<R: Rng> NoiseSampler for GaussianSampler<R> {
    fn fill(&mut self, buf: &mut [f32]) {
        for x in buf.iter_mut() {
            *x = self.n.sample(&mut self.rng) as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_shape() {
        let mut gs = GaussianSampler::seeded(7);
        let pop = gs.sample(5, 3);
        assert_eq!(pop.rows(), 5);
        assert_eq!(pop.dims(), 3);
        assert_eq!(pop.iter_rows().count(), 5);
        assert!(pop.iter_rows().all(|r| r.len() == 3));
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let a = GaussianSampler::seeded(42).sample(4, 3);
        let b = GaussianSampler::seeded(42).sample(4, 3);
        let c = GaussianSampler::seeded(43).sample(4, 3);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_consecutive_samples_differ() {
        let mut gs = GaussianSampler::seeded(1);
        let a = gs.sample(10, 3);
        let b = gs.sample(10, 3);
        assert_ne!(a, b);
    }

    #[test]
    fn test_standard_normal_moments() {
        let v = GaussianSampler::seeded(3).sample_vector(20000);
        let n = v.len() as f32;
        let mean = v.iter().sum::<f32>() / n;
        let var = v.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n;
        assert!(mean.abs() < 0.05, "mean: {}", mean);
        assert!((var - 1.).abs() < 0.05, "var: {}", var);
    }

    #[test]
    fn test_jitter() {
        let pop = Population::from_rows(&[vec![1., 0.], vec![0., -2.]]);
        let mut out = vec![0f32; 2];
        pop.jitter(1, &[0.5, 0.5], 0.1, &mut out);
        assert!((out[0] - 0.5).abs() < 1e-6);
        assert!((out[1] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_transpose_dot() {
        // 3 members x 2 dims
        let pop = Population::from_rows(&[vec![1., 2.], vec![3., 4.], vec![5., 6.]]);
        let mut out = vec![9f32; 2];
        pop.transpose_dot(&[1., 0., -1.], &mut out);
        assert_eq!(out, vec![-4., -4.]);
    }
}
