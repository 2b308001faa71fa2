//! Example Objective
use nes_core::optimizer::{BoxError, Objective, Report, Reporter};

/// Negative squared L2 distance to a fixed solution vector.  The highest reward,
/// 0, is reached exactly at the solution.
pub struct TargetDistance {
    solution: Vec<f32>,
}

impl TargetDistance {
    /// Creates the objective for a given solution
    pub fn new(solution: Vec<f32>) -> Self {
        TargetDistance { solution: solution }
    }

    /// Vector the objective is maximized at
    pub fn solution(&self) -> &[f32] {
        &self.solution
    }
}

impl Objective for TargetDistance {
    fn dims(&self) -> Option<usize> {
        Some(self.solution.len())
    }

    fn eval(&self, w: &[f32]) -> Result<f32, BoxError> {
        if w.len() != self.solution.len() {
            return Err(format!(
                "expected {} parameters, got {}",
                self.solution.len(),
                w.len()
            )
            .into());
        }
        let dist: f32 = self
            .solution
            .iter()
            .zip(w)
            .map(|(s, x)| (s - x).powi(2))
            .sum();
        Ok(-dist)
    }
}

/// Prints every report to stdout alongside the solution being chased
pub struct SolutionReporter {
    solution: Vec<f32>,
}

impl SolutionReporter {
    /// Creates a reporter for a given solution
    pub fn new(solution: &[f32]) -> Self {
        SolutionReporter {
            solution: solution.to_vec(),
        }
    }

    /// Formats one report line
    pub fn line(&self, r: &Report) -> String {
        format!(
            "iter {}. w: {:?}, solution: {:?}, reward: {}",
            r.iteration, r.params, self.solution, r.reward
        )
    }
}

impl Reporter for SolutionReporter {
    fn report(&mut self, r: &Report) {
        println!("{}", self.line(r));
        log::debug!("Elapsed: {:?},\tStats: {:?}", r.elapsed, r.stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use nes_core::nes::Natural;
    use nes_core::optimizer::History;
    use nes_core::population::{GaussianSampler, NoiseSampler};

    #[test]
    fn test_target_distance() {
        let obj = TargetDistance::new(vec![0.5, 0.1, -0.3]);
        assert_eq!(obj.dims(), Some(3));
        assert_eq!(obj.eval(&[0.5, 0.1, -0.3]).unwrap(), 0.);
        assert!((obj.eval(&[0., 0., 0.]).unwrap() + 0.35).abs() < 1e-6);
        assert!(obj.eval(&[0., 0.]).is_err());
    }

    #[test]
    fn test_report_line() {
        let reporter = SolutionReporter::new(&[0.5, 0.1]);
        let params = vec![1f32, 2.];
        let line = reporter.line(&Report {
            iteration: 20,
            params: &params,
            reward: -4.,
            elapsed: Duration::from_secs(0),
            stats: None,
        });
        assert_eq!(line, "iter 20. w: [1.0, 2.0], solution: [0.5, 0.1], reward: -4");
    }

    #[test]
    fn test_example_run_gets_closer() {
        let objective = TargetDistance::new(vec![0.5, 0.1, -0.3]);
        let optimizer = Natural::default();
        let mut sampler = GaussianSampler::seeded(optimizer.seed);
        let init = sampler.sample_vector(3);
        let mut history = History::new();

        let state = optimizer
            .run(init, &objective, &mut sampler, &mut history)
            .unwrap();

        let first = history.reward_at(0).unwrap();
        let late = history.reward_at(280).unwrap();
        assert!(late > first);
        assert!(state.fitness > first);
    }

    #[test]
    fn test_dimension_mismatch_fails_fast() {
        let objective = TargetDistance::new(vec![0.5, 0.1, -0.3]);
        let res = Natural::default().run(
            vec![0f32; 4],
            &objective,
            &mut GaussianSampler::seeded(0),
            &mut History::new(),
        );
        assert!(res.is_err());
    }
}
