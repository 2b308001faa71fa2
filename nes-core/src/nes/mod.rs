//! Optimizer for Natural Evolutionary Strategies
//!
//! Every iteration samples a fresh `population × D` noise matrix `N`, evaluates the
//! objective at `w + σ·N[j]` for each row, z-whitens the rewards into advantages `A`
//! and applies `w <- w + α / (n·σ) · Nᵀ·A`.  Reports happen every `report_iter`
//! iterations, before that iteration's sampling.

use std::f32;
use std::time::{Duration, SystemTime};

use float_ord::FloatOrd;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::error::{NesError, Result};
use crate::optimizer::*;
use crate::population::{NoiseSampler, Population};

/// What to do when the objective fails on a population member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalFailure {
    /// Stop the run with the error of the lowest failing member
    Abort,
    /// Give failed members the worst reward observed in their population.  The run
    /// still stops if every member failed.
    Penalize,
}

impl Default for EvalFailure {
    fn default() -> Self {
        EvalFailure::Abort
    }
}

// Contains the momentum vector
struct Momentum {
    velocity: Vec<f32>,
    mu: f32,
}

impl Momentum {
    fn update(&mut self, delta: &mut [f32]) {
        for (v, d) in self.velocity.iter_mut().zip(delta.iter_mut()) {
            *v = self.mu * *v + *d;
            *d = *v;
        }
    }
}

/// Settings for Natural ES
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Natural {
    /// Number of perturbations sampled per iteration
    pub population: usize,

    /// Standard deviation of the perturbations
    pub sigma: f32,

    /// Learning rate
    pub alpha: f32,

    /// Number of steps to take before exiting the optimizer
    pub iterations: usize,

    /// Number of iterations between reports
    pub report_iter: usize,

    /// Seed for the noise generator.  The optimizer never reads it: callers build
    /// the sampler from it, e.g. `GaussianSampler::seeded(opt.seed)`.
    pub seed: u64,

    /// When provided, accumulates updates with heavy-ball momentum
    pub momentum: Option<f32>,

    /// When set, uses rank-based fitness shaping instead of z-whitening
    pub shape: bool,

    /// Evaluates the population on the rayon thread pool
    pub parallel: bool,

    /// Policy for objective failures on population members
    pub on_failure: EvalFailure,
}

impl Default for Natural {
    fn default() -> Self {
        Natural {
            population: 50,
            sigma: 0.1,
            alpha: 0.001,
            iterations: 300,
            report_iter: 20,
            seed: 0,
            momentum: None,
            shape: false,
            parallel: false,
            on_failure: EvalFailure::Abort,
        }
    }
}

// True when at least two rewards differ
fn has_spread(scores: &[f32]) -> bool {
    match scores.first() {
        Some(first) => scores.iter().any(|s| s != first),
        None => false,
    }
}

// Population mean and standard deviation (divides by n), accumulated in f64 so wide
// f32 spreads do not overflow
fn mean_std(scores: &[f32]) -> (f64, f64) {
    let n = scores.len() as f64;
    let mu = scores.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = scores.iter().map(|&v| (v as f64 - mu).powi(2)).sum::<f64>() / n;
    (mu, var.sqrt())
}

// Takes a list of scores and performs z-whitening using the population standard
// deviation.  Returns false, zeroing the scores, when the spread is degenerate.
fn normalize_weights(scores: &mut [f32]) -> bool {
    let (mu, std) = mean_std(scores);

    if !has_spread(scores) || !(std > 0f64) || !std.is_finite() {
        for s in scores.iter_mut() {
            *s = 0f32;
        }
        return false;
    }

    // Whiten
    for s in scores.iter_mut() {
        *s = ((*s as f64 - mu) / std) as f32;
    }
    true
}

// Reweights the scores based on rank-based fitness shaping
fn fitness_shape(scores: &mut [f32]) {
    let mut i_scores: Vec<_> = scores.iter().cloned().enumerate().collect();
    i_scores.sort_by_key(|(_i, x)| FloatOrd(-*x));

    let len = scores.len();
    let log_len = (len as f32 / 2. + 1.).ln();
    let mut sum = 0.;
    for (mut rank, (i, _s)) in i_scores.into_iter().enumerate() {
        rank += 1;
        let nom = (0f32).max(log_len - (rank as f32).ln());
        scores[i] = nom;
        sum += nom;
    }
    for s in scores.iter_mut() {
        *s = *s / sum - 1. / len as f32;
    }
}

// Mean, standard deviation and extremes of a population's rewards
fn reward_stats(scores: &[f32]) -> ScoreLogger {
    let (mean, std) = mean_std(scores);
    let min = scores.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

    let mut logger = ScoreLogger::new();
    logger.insert("mean", mean as f32);
    logger.insert("std", std as f32);
    logger.insert("min", min);
    logger.insert("max", max);
    logger
}

// Evaluates one point, treating non-finite rewards as failures
fn checked_eval<O: Objective>(objective: &O, w: &[f32]) -> std::result::Result<f32, BoxError> {
    let reward = objective.eval(w)?;
    if reward.is_finite() {
        Ok(reward)
    } else {
        Err(format!("objective returned non-finite reward {}", reward).into())
    }
}

// Evaluates the current parameters themselves
fn eval_center<O: Objective>(objective: &O, w: &[f32], iteration: usize) -> Result<f32> {
    checked_eval(objective, w).map_err(|source| NesError::CenterEvaluation {
        iteration: iteration,
        source: source,
    })
}

impl Natural {
    /// Checks the hyperparameters and the initial guess against the objective.  Runs
    /// call this before the first iteration.
    pub fn validate<O: Objective>(&self, init: &[f32], objective: &O) -> Result<()> {
        let invalid = |msg: String| Err(NesError::InvalidConfig(msg));

        if self.population < 2 {
            return invalid(format!(
                "population must be at least 2, got {}",
                self.population
            ));
        }
        if !(self.sigma > 0f32) || !self.sigma.is_finite() {
            return invalid(format!("sigma must be finite and positive, got {}", self.sigma));
        }
        if !(self.alpha > 0f32) || !self.alpha.is_finite() {
            return invalid(format!("alpha must be finite and positive, got {}", self.alpha));
        }
        if self.iterations == 0 {
            return invalid("iterations must be positive".to_string());
        }
        if self.report_iter == 0 {
            return invalid("report_iter must be positive".to_string());
        }
        if let Some(mu) = self.momentum {
            if !(mu >= 0f32 && mu < 1f32) {
                return invalid(format!("momentum must lie in [0, 1), got {}", mu));
            }
        }
        if init.is_empty() {
            return invalid("initial guess must not be empty".to_string());
        }
        if init.iter().any(|x| !x.is_finite()) {
            return invalid("initial guess contains non-finite values".to_string());
        }
        match objective.dims() {
            Some(expected) if expected != init.len() => Err(NesError::DimensionMismatch {
                expected: expected,
                actual: init.len(),
            }),
            _ => Ok(()),
        }
    }

    /// Computes the reward of every jittered point `w + σ·N[j]`, returning them in row
    /// order.  Exactly one objective call is made per row.
    pub fn evaluate<O: Objective>(
        &self,
        objective: &O,
        w: &[f32],
        noise: &Population,
        iteration: usize,
    ) -> Result<Vec<f32>> {
        if w.len() != noise.dims() {
            return Err(NesError::DimensionMismatch {
                expected: noise.dims(),
                actual: w.len(),
            });
        }

        let eval_member = |j: usize| {
            let mut w_try = vec![0f32; w.len()];
            noise.jitter(j, w, self.sigma, &mut w_try);
            checked_eval(objective, &w_try)
        };

        // Noise is already drawn, so workers only read it and results keep row order
        let outcomes: Vec<_> = if self.parallel {
            (0..noise.rows()).into_par_iter().map(eval_member).collect()
        } else {
            (0..noise.rows()).map(eval_member).collect()
        };

        let mut rewards = Vec::with_capacity(outcomes.len());
        let mut failed = Vec::new();
        let mut first_error = None;
        for (member, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(r) => rewards.push(r),
                Err(source) => {
                    if self.on_failure == EvalFailure::Abort {
                        return Err(NesError::Evaluation {
                            iteration: iteration,
                            member: member,
                            source: source,
                        });
                    }
                    warn!(
                        "Iteration {}: member {} failed, penalizing: {}",
                        iteration, member, source
                    );
                    failed.push(member);
                    rewards.push(f32::NEG_INFINITY);
                    if first_error.is_none() {
                        first_error = Some((member, source));
                    }
                }
            }
        }

        if !failed.is_empty() {
            if failed.len() == rewards.len() {
                if let Some((member, source)) = first_error {
                    return Err(NesError::Evaluation {
                        iteration: iteration,
                        member: member,
                        source: source,
                    });
                }
            }
            let worst = rewards
                .iter()
                .cloned()
                .filter(|r| r.is_finite())
                .fold(f32::INFINITY, f32::min);
            for j in failed {
                rewards[j] = worst;
            }
        }
        Ok(rewards)
    }

    /// Runs a single iteration on `w` in place, without momentum, returning the
    /// population's reward statistics.
    pub fn step<O, NS>(
        &self,
        w: &mut [f32],
        objective: &O,
        sampler: &mut NS,
        iteration: usize,
    ) -> Result<ScoreLogger>
    where
        O: Objective,
        NS: NoiseSampler,
    {
        self.validate(w, objective)?;
        self.iterate(w, objective, sampler, None, iteration)
    }

    fn iterate<O, NS>(
        &self,
        w: &mut [f32],
        objective: &O,
        sampler: &mut NS,
        mom: Option<&mut Momentum>,
        iteration: usize,
    ) -> Result<ScoreLogger>
    where
        O: Objective,
        NS: NoiseSampler,
    {
        let n = self.population;
        let dims = w.len();

        // n × D, never reused across iterations
        let noise = sampler.sample(n, dims);

        // n rewards, index-aligned with the rows of `noise`
        let mut scores = self.evaluate(objective, w, &noise, iteration)?;
        let stats = reward_stats(&scores);

        let spread = has_spread(&scores);
        let shaped = self.shape && spread;
        if shaped {
            fitness_shape(&mut scores);
        } else if !normalize_weights(&mut scores) {
            if spread {
                warn!(
                    "Iteration {}: reward spread is not finite ({:?}), skipping update",
                    iteration, stats
                );
            } else {
                warn!(
                    "Iteration {}: all {} rewards are equal ({:?}), skipping update",
                    iteration,
                    n,
                    stats.get("mean")
                );
            }
            return Ok(stats);
        }

        // Shaped utilities are already normalized by the population size
        let scale = if shaped {
            self.alpha / self.sigma
        } else {
            self.alpha / (n as f32 * self.sigma)
        };

        // D entries: Nᵀ·A
        let mut delta = vec![0f32; dims];
        noise.transpose_dot(&scores, &mut delta);
        for d in delta.iter_mut() {
            *d *= scale;
        }

        if let Some(m) = mom {
            m.update(&mut delta);
        }

        for (wi, d) in w.iter_mut().zip(&delta) {
            *wi += d;
        }

        debug!("Iteration: {},\tStats: {:?}", iteration, stats);
        Ok(stats)
    }

    /// Runs the optimizer from `init` for `iterations` steps.
    pub fn run<O, NS, R>(
        &self,
        init: Vec<f32>,
        objective: &O,
        sampler: &mut NS,
        reporter: &mut R,
    ) -> Result<State>
    where
        O: Objective,
        NS: NoiseSampler,
        R: Reporter,
    {
        self.run_with_cancel(init, objective, sampler, reporter, &CancelToken::new())
    }

    /// Runs the optimizer, checking `cancel` before every iteration.  A cancelled run
    /// returns the parameters reached so far.
    pub fn run_with_cancel<O, NS, R>(
        &self,
        init: Vec<f32>,
        objective: &O,
        sampler: &mut NS,
        reporter: &mut R,
        cancel: &CancelToken,
    ) -> Result<State>
    where
        O: Objective,
        NS: NoiseSampler,
        R: Reporter,
    {
        self.validate(&init, objective)?;

        let mut w = init;
        let mut mom = self.momentum.map(|mu| Momentum {
            velocity: vec![0f32; w.len()],
            mu: mu,
        });
        let mut stats: Option<ScoreLogger> = None;
        let mut completed = 0;
        let mut cancelled = false;

        let now = SystemTime::now();

        for pass in 0..(self.iterations) {
            if cancel.is_cancelled() {
                info!("Cancelled before iteration {}", pass);
                cancelled = true;
                break;
            }

            if pass % self.report_iter == 0 {
                let reward = eval_center(objective, &w, pass)?;
                reporter.report(&Report {
                    iteration: pass,
                    params: &w,
                    reward: reward,
                    elapsed: now.elapsed().unwrap_or(Duration::from_secs(0)),
                    stats: stats.as_ref(),
                });
            }

            stats = Some(self.iterate(&mut w, objective, sampler, mom.as_mut(), pass)?);
            completed += 1;
        }

        let fitness = eval_center(objective, &w, completed)?;
        Ok(State {
            model: w,
            fitness: fitness,
            iterations: completed,
            cancelled: cancelled,
            logger: stats,
        })
    }
}
