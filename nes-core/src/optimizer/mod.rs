//! Objective contract, optimizer state and reporting hooks shared by the optimizers

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hashbrown::HashMap;

/// Error type objectives report failures with
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fitness function which evaluates a parameter vector.
///
/// The optimizer calls `eval` once per population member per iteration, plus once
/// on the current parameters at every report.  Implementations must be deterministic
/// within a run for results to be reproducible under a fixed seed.
pub trait Objective: Sync {
    /// Number of parameters the objective expects, if it knows.  When provided, the
    /// optimizer rejects initial guesses of any other length before iterating.
    fn dims(&self) -> Option<usize> {
        None
    }

    /// Evaluates a given parameter vector, returning the reward.
    /// Higher is better.
    fn eval(&self, w: &[f32]) -> Result<f32, BoxError>;
}

/// Adapts an infallible closure into an [`Objective`] of unknown dimensionality
pub struct FnObjective<F>(pub F);

impl<F> Objective for FnObjective<F>
where
    F: Fn(&[f32]) -> f32 + Sync,
{
    fn eval(&self, w: &[f32]) -> Result<f32, BoxError> {
        Ok((self.0)(w))
    }
}

#[derive(Clone, Default)]
/// Logger for outputting scores
pub struct ScoreLogger {
    /// Score name to score value
    counts: HashMap<String, f32>,
}

impl ScoreLogger {
    /// Returns a new, empty ScoreLogger
    pub fn new() -> ScoreLogger {
        ScoreLogger {
            counts: HashMap::new(),
        }
    }

    #[inline]
    /// Adds a score
    pub fn insert(&mut self, key: &str, value: f32) {
        self.counts.insert(key.to_string(), value);
    }

    #[inline]
    /// Gets a score
    pub fn get(&self, key: &str) -> Option<f32> {
        self.counts.get(key).cloned()
    }
}

impl Debug for ScoreLogger {
    /// Prints the scores
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // sort counts
        let mut data: Vec<(&String, &f32)> = self.counts.iter().collect();
        data.sort_by_key(|(k, _v)| *k);
        write!(f, "{:?}", data)
    }
}

#[derive(Clone, Debug)]
/// Final state of a run
pub struct State {
    /// Parameter vector the optimizer ended on
    pub model: Vec<f32>,
    /// Reward of `model`
    pub fitness: f32,
    /// Number of iterations that completed
    pub iterations: usize,
    /// Whether the run stopped because its cancel token fired
    pub cancelled: bool,
    /// Population statistics from the last completed iteration
    pub logger: Option<ScoreLogger>,
}

/// Snapshot of the optimizer handed to a [`Reporter`]
pub struct Report<'a> {
    /// Iteration about to run
    pub iteration: usize,
    /// Current parameter vector
    pub params: &'a [f32],
    /// Reward of `params` itself, not of a population member
    pub reward: f32,
    /// Time since the run started
    pub elapsed: Duration,
    /// Reward statistics of the previous iteration's population
    pub stats: Option<&'a ScoreLogger>,
}

/// Observes the optimizer every `report_iter` iterations.  Reporters only see
/// shared references and cannot change the optimizer's state.
pub trait Reporter {
    /// Called with the current snapshot
    fn report(&mut self, report: &Report);
}

/// Reporter which discards everything
pub struct NoReport;

impl Reporter for NoReport {
    fn report(&mut self, _report: &Report) {}
}

/// Reporter which writes each snapshot to the `log` facade at info level
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&mut self, r: &Report) {
        log::info!(
            "Time: {}.{:03},\tIteration: {},\tFitness: {},\tParams: {:?},\tStats: {:?}",
            r.elapsed.as_secs(),
            r.elapsed.subsec_millis(),
            r.iteration,
            r.reward,
            r.params,
            r.stats
        );
    }
}

#[derive(Clone, Debug, PartialEq)]
/// A single recorded report
pub struct Snapshot {
    /// Iteration the report was taken at
    pub iteration: usize,
    /// Copy of the parameter vector
    pub params: Vec<f32>,
    /// Reward of the parameter vector
    pub reward: f32,
}

#[derive(Clone, Debug, Default)]
/// Reporter which records every snapshot it sees
pub struct History {
    /// Recorded snapshots, in iteration order
    pub entries: Vec<Snapshot>,
}

impl History {
    /// Returns an empty history
    pub fn new() -> Self {
        History::default()
    }

    /// Reward recorded at a given iteration, if one was reported
    pub fn reward_at(&self, iteration: usize) -> Option<f32> {
        self.entries
            .iter()
            .find(|s| s.iteration == iteration)
            .map(|s| s.reward)
    }
}

impl Reporter for History {
    fn report(&mut self, r: &Report) {
        self.entries.push(Snapshot {
            iteration: r.iteration,
            params: r.params.to_vec(),
            reward: r.reward,
        });
    }
}

#[derive(Clone, Debug, Default)]
/// Shared flag used to stop a run between iterations
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Returns a token which has not fired
    pub fn new() -> Self {
        CancelToken::default()
    }

    /// Requests the run to stop before its next iteration
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether `cancel` has been called on this token or any of its clones
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_logger_debug_is_sorted() {
        let mut logger = ScoreLogger::new();
        logger.insert("std", 2.0);
        logger.insert("mean", 1.0);
        assert_eq!(logger.get("mean"), Some(1.0));
        assert_eq!(logger.get("max"), None);
        assert_eq!(format!("{:?}", logger), "[(\"mean\", 1.0), (\"std\", 2.0)]");
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!token.is_cancelled());
        other.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_history_records_copies() {
        let mut history = History::new();
        let params = vec![1f32, 2.];
        history.report(&Report {
            iteration: 4,
            params: &params,
            reward: -3.,
            elapsed: Duration::from_millis(5),
            stats: None,
        });
        assert_eq!(history.reward_at(4), Some(-3.));
        assert_eq!(history.reward_at(0), None);
        assert_eq!(history.entries[0].params, params);
    }

    #[test]
    fn test_fn_objective() {
        let obj = FnObjective(|w: &[f32]| w.iter().sum());
        assert_eq!(obj.dims(), None);
        assert_eq!(obj.eval(&[1., 2., 3.]).unwrap(), 6.);
    }
}
