use anyhow::{Context, Result};
use clap::App;
use log::info;

use nes::bin_utils::args::{add_config_arg, ArgAugmenter, OptimizerArgs, ProblemArgs, RunConfig};
use nes::example::{SolutionReporter, TargetDistance};
use nes_core::population::{GaussianSampler, NoiseSampler};

fn main() -> Result<()> {
    env_logger::init();

    let app = App::new("nes-example")
        .about("Maximizes the negative squared distance to a target vector with NES");
    let app = ProblemArgs.add_args(OptimizerArgs.add_args(add_config_arg(app)));
    let args = app.get_matches();

    let config = RunConfig::from_args(&args)?;
    let optimizer = OptimizerArgs.load_from_args(&args, config.optimizer)?;
    let problem = ProblemArgs.load_from_args(&args, config.problem)?;
    info!("Optimizer: {:?}", optimizer);

    // The initial guess comes from the same stream as the noise
    let mut sampler = GaussianSampler::seeded(optimizer.seed);
    let init = match problem.init {
        Some(init) => init,
        None => sampler.sample_vector(problem.solution.len()),
    };

    let objective = TargetDistance::new(problem.solution);
    let mut reporter = SolutionReporter::new(objective.solution());

    let results = optimizer
        .run(init, &objective, &mut sampler, &mut reporter)
        .context("optimization failed")?;
    println!(
        "Best Score: {}, Best Model: {:?}, Iterations: {}",
        results.fitness, results.model, results.iterations
    );
    Ok(())
}
