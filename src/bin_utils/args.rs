use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::{App, Arg, ArgMatches, ErrorKind};

use nes_core::nes::{EvalFailure, Natural};

/// Trait to add new arguments to the current app
pub trait ArgAugmenter {
    /// Type of struct to output from this parser
    type Output;

    /// Specifies arguments to add
    fn add_args<'a, 'b>(&self, app: App<'a, 'b>) -> App<'a, 'b>;

    /// Overrides the fields of `base` with the arguments that were provided
    fn load_from_args<'a>(&self, args: &ArgMatches<'a>, base: Self::Output)
        -> Result<Self::Output>;
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
/// Target vector and optional starting point for the example objective
pub struct Problem {
    /// Vector the example objective is maximized at
    pub solution: Vec<f32>,
    /// Initial guess.  When missing, it is drawn from the noise generator.
    pub init: Option<Vec<f32>>,
}

impl Default for Problem {
    fn default() -> Self {
        Problem {
            solution: vec![0.5, 0.1, -0.3],
            init: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
/// Everything a run needs, as read from a JSON config file
pub struct RunConfig {
    /// Optimizer hyperparameters
    pub optimizer: Natural,
    /// Problem definition
    pub problem: Problem,
}

impl RunConfig {
    /// Reads a config from a JSON file.  Missing fields take their defaults.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parsing {}", path.display()))
    }

    /// Reads the file named by `--config`, or returns the defaults
    pub fn from_args<'a>(args: &ArgMatches<'a>) -> Result<Self> {
        match args.value_of("config") {
            Some(path) => RunConfig::from_path(path),
            None => Ok(RunConfig::default()),
        }
    }
}

/// Adds the `--config` argument
pub fn add_config_arg<'a, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
    app.arg(
        Arg::with_name("config")
            .long("config")
            .takes_value(true)
            .help("JSON file with optimizer and problem settings.  Flags override it."),
    )
}

// Parses an argument if present, otherwise keeps the current value
fn value_or<T: FromStr>(args: &ArgMatches, name: &str, current: T) -> Result<T> {
    match value_t!(args, name, T) {
        Ok(v) => Ok(v),
        Err(ref e) if e.kind == ErrorKind::ArgumentNotFound => Ok(current),
        Err(e) => bail!("{}", e.message),
    }
}

// Parses a comma separated list of floats, if present
fn vector_arg(args: &ArgMatches, name: &str) -> Result<Option<Vec<f32>>> {
    match args.values_of(name) {
        Some(vals) => {
            let mut out = Vec::new();
            for v in vals {
                let x = v
                    .trim()
                    .parse::<f32>()
                    .with_context(|| format!("--{}: '{}' is not a number", name, v))?;
                out.push(x);
            }
            Ok(Some(out))
        }
        None => Ok(None),
    }
}

/// Struct defining the optimizer arguments using ArgAugmenter
pub struct OptimizerArgs;

impl ArgAugmenter for OptimizerArgs {
    type Output = Natural;

    /// Specifies arguments to add for the optimizer
    fn add_args<'a, 'b>(&self, app: App<'a, 'b>) -> App<'a, 'b> {
        app
      .arg(Arg::with_name("population")
           .short("n")
           .long("population")
           .takes_value(true)
           .help("Number of perturbations sampled per iteration.  Defaults to 50"))
      .arg(Arg::with_name("sigma")
           .short("s")
           .long("sigma")
           .takes_value(true)
           .help("Noise standard deviation.  Defaults to 0.1"))
      .arg(Arg::with_name("alpha")
           .short("a")
           .long("alpha")
           .takes_value(true)
           .help("Learning rate.  Defaults to 0.001"))
      .arg(Arg::with_name("iters")
           .short("i")
           .long("iters")
           .takes_value(true)
           .help("Number of iterations to run before exiting.  Defaults to 300"))
      .arg(Arg::with_name("report_iters")
           .short("r")
           .long("report")
           .takes_value(true)
           .help("How often to report progress.  Defaults to 20"))
      .arg(Arg::with_name("seed")
           .long("seed")
           .takes_value(true)
           .help("Seed for the noise generator.  Defaults to 0"))
      .arg(Arg::with_name("momentum")
           .long("momentum")
           .takes_value(true)
           .help("Gamma parameter for momentum"))
      .arg(Arg::with_name("fitness_shaping")
           .long("fitness-shaping")
           .help("If provided, optimizes via fitness shaping"))
      .arg(Arg::with_name("parallel")
           .long("parallel")
           .help("Evaluates the population on all cores"))
      .arg(Arg::with_name("on_failure")
           .long("on-failure")
           .takes_value(true)
           .possible_values(&["abort", "penalize"])
           .help("How to handle objective failures.  Defaults to abort"))
    }

    /// Parses the arguments for the optimizer
    fn load_from_args<'a>(&self, args: &ArgMatches<'a>, base: Natural) -> Result<Natural> {
        let momentum = match value_t!(args, "momentum", f32) {
            Ok(m) => Some(m),
            Err(ref e) if e.kind == ErrorKind::ArgumentNotFound => base.momentum,
            Err(e) => bail!("{}", e.message),
        };
        let on_failure = match args.value_of("on_failure") {
            Some("abort") => EvalFailure::Abort,
            Some("penalize") => EvalFailure::Penalize,
            Some(other) => bail!("Undefined failure policy: {}", other),
            None => base.on_failure,
        };

        Ok(Natural {
            population: value_or(args, "population", base.population)?,
            sigma: value_or(args, "sigma", base.sigma)?,
            alpha: value_or(args, "alpha", base.alpha)?,
            iterations: value_or(args, "iters", base.iterations)?,
            report_iter: value_or(args, "report_iters", base.report_iter)?,
            seed: value_or(args, "seed", base.seed)?,
            momentum: momentum,
            shape: base.shape || args.is_present("fitness_shaping"),
            parallel: base.parallel || args.is_present("parallel"),
            on_failure: on_failure,
        })
    }
}

/// Struct defining the problem arguments using ArgAugmenter
pub struct ProblemArgs;

impl ArgAugmenter for ProblemArgs {
    type Output = Problem;

    fn add_args<'a, 'b>(&self, app: App<'a, 'b>) -> App<'a, 'b> {
        app.arg(
            Arg::with_name("solution")
                .long("solution")
                .takes_value(true)
                .use_delimiter(true)
                .allow_hyphen_values(true)
                .help("Comma separated target vector.  Defaults to 0.5,0.1,-0.3"),
        )
        .arg(
            Arg::with_name("init")
                .long("init")
                .takes_value(true)
                .use_delimiter(true)
                .allow_hyphen_values(true)
                .help("Comma separated initial guess.  Drawn at random when missing"),
        )
    }

    fn load_from_args<'a>(&self, args: &ArgMatches<'a>, base: Problem) -> Result<Problem> {
        let solution = vector_arg(args, "solution")?.unwrap_or(base.solution);
        if solution.is_empty() {
            bail!("--solution must not be empty");
        }
        let init = match vector_arg(args, "init")? {
            Some(init) => Some(init),
            None => base.init,
        };
        Ok(Problem {
            solution: solution,
            init: init,
        })
    }
}
