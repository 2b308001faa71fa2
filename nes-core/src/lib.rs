//! NES-Core
//! ===
//!
//! This library contains the components for maximizing black-box functions using
//! Natural Evolution Strategies (NES) with a fixed, isotropic gaussian search
//! distribution.
//!
//! Natural Evolutionary Strategies
//! ---
//! Each iteration samples a population of gaussian perturbations around the current
//! parameter vector `w`, evaluates the objective at every jittered point, z-whitens
//! the rewards and moves `w` along the reward-weighted sum of the perturbations:
//!
//! ```text
//! w <- w + α / (n·σ) · Nᵀ·A
//! ```
//!
//! This particular implementation uses a fixed α for learning rate ala Salimans et al.
//! It offers optional Fitness Shaping (Wierstra et al.) and momentum, both off by
//! default.
//!
//! Objectives
//! ---
//! Anything implementing [`optimizer::Objective`] can be optimized.  Closures can be
//! adapted with [`optimizer::FnObjective`].
//!
//! ```
//! use nes_core::nes::Natural;
//! use nes_core::optimizer::{FnObjective, NoReport};
//! use nes_core::population::GaussianSampler;
//!
//! let target = [0.5f32, 0.1, -0.3];
//! let objective = FnObjective(move |w: &[f32]| {
//!     -w.iter().zip(&target).map(|(a, b)| (b - a).powi(2)).sum::<f32>()
//! });
//!
//! let optimizer = Natural::default();
//! let mut sampler = GaussianSampler::seeded(optimizer.seed);
//! let state = optimizer
//!     .run(vec![0f32; 3], &objective, &mut sampler, &mut NoReport)
//!     .unwrap();
//! assert_eq!(state.model.len(), 3);
//! ```

#![warn(missing_docs, unused)]

#[macro_use]
extern crate serde_derive;

/// Errors raised by the optimizer
pub mod error;

/// Defines the objective contract, optimizer state and reporting hooks
pub mod optimizer;

/// Defines population matrices and the noise samplers that fill them
pub mod population;

/// Defines the Natural Evolutionary Strategies optimizer
pub mod nes;
