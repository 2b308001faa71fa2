//! NES
//!
//! A library and an executable to maximize black-box functions using Natural
//! Evolution Strategies.
#![warn(missing_docs, unused)]

#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate clap;

/// Tools for binaries
pub mod bin_utils;
/// Example objective
pub mod example;
