//! Command-line front end for encrypted logistic-regression inference.
//!
//! The libraries do the work: [`helr_ckks`] provides the HE backends and
//! [`helr_inference`] the loaders, packing, engine and scoring.

pub mod cli;

pub use cli::{run, Args, BackendKind, Mode};
