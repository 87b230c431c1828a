//! Report and export generation.

pub mod generator;

pub use generator::*;
