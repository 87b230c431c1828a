//! Analysis modules: totals by cinema and period comparison.

pub mod aggregator;
pub mod compare;

pub use aggregator::*;
pub use compare::*;
