//! HTTP handlers for application definitions and generation runs.

pub mod applications;
pub use applications::*;
