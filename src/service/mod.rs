//! GenerationService: stored applications and generation runs. `pipeline::plan` is the pure core.

mod generate;
pub mod pipeline;

pub use generate::GenerationService;
pub use pipeline::{plan, Plan, PlanSummary};
