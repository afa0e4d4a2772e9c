//! Plan Engine: two pure entry points, `PlanDev`/`PlanRelease`,
//! each a function of `(Config, ...)` with no filesystem or network access.

pub mod dev;
pub mod release;
pub mod types;

pub use dev::plan_dev;
pub use release::plan_release;
