pub mod budget;
pub mod scheduler;

pub use budget::TimeBudget;
pub use scheduler::{RefreshPlan, RefreshScheduler, ScheduleReason, ScheduledProspect};
