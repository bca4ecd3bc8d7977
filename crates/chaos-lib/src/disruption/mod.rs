//! Random pod disruption
//!
//! [`DisruptionJob`] is the unit of scheduled work: wait a random jitter,
//! list candidate pods, sample a fixed number without replacement and delete
//! each one independently.

mod job;
mod sampling;

#[cfg(test)]
mod tests;

pub use job::{DisruptionConfig, DisruptionJob, DisruptionJobBuilder};
pub use sampling::{draw_jitter, select_targets};
