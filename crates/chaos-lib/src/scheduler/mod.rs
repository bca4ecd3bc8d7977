//! Cron scheduling
//!
//! [`CronSchedule`] parses crontab expressions and [`CronScheduler`] drives a
//! [`ScheduledJob`] on every fire time.

mod cron;
mod runner;

pub use self::cron::{CronSchedule, ScheduleError};
pub use runner::{Clock, CronScheduler, ScheduledJob, SystemClock};
