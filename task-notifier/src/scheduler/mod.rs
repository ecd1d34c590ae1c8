//! Scheduler for task-driven reminders.
//!
//! The Scheduler is responsible for:
//! - Sweeping task data on a fixed interval for overdue and due-soon tasks
//! - Optionally suppressing repeated reminders through a [`ReminderTracker`]
//! - Scheduling single and recurring reminders ahead of a due date
//!
//! Deferred delivery itself lives in the notification service; the scheduler
//! only decides what to submit and when.

mod sweep;
mod tracker;

pub use sweep::{Scheduler, SchedulerStatus, SweepReport};
pub use tracker::ReminderTracker;
