//! task-notifier library crate.
//!
//! Asynchronous notification delivery for a personal task manager: a bounded
//! queue drained by a worker pool, deferred delivery, fixed-delay retries,
//! and a periodic sweep that turns task deadlines into reminders.

pub mod clock;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod notification;
pub mod repository;
pub mod scheduler;

pub use error::{Error, Result};
