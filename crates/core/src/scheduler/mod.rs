//! Background scheduler for periodic collection, scoring and retention.

mod scheduler_model;
mod scheduler_service;

pub use scheduler_model::*;
pub use scheduler_service::Scheduler;
