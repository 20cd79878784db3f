//! Background Tasks Module
//!
//! # Tasks
//! - Sweeper: removes expired entries and enforces the capacity bound

mod sweeper;

pub(crate) use sweeper::SweepTarget;
pub use sweeper::{sweep_store, SweepReport, Sweeper};
