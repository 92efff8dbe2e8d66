//! tunefleet-advisor: Search strategies for tuning jobs
//!
//! This crate provides the pluggable search-strategy engine:
//! - The `Advisor` contract (propose / feedback)
//! - FIXED: cycles a literal configuration list
//! - RANDOM: independent uniform sampling, log-scale aware
//! - A strategy factory keyed by `AdvisorType`

pub mod advisor;
pub mod fixed;
pub mod random;

pub use advisor::{create_advisor, Advisor};
pub use fixed::FixedAdvisor;
pub use random::RandomAdvisor;
