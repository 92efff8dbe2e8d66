//! tunefleet-core: Core types for the tunefleet orchestrator
//!
//! This crate provides the fundamental types used throughout the tunefleet
//! system:
//! - Knob spaces and proposed configurations
//! - Proposals, trial results, and trial/job lifecycle state
//! - Cluster node and container service types
//! - Configuration types
//! - Error handling

pub mod config;
pub mod error;
pub mod job;
pub mod knob;
pub mod node;
pub mod proposal;

pub use config::*;
pub use error::*;
pub use job::*;
pub use knob::*;
pub use node::*;
pub use proposal::*;
