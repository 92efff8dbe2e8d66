//! tunefleet-store: Trained-parameter storage
//!
//! This crate provides parameter persistence for tuning jobs:
//! - The write-once `ParamStore` contract
//! - Filesystem and in-memory backends
//! - A bounded LRU cache for worker-side parameter reuse

pub mod cache;
pub mod file;
pub mod memory;
pub mod store;

pub use cache::{CacheStats, ParamCache};
pub use file::FileParamStore;
pub use memory::MemoryParamStore;
pub use store::ParamStore;
