//! Headroom - Distributed Fixed-Window Rate Limiting
//!
//! This crate implements a fixed-window rate limiter whose state lives in a
//! shared external key-value store, so that any number of processes can
//! enforce one quota for the same identifier without sharing memory. All
//! coordination happens through conditional writes: window creation uses
//! set-if-absent, every decrement is a compare-and-swap keyed on the bytes
//! read, and a failed precondition is resolved by re-reading and retrying.

pub mod error;
pub mod store;

mod entry;
mod limiter;

pub use entry::CounterEntry;
pub use error::{LimitError, Result, StoreError};
pub use limiter::{Decision, Limiter, LimiterConfig, Quota};
