//! Resilience helpers.

pub mod retry;
