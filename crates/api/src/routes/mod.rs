//! Route handlers

pub mod metrics;
pub mod session;
