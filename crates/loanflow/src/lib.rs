//! Loanflow simulates a consumer lending pipeline end to end: applications
//! come in through the intake surface, a background engine reviews and
//! decides them on a configurable clock, approvals get a repayment schedule
//! attached, and every mutation re-projects a per-user notification feed.
//!
//! The workflow layer is generic over its storage seams so the HTTP service,
//! the demo walkthrough, and the test suites can each bring their own
//! backends.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
