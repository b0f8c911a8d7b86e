//! Monitoring engine - probing, classification and the poll loop
//!
//! This module is responsible for:
//! - Running local, basic (echo) and application (`/ping`) checks
//! - Folding probe outcomes into a per-host [`State`]
//! - Driving the fixed-interval poll loop and detecting transitions

pub mod checker;
pub mod classifier;
pub mod scheduler;
pub mod types;
pub mod validation;

pub use checker::{ProbeMode, SystemProber};
pub use classifier::Classifier;
pub use scheduler::Poller;
pub use types::{Severity, State, StateVector, TransitionEvent};
