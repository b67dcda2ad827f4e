//! Core domain models for workflows
//!
//! This module defines the fundamental data structures that represent
//! workflows, steps, trigger events and the state of a Run.

pub mod config;
pub mod context;
pub mod error;
pub mod report;
pub mod run;
pub mod state;
pub mod step;
pub mod trigger;
pub mod workflow;

pub use context::*;
pub use error::*;
pub use report::*;
pub use run::*;
pub use state::*;
pub use step::*;
pub use trigger::*;
pub use workflow::*;
