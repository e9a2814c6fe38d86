#![forbid(unsafe_code)]
//! PilotScope anchor runtime.
//!
//! Facade over the workspace crates; host bindings usually depend on this
//! package alone.

pub use pilotscope_core;
pub use pilotscope_exec;
pub use pilotscope_planner;

pub use pilotscope_core::config::PilotConfig;
pub use pilotscope_exec::{Abort, Estimator, Explain, HttpTransport, PilotScope, QueryDesc, Transport};
