#![forbid(unsafe_code)]
//! pilotscope-core: shared types for the anchor runtime.
//!
//! - `plan`: the host planner's relations, filter expressions and chosen paths,
//!   as far as the probe-query unparser needs to see them.
//! - `anchor`: anchor kinds and per-query anchor state.
//! - `transfer`: the record shipped back to the external service.
//! - `config`, `error`, `hash`, `id`: ambient pieces used by every crate.
//!
//! No I/O, no networking, no host bindings live here.

pub mod anchor;
pub mod config;
pub mod error;
pub mod hash;
pub mod id;
pub mod plan;
pub mod prelude;
pub mod schema;
pub mod transfer;

/// Runtime version reported in logs.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
