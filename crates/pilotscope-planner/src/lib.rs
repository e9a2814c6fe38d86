#![forbid(unsafe_code)]
//! pilotscope-planner: the planning-time half of the anchor runtime.
//!
//! - `unparse`: turns a base relation or a join (with its chosen path subtree)
//!   back into a canonical `select count(*) ...;` probe query.
//! - `cache`: build-once lookup from probe text to an externally supplied
//!   cardinality override.
//! - `dsl::yaml`: YAML plan fixtures (catalog + probe target) used by the CLI
//!   and tests in place of a live host planner.
//!
//! Probe text is the join key between this process and the external service,
//! so every function here must be byte-for-byte deterministic.

pub mod cache;
pub mod dsl;
pub mod unparse;

pub use cache::CardinalityCache;
pub use dsl::yaml::{parse_yaml_fixture, PlanFixture, ProbeTarget};
pub use unparse::{base_rel_probe, join_rel_probe, unparse_base_rel, unparse_join_rel};
