#![forbid(unsafe_code)]
//! pilotscope-exec: the hook boundary between a host engine and the anchor
//! runtime.
//!
//! A host binding owns one [`PilotScope`] per worker and calls it from its
//! planner, executor-start and executor-end hooks. Everything query-scoped
//! lives in a [`QueryContext`] that is replaced on every directive parse and
//! dropped once the result has been reported.

pub mod context;
pub mod directive;
pub mod error;
pub mod estimate;
pub mod hooks;
pub mod instrument;
pub mod report;
pub mod transport;

pub use context::QueryContext;
pub use directive::{parse_directive, Endpoint, ParsedDirective};
pub use error::{Abort, DirectiveError, TransportError};
pub use estimate::Estimator;
pub use hooks::{Explain, PilotScope};
pub use instrument::{Instrument, QueryDesc};
pub use report::{Delivery, FinalReport};
pub use transport::{HttpTransport, MemoryTransport, Transport};
