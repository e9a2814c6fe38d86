//! Convenient re-exports for downstream crates.

pub use crate::anchor::{AnchorKind, AnchorPayload, AnchorSet, AnchorState};
pub use crate::config::PilotConfig;
pub use crate::error::{Error, Result};
pub use crate::id::{QueryId, RelId};
pub use crate::plan::{BaseRel, Const, Expr, JoinPath, JoinRel, Path, RelCatalog, RelSet, Var};
pub use crate::schema::DataType;
pub use crate::transfer::{RecordCounts, TransferRecord};
