//! Finalization: snapshot the record, ship it, release the query.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use pilotscope_core::id::QueryId;
use pilotscope_core::transfer::{fixed, RecordCounts, TransferRecord};

use crate::context::QueryContext;
use crate::transport::Transport;

/// What happened to the serialized record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// No destination in the directive.
    Skipped,
    Sent { response: String },
    /// Send or serialization failed; the error was logged.
    Failed { reason: String },
}

/// Outcome of one finalization, kept for inspection after the query context
/// has been released.
#[derive(Debug, Clone)]
pub struct FinalReport {
    pub query: QueryId,
    pub counts: RecordCounts,
    pub record: TransferRecord,
    pub delivery: Delivery,
}

fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Run the aggregator for `ctx`. `None` if it was already finalized.
pub fn finalize<T: Transport + ?Sized>(
    ctx: &mut QueryContext,
    transport: &mut T,
) -> Option<FinalReport> {
    if !ctx.begin_finalize() {
        warn!(query = %ctx.id, "finalization requested twice; ignored");
        return None;
    }
    let counts = ctx.counts().unwrap_or_else(|| ctx.record.counts());
    info!(
        query = %ctx.id,
        subqueries = counts.subqueries,
        anchors = counts.anchor_names,
        "ready to end anchors"
    );

    let delivery = match ctx.endpoint.clone() {
        None => {
            info!("no destination; result not sent");
            Delivery::Skipped
        }
        Some(endpoint) => {
            ctx.record.http_time = fixed(epoch_seconds());
            match ctx.record.to_json() {
                Err(e) => {
                    warn!(error = %e, "could not serialize result record");
                    Delivery::Failed {
                        reason: e.to_string(),
                    }
                }
                Ok(payload) => match transport.round_trip(&endpoint, &payload) {
                    Ok(response) => {
                        info!(%endpoint, response = %response, "result delivered");
                        Delivery::Sent { response }
                    }
                    Err(e) => {
                        warn!(%endpoint, error = %e, "result delivery failed");
                        Delivery::Failed {
                            reason: e.to_string(),
                        }
                    }
                },
            }
        }
    };

    Some(FinalReport {
        query: ctx.id,
        counts,
        record: ctx.record.clone(),
        delivery,
    })
}
