//! Per-query state, created on directive parse and dropped after reporting.

use std::time::Duration;

use tracing::info;

use pilotscope_core::anchor::{AnchorKind, AnchorPayload, AnchorSet};
use pilotscope_core::id::QueryId;
use pilotscope_core::transfer::{RecordCounts, TransferRecord};
use pilotscope_planner::CardinalityCache;

use crate::directive::{Endpoint, ParsedDirective};

#[derive(Debug)]
pub struct QueryContext {
    pub id: QueryId,
    pub anchors: AnchorSet,
    pub record: TransferRecord,
    /// Present iff a cardinality-replace anchor was registered.
    pub cache: Option<CardinalityCache>,
    pub endpoint: Option<Endpoint>,
    pub enable_terminate: bool,
    pending: usize,
    counts: Option<RecordCounts>,
    finalized: bool,
}

impl QueryContext {
    pub fn from_directive(parsed: ParsedDirective) -> Self {
        let cache = parsed
            .anchors
            .get(AnchorKind::CardinalityReplace)
            .and_then(|a| match &a.payload {
                AnchorPayload::CardReplace { subquery, card } => {
                    Some(CardinalityCache::from_parallel(subquery, card))
                }
                AnchorPayload::None => None,
            });

        let record = TransferRecord {
            sql: parsed.sql,
            tid: parsed.tid.unwrap_or_default(),
            ..TransferRecord::default()
        };

        Self {
            id: QueryId::new(),
            pending: parsed.anchors.enabled_count(),
            anchors: parsed.anchors,
            record,
            cache,
            endpoint: parsed.endpoint,
            enable_terminate: parsed.enable_terminate,
            counts: None,
            finalized: false,
        }
    }

    /// Anchors registered but not yet resolved.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Add processing time to an anchor that is still enabled.
    pub fn charge(&mut self, kind: AnchorKind, elapsed: Duration) {
        if let Some(anchor) = self.anchors.get_mut(kind).filter(|a| a.enabled) {
            anchor.elapsed += elapsed;
        }
    }

    /// Mark an anchor done: disable it, drop the pending count and record its
    /// accumulated time. Returns false if it was absent or already resolved.
    pub fn resolve(&mut self, kind: AnchorKind) -> bool {
        let Some(anchor) = self.anchors.get_mut(kind).filter(|a| a.enabled) else {
            return false;
        };
        anchor.enabled = false;
        let (name, elapsed) = (anchor.name.clone(), anchor.elapsed);

        self.pending = self.pending.saturating_sub(1);
        self.record.push_anchor_time(&name, elapsed);
        info!(anchor = %name, pending = self.pending, "anchor done");
        true
    }

    /// Nothing left, or only the record fetch, which completes with the query
    /// itself and has no resolution point of its own.
    pub fn ready_to_finalize(&self) -> bool {
        self.pending == 0
            || (self.pending == 1 && self.anchors.is_enabled(AnchorKind::RecordFetch))
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Sequence lengths captured when finalization began.
    pub fn counts(&self) -> Option<RecordCounts> {
        self.counts
    }

    /// Returns false if finalization already happened.
    pub(crate) fn begin_finalize(&mut self) -> bool {
        if self.finalized {
            return false;
        }
        self.finalized = true;
        self.counts = Some(self.record.counts());
        true
    }
}
