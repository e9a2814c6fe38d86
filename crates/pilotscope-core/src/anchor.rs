//! Anchor kinds and per-query anchor state.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Closed set of anchor kinds a directive may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnchorKind {
    SubqueryCardinalityFetch,
    CardinalityReplace,
    ExecutionTimeFetch,
    RecordFetch,
    PhysicalPlanFetch,
    /// Reserved; recognized but carries no behavior yet.
    CostAnchorHandler,
    /// Reserved; recognized but carries no behavior yet.
    HintAnchorHandler,
    Unknown,
}

impl AnchorKind {
    /// Exact, case-sensitive match against the directive key.
    pub fn from_name(name: &str) -> Self {
        match name {
            "SUBQUERY_CARD_FETCH_ANCHOR" => AnchorKind::SubqueryCardinalityFetch,
            "CARD_REPLACE_ANCHOR" => AnchorKind::CardinalityReplace,
            "EXECUTION_TIME_FETCH_ANCHOR" => AnchorKind::ExecutionTimeFetch,
            "RECORD_FETCH_ANCHOR" => AnchorKind::RecordFetch,
            "PHYSICAL_PLAN_FETCH_ANCHOR" => AnchorKind::PhysicalPlanFetch,
            "CostAnchorHandler" => AnchorKind::CostAnchorHandler,
            "HintAnchorHandler" => AnchorKind::HintAnchorHandler,
            _ => AnchorKind::Unknown,
        }
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            AnchorKind::SubqueryCardinalityFetch => "SUBQUERY_CARD_FETCH_ANCHOR",
            AnchorKind::CardinalityReplace => "CARD_REPLACE_ANCHOR",
            AnchorKind::ExecutionTimeFetch => "EXECUTION_TIME_FETCH_ANCHOR",
            AnchorKind::RecordFetch => "RECORD_FETCH_ANCHOR",
            AnchorKind::PhysicalPlanFetch => "PHYSICAL_PLAN_FETCH_ANCHOR",
            AnchorKind::CostAnchorHandler => "CostAnchorHandler",
            AnchorKind::HintAnchorHandler => "HintAnchorHandler",
            AnchorKind::Unknown => "UNKNOWN_ANCHOR",
        }
    }

    /// Kinds that are recognized but never registered as pending work.
    pub fn is_reserved(self) -> bool {
        matches!(
            self,
            AnchorKind::CostAnchorHandler | AnchorKind::HintAnchorHandler
        )
    }
}

impl fmt::Display for AnchorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Kind-specific anchor data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnchorPayload {
    None,
    /// Parallel sequences of equal length: probe text and its override.
    CardReplace { subquery: Vec<String>, card: Vec<f64> },
}

/// One registered anchor of the current query.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorState {
    pub kind: AnchorKind,
    pub name: String,
    pub enabled: bool,
    /// Processing time charged to this anchor so far.
    pub elapsed: Duration,
    pub payload: AnchorPayload,
}

impl AnchorState {
    pub fn new(kind: AnchorKind, name: impl Into<String>, payload: AnchorPayload) -> Self {
        Self {
            kind,
            name: name.into(),
            enabled: true,
            elapsed: Duration::ZERO,
            payload,
        }
    }
}

/// Anchors registered for the current query, at most one per kind.
#[derive(Debug, Clone, Default)]
pub struct AnchorSet {
    anchors: Vec<AnchorState>,
}

impl AnchorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registering a kind twice replaces the earlier state.
    pub fn insert(&mut self, state: AnchorState) {
        match self.anchors.iter_mut().find(|a| a.kind == state.kind) {
            Some(slot) => *slot = state,
            None => self.anchors.push(state),
        }
    }

    pub fn get(&self, kind: AnchorKind) -> Option<&AnchorState> {
        self.anchors.iter().find(|a| a.kind == kind)
    }

    pub fn get_mut(&mut self, kind: AnchorKind) -> Option<&mut AnchorState> {
        self.anchors.iter_mut().find(|a| a.kind == kind)
    }

    pub fn is_enabled(&self, kind: AnchorKind) -> bool {
        self.get(kind).map(|a| a.enabled).unwrap_or(false)
    }

    pub fn enabled_count(&self) -> usize {
        self.anchors.iter().filter(|a| a.enabled).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnchorState> {
        self.anchors.iter()
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}
