//! Row-estimate collaborator handed to the host planner.
//!
//! The host calls into the estimator wherever it sizes a base relation or a
//! join. While a cardinality anchor is active the estimator unparses the
//! relation into its probe text, records `(probe, rows)` and, for
//! cardinality replacement, substitutes the cached override.

use std::time::Instant;

use tracing::{debug, trace, warn};

use pilotscope_core::anchor::AnchorKind;
use pilotscope_core::error::Result as CoreResult;
use pilotscope_core::id::RelId;
use pilotscope_core::plan::{JoinRel, RelCatalog};
use pilotscope_planner::{unparse_base_rel, unparse_join_rel};

use crate::context::QueryContext;

pub struct Estimator<'a> {
    ctx: Option<&'a mut QueryContext>,
    buf: String,
}

impl<'a> Estimator<'a> {
    pub(crate) fn new(ctx: Option<&'a mut QueryContext>) -> Self {
        Self {
            ctx,
            buf: String::new(),
        }
    }

    /// An estimator with no query attached; always returns the host's rows.
    pub fn passive() -> Estimator<'static> {
        Estimator::new(None)
    }

    /// Row estimate for a base relation.
    pub fn base_rel_rows(&mut self, catalog: &RelCatalog, rel: RelId, host_rows: f64) -> f64 {
        self.observe(host_rows, |out| unparse_base_rel(catalog, rel, out))
    }

    /// Row estimate for a join relation.
    pub fn join_rel_rows(&mut self, catalog: &RelCatalog, join: &JoinRel, host_rows: f64) -> f64 {
        self.observe(host_rows, |out| unparse_join_rel(catalog, join, out))
    }

    /// Last probe text built, empty if none.
    pub fn last_probe(&self) -> &str {
        &self.buf
    }

    fn observe(
        &mut self,
        host_rows: f64,
        unparse: impl FnOnce(&mut String) -> CoreResult<()>,
    ) -> f64 {
        let Some(ctx) = self.ctx.as_deref_mut() else {
            return host_rows;
        };
        let replace = ctx.anchors.is_enabled(AnchorKind::CardinalityReplace);
        let fetch = ctx.anchors.is_enabled(AnchorKind::SubqueryCardinalityFetch);
        if !replace && !fetch {
            return host_rows;
        }

        let started = Instant::now();
        if let Err(e) = unparse(&mut self.buf) {
            warn!(error = %e, "could not build probe query; keeping host estimate");
            return host_rows;
        }
        trace!(probe = %self.buf, "probe query");

        let mut rows = host_rows;
        if replace {
            if let Some(card) = ctx.cache.as_ref().and_then(|c| c.get(&self.buf)) {
                debug!(probe = %self.buf, card, "cardinality override");
                rows = card;
            }
        }
        ctx.record.push_subquery(self.buf.as_str(), rows);

        let elapsed = started.elapsed();
        if replace {
            ctx.charge(AnchorKind::CardinalityReplace, elapsed);
        }
        if fetch {
            ctx.charge(AnchorKind::SubqueryCardinalityFetch, elapsed);
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilotscope_core::anchor::{AnchorPayload, AnchorSet, AnchorState};
    use pilotscope_core::plan::BaseRel;

    use crate::directive::ParsedDirective;

    fn ctx(anchors: AnchorSet) -> QueryContext {
        QueryContext::from_directive(ParsedDirective {
            anchors,
            reserved: vec![],
            endpoint: None,
            enable_terminate: false,
            tid: None,
            sql: String::new(),
        })
    }

    fn catalog() -> RelCatalog {
        [BaseRel::new(RelId::new(1), "t", "t"), BaseRel::new(RelId::new(2), "u", "u")]
            .into_iter()
            .collect()
    }

    #[test]
    fn passive_estimator_keeps_host_rows() {
        let mut est = Estimator::passive();
        assert_eq!(est.base_rel_rows(&catalog(), RelId::new(1), 42.0), 42.0);
        assert_eq!(est.last_probe(), "");
    }

    #[test]
    fn replace_overrides_cached_probes_only() {
        let mut anchors = AnchorSet::new();
        anchors.insert(AnchorState::new(
            AnchorKind::CardinalityReplace,
            "CARD_REPLACE_ANCHOR",
            AnchorPayload::CardReplace {
                subquery: vec!["select count(*) from t;".into()],
                card: vec![100.0],
            },
        ));
        let mut ctx = ctx(anchors);
        let catalog = catalog();
        {
            let mut est = Estimator::new(Some(&mut ctx));
            assert_eq!(est.base_rel_rows(&catalog, RelId::new(1), 5.0), 100.0);
            assert_eq!(est.base_rel_rows(&catalog, RelId::new(2), 7.0), 7.0);
            // Missing relation: host estimate, nothing recorded.
            assert_eq!(est.base_rel_rows(&catalog, RelId::new(9), 3.0), 3.0);
        }
        assert_eq!(
            ctx.record.subquery,
            vec!["select count(*) from t;", "select count(*) from u;"]
        );
        assert_eq!(ctx.record.card, vec!["100.000000", "7.000000"]);
    }

    #[test]
    fn fetch_records_host_rows() {
        let mut anchors = AnchorSet::new();
        anchors.insert(AnchorState::new(
            AnchorKind::SubqueryCardinalityFetch,
            "SUBQUERY_CARD_FETCH_ANCHOR",
            AnchorPayload::None,
        ));
        let mut ctx = ctx(anchors);
        let catalog = catalog();
        let join = JoinRel {
            relids: [RelId::new(1), RelId::new(2)].into_iter().collect(),
            filters: vec![],
            outer_path: None,
            inner_path: None,
        };
        let rows = Estimator::new(Some(&mut ctx)).join_rel_rows(&catalog, &join, 12.5);
        assert_eq!(rows, 12.5);
        assert_eq!(ctx.record.subquery, vec!["select count(*) from t, u;"]);
        assert_eq!(ctx.record.card, vec!["12.500000"]);
    }

    #[test]
    fn inactive_anchors_record_nothing() {
        let mut anchors = AnchorSet::new();
        anchors.insert(AnchorState::new(
            AnchorKind::ExecutionTimeFetch,
            "EXECUTION_TIME_FETCH_ANCHOR",
            AnchorPayload::None,
        ));
        let mut ctx = ctx(anchors);
        let rows = Estimator::new(Some(&mut ctx)).base_rel_rows(&catalog(), RelId::new(1), 9.0);
        assert_eq!(rows, 9.0);
        assert!(ctx.record.subquery.is_empty());
    }
}
