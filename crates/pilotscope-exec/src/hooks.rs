//! The three host callbacks and the anchor lifecycle they drive.
//!
//! ```text
//! planner_hook:   parse directive -> host plans (Estimator) -> resolve
//!                 plan-phase anchors -> finalize if ready
//! executor_start: install the execution timer
//! executor_end:   read it, resolve, finalize if ready
//! ```
//! Finalization reports the record and releases the query context; with
//! `enableTerminate` it also hands an [`Abort::Terminated`] back to the host.

use std::time::Instant;

use tracing::{debug, error, info, info_span, warn};

use pilotscope_core::anchor::AnchorKind;
use pilotscope_core::config::PilotConfig;
use pilotscope_core::transfer::fixed;

use crate::context::QueryContext;
use crate::directive::parse_directive;
use crate::error::{Abort, DirectiveError};
use crate::estimate::Estimator;
use crate::instrument::{Instrument, QueryDesc};
use crate::report::{self, FinalReport};
use crate::transport::Transport;

/// Text forms of the plan the host produced.
pub trait Explain {
    fn physical_plan(&self) -> String;

    fn logical_plan(&self) -> Option<String> {
        None
    }
}

impl Explain for String {
    fn physical_plan(&self) -> String {
        self.clone()
    }
}

/// Hosts that cannot render their plan.
impl Explain for () {
    fn physical_plan(&self) -> String {
        String::new()
    }
}

pub struct PilotScope<T: Transport> {
    cfg: PilotConfig,
    transport: T,
    ctx: Option<QueryContext>,
    last_report: Option<FinalReport>,
}

impl<T: Transport> PilotScope<T> {
    pub fn new(cfg: PilotConfig, transport: T) -> Self {
        Self {
            cfg,
            transport,
            ctx: None,
            last_report: None,
        }
    }

    pub fn config(&self) -> &PilotConfig {
        &self.cfg
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// State of the query in flight, if it carried a directive and has not
    /// been finalized yet.
    pub fn context(&self) -> Option<&QueryContext> {
        self.ctx.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.ctx.is_some()
    }

    pub fn pending(&self) -> usize {
        self.ctx.as_ref().map(QueryContext::pending).unwrap_or(0)
    }

    pub fn last_report(&self) -> Option<&FinalReport> {
        self.last_report.as_ref()
    }

    pub fn take_report(&mut self) -> Option<FinalReport> {
        self.last_report.take()
    }

    /// Planner callback. `plan` runs the host's own planner with an
    /// [`Estimator`] wired to the current query.
    pub fn planner_hook<P, F>(&mut self, query: &str, plan: F) -> Result<P, Abort>
    where
        P: Explain,
        F: FnOnce(&mut Estimator<'_>) -> P,
    {
        if !self.begin_query(query)? {
            return Ok(plan(&mut Estimator::passive()));
        }

        let planned = {
            let mut estimator = Estimator::new(self.ctx.as_mut());
            plan(&mut estimator)
        };

        let Some(ctx) = self.ctx.as_mut() else {
            return Ok(planned);
        };
        let _span = info_span!("pilotscope", query = %ctx.id).entered();
        resolve_plan_phase(ctx, &planned);
        self.finalize_if_ready()?;
        Ok(planned)
    }

    /// Executor-start callback: make sure the query is timed when asked to.
    pub fn executor_start(&mut self, desc: &mut QueryDesc) {
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        if !ctx.anchors.is_enabled(AnchorKind::ExecutionTimeFetch) {
            return;
        }
        let started = Instant::now();
        if desc.instrument.is_none() {
            desc.instrument = Some(Instrument::new());
        }
        ctx.charge(AnchorKind::ExecutionTimeFetch, started.elapsed());
    }

    /// Executor-end callback: capture execution time and finalize if that
    /// was the last thing pending.
    pub fn executor_end(&mut self, desc: &mut QueryDesc) -> Result<(), Abort> {
        let Some(ctx) = self.ctx.as_mut() else {
            return Ok(());
        };
        if !ctx.anchors.is_enabled(AnchorKind::ExecutionTimeFetch) {
            return Ok(());
        }
        let _span = info_span!("pilotscope", query = %ctx.id).entered();
        let started = Instant::now();

        let total = desc
            .instrument
            .as_mut()
            .map(|instr| {
                instr.end_loop();
                instr.total()
            })
            .unwrap_or_default();
        ctx.record.execution_time = fixed(total.as_secs_f64());
        info!(execution_time = %ctx.record.execution_time, "execution time captured");

        ctx.charge(AnchorKind::ExecutionTimeFetch, started.elapsed());
        ctx.resolve(AnchorKind::ExecutionTimeFetch);
        self.finalize_if_ready()
    }

    /// Install per-query state from the directive in `query`. Returns whether
    /// `query` carried a usable directive; state of a query already in flight
    /// is only replaced in that case.
    fn begin_query(&mut self, query: &str) -> Result<bool, Abort> {
        let started = Instant::now();
        let parsed = match parse_directive(query, &self.cfg) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => {
                debug!("no pilotscope directive; standard planning");
                return Ok(false);
            }
            Err(DirectiveError::UnknownAnchor(name)) => {
                error!(anchor = %name, "unknown anchor in directive");
                return Err(Abort::UnknownAnchor { name });
            }
            Err(e) => {
                warn!(error = %e, "malformed directive; query passes through");
                return Ok(false);
            }
        };

        if let Some(stale) = self.ctx.take() {
            warn!(
                query = %stale.id,
                pending = stale.pending(),
                "previous query ended with anchors unresolved; state dropped"
            );
        }

        let mut ctx = QueryContext::from_directive(parsed);
        ctx.record.parser_time = fixed(started.elapsed().as_secs_f64());
        let _span = info_span!("pilotscope", query = %ctx.id).entered();
        info!(
            anchors = ctx.anchors.len(),
            pending = ctx.pending(),
            send = ctx.endpoint.is_some(),
            terminate = ctx.enable_terminate,
            "directive parsed"
        );

        let nothing_pending = ctx.pending() == 0;
        self.ctx = Some(ctx);
        if nothing_pending {
            self.finalize_if_ready()?;
        }
        Ok(true)
    }

    fn finalize_if_ready(&mut self) -> Result<(), Abort> {
        if !self
            .ctx
            .as_ref()
            .is_some_and(QueryContext::ready_to_finalize)
        {
            return Ok(());
        }
        let Some(mut ctx) = self.ctx.take() else {
            return Ok(());
        };

        if let Some(report) = report::finalize(&mut ctx, &mut self.transport) {
            self.last_report = Some(report);
        }
        let terminate = ctx.enable_terminate;
        drop(ctx);

        if terminate {
            info!("terminating request after reporting");
            return Err(Abort::Terminated(self.cfg.terminate_message.clone()));
        }
        info!("no terminate requested; query continues");
        Ok(())
    }
}

/// Anchors satisfied once the host has produced a plan.
fn resolve_plan_phase<P: Explain>(ctx: &mut QueryContext, planned: &P) {
    if ctx.anchors.is_enabled(AnchorKind::PhysicalPlanFetch) {
        let started = Instant::now();
        ctx.record.physical_plan = planned.physical_plan();
        if let Some(logical) = planned.logical_plan() {
            ctx.record.logical_plan = logical;
        }
        ctx.charge(AnchorKind::PhysicalPlanFetch, started.elapsed());
        ctx.resolve(AnchorKind::PhysicalPlanFetch);
    }
    ctx.resolve(AnchorKind::CardinalityReplace);
    ctx.resolve(AnchorKind::SubqueryCardinalityFetch);
}
