//! The per-tick start/stop/shed decision loop

use chrono::{DateTime, Local};
use headroom_api::{
    DaemonStateSnapshot, LoadStatus, LoadView, ReportRow, SkipReason, StartReason, StopReason,
    TickAction, TickReport, API_VERSION,
};
use headroom_config::{LoadPolicy, Policy};
use headroom_host_api::{HeadroomSource, LoadActuator};
use headroom_store::{AuditEvent, AuditEventType, Store};
use headroom_util::LoadId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::catchup::{self, CatchupBudget, CatchupDecision};
use crate::{eligibility, render_table, tick_quantum_minutes, CoreEvent, LoadState};

/// Result of one tick
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub report: TickReport,
    pub events: Vec<CoreEvent>,
}

/// Scratch state for a single tick
struct TickContext {
    now: DateTime<Local>,
    /// Observed reading; every decision in the tick uses it unchanged
    headroom: i64,
    /// Reading adjusted by the ratings switched this tick, for the report only
    projected: i64,
    running: usize,
    actions: HashMap<LoadId, TickAction>,
    dirty: HashSet<LoadId>,
    events: Vec<CoreEvent>,
}

impl TickContext {
    fn new(now: DateTime<Local>, running: usize) -> Self {
        Self {
            now,
            headroom: 0,
            projected: 0,
            running,
            actions: HashMap::new(),
            dirty: HashSet::new(),
            events: Vec::new(),
        }
    }

    fn acted(&self, load_id: &LoadId) -> bool {
        self.actions.contains_key(load_id)
    }
}

/// Owns every load's quota and run state and decides, once per tick, which
/// loads to start and stop.
pub struct TierScheduler {
    policy: Policy,
    store: Arc<dyn Store>,
    headroom: Arc<dyn HeadroomSource>,
    actuator: Arc<dyn LoadActuator>,
    states: HashMap<LoadId, LoadState>,
    last_report: Option<TickReport>,
}

impl TierScheduler {
    pub fn new(
        policy: Policy,
        store: Arc<dyn Store>,
        headroom: Arc<dyn HeadroomSource>,
        actuator: Arc<dyn LoadActuator>,
    ) -> Self {
        info!(
            load_count = policy.loads.len(),
            max_concurrent = policy.service.max_concurrent_loads,
            tick_secs = policy.service.tick_period.as_secs(),
            "Scheduler initialized"
        );

        if let Err(e) = store.append_audit(AuditEvent::new(AuditEventType::PolicyLoaded {
            load_count: policy.loads.len(),
        })) {
            warn!(error = %e, "Failed to append audit event");
        }

        Self {
            policy,
            store,
            headroom,
            actuator,
            states: HashMap::new(),
            last_report: None,
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn tick_period(&self) -> Duration {
        self.policy.service.tick_period
    }

    pub fn load_state(&self, load_id: &LoadId) -> Option<&LoadState> {
        self.states.get(load_id)
    }

    /// Quota minutes left in the current window
    pub fn remaining_mins(&self, load_id: &LoadId) -> Option<u32> {
        let load = self.policy.get_load(load_id)?;
        let state = self.states.get(load_id)?;
        Some(state.quota.remaining(load.target_mins))
    }

    pub fn last_report(&self) -> Option<&TickReport> {
        self.last_report.as_ref()
    }

    /// Restore every load's state from the store, then align device-controlled
    /// loads with what their devices report.
    pub async fn hydrate(&mut self, now: DateTime<Local>) {
        let loads = self.policy.loads.clone();
        let mut dirty = HashSet::new();
        for load in &loads {
            let state = self.hydrate_load(load, now).await;
            self.states.insert(load.id.clone(), state);
            dirty.insert(load.id.clone());
        }
        self.persist(&loads, &dirty, now);

        info!(load_count = loads.len(), "Load state hydrated");
    }

    async fn hydrate_load(&self, load: &LoadPolicy, now: DateTime<Local>) -> LoadState {
        let mut state = match self.store.load_snapshot(&load.id) {
            Ok(Some(snapshot)) => LoadState::hydrate(snapshot, load, now),
            Ok(None) => LoadState::fresh(now),
            Err(e) => {
                warn!(load_id = %load.id, error = %e, "Failed to read saved load state");
                LoadState::fresh(now)
            }
        };

        if load.is_monitored()
            && let Some(on) = self.actuator.observed_external_on_state(&load.id).await
        {
            state.run.is_running = on;
            if !on {
                state.run.start_ts = None;
            } else if state.run.start_ts.is_none() {
                state.run.start_ts = Some(now);
            }
        }

        debug!(
            load_id = %load.id,
            served_mins = state.quota.served_mins,
            anchor = %state.quota.anchor,
            running = state.run.is_running,
            "Load hydrated"
        );
        state
    }

    /// Swap in a new policy between ticks. State survives for loads that
    /// remain; new loads are hydrated from the store.
    pub async fn reload(&mut self, policy: Policy, now: DateTime<Local>) -> CoreEvent {
        let load_count = policy.loads.len();
        self.states.retain(|id, _| policy.get_load(id).is_some());

        let mut dirty = HashSet::new();
        for load in &policy.loads {
            if !self.states.contains_key(&load.id) {
                let state = self.hydrate_load(load, now).await;
                self.states.insert(load.id.clone(), state);
                dirty.insert(load.id.clone());
            }
        }
        self.policy = policy;
        let loads = self.policy.loads.clone();
        self.persist(&loads, &dirty, now);

        self.audit(AuditEventType::PolicyLoaded { load_count }, now);
        info!(load_count, "Policy reloaded");

        CoreEvent::PolicyReloaded { load_count }
    }

    /// Run one scheduling pass
    pub async fn tick(&mut self, now: DateTime<Local>) -> TickOutcome {
        let loads = self.policy.loads.clone();
        for load in &loads {
            self.states
                .entry(load.id.clone())
                .or_insert_with(|| LoadState::fresh(now));
        }
        let running = self.running_count(&loads);
        let mut ctx = TickContext::new(now, running);

        let Some(observed) = self.headroom.current_headroom_watts() else {
            return self.fail_safe(&loads, ctx).await;
        };
        ctx.headroom = observed;
        ctx.projected = observed;

        self.roll_over(&loads, &mut ctx);
        self.reconcile(&loads, &mut ctx).await;
        let skips = self.enforce_eligibility(&loads, &mut ctx).await;

        let order = self.fairness_order(&loads);
        let by_id: HashMap<&LoadId, &LoadPolicy> = loads.iter().map(|l| (&l.id, l)).collect();

        self.run_catchup(&order, &by_id, &mut ctx).await;
        self.emergency_shed(&loads, &mut ctx).await;
        self.tier_pass(&order, &by_id, &skips, &mut ctx).await;
        self.accrue(&loads, &mut ctx);

        self.finish(&loads, ctx, Some(observed))
    }

    /// Command every running load off, catch-up runs included
    pub async fn shed_all(&mut self, reason: StopReason, now: DateTime<Local>) -> Vec<CoreEvent> {
        let loads = self.policy.loads.clone();
        let mut ctx = TickContext::new(now, self.running_count(&loads));
        for load in &loads {
            if self.is_running(&load.id) {
                self.stop_and_record(load, reason.clone(), &mut ctx).await;
            }
        }
        self.persist(&loads, &ctx.dirty, now);
        ctx.events
    }

    async fn fail_safe(&mut self, loads: &[LoadPolicy], mut ctx: TickContext) -> TickOutcome {
        let running_loads = ctx.running;
        warn!(running_loads, "Headroom unavailable, shedding all running loads");
        ctx.events.push(CoreEvent::HeadroomUnavailable { running_loads });
        self.audit(AuditEventType::HeadroomUnavailable { running_loads }, ctx.now);

        for load in loads {
            if self.is_running(&load.id) {
                self.stop_and_record(load, StopReason::NoHeadroomReading, &mut ctx)
                    .await;
            } else {
                ctx.actions
                    .insert(load.id.clone(), TickAction::Skip(SkipReason::NoReading));
            }
        }

        self.finish(loads, ctx, None)
    }

    fn roll_over(&mut self, loads: &[LoadPolicy], ctx: &mut TickContext) {
        for load in loads {
            let windows = match self.states.get_mut(&load.id) {
                Some(state) => {
                    let windows = state.quota.maybe_rollover(load.quota_window, ctx.now);
                    if windows > 0 {
                        state.run.catchup_run_secs = 0;
                        info!(
                            load_id = %load.id,
                            windows,
                            anchor = %state.quota.anchor,
                            "Quota window rolled over"
                        );
                    }
                    windows
                }
                None => continue,
            };

            if windows > 0 {
                ctx.dirty.insert(load.id.clone());
                ctx.events.push(CoreEvent::QuotaRolledOver {
                    load_id: load.id.clone(),
                    windows,
                });
                self.audit(
                    AuditEventType::QuotaRollover {
                        load_id: load.id.clone(),
                        windows,
                    },
                    ctx.now,
                );
            }
        }
    }

    async fn reconcile(&mut self, loads: &[LoadPolicy], ctx: &mut TickContext) {
        for load in loads.iter().filter(|l| l.is_monitored()) {
            let Some(observed) = self.actuator.observed_external_on_state(&load.id).await else {
                continue;
            };
            let changed = self
                .states
                .get_mut(&load.id)
                .is_some_and(|state| state.run.reconcile(observed));
            if !changed {
                continue;
            }

            if observed {
                ctx.running += 1;
            } else {
                ctx.running = ctx.running.saturating_sub(1);
            }
            info!(load_id = %load.id, running = observed, "External state change");
            ctx.dirty.insert(load.id.clone());
            ctx.events.push(CoreEvent::ExternalStateChanged {
                load_id: load.id.clone(),
                running: observed,
            });
            self.audit(
                AuditEventType::ExternalStateChange {
                    load_id: load.id.clone(),
                    running: observed,
                },
                ctx.now,
            );
        }
    }

    /// Record skip reasons and switch off running loads that may not run.
    /// Catch-up runs are left to the catch-up controller.
    async fn enforce_eligibility(
        &mut self,
        loads: &[LoadPolicy],
        ctx: &mut TickContext,
    ) -> HashMap<LoadId, SkipReason> {
        let mut skips = HashMap::new();
        for load in loads {
            let Some(state) = self.states.get(&load.id) else {
                continue;
            };
            let Some(reason) = eligibility::evaluate(load, &state.quota, &ctx.now) else {
                continue;
            };
            let enforce = state.run.is_running && !state.run.catchup_active;
            skips.insert(load.id.clone(), reason);

            if enforce {
                let stop = match reason {
                    SkipReason::Quota => StopReason::QuotaExhausted,
                    other => StopReason::Ineligible { reason: other },
                };
                self.stop_and_record(load, stop, ctx).await;
            }
        }
        skips
    }

    async fn run_catchup(
        &mut self,
        order: &[LoadId],
        by_id: &HashMap<&LoadId, &LoadPolicy>,
        ctx: &mut TickContext,
    ) {
        let mut started = false;
        for id in order {
            if ctx.acted(id) {
                continue;
            }
            let (Some(load), Some(state)) = (by_id.get(id), self.states.get(id)) else {
                continue;
            };
            let budget = CatchupBudget {
                running: ctx.running,
                max_concurrent: self.policy.service.max_concurrent_loads,
                started,
            };

            match catchup::decide(load, state.quota.served_mins, &state.run, &ctx.now, budget) {
                CatchupDecision::Nothing => {}
                CatchupDecision::ClearFlag => {
                    if let Some(state) = self.states.get_mut(id) {
                        state.run.catchup_active = false;
                    }
                    debug!(load_id = %id, "Catch-up flag cleared");
                    ctx.dirty.insert(id.clone());
                }
                CatchupDecision::Start { deficit_mins } => {
                    let reason = StartReason::Catchup { deficit_mins };
                    if self.start_and_record(load, reason, true, ctx).await {
                        started = true;
                    }
                }
                CatchupDecision::Stop(reason) => {
                    self.stop_and_record(load, reason, ctx).await;
                }
            }
        }
    }

    /// Stop exactly one load when headroom is negative: the smallest load in
    /// the lowest-priority running tier that covers the deficit on its own,
    /// else the smallest load in that tier.
    async fn emergency_shed(&mut self, loads: &[LoadPolicy], ctx: &mut TickContext) {
        if ctx.headroom >= 0 {
            return;
        }
        let deficit_w = -ctx.headroom;

        let candidates: Vec<&LoadPolicy> = loads
            .iter()
            .filter(|l| l.rated_watts > 0 && !ctx.acted(&l.id))
            .filter(|l| {
                self.states
                    .get(&l.id)
                    .is_some_and(|s| s.run.is_running && !s.run.catchup_active)
            })
            .collect();
        let Some(lowest_tier) = candidates.iter().map(|l| l.tier).max() else {
            return;
        };

        let in_tier = candidates.iter().filter(|l| l.tier == lowest_tier);
        let victim = in_tier
            .clone()
            .filter(|l| l.rated_watts as i64 >= deficit_w)
            .min_by_key(|l| l.rated_watts)
            .or_else(|| in_tier.min_by_key(|l| l.rated_watts))
            .copied();

        if let Some(load) = victim {
            warn!(
                load_id = %load.id,
                tier = load.tier,
                rated_w = load.rated_watts,
                deficit_w,
                "Emergency shed"
            );
            self.stop_and_record(load, StopReason::EmergencyShed { deficit_w }, ctx)
                .await;
        }
    }

    async fn tier_pass(
        &mut self,
        order: &[LoadId],
        by_id: &HashMap<&LoadId, &LoadPolicy>,
        skips: &HashMap<LoadId, SkipReason>,
        ctx: &mut TickContext,
    ) {
        let max_concurrent = self.policy.service.max_concurrent_loads;
        let mut started = false;

        for id in order {
            if ctx.acted(id) {
                continue;
            }
            let (Some(load), Some(state)) = (by_id.get(id), self.states.get(id)) else {
                continue;
            };
            let remaining = state.quota.remaining(load.target_mins);

            if state.run.is_running {
                if state.run.catchup_active {
                    ctx.actions.insert(id.clone(), TickAction::Keep);
                } else if remaining == 0 {
                    self.stop_and_record(load, StopReason::QuotaExhausted, ctx).await;
                } else if ctx.headroom < -load.shed_hysteresis_w
                    && state.run.min_runtime_met(load.min_runtime_mins, ctx.now)
                {
                    let reason = StopReason::HeadroomLow {
                        headroom_w: ctx.headroom,
                        hysteresis_w: load.shed_hysteresis_w,
                    };
                    self.stop_and_record(load, reason, ctx).await;
                } else {
                    ctx.actions.insert(id.clone(), TickAction::Keep);
                }
                continue;
            }

            let needed_w = load.needed_watts();
            let skip = skips.get(id).copied().or(if started {
                Some(SkipReason::Cap)
            } else if ctx.running >= max_concurrent {
                Some(SkipReason::Concurrency)
            } else if remaining == 0 {
                Some(SkipReason::Quota)
            } else if !state.run.cooldown_met(load.cooldown_mins, ctx.now) {
                Some(SkipReason::Cooldown)
            } else if ctx.headroom < needed_w {
                Some(SkipReason::Headroom)
            } else {
                None
            });

            match skip {
                Some(reason) => {
                    ctx.actions.insert(id.clone(), TickAction::Skip(reason));
                }
                None => {
                    let reason = StartReason::Surplus {
                        headroom_w: ctx.headroom,
                        needed_w,
                    };
                    if self.start_and_record(load, reason, false, ctx).await {
                        started = true;
                    }
                }
            }
        }
    }

    fn accrue(&mut self, loads: &[LoadPolicy], ctx: &mut TickContext) {
        let quantum = tick_quantum_minutes(self.policy.service.tick_period);
        let secs = quantum as u64 * 60;
        let today = ctx.now.date_naive();

        for load in loads {
            let Some(state) = self.states.get_mut(&load.id) else {
                continue;
            };
            if state.run.maybe_daily_rollover(today) {
                ctx.dirty.insert(load.id.clone());
            }
            if !state.run.is_running {
                continue;
            }
            state.quota.accrue(quantum);
            state.run.accrue(secs);
            ctx.dirty.insert(load.id.clone());

            if let Err(e) =
                self.store
                    .add_daily_runtime(&load.id, today, Duration::from_secs(secs))
            {
                warn!(load_id = %load.id, error = %e, "Failed to record daily runtime");
            }
        }
    }

    fn finish(
        &mut self,
        loads: &[LoadPolicy],
        ctx: TickContext,
        observed: Option<i64>,
    ) -> TickOutcome {
        let mut rows: Vec<ReportRow> = loads
            .iter()
            .filter_map(|load| {
                let state = self.states.get(&load.id)?;
                let action = ctx.actions.get(&load.id).copied().unwrap_or(
                    if state.run.is_running {
                        TickAction::Keep
                    } else {
                        TickAction::Skip(SkipReason::NoReading)
                    },
                );
                Some(ReportRow {
                    tier: load.tier,
                    load_id: load.id.clone(),
                    label: load.label.clone(),
                    rated_watts: load.rated_watts,
                    status: LoadStatus::from_running(state.run.is_running),
                    runtime_mins: state.quota.window_runtime_mins,
                    remaining_mins: state.quota.remaining(load.target_mins),
                    needed_watts: load.needed_watts(),
                    catchup: catchup::status(
                        &load.catchup,
                        state.quota.served_mins,
                        state.run.catchup_active,
                    ),
                    action,
                })
            })
            .collect();
        rows.sort_by_key(|r| r.tier);

        let report = TickReport {
            at: ctx.now,
            headroom_w: observed,
            final_headroom_w: observed.map(|_| ctx.projected),
            running: self.running_count(loads),
            max_concurrent: self.policy.service.max_concurrent_loads,
            rows,
        };

        self.persist(loads, &ctx.dirty, ctx.now);
        for line in render_table(&report).lines() {
            debug!("{}", line);
        }
        self.last_report = Some(report.clone());

        TickOutcome {
            report,
            events: ctx.events,
        }
    }

    async fn start_and_record(
        &mut self,
        load: &LoadPolicy,
        reason: StartReason,
        catchup: bool,
        ctx: &mut TickContext,
    ) -> bool {
        let reason_text = reason.to_string();
        if !self.actuate(load, true, &reason_text, ctx).await {
            ctx.actions
                .insert(load.id.clone(), TickAction::Skip(SkipReason::ActuationFailed));
            return false;
        }

        if let Some(state) = self.states.get_mut(&load.id) {
            state.run.mark_started(ctx.now);
            state.run.catchup_active = catchup;
            state.last_reason = Some(reason_text.clone());
        }
        if !catchup {
            ctx.projected -= load.rated_watts as i64;
        }
        ctx.running += 1;
        ctx.actions.insert(load.id.clone(), TickAction::Start);
        ctx.dirty.insert(load.id.clone());

        info!(
            load_id = %load.id,
            tier = load.tier,
            rated_w = load.rated_watts,
            headroom_w = ctx.headroom,
            reason = %reason_text,
            "Load started"
        );

        let headroom_w = match reason {
            StartReason::Surplus { headroom_w, .. } => Some(headroom_w),
            StartReason::Catchup { .. } => None,
        };
        self.audit(
            AuditEventType::LoadStarted {
                load_id: load.id.clone(),
                reason: reason_text,
                headroom_w,
            },
            ctx.now,
        );
        ctx.events.push(CoreEvent::LoadStarted {
            load_id: load.id.clone(),
            reason,
            headroom_w,
        });
        true
    }

    async fn stop_and_record(
        &mut self,
        load: &LoadPolicy,
        reason: StopReason,
        ctx: &mut TickContext,
    ) -> bool {
        let reason_text = reason.to_string();
        if !self.actuate(load, false, &reason_text, ctx).await {
            ctx.actions
                .insert(load.id.clone(), TickAction::Skip(SkipReason::ActuationFailed));
            return false;
        }

        let mut ran_secs = 0;
        if let Some(state) = self.states.get_mut(&load.id) {
            ran_secs = state.run.ran_secs(ctx.now);
            state.run.mark_stopped(ctx.now);
            state.last_reason = Some(reason_text.clone());
        }
        ctx.projected += load.rated_watts as i64;
        ctx.running = ctx.running.saturating_sub(1);
        ctx.actions.insert(load.id.clone(), TickAction::Stop);
        ctx.dirty.insert(load.id.clone());

        info!(
            load_id = %load.id,
            tier = load.tier,
            rated_w = load.rated_watts,
            headroom_w = ctx.headroom,
            ran_secs,
            reason = %reason_text,
            "Load stopped"
        );

        self.audit(
            AuditEventType::LoadStopped {
                load_id: load.id.clone(),
                reason: reason_text,
                ran_secs,
            },
            ctx.now,
        );
        ctx.events.push(CoreEvent::LoadStopped {
            load_id: load.id.clone(),
            reason,
            ran_secs,
        });
        true
    }

    /// Send one command. Failures are logged and leave state untouched.
    async fn actuate(&self, load: &LoadPolicy, on: bool, reason: &str, ctx: &mut TickContext) -> bool {
        match self.actuator.set_power(&load.id, on, reason).await {
            Ok(()) => true,
            Err(e) => {
                warn!(load_id = %load.id, on, error = %e, "Actuation failed");
                let error = e.to_string();
                self.audit(
                    AuditEventType::ActuationFailed {
                        load_id: load.id.clone(),
                        on,
                        error: error.clone(),
                    },
                    ctx.now,
                );
                ctx.events.push(CoreEvent::ActuationFailed {
                    load_id: load.id.clone(),
                    on,
                    error,
                });
                false
            }
        }
    }

    fn fairness_order(&self, loads: &[LoadPolicy]) -> Vec<LoadId> {
        eligibility::fairness_order(
            loads
                .iter()
                .map(|l| {
                    let served = self
                        .states
                        .get(&l.id)
                        .map(|s| s.quota.served_mins)
                        .unwrap_or(0);
                    (l.id.clone(), l.tier, served)
                })
                .collect(),
        )
    }

    fn is_running(&self, load_id: &LoadId) -> bool {
        self.states.get(load_id).is_some_and(|s| s.run.is_running)
    }

    fn running_count(&self, loads: &[LoadPolicy]) -> usize {
        loads.iter().filter(|l| self.is_running(&l.id)).count()
    }

    fn persist(&self, loads: &[LoadPolicy], dirty: &HashSet<LoadId>, now: DateTime<Local>) {
        for load in loads.iter().filter(|l| dirty.contains(&l.id)) {
            let Some(state) = self.states.get(&load.id) else {
                continue;
            };
            if let Err(e) = self.store.save_load_snapshot(&state.to_snapshot(load, now)) {
                warn!(load_id = %load.id, error = %e, "Failed to save load state");
            }
        }
    }

    fn audit(&self, event: AuditEventType, now: DateTime<Local>) {
        if let Err(e) = self.store.append_audit(AuditEvent::at(event, now)) {
            warn!(error = %e, "Failed to append audit event");
        }
    }

    /// Per-load state for status displays
    pub fn load_views(&self) -> Vec<LoadView> {
        self.policy
            .loads
            .iter()
            .filter_map(|load| {
                let state = self.states.get(&load.id)?;
                Some(LoadView {
                    load_id: load.id.clone(),
                    label: load.label.clone(),
                    tier: load.tier,
                    rated_watts: load.rated_watts,
                    needed_watts: load.needed_watts(),
                    keep_watts: load.keep_watts(),
                    monitored: load.is_monitored(),
                    status: LoadStatus::from_running(state.run.is_running),
                    quota_window_mins: load.quota_window.minutes(),
                    quota_anchor: state.quota.anchor,
                    next_rollover: state.quota.next_rollover(load.quota_window),
                    target_mins: load.target_mins,
                    served_mins: state.quota.served_mins,
                    remaining_mins: state.quota.remaining(load.target_mins),
                    progress_pct: state.quota.progress_pct(load.target_mins),
                    window_runtime_mins: state.quota.window_runtime_mins,
                    today_runtime_mins: (state.run.run_today_secs / 60) as u32,
                    started_at: state.run.start_ts,
                    cooldown_until: state.run.cooldown_until(load.cooldown_mins),
                    catchup: catchup::status(
                        &load.catchup,
                        state.quota.served_mins,
                        state.run.catchup_active,
                    ),
                    catchup_run_mins: (state.run.catchup_run_secs / 60) as u32,
                    last_reason: state.last_reason.clone(),
                })
            })
            .collect()
    }

    pub fn state_snapshot(&self) -> DaemonStateSnapshot {
        DaemonStateSnapshot {
            api_version: API_VERSION,
            max_concurrent: self.policy.service.max_concurrent_loads,
            tick_period_secs: self.policy.service.tick_period.as_secs(),
            power: self.headroom.latest_reading(),
            loads: self.load_views(),
            last_report: self.last_report.clone(),
        }
    }
}
