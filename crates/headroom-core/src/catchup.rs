//! Minimum-runtime guarantee inside a fallback window

use chrono::{DateTime, Local};
use headroom_api::{CatchupStatus, StopReason};
use headroom_config::{CatchupPolicy, LoadPolicy};

use crate::RunState;

/// Minutes still owed: `max(0, catchup_runtime - served)`
pub fn deficit_mins(catchup: &CatchupPolicy, served_mins: u32) -> u32 {
    catchup.target_mins().saturating_sub(served_mins)
}

/// What the catch-up column shows for a load
pub fn status(catchup: &CatchupPolicy, served_mins: u32, active: bool) -> CatchupStatus {
    if catchup.target_mins() == 0 {
        return CatchupStatus::Off;
    }
    match deficit_mins(catchup, served_mins) {
        0 => CatchupStatus::Met,
        remaining_mins if active => CatchupStatus::Active { remaining_mins },
        remaining_mins => CatchupStatus::Needed { remaining_mins },
    }
}

/// Tick-wide limits the controller must respect
#[derive(Debug, Clone, Copy)]
pub struct CatchupBudget {
    pub running: usize,
    pub max_concurrent: usize,
    /// A catch-up start already happened this tick
    pub started: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatchupDecision {
    Nothing,
    /// Drop the active flag without commanding the load
    ClearFlag,
    Start { deficit_mins: u32 },
    Stop(StopReason),
}

/// Decide the catch-up transition for one load.
///
/// A load running for ordinary reasons is never marked active; its runtime
/// reduces the deficit anyway.
pub fn decide(
    load: &LoadPolicy,
    served_mins: u32,
    run: &RunState,
    now: &DateTime<Local>,
    budget: CatchupBudget,
) -> CatchupDecision {
    let catchup = &load.catchup;
    if catchup.target_mins() == 0 {
        return if run.catchup_active {
            CatchupDecision::ClearFlag
        } else {
            CatchupDecision::Nothing
        };
    }

    let deficit = deficit_mins(catchup, served_mins);
    let in_window = catchup.window.contains_time(now);

    if run.catchup_active {
        if !run.is_running {
            return CatchupDecision::ClearFlag;
        }
        if deficit == 0 {
            return CatchupDecision::Stop(StopReason::CatchupSatisfied);
        }
        if !in_window {
            return CatchupDecision::Stop(StopReason::CatchupWindowClosed);
        }
        return CatchupDecision::Nothing;
    }

    if run.is_running {
        return CatchupDecision::Nothing;
    }

    if deficit > 0 && in_window && budget.running < budget.max_concurrent && !budget.started {
        return CatchupDecision::Start { deficit_mins: deficit };
    }

    CatchupDecision::Nothing
}
