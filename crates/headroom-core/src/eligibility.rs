//! Day, time-of-day and quota gating, independent of power

use chrono::{DateTime, Datelike, Local};
use headroom_api::SkipReason;
use headroom_config::LoadPolicy;
use headroom_util::LoadId;

use crate::QuotaState;

/// Why a load may not run right now, first match wins:
/// day of week, then time of day, then quota.
pub fn evaluate(load: &LoadPolicy, quota: &QuotaState, now: &DateTime<Local>) -> Option<SkipReason> {
    if !load.days.contains(now.weekday()) {
        return Some(SkipReason::OutsideDays);
    }
    if !load.window.contains_time(now) {
        return Some(SkipReason::OutsideHours);
    }
    if quota.remaining(load.target_mins) == 0 {
        return Some(SkipReason::Quota);
    }
    None
}

/// Visiting order for the tier pass: ascending tier, then least served first.
/// Ties keep their configured order.
pub fn fairness_order(mut loads: Vec<(LoadId, u8, u32)>) -> Vec<LoadId> {
    loads.sort_by_key(|(_, tier, served)| (*tier, *served));
    loads.into_iter().map(|(id, _, _)| id).collect()
}
