//! Mock host implementations for testing

use async_trait::async_trait;
use headroom_util::LoadId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::{HeadroomSource, HostError, HostResult, LoadActuator};

/// One recorded `set_power` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerCall {
    pub load_id: LoadId,
    pub on: bool,
    pub reason: String,
}

/// Mock actuator for unit/integration testing
#[derive(Default)]
pub struct MockActuator {
    calls: Arc<Mutex<Vec<PowerCall>>>,
    observed: Arc<Mutex<HashMap<LoadId, bool>>>,
    failing: Arc<Mutex<HashSet<LoadId>>>,

    /// Configure every command to fail
    pub fail_all: Arc<Mutex<bool>>,
}

impl MockActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far, oldest first
    pub fn calls(&self) -> Vec<PowerCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls for one load
    pub fn calls_for(&self, load_id: &LoadId) -> Vec<PowerCall> {
        self.calls()
            .into_iter()
            .filter(|c| &c.load_id == load_id)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Report this device state for a load; `None` makes it unmonitored
    pub fn set_observed(&self, load_id: &LoadId, on: Option<bool>) {
        let mut observed = self.observed.lock().unwrap();
        match on {
            Some(on) => observed.insert(load_id.clone(), on),
            None => observed.remove(load_id),
        };
    }

    /// Make commands for one load fail
    pub fn set_failing(&self, load_id: &LoadId, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(load_id.clone());
        } else {
            set.remove(load_id);
        }
    }

    pub fn set_fail_all(&self, fail: bool) {
        *self.fail_all.lock().unwrap() = fail;
    }
}

#[async_trait]
impl LoadActuator for MockActuator {
    async fn set_power(&self, load: &LoadId, on: bool, reason: &str) -> HostResult<()> {
        if *self.fail_all.lock().unwrap() || self.failing.lock().unwrap().contains(load) {
            return Err(HostError::CommandFailed(format!("Mock failure for {}", load)));
        }

        self.calls.lock().unwrap().push(PowerCall {
            load_id: load.clone(),
            on,
            reason: reason.to_string(),
        });

        // A monitored device follows the command
        let mut observed = self.observed.lock().unwrap();
        if let Some(state) = observed.get_mut(load) {
            *state = on;
        }
        Ok(())
    }

    async fn observed_external_on_state(&self, load: &LoadId) -> Option<bool> {
        self.observed.lock().unwrap().get(load).copied()
    }
}

/// Mock headroom source with a settable value
#[derive(Debug, Default)]
pub struct MockHeadroom {
    value: Mutex<Option<i64>>,
}

impl MockHeadroom {
    pub fn new(value: Option<i64>) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }

    pub fn set(&self, value: Option<i64>) {
        *self.value.lock().unwrap() = value;
    }
}

impl HeadroomSource for MockHeadroom {
    fn current_headroom_watts(&self) -> Option<i64> {
        *self.value.lock().unwrap()
    }
}
