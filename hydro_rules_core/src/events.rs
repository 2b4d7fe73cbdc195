//! Threshold event counting.
//!
//! An event starts whenever the monitored index reaches `threshold` after a
//! timestep below it. A run of consecutive timesteps at or above the
//! threshold counts once.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{check_scenario, Error, Result};
use crate::timestep::ScenarioId;

/// How per-scenario counts reduce to one run-level value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregation {
    #[default]
    Mean,
    Sum,
    Min,
    Max,
}

impl Aggregation {
    pub fn apply(&self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        match self {
            Aggregation::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Aggregation::Sum => values.iter().sum(),
            Aggregation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventCountCfg {
    pub threshold: u32,
    /// Aggregated count above this bound violates the constraint.
    pub constraint_upper_bound: Option<f64>,
    pub aggregation: Aggregation,
}

impl EventCountCfg {
    /// A zero threshold can never be crossed from below, so nothing would count.
    pub fn validate(&self, component: &str) -> Result<()> {
        if self.threshold == 0 {
            return Err(Error::config(component, "event threshold must be at least 1"));
        }
        if let Some(bound) = self.constraint_upper_bound {
            if bound.is_nan() {
                return Err(Error::config(component, "constraint upper bound is NaN"));
            }
        }
        Ok(())
    }
}

impl Default for EventCountCfg {
    fn default() -> Self {
        Self {
            threshold: 1,
            constraint_upper_bound: None,
            aggregation: Aggregation::Mean,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterState {
    pub count: Vec<u32>,
    pub previous: Vec<u32>,
}

#[derive(Clone, Debug)]
pub struct EventCounter {
    cfg: EventCountCfg,
    state: CounterState,
}

impl EventCounter {
    pub fn new(cfg: EventCountCfg) -> Self {
        Self {
            cfg,
            state: CounterState::default(),
        }
    }

    pub fn cfg(&self) -> &EventCountCfg {
        &self.cfg
    }

    pub fn setup(&mut self, scenarios: usize) {
        self.state.count = vec![0; scenarios];
        self.state.previous = vec![0; scenarios];
    }

    pub fn reset(&mut self) {
        self.state.count.iter_mut().for_each(|v| *v = 0);
        self.state.previous.iter_mut().for_each(|v| *v = 0);
    }

    /// Record this timestep's index value. Returns `true` when a new event starts.
    pub fn observe(&mut self, scenario: ScenarioId, value: u32) -> Result<bool> {
        check_scenario(scenario, self.state.count.len())?;
        let previous = self.state.previous[scenario];
        let started = value >= self.cfg.threshold && self.cfg.threshold > previous;
        if started {
            self.state.count[scenario] += 1;
            trace!(scenario, count = self.state.count[scenario], "event started");
        }
        self.state.previous[scenario] = value;
        Ok(started)
    }

    pub fn count(&self, scenario: ScenarioId) -> Result<u32> {
        check_scenario(scenario, self.state.count.len())?;
        Ok(self.state.count[scenario])
    }

    /// Per-scenario counts as floats.
    pub fn values(&self) -> Vec<f64> {
        self.state.count.iter().map(|&c| c as f64).collect()
    }

    pub fn aggregated_value(&self) -> f64 {
        self.cfg.aggregation.apply(&self.values())
    }

    pub fn is_constraint_violated(&self) -> bool {
        match self.cfg.constraint_upper_bound {
            Some(bound) => self.aggregated_value() > bound,
            None => false,
        }
    }

    pub fn state(&self) -> &CounterState {
        &self.state
    }

    pub fn check_state(&self, state: &CounterState) -> Result<()> {
        let n = self.state.count.len();
        if state.count.len() != n || state.previous.len() != n {
            return Err(Error::StateMismatch {
                component: "event_counter",
                message: format!("expected {} scenarios", n),
            });
        }
        Ok(())
    }

    pub fn restore(&mut self, state: CounterState) -> Result<()> {
        self.check_state(&state)?;
        self.state = state;
        Ok(())
    }
}
