//! Run-level outputs: the keyed summary handed to the host after a run, and
//! the state snapshot used to checkpoint and resume one.

use serde::{Deserialize, Serialize};

use hydro_rules_core::{CounterState, ForecastState};

use crate::error::Result;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CounterSummary {
    pub name: String,
    pub per_scenario: Vec<f64>,
    pub aggregated: f64,
    pub constraint_upper_bound: Option<f64>,
    pub constraint_violated: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub timesteps_completed: usize,
    pub scenarios: usize,
    pub counters: Vec<CounterSummary>,
}

impl RunSummary {
    pub fn counter(&self, name: &str) -> Option<&CounterSummary> {
        self.counters.iter().find(|c| c.name == name)
    }

    pub fn any_constraint_violated(&self) -> bool {
        self.counters.iter().any(|c| c.constraint_violated)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Storage-agnostic copy of all per-scenario component state.
///
/// Only taken between timesteps. Latches and counters are keyed by name in
/// configuration order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorSnapshot {
    pub next_timestep: usize,
    pub forecast: ForecastState,
    pub latches: Vec<(String, Vec<Option<usize>>)>,
    pub counters: Vec<(String, CounterState)>,
}
