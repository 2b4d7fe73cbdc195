use serde::{Deserialize, Serialize};

use hydro_rules_core::{DwellCfg, EventCountCfg, RulesCfg};

/// Output names the orchestrator registers for its fixed rules.
pub mod names {
    pub const ESTIMATED_FLOW: &str = "Estimated Addingham Flow";
    pub const ABSTRACTION_COST: &str = "Lobwood Abstraction Cost";
    pub const ABSTRACTION_MAX: &str = "Lobwood Abstraction Maximum";
    pub const RELEASE_MAX: &str = "Grimwith Release Max";
    pub const COMPENSATION_RELEASE: &str = "Grimwith Compensation Release";
    pub const COMPENSATION_INPUT: &str = "Grimwith Compensation Input";
    pub const RIVER_INTAKE_MAX: &str = "Allowed Lobwood River Intake";
    pub const FLOOD_CURVE: &str = "Nidd Group line0";
    pub const FORECAST_CROSSING: &str = "Group TUBs forecast";
    pub const CURVE_CROSSING: &str = "Group NEUBs crossed";

    pub const TUBS_ACTIVE: &str = "Group TUBs active";
    pub const NEUBS_ACTIVE: &str = "Group NEUBs active";
    pub const TUBS_COUNT: &str = "Group TUBs Annual Count";
    pub const NEUBS_COUNT: &str = "Group NEUBs Annual Count";
}

/// Where an abstraction limit comes from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitSource {
    /// The value held in `RulesCfg::abstraction_limit`.
    Configured,
    /// A host parameter, read every timestep.
    Parameter(String),
}

/// Names of the host entities the rules read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyCfg {
    pub gauge_node: String,
    pub inflow_parameter: String,
    pub inflow_node: String,
    pub compensation_parameter: String,
    /// Storage (usually aggregated) the control curve applies to.
    pub storage_node: String,
    /// Control curve as a fraction of the storage's max volume.
    pub control_curve_parameter: String,
    pub high_flow_limit: LimitSource,
    pub low_flow_limit: LimitSource,
    /// Draw-down fraction for the flood curve; needed only when
    /// `RulesCfg::flood_profile` is set.
    pub flood_draw_down_parameter: Option<String>,
}

impl Default for TopologyCfg {
    fn default() -> Self {
        Self {
            gauge_node: "Addingham".to_string(),
            inflow_parameter: "Wharfe2 Inflow".to_string(),
            inflow_node: "Wharfe2In".to_string(),
            compensation_parameter: "Grimwith Compensation Flow".to_string(),
            storage_node: "Group Storage".to_string(),
            control_curve_parameter: "Group line7".to_string(),
            high_flow_limit: LimitSource::Configured,
            low_flow_limit: LimitSource::Configured,
            flood_draw_down_parameter: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatchSpec {
    pub name: String,
    /// Index rule (or earlier latch) feeding this latch.
    pub source: String,
    pub dwell: DwellCfg,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CounterSpec {
    pub name: String,
    pub source: String,
    pub events: EventCountCfg,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorCfg {
    pub rules: RulesCfg,
    pub topology: TopologyCfg,
    /// Evaluated in order; a latch may only follow an earlier one.
    pub latches: Vec<LatchSpec>,
    pub counters: Vec<CounterSpec>,
}

impl Default for OrchestratorCfg {
    fn default() -> Self {
        let dwell = DwellCfg::days(12 * 7);
        Self {
            rules: RulesCfg::default(),
            topology: TopologyCfg::default(),
            latches: vec![
                LatchSpec {
                    name: names::TUBS_ACTIVE.to_string(),
                    source: names::FORECAST_CROSSING.to_string(),
                    dwell,
                },
                LatchSpec {
                    name: names::NEUBS_ACTIVE.to_string(),
                    source: names::CURVE_CROSSING.to_string(),
                    dwell,
                },
            ],
            counters: vec![
                CounterSpec {
                    name: names::TUBS_COUNT.to_string(),
                    source: names::TUBS_ACTIVE.to_string(),
                    events: EventCountCfg {
                        constraint_upper_bound: Some((95 / 25) as f64),
                        ..EventCountCfg::default()
                    },
                },
                CounterSpec {
                    name: names::NEUBS_COUNT.to_string(),
                    source: names::NEUBS_ACTIVE.to_string(),
                    events: EventCountCfg {
                        constraint_upper_bound: Some((95 / 80) as f64),
                        ..EventCountCfg::default()
                    },
                },
            ],
        }
    }
}
