//! hydro_rules_core
//!
//! Per-timestep reservoir operating rules evaluated by a host network
//! simulation: gauge flow estimate, tiered cost and limit functions, rolling
//! forecast of a control-curve crossing, sticky latch and event counter.
//!
//! Everything here is synchronous and host-agnostic. Per-scenario state lives
//! in plain vectors sized at setup; scenarios never share state.

pub mod error;
pub mod timestep;

pub mod cfg;
pub mod control_curve;
pub mod events;
pub mod flood;
pub mod flow;
pub mod forecast;
pub mod sticky;
pub mod tiers;

pub use error::{Error, Result};
pub use timestep::{ScenarioId, Timestep, TimestepDelta};

pub use cfg::{RulesCfg, RULES_CFG_VERSION};
pub use control_curve::{absolute_level, crossing_index};
pub use events::{Aggregation, CounterState, EventCountCfg, EventCounter};
pub use flood::FloodProfile;
pub use flow::FlowObservation;
pub use forecast::{ForecastCfg, ForecastDetector, ForecastState};
pub use sticky::{DwellCfg, StickyLatch};
pub use tiers::{
    AbstractionCost, AbstractionLimit, Band, CompensationRelease, LowerInclusiveSteps, ReleaseMax,
    RiverIntake, Step, UpperInclusiveBands,
};
