use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::flood::FloodProfile;
use crate::forecast::ForecastCfg;
use crate::tiers::{AbstractionCost, AbstractionLimit, CompensationRelease, ReleaseMax, RiverIntake};

/// Bump when a field changes meaning or a default value moves.
pub const RULES_CFG_VERSION: u32 = 1;

/// Numeric configuration of every rule. Defaults reproduce the operating
/// rules of the Lobwood / Grimwith system.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesCfg {
    pub version: u32,
    pub abstraction_cost: AbstractionCost,
    pub release_max: ReleaseMax,
    pub abstraction_limit: AbstractionLimit,
    pub compensation: CompensationRelease,
    pub river_intake: RiverIntake,
    pub forecast: ForecastCfg,
    pub flood_profile: Option<FloodProfile>,
}

impl Default for RulesCfg {
    fn default() -> Self {
        Self {
            version: RULES_CFG_VERSION,
            abstraction_cost: AbstractionCost::default(),
            release_max: ReleaseMax::default(),
            abstraction_limit: AbstractionLimit::default(),
            compensation: CompensationRelease::default(),
            river_intake: RiverIntake::default(),
            forecast: ForecastCfg::default(),
            flood_profile: None,
        }
    }
}

impl RulesCfg {
    pub fn validate(&self) -> Result<()> {
        if self.version != RULES_CFG_VERSION {
            return Err(Error::config(
                "rules",
                format!("unsupported version {} (expected {})", self.version, RULES_CFG_VERSION),
            ));
        }
        self.abstraction_cost.bands.validate("abstraction_cost")?;
        self.release_max.steps.validate("release_max")?;
        self.river_intake.validate()?;
        self.forecast.validate()?;
        Ok(())
    }
}
