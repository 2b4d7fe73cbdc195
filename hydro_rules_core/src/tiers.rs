//! Tiered decision functions.
//!
//! Each rule maps a flow signal (plus, for some, an extra externally supplied
//! value) onto a cost or a flow limit through ordered threshold bands. They
//! hold no state; the structs below are their configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::timestep::Timestep;

// ---------------------------------------------------------------------
// Ladders
// ---------------------------------------------------------------------

/// One band of an [`UpperInclusiveBands`] ladder.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub upper: f64,
    pub value: f64,
}

/// Bands of the form `(lower, upper]`, the first band opening at `floor`.
///
/// A signal equal to a band edge belongs to the band below the edge.
/// Anything at or below `floor`, above the last edge, or NaN gets `otherwise`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpperInclusiveBands {
    pub floor: f64,
    pub bands: Vec<Band>,
    pub otherwise: f64,
}

impl UpperInclusiveBands {
    pub fn decide(&self, signal: f64) -> f64 {
        if signal > self.floor {
            for band in &self.bands {
                if signal <= band.upper {
                    return band.value;
                }
            }
        }
        self.otherwise
    }

    pub fn validate(&self, component: &str) -> Result<()> {
        let mut edge = self.floor;
        for band in &self.bands {
            if !(band.upper > edge) {
                return Err(Error::config(
                    component,
                    format!("band edge {} does not exceed {}", band.upper, edge),
                ));
            }
            edge = band.upper;
        }
        Ok(())
    }
}

/// One step of a [`LowerInclusiveSteps`] ladder.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub min: f64,
    pub value: f64,
}

/// Thresholds of the form `signal >= min`, listed from the highest down.
///
/// A signal equal to a threshold belongs to the band above it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LowerInclusiveSteps {
    pub steps: Vec<Step>,
    pub otherwise: f64,
}

impl LowerInclusiveSteps {
    pub fn decide(&self, signal: f64) -> f64 {
        for step in &self.steps {
            if signal >= step.min {
                return step.value;
            }
        }
        self.otherwise
    }

    pub fn validate(&self, component: &str) -> Result<()> {
        for pair in self.steps.windows(2) {
            if !(pair[0].min > pair[1].min) {
                return Err(Error::config(
                    component,
                    format!("threshold {} must exceed the next {}", pair[0].min, pair[1].min),
                ));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Rule instances
// ---------------------------------------------------------------------

/// Abstraction cost by estimated gauge flow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AbstractionCost {
    pub bands: UpperInclusiveBands,
}

impl Default for AbstractionCost {
    fn default() -> Self {
        Self {
            bands: UpperInclusiveBands {
                floor: 0.0,
                bands: vec![
                    Band { upper: 120.0, value: 100.0 },
                    Band { upper: 242.0, value: 50.0 },
                    Band { upper: 379.0, value: -10.0 },
                    Band { upper: 469.0, value: -70.0 },
                ],
                // Dry (<= 0) and very high flows both land here.
                otherwise: -70.0,
            },
        }
    }
}

impl AbstractionCost {
    #[inline]
    pub fn decide(&self, flow: f64) -> f64 {
        self.bands.decide(flow)
    }
}

/// Maximum reservoir release by estimated gauge flow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReleaseMax {
    pub steps: LowerInclusiveSteps,
}

impl Default for ReleaseMax {
    fn default() -> Self {
        Self {
            steps: LowerInclusiveSteps {
                steps: vec![
                    Step { min: 389.0, value: 0.0 },
                    Step { min: 252.0, value: 81.8 },
                ],
                otherwise: 88.6,
            },
        }
    }
}

impl ReleaseMax {
    #[inline]
    pub fn decide(&self, flow: f64) -> f64 {
        self.steps.decide(flow)
    }
}

/// Abstraction limit: the high-flow limit at or above `threshold`, the
/// low-flow limit below it.
///
/// The two limits are signals in their own right; `high_flow_limit` and
/// `low_flow_limit` here are only the values used when the host wires them
/// as constants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AbstractionLimit {
    pub threshold: f64,
    pub high_flow_limit: f64,
    pub low_flow_limit: f64,
}

impl Default for AbstractionLimit {
    fn default() -> Self {
        Self {
            threshold: 488.0,
            high_flow_limit: 93.2,
            low_flow_limit: 88.6,
        }
    }
}

impl AbstractionLimit {
    #[inline]
    pub fn decide(&self, flow: f64, high_limit: f64, low_limit: f64) -> f64 {
        if flow >= self.threshold {
            high_limit
        } else {
            low_limit
        }
    }
}

/// Compensation release: a month table, uplifted when the gauge runs low.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompensationRelease {
    pub monthly_base: [f64; 12],
    pub low_flow_threshold: f64,
    pub low_flow_uplift: f64,
}

impl Default for CompensationRelease {
    fn default() -> Self {
        Self {
            monthly_base: [
                15.1, 15.1, 15.1, 10.72, 3.8, 3.8, 3.8, 3.8, 3.8, 9.625, 15.1, 15.1,
            ],
            low_flow_threshold: 252.0,
            low_flow_uplift: 22.7,
        }
    }
}

impl CompensationRelease {
    pub fn decide(&self, flow: f64, timestep: &Timestep) -> f64 {
        let base = self.monthly_base[timestep.month_index()];
        if flow < self.low_flow_threshold {
            base + self.low_flow_uplift
        } else {
            base
        }
    }
}

/// Allowed river intake, combining the flow ladder with the current
/// compensation flow.
///
/// - `flow >= high_flow_threshold`: the high-flow abstraction limit
/// - `flow >= mid_flow_threshold`: `mid_flow_allowance`
/// - `flow >= low_flow_threshold`: compensation + `low_flow_offset`
/// - otherwise: compensation + `base_offset`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiverIntake {
    pub high_flow_threshold: f64,
    pub mid_flow_threshold: f64,
    pub mid_flow_allowance: f64,
    pub low_flow_threshold: f64,
    pub low_flow_offset: f64,
    pub base_offset: f64,
}

impl Default for RiverIntake {
    fn default() -> Self {
        Self {
            high_flow_threshold: 488.0,
            mid_flow_threshold: 389.0,
            mid_flow_allowance: 88.6,
            low_flow_threshold: 252.0,
            low_flow_offset: 6.8,
            base_offset: 0.0,
        }
    }
}

impl RiverIntake {
    pub fn decide(&self, flow: f64, compensation: f64, high_flow_limit: f64) -> f64 {
        if flow >= self.high_flow_threshold {
            high_flow_limit
        } else if flow >= self.mid_flow_threshold {
            self.mid_flow_allowance
        } else if flow >= self.low_flow_threshold {
            self.low_flow_offset + compensation
        } else {
            self.base_offset + compensation
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.high_flow_threshold > self.mid_flow_threshold
            && self.mid_flow_threshold > self.low_flow_threshold
        {
            Ok(())
        } else {
            Err(Error::config(
                "river_intake",
                "thresholds must be strictly descending high > mid > low",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(month: u32) -> Timestep {
        Timestep::new(0, 1, month)
    }

    #[test]
    fn cost_edges_belong_to_lower_band() {
        let c = AbstractionCost::default();
        assert_eq!(c.decide(120.0), 100.0);
        assert_eq!(c.decide(120.000001), 50.0);
        assert_eq!(c.decide(242.0), 50.0);
        assert_eq!(c.decide(379.0), -10.0);
        assert_eq!(c.decide(379.5), -70.0);
        assert_eq!(c.decide(10_000.0), -70.0);
    }

    #[test]
    fn cost_at_or_below_zero_falls_through() {
        let c = AbstractionCost::default();
        assert_eq!(c.decide(0.0), -70.0);
        assert_eq!(c.decide(-5.0), -70.0);
        assert_eq!(c.decide(0.5), 100.0);
    }

    #[test]
    fn release_edges_belong_to_upper_band() {
        let r = ReleaseMax::default();
        assert_eq!(r.decide(389.0), 0.0);
        assert_eq!(r.decide(388.9), 81.8);
        assert_eq!(r.decide(252.0), 81.8);
        assert_eq!(r.decide(251.9), 88.6);
        assert_eq!(r.decide(-1.0), 88.6);
    }

    #[test]
    fn abstraction_limit_switches_at_threshold() {
        let a = AbstractionLimit::default();
        assert_eq!(a.decide(488.0, 93.2, 88.6), 93.2);
        assert_eq!(a.decide(487.99, 93.2, 88.6), 88.6);
        // limits are inputs, not the configured defaults
        assert_eq!(a.decide(600.0, 1.0, 2.0), 1.0);
    }

    #[test]
    fn compensation_by_month_with_uplift() {
        let c = CompensationRelease::default();
        assert_eq!(c.decide(300.0, &ts(1)), 15.1);
        assert_eq!(c.decide(300.0, &ts(4)), 10.72);
        assert_eq!(c.decide(252.0, &ts(10)), 9.625);
        assert_eq!(c.decide(251.0, &ts(6)), 3.8 + 22.7);
    }

    #[test]
    fn river_intake_four_bands() {
        let r = RiverIntake::default();
        assert_eq!(r.decide(488.0, 15.1, 93.2), 93.2);
        assert_eq!(r.decide(389.0, 15.1, 93.2), 88.6);
        assert_eq!(r.decide(252.0, 15.1, 93.2), 6.8 + 15.1);
        assert_eq!(r.decide(100.0, 15.1, 93.2), 15.1);
    }

    #[test]
    fn ladder_validation_rejects_unordered_edges() {
        let bad = UpperInclusiveBands {
            floor: 0.0,
            bands: vec![Band { upper: 10.0, value: 1.0 }, Band { upper: 5.0, value: 2.0 }],
            otherwise: 0.0,
        };
        assert!(bad.validate("test").unwrap_err().is_configuration());

        let bad = LowerInclusiveSteps {
            steps: vec![Step { min: 5.0, value: 1.0 }, Step { min: 5.0, value: 2.0 }],
            otherwise: 0.0,
        };
        assert!(bad.validate("test").is_err());
        assert!(ReleaseMax::default().steps.validate("release").is_ok());
    }
}
