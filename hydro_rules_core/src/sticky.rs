//! Sticky (debounced) index latch.
//!
//! Once the raw index goes positive the latch reports `1` until at least
//! `minimum_timesteps` after the last positive raw value. Re-triggering while
//! on moves the off time forward from the current timestep.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{check_scenario, Error, Result};
use crate::timestep::{ScenarioId, TimestepDelta};

/// Minimum dwell, given either in timesteps or in days.
///
/// `minimum_days` wins when both are set. Zero counts as unset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DwellCfg {
    pub minimum_timesteps: Option<u32>,
    pub minimum_days: Option<u32>,
}

impl DwellCfg {
    pub fn timesteps(n: u32) -> Self {
        Self {
            minimum_timesteps: Some(n),
            minimum_days: None,
        }
    }

    pub fn days(n: u32) -> Self {
        Self {
            minimum_timesteps: None,
            minimum_days: Some(n),
        }
    }

    /// Dwell in timesteps for a host stepping at `delta`.
    pub fn resolve(&self, delta: TimestepDelta) -> Result<u32> {
        let timesteps = self.minimum_timesteps.filter(|&n| n > 0);
        let days = self.minimum_days.filter(|&n| n > 0);

        let resolved = match (days, timesteps) {
            (None, None) => {
                return Err(Error::config(
                    "sticky",
                    "either minimum_timesteps or minimum_days must be specified",
                ))
            }
            (Some(days), _) => match delta {
                TimestepDelta::Days(step) if step > 0 => days / step,
                _ => {
                    return Err(Error::config(
                        "sticky",
                        "a dwell in days is only valid with daily timesteps",
                    ))
                }
            },
            (None, Some(n)) => n,
        };

        if resolved < 1 {
            return Err(Error::config("sticky", "dwell resolves to less than one timestep"));
        }
        Ok(resolved)
    }
}

#[derive(Clone, Debug)]
pub struct StickyLatch {
    minimum_timesteps: usize,
    /// Last timestep (inclusive) the latch stays on; `None` when disarmed.
    off_at: Vec<Option<usize>>,
}

impl StickyLatch {
    pub fn new(dwell: DwellCfg, delta: TimestepDelta) -> Result<Self> {
        let minimum_timesteps = dwell.resolve(delta)? as usize;
        Ok(Self {
            minimum_timesteps,
            off_at: Vec::new(),
        })
    }

    pub fn minimum_timesteps(&self) -> usize {
        self.minimum_timesteps
    }

    pub fn setup(&mut self, scenarios: usize) {
        self.off_at = vec![None; scenarios];
    }

    pub fn reset(&mut self) {
        self.off_at.iter_mut().for_each(|v| *v = None);
    }

    pub fn scenarios(&self) -> usize {
        self.off_at.len()
    }

    pub fn off_at(&self, scenario: ScenarioId) -> Result<Option<usize>> {
        check_scenario(scenario, self.off_at.len())?;
        Ok(self.off_at[scenario])
    }

    /// Feed the raw index for `timestep` and return the latched value.
    pub fn update(&mut self, scenario: ScenarioId, raw: u32, timestep: usize) -> Result<u32> {
        check_scenario(scenario, self.off_at.len())?;
        let slot = &mut self.off_at[scenario];

        if let Some(off) = *slot {
            let off = if raw > 0 {
                let extended = timestep + self.minimum_timesteps;
                *slot = Some(extended);
                extended
            } else {
                off
            };
            if timestep <= off {
                return Ok(1);
            }
        }

        if raw > 0 {
            let off = timestep + self.minimum_timesteps;
            *slot = Some(off);
            trace!(scenario, timestep, off, "latch armed");
            Ok(1)
        } else {
            if slot.take().is_some() {
                trace!(scenario, timestep, "latch released");
            }
            Ok(0)
        }
    }

    pub fn state(&self) -> Vec<Option<usize>> {
        self.off_at.clone()
    }

    pub fn check_state(&self, off_at: &[Option<usize>]) -> Result<()> {
        if off_at.len() != self.off_at.len() {
            return Err(Error::StateMismatch {
                component: "sticky",
                message: format!("expected {} scenarios, got {}", self.off_at.len(), off_at.len()),
            });
        }
        Ok(())
    }

    pub fn restore(&mut self, off_at: Vec<Option<usize>>) -> Result<()> {
        self.check_state(&off_at)?;
        self.off_at = off_at;
        Ok(())
    }
}
