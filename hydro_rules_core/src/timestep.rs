use serde::{Deserialize, Serialize};

/// Index of an independent scenario, in `[0, N)`.
pub type ScenarioId = usize;

/// One step of the host's timestepper.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestep {
    pub index: usize,
    pub day_of_year: u32,
    /// Calendar month, 1..=12.
    pub month: u32,
}

impl Timestep {
    pub fn new(index: usize, day_of_year: u32, month: u32) -> Self {
        Self {
            index,
            day_of_year,
            month,
        }
    }

    /// Month in 1..=12 and day of year in 1..=366.
    pub fn has_valid_calendar(&self) -> bool {
        (1..=12).contains(&self.month) && (1..=366).contains(&self.day_of_year)
    }

    /// Zero-based month, usable as an index into a 12-entry table.
    ///
    /// Only meaningful for a timestep that passes [`has_valid_calendar`](Self::has_valid_calendar);
    /// anything else stays in bounds but is not a real month.
    #[inline]
    pub fn month_index(&self) -> usize {
        (self.month.clamp(1, 12) - 1) as usize
    }
}

/// Length of one host timestep.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestepDelta {
    Days(u32),
    /// Monthly or any other calendar-based stepping.
    NonDaily,
}
