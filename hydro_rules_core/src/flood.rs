//! Seasonal flood draw-down curve.
//!
//! Inside the closed season (`end_doy < day < start_doy`) the curve sits
//! above full storage so no flood release is triggered; outside it the curve
//! follows an externally supplied draw-down fraction. The two day-of-year
//! bounds are integer decision variables for an outer optimiser.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const INTEGER_LOWER_BOUNDS: [u32; 2] = [214, 0];
pub const INTEGER_UPPER_BOUNDS: [u32; 2] = [367, 244];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloodProfile {
    pub start_doy: u32,
    pub end_doy: u32,
    /// Curve value during the closed season.
    pub inactive_value: f64,
}

impl Default for FloodProfile {
    fn default() -> Self {
        Self {
            start_doy: 306,
            end_doy: 91,
            inactive_value: 1.01,
        }
    }
}

impl FloodProfile {
    pub fn value(&self, day_of_year: u32, draw_down_pc: f64) -> f64 {
        if self.end_doy < day_of_year && day_of_year < self.start_doy {
            self.inactive_value
        } else {
            draw_down_pc
        }
    }

    pub fn integer_variables(&self) -> [u32; 2] {
        [self.start_doy, self.end_doy]
    }

    pub fn set_integer_variables(&mut self, values: [u32; 2]) -> Result<()> {
        for (i, v) in values.iter().enumerate() {
            if *v < INTEGER_LOWER_BOUNDS[i] || *v > INTEGER_UPPER_BOUNDS[i] {
                return Err(Error::config(
                    "flood_profile",
                    format!(
                        "variable {} = {} outside [{}, {}]",
                        i, v, INTEGER_LOWER_BOUNDS[i], INTEGER_UPPER_BOUNDS[i]
                    ),
                ));
            }
        }
        self.start_doy = values[0];
        self.end_doy = values[1];
        Ok(())
    }
}
