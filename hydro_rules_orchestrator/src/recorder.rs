use serde::{Deserialize, Serialize};

use hydro_rules_core::ScenarioId;

use crate::error::{Error, Result};

/// Row-per-timestep, column-per-scenario record of one output.
///
/// Sized once at setup; never grows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesRecorder {
    name: String,
    timesteps: usize,
    scenarios: usize,
    data: Vec<f64>,
}

impl SeriesRecorder {
    pub fn new(name: impl Into<String>, timesteps: usize, scenarios: usize) -> Self {
        Self {
            name: name.into(),
            timesteps,
            scenarios,
            data: vec![0.0; timesteps * scenarios],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timesteps(&self) -> usize {
        self.timesteps
    }

    pub fn scenarios(&self) -> usize {
        self.scenarios
    }

    pub fn reset(&mut self) {
        self.data.iter_mut().for_each(|v| *v = 0.0);
    }

    pub fn record(&mut self, index: usize, scenario: ScenarioId, value: f64) -> Result<()> {
        if index >= self.timesteps {
            return Err(Error::HorizonExceeded {
                index,
                horizon: self.timesteps,
            });
        }
        if scenario >= self.scenarios {
            return Err(hydro_rules_core::Error::ScenarioOutOfRange {
                scenario,
                count: self.scenarios,
            }
            .into());
        }
        self.data[index * self.scenarios + scenario] = value;
        Ok(())
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        if index >= self.timesteps {
            return None;
        }
        let start = index * self.scenarios;
        Some(&self.data[start..start + self.scenarios])
    }

    pub fn column(&self, scenario: ScenarioId) -> Option<Vec<f64>> {
        if scenario >= self.scenarios {
            return None;
        }
        Some(
            (0..self.timesteps)
                .map(|t| self.data[t * self.scenarios + scenario])
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_and_columns() {
        let mut r = SeriesRecorder::new("x", 3, 2);
        r.record(0, 1, 5.0).unwrap();
        r.record(2, 1, 7.0).unwrap();
        assert_eq!(r.row(0).unwrap(), &[0.0, 5.0]);
        assert_eq!(r.column(1).unwrap(), vec![5.0, 0.0, 7.0]);
        assert!(r.row(3).is_none());
    }

    #[test]
    fn never_grows() {
        let mut r = SeriesRecorder::new("x", 2, 1);
        assert!(matches!(r.record(2, 0, 1.0), Err(Error::HorizonExceeded { index: 2, horizon: 2 })));
        assert!(r.record(0, 1, 1.0).is_err());
    }
}
