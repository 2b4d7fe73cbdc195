//! Rolling forecast of a control-curve crossing.
//!
//! Each timestep the settled storage gradient of every scenario is written
//! into a circular buffer of `rolling_window` rows. After the write, a
//! forecast volume `volume + mean(gradient) * forecast_window` is cached per
//! scenario. The crossing decision taken during the next timestep reads that
//! cached forecast, so the detector runs one timestep behind its samples:
//!
//! ```text
//! t:   is_crossing (reads forecast from t-1)  ->  solve  ->  record_sample, advance
//! ```

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{check_scenario, Error, Result};
use crate::timestep::ScenarioId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastCfg {
    /// Number of past gradient samples averaged.
    pub rolling_window: usize,
    /// Horizon, in timesteps, the mean gradient is projected over.
    pub forecast_window: usize,
}

impl Default for ForecastCfg {
    fn default() -> Self {
        Self {
            rolling_window: 4 * 7,
            forecast_window: 6 * 7,
        }
    }
}

impl ForecastCfg {
    pub fn validate(&self) -> Result<()> {
        if self.rolling_window == 0 {
            return Err(Error::config("forecast", "rolling_window must be at least 1"));
        }
        Ok(())
    }
}

/// Plain copy of the detector's mutable state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastState {
    pub position: usize,
    pub elapsed: usize,
    /// Row-major `(rolling_window, scenarios)`.
    pub memory: Vec<f64>,
    pub volume: Vec<f64>,
    pub forecast_volume: Vec<f64>,
}

#[derive(Clone, Debug)]
pub struct ForecastDetector {
    cfg: ForecastCfg,
    scenarios: usize,
    memory: Vec<f64>,
    volume: Vec<f64>,
    forecast_volume: Vec<f64>,
    position: usize,
    /// Timesteps advanced since reset.
    elapsed: usize,
}

impl ForecastDetector {
    pub fn new(cfg: ForecastCfg) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            scenarios: 0,
            memory: Vec::new(),
            volume: Vec::new(),
            forecast_volume: Vec::new(),
            position: 0,
            elapsed: 0,
        })
    }

    pub fn cfg(&self) -> &ForecastCfg {
        &self.cfg
    }

    /// Allocate per-scenario state. Called once, when the scenario count is known.
    pub fn setup(&mut self, scenarios: usize) {
        self.scenarios = scenarios;
        self.memory = vec![0.0; self.cfg.rolling_window * scenarios];
        self.volume = vec![0.0; scenarios];
        self.forecast_volume = vec![0.0; scenarios];
        self.position = 0;
        self.elapsed = 0;
    }

    pub fn reset(&mut self) {
        self.memory.iter_mut().for_each(|v| *v = 0.0);
        self.volume.iter_mut().for_each(|v| *v = 0.0);
        self.forecast_volume.iter_mut().for_each(|v| *v = 0.0);
        self.position = 0;
        self.elapsed = 0;
    }

    pub fn scenarios(&self) -> usize {
        self.scenarios
    }

    /// Row the next sample is written to.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Rows holding a sample written since reset.
    pub fn fill_count(&self) -> usize {
        self.elapsed.min(self.cfg.rolling_window)
    }

    /// Write this timestep's settled gradient and volume for one scenario.
    pub fn record_sample(&mut self, scenario: ScenarioId, gradient: f64, volume: f64) -> Result<()> {
        check_scenario(scenario, self.scenarios)?;
        self.memory[self.position * self.scenarios + scenario] = gradient;
        self.volume[scenario] = volume;
        Ok(())
    }

    /// Close the timestep: refresh every scenario's forecast and move the cursor.
    pub fn advance(&mut self) {
        self.elapsed += 1;
        let horizon = self.cfg.forecast_window as f64;
        for scenario in 0..self.scenarios {
            self.forecast_volume[scenario] = self.project(scenario, horizon);
        }
        self.position = (self.position + 1) % self.cfg.rolling_window;
        trace!(position = self.position, elapsed = self.elapsed, "forecast advanced");
    }

    fn mean_gradient(&self, scenario: ScenarioId) -> f64 {
        let n = self.fill_count();
        if n == 0 {
            return 0.0;
        }
        let sum: f64 = (0..n)
            .map(|row| self.memory[row * self.scenarios + scenario])
            .sum();
        sum / n as f64
    }

    fn project(&self, scenario: ScenarioId, horizon: f64) -> f64 {
        self.volume[scenario] + self.mean_gradient(scenario) * horizon
    }

    /// Last recorded volume projected `horizon` timesteps ahead at the mean gradient.
    pub fn forecast(&self, scenario: ScenarioId, horizon: f64) -> Result<f64> {
        check_scenario(scenario, self.scenarios)?;
        Ok(self.project(scenario, horizon))
    }

    /// Forecast cached by the most recent [`advance`](Self::advance).
    pub fn forecast_volume(&self, scenario: ScenarioId) -> Result<f64> {
        check_scenario(scenario, self.scenarios)?;
        Ok(self.forecast_volume[scenario])
    }

    /// `1` if storage is below the curve or forecast to fall below it, else `0`.
    ///
    /// Before `rolling_window` timesteps have elapsed only the immediate
    /// comparison is trusted.
    pub fn is_crossing(
        &self,
        scenario: ScenarioId,
        control_curve_value: f64,
        current_volume: f64,
        timestep_index: usize,
    ) -> Result<u32> {
        check_scenario(scenario, self.scenarios)?;
        if current_volume < control_curve_value {
            return Ok(1);
        }
        if timestep_index < self.cfg.rolling_window {
            return Ok(0);
        }
        Ok((self.forecast_volume[scenario] < control_curve_value) as u32)
    }

    pub fn state(&self) -> ForecastState {
        ForecastState {
            position: self.position,
            elapsed: self.elapsed,
            memory: self.memory.clone(),
            volume: self.volume.clone(),
            forecast_volume: self.forecast_volume.clone(),
        }
    }

    /// Check that `state` fits this detector without touching anything.
    pub fn check_state(&self, state: &ForecastState) -> Result<()> {
        let mismatch = |message: String| Error::StateMismatch {
            component: "forecast",
            message,
        };
        if state.memory.len() != self.memory.len() {
            return Err(mismatch(format!(
                "memory has {} slots, expected {}",
                state.memory.len(),
                self.memory.len()
            )));
        }
        if state.volume.len() != self.scenarios || state.forecast_volume.len() != self.scenarios {
            return Err(mismatch(format!("expected {} scenarios", self.scenarios)));
        }
        if state.position >= self.cfg.rolling_window {
            return Err(mismatch(format!("cursor {} outside window", state.position)));
        }
        Ok(())
    }

    pub fn restore(&mut self, state: ForecastState) -> Result<()> {
        self.check_state(&state)?;
        self.position = state.position;
        self.elapsed = state.elapsed;
        self.memory = state.memory;
        self.volume = state.volume;
        self.forecast_volume = state.forecast_volume;
        Ok(())
    }
}
