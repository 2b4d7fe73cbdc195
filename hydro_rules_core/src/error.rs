//! Errors raised by the rule components.
//!
//! Everything here is fatal for the run: a rule that cannot be configured or
//! is queried for a scenario it was never sized for must abort instead of
//! feeding a wrong number into the solver.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    /// Invalid or unresolvable configuration (dwell, ladders, windows).
    #[error("configuration error in {component}: {message}")]
    Configuration {
        component: String,
        message: String,
    },

    /// A scenario id outside the count the component was set up with.
    #[error("scenario {scenario} out of range (scenario count {count})")]
    ScenarioOutOfRange { scenario: usize, count: usize },

    /// Restored state does not match the shape of the component.
    #[error("state shape mismatch in {component}: {message}")]
    StateMismatch {
        component: &'static str,
        message: String,
    },
}

impl Error {
    pub(crate) fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Configuration {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }
}

#[inline]
pub(crate) fn check_scenario(scenario: usize, count: usize) -> Result<()> {
    if scenario < count {
        Ok(())
    } else {
        Err(Error::ScenarioOutOfRange { scenario, count })
    }
}
