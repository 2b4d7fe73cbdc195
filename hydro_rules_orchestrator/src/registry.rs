//! Named registry of rule outputs.
//!
//! Every output the orchestrator produces is registered under a name when
//! the orchestrator is set up. Latches and counters name their upstream
//! rule; those names are resolved here, eagerly, so a wiring mistake fails
//! setup instead of the first timestep.

use indexmap::IndexMap;

use crate::error::{EntityKind, Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Output {
    EstimatedFlow,
    AbstractionCost,
    AbstractionMax,
    ReleaseMax,
    CompensationRelease,
    CompensationInput,
    RiverIntakeMax,
    FloodCurve,
    ForecastCrossing,
    CurveCrossing,
    Latch(usize),
    Counter(usize),
}

impl Output {
    /// Produces a 0/1 (or small integer) index each timestep.
    pub fn is_index(&self) -> bool {
        matches!(
            self,
            Output::ForecastCrossing | Output::CurveCrossing | Output::Latch(_)
        )
    }

    /// Produces a value every timestep, as opposed to a run-level count.
    pub fn is_per_timestep(&self) -> bool {
        !matches!(self, Output::Counter(_))
    }
}

#[derive(Clone, Debug, Default)]
pub struct Registry {
    entries: IndexMap<String, Output>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, output: Output) -> Result<()> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(Error::DuplicateRule(name));
        }
        self.entries.insert(name, output);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<Output> {
        self.entries
            .get(name)
            .copied()
            .ok_or_else(|| Error::unresolved(EntityKind::Rule, name))
    }

    /// Resolve a name that must produce an index value.
    pub fn resolve_index(&self, name: &str) -> Result<Output> {
        let output = self.resolve(name)?;
        if output.is_index() {
            Ok(output)
        } else {
            Err(Error::NotAnIndex(name.to_string()))
        }
    }

    /// Registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Output)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
