use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// What kind of host entity or rule a name failed to resolve to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Node,
    Parameter,
    Rule,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Node => "node",
            EntityKind::Parameter => "parameter",
            EntityKind::Rule => "rule",
        })
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] hydro_rules_core::Error),

    /// A configured name does not exist in the host model or the registry.
    #[error("unresolved {kind}: {name}")]
    DependencyResolution { kind: EntityKind, name: String },

    #[error("duplicate rule name: {0}")]
    DuplicateRule(String),

    /// A host entity was declared twice under one name.
    #[error("duplicate {kind}: {name}")]
    DuplicateEntity { kind: EntityKind, name: String },

    #[error("rule {0} does not produce an index value")]
    NotAnIndex(String),

    #[error("orchestrator used before setup")]
    NotSetUp,

    /// The host advanced timesteps out of order.
    #[error("timestep out of order: expected {expected}, got {got}")]
    TimestepOrder { expected: usize, got: usize },

    /// Month outside 1..=12 or day of year outside 1..=366.
    #[error("timestep {index} has no valid calendar date (month {month}, day {day_of_year})")]
    InvalidCalendar { index: usize, month: u32, day_of_year: u32 },

    #[error("timestep {index} beyond the {horizon}-step horizon")]
    HorizonExceeded { index: usize, horizon: usize },

    #[error("snapshot does not match this orchestrator: {0}")]
    SnapshotMismatch(String),

    #[error("summary serialisation failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn unresolved(kind: EntityKind, name: impl Into<String>) -> Self {
        Error::DependencyResolution {
            kind,
            name: name.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Core(e) if e.is_configuration())
    }

    pub fn is_dependency_resolution(&self) -> bool {
        matches!(self, Error::DependencyResolution { .. })
    }
}
