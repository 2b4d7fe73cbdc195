//! hydro_rules_orchestrator
//!
//! Host-facing layer for `hydro_rules_core`.
//!
//! Responsibilities:
//! - resolve rule inputs by name against the host network, once, at setup
//! - own per-scenario latch, counter and forecast state
//! - evaluate every rule in dependency order each timestep
//! - record per-timestep series and a run-level summary
//!
//! Non-goals:
//! - no IO
//! - no async
//! - no rule logic (lives in core)

pub mod cfg;
pub mod error;
pub mod host;
pub mod orchestrator;
pub mod recorder;
pub mod registry;
pub mod summary;

pub use cfg::{names, CounterSpec, LatchSpec, LimitSource, OrchestratorCfg, TopologyCfg};
pub use error::{EntityKind, Error, Result};
pub use host::{HostModel, InMemoryModel, NodeHandle, NodeObservables, ParameterHandle};
pub use orchestrator::{RuleOrchestrator, ScenarioDecision};
pub use recorder::SeriesRecorder;
pub use registry::{Output, Registry};
pub use summary::{CounterSummary, OrchestratorSnapshot, RunSummary};
