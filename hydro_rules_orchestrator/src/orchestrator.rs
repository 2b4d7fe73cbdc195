//! Rule orchestrator.
//!
//! Owns every per-scenario component state and drives it through the host's
//! lifecycle:
//! - `setup`: resolve entity names, size state to the scenario count
//! - `reset`: zero state before a run
//! - `before`: per timestep, ahead of the host's solve; returns decisions
//! - `after`: per timestep, once flows and volumes are settled
//!
//! No IO. No threads. Each orchestrator is one independent rule engine; a
//! host running candidate solutions in parallel builds one per worker.

use indexmap::IndexMap;
use tracing::{debug, info, instrument, trace, warn};

use hydro_rules_core::{
    absolute_level, crossing_index, EventCounter, FloodProfile, FlowObservation, ForecastDetector,
    ScenarioId, StickyLatch, Timestep,
};
use serde::{Deserialize, Serialize};

use crate::cfg::{names, LimitSource, OrchestratorCfg};
use crate::error::{EntityKind, Error, Result};
use crate::host::{HostModel, NodeHandle, ParameterHandle};
use crate::recorder::SeriesRecorder;
use crate::registry::{Output, Registry};
use crate::summary::{CounterSummary, OrchestratorSnapshot, RunSummary};

/// Everything the host applies for one scenario at one timestep.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDecision {
    pub estimated_flow: f64,
    pub abstraction_cost: f64,
    pub abstraction_max: f64,
    pub release_max: f64,
    pub compensation_release: f64,
    /// Compensation flow as read from the host, before any uplift.
    pub compensation_input: f64,
    pub river_intake_max: f64,
    pub flood_curve: Option<f64>,
    pub forecast_crossing: u32,
    pub curve_crossing: u32,
    /// Latched indices, in configured latch order.
    pub latches: Vec<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum IndexSource {
    Forecast,
    Curve,
    Latch(usize),
}

impl IndexSource {
    fn from_output(output: Output) -> Option<Self> {
        match output {
            Output::ForecastCrossing => Some(IndexSource::Forecast),
            Output::CurveCrossing => Some(IndexSource::Curve),
            Output::Latch(i) => Some(IndexSource::Latch(i)),
            _ => None,
        }
    }
}

impl ScenarioDecision {
    fn index(&self, source: IndexSource) -> u32 {
        match source {
            IndexSource::Forecast => self.forecast_crossing,
            IndexSource::Curve => self.curve_crossing,
            IndexSource::Latch(i) => self.latches[i],
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Limit {
    Constant(f64),
    Parameter(ParameterHandle),
}

impl Limit {
    fn value<H: HostModel>(&self, host: &H, scenario: ScenarioId) -> f64 {
        match *self {
            Limit::Constant(v) => v,
            Limit::Parameter(p) => host.parameter_value(p, scenario),
        }
    }
}

/// Host handles resolved at setup.
#[derive(Clone, Debug)]
struct Wiring {
    gauge: NodeHandle,
    inflow: ParameterHandle,
    inflow_node: NodeHandle,
    compensation: ParameterHandle,
    storage: NodeHandle,
    control_curve: ParameterHandle,
    high_limit: Limit,
    low_limit: Limit,
    flood: Option<(FloodProfile, ParameterHandle)>,
}

fn node<H: HostModel>(host: &H, name: &str) -> Result<NodeHandle> {
    let handle = host
        .node(name)
        .ok_or_else(|| Error::unresolved(EntityKind::Node, name))?;
    debug!(name, handle = handle.0, "node resolved");
    Ok(handle)
}

fn parameter<H: HostModel>(host: &H, name: &str) -> Result<ParameterHandle> {
    let handle = host
        .parameter(name)
        .ok_or_else(|| Error::unresolved(EntityKind::Parameter, name))?;
    debug!(name, handle = handle.0, "parameter resolved");
    Ok(handle)
}

fn limit<H: HostModel>(host: &H, source: &LimitSource, configured: f64) -> Result<Limit> {
    match source {
        LimitSource::Configured => Ok(Limit::Constant(configured)),
        LimitSource::Parameter(name) => Ok(Limit::Parameter(parameter(host, name)?)),
    }
}

impl Wiring {
    fn resolve<H: HostModel>(cfg: &OrchestratorCfg, host: &H) -> Result<Self> {
        let t = &cfg.topology;
        let limits = &cfg.rules.abstraction_limit;

        let flood = match &cfg.rules.flood_profile {
            None => None,
            Some(profile) => {
                let name = t.flood_draw_down_parameter.as_deref().ok_or_else(|| {
                    hydro_rules_core::Error::Configuration {
                        component: "flood_profile".to_string(),
                        message: "flood_draw_down_parameter is not set".to_string(),
                    }
                })?;
                Some((profile.clone(), parameter(host, name)?))
            }
        };

        Ok(Self {
            gauge: node(host, &t.gauge_node)?,
            inflow: parameter(host, &t.inflow_parameter)?,
            inflow_node: node(host, &t.inflow_node)?,
            compensation: parameter(host, &t.compensation_parameter)?,
            storage: node(host, &t.storage_node)?,
            control_curve: parameter(host, &t.control_curve_parameter)?,
            high_limit: limit(host, &t.high_flow_limit, limits.high_flow_limit)?,
            low_limit: limit(host, &t.low_flow_limit, limits.low_flow_limit)?,
            flood,
        })
    }
}

#[derive(Debug)]
struct LatchSlot {
    name: String,
    source: IndexSource,
    latch: StickyLatch,
}

#[derive(Debug)]
struct CounterSlot {
    name: String,
    source: IndexSource,
    counter: EventCounter,
}

/// State that exists only once the host model is known.
#[derive(Debug)]
struct Runtime {
    wiring: Wiring,
    scenarios: usize,
    horizon: usize,
    registry: Registry,
    forecast: ForecastDetector,
    latches: Vec<LatchSlot>,
    counters: Vec<CounterSlot>,
    recorders: IndexMap<String, (Output, SeriesRecorder)>,
    decisions: Vec<ScenarioDecision>,
    /// Index the next `before` must carry.
    next_index: usize,
    /// Set between `before` and `after`.
    open: Option<usize>,
}

impl Runtime {
    fn output_value(&self, output: Output, scenario: ScenarioId) -> f64 {
        let d = &self.decisions[scenario];
        match output {
            Output::EstimatedFlow => d.estimated_flow,
            Output::AbstractionCost => d.abstraction_cost,
            Output::AbstractionMax => d.abstraction_max,
            Output::ReleaseMax => d.release_max,
            Output::CompensationRelease => d.compensation_release,
            Output::CompensationInput => d.compensation_input,
            Output::RiverIntakeMax => d.river_intake_max,
            Output::FloodCurve => d.flood_curve.unwrap_or(f64::NAN),
            Output::ForecastCrossing => d.forecast_crossing as f64,
            Output::CurveCrossing => d.curve_crossing as f64,
            Output::Latch(i) => d.latches[i] as f64,
            Output::Counter(i) => self.counters[i]
                .counter
                .count(scenario)
                .map_or(f64::NAN, f64::from),
        }
    }
}

#[derive(Debug)]
pub struct RuleOrchestrator {
    cfg: OrchestratorCfg,
    runtime: Option<Runtime>,
}

impl RuleOrchestrator {
    /// Validate the configuration. Nothing is allocated until [`setup`](Self::setup).
    pub fn new(cfg: OrchestratorCfg) -> Result<Self> {
        cfg.rules.validate()?;
        Ok(Self { cfg, runtime: None })
    }

    pub fn cfg(&self) -> &OrchestratorCfg {
        &self.cfg
    }

    pub fn is_set_up(&self) -> bool {
        self.runtime.is_some()
    }

    fn rt(&self) -> Result<&Runtime> {
        self.runtime.as_ref().ok_or(Error::NotSetUp)
    }

    /// Resolve every name against `host` and allocate per-scenario state.
    #[instrument(skip_all)]
    pub fn setup<H: HostModel>(&mut self, host: &H) -> Result<()> {
        let cfg = &self.cfg;
        let scenarios = host.scenario_count();
        let horizon = host.timestep_count();
        let delta = host.timestep_delta();

        let wiring = Wiring::resolve(cfg, host)?;

        let mut registry = Registry::new();
        registry.register(names::ESTIMATED_FLOW, Output::EstimatedFlow)?;
        registry.register(names::ABSTRACTION_COST, Output::AbstractionCost)?;
        registry.register(names::ABSTRACTION_MAX, Output::AbstractionMax)?;
        registry.register(names::RELEASE_MAX, Output::ReleaseMax)?;
        registry.register(names::COMPENSATION_RELEASE, Output::CompensationRelease)?;
        registry.register(names::COMPENSATION_INPUT, Output::CompensationInput)?;
        registry.register(names::RIVER_INTAKE_MAX, Output::RiverIntakeMax)?;
        if wiring.flood.is_some() {
            registry.register(names::FLOOD_CURVE, Output::FloodCurve)?;
        }
        registry.register(names::FORECAST_CROSSING, Output::ForecastCrossing)?;
        registry.register(names::CURVE_CROSSING, Output::CurveCrossing)?;

        // Register each latch only after resolving its source, so a latch can
        // follow earlier latches but never itself or a later one.
        let mut latches = Vec::with_capacity(cfg.latches.len());
        for (i, spec) in cfg.latches.iter().enumerate() {
            let source = IndexSource::from_output(registry.resolve_index(&spec.source)?)
                .ok_or_else(|| Error::NotAnIndex(spec.source.clone()))?;
            let mut latch = StickyLatch::new(spec.dwell, delta)?;
            latch.setup(scenarios);
            debug!(
                latch = %spec.name,
                source = %spec.source,
                dwell = latch.minimum_timesteps(),
                "latch wired"
            );
            registry.register(spec.name.clone(), Output::Latch(i))?;
            latches.push(LatchSlot {
                name: spec.name.clone(),
                source,
                latch,
            });
        }

        let mut counters = Vec::with_capacity(cfg.counters.len());
        for (i, spec) in cfg.counters.iter().enumerate() {
            let source = IndexSource::from_output(registry.resolve_index(&spec.source)?)
                .ok_or_else(|| Error::NotAnIndex(spec.source.clone()))?;
            spec.events.validate(&spec.name)?;
            let mut counter = EventCounter::new(spec.events);
            counter.setup(scenarios);
            debug!(counter = %spec.name, source = %spec.source, "counter wired");
            registry.register(spec.name.clone(), Output::Counter(i))?;
            counters.push(CounterSlot {
                name: spec.name.clone(),
                source,
                counter,
            });
        }

        let mut forecast = ForecastDetector::new(cfg.rules.forecast)?;
        forecast.setup(scenarios);

        let recorders = registry
            .iter()
            .filter(|(_, output)| output.is_per_timestep())
            .map(|(name, output)| {
                (
                    name.to_string(),
                    (output, SeriesRecorder::new(name, horizon, scenarios)),
                )
            })
            .collect();

        let blank = ScenarioDecision {
            latches: vec![0; latches.len()],
            ..ScenarioDecision::default()
        };

        info!(
            scenarios,
            timesteps = horizon,
            rules = registry.len(),
            latches = latches.len(),
            counters = counters.len(),
            "rule orchestrator set up"
        );

        self.runtime = Some(Runtime {
            wiring,
            scenarios,
            horizon,
            registry,
            forecast,
            latches,
            counters,
            recorders,
            decisions: vec![blank; scenarios],
            next_index: 0,
            open: None,
        });
        Ok(())
    }

    /// Zero all state ahead of a run.
    #[instrument(skip_all)]
    pub fn reset(&mut self) -> Result<()> {
        let rt = self.runtime.as_mut().ok_or(Error::NotSetUp)?;
        rt.forecast.reset();
        for slot in &mut rt.latches {
            slot.latch.reset();
        }
        for slot in &mut rt.counters {
            slot.counter.reset();
        }
        for (_, rec) in rt.recorders.values_mut() {
            rec.reset();
        }
        let n_latches = rt.latches.len();
        for d in &mut rt.decisions {
            *d = ScenarioDecision {
                latches: vec![0; n_latches],
                ..ScenarioDecision::default()
            };
        }
        rt.next_index = 0;
        rt.open = None;
        info!(scenarios = rt.scenarios, "rule orchestrator reset");
        Ok(())
    }

    /// Evaluate every rule for every scenario ahead of the host's solve.
    #[instrument(level = "trace", skip_all, fields(timestep = ts.index))]
    pub fn before<H: HostModel>(&mut self, host: &H, ts: Timestep) -> Result<&[ScenarioDecision]> {
        let rules = &self.cfg.rules;
        let rt = self.runtime.as_mut().ok_or(Error::NotSetUp)?;

        if rt.open.is_some() || ts.index != rt.next_index {
            return Err(Error::TimestepOrder {
                expected: rt.next_index,
                got: ts.index,
            });
        }
        if ts.index >= rt.horizon {
            return Err(Error::HorizonExceeded {
                index: ts.index,
                horizon: rt.horizon,
            });
        }
        if !ts.has_valid_calendar() {
            return Err(Error::InvalidCalendar {
                index: ts.index,
                month: ts.month,
                day_of_year: ts.day_of_year,
            });
        }

        let w = &rt.wiring;
        for scenario in 0..rt.scenarios {
            let flow = FlowObservation {
                base_flow: host.parameter_value(w.inflow, scenario),
                previous_base_flow: host.previous_flow(w.inflow_node, scenario),
                previous_gauge_flow: host.previous_flow(w.gauge, scenario),
            }
            .estimate();

            let high = w.high_limit.value(host, scenario);
            let low = w.low_limit.value(host, scenario);
            let compensation_input = host.parameter_value(w.compensation, scenario);

            let level = absolute_level(
                host.parameter_value(w.control_curve, scenario),
                host.max_volume(w.storage, scenario),
            );
            let volume = host.volume(w.storage, scenario);

            let mut d = ScenarioDecision {
                estimated_flow: flow,
                abstraction_cost: rules.abstraction_cost.decide(flow),
                abstraction_max: rules.abstraction_limit.decide(flow, high, low),
                release_max: rules.release_max.decide(flow),
                compensation_release: rules.compensation.decide(flow, &ts),
                compensation_input,
                river_intake_max: rules.river_intake.decide(flow, compensation_input, high),
                flood_curve: w.flood.as_ref().map(|(profile, p)| {
                    profile.value(ts.day_of_year, host.parameter_value(*p, scenario))
                }),
                forecast_crossing: rt.forecast.is_crossing(scenario, level, volume, ts.index)?,
                curve_crossing: crossing_index(volume, level),
                latches: Vec::with_capacity(rt.latches.len()),
            };

            for slot in &mut rt.latches {
                let raw = d.index(slot.source);
                let latched = slot.latch.update(scenario, raw, ts.index)?;
                d.latches.push(latched);
            }

            rt.decisions[scenario] = d;
        }

        rt.open = Some(ts.index);
        trace!(scenarios = rt.scenarios, "decisions ready");
        Ok(&rt.decisions)
    }

    /// Record settled values: storage gradient sample, event counts, series.
    #[instrument(level = "trace", skip_all, fields(timestep = ts.index))]
    pub fn after<H: HostModel>(&mut self, host: &H, ts: Timestep) -> Result<()> {
        let rt = self.runtime.as_mut().ok_or(Error::NotSetUp)?;
        if rt.open != Some(ts.index) {
            return Err(Error::TimestepOrder {
                expected: rt.open.unwrap_or(rt.next_index),
                got: ts.index,
            });
        }

        let storage = rt.wiring.storage;
        for scenario in 0..rt.scenarios {
            rt.forecast.record_sample(
                scenario,
                host.flow(storage, scenario),
                host.volume(storage, scenario),
            )?;
        }
        rt.forecast.advance();

        for slot in &mut rt.counters {
            for (scenario, d) in rt.decisions.iter().enumerate() {
                slot.counter.observe(scenario, d.index(slot.source))?;
            }
        }

        let mut rows: Vec<(String, Vec<f64>)> = Vec::with_capacity(rt.recorders.len());
        for (name, (output, _)) in &rt.recorders {
            let row = (0..rt.scenarios)
                .map(|s| rt.output_value(*output, s))
                .collect();
            rows.push((name.clone(), row));
        }
        for (name, row) in rows {
            if let Some((_, rec)) = rt.recorders.get_mut(&name) {
                for (scenario, v) in row.into_iter().enumerate() {
                    rec.record(ts.index, scenario, v)?;
                }
            }
        }

        rt.open = None;
        rt.next_index = ts.index + 1;
        Ok(())
    }

    /// Decisions from the most recent `before`.
    pub fn decisions(&self) -> Result<&[ScenarioDecision]> {
        Ok(&self.rt()?.decisions)
    }

    /// Current value of a named output for one scenario.
    pub fn value(&self, name: &str, scenario: ScenarioId) -> Result<f64> {
        let rt = self.rt()?;
        if scenario >= rt.scenarios {
            return Err(hydro_rules_core::Error::ScenarioOutOfRange {
                scenario,
                count: rt.scenarios,
            }
            .into());
        }
        Ok(rt.output_value(rt.registry.resolve(name)?, scenario))
    }

    pub fn registry(&self) -> Result<&Registry> {
        Ok(&self.rt()?.registry)
    }

    pub fn recorder(&self, name: &str) -> Option<&SeriesRecorder> {
        self.runtime
            .as_ref()
            .and_then(|rt| rt.recorders.get(name))
            .map(|(_, rec)| rec)
    }

    pub fn recorders(&self) -> impl Iterator<Item = &SeriesRecorder> + '_ {
        self.runtime
            .iter()
            .flat_map(|rt| rt.recorders.values().map(|(_, rec)| rec))
    }

    pub fn summary(&self) -> Result<RunSummary> {
        let rt = self.rt()?;
        let counters = rt
            .counters
            .iter()
            .map(|slot| {
                let c = &slot.counter;
                let violated = c.is_constraint_violated();
                if violated {
                    warn!(
                        counter = %slot.name,
                        aggregated = c.aggregated_value(),
                        bound = ?c.cfg().constraint_upper_bound,
                        "event count constraint violated"
                    );
                }
                CounterSummary {
                    name: slot.name.clone(),
                    per_scenario: c.values(),
                    aggregated: c.aggregated_value(),
                    constraint_upper_bound: c.cfg().constraint_upper_bound,
                    constraint_violated: violated,
                }
            })
            .collect();
        Ok(RunSummary {
            timesteps_completed: rt.next_index,
            scenarios: rt.scenarios,
            counters,
        })
    }

    /// Copy out all per-scenario state. Only valid between timesteps.
    pub fn snapshot(&self) -> Result<OrchestratorSnapshot> {
        let rt = self.rt()?;
        if let Some(open) = rt.open {
            return Err(Error::SnapshotMismatch(format!("timestep {} is still open", open)));
        }
        Ok(OrchestratorSnapshot {
            next_timestep: rt.next_index,
            forecast: rt.forecast.state(),
            latches: rt
                .latches
                .iter()
                .map(|s| (s.name.clone(), s.latch.state()))
                .collect(),
            counters: rt
                .counters
                .iter()
                .map(|s| (s.name.clone(), s.counter.state().clone()))
                .collect(),
        })
    }

    /// Replace all per-scenario state with a snapshot from an identically
    /// configured orchestrator.
    pub fn restore(&mut self, snap: OrchestratorSnapshot) -> Result<()> {
        let rt = self.runtime.as_mut().ok_or(Error::NotSetUp)?;

        let latch_names: Vec<&str> = snap.latches.iter().map(|(n, _)| n.as_str()).collect();
        let ours: Vec<&str> = rt.latches.iter().map(|s| s.name.as_str()).collect();
        if latch_names != ours {
            return Err(Error::SnapshotMismatch(format!(
                "latches {:?}, expected {:?}",
                latch_names, ours
            )));
        }
        let counter_names: Vec<&str> = snap.counters.iter().map(|(n, _)| n.as_str()).collect();
        let ours: Vec<&str> = rt.counters.iter().map(|s| s.name.as_str()).collect();
        if counter_names != ours {
            return Err(Error::SnapshotMismatch(format!(
                "counters {:?}, expected {:?}",
                counter_names, ours
            )));
        }
        if snap.next_timestep > rt.horizon {
            return Err(Error::HorizonExceeded {
                index: snap.next_timestep,
                horizon: rt.horizon,
            });
        }

        // Check every piece before applying any, so a rejected snapshot
        // leaves the current state untouched.
        rt.forecast.check_state(&snap.forecast)?;
        for (slot, (_, state)) in rt.latches.iter().zip(&snap.latches) {
            slot.latch.check_state(state)?;
        }
        for (slot, (_, state)) in rt.counters.iter().zip(&snap.counters) {
            slot.counter.check_state(state)?;
        }

        rt.forecast.restore(snap.forecast)?;
        for (slot, (_, state)) in rt.latches.iter_mut().zip(snap.latches) {
            slot.latch.restore(state)?;
        }
        for (slot, (_, state)) in rt.counters.iter_mut().zip(snap.counters) {
            slot.counter.restore(state)?;
        }
        rt.next_index = snap.next_timestep;
        rt.open = None;
        debug!(next_timestep = rt.next_index, "state restored");
        Ok(())
    }
}
