//! Host adapter: the read-only view of the external network model.
//!
//! The rule engine never mutates the network. It resolves names to handles
//! once at setup and then reads current and previous-timestep observables
//! through [`HostModel`].
//!
//! [`InMemoryModel`] is a plain table-backed implementation. Hosts that keep
//! their own network state (or talk to us over FFI) can push values into it
//! each timestep instead of implementing the trait themselves.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use hydro_rules_core::{ScenarioId, TimestepDelta};

use crate::error::{EntityKind, Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeHandle(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParameterHandle(pub usize);

/// Trait: what the rules need to read from the host network.
pub trait HostModel {
    fn scenario_count(&self) -> usize;
    /// Timesteps in one run.
    fn timestep_count(&self) -> usize;
    fn timestep_delta(&self) -> TimestepDelta;

    fn node(&self, name: &str) -> Option<NodeHandle>;
    fn parameter(&self, name: &str) -> Option<ParameterHandle>;

    /// Current flow; for a storage node this is the change in volume.
    fn flow(&self, node: NodeHandle, scenario: ScenarioId) -> f64;
    fn previous_flow(&self, node: NodeHandle, scenario: ScenarioId) -> f64;
    fn volume(&self, node: NodeHandle, scenario: ScenarioId) -> f64;
    /// For an aggregated storage, the sum over its members.
    fn max_volume(&self, node: NodeHandle, scenario: ScenarioId) -> f64;
    fn parameter_value(&self, parameter: ParameterHandle, scenario: ScenarioId) -> f64;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeObservables {
    pub flow: f64,
    pub previous_flow: f64,
    pub volume: f64,
    pub max_volume: f64,
}

#[derive(Clone, Debug)]
enum NodeEntry {
    Single(Vec<NodeObservables>),
    /// Indices of member nodes; observables are summed.
    Aggregated(Vec<usize>),
}

/// Table-backed host model.
#[derive(Clone, Debug)]
pub struct InMemoryModel {
    scenarios: usize,
    timesteps: usize,
    delta: TimestepDelta,
    nodes: IndexMap<String, NodeEntry>,
    parameters: IndexMap<String, Vec<f64>>,
}

impl InMemoryModel {
    pub fn new(scenarios: usize, timesteps: usize, delta: TimestepDelta) -> Self {
        Self {
            scenarios,
            timesteps,
            delta,
            nodes: IndexMap::new(),
            parameters: IndexMap::new(),
        }
    }

    /// Declare a node. Declaring an existing name returns its handle.
    pub fn add_node(&mut self, name: impl Into<String>) -> NodeHandle {
        let name = name.into();
        if let Some(i) = self.nodes.get_index_of(&name) {
            return NodeHandle(i);
        }
        let (i, _) = self
            .nodes
            .insert_full(name, NodeEntry::Single(vec![NodeObservables::default(); self.scenarios]));
        NodeHandle(i)
    }

    /// Declare a storage that reports the sum of existing plain nodes.
    ///
    /// The name must be new: replacing a plain node would silently drop it
    /// from every aggregate that already counts it.
    pub fn add_aggregated_storage(&mut self, name: impl Into<String>, members: &[&str]) -> Result<NodeHandle> {
        let name = name.into();
        if self.nodes.contains_key(&name) {
            return Err(Error::DuplicateEntity {
                kind: EntityKind::Node,
                name,
            });
        }
        let mut idx = Vec::with_capacity(members.len());
        for m in members {
            match self.nodes.get_full(*m) {
                Some((i, _, NodeEntry::Single(_))) => idx.push(i),
                _ => return Err(Error::unresolved(EntityKind::Node, *m)),
            }
        }
        let (i, _) = self.nodes.insert_full(name, NodeEntry::Aggregated(idx));
        Ok(NodeHandle(i))
    }

    pub fn add_parameter(&mut self, name: impl Into<String>) -> ParameterHandle {
        let name = name.into();
        if let Some(i) = self.parameters.get_index_of(&name) {
            return ParameterHandle(i);
        }
        let (i, _) = self.parameters.insert_full(name, vec![0.0; self.scenarios]);
        ParameterHandle(i)
    }

    fn check(&self, scenario: ScenarioId) -> Result<()> {
        if scenario < self.scenarios {
            Ok(())
        } else {
            Err(hydro_rules_core::Error::ScenarioOutOfRange {
                scenario,
                count: self.scenarios,
            }
            .into())
        }
    }

    pub fn set_node(&mut self, name: &str, scenario: ScenarioId, obs: NodeObservables) -> Result<()> {
        self.check(scenario)?;
        match self.nodes.get_mut(name) {
            Some(NodeEntry::Single(v)) => {
                v[scenario] = obs;
                Ok(())
            }
            _ => Err(Error::unresolved(EntityKind::Node, name)),
        }
    }

    pub fn set_parameter(&mut self, name: &str, scenario: ScenarioId, value: f64) -> Result<()> {
        self.check(scenario)?;
        let values = self
            .parameters
            .get_mut(name)
            .ok_or_else(|| Error::unresolved(EntityKind::Parameter, name))?;
        values[scenario] = value;
        Ok(())
    }

    /// Same value in every scenario.
    pub fn set_parameter_all(&mut self, name: &str, value: f64) -> Result<()> {
        let values = self
            .parameters
            .get_mut(name)
            .ok_or_else(|| Error::unresolved(EntityKind::Parameter, name))?;
        values.iter_mut().for_each(|v| *v = value);
        Ok(())
    }

    /// Carry every node's current flow into `previous_flow`, as the host does
    /// once a timestep is settled.
    pub fn roll_previous_flows(&mut self) {
        for entry in self.nodes.values_mut() {
            if let NodeEntry::Single(v) = entry {
                for obs in v.iter_mut() {
                    obs.previous_flow = obs.flow;
                }
            }
        }
    }

    fn observe(&self, node: NodeHandle, scenario: ScenarioId, f: fn(&NodeObservables) -> f64) -> f64 {
        match self.nodes.get_index(node.0) {
            Some((_, NodeEntry::Single(v))) => f(&v[scenario]),
            Some((_, NodeEntry::Aggregated(members))) => members
                .iter()
                // members are plain nodes and entries are never replaced
                .map(|m| match self.nodes.get_index(*m) {
                    Some((_, NodeEntry::Single(v))) => f(&v[scenario]),
                    _ => f64::NAN,
                })
                .sum(),
            None => f64::NAN,
        }
    }
}

impl HostModel for InMemoryModel {
    fn scenario_count(&self) -> usize {
        self.scenarios
    }

    fn timestep_count(&self) -> usize {
        self.timesteps
    }

    fn timestep_delta(&self) -> TimestepDelta {
        self.delta
    }

    fn node(&self, name: &str) -> Option<NodeHandle> {
        self.nodes.get_index_of(name).map(NodeHandle)
    }

    fn parameter(&self, name: &str) -> Option<ParameterHandle> {
        self.parameters.get_index_of(name).map(ParameterHandle)
    }

    fn flow(&self, node: NodeHandle, scenario: ScenarioId) -> f64 {
        self.observe(node, scenario, |o| o.flow)
    }

    fn previous_flow(&self, node: NodeHandle, scenario: ScenarioId) -> f64 {
        self.observe(node, scenario, |o| o.previous_flow)
    }

    fn volume(&self, node: NodeHandle, scenario: ScenarioId) -> f64 {
        self.observe(node, scenario, |o| o.volume)
    }

    fn max_volume(&self, node: NodeHandle, scenario: ScenarioId) -> f64 {
        self.observe(node, scenario, |o| o.max_volume)
    }

    fn parameter_value(&self, parameter: ParameterHandle, scenario: ScenarioId) -> f64 {
        self.parameters
            .get_index(parameter.0)
            .map(|(_, v)| v[scenario])
            .unwrap_or(f64::NAN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregated_storage_sums_members() {
        let mut m = InMemoryModel::new(2, 10, TimestepDelta::Days(1));
        m.add_node("A");
        m.add_node("B");
        let agg = m.add_aggregated_storage("Group", &["A", "B"]).unwrap();
        m.set_node("A", 1, NodeObservables { flow: -1.0, previous_flow: 0.0, volume: 10.0, max_volume: 20.0 })
            .unwrap();
        m.set_node("B", 1, NodeObservables { flow: -2.0, previous_flow: 0.0, volume: 5.0, max_volume: 30.0 })
            .unwrap();
        assert_eq!(m.volume(agg, 1), 15.0);
        assert_eq!(m.max_volume(agg, 1), 50.0);
        assert_eq!(m.flow(agg, 1), -3.0);
        assert_eq!(m.volume(agg, 0), 0.0);
    }

    #[test]
    fn aggregate_cannot_shadow_an_existing_node() {
        let mut m = InMemoryModel::new(1, 1, TimestepDelta::Days(1));
        m.add_node("A");
        m.add_node("B");
        let agg = m.add_aggregated_storage("Group", &["A", "B"]).unwrap();
        m.set_node("A", 0, NodeObservables { volume: 10.0, ..Default::default() }).unwrap();
        m.set_node("B", 0, NodeObservables { volume: 5.0, ..Default::default() }).unwrap();

        let err = m.add_aggregated_storage("A", &["B"]).unwrap_err();
        assert!(matches!(err, Error::DuplicateEntity { kind: EntityKind::Node, ref name } if name == "A"));
        assert!(m.add_aggregated_storage("Group", &["A"]).is_err());
        assert_eq!(m.volume(agg, 0), 15.0);
        assert_eq!(m.add_node("Group"), agg);
    }

    #[test]
    fn unknown_names_fail_to_resolve() {
        let mut m = InMemoryModel::new(1, 1, TimestepDelta::Days(1));
        assert!(m.add_aggregated_storage("Group", &["missing"]).unwrap_err().is_dependency_resolution());
        assert!(m.set_parameter("nope", 0, 1.0).unwrap_err().is_dependency_resolution());
        m.add_parameter("p");
        assert!(m.set_parameter("p", 1, 1.0).is_err());
    }

    #[test]
    fn roll_moves_flow_to_previous() {
        let mut m = InMemoryModel::new(1, 1, TimestepDelta::Days(1));
        let n = m.add_node("Gauge");
        m.set_node("Gauge", 0, NodeObservables { flow: 7.0, ..Default::default() }).unwrap();
        m.roll_previous_flows();
        assert_eq!(m.previous_flow(n, 0), 7.0);
        assert_eq!(m.add_node("Gauge"), n);
    }
}
