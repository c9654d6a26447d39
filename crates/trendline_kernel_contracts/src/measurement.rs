#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::common::validate_text;
use crate::{ContractViolation, SchemaVersion};

pub const MEASUREMENT_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

pub const NODE_IDENTITY_MAX_LEN: usize = 1024;

/// One named value taken from test output.
///
/// The value stays textual; numeric interpretation happens on read. Equality and
/// hashing use the name only, so a second value under the same name replaces the
/// first rather than sitting next to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub value: String,
}

impl Measurement {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Numeric reading of the value. Non-numeric and non-finite values yield `None`.
    pub fn numeric_value(&self) -> Option<f64> {
        self.value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
    }

    /// URL-safe component name (form-urlencoded, spaces as `%20`).
    pub fn url_name(&self) -> String {
        url::form_urlencoded::byte_serialize(self.name.as_bytes())
            .collect::<String>()
            .replace('+', "%20")
    }
}

impl PartialEq for Measurement {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Measurement {}

impl Hash for Measurement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Stable cross-run key for one position in the test hierarchy, e.g. `suite/Class/case`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeIdentity(String);

impl NodeIdentity {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = id.into();
        validate_text("node_identity", &id, NODE_IDENTITY_MAX_LEN)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for NodeIdentity {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeIdentity> for String {
    fn from(value: NodeIdentity) -> Self {
        value.0
    }
}

/// Measurements authored by one node in one run: insertion-ordered, unique by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Measurement>", into = "Vec<Measurement>")]
pub struct NodeMeasurements {
    entries: Vec<Measurement>,
}

impl NodeMeasurements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a measurement. An existing entry with the same name keeps its
    /// position and takes the new value.
    pub fn insert(&mut self, measurement: Measurement) {
        match self
            .entries
            .iter_mut()
            .find(|existing| existing.name == measurement.name)
        {
            Some(existing) => existing.value = measurement.value,
            None => self.entries.push(measurement),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Measurement> {
        self.entries.iter().find(|m| m.name == name)
    }

    /// Lookup by real name first, then by URL-safe name.
    pub fn get_by_url_name(&self, url_name: &str) -> Option<&Measurement> {
        self.get(url_name)
            .or_else(|| self.entries.iter().find(|m| m.url_name() == url_name))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Measurement> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<Measurement>> for NodeMeasurements {
    fn from(entries: Vec<Measurement>) -> Self {
        let mut set = Self::new();
        for measurement in entries {
            set.insert(measurement);
        }
        set
    }
}

impl From<NodeMeasurements> for Vec<Measurement> {
    fn from(set: NodeMeasurements) -> Self {
        set.entries
    }
}

impl<'a> IntoIterator for &'a NodeMeasurements {
    type Item = &'a Measurement;
    type IntoIter = std::slice::Iter<'a, Measurement>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Everything one run produced, keyed by the authoring node.
///
/// Nodes without measurements never have an entry, so "no entry" and "nothing
/// found here" mean the same thing. Built once through
/// [`RunMeasurementStoreBuilder`] and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunMeasurementStore {
    nodes: BTreeMap<NodeIdentity, NodeMeasurements>,
}

impl RunMeasurementStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Drops empty node sets on the way in.
    pub fn from_nodes(nodes: BTreeMap<NodeIdentity, NodeMeasurements>) -> Self {
        Self {
            nodes: nodes
                .into_iter()
                .filter(|(_, set)| !set.is_empty())
                .collect(),
        }
    }

    pub fn node(&self, identity: &NodeIdentity) -> Option<&NodeMeasurements> {
        self.nodes.get(identity)
    }

    pub fn measurement(&self, identity: &NodeIdentity, name: &str) -> Option<&Measurement> {
        self.node(identity).and_then(|set| set.get(name))
    }

    pub fn nodes(&self) -> &BTreeMap<NodeIdentity, NodeMeasurements> {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn measurement_count(&self) -> usize {
        self.nodes.values().map(NodeMeasurements::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct RunMeasurementStoreBuilder {
    nodes: BTreeMap<NodeIdentity, NodeMeasurements>,
}

impl RunMeasurementStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, identity: &NodeIdentity, measurement: Measurement) {
        self.nodes
            .entry(identity.clone())
            .or_default()
            .insert(measurement);
    }

    pub fn build(self) -> RunMeasurementStore {
        RunMeasurementStore::from_nodes(self.nodes)
    }
}
