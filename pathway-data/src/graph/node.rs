//! Domain node for the graph store

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A labelled node with properties and relationship annotations.
///
/// Keys are unique; iteration is in key order, so compiled queries are
/// stable for the same node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    label: String,
    properties: BTreeMap<String, Value>,
    relationships: BTreeMap<String, Value>,
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Insert or replace a property.
    pub fn add_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn remove_property(&mut self, key: &str) -> Option<Value> {
        self.properties.remove(key)
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn add_relationship(&mut self, relationship: impl Into<String>, value: impl Into<Value>) {
        self.relationships.insert(relationship.into(), value.into());
    }

    pub fn remove_relationship(&mut self, relationship: &str) -> Option<Value> {
        self.relationships.remove(relationship)
    }

    /// Copy of the properties; mutating it does not touch the node.
    pub fn properties(&self) -> BTreeMap<String, Value> {
        self.properties.clone()
    }

    /// Copy of the relationships; mutating it does not touch the node.
    pub fn relationships(&self) -> BTreeMap<String, Value> {
        self.relationships.clone()
    }

    pub(crate) fn property_iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.properties.iter()
    }

    pub(crate) fn has_properties(&self) -> bool {
        !self.properties.is_empty()
    }
}
