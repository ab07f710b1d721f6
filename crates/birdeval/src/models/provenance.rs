use std::fmt::{Display, Formatter};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Traced<T> {
    pub value: T,
    pub provenance: Vec<NodeId>,
}

impl<T> Traced<T> {
    #[must_use]
    pub fn new(value: T, provenance: Vec<NodeId>) -> Self {
        Self { value, provenance }
    }

    #[must_use]
    pub fn untracked(value: T) -> Self {
        Self::new(value, Vec::new())
    }

    #[must_use]
    pub fn from_node(value: T, node_id: NodeId) -> Self {
        Self::new(value, vec![node_id])
    }

    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Traced<U> {
        Traced {
            value: f(self.value),
            provenance: self.provenance,
        }
    }
}

#[must_use]
pub fn merge_provenance<'a>(sources: impl IntoIterator<Item = &'a [NodeId]>) -> Vec<NodeId> {
    let mut merged: Vec<NodeId> = Vec::new();
    for source in sources {
        for node_id in source {
            if !merged.contains(node_id) {
                merged.push(node_id.clone());
            }
        }
    }
    merged
}
