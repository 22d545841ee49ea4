//! The data packet: every settled dependency of a render, keyed by node.
//!
//! The packet is plain serializable data. A server render embeds it into
//! the markup (or hands it back to the caller), and a later render can be
//! seeded with it to reproduce the same output without fetching anything.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::NodeId;

/// Default name of the global variable the injected script assigns to.
pub const DEFAULT_GLOBAL: &str = "__reactAsyncDataPacket__";

/// The settled outcome of one dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Id of the source that produced the value, when it had one.
    pub id: Option<String>,
    /// The resolved value, `null` for failed sources.
    pub data: Value,
    /// Always `true` for records that made it into a packet.
    pub completed: bool,
    /// Failure message for sources that settled with an error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Record {
    pub fn resolved(id: Option<String>, data: Value) -> Self {
        Self {
            id,
            data,
            completed: true,
            error: None,
        }
    }

    pub fn failed(id: Option<String>, error: &anyhow::Error) -> Self {
        Self {
            id,
            data: Value::Null,
            completed: true,
            error: Some(format!("{error:#}")),
        }
    }

    pub(crate) fn settle(id: Option<String>, outcome: anyhow::Result<Value>) -> Self {
        match outcome {
            Ok(data) => Self::resolved(id, data),
            Err(err) => Self::failed(id, &err),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Settled records of a single node, by dependency name.
pub type Records = BTreeMap<String, Record>;

/// Mapping from node identity to that node's settled records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataPacket(BTreeMap<NodeId, Records>);

impl DataPacket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, id: &NodeId) -> Option<&Records> {
        self.0.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.0.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &Records)> {
        self.0.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &Records> {
        self.0.values()
    }

    /// Folds the records of a completed node into the packet.
    pub(crate) fn insert(&mut self, id: NodeId, records: Records) {
        self.0.insert(id, records);
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Serializes the packet into a script element assigning it to
    /// `window.<global>`.
    pub fn to_script(&self, global: &str) -> serde_json::Result<String> {
        // `</` would let the payload close the script element early.
        let json = self.to_json()?.replace("</", "<\\/");
        Ok(format!("<script>window.{global} = {json};</script>"))
    }

    /// Places the script produced by [`to_script`](Self::to_script) right
    /// before the closing `</body>` tag of `markup`, or at its end when there
    /// is no body.
    pub fn inject(&self, markup: &str, global: &str) -> serde_json::Result<String> {
        let script = self.to_script(global)?;
        let mut out = String::with_capacity(markup.len() + script.len());

        match markup.rfind("</body>") {
            Some(at) => {
                out.push_str(&markup[..at]);
                out.push_str(&script);
                out.push_str(&markup[at..]);
            }
            None => {
                out.push_str(markup);
                out.push_str(&script);
            }
        }

        Ok(out)
    }
}

impl<'a> IntoIterator for &'a DataPacket {
    type Item = (&'a NodeId, &'a Records);
    type IntoIter = std::collections::btree_map::Iter<'a, NodeId, Records>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
