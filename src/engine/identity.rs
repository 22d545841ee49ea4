use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::Hash32;

/// Position of a node among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    Index(usize),
    Key(String),
}

/// One step of a [`NodePath`]: where the node sits and what it is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Segment {
    pub slot: Slot,
    pub name: Cow<'static, str>,
}

/// Structural position of a node, from the root of the element tree.
///
/// Every host element and every component instance adds a segment, so a
/// component and the component it renders as its root never share a path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(Vec<Segment>);

impl NodePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, slot: Slot, name: impl Into<Cow<'static, str>>) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment {
            slot,
            name: name.into(),
        });
        Self(segments)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Injective text encoding of the path. Names and keys are length
    /// prefixed, so no two distinct paths encode to the same string.
    pub fn encode(&self) -> String {
        let mut acc = String::new();
        for Segment { slot, name } in &self.0 {
            match slot {
                Slot::Index(index) => acc.push_str(&format!("/{index}")),
                Slot::Key(key) => acc.push_str(&format!("/${}:{key}", key.len())),
            }
            acc.push_str(&format!(".{}:{name}", name.len()));
        }
        acc
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for Segment { slot, name } in &self.0 {
            match slot {
                Slot::Index(index) => write!(f, "/{index}:{name}")?,
                Slot::Key(key) => write!(f, "/{key}:{name}")?,
            }
        }
        Ok(())
    }
}

/// Stable identity of a node, used as the key of its data in the packet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the identity of a path: the first 16 hex digits of the BLAKE3
/// hash of its encoding.
pub(crate) fn derive(path: &NodePath) -> String {
    let mut hex = Hash32::hash(path.encode()).to_hex();
    hex.truncate(16);
    hex
}

/// Hands out node identities and remembers them for the whole render.
///
/// Identities are a pure function of the path, except when two distinct
/// paths derive the same string: the path seen later gets a `-N` suffix.
/// Discovery order is deterministic, so so is the suffix.
pub(crate) struct Registry {
    derive: fn(&NodePath) -> String,
    by_path: HashMap<NodePath, NodeId>,
    by_id: HashMap<NodeId, NodePath>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::with_derive(derive)
    }

    pub(crate) fn with_derive(derive: fn(&NodePath) -> String) -> Self {
        Self {
            derive,
            by_path: HashMap::new(),
            by_id: HashMap::new(),
        }
    }

    /// Returns the identity of `path`, assigning one on first sight.
    pub(crate) fn identify(&mut self, path: &NodePath) -> NodeId {
        if let Some(id) = self.by_path.get(path) {
            return id.clone();
        }

        let id = self.peek(path);
        self.by_path.insert(path.clone(), id.clone());
        self.by_id.insert(id.clone(), path.clone());
        id
    }

    /// Returns the identity [`identify`](Self::identify) would return right
    /// now, without recording anything.
    pub(crate) fn peek(&self, path: &NodePath) -> NodeId {
        if let Some(id) = self.by_path.get(path) {
            return id.clone();
        }

        let base = (self.derive)(path);
        let mut id = NodeId(base.clone());
        let mut n = 0;

        while self.by_id.contains_key(&id) {
            n += 1;
            id = NodeId(format!("{base}-{n}"));
        }

        id
    }

    pub(crate) fn len(&self) -> usize {
        self.by_path.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
