use std::collections::BTreeSet;

use crate::engine::NodeId;
use crate::packet::{Record, Records};

/// Lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Dependencies are known, sources are still being started.
    Collecting,
    /// Every source has been started, at least one hasn't settled.
    Pending,
    /// Every dependency has settled. Terminal.
    Complete,
}

/// Tracks the dependencies of one node until all of them have settled.
///
/// Only settlements mutate a session. Once complete, its records are folded
/// into the packet and the session is dropped.
#[derive(Debug)]
pub(crate) struct Session {
    id: NodeId,
    phase: Phase,
    pending: BTreeSet<String>,
    values: Records,
}

impl Session {
    pub(crate) fn new<'a>(id: NodeId, names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            id,
            phase: Phase::Collecting,
            pending: names.into_iter().map(str::to_owned).collect(),
            values: Records::new(),
        }
    }

    pub(crate) fn id(&self) -> &NodeId {
        &self.id
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Marks the end of the collecting phase.
    pub(crate) fn started(&mut self) {
        if self.phase == Phase::Collecting {
            self.phase = Phase::Pending;
            self.check();
        }
    }

    /// Records the outcome of `name`. Returns `true` when this settlement
    /// completed the session. Unknown or already settled names are ignored,
    /// records are write-once.
    pub(crate) fn settle(&mut self, name: &str, record: Record) -> bool {
        if !self.pending.remove(name) {
            return false;
        }

        self.values.insert(name.to_owned(), record);
        self.check()
    }

    fn check(&mut self) -> bool {
        // A session still collecting may drain early through shared records,
        // it only completes after `started`.
        if self.phase == Phase::Pending && self.pending.is_empty() {
            self.phase = Phase::Complete;
            return true;
        }
        false
    }

    pub(crate) fn into_parts(self) -> (NodeId, Records) {
        (self.id, self.values)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_completes_after_all_names_settle() {
        let mut session = Session::new(NodeId::from("n"), ["a", "b"]);
        assert_eq!(session.phase(), Phase::Collecting);

        session.started();
        assert_eq!(session.phase(), Phase::Pending);
        assert_eq!(session.pending(), 2);

        assert!(!session.settle("b", Record::resolved(None, json!(2))));
        assert_eq!(session.phase(), Phase::Pending);

        assert!(session.settle("a", Record::resolved(None, json!(1))));
        assert!(session.is_complete());

        let (id, values) = session.into_parts();
        assert_eq!(id, NodeId::from("n"));
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_failure_still_settles() {
        let mut session = Session::new(NodeId::from("n"), ["a"]);
        session.started();

        let failed = Record::failed(None, &anyhow::anyhow!("boom"));
        assert!(session.settle("a", failed));

        let (_, values) = session.into_parts();
        assert!(values["a"].is_failed());
        assert!(values["a"].completed);
    }

    #[test]
    fn test_records_are_write_once() {
        let mut session = Session::new(NodeId::from("n"), ["a", "b"]);
        session.started();

        session.settle("a", Record::resolved(None, json!("first")));
        assert!(!session.settle("a", Record::resolved(None, json!("second"))));
        assert!(!session.settle("unknown", Record::resolved(None, json!(0))));
        assert_eq!(session.pending(), 1);

        session.settle("b", Record::resolved(None, json!(null)));
        let (_, values) = session.into_parts();
        assert_eq!(values["a"].data, json!("first"));
    }

    #[test]
    fn test_settled_while_collecting_completes_on_start() {
        let mut session = Session::new(NodeId::from("n"), ["shared"]);
        assert!(!session.settle("shared", Record::resolved(Some("k".into()), json!(1))));
        assert_eq!(session.phase(), Phase::Collecting);

        session.started();
        assert!(session.is_complete());
    }

    #[test]
    fn test_empty_session_completes_immediately() {
        let mut session = Session::new(NodeId::from("n"), Vec::<&str>::new());
        session.started();
        assert!(session.is_complete());
    }
}
