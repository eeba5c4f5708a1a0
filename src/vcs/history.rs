// Copyright (c) 2024 Mike Tsao. All rights reserved.

use super::{Delta, Revision, RevisionInfo, VcsError};
use crate::record::{Record, RecordSerializable};
use crossbeam_channel::{Receiver, Sender};
use std::collections::{HashMap, HashSet};

/// Where a revision lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, derive_more::Display)]
pub enum SyncState {
    /// Committed here, not yet pushed.
    LocalOnly,
    /// Known from the remote's revision list, not yet pulled. The local copy
    /// has metadata but no deltas.
    RemoteOnly,
    /// Present in both places.
    Synced,
}

/// Sent to every subscriber when the history changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VcsEvent {
    /// Revisions were added, pulled, or changed sync state.
    HistoryChanged,
}

/// The difference between local and remote history.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Remote revisions to download, parents before children.
    pub to_pull: Vec<RevisionInfo>,
    /// Local revision ids to upload, parents before children.
    pub to_push: Vec<String>,
}
impl SyncPlan {
    /// Whether local and remote already agree.
    pub fn is_empty(&self) -> bool {
        self.to_pull.is_empty() && self.to_push.is_empty()
    }
}

#[derive(Debug)]
struct RevisionNode {
    revision: Revision,
    state: SyncState,
}

/// The revision history of one project.
#[derive(Debug)]
pub struct VersionControl {
    project_id: String,
    nodes: HashMap<String, RevisionNode>,
    order: Vec<String>,
    head: Option<String>,
    subscribers: Vec<Sender<VcsEvent>>,
}
impl VersionControl {
    /// An empty history for the given project.
    pub fn new(project_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            nodes: Default::default(),
            order: Default::default(),
            head: None,
            subscribers: Default::default(),
        }
    }

    #[allow(missing_docs)]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// The most recent revision that the project's working state is based on.
    pub fn head_id(&self) -> Option<&str> {
        self.head.as_deref()
    }

    /// Looks up a revision. Remote-only revisions come back without deltas.
    pub fn revision(&self, id: &str) -> Option<&Revision> {
        self.nodes.get(id).map(|n| &n.revision)
    }

    #[allow(missing_docs)]
    pub fn sync_state(&self, id: &str) -> Option<SyncState> {
        self.nodes.get(id).map(|n| n.state)
    }

    /// All revisions in the order they became known.
    pub fn revisions(&self) -> impl Iterator<Item = &Revision> {
        self.order.iter().filter_map(|id| self.revision(id))
    }

    #[allow(missing_docs)]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns a channel that receives a [VcsEvent] each time the history
    /// changes. Dropping the receiver unsubscribes.
    pub fn subscribe(&mut self) -> Receiver<VcsEvent> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.subscribers.push(sender);
        receiver
    }

    /// Records a new local revision on top of the current head and returns
    /// its id.
    pub fn commit(&mut self, message: &str, deltas: Vec<Delta>) -> String {
        let revision = Revision::new_with(message, self.head.as_deref(), deltas);
        let id = revision.id().to_string();
        self.insert(revision, SyncState::LocalOnly);
        self.head = Some(id.clone());
        self.notify();
        id
    }

    /// Registers what the remote has. Unknown revisions become
    /// [SyncState::RemoteOnly]; local-only ones that the remote turns out to
    /// have become [SyncState::Synced]. Returns how many revisions changed.
    pub fn apply_remote_info(&mut self, infos: &[RevisionInfo]) -> usize {
        let mut changed = 0;
        for info in infos {
            match self.nodes.get_mut(&info.id) {
                Some(node) => {
                    if node.state == SyncState::LocalOnly {
                        node.state = SyncState::Synced;
                        changed += 1;
                    }
                }
                None => {
                    self.insert(info.to_shallow_revision(), SyncState::RemoteOnly);
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            self.notify();
        }
        changed
    }

    /// Works out what has to move in each direction to make local and remote
    /// agree. If `only` is non-empty, the plan is limited to those ids.
    pub fn diff_against(&self, remote: &[RevisionInfo], only: &[String]) -> SyncPlan {
        let wanted = |id: &str| only.is_empty() || only.iter().any(|o| o == id);
        let remote_ids: HashSet<&str> = remote.iter().map(|r| r.id.as_str()).collect();

        let to_pull = parents_first(
            remote
                .iter()
                .filter(|info| wanted(&info.id))
                .filter(|info| {
                    self.nodes
                        .get(&info.id)
                        .map_or(true, |n| n.state == SyncState::RemoteOnly)
                })
                .cloned()
                .collect(),
        );
        let to_push = self
            .order
            .iter()
            .filter(|id| wanted(id) && !remote_ids.contains(id.as_str()))
            .filter(|id| self.sync_state(id) == Some(SyncState::LocalOnly))
            .cloned()
            .collect();

        SyncPlan { to_pull, to_push }
    }

    /// Adds a full revision downloaded from the remote. Its parent, if it
    /// names one, must already be known.
    pub fn insert_pulled(&mut self, revision: Revision) -> Result<(), VcsError> {
        if let Some(parent_id) = revision.parent_id() {
            if !self.nodes.contains_key(parent_id) {
                return Err(VcsError::ParentMissing(parent_id.to_string()));
            }
        }
        let advances_head = self.head.is_none() || self.head.as_deref() == revision.parent_id();
        let id = revision.id().to_string();
        self.insert(revision, SyncState::Synced);
        if advances_head {
            self.head = Some(id);
        }
        self.notify();
        Ok(())
    }

    /// Marks a local revision as present on the remote.
    pub fn mark_synced(&mut self, id: &str) -> Result<(), VcsError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| VcsError::UnknownRevision(id.to_string()))?;
        if node.state != SyncState::Synced {
            node.state = SyncState::Synced;
            self.notify();
        }
        Ok(())
    }

    fn insert(&mut self, revision: Revision, state: SyncState) {
        let id = revision.id().to_string();
        if self
            .nodes
            .insert(id.clone(), RevisionNode { revision, state })
            .is_none()
        {
            self.order.push(id);
        }
    }

    fn notify(&mut self) {
        self.subscribers
            .retain(|s| s.send(VcsEvent::HistoryChanged).is_ok());
    }
}

impl VersionControl {
    /// Tag name of a serialized history.
    pub const TAG: &'static str = "vcs";
    const ATTR_PROJECT_ID: &'static str = "project-id";
    const ATTR_HEAD: &'static str = "head";
    const ATTR_SYNC_STATE: &'static str = "sync-state";

    fn state_tag(state: SyncState) -> &'static str {
        match state {
            SyncState::LocalOnly => "local",
            SyncState::RemoteOnly => "remote",
            SyncState::Synced => "synced",
        }
    }

    fn state_from_tag(tag: &str) -> SyncState {
        match tag {
            "remote" => SyncState::RemoteOnly,
            "synced" => SyncState::Synced,
            _ => SyncState::LocalOnly,
        }
    }
}
impl RecordSerializable for VersionControl {
    fn serialize(&self) -> Record {
        let mut r = Record::new(Self::TAG).with_attribute(Self::ATTR_PROJECT_ID, self.project_id.as_str());
        if let Some(head) = &self.head {
            r.set_attribute(Self::ATTR_HEAD, head.as_str());
        }
        for id in &self.order {
            if let Some(node) = self.nodes.get(id) {
                r.add_child(
                    node.revision
                        .serialize()
                        .with_attribute(Self::ATTR_SYNC_STATE, Self::state_tag(node.state)),
                );
            }
        }
        r
    }

    /// Subscribers stay subscribed and are told about the new history.
    fn deserialize(&mut self, record: &Record) {
        self.reset();

        let Some(root) = record.self_or_child(Self::TAG) else {
            return;
        };
        self.project_id = root.attribute_or(Self::ATTR_PROJECT_ID, "");
        for child in root.children_named(Revision::TAG) {
            let mut revision = Revision::default();
            revision.deserialize(child);
            let state = Self::state_from_tag(&child.attribute_or(Self::ATTR_SYNC_STATE, ""));
            self.insert(revision, state);
        }
        self.head = root
            .attribute(Self::ATTR_HEAD)
            .filter(|head| self.nodes.contains_key(*head))
            .map(str::to_string);
        self.notify();
    }

    fn reset(&mut self) {
        self.project_id.clear();
        self.nodes.clear();
        self.order.clear();
        self.head = None;
    }
}

/// Orders revisions so that each one follows its parent whenever the parent
/// is in the same list. Revisions whose parents are elsewhere keep their
/// relative order.
pub(crate) fn parents_first(mut remaining: Vec<RevisionInfo>) -> Vec<RevisionInfo> {
    let mut ordered = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        let pending: HashSet<String> = remaining.iter().map(|r| r.id.clone()).collect();
        let (ready, blocked): (Vec<_>, Vec<_>) = remaining.into_iter().partition(|r| {
            r.parent_id
                .as_ref()
                .map_or(true, |parent| !pending.contains(parent))
        });
        if ready.is_empty() {
            // A cycle can only come from a corrupt listing. Keep what's left
            // in its original order rather than spinning.
            ordered.extend(blocked);
            break;
        }
        ordered.extend(ready);
        remaining = blocked;
    }
    ordered
}
