// Copyright (c) 2024 Mike Tsao. All rights reserved.

use super::Delta;
use crate::record::{Record, RecordSerializable};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// One committed snapshot in a project's history: an ordered list of
/// [Delta]s plus a message, a timestamp, and a link to its parent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Revision {
    id: String,
    message: String,
    timestamp: i64,
    parent_id: Option<String>,
    deltas: Vec<Delta>,
}
impl Revision {
    /// Tag name of a serialized revision.
    pub const TAG: &'static str = "revision";
    const ATTR_ID: &'static str = "id";
    const ATTR_MESSAGE: &'static str = "message";
    const ATTR_TIMESTAMP: &'static str = "timestamp";
    const ATTR_PARENT: &'static str = "parent";

    /// A new revision, stamped now, with a fresh id.
    pub fn new_with(message: &str, parent_id: Option<&str>, deltas: Vec<Delta>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            message: message.to_string(),
            timestamp: now_ms(),
            parent_id: parent_id.map(str::to_string),
            deltas,
        }
    }

    #[allow(missing_docs)]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[allow(missing_docs)]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    #[allow(missing_docs)]
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    #[allow(missing_docs)]
    pub fn deltas(&self) -> &[Delta] {
        &self.deltas
    }

    /// The shallow descriptor of this revision.
    pub fn info(&self) -> RevisionInfo {
        RevisionInfo {
            id: self.id.clone(),
            message: self.message.clone(),
            timestamp: self.timestamp,
            parent_id: self.parent_id.clone(),
        }
    }
}
impl RecordSerializable for Revision {
    fn serialize(&self) -> Record {
        let mut r = Record::new(Self::TAG)
            .with_attribute(Self::ATTR_ID, self.id.as_str())
            .with_attribute(Self::ATTR_MESSAGE, self.message.as_str())
            .with_attribute(Self::ATTR_TIMESTAMP, self.timestamp.to_string());
        if let Some(parent_id) = &self.parent_id {
            r.set_attribute(Self::ATTR_PARENT, parent_id.as_str());
        }
        for delta in &self.deltas {
            r.add_child(delta.serialize());
        }
        r
    }

    fn deserialize(&mut self, record: &Record) {
        self.reset();

        let Some(root) = record.self_or_child(Self::TAG) else {
            return;
        };

        self.id = root
            .attribute(Self::ATTR_ID)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        self.message = root.attribute_or(Self::ATTR_MESSAGE, "");
        self.timestamp = root
            .attribute(Self::ATTR_TIMESTAMP)
            .and_then(|t| t.parse().ok())
            .unwrap_or_default();
        self.parent_id = root
            .attribute(Self::ATTR_PARENT)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        self.deltas = root
            .children_named(Delta::TAG)
            .map(|child| {
                let mut delta = Delta::default();
                delta.deserialize(child);
                delta
            })
            .collect();
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// What a remote store says about a revision without sending its deltas.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RevisionInfo {
    #[allow(missing_docs)]
    pub id: String,
    #[allow(missing_docs)]
    pub message: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}
impl RevisionInfo {
    /// A [Revision] with this descriptor's metadata and no deltas. Used to
    /// show remote-only history before it has been pulled.
    pub fn to_shallow_revision(&self) -> Revision {
        Revision {
            id: self.id.clone(),
            message: self.message.clone(),
            timestamp: self.timestamp,
            parent_id: self.parent_id.clone(),
            deltas: Vec::default(),
        }
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
