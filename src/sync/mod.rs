// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! Background synchronization with the remote resource store.
//!
//! [ResourceSyncService] owns at most one worker thread per [TaskSlot]. Each
//! worker performs one network-bound job (an updates check, a resource
//! request, a revisions fetch or sync, a project clone) and sends a
//! [TaskCompletion] back over a channel. The service's owner drains that
//! channel on a single thread, which is where resource managers, persisted
//! settings, and the UI get touched.

/// The most commonly used imports.
pub mod prelude {
    pub use super::{
        AppInfoDto, AppVersionDto, BaseResourceManager, Collaborators, ConfigStore,
        DirectoryRemote, FileConfigStore, MemoryConfigStore, RemoteBackend, ResourceInfoDto,
        ResourceManager, ResourceManagerPool, ResourceSyncError, ResourceSyncEvent,
        ResourceSyncService, ResourceType, SharedResourceManager, SyncSummary, TaskCompletion,
        TaskErrors, TaskFailure, TaskSlot, TaskState,
    };
}

pub use config::{ConfigStore, FileConfigStore, MemoryConfigStore, LAST_UPDATES_INFO_KEY};
pub use dto::{AppInfoDto, AppVersionDto, ResourceInfoDto};
pub use remote::{checked_component, DirectoryRemote, RemoteBackend, RemoteError};
pub use resources::{
    BaseResourceManager, ResourceManager, ResourceManagerPool, ResourceType,
    SharedResourceManager,
};
pub use service::{Collaborators, ResourceSyncEvent, ResourceSyncService};
pub use tasks::{
    ShouldExit, SyncSummary, TaskCompletion, TaskFailure, TaskOutcome, TaskSlot, TaskState,
};

mod config;
mod dto;
mod remote;
mod resources;
mod service;
mod tasks;

use crate::vcs::VcsError;
use thiserror::Error;

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ResourceSyncError {
    #[error("A {0} task is already running")]
    AlreadyRunning(TaskSlot),
    #[error("Couldn't start a {0} task: {1}")]
    Spawn(TaskSlot, String),
}

/// The ordered, human-readable messages that a failed task reports. Only the
/// first is meant for the user; the rest are for the log.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskErrors(pub Vec<String>);
impl TaskErrors {
    /// A list with a single message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(vec![message.into()])
    }

    /// The message to show the user, if there is one.
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    #[allow(missing_docs)]
    pub fn messages(&self) -> &[String] {
        &self.0
    }
}
impl core::fmt::Display for TaskErrors {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0.join("; "))
    }
}
impl From<anyhow::Error> for TaskErrors {
    fn from(e: anyhow::Error) -> Self {
        Self(e.chain().map(|cause| cause.to_string()).collect())
    }
}
impl From<VcsError> for TaskErrors {
    fn from(e: VcsError) -> Self {
        Self::new(e.to_string())
    }
}

/// The tag of the platform this build runs on, as the server spells it.
pub fn platform_type() -> &'static str {
    if cfg!(target_os = "windows") {
        if cfg!(target_pointer_width = "64") {
            "windows64"
        } else {
            "windows32"
        }
    } else if cfg!(target_os = "android") {
        "android"
    } else if cfg!(target_os = "linux") {
        if cfg!(target_pointer_width = "64") {
            "linux64"
        } else {
            "linux32"
        }
    } else if cfg!(target_os = "macos") {
        "mac"
    } else if cfg!(target_os = "ios") {
        "ios"
    } else {
        "unknown"
    }
}
