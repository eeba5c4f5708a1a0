// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! Project history: [Delta]s describe single changes, [Revision]s group them
//! into commits, and [VersionControl] tracks which revisions exist locally,
//! remotely, or both.

/// The most commonly used imports.
pub mod prelude {
    pub use super::{
        Delta, DeltaDescription, DeltaType, Revision, RevisionInfo, SharedVcs, SyncPlan,
        SyncState, VcsError, VcsEvent, VcsRegistry, VersionControl,
    };
}

pub use delta::{Delta, DeltaType};
pub use description::DeltaDescription;
pub use history::{SyncPlan, SyncState, VcsEvent, VersionControl};
pub use registry::{SharedVcs, VcsRegistry};
pub use revision::{Revision, RevisionInfo};

mod delta;
mod description;
mod history;
mod registry;
mod revision;

use crate::uid::VcsHandle;
use thiserror::Error;

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("No version control is registered for handle {0}")]
    UnknownHandle(VcsHandle),
    #[error("Revision {0} isn't in this history")]
    UnknownRevision(String),
    #[error("Revision's parent {0} hasn't been pulled yet")]
    ParentMissing(String),
    #[error("Version control state is unavailable after a panic in another thread")]
    Poisoned,
}
