// Copyright (c) 2024 Mike Tsao. All rights reserved.

#![warn(missing_docs)]

//! The `ensnare-sync` crate keeps a music project's history and the app's
//! downloadable resources in step with a remote store.
//!
//! - [vcs] models history: [Delta](vcs::Delta)s describe single changes,
//!   [Revision](vcs::Revision)s group them, and
//!   [VersionControl](vcs::VersionControl) knows which revisions are local,
//!   remote, or both.
//! - [sync] runs the network-bound work on background threads.
//!   [ResourceSyncService](sync::ResourceSyncService) allows one task per kind
//!   at a time and hands results back over a crossbeam channel.

pub mod record;
pub mod rng;
pub mod sync;
pub mod traits;
pub mod uid;
pub mod util;
pub mod vcs;

pub use version::app_version;

mod version;

/// A collection of imports that are useful to users of this crate. `use
/// ensnare_sync::prelude::*;` for easier onboarding.
pub mod prelude {
    pub use super::{
        record::{Record, RecordSerializable},
        rng::Rng,
        sync::prelude::*,
        traits::prelude::*,
        uid::VcsHandle,
        util::prelude::*,
        vcs::prelude::*,
    };
}
