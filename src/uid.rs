// Copyright (c) 2023 Mike Tsao. All rights reserved.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A [VcsHandle] names a [VersionControl](crate::vcs::VersionControl) in a
/// [VcsRegistry](crate::vcs::VcsRegistry). Handles are never reused within a
/// process, so a stale handle can't accidentally resolve to a newer project.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct VcsHandle(pub usize);

/// Mints [VcsHandle]s, starting at 1.
#[derive(Debug)]
pub(crate) struct VcsHandleFactory(AtomicUsize);
impl Default for VcsHandleFactory {
    fn default() -> Self {
        Self(AtomicUsize::new(1))
    }
}
impl VcsHandleFactory {
    pub(crate) fn mint_next(&self) -> VcsHandle {
        VcsHandle(self.0.fetch_add(1, Ordering::Relaxed))
    }
}
