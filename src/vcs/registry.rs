// Copyright (c) 2024 Mike Tsao. All rights reserved.

use super::{VcsError, VersionControl};
use crate::uid::{VcsHandle, VcsHandleFactory};
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

/// A [VersionControl] that can be shared with worker threads.
pub type SharedVcs = Arc<RwLock<VersionControl>>;

/// Maps [VcsHandle]s to the project histories they name.
///
/// Background tasks carry handles, not histories. When a task runs it looks
/// its handle up here, so a project that was unloaded in the meantime shows
/// up as [VcsError::UnknownHandle] instead of being silently kept alive.
#[derive(Clone, Debug, Default)]
pub struct VcsRegistry {
    entries: Arc<RwLock<HashMap<VcsHandle, SharedVcs>>>,
    handle_factory: Arc<VcsHandleFactory>,
}
impl VcsRegistry {
    /// Takes ownership of `vcs` and returns its new handle.
    pub fn register(&self, vcs: VersionControl) -> Result<VcsHandle, VcsError> {
        let handle = self.handle_factory.mint_next();
        self.entries
            .write()
            .map_err(|_| VcsError::Poisoned)?
            .insert(handle, Arc::new(RwLock::new(vcs)));
        Ok(handle)
    }

    /// Resolves a handle.
    pub fn get(&self, handle: VcsHandle) -> Result<SharedVcs, VcsError> {
        self.entries
            .read()
            .map_err(|_| VcsError::Poisoned)?
            .get(&handle)
            .cloned()
            .ok_or(VcsError::UnknownHandle(handle))
    }

    /// Forgets a handle. Tasks that still hold it will fail to resolve it.
    pub fn remove(&self, handle: VcsHandle) -> Option<SharedVcs> {
        self.entries.write().ok()?.remove(&handle)
    }

    /// Finds the handle of the history for `project_id`, if one is
    /// registered.
    pub fn handle_for_project(&self, project_id: &str) -> Option<VcsHandle> {
        let entries = self.entries.read().ok()?;
        let handle = entries.iter().find_map(|(handle, vcs)| {
            let matches = vcs.read().is_ok_and(|vcs| vcs.project_id() == project_id);
            matches.then_some(*handle)
        });
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_handles_resolve_to_not_found() {
        let registry = VcsRegistry::default();
        let handle = registry.register(VersionControl::new("p1")).unwrap();
        assert!(registry.get(handle).is_ok());
        assert_eq!(registry.handle_for_project("p1"), Some(handle));

        assert!(registry.remove(handle).is_some());
        assert!(matches!(
            registry.get(handle),
            Err(VcsError::UnknownHandle(h)) if h == handle
        ));
        assert_eq!(registry.handle_for_project("p1"), None);

        let next = registry.register(VersionControl::new("p1")).unwrap();
        assert_ne!(next, handle, "handles are never reused");
    }

    #[test]
    fn clones_share_entries() {
        let registry = VcsRegistry::default();
        let clone = registry.clone();
        let handle = registry.register(VersionControl::new("p")).unwrap();
        let vcs = clone.get(handle).unwrap();
        vcs.write().unwrap().commit("from another owner", Vec::default());
        assert_eq!(registry.get(handle).unwrap().read().unwrap().len(), 1);
    }
}
