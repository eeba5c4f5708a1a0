// Copyright (c) 2024 Mike Tsao. All rights reserved.

use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// Names a category of synchronizable content, such as `translations`,
/// `arrangements`, or `colour-schemes`.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    derive_more::Display,
)]
#[serde(transparent)]
pub struct ResourceType(String);
impl ResourceType {
    #[allow(missing_docs)]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<&str> for ResourceType {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
impl From<String> for ResourceType {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Owns one category of content that the server can replace.
pub trait ResourceManager: Send + core::fmt::Debug {
    /// Replaces the stored base content. Calling it twice with the same
    /// record leaves the same state as calling it once.
    fn update_base_resource(&mut self, resource: Record);
}

/// A [ResourceManager] that just keeps the latest base record.
#[derive(Debug, Default)]
pub struct BaseResourceManager {
    base: Option<Record>,
    update_count: usize,
}
impl ResourceManager for BaseResourceManager {
    fn update_base_resource(&mut self, resource: Record) {
        self.base = Some(resource);
        self.update_count += 1;
    }
}
impl BaseResourceManager {
    /// The most recent base content, if any has arrived.
    pub fn base(&self) -> Option<&Record> {
        self.base.as_ref()
    }

    /// How many times the base content has been replaced.
    pub fn update_count(&self) -> usize {
        self.update_count
    }
}

/// A [ResourceManager] shared between the pool and whoever else needs it.
/// The [Mutex] makes sure only one update at a time touches its content.
pub type SharedResourceManager = Arc<Mutex<dyn ResourceManager>>;

/// The resource managers that the sync service keeps up to date, keyed by
/// [ResourceType]. The key set is fixed when the pool is built.
#[derive(Clone, Debug, Default)]
pub struct ResourceManagerPool {
    managers: Arc<HashMap<ResourceType, SharedResourceManager>>,
}
impl ResourceManagerPool {
    /// Builds the pool. A later entry with a repeated type replaces the
    /// earlier one.
    pub fn new_with(
        managers: impl IntoIterator<Item = (ResourceType, SharedResourceManager)>,
    ) -> Self {
        Self {
            managers: Arc::new(managers.into_iter().collect()),
        }
    }

    #[allow(missing_docs)]
    pub fn contains(&self, resource_type: &ResourceType) -> bool {
        self.managers.contains_key(resource_type)
    }

    #[allow(missing_docs)]
    pub fn get(&self, resource_type: &ResourceType) -> Option<SharedResourceManager> {
        self.managers.get(resource_type).cloned()
    }

    /// The types this pool manages, sorted.
    pub fn resource_types(&self) -> Vec<ResourceType> {
        let mut types: Vec<_> = self.managers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Hands `resource` to the manager for `resource_type`. Returns false if
    /// no manager owns that type, in which case the content is dropped.
    pub fn update_base_resource(&self, resource_type: &ResourceType, resource: Record) -> bool {
        let Some(manager) = self.managers.get(resource_type) else {
            return false;
        };
        match manager.lock() {
            Ok(mut manager) => {
                manager.update_base_resource(resource);
                true
            }
            Err(_) => {
                log::error!("Resource manager for {resource_type} is poisoned; update dropped");
                false
            }
        }
    }
}
