// Copyright (c) 2024 Mike Tsao. All rights reserved.

use super::ResourceType;
use crate::record::{Record, RecordSerializable};
use serde::{Deserialize, Serialize};

/// A released app version for one platform.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppVersionDto {
    #[allow(missing_docs)]
    pub platform_type: String,
    #[allow(missing_docs)]
    pub version: String,
    /// Where to download it.
    #[serde(default)]
    pub link: String,
}

/// A downloadable resource and the hash of its current content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResourceInfoDto {
    #[serde(rename = "type")]
    #[allow(missing_docs)]
    pub resource_type: ResourceType,
    #[allow(missing_docs)]
    pub hash: String,
}

/// What the server says is current: app versions per platform and the
/// resources that clients should keep up to date.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppInfoDto {
    #[serde(default)]
    versions: Vec<AppVersionDto>,
    #[serde(default)]
    resources: Vec<ResourceInfoDto>,
}
impl AppInfoDto {
    const TAG: &'static str = "app-info";
    const VERSION_TAG: &'static str = "version";
    const RESOURCE_TAG: &'static str = "resource";

    #[allow(missing_docs)]
    pub fn new_with(versions: Vec<AppVersionDto>, resources: Vec<ResourceInfoDto>) -> Self {
        Self {
            versions,
            resources,
        }
    }

    #[allow(missing_docs)]
    pub fn versions(&self) -> &[AppVersionDto] {
        &self.versions
    }

    #[allow(missing_docs)]
    pub fn resources(&self) -> &[ResourceInfoDto] {
        &self.resources
    }

    /// The advertised version for `platform`, compared case-insensitively.
    pub fn version_for_platform(&self, platform: &str) -> Option<&AppVersionDto> {
        self.versions
            .iter()
            .find(|v| v.platform_type.eq_ignore_ascii_case(platform))
    }

    /// Treating `self` as what was stored last time, whether `candidate`
    /// names content we don't have yet: either its type is new to us or its
    /// hash changed.
    pub fn resource_seems_outdated(&self, candidate: &ResourceInfoDto) -> bool {
        !self
            .resources
            .iter()
            .any(|r| r.resource_type == candidate.resource_type && r.hash == candidate.hash)
    }
}
impl RecordSerializable for AppInfoDto {
    fn serialize(&self) -> Record {
        let mut r = Record::new(Self::TAG);
        for v in &self.versions {
            r.add_child(
                Record::new(Self::VERSION_TAG)
                    .with_attribute("platform-type", v.platform_type.as_str())
                    .with_attribute("version", v.version.as_str())
                    .with_attribute("link", v.link.as_str()),
            );
        }
        for resource in &self.resources {
            r.add_child(
                Record::new(Self::RESOURCE_TAG)
                    .with_attribute("type", resource.resource_type.as_str())
                    .with_attribute("hash", resource.hash.as_str()),
            );
        }
        r
    }

    fn deserialize(&mut self, record: &Record) {
        self.reset();

        let Some(root) = record.self_or_child(Self::TAG) else {
            return;
        };
        self.versions = root
            .children_named(Self::VERSION_TAG)
            .map(|v| AppVersionDto {
                platform_type: v.attribute_or("platform-type", ""),
                version: v.attribute_or("version", ""),
                link: v.attribute_or("link", ""),
            })
            .collect();
        self.resources = root
            .children_named(Self::RESOURCE_TAG)
            .filter_map(|r| {
                // A resource without a type can't be matched to anything.
                let resource_type = r.attribute("type").filter(|t| !t.is_empty())?;
                Some(ResourceInfoDto {
                    resource_type: ResourceType::from(resource_type),
                    hash: r.attribute_or("hash", ""),
                })
            })
            .collect();
    }

    fn reset(&mut self) {
        self.versions.clear();
        self.resources.clear();
    }
}
