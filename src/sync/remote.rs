// Copyright (c) 2024 Mike Tsao. All rights reserved.

use super::{AppInfoDto, ResourceType};
use crate::{
    record::{Record, RecordSerializable},
    vcs::{Revision, RevisionInfo},
};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[allow(missing_docs)]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Project {0} not found")]
    ProjectNotFound(String),
    #[error("Invalid identifier {0:?}")]
    InvalidIdentifier(String),
}
impl RemoteError {
    /// Whether `e` says that the remote has never heard of the project.
    pub fn is_project_not_found(e: &anyhow::Error) -> bool {
        matches!(
            e.downcast_ref::<RemoteError>(),
            Some(RemoteError::ProjectNotFound(_))
        )
    }
}

/// Returns `id` if it is safe to use as a single path component. Ids come
/// from the network, project files, and the command line, so they must not be
/// able to climb out of the directory they're joined to.
pub fn checked_component(id: &str) -> Result<&str, RemoteError> {
    let path = Path::new(id);
    if id.is_empty()
        || id == "."
        || id == ".."
        || path.is_absolute()
        || path.has_root()
        || id.contains(|c: char| c == '/' || c == '\\' || c == '\0' || c == ':')
    {
        Err(RemoteError::InvalidIdentifier(id.to_string()))
    } else {
        Ok(id)
    }
}

/// The remote resource store, as seen by the sync tasks. Every method blocks
/// until its answer arrives, so callers run them on worker threads.
pub trait RemoteBackend: Send + Sync + core::fmt::Debug {
    /// Current app versions and resource hashes.
    fn app_info(&self, platform: &str) -> anyhow::Result<AppInfoDto>;

    /// The current content of one resource.
    fn resource(&self, resource_type: &ResourceType) -> anyhow::Result<Record>;

    /// Shallow descriptors of every revision the remote has for a project.
    fn revisions_info(&self, project_id: &str) -> anyhow::Result<Vec<RevisionInfo>>;

    /// One revision, deltas included.
    fn revision(&self, project_id: &str, revision_id: &str) -> anyhow::Result<Revision>;

    /// Uploads a revision.
    fn push_revision(
        &self,
        project_id: &str,
        project_name: &str,
        revision: &Revision,
    ) -> anyhow::Result<()>;
}

/// A [RemoteBackend] laid out as plain files, for offline use and testing:
///
/// ```text
/// <root>/app-info.json
/// <root>/resources/<type>.json
/// <root>/projects/<project-id>/project.json
/// <root>/projects/<project-id>/revisions/<revision-id>.json
/// ```
#[derive(Debug)]
pub struct DirectoryRemote {
    root: PathBuf,
}
impl DirectoryRemote {
    #[allow(missing_docs)]
    pub fn new_with(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Publishes the app info document.
    pub fn publish_app_info(&self, info: &AppInfoDto) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(info)
            .map_err(|e| anyhow::format_err!("Unable to serialize app info: {}", e))?;
        self.write(&self.root.join("app-info.json"), &json)
    }

    /// Publishes the content of a resource.
    pub fn publish_resource(
        &self,
        resource_type: &ResourceType,
        content: &Record,
    ) -> anyhow::Result<()> {
        let name = checked_component(resource_type.as_str())?;
        self.write(
            &self.root.join("resources").join(format!("{name}.json")),
            &content.to_json()?,
        )
    }

    fn project_dir(&self, project_id: &str) -> anyhow::Result<PathBuf> {
        Ok(self
            .root
            .join("projects")
            .join(checked_component(project_id)?))
    }

    fn revision_path(&self, project_id: &str, revision_id: &str) -> anyhow::Result<PathBuf> {
        Ok(self
            .project_dir(project_id)?
            .join("revisions")
            .join(format!("{}.json", checked_component(revision_id)?)))
    }

    fn read(&self, path: &Path) -> anyhow::Result<String> {
        std::fs::read_to_string(path).map_err(|e| anyhow::format_err!("Couldn't read {path:?}: {}", e))
    }

    fn write(&self, path: &Path, contents: &str) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| anyhow::format_err!("Unable to create {dir:?}: {}", e))?;
        }
        std::fs::write(path, contents)
            .map_err(|e| anyhow::format_err!("Unable to write {path:?}: {}", e))
    }

    fn read_revision(path: &Path) -> anyhow::Result<Revision> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::format_err!("Couldn't read {path:?}: {}", e))?;
        let record = Record::from_json(&contents)?;
        if record.self_or_child(Revision::TAG).is_none() {
            return Err(anyhow::format_err!("{path:?} doesn't contain a revision"));
        }
        let mut revision = Revision::default();
        revision.deserialize(&record);
        Ok(revision)
    }
}
impl RemoteBackend for DirectoryRemote {
    fn app_info(&self, _platform: &str) -> anyhow::Result<AppInfoDto> {
        let path = self.root.join("app-info.json");
        serde_json::from_str(&self.read(&path)?)
            .map_err(|e| anyhow::format_err!("Couldn't parse {path:?}: {}", e))
    }

    fn resource(&self, resource_type: &ResourceType) -> anyhow::Result<Record> {
        let name = checked_component(resource_type.as_str())?;
        Record::from_json(&self.read(&self.root.join("resources").join(format!("{name}.json")))?)
    }

    fn revisions_info(&self, project_id: &str) -> anyhow::Result<Vec<RevisionInfo>> {
        let project_dir = self.project_dir(project_id)?;
        if !project_dir.is_dir() {
            return Err(RemoteError::ProjectNotFound(project_id.to_string()).into());
        }
        let revisions_dir = project_dir.join("revisions");
        if !revisions_dir.is_dir() {
            return Ok(Vec::default());
        }
        let entries = std::fs::read_dir(&revisions_dir)
            .map_err(|e| anyhow::format_err!("Couldn't list {revisions_dir:?}: {}", e))?;
        let mut infos = Vec::default();
        for entry in entries {
            let path = entry
                .map_err(|e| anyhow::format_err!("Couldn't list {revisions_dir:?}: {}", e))?
                .path();
            if path.extension().is_some_and(|ext| ext == "json") {
                infos.push(Self::read_revision(&path)?.info());
            }
        }
        infos.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(infos)
    }

    fn revision(&self, project_id: &str, revision_id: &str) -> anyhow::Result<Revision> {
        Self::read_revision(&self.revision_path(project_id, revision_id)?)
    }

    fn push_revision(
        &self,
        project_id: &str,
        project_name: &str,
        revision: &Revision,
    ) -> anyhow::Result<()> {
        let project = serde_json::json!({ "id": project_id, "name": project_name });
        self.write(
            &self.project_dir(project_id)?.join("project.json"),
            &project.to_string(),
        )?;
        self.write(
            &self.revision_path(project_id, revision.id())?,
            &revision.serialize().to_json()?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        sync::ResourceInfoDto,
        vcs::{Delta, DeltaDescription, DeltaType},
    };

    #[test]
    fn resources_and_app_info() {
        let dir = tempfile::tempdir().unwrap();
        let remote = DirectoryRemote::new_with(dir.path());
        assert!(remote.app_info("linux64").is_err(), "nothing published yet");

        let info = AppInfoDto::new_with(
            Vec::default(),
            vec![ResourceInfoDto {
                resource_type: ResourceType::from("themes"),
                hash: "H1".to_string(),
            }],
        );
        remote.publish_app_info(&info).unwrap();
        assert_eq!(remote.app_info("linux64").unwrap(), info);

        let content = Record::new("themes").with_attribute("name", "dark");
        remote
            .publish_resource(&ResourceType::from("themes"), &content)
            .unwrap();
        assert_eq!(remote.resource(&ResourceType::from("themes")).unwrap(), content);
        assert!(remote.resource(&ResourceType::from("../etc")).is_err());
    }

    #[test]
    fn revisions() {
        let dir = tempfile::tempdir().unwrap();
        let remote = DirectoryRemote::new_with(dir.path());
        let missing = remote.revisions_info("p1").unwrap_err();
        assert!(RemoteError::is_project_not_found(&missing), "unknown project");

        let first = Revision::new_with("first", None, Vec::default());
        let second = Revision::new_with(
            "second",
            Some(first.id()),
            vec![Delta::new_with(DeltaType::TrackPath, DeltaDescription::new("x"))],
        );
        remote.push_revision("p1", "Song", &first).unwrap();
        remote.push_revision("p1", "Song", &second).unwrap();

        let infos = remote.revisions_info("p1").unwrap();
        assert_eq!(infos.len(), 2);
        assert!(infos.contains(&second.info()));
        assert_eq!(remote.revision("p1", second.id()).unwrap(), second);
        assert!(remote.revision("p1", "missing").is_err());
    }

    #[test]
    fn identifiers_stay_inside_the_store() {
        for bad in ["", ".", "..", "a/b", "a\\b", "/etc", "c:x"] {
            assert!(
                checked_component(bad).is_err(),
                "{bad:?} should be rejected"
            );
        }
        assert_eq!(checked_component("p1"), Ok("p1"));
        assert_eq!(checked_component("my.song-2"), Ok("my.song-2"));
    }
}
