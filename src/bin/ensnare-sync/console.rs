// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! Terminal stand-ins for the pieces of the app that the sync service talks
//! to.

use ensnare_sync::{prelude::*, sync::checked_component};
use std::path::{Path, PathBuf};

/// Reports feedback on stderr.
#[derive(Debug, Default)]
pub(crate) struct ConsolePresenter {
    modal: Option<ModalIndicator>,
}
impl PresentsFeedback for ConsolePresenter {
    fn show_tooltip(&mut self, text: &str) {
        eprintln!("{text}");
    }

    fn show_modal(&mut self, indicator: ModalIndicator) {
        match indicator {
            ModalIndicator::Progress => eprintln!("Working..."),
            ModalIndicator::Success => eprintln!("Done."),
            ModalIndicator::Failure => eprintln!("Failed."),
        }
        self.modal = Some(indicator);
    }

    fn hide_modal_if_any(&mut self) {
        if let Some(modal) = self.modal.take() {
            log::debug!("Dismissed the {modal} indicator");
        }
    }
}

/// Projects live in `<root>/<project-id>/`.
#[derive(Debug)]
pub(crate) struct DirectoryWorkspace {
    root: PathBuf,
}
impl DirectoryWorkspace {
    const HISTORY_FILENAME: &'static str = "history.json";

    pub(crate) fn new_with(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// The project's directory. Ids that would reach outside the root are
    /// refused.
    fn project_dir(&self, project_id: &str) -> anyhow::Result<PathBuf> {
        Ok(self.root.join(checked_component(project_id)?))
    }

    /// Reads a project's history, or starts an empty one.
    pub(crate) fn load_history(&self, project_id: &str) -> anyhow::Result<VersionControl> {
        let path = self.project_dir(project_id)?.join(Self::HISTORY_FILENAME);
        let mut vcs = VersionControl::new(project_id);
        if !path.exists() {
            return Ok(vcs);
        }
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::format_err!("Couldn't read {path:?}: {}", e))?;
        vcs.deserialize(&Record::from_json(&contents)?);
        if vcs.project_id() != project_id {
            return Err(anyhow::format_err!(
                "{path:?} belongs to project {}",
                vcs.project_id()
            ));
        }
        Ok(vcs)
    }

    pub(crate) fn save_history(&self, vcs: &VersionControl) -> anyhow::Result<()> {
        let dir = self.project_dir(vcs.project_id())?;
        std::fs::create_dir_all(&dir)
            .map_err(|e| anyhow::format_err!("Unable to create {dir:?}: {}", e))?;
        let path = dir.join(Self::HISTORY_FILENAME);
        std::fs::write(&path, vcs.serialize().to_json()?)
            .map_err(|e| anyhow::format_err!("Unable to write {path:?}: {}", e))
    }
}
impl Workspace for DirectoryWorkspace {
    fn unload_project(&mut self, project_id: &str, delete_local: bool, delete_remote: bool) {
        if delete_remote {
            log::warn!("Not deleting {project_id} on the remote; the CLI never does that");
        }
        if !delete_local {
            return;
        }
        let dir = match self.project_dir(project_id) {
            Ok(dir) => dir,
            Err(e) => {
                log::error!("Not removing anything for {project_id:?}: {e}");
                return;
            }
        };
        if dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                log::error!("Couldn't remove {dir:?}: {e}");
            }
        }
    }
}

/// Writes each downloaded resource to `<dir>/<type>.json`.
#[derive(Debug)]
pub(crate) struct ResourceFileWriter {
    path: PathBuf,
}
impl ResourceFileWriter {
    pub(crate) fn new_with(dir: &Path, resource_type: &ResourceType) -> Self {
        Self {
            path: dir.join(format!("{resource_type}.json")),
        }
    }
}
impl ResourceManager for ResourceFileWriter {
    fn update_base_resource(&mut self, resource: Record) {
        let result = resource.to_json().and_then(|json| {
            if let Some(dir) = self.path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            std::fs::write(&self.path, json)?;
            Ok(())
        });
        match result {
            Ok(_) => eprintln!("Updated {:?}", self.path),
            Err(e) => log::error!("Couldn't write {:?}: {e}", self.path),
        }
    }
}
