// Copyright (c) 2024 Mike Tsao. All rights reserved.

#![allow(dead_code)]

use crossbeam_channel::{Receiver, Sender};
use ensnare_sync::prelude::*;
use std::{
    path::Path,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tempfile::TempDir;

/// What the service asked the UI to do, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Feedback {
    Tooltip(String),
    Modal(ModalIndicator),
    HideModal,
}

#[derive(Debug, Default)]
pub struct RecordingPresenter {
    pub calls: Arc<Mutex<Vec<Feedback>>>,
}
impl PresentsFeedback for RecordingPresenter {
    fn show_tooltip(&mut self, text: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(Feedback::Tooltip(text.to_string()));
    }

    fn show_modal(&mut self, indicator: ModalIndicator) {
        self.calls.lock().unwrap().push(Feedback::Modal(indicator));
    }

    fn hide_modal_if_any(&mut self) {
        self.calls.lock().unwrap().push(Feedback::HideModal);
    }
}

#[derive(Debug, Default)]
pub struct RecordingWorkspace {
    pub unloads: Arc<Mutex<Vec<(String, bool, bool)>>>,
}
impl Workspace for RecordingWorkspace {
    fn unload_project(&mut self, project_id: &str, delete_local: bool, delete_remote: bool) {
        self.unloads
            .lock()
            .unwrap()
            .push((project_id.to_string(), delete_local, delete_remote));
    }
}

/// A [DirectoryRemote] whose revision listing can be held up until the test
/// opens a gate, or made to fail.
#[derive(Debug)]
pub struct ScriptedBackend {
    remote: DirectoryRemote,
    gated_project: Option<(String, Receiver<()>)>,
    failure: Option<String>,
}
impl ScriptedBackend {
    pub fn new_with(root: &Path) -> Self {
        Self {
            remote: DirectoryRemote::new_with(root),
            gated_project: None,
            failure: None,
        }
    }

    /// Holds `revisions_info(project_id)` until the returned sender sends or
    /// is dropped.
    pub fn gate(mut self, project_id: &str) -> (Self, Sender<()>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.gated_project = Some((project_id.to_string(), receiver));
        (self, sender)
    }

    pub fn failing_with(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }
}
impl RemoteBackend for ScriptedBackend {
    fn app_info(&self, platform: &str) -> anyhow::Result<AppInfoDto> {
        self.remote.app_info(platform)
    }

    fn resource(&self, resource_type: &ResourceType) -> anyhow::Result<Record> {
        self.remote.resource(resource_type)
    }

    fn revisions_info(&self, project_id: &str) -> anyhow::Result<Vec<RevisionInfo>> {
        if let Some((gated, gate)) = &self.gated_project {
            if gated == project_id {
                let _ = gate.recv();
            }
        }
        if let Some(message) = &self.failure {
            return Err(anyhow::anyhow!(message.clone()));
        }
        self.remote.revisions_info(project_id)
    }

    fn revision(&self, project_id: &str, revision_id: &str) -> anyhow::Result<Revision> {
        self.remote.revision(project_id, revision_id)
    }

    fn push_revision(
        &self,
        project_id: &str,
        project_name: &str,
        revision: &Revision,
    ) -> anyhow::Result<()> {
        self.remote.push_revision(project_id, project_name, revision)
    }
}

/// A service wired to recording collaborators.
pub struct Harness {
    pub service: ResourceSyncService,
    pub feedback: Arc<Mutex<Vec<Feedback>>>,
    pub unloads: Arc<Mutex<Vec<(String, bool, bool)>>>,
    pub config: MemoryConfigStore,
    pub themes: Arc<Mutex<BaseResourceManager>>,
    pub translations: Arc<Mutex<BaseResourceManager>>,
}
impl Harness {
    const RNG_SEED: u128 = 0x5EED;

    pub fn new_with(
        settings: ResourceSyncSettings,
        backend: Arc<dyn RemoteBackend>,
        config: MemoryConfigStore,
    ) -> Self {
        let themes = Arc::new(Mutex::new(BaseResourceManager::default()));
        let translations = Arc::new(Mutex::new(BaseResourceManager::default()));
        let themes_manager: SharedResourceManager = themes.clone();
        let translations_manager: SharedResourceManager = translations.clone();
        let pool = ResourceManagerPool::new_with([
            (ResourceType::from("themes"), themes_manager),
            (ResourceType::from("translations"), translations_manager),
        ]);

        let presenter = RecordingPresenter::default();
        let feedback = Arc::clone(&presenter.calls);
        let workspace = RecordingWorkspace::default();
        let unloads = Arc::clone(&workspace.unloads);

        let service = ResourceSyncService::new_with(
            settings,
            pool,
            VcsRegistry::default(),
            backend,
            Collaborators {
                config: Box::new(config.clone()),
                presenter: Box::new(presenter),
                workspace: Box::new(workspace),
                translator: Box::new(PassthroughTranslator),
            },
        )
        .with_rng(Rng::new_with_seed(Self::RNG_SEED));
        Self {
            service,
            feedback,
            unloads,
            config,
            themes,
            translations,
        }
    }

    /// Handles completions until `slot` is no longer running.
    pub fn wait_for(&mut self, slot: &TaskSlot) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while self.service.is_running(slot) {
            assert!(Instant::now() < deadline, "{slot} never finished");
            self.service.handle_next_completion(Duration::from_millis(10));
        }
    }

    /// Handles completions until nothing is running.
    pub fn wait_for_all(&mut self) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while self.service.has_running_tasks() {
            assert!(Instant::now() < deadline, "tasks never finished");
            self.service.handle_next_completion(Duration::from_millis(10));
        }
    }

    pub fn events(&self) -> Vec<ResourceSyncEvent> {
        self.service.receiver().try_iter().collect()
    }

    pub fn feedback(&self) -> Vec<Feedback> {
        self.feedback.lock().unwrap().clone()
    }
}

/// Settings that keep the startup updates check out of the way.
pub fn quiet_settings() -> ResourceSyncSettings {
    let mut settings = ResourceSyncSettings::immediate();
    settings.set_update_check_delay(Duration::from_secs(60 * 60));
    settings
}

pub fn remote_dir() -> (TempDir, DirectoryRemote) {
    let dir = tempfile::tempdir().unwrap();
    let remote = DirectoryRemote::new_with(dir.path());
    (dir, remote)
}

pub fn app_info(resources: &[(&str, &str)]) -> AppInfoDto {
    AppInfoDto::new_with(
        vec![AppVersionDto {
            platform_type: "linux64".to_string(),
            version: "1.0.0".to_string(),
            link: "https://example.com/download".to_string(),
        }],
        resources
            .iter()
            .map(|(resource_type, hash)| ResourceInfoDto {
                resource_type: ResourceType::from(*resource_type),
                hash: hash.to_string(),
            })
            .collect(),
    )
}
