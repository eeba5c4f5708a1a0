// Copyright (c) 2024 Mike Tsao. All rights reserved.

use super::{
    tasks::{RunningTask, TaskContext},
    AppInfoDto, ConfigStore, RemoteBackend, ResourceManagerPool, ResourceSyncError,
    ResourceType, SyncSummary, TaskCompletion, TaskErrors, TaskFailure, TaskOutcome, TaskSlot,
    TaskState, LAST_UPDATES_INFO_KEY,
};
use crate::{
    record::Record,
    rng::Rng,
    traits::{ModalIndicator, PresentsFeedback, Translates, Workspace},
    uid::VcsHandle,
    util::{ChannelPair, ResourceSyncSettings},
    vcs::VcsRegistry,
};
use crossbeam_channel::Receiver;
use std::{collections::HashMap, sync::Arc, time::Duration};

/// [ResourceSyncEvent]s tell observers what the service finished doing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceSyncEvent {
    /// An updates check finished. Lists the resources that were requested
    /// because they looked outdated.
    UpdatesChecked {
        #[allow(missing_docs)]
        outdated: Vec<ResourceType>,
    },
    /// A resource manager received new base content.
    ResourceUpdated(ResourceType),
    /// A background fetch registered this many remote revision changes.
    RevisionsFetched(usize),
    /// A sync finished.
    RevisionsSynced {
        /// Whether the project was already up to date.
        nothing_to_sync: bool,
    },
    #[allow(missing_docs)]
    RevisionsSyncFailed(TaskErrors),
    /// A clone of the project with this id finished.
    ProjectCloned(String),
    /// A clone failed, and the local stub for this project id was unloaded.
    ProjectCloneFailed(String, TaskErrors),
    /// The task in this slot stopped because it was asked to.
    TaskCancelled(TaskSlot),
}

/// The rest of the application, as far as the sync service is concerned.
#[derive(Debug)]
pub struct Collaborators {
    /// Where the last updates check is remembered.
    pub config: Box<dyn ConfigStore>,
    /// The UI's feedback surface.
    pub presenter: Box<dyn PresentsFeedback>,
    /// Open and stubbed projects.
    pub workspace: Box<dyn Workspace>,
    /// Resolves the keys of user-visible messages.
    pub translator: Box<dyn Translates>,
}

/// Coordinates background fetches against the remote resource store.
///
/// Each operation runs on its own worker thread, at most one per [TaskSlot].
/// Workers report back through a channel; whoever owns the service calls
/// [ResourceSyncService::handle_pending_completions()] (or selects on
/// [ResourceSyncService::completion_receiver()]) from the UI thread, and that
/// is the only place where owned state changes and the UI is told about it.
#[derive(Debug)]
pub struct ResourceSyncService {
    settings: ResourceSyncSettings,
    resource_managers: ResourceManagerPool,
    registry: VcsRegistry,
    backend: Arc<dyn RemoteBackend>,
    collaborators: Collaborators,
    rng: Rng,

    tasks: HashMap<TaskSlot, RunningTask>,
    states: HashMap<TaskSlot, TaskState>,

    completion_channels: ChannelPair<TaskCompletion>,
    event_channels: ChannelPair<ResourceSyncEvent>,
}
impl ResourceSyncService {
    const SYNC_UP_TO_DATE_KEY: &'static str = "vcs::sync::uptodate";
    const SYNC_DONE_KEY: &'static str = "vcs::sync::done";

    /// Creates the service and schedules the first updates check for
    /// [ResourceSyncSettings::update_check_delay()] from now.
    pub fn new_with(
        settings: ResourceSyncSettings,
        resource_managers: ResourceManagerPool,
        registry: VcsRegistry,
        backend: Arc<dyn RemoteBackend>,
        collaborators: Collaborators,
    ) -> Self {
        let mut r = Self {
            settings,
            resource_managers,
            registry,
            backend,
            collaborators,
            rng: Rng::default(),
            tasks: Default::default(),
            states: Default::default(),
            completion_channels: Default::default(),
            event_channels: Default::default(),
        };
        let delay = r.settings.update_check_delay();
        if let Err(e) = r.check_for_updates(delay) {
            log::error!("Couldn't schedule the updates check: {e}");
        }
        r
    }

    /// Replaces the generator that picks resource request delays.
    pub fn with_rng(mut self, rng: Rng) -> Self {
        self.rng = rng;
        self
    }

    #[allow(missing_docs)]
    pub fn registry(&self) -> &VcsRegistry {
        &self.registry
    }

    #[allow(missing_docs)]
    pub fn settings(&self) -> &ResourceSyncSettings {
        &self.settings
    }

    /// The receive side of the [ResourceSyncEvent] channel.
    pub fn receiver(&self) -> &Receiver<ResourceSyncEvent> {
        &self.event_channels.receiver
    }

    /// The channel that worker threads report on. Pass what arrives to
    /// [ResourceSyncService::handle_completion()].
    pub fn completion_receiver(&self) -> &Receiver<TaskCompletion> {
        &self.completion_channels.receiver
    }

    #[allow(missing_docs)]
    pub fn task_state(&self, slot: &TaskSlot) -> TaskState {
        self.states.get(slot).copied().unwrap_or_default()
    }

    #[allow(missing_docs)]
    pub fn is_running(&self, slot: &TaskSlot) -> bool {
        self.task_state(slot) == TaskState::Running
    }

    /// Whether any task is still running.
    pub fn has_running_tasks(&self) -> bool {
        self.states.values().any(|s| *s == TaskState::Running)
    }

    /// Asks the server what's new after `delay`. Runs by itself once at
    /// construction.
    pub fn check_for_updates(&mut self, delay: Duration) -> Result<(), ResourceSyncError> {
        let platform = self.settings.platform();
        self.start(TaskSlot::UpdatesCheck, move |context| {
            TaskCompletion::UpdatesChecked(context.check_for_updates(delay, &platform))
        })
    }

    /// Downloads the current content of `resource_type` after `delay`.
    pub fn request_resource(
        &mut self,
        resource_type: ResourceType,
        delay: Duration,
    ) -> Result<(), ResourceSyncError> {
        let slot = TaskSlot::ResourceRequest(resource_type.clone());
        self.start(slot, move |context| {
            let outcome = context.request_resource(delay, &resource_type);
            TaskCompletion::ResourceFetched(resource_type, outcome)
        })
    }

    /// Quietly registers what the remote has for a project. Views learn about
    /// the result through the history's own change notifications.
    pub fn fetch_revisions_info(
        &mut self,
        vcs: VcsHandle,
        project_id: &str,
        project_name: &str,
    ) -> Result<(), ResourceSyncError> {
        let project_id = project_id.to_string();
        log::debug!("Fetching revisions of {project_name} ({project_id})");
        self.start(TaskSlot::RevisionsSync, move |context| {
            TaskCompletion::RevisionsFetched(context.fetch_revisions(vcs, &project_id))
        })
    }

    /// Pulls and pushes the given revisions, or every revision if
    /// `revision_ids` is empty.
    pub fn sync_revisions(
        &mut self,
        vcs: VcsHandle,
        project_id: &str,
        project_name: &str,
        revision_ids: &[String],
    ) -> Result<(), ResourceSyncError> {
        let project_id = project_id.to_string();
        let project_name = project_name.to_string();
        let revision_ids = revision_ids.to_vec();
        self.start(TaskSlot::RevisionsSync, move |context| {
            TaskCompletion::RevisionsSynced(context.sync_revisions(
                vcs,
                &project_id,
                &project_name,
                &revision_ids,
            ))
        })
    }

    /// Asks a running fetch or sync to stop. Whatever it already moved
    /// stays moved.
    pub fn cancel_sync_revisions(&self) {
        self.cancel(&TaskSlot::RevisionsSync);
    }

    /// Clones a project's history into the (empty) history behind `vcs`.
    /// Shows a progress indicator once the task is under way.
    pub fn clone_project(&mut self, vcs: VcsHandle, project_id: &str) -> Result<(), ResourceSyncError> {
        let project_id = project_id.to_string();
        self.start(TaskSlot::ProjectClone, move |context| {
            let outcome = context.clone_project(vcs, &project_id);
            TaskCompletion::ProjectCloned {
                project_id,
                outcome,
            }
        })?;
        self.collaborators
            .presenter
            .show_modal(ModalIndicator::Progress);
        Ok(())
    }

    /// Asks a running clone to stop.
    pub fn cancel_clone_project(&self) {
        self.cancel(&TaskSlot::ProjectClone);
    }

    /// Handles every completion that has already arrived. Returns how many
    /// there were.
    pub fn handle_pending_completions(&mut self) -> usize {
        let mut count = 0;
        while let Ok(completion) = self.completion_channels.receiver.try_recv() {
            self.handle_completion(completion);
            count += 1;
        }
        count
    }

    /// Waits up to `timeout` for one completion and handles it. Returns
    /// whether one arrived.
    pub fn handle_next_completion(&mut self, timeout: Duration) -> bool {
        match self.completion_channels.receiver.recv_timeout(timeout) {
            Ok(completion) => {
                self.handle_completion(completion);
                true
            }
            Err(_) => false,
        }
    }

    /// Applies a finished task's result. Call this only from the thread that
    /// owns the service.
    pub fn handle_completion(&mut self, completion: TaskCompletion) {
        let slot = completion.slot();
        self.states.insert(slot.clone(), completion.final_state());
        if let Some(task) = self.tasks.remove(&slot) {
            task.join();
        }

        match completion {
            TaskCompletion::UpdatesChecked(outcome) => self.on_updates_checked(outcome),
            TaskCompletion::ResourceFetched(resource_type, outcome) => {
                self.on_resource_fetched(resource_type, outcome)
            }
            TaskCompletion::RevisionsFetched(outcome) => self.on_revisions_fetched(outcome),
            TaskCompletion::RevisionsSynced(outcome) => self.on_revisions_synced(outcome),
            TaskCompletion::ProjectCloned {
                project_id,
                outcome,
            } => self.on_project_cloned(&project_id, outcome),
        }
    }

    /// Signals every running task to stop and waits for their threads.
    pub fn exit(&mut self) {
        for task in self.tasks.values() {
            task.should_exit.signal();
        }
        for (_, task) in self.tasks.drain() {
            task.join();
        }
    }

    fn start<F>(&mut self, slot: TaskSlot, body: F) -> Result<(), ResourceSyncError>
    where
        F: FnOnce(&TaskContext) -> TaskCompletion + Send + 'static,
    {
        if self.is_running(&slot) {
            return self.reject(slot);
        }
        let context = TaskContext {
            backend: Arc::clone(&self.backend),
            registry: self.registry.clone(),
            should_exit: Default::default(),
        };
        let task = RunningTask::spawn(
            &slot,
            context,
            self.completion_channels.sender.clone(),
            body,
        )
        .map_err(|e| ResourceSyncError::Spawn(slot.clone(), e.to_string()))?;
        self.tasks.insert(slot.clone(), task);
        self.states.insert(slot, TaskState::Running);
        Ok(())
    }

    fn reject(&self, slot: TaskSlot) -> Result<(), ResourceSyncError> {
        log::warn!("Attempt to start a {slot} task while another one is running");
        Err(ResourceSyncError::AlreadyRunning(slot))
    }

    fn cancel(&self, slot: &TaskSlot) {
        if let Some(task) = self.tasks.get(slot) {
            log::debug!("Asking the {slot} task to stop");
            task.should_exit.signal();
        }
    }

    fn on_updates_checked(&mut self, outcome: TaskOutcome<AppInfoDto>) {
        let info = match outcome {
            Ok(info) => info,
            Err(TaskFailure::Errors(errors)) => {
                log::warn!(
                    "Updates check failed: {}",
                    errors.first().unwrap_or("no details")
                );
                log::debug!("Updates check errors: {errors}");
                return;
            }
            Err(TaskFailure::Cancelled) => {
                self.emit(ResourceSyncEvent::TaskCancelled(TaskSlot::UpdatesCheck));
                return;
            }
        };

        // Comparing versions and telling the user about them is the
        // dashboard's business.
        if let Some(version) = info.version_for_platform(&self.settings.platform()) {
            log::info!("Latest version for {}: {}", version.platform_type, version.version);
        }

        let mut last_updates_info = AppInfoDto::default();
        if let Err(e) = self
            .collaborators
            .config
            .load(&mut last_updates_info, LAST_UPDATES_INFO_KEY)
        {
            log::warn!("Couldn't load the last updates info, treating everything as new: {e:#}");
            last_updates_info = AppInfoDto::default();
        }

        let max_delay = self.settings.max_resource_request_delay_secs();
        let mut outdated = Vec::default();
        for resource in info.resources() {
            if !last_updates_info.resource_seems_outdated(resource) {
                continue;
            }
            let delay = Duration::from_secs(self.rng.delay_secs(max_delay));
            log::debug!(
                "{} looks outdated; requesting it in {delay:?}",
                resource.resource_type
            );
            match self.request_resource(resource.resource_type.clone(), delay) {
                Ok(_) | Err(ResourceSyncError::AlreadyRunning(_)) => {
                    outdated.push(resource.resource_type.clone())
                }
                Err(e) => log::error!("{e}"),
            }
        }
        if outdated.is_empty() {
            log::debug!("All resources are up to date");
        }

        if let Err(e) = self.collaborators.config.save(&info, LAST_UPDATES_INFO_KEY) {
            log::error!("Couldn't save the updates info: {e:#}");
        }
        self.emit(ResourceSyncEvent::UpdatesChecked { outdated });
    }

    fn on_resource_fetched(&mut self, resource_type: ResourceType, outcome: TaskOutcome<Record>) {
        match outcome {
            Ok(resource) => {
                if self
                    .resource_managers
                    .update_base_resource(&resource_type, resource)
                {
                    self.emit(ResourceSyncEvent::ResourceUpdated(resource_type));
                } else {
                    log::debug!("No resource manager for {resource_type}; dropping it");
                }
            }
            Err(TaskFailure::Errors(errors)) => {
                log::warn!("Request for {resource_type} failed: {errors}");
            }
            Err(TaskFailure::Cancelled) => {
                self.emit(ResourceSyncEvent::TaskCancelled(TaskSlot::ResourceRequest(
                    resource_type,
                )));
            }
        }
    }

    fn on_revisions_fetched(&mut self, outcome: TaskOutcome<usize>) {
        match outcome {
            Ok(changed) => self.emit(ResourceSyncEvent::RevisionsFetched(changed)),
            Err(TaskFailure::Errors(errors)) => {
                log::warn!("Revisions fetch failed: {errors}");
            }
            Err(TaskFailure::Cancelled) => {
                self.emit(ResourceSyncEvent::TaskCancelled(TaskSlot::RevisionsSync))
            }
        }
    }

    fn on_revisions_synced(&mut self, outcome: TaskOutcome<SyncSummary>) {
        let presenter = &mut self.collaborators.presenter;
        presenter.hide_modal_if_any();
        match outcome {
            Ok(summary) => {
                let key = if summary.nothing_to_sync() {
                    Self::SYNC_UP_TO_DATE_KEY
                } else {
                    Self::SYNC_DONE_KEY
                };
                presenter.show_tooltip(&self.collaborators.translator.translate(key));
                presenter.show_modal(ModalIndicator::Success);
                self.emit(ResourceSyncEvent::RevisionsSynced {
                    nothing_to_sync: summary.nothing_to_sync(),
                });
            }
            Err(TaskFailure::Errors(errors)) => {
                if let Some(first) = errors.first() {
                    presenter.show_tooltip(first);
                }
                presenter.show_modal(ModalIndicator::Failure);
                log::warn!("Revisions sync failed: {errors}");
                self.emit(ResourceSyncEvent::RevisionsSyncFailed(errors));
            }
            Err(TaskFailure::Cancelled) => {
                self.emit(ResourceSyncEvent::TaskCancelled(TaskSlot::RevisionsSync))
            }
        }
    }

    fn on_project_cloned(&mut self, project_id: &str, outcome: TaskOutcome<usize>) {
        let presenter = &mut self.collaborators.presenter;
        presenter.hide_modal_if_any();
        match outcome {
            Ok(pulled) => {
                log::info!("Cloned {pulled} revisions of {project_id}");
                presenter.show_modal(ModalIndicator::Success);
                self.emit(ResourceSyncEvent::ProjectCloned(project_id.to_string()));
            }
            Err(TaskFailure::Errors(errors)) => {
                if let Some(first) = errors.first() {
                    presenter.show_tooltip(first);
                }
                presenter.show_modal(ModalIndicator::Failure);
                log::warn!("Cloning {project_id} failed: {errors}");

                // Whatever the clone left behind is useless.
                self.collaborators
                    .workspace
                    .unload_project(project_id, true, false);
                self.emit(ResourceSyncEvent::ProjectCloneFailed(
                    project_id.to_string(),
                    errors,
                ));
            }
            Err(TaskFailure::Cancelled) => {
                self.collaborators
                    .workspace
                    .unload_project(project_id, true, false);
                self.emit(ResourceSyncEvent::TaskCancelled(TaskSlot::ProjectClone));
            }
        }
    }

    fn emit(&self, event: ResourceSyncEvent) {
        if self.event_channels.sender.send(event).is_err() {
            log::debug!("ResourceSyncEvent dropped");
        }
    }
}
impl Drop for ResourceSyncService {
    fn drop(&mut self) {
        self.exit();
    }
}
