// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! The one-shot jobs that run on worker threads, and the plumbing that starts
//! them and carries their results home.

use super::{AppInfoDto, RemoteBackend, RemoteError, ResourceType, TaskErrors};
use crate::{
    record::Record,
    uid::VcsHandle,
    vcs::{RevisionInfo, SharedVcs, VcsError, VcsRegistry},
};
use crossbeam_channel::Sender;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

/// The single-flight key. At most one task per slot runs at a time; starting
/// another one while it does is rejected, not queued.
#[derive(Clone, Debug, PartialEq, Eq, Hash, derive_more::Display)]
pub enum TaskSlot {
    /// Asks the server what's new.
    #[display(fmt = "updates-check")]
    UpdatesCheck,
    /// Fetches or syncs revisions. Both share this slot.
    #[display(fmt = "revisions-sync")]
    RevisionsSync,
    /// Clones a project's history.
    #[display(fmt = "project-clone")]
    ProjectClone,
    /// Downloads one resource. Different types run concurrently.
    #[display(fmt = "resource-request({})", _0)]
    ResourceRequest(ResourceType),
}

/// Where a slot is in its lifecycle. A slot that has never run is
/// [TaskState::Idle]; after a run it reports how that run ended until the
/// next one starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, derive_more::Display)]
pub enum TaskState {
    #[allow(missing_docs)]
    #[default]
    Idle,
    #[allow(missing_docs)]
    Running,
    #[allow(missing_docs)]
    Completed,
    #[allow(missing_docs)]
    Failed,
    #[allow(missing_docs)]
    Cancelled,
}

/// Why a task didn't produce a result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskFailure {
    /// The task saw its should-exit flag and stopped.
    Cancelled,
    /// The task failed with these messages.
    Errors(TaskErrors),
}
impl From<TaskErrors> for TaskFailure {
    fn from(errors: TaskErrors) -> Self {
        Self::Errors(errors)
    }
}
impl From<anyhow::Error> for TaskFailure {
    fn from(e: anyhow::Error) -> Self {
        Self::Errors(e.into())
    }
}
impl From<VcsError> for TaskFailure {
    fn from(e: VcsError) -> Self {
        Self::Errors(e.into())
    }
}

/// How a task ended.
pub type TaskOutcome<T> = Result<T, TaskFailure>;

/// What a revisions sync did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Revisions downloaded.
    pub pulled: usize,
    /// Revisions uploaded.
    pub pushed: usize,
}
impl SyncSummary {
    /// Whether the project was already up to date.
    pub fn nothing_to_sync(&self) -> bool {
        self.pulled == 0 && self.pushed == 0
    }
}

/// The message a worker sends home when it's done.
#[derive(Debug)]
pub enum TaskCompletion {
    /// The server's current app info.
    UpdatesChecked(TaskOutcome<AppInfoDto>),
    /// New content for a resource.
    ResourceFetched(ResourceType, TaskOutcome<Record>),
    /// How many revisions changed state after a fetch.
    RevisionsFetched(TaskOutcome<usize>),
    #[allow(missing_docs)]
    RevisionsSynced(TaskOutcome<SyncSummary>),
    /// How many revisions a clone pulled.
    ProjectCloned {
        #[allow(missing_docs)]
        project_id: String,
        #[allow(missing_docs)]
        outcome: TaskOutcome<usize>,
    },
}
impl TaskCompletion {
    /// The slot of the task that sent this.
    pub fn slot(&self) -> TaskSlot {
        match self {
            TaskCompletion::UpdatesChecked(_) => TaskSlot::UpdatesCheck,
            TaskCompletion::ResourceFetched(resource_type, _) => {
                TaskSlot::ResourceRequest(resource_type.clone())
            }
            TaskCompletion::RevisionsFetched(_) | TaskCompletion::RevisionsSynced(_) => {
                TaskSlot::RevisionsSync
            }
            TaskCompletion::ProjectCloned { .. } => TaskSlot::ProjectClone,
        }
    }

    /// The state the slot ends up in.
    pub fn final_state(&self) -> TaskState {
        fn state_of<T>(outcome: &TaskOutcome<T>) -> TaskState {
            match outcome {
                Ok(_) => TaskState::Completed,
                Err(TaskFailure::Cancelled) => TaskState::Cancelled,
                Err(TaskFailure::Errors(_)) => TaskState::Failed,
            }
        }
        match self {
            TaskCompletion::UpdatesChecked(o) => state_of(o),
            TaskCompletion::ResourceFetched(_, o) => state_of(o),
            TaskCompletion::RevisionsFetched(o) => state_of(o),
            TaskCompletion::RevisionsSynced(o) => state_of(o),
            TaskCompletion::ProjectCloned { outcome, .. } => state_of(outcome),
        }
    }
}

/// The cooperative cancellation flag shared by a task and its owner.
#[derive(Clone, Debug, Default)]
pub struct ShouldExit(Arc<AtomicBool>);
impl ShouldExit {
    const POLL_INTERVAL: Duration = Duration::from_millis(20);

    /// Asks the task to stop as soon as it can.
    pub fn signal(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[allow(missing_docs)]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Waits for `delay` unless the flag goes up first. Returns false if it
    /// did.
    pub fn wait(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            if self.is_set() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(Self::POLL_INTERVAL.min(deadline - now));
        }
    }
}

/// Everything a task body may use. Tasks never touch the service's state;
/// they only return a [TaskCompletion].
#[derive(Debug, Clone)]
pub(crate) struct TaskContext {
    pub(crate) backend: Arc<dyn RemoteBackend>,
    pub(crate) registry: VcsRegistry,
    pub(crate) should_exit: ShouldExit,
}
impl TaskContext {
    fn check_exit(&self) -> TaskOutcome<()> {
        if self.should_exit.is_set() {
            Err(TaskFailure::Cancelled)
        } else {
            Ok(())
        }
    }

    fn wait(&self, delay: Duration) -> TaskOutcome<()> {
        if self.should_exit.wait(delay) {
            Ok(())
        } else {
            Err(TaskFailure::Cancelled)
        }
    }

    fn vcs(&self, handle: VcsHandle) -> TaskOutcome<SharedVcs> {
        Ok(self.registry.get(handle)?)
    }

    pub(crate) fn check_for_updates(&self, delay: Duration, platform: &str) -> TaskOutcome<AppInfoDto> {
        self.wait(delay)?;
        let info = self.backend.app_info(platform)?;
        self.check_exit()?;
        Ok(info)
    }

    pub(crate) fn request_resource(
        &self,
        delay: Duration,
        resource_type: &ResourceType,
    ) -> TaskOutcome<Record> {
        self.wait(delay)?;
        let resource = self.backend.resource(resource_type)?;
        self.check_exit()?;
        Ok(resource)
    }

    /// The remote's revision listing. A project the remote has never seen
    /// has no revisions yet.
    fn revisions_info_or_empty(&self, project_id: &str) -> TaskOutcome<Vec<RevisionInfo>> {
        match self.backend.revisions_info(project_id) {
            Ok(infos) => Ok(infos),
            Err(e) if RemoteError::is_project_not_found(&e) => {
                log::debug!("{project_id} isn't on the remote yet");
                Ok(Vec::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn fetch_revisions(&self, handle: VcsHandle, project_id: &str) -> TaskOutcome<usize> {
        let vcs = self.vcs(handle)?;
        let remote = self.revisions_info_or_empty(project_id)?;
        self.check_exit()?;
        let changed = vcs
            .write()
            .map_err(|_| VcsError::Poisoned)?
            .apply_remote_info(&remote);
        Ok(changed)
    }

    /// Pulls what's missing here, then pushes what's missing there. A
    /// cancelled sync keeps whatever it already moved.
    pub(crate) fn sync_revisions(
        &self,
        handle: VcsHandle,
        project_id: &str,
        project_name: &str,
        revision_ids: &[String],
    ) -> TaskOutcome<SyncSummary> {
        let vcs = self.vcs(handle)?;
        let remote = self.revisions_info_or_empty(project_id)?;
        self.check_exit()?;

        let plan = {
            let mut vcs = vcs.write().map_err(|_| VcsError::Poisoned)?;
            vcs.apply_remote_info(&remote);
            vcs.diff_against(&remote, revision_ids)
        };

        let mut summary = SyncSummary::default();
        for info in &plan.to_pull {
            self.check_exit()?;
            let revision = self.backend.revision(project_id, &info.id)?;
            vcs.write()
                .map_err(|_| VcsError::Poisoned)?
                .insert_pulled(revision)?;
            summary.pulled += 1;
        }
        for id in &plan.to_push {
            self.check_exit()?;
            let revision = vcs
                .read()
                .map_err(|_| VcsError::Poisoned)?
                .revision(id)
                .cloned()
                .ok_or_else(|| VcsError::UnknownRevision(id.clone()))?;
            self.backend.push_revision(project_id, project_name, &revision)?;
            vcs.write()
                .map_err(|_| VcsError::Poisoned)?
                .mark_synced(id)?;
            summary.pushed += 1;
        }
        Ok(summary)
    }

    /// Pulls every revision the remote has for the project.
    pub(crate) fn clone_project(&self, handle: VcsHandle, project_id: &str) -> TaskOutcome<usize> {
        let vcs = self.vcs(handle)?;
        let remote = self.backend.revisions_info(project_id)?;
        self.check_exit()?;

        let to_pull = vcs
            .read()
            .map_err(|_| VcsError::Poisoned)?
            .diff_against(&remote, &[])
            .to_pull;
        for info in &to_pull {
            self.check_exit()?;
            let revision = self.backend.revision(project_id, &info.id)?;
            vcs.write()
                .map_err(|_| VcsError::Poisoned)?
                .insert_pulled(revision)?;
        }
        Ok(to_pull.len())
    }
}

/// A live worker thread and the flag that asks it to stop.
#[derive(Debug)]
pub(crate) struct RunningTask {
    pub(crate) should_exit: ShouldExit,
    join_handle: Option<JoinHandle<()>>,
}
impl RunningTask {
    /// Starts `body` on its own thread. Whatever it returns goes to
    /// `sender`.
    pub(crate) fn spawn<F>(
        slot: &TaskSlot,
        context: TaskContext,
        sender: Sender<TaskCompletion>,
        body: F,
    ) -> std::io::Result<Self>
    where
        F: FnOnce(&TaskContext) -> TaskCompletion + Send + 'static,
    {
        let should_exit = context.should_exit.clone();
        let name = format!("sync-{slot}");
        let join_handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                log::debug!("{name} started");
                let completion = body(&context);
                log::debug!("{name} finished: {}", completion.final_state());
                if sender.send(completion).is_err() {
                    log::debug!("{name}: nobody is listening for the result");
                }
            })?;
        Ok(Self {
            should_exit,
            join_handle: Some(join_handle),
        })
    }

    /// Waits for the thread to finish.
    pub(crate) fn join(mut self) {
        if let Some(handle) = self.join_handle.take() {
            if handle.join().is_err() {
                log::error!("A sync task thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{sync::DirectoryRemote, vcs::VersionControl};

    #[test]
    fn wait_is_interruptible() {
        let flag = ShouldExit::default();
        assert!(flag.wait(Duration::from_millis(1)));

        let remote = flag.clone();
        let waiter = std::thread::spawn(move || remote.wait(Duration::from_secs(60)));
        flag.signal();
        assert!(!waiter.join().unwrap());
    }

    #[test]
    fn slots_and_states() {
        assert_eq!(
            TaskSlot::ResourceRequest(ResourceType::from("themes")).to_string(),
            "resource-request(themes)"
        );
        assert_ne!(
            TaskSlot::ResourceRequest(ResourceType::from("themes")),
            TaskSlot::ResourceRequest(ResourceType::from("translations"))
        );
        let c = TaskCompletion::RevisionsFetched(Err(TaskFailure::Cancelled));
        assert_eq!(c.slot(), TaskSlot::RevisionsSync);
        assert_eq!(c.final_state(), TaskState::Cancelled);
        let c = TaskCompletion::ProjectCloned {
            project_id: "p".to_string(),
            outcome: Err(TaskErrors::new("network timeout").into()),
        };
        assert_eq!(c.final_state(), TaskState::Failed);
        assert_eq!(TaskState::default(), TaskState::Idle);
    }

    #[test]
    fn cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let context = TaskContext {
            backend: Arc::new(DirectoryRemote::new_with(dir.path())),
            registry: VcsRegistry::default(),
            should_exit: ShouldExit::default(),
        };
        context.should_exit.signal();
        assert_eq!(
            context.check_for_updates(Duration::from_secs(10), "linux64"),
            Err(TaskFailure::Cancelled)
        );
    }

    #[test]
    fn missing_remote_project_is_empty_for_sync_only() {
        let dir = tempfile::tempdir().unwrap();
        let context = TaskContext {
            backend: Arc::new(DirectoryRemote::new_with(dir.path())),
            registry: VcsRegistry::default(),
            should_exit: ShouldExit::default(),
        };
        let mut vcs = VersionControl::new("fresh");
        vcs.commit("local only", Vec::default());
        let handle = context.registry.register(vcs).unwrap();

        assert_eq!(context.fetch_revisions(handle, "fresh"), Ok(0));
        assert_eq!(
            context.sync_revisions(handle, "fresh", "Fresh", &[]),
            Ok(SyncSummary {
                pulled: 0,
                pushed: 1
            })
        );
        assert_eq!(context.backend.revisions_info("fresh").unwrap().len(), 1);

        let empty = context
            .registry
            .register(VersionControl::new("elsewhere"))
            .unwrap();
        assert!(matches!(
            context.clone_project(empty, "elsewhere"),
            Err(TaskFailure::Errors(errors)) if errors.first() == Some("Project elsewhere not found")
        ));
    }

    #[test]
    fn unknown_handle_fails() {
        let dir = tempfile::tempdir().unwrap();
        let context = TaskContext {
            backend: Arc::new(DirectoryRemote::new_with(dir.path())),
            registry: VcsRegistry::default(),
            should_exit: ShouldExit::default(),
        };
        assert!(matches!(
            context.fetch_revisions(VcsHandle(99), "p"),
            Err(TaskFailure::Errors(_))
        ));
    }
}
