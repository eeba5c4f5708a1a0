// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! Keeps local projects and app resources in step with a directory-based
//! remote store, from the command line.

use clap::Parser;
use console::{ConsolePresenter, DirectoryWorkspace, ResourceFileWriter};
use ensnare_sync::prelude::*;
use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

mod console;

/// The program's command-line arguments.
#[derive(clap::Parser, Debug)]
#[clap(author, about, long_about = None)]
struct Args {
    /// The remote store's root directory
    #[clap(short, long, value_parser, default_value = "remote")]
    remote: PathBuf,

    /// Where local projects live
    #[clap(short, long, value_parser, default_value = ".")]
    workspace: PathBuf,

    /// Where settings are remembered. Defaults to the per-user config
    /// directory.
    #[clap(short, long, value_parser)]
    config: Option<PathBuf>,

    /// Print version and exit
    #[clap(short = 'v', long, value_parser)]
    version: bool,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Check for app updates and download outdated resources
    CheckUpdates,
    /// Learn which revisions the remote has for a project
    Fetch {
        project_id: String,
        #[clap(long, default_value = "")]
        name: String,
    },
    /// Pull and push revisions. With no revision ids, syncs everything.
    Sync {
        project_id: String,
        #[clap(long, default_value = "")]
        name: String,
        revisions: Vec<String>,
    },
    /// Download a project that exists only on the remote
    Clone { project_id: String },
}

/// Resource categories that the CLI keeps on disk.
const RESOURCE_TYPES: [&str; 4] = ["translations", "arrangements", "colour-schemes", "themes"];

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    if args.version {
        eprintln!("{}", ensnare_sync::app_version());
        return Ok(());
    }
    let Some(command) = args.command else {
        return Err(anyhow::anyhow!("Nothing to do. Try --help."));
    };

    let config: Box<dyn ConfigStore> = match &args.config {
        Some(dir) => Box::new(FileConfigStore::new_with(dir)),
        None => Box::new(FileConfigStore::default_location()?),
    };
    let resources_dir = args.workspace.join("resources");
    let pool = ResourceManagerPool::new_with(RESOURCE_TYPES.iter().map(|t| {
        let resource_type = ResourceType::from(*t);
        let manager: SharedResourceManager = Arc::new(Mutex::new(ResourceFileWriter::new_with(
            &resources_dir,
            &resource_type,
        )));
        (resource_type, manager)
    }));

    let workspace = DirectoryWorkspace::new_with(&args.workspace);
    let registry = VcsRegistry::default();
    let project = match &command {
        Command::CheckUpdates => None,
        Command::Fetch { project_id, .. }
        | Command::Sync { project_id, .. }
        | Command::Clone { project_id } => {
            let vcs = workspace.load_history(project_id)?;
            if matches!(command, Command::Clone { .. }) && !vcs.is_empty() {
                return Err(anyhow::anyhow!("{project_id} already exists locally"));
            }
            Some(registry.register(vcs)?)
        }
    };

    // The CLI waits for its answers anyway, so the startup updates check
    // only runs when asked for.
    let mut settings = ResourceSyncSettings::immediate();
    if !matches!(command, Command::CheckUpdates) {
        settings.set_update_check_delay(Duration::from_secs(60 * 60));
    }

    let mut service = ResourceSyncService::new_with(
        settings,
        pool,
        registry.clone(),
        Arc::new(DirectoryRemote::new_with(&args.remote)),
        Collaborators {
            config,
            presenter: Box::<ConsolePresenter>::default(),
            workspace: Box::new(DirectoryWorkspace::new_with(&args.workspace)),
            translator: Box::<PassthroughTranslator>::default(),
        },
    );

    let (slot, started) = match (&command, project) {
        (Command::CheckUpdates, _) => (TaskSlot::UpdatesCheck, Ok(())),
        (Command::Fetch { project_id, name }, Some(handle)) => (
            TaskSlot::RevisionsSync,
            service.fetch_revisions_info(handle, project_id, name),
        ),
        (
            Command::Sync {
                project_id,
                name,
                revisions,
            },
            Some(handle),
        ) => (
            TaskSlot::RevisionsSync,
            service.sync_revisions(handle, project_id, name, revisions),
        ),
        (Command::Clone { project_id }, Some(handle)) => (
            TaskSlot::ProjectClone,
            service.clone_project(handle, project_id),
        ),
        _ => return Err(anyhow::anyhow!("No project to work on")),
    };
    started?;

    // An updates check also waits for the resource requests it starts.
    let waits_for_all = matches!(command, Command::CheckUpdates);
    // A failed fetch is only logged, so it has to prove that it succeeded.
    let mut succeeded = !matches!(command, Command::Fetch { .. });
    let mut failed = false;
    while service.is_running(&slot) || (waits_for_all && service.has_running_tasks()) {
        service.handle_next_completion(Duration::from_millis(100));
        while let Ok(event) = service.receiver().try_recv() {
            if !report(&event) {
                failed = true;
            } else if matches!(event, ResourceSyncEvent::RevisionsFetched(_)) {
                succeeded = true;
            }
        }
    }
    let succeeded = succeeded && !failed;
    service.exit();

    if let Some(handle) = project {
        let vcs = registry.get(handle)?;
        let vcs = vcs
            .read()
            .map_err(|_| anyhow::anyhow!("Project history is poisoned"))?;
        let unloaded = matches!(command, Command::Clone { .. }) && !succeeded;
        if !unloaded {
            workspace.save_history(&vcs)?;
            eprintln!("{} revision(s) known for {}", vcs.len(), vcs.project_id());
        }
    }

    if succeeded {
        Ok(())
    } else {
        Err(anyhow::anyhow!("{slot} did not finish"))
    }
}

/// Prints what happened. Returns false if it was a failure.
fn report(event: &ResourceSyncEvent) -> bool {
    match event {
        ResourceSyncEvent::UpdatesChecked { outdated } => {
            if outdated.is_empty() {
                eprintln!("Resources are up to date");
            } else {
                let names: Vec<_> = outdated.iter().map(|t| t.to_string()).collect();
                eprintln!("Downloading {}", names.join(", "));
            }
        }
        ResourceSyncEvent::ResourceUpdated(resource_type) => {
            log::info!("{resource_type} updated");
        }
        ResourceSyncEvent::RevisionsFetched(changed) => {
            eprintln!("{changed} revision(s) changed");
        }
        ResourceSyncEvent::RevisionsSynced { .. } | ResourceSyncEvent::ProjectCloned(_) => {}
        ResourceSyncEvent::RevisionsSyncFailed(errors)
        | ResourceSyncEvent::ProjectCloneFailed(_, errors) => {
            for message in errors.messages() {
                log::error!("{message}");
            }
            return false;
        }
        ResourceSyncEvent::TaskCancelled(slot) => {
            eprintln!("{slot} cancelled");
            return false;
        }
    }
    true
}
