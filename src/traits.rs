// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! The traits that describe how this crate talks to the rest of the
//! application: settings, translation, the UI's feedback surface, and the
//! project workspace.

/// Quick import of all important traits.
pub mod prelude {
    pub use super::{
        HasSettings, ModalIndicator, PassthroughTranslator, PresentsFeedback, Translates,
        Workspace,
    };
    pub use crate::record::RecordSerializable;
}

/// Some structs have configuration information that should persist, but it's
/// not necessarily information that belongs in a project. Implementing
/// [HasSettings] lets the owner know when that information needs saving.
pub trait HasSettings {
    /// Whether the current state of this struct has been saved to disk.
    fn has_been_saved(&self) -> bool;
    /// Call this whenever the struct changes.
    fn needs_save(&mut self);
    /// Call this after a load() or a save().
    fn mark_clean(&mut self);
}

/// Turns a translation key into display text. The real tables live with the
/// application's localization layer.
pub trait Translates: Send + Sync + core::fmt::Debug {
    /// The text for `key`.
    fn translate(&self, key: &str) -> String;

    /// The text for `key` when it describes `count` things. Implementations
    /// choose the plural form and substitute `{x}` with the count.
    fn translate_plural(&self, key: &str, count: i64) -> String;
}

/// A [Translates] that returns keys unchanged, apart from `{x}` substitution.
/// Useful until a localization table is loaded, and in tests.
#[derive(Debug, Default)]
pub struct PassthroughTranslator;
impl Translates for PassthroughTranslator {
    fn translate(&self, key: &str) -> String {
        key.to_string()
    }

    fn translate_plural(&self, key: &str, count: i64) -> String {
        key.replace("{x}", &count.to_string())
    }
}

/// The short-lived overlays that tell the user how a background operation
/// went.
#[derive(Clone, Copy, Debug, PartialEq, Eq, derive_more::Display)]
pub enum ModalIndicator {
    /// An indeterminate spinner.
    Progress,
    /// A checkmark.
    Success,
    /// A cross.
    Failure,
}

/// The UI's fire-and-forget feedback surface. Nothing here returns a result;
/// the sync service never reads anything back from the UI.
///
/// Implementations are called only from the thread that pumps the
/// [ResourceSyncService](crate::sync::ResourceSyncService) completion
/// channel.
pub trait PresentsFeedback: core::fmt::Debug {
    /// Shows a transient text bubble.
    fn show_tooltip(&mut self, message: &str);
    /// Shows a modal overlay that the UI owns from now on.
    fn show_modal(&mut self, indicator: ModalIndicator);
    /// Dismisses whatever modal is showing, if any.
    fn hide_modal_if_any(&mut self);
}

/// The collection of projects the user has open or has stubbed out locally.
pub trait Workspace: core::fmt::Debug {
    /// Unloads the project with the given id. If `delete_local` is set, its
    /// local files are removed too. `delete_remote` asks for the remote copy
    /// to be removed as well.
    fn unload_project(&mut self, project_id: &str, delete_local: bool, delete_remote: bool);
}
