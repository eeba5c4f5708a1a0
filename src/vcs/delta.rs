// Copyright (c) 2024 Mike Tsao. All rights reserved.

use super::DeltaDescription;
use crate::{
    record::{Record, RecordSerializable},
    traits::Translates,
};
use std::str::FromStr;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};
use uuid::Uuid;

/// The change kinds this build understands. A [Delta] read from a newer
/// project may carry a type tag that isn't listed here; it keeps the tag as a
/// string and [Delta::known_type()] returns `None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum DeltaType {
    /// The fallback tag for a delta record that names no type.
    Undefined,
    ProjectTitle,
    ProjectAuthor,
    ProjectDescription,
    ProjectTempo,
    TrackPath,
    TrackColour,
    TrackInstrument,
    TrackChannel,
    NotesAdded,
    NotesRemoved,
    NotesChanged,
    PatternClipsAdded,
    PatternClipsRemoved,
    PatternClipsChanged,
    AutomationEventsAdded,
    AutomationEventsRemoved,
    AutomationEventsChanged,
    AnnotationsAdded,
    AnnotationsRemoved,
    AnnotationsChanged,
    TimeSignaturesAdded,
    TimeSignaturesRemoved,
    TimeSignaturesChanged,
    KeySignaturesAdded,
    KeySignaturesRemoved,
    KeySignaturesChanged,
}

/// A [Delta] is one atomic, identified change in a project's history. It
/// describes the change; it doesn't carry the changed data, which belongs to
/// whatever part of the project the [DeltaType] names.
///
/// Two deltas are the same logical change if and only if their uuids match,
/// and that's what [PartialEq] compares.
#[derive(Clone, Debug)]
pub struct Delta {
    delta_type: String,
    description: DeltaDescription,
    uuid: Uuid,
}
impl Default for Delta {
    fn default() -> Self {
        Self {
            delta_type: DeltaType::Undefined.to_string(),
            description: Default::default(),
            uuid: Uuid::new_v4(),
        }
    }
}
impl PartialEq for Delta {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}
impl Eq for Delta {}
impl Delta {
    /// Tag name of a serialized delta.
    pub const TAG: &'static str = "delta";
    /// Attribute names of a serialized delta.
    pub const ATTR_TYPE: &'static str = "type";
    #[allow(missing_docs)]
    pub const ATTR_NAME: &'static str = "name";
    #[allow(missing_docs)]
    pub const ATTR_STRING_PARAM: &'static str = "string-param";
    #[allow(missing_docs)]
    pub const ATTR_INT_PARAM: &'static str = "int-param";
    #[allow(missing_docs)]
    pub const ATTR_UUID: &'static str = "uuid";

    /// Creates a new change of the given type with a fresh identity.
    pub fn new_with(delta_type: DeltaType, description: DeltaDescription) -> Self {
        Self::new_with_type_tag(delta_type.into(), description)
    }

    /// Like [Delta::new_with()], but with a type tag this build might not
    /// know about.
    pub fn new_with_type_tag(delta_type: &str, description: DeltaDescription) -> Self {
        Self {
            delta_type: delta_type.to_string(),
            description,
            uuid: Uuid::new_v4(),
        }
    }

    /// The semantic kind of this change.
    pub fn delta_type(&self) -> &str {
        &self.delta_type
    }

    /// The kind of this change, if this build knows it.
    pub fn known_type(&self) -> Option<DeltaType> {
        DeltaType::from_str(&self.delta_type).ok()
    }

    /// This change's identity, stable across copies and serialization.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    #[allow(missing_docs)]
    pub fn description(&self) -> &DeltaDescription {
        &self.description
    }

    #[allow(missing_docs)]
    pub fn set_description(&mut self, description: DeltaDescription) {
        self.description = description;
    }

    /// What to show in the history list.
    pub fn human_readable_text(&self, translator: &dyn Translates) -> String {
        self.description.full_text(translator)
    }
}
impl RecordSerializable for Delta {
    fn serialize(&self) -> Record {
        Record::new(Self::TAG)
            .with_attribute(Self::ATTR_TYPE, self.delta_type.as_str())
            .with_attribute(Self::ATTR_NAME, self.description.text_key())
            .with_attribute(Self::ATTR_STRING_PARAM, self.description.string_parameter())
            .with_attribute(
                Self::ATTR_INT_PARAM,
                self.description.raw_num_changes().to_string(),
            )
            .with_attribute(Self::ATTR_UUID, self.uuid.hyphenated().to_string())
    }

    fn deserialize(&mut self, record: &Record) {
        self.reset();

        let Some(root) = record.self_or_child(Self::TAG) else {
            return;
        };

        self.uuid = root
            .attribute(Self::ATTR_UUID)
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);
        self.delta_type = root
            .attribute(Self::ATTR_TYPE)
            .filter(|t| !t.is_empty())
            .unwrap_or(DeltaType::Undefined.into())
            .to_string();

        let num_changes = root
            .attribute(Self::ATTR_INT_PARAM)
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(DeltaDescription::DEFAULT_NUM_CHANGES);
        self.description = DeltaDescription::new_with(
            &root.attribute_or(Self::ATTR_NAME, ""),
            num_changes,
            &root.attribute_or(Self::ATTR_STRING_PARAM, ""),
        );
    }

    fn reset(&mut self) {
        self.delta_type = DeltaType::Undefined.to_string();
        self.description = Default::default();
    }
}
