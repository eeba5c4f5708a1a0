// Copyright (c) 2024 Mike Tsao. All rights reserved.

use ensnare_sync::prelude::*;
use more_asserts::assert_gt;
use strum::IntoEnumIterator;

#[test]
fn deltas_survive_json() {
    for delta_type in DeltaType::iter() {
        let original = Delta::new_with(
            delta_type,
            DeltaDescription::new_with("vcs::delta::changed", 3, "Lead"),
        );
        let json = original.serialize().to_json().unwrap();

        let mut decoded = Delta::default();
        decoded.deserialize(&Record::from_json(&json).unwrap());
        assert_eq!(decoded.uuid(), original.uuid());
        assert_eq!(decoded.delta_type(), original.delta_type());
        assert_eq!(decoded.known_type(), Some(delta_type));
        assert_eq!(decoded.description(), original.description());
    }
}

#[test]
fn missing_uuid_gets_a_fresh_identity() {
    let record = Record::new(Delta::TAG)
        .with_attribute(Delta::ATTR_TYPE, "track-path")
        .with_attribute(Delta::ATTR_NAME, "vcs::delta::trackpath");

    let mut first = Delta::default();
    first.deserialize(&record);
    let mut second = Delta::default();
    second.deserialize(&record);

    assert!(!first.uuid().is_nil());
    assert_gt!(first.uuid().to_string().len(), 0);
    assert_ne!(first, second, "each read mints its own identity");
    assert_eq!(first.delta_type(), "track-path");
    assert_ne!(first.delta_type(), DeltaType::Undefined.to_string());
}

#[test]
fn description_without_count_reports_sentinel() {
    let description = DeltaDescription::new("vcs::delta::title");
    assert_eq!(description.raw_num_changes(), -1);
    assert_eq!(description.num_changes(), None);

    let mut decoded = Delta::default();
    decoded.deserialize(
        &Delta::new_with(DeltaType::ProjectTitle, description.clone()).serialize(),
    );
    assert_eq!(decoded.description().raw_num_changes(), -1);
}

#[test]
fn revision_keeps_deltas_in_order() {
    let deltas = vec![
        Delta::new_with(
            DeltaType::NotesAdded,
            DeltaDescription::new_with_count("{x} notes added", 4),
        ),
        Delta::new_with(
            DeltaType::TrackColour,
            DeltaDescription::new_with_parameter("colour", "red"),
        ),
    ];
    let revision = Revision::new_with("edit", None, deltas.clone());

    let mut decoded = Revision::default();
    decoded.deserialize(&Record::from_json(&revision.serialize().to_json().unwrap()).unwrap());
    assert_eq!(decoded.deltas(), deltas.as_slice());
    assert_eq!(
        decoded.deltas()[0].human_readable_text(&PassthroughTranslator),
        "4 notes added"
    );
}
