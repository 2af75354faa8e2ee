//! Editing a page layout across many saves and reading old versions back,
//! the way the slot configuration routes combine `slots` and `history`.

#![allow(clippy::unwrap_used)]

use serde_json::{Map, json};

use shopforge_core::history::{
    self, SnapshotPolicy, StoredVersion, VersionError, VersionKind, next_version,
};
use shopforge_core::slots::{NewSlot, SlotConfiguration, SlotId, SlotOperation, SlotType};

/// Stores successive layouts, reloading each previous version from history
/// instead of keeping it in memory.
fn save_all(policy: SnapshotPolicy, layouts: &[SlotConfiguration]) -> Vec<StoredVersion> {
    let mut stored: Vec<StoredVersion> = Vec::new();
    for (i, layout) in layouts.iter().enumerate() {
        let number = i32::try_from(i).unwrap() + 1;
        let previous = (number > 1).then(|| history::reconstruct(&stored, number - 1).unwrap());
        let version = next_version(policy, number, previous.as_ref(), &layout.to_document());

        // Round-trip through JSON as the database column does.
        let encoded = serde_json::to_string(&version).unwrap();
        stored.push(serde_json::from_str(&encoded).unwrap());
    }
    stored
}

fn edit_session() -> Vec<SlotConfiguration> {
    let mut layouts = Vec::new();

    let (layout, root) = SlotConfiguration::empty("home")
        .create_slot(NewSlot::new(SlotType::Container, None).with_id(SlotId::new("root")))
        .unwrap();
    layouts.push(layout);

    let (layout, _) = layouts[0]
        .create_slot(
            NewSlot::new(SlotType::Text, Some(root.clone()))
                .with_id(SlotId::new("headline"))
                .with_content("Summer sale"),
        )
        .unwrap();
    layouts.push(layout);

    let mut styles = Map::new();
    styles.insert("color".to_owned(), json!("#c00"));
    let layout = layouts[1]
        .apply_all(&[
            SlotOperation::Retext {
                id: SlotId::new("headline"),
                content: "Summer sale - 20% off".to_owned(),
            },
            SlotOperation::Restyle {
                id: SlotId::new("headline"),
                styles,
            },
        ])
        .unwrap();
    layouts.push(layout);

    let (layout, _) = layouts[2]
        .create_slot(
            NewSlot::new(SlotType::Button, Some(root))
                .with_id(SlotId::new("cta"))
                .with_content("Shop now"),
        )
        .unwrap();
    layouts.push(layout);

    let layout = layouts[3]
        .apply(&SlotOperation::Delete {
            id: SlotId::new("headline"),
        })
        .unwrap();
    layouts.push(layout);

    layouts
}

#[test]
fn test_every_version_reconstructs() {
    let layouts = edit_session();

    for interval in [1, 2, 3, 10] {
        let stored = save_all(SnapshotPolicy::new(interval), &layouts);
        for (i, expected) in layouts.iter().enumerate() {
            let number = i32::try_from(i).unwrap() + 1;
            let doc = history::reconstruct(&stored, number).unwrap();
            let layout = SlotConfiguration::from_document("home", &doc).unwrap();
            assert_eq!(&layout, expected, "interval {interval}, version {number}");
            layout.validate().unwrap();
        }
    }
}

#[test]
fn test_snapshot_cadence() {
    let stored = save_all(SnapshotPolicy::new(2), &edit_session());
    let kinds: Vec<VersionKind> = stored.iter().map(|v| v.kind).collect();
    assert_eq!(
        kinds,
        vec![
            VersionKind::Snapshot,
            VersionKind::Patch,
            VersionKind::Snapshot,
            VersionKind::Patch,
            VersionKind::Snapshot,
        ]
    );
}

#[test]
fn test_compare_versions() {
    let stored = save_all(SnapshotPolicy::default(), &edit_session());

    // v2 -> v5: headline removed, cta added, root's children unchanged.
    let patch = history::compare(&stored, 2, 5).unwrap();
    let (added, removed, modified) = patch.summary();
    assert_eq!((added, removed, modified), (1, 1, 0));
    assert_eq!(patch.changes[0].key(), "slots/cta");
    assert_eq!(patch.changes[1].key(), "slots/headline");

    assert!(history::compare(&stored, 3, 3).unwrap().is_empty());
}

#[test]
fn test_restore_is_a_new_version() {
    let layouts = edit_session();
    let policy = SnapshotPolicy::new(3);
    let stored = save_all(policy, &layouts);

    // Restoring v2 appends it as v6 instead of rewriting history.
    let restored = history::reconstruct(&stored, 2).unwrap();
    let mut with_restore = layouts.clone();
    with_restore.push(SlotConfiguration::from_document("home", &restored).unwrap());
    let stored = save_all(policy, &with_restore);

    assert_eq!(stored.len(), 6);
    assert_eq!(
        history::reconstruct(&stored, 6).unwrap(),
        history::reconstruct(&stored, 2).unwrap()
    );
}

#[test]
fn test_missing_history_is_reported() {
    let mut stored = save_all(SnapshotPolicy::new(10), &edit_session());

    assert_eq!(
        history::reconstruct(&stored, 9),
        Err(VersionError::NotFound(9))
    );

    stored.retain(|v| v.number != 3);
    assert_eq!(history::reconstruct(&stored, 4), Err(VersionError::Gap(3)));
    assert_eq!(history::reconstruct(&stored, 2).unwrap().len(), 2);
}
