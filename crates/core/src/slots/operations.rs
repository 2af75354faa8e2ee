//! Pure editing operations on a [`SlotConfiguration`].
//!
//! Every operation borrows the current layout and returns a new one. A
//! failed operation leaves the input untouched, and [`SlotConfiguration::apply_all`]
//! is all-or-nothing across a batch.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Slot, SlotConfiguration, SlotError, SlotId, SlotPosition, SlotType};

/// Input for [`SlotConfiguration::create_slot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSlot {
    /// Explicit id; generated when absent.
    #[serde(default)]
    pub id: Option<SlotId>,
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<SlotId>,
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub styles: Map<String, Value>,
    /// Placement; `order` defaults to after the last sibling.
    #[serde(default)]
    pub position: Option<SlotPosition>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl NewSlot {
    /// A new slot of `slot_type` under `parent_id`.
    #[must_use]
    pub fn new(slot_type: SlotType, parent_id: Option<SlotId>) -> Self {
        Self {
            id: None,
            slot_type,
            content: String::new(),
            parent_id,
            class_name: String::new(),
            styles: Map::new(),
            position: None,
            metadata: Map::new(),
        }
    }

    /// Set the text content.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Use an explicit id.
    #[must_use]
    pub fn with_id(mut self, id: SlotId) -> Self {
        self.id = Some(id);
        self
    }
}

/// Input for [`SlotConfiguration::update_config`].
///
/// Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotConfigUpdate {
    /// Keys merged into `metadata`; `null` removes a key.
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub locked: Option<bool>,
    #[serde(default)]
    pub col: Option<u32>,
    #[serde(default)]
    pub row: Option<u32>,
}

/// One editing step, as sent by the editor or the AI workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SlotOperation {
    Create {
        slot: NewSlot,
    },
    Delete {
        id: SlotId,
    },
    Restyle {
        id: SlotId,
        styles: Map<String, Value>,
    },
    Retext {
        id: SlotId,
        content: String,
    },
    Move {
        id: SlotId,
        #[serde(default, rename = "parentId")]
        parent_id: Option<SlotId>,
        index: usize,
    },
    UpdateConfig {
        id: SlotId,
        #[serde(flatten)]
        update: SlotConfigUpdate,
    },
}

/// Merge `patch` into `target`; `null` values delete keys.
fn merge_map(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        if value.is_null() {
            target.remove(key);
        } else {
            target.insert(key.clone(), value.clone());
        }
    }
}

impl SlotConfiguration {
    /// Renumber the children of `parent` to 0..n following `ordered`.
    fn renumber(&mut self, ordered: &[SlotId]) {
        for (order, id) in ordered.iter().enumerate() {
            if let Some(slot) = self.slots.get_mut(id) {
                slot.position.order = u32::try_from(order).unwrap_or(u32::MAX);
            }
        }
    }

    fn sibling_ids(&self, parent: Option<&SlotId>) -> Vec<SlotId> {
        self.children_of(parent)
            .into_iter()
            .map(|s| s.id.clone())
            .collect()
    }

    fn require_container(&self, parent: Option<&SlotId>) -> Result<(), SlotError> {
        if let Some(parent_id) = parent {
            let parent_slot = self.get(parent_id)?;
            if !parent_slot.slot_type.is_container() {
                return Err(SlotError::NotAContainer(parent_id.clone()));
            }
        }
        Ok(())
    }

    /// Add a slot. Returns the new layout and the id of the created slot.
    ///
    /// # Errors
    ///
    /// Returns `SlotError` if the id is taken, the parent is missing, or the
    /// parent cannot hold children.
    pub fn create_slot(&self, new: NewSlot) -> Result<(Self, SlotId), SlotError> {
        let id = new.id.unwrap_or_else(SlotId::generate);
        if self.slots.contains_key(&id) {
            return Err(SlotError::DuplicateId(id));
        }
        self.require_container(new.parent_id.as_ref())?;

        let next_order = self
            .children_of(new.parent_id.as_ref())
            .last()
            .map_or(0, |s| s.position.order.saturating_add(1));
        let position = new.position.unwrap_or(SlotPosition {
            order: next_order,
            ..SlotPosition::default()
        });

        let slot = Slot {
            id: id.clone(),
            slot_type: new.slot_type,
            content: new.content,
            parent_id: new.parent_id,
            class_name: new.class_name,
            styles: new.styles,
            position,
            metadata: new.metadata,
            locked: false,
        };

        let mut next = self.clone();
        next.slots.insert(id.clone(), slot);
        Ok((next, id))
    }

    /// Remove a slot and everything below it.
    ///
    /// # Errors
    ///
    /// Returns `SlotError::NotFound` for unknown ids and `SlotError::Locked`
    /// if the slot or any descendant is locked.
    pub fn delete_slot(&self, id: &SlotId) -> Result<Self, SlotError> {
        let slot = self.get(id)?;
        let parent = slot.parent_id.clone();

        let mut doomed = self.descendants_of(id);
        doomed.push(id.clone());
        if let Some(locked) = doomed
            .iter()
            .find(|d| self.slots.get(*d).is_some_and(|s| s.locked))
        {
            return Err(SlotError::Locked(locked.clone()));
        }

        let mut next = self.clone();
        for doomed_id in &doomed {
            next.slots.remove(doomed_id);
        }
        let siblings = next.sibling_ids(parent.as_ref());
        next.renumber(&siblings);
        Ok(next)
    }

    /// Merge style properties into a slot; `null` removes a property.
    ///
    /// # Errors
    ///
    /// Returns `SlotError::NotFound` for unknown ids.
    pub fn restyle(&self, id: &SlotId, styles: &Map<String, Value>) -> Result<Self, SlotError> {
        self.get(id)?;
        let mut next = self.clone();
        if let Some(slot) = next.slots.get_mut(id) {
            merge_map(&mut slot.styles, styles);
        }
        Ok(next)
    }

    /// Replace the text content of a slot.
    ///
    /// # Errors
    ///
    /// Returns `SlotError::NotFound` for unknown ids and
    /// `SlotError::NotContentBearing` for containers, images and components.
    pub fn retext(&self, id: &SlotId, content: &str) -> Result<Self, SlotError> {
        let slot = self.get(id)?;
        if !slot.slot_type.holds_text() {
            return Err(SlotError::NotContentBearing(id.clone()));
        }
        let mut next = self.clone();
        if let Some(slot) = next.slots.get_mut(id) {
            content.clone_into(&mut slot.content);
        }
        Ok(next)
    }

    /// Move a slot under `new_parent` at sibling position `index` (drag-drop).
    ///
    /// `index` past the end appends. Orders of the old and new siblings are
    /// renumbered 0..n.
    ///
    /// # Errors
    ///
    /// Returns `SlotError` if either slot is missing, the target cannot hold
    /// children, the slot is locked, or the move would create a cycle.
    pub fn reparent(
        &self,
        id: &SlotId,
        new_parent: Option<&SlotId>,
        index: usize,
    ) -> Result<Self, SlotError> {
        let slot = self.get(id)?;
        if slot.locked {
            return Err(SlotError::Locked(id.clone()));
        }
        self.require_container(new_parent)?;
        if let Some(parent_id) = new_parent
            && self.is_self_or_ancestor(id, parent_id)
        {
            return Err(SlotError::Cycle {
                slot: id.clone(),
                parent: parent_id.clone(),
            });
        }

        let old_parent = slot.parent_id.clone();
        let mut next = self.clone();

        let mut old_siblings = next.sibling_ids(old_parent.as_ref());
        old_siblings.retain(|s| s != id);

        let mut new_siblings = if old_parent.as_ref() == new_parent {
            old_siblings.clone()
        } else {
            next.sibling_ids(new_parent)
        };
        let at = index.min(new_siblings.len());
        new_siblings.insert(at, id.clone());

        if let Some(moved) = next.slots.get_mut(id) {
            moved.parent_id = new_parent.cloned();
        }
        if old_parent.as_ref() != new_parent {
            next.renumber(&old_siblings);
        }
        next.renumber(&new_siblings);
        Ok(next)
    }

    /// Update slot configuration: metadata, class name, lock flag, grid cell.
    ///
    /// # Errors
    ///
    /// Returns `SlotError::NotFound` for unknown ids.
    pub fn update_config(&self, id: &SlotId, update: &SlotConfigUpdate) -> Result<Self, SlotError> {
        self.get(id)?;
        let mut next = self.clone();
        if let Some(slot) = next.slots.get_mut(id) {
            if let Some(metadata) = &update.metadata {
                merge_map(&mut slot.metadata, metadata);
            }
            if let Some(class_name) = &update.class_name {
                class_name.clone_into(&mut slot.class_name);
            }
            if let Some(locked) = update.locked {
                slot.locked = locked;
            }
            if update.col.is_some() {
                slot.position.col = update.col;
            }
            if update.row.is_some() {
                slot.position.row = update.row;
            }
        }
        Ok(next)
    }

    /// Apply one operation.
    ///
    /// # Errors
    ///
    /// Returns the operation's `SlotError`.
    pub fn apply(&self, operation: &SlotOperation) -> Result<Self, SlotError> {
        match operation {
            SlotOperation::Create { slot } => self.create_slot(slot.clone()).map(|(next, _)| next),
            SlotOperation::Delete { id } => self.delete_slot(id),
            SlotOperation::Restyle { id, styles } => self.restyle(id, styles),
            SlotOperation::Retext { id, content } => self.retext(id, content),
            SlotOperation::Move {
                id,
                parent_id,
                index,
            } => self.reparent(id, parent_id.as_ref(), *index),
            SlotOperation::UpdateConfig { id, update } => self.update_config(id, update),
        }
    }

    /// Apply a batch of operations atomically.
    ///
    /// # Errors
    ///
    /// Returns `SlotError::Operation` naming the first failing operation;
    /// none of the batch is applied.
    pub fn apply_all(&self, operations: &[SlotOperation]) -> Result<Self, SlotError> {
        let mut current = self.clone();
        for (index, operation) in operations.iter().enumerate() {
            current = current
                .apply(operation)
                .map_err(|source| SlotError::Operation {
                    index,
                    source: Box::new(source),
                })?;
        }
        Ok(current)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn id(s: &str) -> SlotId {
        SlotId::new(s)
    }

    /// main(container) > [title(text), row(flex) > [left(text), right(image)]]
    fn sample() -> SlotConfiguration {
        let config = SlotConfiguration::empty("product");
        let (config, _) = config
            .create_slot(NewSlot::new(SlotType::Container, None).with_id(id("main")))
            .unwrap();
        let (config, _) = config
            .create_slot(
                NewSlot::new(SlotType::Text, Some(id("main")))
                    .with_id(id("title"))
                    .with_content("Hello"),
            )
            .unwrap();
        let (config, _) = config
            .create_slot(NewSlot::new(SlotType::Flex, Some(id("main"))).with_id(id("row")))
            .unwrap();
        let (config, _) = config
            .create_slot(NewSlot::new(SlotType::Text, Some(id("row"))).with_id(id("left")))
            .unwrap();
        let (config, _) = config
            .create_slot(NewSlot::new(SlotType::Image, Some(id("row"))).with_id(id("right")))
            .unwrap();
        config
    }

    fn order_of(config: &SlotConfiguration, parent: Option<&str>) -> Vec<String> {
        let parent = parent.map(id);
        config
            .children_of(parent.as_ref())
            .iter()
            .map(|s| s.id.as_str().to_owned())
            .collect()
    }

    #[test]
    fn test_create_appends_after_last_sibling() {
        let config = sample();
        assert_eq!(config.get(&id("title")).unwrap().position.order, 0);
        assert_eq!(config.get(&id("row")).unwrap().position.order, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_create_generates_id() {
        let (config, new_id) = SlotConfiguration::empty("home")
            .create_slot(NewSlot::new(SlotType::Container, None))
            .unwrap();
        assert!(config.slots.contains_key(&new_id));
    }

    #[test]
    fn test_create_rejects_duplicate_and_bad_parent() {
        let config = sample();
        assert_eq!(
            config
                .create_slot(NewSlot::new(SlotType::Text, None).with_id(id("main")))
                .unwrap_err(),
            SlotError::DuplicateId(id("main"))
        );
        assert_eq!(
            config
                .create_slot(NewSlot::new(SlotType::Text, Some(id("title"))))
                .unwrap_err(),
            SlotError::NotAContainer(id("title"))
        );
        assert_eq!(
            config
                .create_slot(NewSlot::new(SlotType::Text, Some(id("nope"))))
                .unwrap_err(),
            SlotError::NotFound(id("nope"))
        );
    }

    #[test]
    fn test_input_is_not_mutated() {
        let config = sample();
        let before = config.clone();
        let _ = config.delete_slot(&id("row")).unwrap();
        assert_eq!(config, before);
    }

    #[test]
    fn test_delete_cascades_and_renumbers() {
        let config = sample();
        let next = config.delete_slot(&id("title")).unwrap();
        assert!(!next.slots.contains_key(&id("title")));
        assert_eq!(next.get(&id("row")).unwrap().position.order, 0);

        let next = config.delete_slot(&id("row")).unwrap();
        assert!(!next.slots.contains_key(&id("left")));
        assert!(!next.slots.contains_key(&id("right")));
        assert_eq!(next.slots.len(), 2);
    }

    #[test]
    fn test_delete_refuses_locked_descendant() {
        let config = sample()
            .update_config(
                &id("left"),
                &SlotConfigUpdate {
                    locked: Some(true),
                    ..SlotConfigUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(
            config.delete_slot(&id("main")).unwrap_err(),
            SlotError::Locked(id("left"))
        );
    }

    #[test]
    fn test_restyle_merges_and_removes() {
        let config = sample()
            .restyle(
                &id("title"),
                json!({"color": "red", "fontSize": "2rem"}).as_object().unwrap(),
            )
            .unwrap();
        let config = config
            .restyle(
                &id("title"),
                json!({"color": null, "fontWeight": 700}).as_object().unwrap(),
            )
            .unwrap();
        let styles = &config.get(&id("title")).unwrap().styles;
        assert!(!styles.contains_key("color"));
        assert_eq!(styles["fontSize"], "2rem");
        assert_eq!(styles["fontWeight"], 700);
    }

    #[test]
    fn test_retext_only_text_slots() {
        let config = sample().retext(&id("title"), "New title").unwrap();
        assert_eq!(config.get(&id("title")).unwrap().content, "New title");
        assert_eq!(
            config.retext(&id("right"), "x").unwrap_err(),
            SlotError::NotContentBearing(id("right"))
        );
    }

    #[test]
    fn test_reorder_within_parent() {
        let config = sample().reparent(&id("row"), Some(&id("main")), 0).unwrap();
        assert_eq!(order_of(&config, Some("main")), vec!["row", "title"]);
        assert_eq!(config.get(&id("title")).unwrap().position.order, 1);
    }

    #[test]
    fn test_move_to_other_parent() {
        let config = sample().reparent(&id("title"), Some(&id("row")), 1).unwrap();
        assert_eq!(order_of(&config, Some("row")), vec!["left", "title", "right"]);
        assert_eq!(order_of(&config, Some("main")), vec!["row"]);
        assert_eq!(config.get(&id("row")).unwrap().position.order, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_move_to_root_with_large_index_appends() {
        let config = sample().reparent(&id("left"), None, 99).unwrap();
        assert_eq!(order_of(&config, None), vec!["main", "left"]);
    }

    #[test]
    fn test_move_into_descendant_is_cycle() {
        let err = sample()
            .reparent(&id("main"), Some(&id("row")), 0)
            .unwrap_err();
        assert!(matches!(err, SlotError::Cycle { .. }));
        let err = sample()
            .reparent(&id("row"), Some(&id("row")), 0)
            .unwrap_err();
        assert!(matches!(err, SlotError::Cycle { .. }));
    }

    #[test]
    fn test_update_config() {
        let config = sample()
            .update_config(
                &id("row"),
                &SlotConfigUpdate {
                    metadata: Some(json!({"gap": 4}).as_object().unwrap().clone()),
                    class_name: Some("gap-4".to_owned()),
                    col: Some(2),
                    ..SlotConfigUpdate::default()
                },
            )
            .unwrap();
        let row = config.get(&id("row")).unwrap();
        assert_eq!(row.metadata["gap"], 4);
        assert_eq!(row.class_name, "gap-4");
        assert_eq!(row.position.col, Some(2));
        assert_eq!(row.position.order, 1);
    }

    #[test]
    fn test_operation_json() {
        let ops: Vec<SlotOperation> = serde_json::from_value(json!([
            {"op": "retext", "id": "title", "content": "AI title"},
            {"op": "move", "id": "title", "parentId": "row", "index": 0},
            {"op": "update_config", "id": "row", "className": "wide"},
            {"op": "create", "slot": {"type": "button", "parentId": "main", "content": "Buy"}}
        ]))
        .unwrap();
        let config = sample().apply_all(&ops).unwrap();
        assert_eq!(config.get(&id("title")).unwrap().content, "AI title");
        assert_eq!(order_of(&config, Some("row"))[0], "title");
        assert_eq!(config.get(&id("row")).unwrap().class_name, "wide");
        assert_eq!(config.slots.len(), 6);
    }

    #[test]
    fn test_apply_all_is_atomic() {
        let config = sample();
        let ops = vec![
            SlotOperation::Retext {
                id: id("title"),
                content: "changed".to_owned(),
            },
            SlotOperation::Delete { id: id("missing") },
        ];
        let err = config.apply_all(&ops).unwrap_err();
        assert_eq!(
            err,
            SlotError::Operation {
                index: 1,
                source: Box::new(SlotError::NotFound(id("missing"))),
            }
        );
        assert_eq!(config.get(&id("title")).unwrap().content, "Hello");
    }
}
