//! Page-layout slot trees.
//!
//! A page layout is a flat map of slots keyed by id. Each slot points at its
//! parent through `parentId`, which forms an implicit tree; root slots have
//! no parent. Siblings are ordered by `position.order`.
//!
//! The tree is edited through the pure operations in [`operations`]: each
//! takes the current configuration and returns a new one, leaving
//! persistence timing to the caller. The same operations back the visual
//! editor's handlers and the AI workspace's batch mutations.
//!
//! The JSON shape (camelCase keys) is what the editor and the
//! `slot_configurations.slots` JSONB column store.

pub mod operations;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::history::Document;

pub use operations::{NewSlot, SlotConfigUpdate, SlotOperation};

/// Errors raised by slot tree operations and validation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    /// The referenced slot does not exist.
    #[error("slot not found: {0}")]
    NotFound(SlotId),
    /// A slot with this id already exists.
    #[error("duplicate slot id: {0}")]
    DuplicateId(SlotId),
    /// The target parent cannot hold children.
    #[error("slot {0} cannot contain children")]
    NotAContainer(SlotId),
    /// The slot type has no text content.
    #[error("slot {0} does not hold text content")]
    NotContentBearing(SlotId),
    /// A move would place a slot inside itself.
    #[error("moving {slot} under {parent} would create a cycle")]
    Cycle {
        /// Slot being moved.
        slot: SlotId,
        /// Requested parent.
        parent: SlotId,
    },
    /// The slot (or one of its descendants) is locked.
    #[error("slot {0} is locked")]
    Locked(SlotId),
    /// A stored slot's `parentId` does not resolve.
    #[error("slot {slot} references missing parent {parent}")]
    DanglingParent {
        /// Slot with the broken reference.
        slot: SlotId,
        /// Missing parent id.
        parent: SlotId,
    },
    /// A map key does not match the slot's own id.
    #[error("slot stored under key {key} has id {id}")]
    IdMismatch {
        /// Map key.
        key: SlotId,
        /// Slot's `id` field.
        id: SlotId,
    },
    /// A stored slot could not be decoded.
    #[error("malformed slot data: {0}")]
    Malformed(String),
    /// An operation inside a batch failed; nothing from the batch was applied.
    #[error("operation {index} failed: {source}")]
    Operation {
        /// Zero-based index of the failing operation.
        index: usize,
        /// Underlying failure.
        #[source]
        source: Box<SlotError>,
    },
}

/// Identifier of a slot within one page layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(String);

impl SlotId {
    /// Wrap an existing id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id (`slot_` + 12 hex characters).
    #[must_use]
    pub fn generate() -> Self {
        let hex: String = uuid::Uuid::new_v4().simple().to_string().chars().take(12).collect();
        Self(format!("slot_{hex}"))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of content a slot renders.
///
/// Unknown type strings from newer editors are preserved as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SlotType {
    Container,
    Grid,
    Flex,
    Text,
    Image,
    Button,
    Link,
    Html,
    Component,
    Other(String),
}

impl SlotType {
    /// Whether slots of this type can have children.
    #[must_use]
    pub const fn is_container(&self) -> bool {
        matches!(self, Self::Container | Self::Grid | Self::Flex)
    }

    /// Whether `content` is editable text for this type.
    #[must_use]
    pub const fn holds_text(&self) -> bool {
        matches!(self, Self::Text | Self::Button | Self::Link | Self::Html)
    }

    /// The wire name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Container => "container",
            Self::Grid => "grid",
            Self::Flex => "flex",
            Self::Text => "text",
            Self::Image => "image",
            Self::Button => "button",
            Self::Link => "link",
            Self::Html => "html",
            Self::Component => "component",
            Self::Other(other) => other,
        }
    }
}

impl From<String> for SlotType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "container" => Self::Container,
            "grid" => Self::Grid,
            "flex" => Self::Flex,
            "text" => Self::Text,
            "image" => Self::Image,
            "button" => Self::Button,
            "link" => Self::Link,
            "html" => Self::Html,
            "component" => Self::Component,
            _ => Self::Other(value),
        }
    }
}

impl From<SlotType> for String {
    fn from(value: SlotType) -> Self {
        match value {
            SlotType::Other(other) => other,
            known => known.as_str().to_owned(),
        }
    }
}

/// Placement of a slot among its siblings and in the editor grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SlotPosition {
    /// Grid column, if the parent is a grid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col: Option<u32>,
    /// Grid row, if the parent is a grid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<u32>,
    /// Order among siblings, 0-based.
    #[serde(default)]
    pub order: u32,
}

/// One node of a page layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: SlotId,
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<SlotId>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub class_name: String,
    #[serde(default)]
    pub styles: Map<String, Value>,
    #[serde(default)]
    pub position: SlotPosition,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub locked: bool,
}

impl Slot {
    /// A bare slot with default styling.
    #[must_use]
    pub fn new(id: SlotId, slot_type: SlotType) -> Self {
        Self {
            id,
            slot_type,
            content: String::new(),
            parent_id: None,
            class_name: String::new(),
            styles: Map::new(),
            position: SlotPosition::default(),
            metadata: Map::new(),
            locked: false,
        }
    }
}

/// A page layout: every slot of one page type of one store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotConfiguration {
    pub page_type: String,
    #[serde(default)]
    pub slots: BTreeMap<SlotId, Slot>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl SlotConfiguration {
    /// An empty layout for a page type.
    #[must_use]
    pub fn empty(page_type: impl Into<String>) -> Self {
        Self {
            page_type: page_type.into(),
            slots: BTreeMap::new(),
            metadata: Map::new(),
        }
    }

    /// Look up a slot.
    ///
    /// # Errors
    ///
    /// Returns `SlotError::NotFound` if the id is unknown.
    pub fn get(&self, id: &SlotId) -> Result<&Slot, SlotError> {
        self.slots
            .get(id)
            .ok_or_else(|| SlotError::NotFound(id.clone()))
    }

    /// Direct children of `parent` (`None` = roots), sorted by order then id.
    #[must_use]
    pub fn children_of(&self, parent: Option<&SlotId>) -> Vec<&Slot> {
        let mut children: Vec<&Slot> = self
            .slots
            .values()
            .filter(|slot| slot.parent_id.as_ref() == parent)
            .collect();
        children.sort_by(|a, b| {
            a.position
                .order
                .cmp(&b.position.order)
                .then_with(|| a.id.cmp(&b.id))
        });
        children
    }

    /// Every slot below `id`, depth-first, not including `id` itself.
    #[must_use]
    pub fn descendants_of(&self, id: &SlotId) -> Vec<SlotId> {
        let mut found = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            for child in self.children_of(Some(&current)) {
                found.push(child.id.clone());
                stack.push(child.id.clone());
            }
        }
        found
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    #[must_use]
    pub fn is_self_or_ancestor(&self, ancestor: &SlotId, id: &SlotId) -> bool {
        let mut current = Some(id);
        let mut steps = 0;
        while let Some(slot_id) = current {
            if slot_id == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.slots.len() {
                return false;
            }
            current = self.slots.get(slot_id).and_then(|s| s.parent_id.as_ref());
        }
        false
    }

    /// Check structural invariants of a stored or submitted layout.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant: key/id mismatch, dangling parent,
    /// a parent that cannot hold children, or a parent cycle.
    pub fn validate(&self) -> Result<(), SlotError> {
        for (key, slot) in &self.slots {
            if key != &slot.id {
                return Err(SlotError::IdMismatch {
                    key: key.clone(),
                    id: slot.id.clone(),
                });
            }
            if let Some(parent_id) = &slot.parent_id {
                let parent = self
                    .slots
                    .get(parent_id)
                    .ok_or_else(|| SlotError::DanglingParent {
                        slot: slot.id.clone(),
                        parent: parent_id.clone(),
                    })?;
                if !parent.slot_type.is_container() {
                    return Err(SlotError::NotAContainer(parent_id.clone()));
                }
            }
        }

        for slot in self.slots.values() {
            let mut current = slot.parent_id.as_ref();
            let mut steps = 0;
            while let Some(parent_id) = current {
                steps += 1;
                if parent_id == &slot.id || steps > self.slots.len() {
                    return Err(SlotError::Cycle {
                        slot: slot.id.clone(),
                        parent: slot.parent_id.clone().unwrap_or_else(|| slot.id.clone()),
                    });
                }
                current = self.slots.get(parent_id).and_then(|s| s.parent_id.as_ref());
            }
        }

        Ok(())
    }

    /// Flatten into a versionable document: `slots/<id>` per slot plus
    /// `metadata` when present.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        for (id, slot) in &self.slots {
            if let Ok(value) = serde_json::to_value(slot) {
                doc.insert(format!("{SLOT_KEY_PREFIX}{id}"), value);
            }
        }
        if !self.metadata.is_empty() {
            doc.insert(METADATA_KEY.to_owned(), Value::Object(self.metadata.clone()));
        }
        doc
    }

    /// Rebuild a layout from a document produced by [`Self::to_document`].
    ///
    /// # Errors
    ///
    /// Returns `SlotError::Malformed` if an entry does not decode as a slot.
    pub fn from_document(page_type: impl Into<String>, doc: &Document) -> Result<Self, SlotError> {
        let mut config = Self::empty(page_type);
        for (key, value) in doc {
            if let Some(id) = key.strip_prefix(SLOT_KEY_PREFIX) {
                let slot: Slot = serde_json::from_value(value.clone())
                    .map_err(|e| SlotError::Malformed(format!("{key}: {e}")))?;
                config.slots.insert(SlotId::new(id), slot);
            } else if key == METADATA_KEY
                && let Value::Object(map) = value
            {
                config.metadata.clone_from(map);
            }
        }
        Ok(config)
    }
}

const SLOT_KEY_PREFIX: &str = "slots/";
const METADATA_KEY: &str = "metadata";

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn slot(id: &str, slot_type: SlotType, parent: Option<&str>, order: u32) -> Slot {
        let mut slot = Slot::new(SlotId::new(id), slot_type);
        slot.parent_id = parent.map(SlotId::new);
        slot.position.order = order;
        slot
    }

    fn layout(slots: Vec<Slot>) -> SlotConfiguration {
        let mut config = SlotConfiguration::empty("product");
        for s in slots {
            config.slots.insert(s.id.clone(), s);
        }
        config
    }

    #[test]
    fn test_slot_json_shape() {
        let json = serde_json::json!({
            "id": "hero",
            "type": "text",
            "content": "Welcome",
            "parentId": "main",
            "className": "text-xl",
            "styles": {"color": "red"},
            "position": {"col": 1, "row": 2, "order": 0}
        });
        let parsed: Slot = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.slot_type, SlotType::Text);
        assert_eq!(parsed.parent_id, Some(SlotId::new("main")));
        assert_eq!(parsed.class_name, "text-xl");
        assert_eq!(parsed.position.col, Some(1));
    }

    #[test]
    fn test_unknown_slot_type_preserved() {
        let parsed: Slot =
            serde_json::from_value(serde_json::json!({"id": "x", "type": "video"})).unwrap();
        assert_eq!(parsed.slot_type, SlotType::Other("video".to_owned()));
        let back = serde_json::to_value(&parsed).unwrap();
        assert_eq!(back["type"], "video");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = SlotId::generate();
        let b = SlotId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("slot_"));
        assert_eq!(a.as_str().len(), 17);
        assert!(a.as_str()["slot_".len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_children_sorted_by_order() {
        let config = layout(vec![
            slot("main", SlotType::Container, None, 0),
            slot("b", SlotType::Text, Some("main"), 1),
            slot("a", SlotType::Text, Some("main"), 0),
        ]);
        let children: Vec<&str> = config
            .children_of(Some(&SlotId::new("main")))
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(children, vec!["a", "b"]);
    }

    #[test]
    fn test_descendants() {
        let config = layout(vec![
            slot("main", SlotType::Container, None, 0),
            slot("row", SlotType::Flex, Some("main"), 0),
            slot("cell", SlotType::Text, Some("row"), 0),
            slot("footer", SlotType::Container, None, 1),
        ]);
        let mut descendants = config.descendants_of(&SlotId::new("main"));
        descendants.sort();
        assert_eq!(descendants, vec![SlotId::new("cell"), SlotId::new("row")]);
    }

    #[test]
    fn test_validate_dangling_parent() {
        let config = layout(vec![slot("a", SlotType::Text, Some("ghost"), 0)]);
        assert!(matches!(
            config.validate(),
            Err(SlotError::DanglingParent { .. })
        ));
    }

    #[test]
    fn test_validate_non_container_parent() {
        let config = layout(vec![
            slot("t", SlotType::Text, None, 0),
            slot("child", SlotType::Text, Some("t"), 0),
        ]);
        assert_eq!(
            config.validate(),
            Err(SlotError::NotAContainer(SlotId::new("t")))
        );
    }

    #[test]
    fn test_validate_cycle() {
        let config = layout(vec![
            slot("a", SlotType::Container, Some("b"), 0),
            slot("b", SlotType::Container, Some("a"), 0),
        ]);
        assert!(matches!(config.validate(), Err(SlotError::Cycle { .. })));
    }

    #[test]
    fn test_validate_id_mismatch() {
        let mut config = SlotConfiguration::empty("home");
        config.slots.insert(
            SlotId::new("key"),
            Slot::new(SlotId::new("other"), SlotType::Text),
        );
        assert!(matches!(config.validate(), Err(SlotError::IdMismatch { .. })));
    }

    #[test]
    fn test_document_round_trip() {
        let mut config = layout(vec![
            slot("main", SlotType::Container, None, 0),
            slot("title", SlotType::Text, Some("main"), 0),
        ]);
        config
            .metadata
            .insert("theme".to_owned(), serde_json::json!("dark"));

        let doc = config.to_document();
        let keys: Vec<_> = doc.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["metadata", "slots/main", "slots/title"]);

        let back = SlotConfiguration::from_document("product", &doc).unwrap();
        assert_eq!(back, config);
    }
}
