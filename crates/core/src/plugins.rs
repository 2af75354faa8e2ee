//! Plugin manifests, source validation, and versioned source documents.
//!
//! Widget code is stored as text and shipped to the storefront with its
//! SHA-256 so the sandboxed runtime can verify what it loads. The server
//! never evaluates plugin code.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::history::Document;

/// Largest accepted source file (widget, listener, or hook body).
pub const MAX_SOURCE_BYTES: usize = 256 * 1024;

/// Errors from plugin validation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    #[error("invalid slug '{0}': use 2-64 characters of a-z, 0-9 and '-'")]
    InvalidSlug(String),
    #[error("invalid key '{0}': use 1-64 characters of a-z, 0-9, '-' and '_'")]
    InvalidKey(String),
    #[error("{name} is {size} bytes; the limit is {MAX_SOURCE_BYTES}")]
    SourceTooLarge { name: String, size: usize },
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("duplicate widget key '{0}'")]
    DuplicateWidget(String),
}

/// Who can see a plugin in the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginVisibility {
    Private,
    Public,
    Deprecated,
}

impl PluginVisibility {
    /// Derive from the registry flags; deprecation hides a public plugin.
    #[must_use]
    pub const fn from_flags(is_public: bool, is_deprecated: bool) -> Self {
        match (is_public, is_deprecated) {
            (_, true) => Self::Deprecated,
            (true, false) => Self::Public,
            (false, false) => Self::Private,
        }
    }

    /// Whether storefronts may load this plugin's widgets.
    #[must_use]
    pub const fn is_listed(self) -> bool {
        matches!(self, Self::Public)
    }
}

/// A widget shipped by a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetDefinition {
    pub key: String,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub config: Value,
}

/// An event listener (`event_name`) or hook (`hook_name`) body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerDefinition {
    #[serde(alias = "event_name", alias = "hook_name")]
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub priority: i32,
}

/// A plugin as submitted for registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub slug: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub widgets: Vec<WidgetDefinition>,
    #[serde(default)]
    pub event_listeners: Vec<HandlerDefinition>,
    #[serde(default)]
    pub hooks: Vec<HandlerDefinition>,
}

impl PluginManifest {
    /// Validate slug, names, widget keys and every source body.
    ///
    /// # Errors
    ///
    /// Returns the first `PluginError` found.
    pub fn validate(&self) -> Result<(), PluginError> {
        validate_slug(&self.slug)?;
        if self.name.trim().is_empty() {
            return Err(PluginError::Empty("name"));
        }
        if self.version.trim().is_empty() {
            return Err(PluginError::Empty("version"));
        }

        let mut keys = std::collections::BTreeSet::new();
        for widget in &self.widgets {
            validate_key(&widget.key)?;
            if !keys.insert(widget.key.as_str()) {
                return Err(PluginError::DuplicateWidget(widget.key.clone()));
            }
            validate_source(&format!("widget '{}'", widget.key), &widget.code)?;
        }
        for handler in self.event_listeners.iter().chain(&self.hooks) {
            if handler.name.trim().is_empty() {
                return Err(PluginError::Empty("handler name"));
            }
            validate_source(&format!("handler '{}'", handler.name), &handler.code)?;
        }
        Ok(())
    }

    /// The manifest header stored under the `manifest` key of a source document.
    #[must_use]
    pub fn header(&self) -> Value {
        json!({
            "slug": self.slug,
            "name": self.name,
            "version": self.version,
            "description": self.description,
            "author": self.author,
        })
    }
}

/// Validate a plugin slug.
///
/// # Errors
///
/// Returns `PluginError::InvalidSlug` unless the slug is 2-64 characters of
/// `[a-z0-9-]` and does not start or end with `-`.
pub fn validate_slug(slug: &str) -> Result<(), PluginError> {
    let ok = (2..=64).contains(&slug.len())
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        && !slug.starts_with('-')
        && !slug.ends_with('-');
    if ok {
        Ok(())
    } else {
        Err(PluginError::InvalidSlug(slug.to_owned()))
    }
}

/// Validate a widget key.
///
/// # Errors
///
/// Returns `PluginError::InvalidKey` unless the key is 1-64 characters of `[a-z0-9_-]`.
pub fn validate_key(key: &str) -> Result<(), PluginError> {
    let ok = (1..=64).contains(&key.len())
        && key
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_');
    if ok {
        Ok(())
    } else {
        Err(PluginError::InvalidKey(key.to_owned()))
    }
}

/// Validate a source body.
///
/// # Errors
///
/// Returns `PluginError` if the body is blank or over [`MAX_SOURCE_BYTES`].
pub fn validate_source(name: &str, code: &str) -> Result<(), PluginError> {
    if code.trim().is_empty() {
        return Err(PluginError::Empty("source"));
    }
    if code.len() > MAX_SOURCE_BYTES {
        return Err(PluginError::SourceTooLarge {
            name: name.to_owned(),
            size: code.len(),
        });
    }
    Ok(())
}

/// Lowercase hex SHA-256 of a source body.
#[must_use]
pub fn code_hash(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

/// A stored listener or hook, keyed by its row id in the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredHandler {
    pub id: i32,
    pub name: String,
    pub code: String,
    pub priority: i32,
    pub is_enabled: bool,
}

impl StoredHandler {
    fn to_value(&self) -> Value {
        json!({
            "name": self.name,
            "code": self.code,
            "priority": self.priority,
            "is_enabled": self.is_enabled,
        })
    }
}

/// Current plugin source, as loaded from the registry tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginSource {
    pub manifest: Value,
    /// `(widget_key, code)` pairs.
    pub widgets: Vec<(String, String)>,
    pub listeners: Vec<StoredHandler>,
    pub hooks: Vec<StoredHandler>,
}

impl PluginSource {
    /// Flatten into a versionable document.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("manifest".to_owned(), self.manifest.clone());
        for (key, code) in &self.widgets {
            doc.insert(format!("widgets/{key}"), Value::String(code.clone()));
        }
        for listener in &self.listeners {
            doc.insert(format!("listeners/{}", listener.id), listener.to_value());
        }
        for hook in &self.hooks {
            doc.insert(format!("hooks/{}", hook.id), hook.to_value());
        }
        doc
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn manifest() -> PluginManifest {
        serde_json::from_value(json!({
            "slug": "size-guide",
            "name": "Size Guide",
            "version": "1.0.0",
            "widgets": [{"key": "size_table", "name": "Size table", "code": "export default () => null"}],
            "event_listeners": [{"event_name": "cart.updated", "code": "return 1", "priority": 5}],
            "hooks": [{"hook_name": "product.price", "code": "return price"}]
        }))
        .unwrap()
    }

    #[test]
    fn test_manifest_deserializes_handler_aliases() {
        let m = manifest();
        assert_eq!(m.event_listeners[0].name, "cart.updated");
        assert_eq!(m.event_listeners[0].priority, 5);
        assert_eq!(m.hooks[0].name, "product.price");
        assert!(m.validate().is_ok());
    }

    #[test]
    fn test_slug_rules() {
        assert!(validate_slug("ab").is_ok());
        assert!(validate_slug("my-plugin-2").is_ok());
        assert!(validate_slug("a").is_err());
        assert!(validate_slug("My-Plugin").is_err());
        assert!(validate_slug("-lead").is_err());
        assert!(validate_slug("under_score").is_err());
        assert!(validate_slug(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_source_limits() {
        let mut m = manifest();
        m.widgets[0].code = "x".repeat(MAX_SOURCE_BYTES + 1);
        assert!(matches!(
            m.validate(),
            Err(PluginError::SourceTooLarge { .. })
        ));

        let mut m = manifest();
        m.widgets.push(m.widgets[0].clone());
        assert_eq!(
            m.validate(),
            Err(PluginError::DuplicateWidget("size_table".to_owned()))
        );

        let mut m = manifest();
        m.hooks[0].code = "  ".to_owned();
        assert_eq!(m.validate(), Err(PluginError::Empty("source")));
    }

    #[test]
    fn test_code_hash() {
        assert_eq!(
            code_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_visibility() {
        assert_eq!(
            PluginVisibility::from_flags(true, true),
            PluginVisibility::Deprecated
        );
        assert!(PluginVisibility::from_flags(true, false).is_listed());
        assert!(!PluginVisibility::from_flags(false, false).is_listed());
    }

    #[test]
    fn test_source_document_keys() {
        let source = PluginSource {
            manifest: manifest().header(),
            widgets: vec![("size_table".to_owned(), "code".to_owned())],
            listeners: vec![StoredHandler {
                id: 3,
                name: "cart.updated".to_owned(),
                code: "return 1".to_owned(),
                priority: 0,
                is_enabled: true,
            }],
            hooks: vec![],
        };
        let doc = source.to_document();
        let keys: Vec<_> = doc.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["listeners/3", "manifest", "widgets/size_table"]);
        assert_eq!(doc["manifest"]["slug"], "size-guide");
    }
}
