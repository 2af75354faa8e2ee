//! Plugin registry resources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use shopforge_core::history::VersionKind;
use shopforge_core::plugins::PluginVisibility;
use shopforge_core::{
    PluginEventListenerId, PluginHookId, PluginId, PluginVersionId, PluginWidgetId, StoreId,
    UserId,
};

/// A registered plugin.
#[derive(Debug, Clone, Serialize)]
pub struct Plugin {
    pub id: PluginId,
    /// `None` for platform-wide plugins.
    pub store_id: Option<StoreId>,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub version: String,
    pub author: Option<String>,
    pub is_public: bool,
    pub is_deprecated: bool,
    pub deprecation_reason: Option<String>,
    pub visibility: PluginVisibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A widget's stored source.
#[derive(Debug, Clone, Serialize)]
pub struct PluginWidget {
    pub id: PluginWidgetId,
    pub plugin_id: PluginId,
    pub widget_key: String,
    pub name: String,
    pub component_code: String,
    pub code_hash: String,
    pub config: Value,
}

/// An event listener or hook.
#[derive(Debug, Clone, Serialize)]
pub struct PluginHandler<Id> {
    pub id: Id,
    pub plugin_id: PluginId,
    pub name: String,
    pub handler_code: String,
    pub priority: i32,
    pub is_enabled: bool,
}

/// A plugin with all of its source.
#[derive(Debug, Clone, Serialize)]
pub struct PluginDetail {
    #[serde(flatten)]
    pub plugin: Plugin,
    pub widgets: Vec<PluginWidget>,
    pub event_listeners: Vec<PluginHandler<PluginEventListenerId>>,
    pub hooks: Vec<PluginHandler<PluginHookId>>,
}

/// A widget as served to storefronts.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PublicWidget {
    pub plugin_slug: String,
    pub widget_key: String,
    pub name: String,
    pub component_code: String,
    pub code_hash: String,
    pub config: Value,
}

/// One entry of a plugin's history.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PluginVersionHeader {
    pub id: PluginVersionId,
    pub plugin_id: PluginId,
    pub version_number: i32,
    pub kind: VersionKind,
    pub message: Option<String>,
    pub tag: Option<String>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// Request body for `PATCH /api/plugins/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub is_public: Option<bool>,
    #[serde(default)]
    pub is_deprecated: Option<bool>,
    #[serde(default)]
    pub deprecation_reason: Option<String>,
}

/// Request body for `PUT /api/plugins/{id}/widgets/{key}`.
#[derive(Debug, Clone, Deserialize)]
pub struct WidgetInput {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub config: Value,
}
