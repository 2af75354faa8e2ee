//! Plugin registry repository.
//!
//! A plugin is a registry row plus its source rows: widgets, event
//! listeners and hooks. Source is stored as text with a SHA-256 per widget
//! and is never evaluated server-side.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};

use shopforge_core::plugins::{
    HandlerDefinition, PluginManifest, PluginSource, PluginVisibility, StoredHandler, code_hash,
};
use shopforge_core::{PluginEventListenerId, PluginHookId, PluginId, PluginWidgetId, StoreId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{
    Plugin, PluginDetail, PluginHandler, PluginUpdate, PluginWidget, PublicWidget, WidgetInput,
};

#[derive(Debug, sqlx::FromRow)]
struct PluginRow {
    id: PluginId,
    store_id: Option<StoreId>,
    slug: String,
    name: String,
    description: Option<String>,
    version: String,
    author: Option<String>,
    is_public: bool,
    is_deprecated: bool,
    deprecation_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PluginRow> for Plugin {
    fn from(row: PluginRow) -> Self {
        Self {
            id: row.id,
            store_id: row.store_id,
            slug: row.slug,
            name: row.name,
            description: row.description,
            version: row.version,
            author: row.author,
            is_public: row.is_public,
            is_deprecated: row.is_deprecated,
            deprecation_reason: row.deprecation_reason,
            visibility: PluginVisibility::from_flags(row.is_public, row.is_deprecated),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WidgetRow {
    id: PluginWidgetId,
    plugin_id: PluginId,
    widget_key: String,
    name: String,
    component_code: String,
    code_hash: String,
    config: Value,
}

impl From<WidgetRow> for PluginWidget {
    fn from(row: WidgetRow) -> Self {
        Self {
            id: row.id,
            plugin_id: row.plugin_id,
            widget_key: row.widget_key,
            name: row.name,
            component_code: row.component_code,
            code_hash: row.code_hash,
            config: row.config,
        }
    }
}

/// Listener and hook rows share a shape; `name` is `event_name` or `hook_name`.
#[derive(Debug, sqlx::FromRow)]
struct HandlerRow {
    id: i32,
    plugin_id: PluginId,
    name: String,
    handler_code: String,
    priority: i32,
    is_enabled: bool,
}

impl HandlerRow {
    fn into_handler<Id: From<i32>>(self) -> PluginHandler<Id> {
        PluginHandler {
            id: Id::from(self.id),
            plugin_id: self.plugin_id,
            name: self.name,
            handler_code: self.handler_code,
            priority: self.priority,
            is_enabled: self.is_enabled,
        }
    }

    fn into_stored(self) -> StoredHandler {
        StoredHandler {
            id: self.id,
            name: self.name,
            code: self.handler_code,
            priority: self.priority,
            is_enabled: self.is_enabled,
        }
    }
}

/// Which handler table a query targets.
#[derive(Debug, Clone, Copy)]
enum HandlerTable {
    Listeners,
    Hooks,
}

impl HandlerTable {
    const fn table(self) -> &'static str {
        match self {
            Self::Listeners => "plugin_event_listeners",
            Self::Hooks => "plugin_hooks",
        }
    }

    const fn name_column(self) -> &'static str {
        match self {
            Self::Listeners => "event_name",
            Self::Hooks => "hook_name",
        }
    }

    fn select(self) -> String {
        format!(
            r"
            SELECT id, plugin_id, {name} AS name, handler_code, priority, is_enabled
            FROM shopforge.{table}
            WHERE plugin_id = $1
            ORDER BY priority DESC, id
            ",
            name = self.name_column(),
            table = self.table(),
        )
    }

    fn insert(self) -> String {
        format!(
            r"
            INSERT INTO shopforge.{table} (plugin_id, {name}, handler_code, priority)
            VALUES ($1, $2, $3, $4)
            RETURNING id, plugin_id, {name} AS name, handler_code, priority, is_enabled
            ",
            name = self.name_column(),
            table = self.table(),
        )
    }
}

const PLUGIN_COLUMNS: &str = "id, store_id, slug, name, description, version, author, is_public, \
                              is_deprecated, deprecation_reason, created_at, updated_at";

const WIDGET_COLUMNS: &str = "id, plugin_id, widget_key, name, component_code, code_hash, config";

/// Repository for the plugin registry.
pub struct PluginRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PluginRepository<'a> {
    /// Create a new plugin repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Plugins a store can see: its own plus public platform plugins.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_store(&self, store_id: StoreId) -> Result<Vec<Plugin>, RepositoryError> {
        let rows = sqlx::query_as::<_, PluginRow>(&format!(
            r"
            SELECT {PLUGIN_COLUMNS}
            FROM shopforge.plugins
            WHERE store_id = $1 OR (store_id IS NULL AND is_public)
            ORDER BY name, id
            "
        ))
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a plugin by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such plugin exists.
    pub async fn get(&self, id: PluginId) -> Result<Plugin, RepositoryError> {
        let row = sqlx::query_as::<_, PluginRow>(&format!(
            "SELECT {PLUGIN_COLUMNS} FROM shopforge.plugins WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Get a plugin with its widgets, listeners and hooks.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such plugin exists.
    pub async fn get_detail(&self, id: PluginId) -> Result<PluginDetail, RepositoryError> {
        let plugin = self.get(id).await?;
        let widgets = self.widgets(id).await?;
        let event_listeners = self
            .handlers(id, HandlerTable::Listeners)
            .await?
            .into_iter()
            .map(HandlerRow::into_handler::<PluginEventListenerId>)
            .collect();
        let hooks = self
            .handlers(id, HandlerTable::Hooks)
            .await?
            .into_iter()
            .map(HandlerRow::into_handler::<PluginHookId>)
            .collect();

        Ok(PluginDetail {
            plugin,
            widgets: widgets.into_iter().map(Into::into).collect(),
            event_listeners,
            hooks,
        })
    }

    /// Register a plugin and all of its source in one transaction.
    ///
    /// `store_id` is `None` for platform plugins.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is already registered
    /// in the same scope.
    pub async fn create(
        &self,
        store_id: Option<StoreId>,
        manifest: &PluginManifest,
    ) -> Result<PluginDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, PluginRow>(&format!(
            r"
            INSERT INTO shopforge.plugins (store_id, slug, name, description, version, author)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PLUGIN_COLUMNS}
            "
        ))
        .bind(store_id)
        .bind(&manifest.slug)
        .bind(manifest.name.trim())
        .bind(&manifest.description)
        .bind(manifest.version.trim())
        .bind(&manifest.author)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "a plugin with this slug already exists"))?;

        let plugin_id = row.id;
        for widget in &manifest.widgets {
            insert_widget(
                &mut tx,
                plugin_id,
                &widget.key,
                &widget.name,
                &widget.code,
                &widget.config,
            )
            .await?;
        }
        for listener in &manifest.event_listeners {
            insert_handler(&mut tx, plugin_id, HandlerTable::Listeners, listener).await?;
        }
        for hook in &manifest.hooks {
            insert_handler(&mut tx, plugin_id, HandlerTable::Hooks, hook).await?;
        }

        tx.commit().await?;

        tracing::info!(plugin_id = %plugin_id, slug = %manifest.slug, "Registered plugin");

        self.get_detail(plugin_id).await
    }

    /// Update registry fields. Clearing `is_deprecated` also clears the reason.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such plugin exists.
    pub async fn update(
        &self,
        id: PluginId,
        update: &PluginUpdate,
    ) -> Result<Plugin, RepositoryError> {
        let row = sqlx::query_as::<_, PluginRow>(&format!(
            r"
            UPDATE shopforge.plugins
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                version = COALESCE($4, version),
                is_public = COALESCE($5, is_public),
                is_deprecated = COALESCE($6, is_deprecated),
                deprecation_reason = CASE
                    WHEN COALESCE($6, is_deprecated) THEN COALESCE($7, deprecation_reason)
                    ELSE NULL
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PLUGIN_COLUMNS}
            "
        ))
        .bind(id)
        .bind(update.name.as_deref().map(str::trim))
        .bind(&update.description)
        .bind(update.version.as_deref().map(str::trim))
        .bind(update.is_public)
        .bind(update.is_deprecated)
        .bind(&update.deprecation_reason)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a plugin and its source. History goes with it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: PluginId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shopforge.plugins WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Create or replace a widget's source.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert_widget(
        &self,
        plugin_id: PluginId,
        key: &str,
        input: &WidgetInput,
    ) -> Result<PluginWidget, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        touch(&mut tx, plugin_id).await?;
        let row = insert_widget(&mut tx, plugin_id, key, &input.name, &input.code, &input.config)
            .await?;
        tx.commit().await?;

        Ok(row.into())
    }

    /// Delete a widget. Returns `false` if the plugin has no such widget.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_widget(&self, plugin_id: PluginId, key: &str) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        touch(&mut tx, plugin_id).await?;
        let result =
            sqlx::query("DELETE FROM shopforge.plugin_widgets WHERE plugin_id = $1 AND widget_key = $2")
                .bind(plugin_id)
                .bind(key)
                .execute(&mut *tx)
                .await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    /// Add an event listener.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn add_listener(
        &self,
        plugin_id: PluginId,
        listener: &HandlerDefinition,
    ) -> Result<PluginHandler<PluginEventListenerId>, RepositoryError> {
        self.add_handler(plugin_id, HandlerTable::Listeners, listener)
            .await
            .map(HandlerRow::into_handler)
    }

    /// Add a hook.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn add_hook(
        &self,
        plugin_id: PluginId,
        hook: &HandlerDefinition,
    ) -> Result<PluginHandler<PluginHookId>, RepositoryError> {
        self.add_handler(plugin_id, HandlerTable::Hooks, hook)
            .await
            .map(HandlerRow::into_handler)
    }

    async fn add_handler(
        &self,
        plugin_id: PluginId,
        table: HandlerTable,
        handler: &HandlerDefinition,
    ) -> Result<HandlerRow, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        touch(&mut tx, plugin_id).await?;
        let row = insert_handler(&mut tx, plugin_id, table, handler).await?;
        tx.commit().await?;
        Ok(row)
    }

    /// The current source of a plugin, ready to be versioned.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such plugin exists.
    pub async fn load_source(&self, id: PluginId) -> Result<PluginSource, RepositoryError> {
        let plugin = self.get(id).await?;
        let widgets = self.widgets(id).await?;
        let listeners = self.handlers(id, HandlerTable::Listeners).await?;
        let hooks = self.handlers(id, HandlerTable::Hooks).await?;

        let manifest = PluginManifest {
            slug: plugin.slug,
            name: plugin.name,
            version: plugin.version,
            description: plugin.description,
            author: plugin.author,
            widgets: Vec::new(),
            event_listeners: Vec::new(),
            hooks: Vec::new(),
        };

        Ok(PluginSource {
            manifest: manifest.header(),
            widgets: widgets
                .into_iter()
                .map(|w| (w.widget_key, w.component_code))
                .collect(),
            listeners: listeners.into_iter().map(HandlerRow::into_stored).collect(),
            hooks: hooks.into_iter().map(HandlerRow::into_stored).collect(),
        })
    }

    /// Widgets a storefront may load: public, non-deprecated plugins that are
    /// either platform-wide or owned by the store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn public_widgets_for_store(
        &self,
        store_slug: &str,
    ) -> Result<Vec<PublicWidget>, RepositoryError> {
        let widgets = sqlx::query_as::<_, PublicWidget>(
            r"
            SELECT p.slug AS plugin_slug, w.widget_key, w.name, w.component_code,
                   w.code_hash, w.config
            FROM shopforge.plugin_widgets w
            JOIN shopforge.plugins p ON p.id = w.plugin_id
            JOIN shopforge.stores s ON s.slug = $1 AND s.is_active
            WHERE p.is_public
              AND NOT p.is_deprecated
              AND (p.store_id IS NULL OR p.store_id = s.id)
            ORDER BY p.slug, w.widget_key
            ",
        )
        .bind(store_slug)
        .fetch_all(self.pool)
        .await?;

        Ok(widgets)
    }

    async fn widgets(&self, plugin_id: PluginId) -> Result<Vec<WidgetRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, WidgetRow>(&format!(
            "SELECT {WIDGET_COLUMNS} FROM shopforge.plugin_widgets WHERE plugin_id = $1 ORDER BY widget_key"
        ))
        .bind(plugin_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    async fn handlers(
        &self,
        plugin_id: PluginId,
        table: HandlerTable,
    ) -> Result<Vec<HandlerRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, HandlerRow>(&table.select())
            .bind(plugin_id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows)
    }
}

async fn insert_widget(
    tx: &mut Transaction<'_, Postgres>,
    plugin_id: PluginId,
    key: &str,
    name: &str,
    code: &str,
    config: &Value,
) -> Result<WidgetRow, RepositoryError> {
    let config = if config.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        config.clone()
    };

    let row = sqlx::query_as::<_, WidgetRow>(&format!(
        r"
        INSERT INTO shopforge.plugin_widgets
            (plugin_id, widget_key, name, component_code, code_hash, config)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (plugin_id, widget_key) DO UPDATE
        SET name = EXCLUDED.name,
            component_code = EXCLUDED.component_code,
            code_hash = EXCLUDED.code_hash,
            config = EXCLUDED.config,
            updated_at = NOW()
        RETURNING {WIDGET_COLUMNS}
        "
    ))
    .bind(plugin_id)
    .bind(key)
    .bind(name.trim())
    .bind(code)
    .bind(code_hash(code))
    .bind(config)
    .fetch_one(&mut **tx)
    .await?;

    Ok(row)
}

async fn insert_handler(
    tx: &mut Transaction<'_, Postgres>,
    plugin_id: PluginId,
    table: HandlerTable,
    handler: &HandlerDefinition,
) -> Result<HandlerRow, RepositoryError> {
    let row = sqlx::query_as::<_, HandlerRow>(&table.insert())
        .bind(plugin_id)
        .bind(handler.name.trim())
        .bind(&handler.code)
        .bind(handler.priority)
        .fetch_one(&mut **tx)
        .await?;

    Ok(row)
}

/// Bump `updated_at`; `NotFound` if the plugin is gone.
async fn touch(tx: &mut Transaction<'_, Postgres>, plugin_id: PluginId) -> Result<(), RepositoryError> {
    let result = sqlx::query("UPDATE shopforge.plugins SET updated_at = NOW() WHERE id = $1")
        .bind(plugin_id)
        .execute(&mut **tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}
