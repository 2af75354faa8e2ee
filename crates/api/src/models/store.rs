//! Stores (tenants).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use shopforge_core::{BillingStatus, LanguageCode, StoreId, UserId};

/// A tenant store.
#[derive(Debug, Clone, Serialize)]
pub struct Store {
    pub id: StoreId,
    pub owner_id: UserId,
    pub slug: String,
    pub name: String,
    pub default_language: LanguageCode,
    pub is_active: bool,
    pub settings: Value,
    pub billing_status: BillingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStore {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub default_language: Option<LanguageCode>,
    #[serde(default)]
    pub settings: Option<Value>,
}

impl NewStore {
    /// Validate the slug and name.
    ///
    /// # Errors
    ///
    /// Returns a message describing the invalid field.
    pub fn validate(&self) -> Result<(), String> {
        shopforge_core::plugins::validate_slug(&self.slug).map_err(|e| e.to_string())?;
        if self.name.trim().is_empty() {
            return Err("store name must not be empty".to_owned());
        }
        if let Some(settings) = &self.settings
            && !settings.is_object()
        {
            return Err("settings must be an object".to_owned());
        }
        Ok(())
    }
}

/// Request body for `PATCH /api/stores/{id}`. Absent fields are unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub settings: Option<Value>,
    #[serde(default)]
    pub default_language: Option<LanguageCode>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl StoreUpdate {
    /// Validate the provided fields.
    ///
    /// # Errors
    ///
    /// Returns a message describing the invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            return Err("store name must not be empty".to_owned());
        }
        if let Some(settings) = &self.settings
            && !settings.is_object()
        {
            return Err("settings must be an object".to_owned());
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_validation() {
        let store: NewStore =
            serde_json::from_value(serde_json::json!({"slug": "acme", "name": "Acme"})).unwrap();
        assert!(store.validate().is_ok());

        let bad_slug = NewStore {
            slug: "Acme Shop".to_owned(),
            ..store.clone()
        };
        assert!(bad_slug.validate().is_err());

        let bad_settings = NewStore {
            settings: Some(serde_json::json!([1, 2])),
            ..store
        };
        assert_eq!(
            bad_settings.validate(),
            Err("settings must be an object".to_owned())
        );
    }

    #[test]
    fn test_update_rejects_blank_name() {
        let update = StoreUpdate {
            name: Some("  ".to_owned()),
            ..StoreUpdate::default()
        };
        assert!(update.validate().is_err());
        assert!(StoreUpdate::default().validate().is_ok());
    }
}
