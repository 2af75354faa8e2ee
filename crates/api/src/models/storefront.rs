//! Store configuration resources: shipping methods, product labels, PDF templates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use shopforge_core::shipping::{ShippingConditions, ShippingMethodKind};
use shopforge_core::{Money, PdfTemplateId, ProductLabelId, ShippingMethodId, StoreId};

// =============================================================================
// Shipping
// =============================================================================

/// A store's shipping method.
#[derive(Debug, Clone, Serialize)]
pub struct ShippingMethod {
    pub id: ShippingMethodId,
    pub store_id: StoreId,
    pub name: String,
    pub is_active: bool,
    pub sort_order: i32,
    pub method: ShippingMethodKind,
    pub conditions: ShippingConditions,
    pub translations: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating or replacing a shipping method.
#[derive(Debug, Clone, Deserialize)]
pub struct ShippingMethodInput {
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub sort_order: i32,
    pub method: ShippingMethodKind,
    #[serde(default)]
    pub conditions: ShippingConditions,
    #[serde(default)]
    pub translations: Option<Value>,
}

impl ShippingMethodInput {
    /// Validate the name and pricing rule.
    ///
    /// # Errors
    ///
    /// Returns a message describing the problem.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("shipping method name must not be empty".to_owned());
        }
        self.method.validate().map_err(|e| e.to_string())
    }
}

/// One applicable method's price for a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShippingQuote {
    pub method_id: ShippingMethodId,
    pub name: String,
    pub cost: Money,
}

// =============================================================================
// Product labels
// =============================================================================

/// Corner of the product image a label is drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelPosition {
    #[default]
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl LabelPosition {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TopLeft => "top_left",
            Self::TopRight => "top_right",
            Self::BottomLeft => "bottom_left",
            Self::BottomRight => "bottom_right",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "top_left" => Some(Self::TopLeft),
            "top_right" => Some(Self::TopRight),
            "bottom_left" => Some(Self::BottomLeft),
            "bottom_right" => Some(Self::BottomRight),
            _ => None,
        }
    }
}

/// A badge shown on matching products ("Sale", "New").
#[derive(Debug, Clone, Serialize)]
pub struct ProductLabel {
    pub id: ProductLabelId,
    pub store_id: StoreId,
    pub name: String,
    pub text: String,
    pub color: String,
    pub background_color: String,
    pub position: LabelPosition,
    pub priority: i32,
    pub is_active: bool,
    pub conditions: Value,
}

/// Request body for creating or replacing a product label.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductLabelInput {
    pub name: String,
    pub text: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_background")]
    pub background_color: String,
    #[serde(default)]
    pub position: LabelPosition,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "empty_object")]
    pub conditions: Value,
}

impl ProductLabelInput {
    /// Validate text and colors.
    ///
    /// # Errors
    ///
    /// Returns a message describing the problem.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() || self.text.trim().is_empty() {
            return Err("label name and text must not be empty".to_owned());
        }
        for color in [&self.color, &self.background_color] {
            if !is_hex_color(color) {
                return Err(format!("invalid color '{color}': expected #rgb or #rrggbb"));
            }
        }
        if !self.conditions.is_object() {
            return Err("conditions must be an object".to_owned());
        }
        Ok(())
    }
}

fn is_hex_color(s: &str) -> bool {
    s.strip_prefix('#').is_some_and(|hex| {
        matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
    })
}

// =============================================================================
// PDF templates
// =============================================================================

/// Document a PDF template renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfTemplateType {
    Invoice,
    PackingSlip,
    CreditMemo,
}

impl PdfTemplateType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::PackingSlip => "packing_slip",
            Self::CreditMemo => "credit_memo",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "invoice" => Some(Self::Invoice),
            "packing_slip" => Some(Self::PackingSlip),
            "credit_memo" => Some(Self::CreditMemo),
            _ => None,
        }
    }
}

/// An HTML template used to render order documents.
#[derive(Debug, Clone, Serialize)]
pub struct PdfTemplate {
    pub id: PdfTemplateId,
    pub store_id: StoreId,
    pub template_type: PdfTemplateType,
    pub name: String,
    pub html_template: String,
    pub settings: Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating or replacing a PDF template.
#[derive(Debug, Clone, Deserialize)]
pub struct PdfTemplateInput {
    pub template_type: PdfTemplateType,
    pub name: String,
    pub html_template: String,
    #[serde(default = "empty_object")]
    pub settings: Value,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl PdfTemplateInput {
    /// Validate name, body and settings.
    ///
    /// # Errors
    ///
    /// Returns a message describing the problem.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("template name must not be empty".to_owned());
        }
        if self.html_template.trim().is_empty() {
            return Err("html_template must not be empty".to_owned());
        }
        if !self.settings.is_object() {
            return Err("settings must be an object".to_owned());
        }
        Ok(())
    }
}

const fn default_true() -> bool {
    true
}

fn default_color() -> String {
    "#ffffff".to_owned()
}

fn default_background() -> String {
    "#000000".to_owned()
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_shipping_input_defaults_and_validation() {
        let input: ShippingMethodInput = serde_json::from_value(json!({
            "name": "Standard",
            "method": {"type": "flat_rate", "cost": "4.95"}
        }))
        .unwrap();
        assert!(input.is_active);
        assert_eq!(input.sort_order, 0);
        assert!(input.conditions.is_empty());
        assert!(input.validate().is_ok());

        let negative: ShippingMethodInput = serde_json::from_value(json!({
            "name": "Broken",
            "method": {"type": "flat_rate", "cost": "-1"}
        }))
        .unwrap();
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_label_colors() {
        let mut input: ProductLabelInput =
            serde_json::from_value(json!({"name": "sale", "text": "Sale!"})).unwrap();
        assert_eq!(input.position, LabelPosition::TopLeft);
        assert!(input.validate().is_ok());

        input.color = "red".to_owned();
        assert!(input.validate().is_err());
        input.color = "#F0a".to_owned();
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_text_enums_parse_their_own_output() {
        for position in [
            LabelPosition::TopLeft,
            LabelPosition::TopRight,
            LabelPosition::BottomLeft,
            LabelPosition::BottomRight,
        ] {
            assert_eq!(LabelPosition::parse(position.as_str()), Some(position));
        }
        assert_eq!(
            PdfTemplateType::parse("packing_slip"),
            Some(PdfTemplateType::PackingSlip)
        );
        assert_eq!(PdfTemplateType::parse("receipt"), None);
    }

    #[test]
    fn test_pdf_template_requires_body() {
        let input: PdfTemplateInput = serde_json::from_value(json!({
            "template_type": "invoice",
            "name": "Default",
            "html_template": " "
        }))
        .unwrap();
        assert_eq!(
            input.validate(),
            Err("html_template must not be empty".to_owned())
        );
    }
}
