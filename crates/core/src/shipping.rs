//! Shipping method rules and quoting.
//!
//! A shipping method's pricing rule is a tagged variant stored as JSON in
//! `shipping_methods.method`. Rate tables are half-open `[min, max)` ranges;
//! the last range may be unbounded.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CategoryId, CurrencyCode};

/// Errors from shipping rule validation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ShippingError {
    #[error("{field} must not be negative")]
    Negative { field: &'static str },
    #[error("range {index} has min >= max")]
    EmptyRange { index: usize },
    #[error("range {index} overlaps or is out of order with the previous range")]
    Overlap { index: usize },
    #[error("only the last range may be unbounded (range {index})")]
    UnboundedNotLast { index: usize },
    #[error("rate table must have at least one range")]
    NoRanges,
}

/// A rate applied when a measure falls in `[min, max)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateRange {
    pub min: Decimal,
    /// Exclusive upper bound; `None` means unbounded.
    #[serde(default)]
    pub max: Option<Decimal>,
    pub rate: Decimal,
}

impl RateRange {
    fn contains(&self, value: Decimal) -> bool {
        value >= self.min && self.max.is_none_or(|max| value < max)
    }
}

/// Pricing rule for a shipping method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShippingMethodKind {
    FlatRate {
        cost: Decimal,
    },
    FreeShipping {
        #[serde(default)]
        min_order_amount: Option<Decimal>,
    },
    WeightBased {
        ranges: Vec<RateRange>,
    },
    PriceBased {
        ranges: Vec<RateRange>,
    },
}

impl ShippingMethodKind {
    /// Check amounts and range tables.
    ///
    /// # Errors
    ///
    /// Returns `ShippingError` describing the first problem found.
    pub fn validate(&self) -> Result<(), ShippingError> {
        match self {
            Self::FlatRate { cost } => non_negative(*cost, "cost"),
            Self::FreeShipping { min_order_amount } => {
                min_order_amount.map_or(Ok(()), |m| non_negative(m, "min_order_amount"))
            }
            Self::WeightBased { ranges } | Self::PriceBased { ranges } => validate_ranges(ranges),
        }
    }

    /// Price this method for `cart`.
    ///
    /// Returns `Ok(None)` when the method does not apply to the cart.
    ///
    /// # Errors
    ///
    /// Returns `ShippingError` if the rule itself is invalid.
    pub fn quote(&self, cart: &ShippingCart) -> Result<Option<Decimal>, ShippingError> {
        self.validate()?;
        Ok(match self {
            Self::FlatRate { cost } => Some(*cost),
            Self::FreeShipping { min_order_amount } => match min_order_amount {
                Some(min) if cart.subtotal < *min => None,
                _ => Some(Decimal::ZERO),
            },
            Self::WeightBased { ranges } => rate_for(ranges, cart.total_weight),
            Self::PriceBased { ranges } => rate_for(ranges, cart.subtotal),
        })
    }
}

fn non_negative(value: Decimal, field: &'static str) -> Result<(), ShippingError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ShippingError::Negative { field });
    }
    Ok(())
}

fn validate_ranges(ranges: &[RateRange]) -> Result<(), ShippingError> {
    if ranges.is_empty() {
        return Err(ShippingError::NoRanges);
    }
    let mut previous_max: Option<Decimal> = None;
    for (index, range) in ranges.iter().enumerate() {
        non_negative(range.min, "min")?;
        non_negative(range.rate, "rate")?;
        match range.max {
            Some(max) if max <= range.min => return Err(ShippingError::EmptyRange { index }),
            None if index + 1 != ranges.len() => {
                return Err(ShippingError::UnboundedNotLast { index });
            }
            _ => {}
        }
        if let Some(prev) = previous_max
            && range.min < prev
        {
            return Err(ShippingError::Overlap { index });
        }
        previous_max = range.max;
    }
    Ok(())
}

fn rate_for(ranges: &[RateRange], value: Decimal) -> Option<Decimal> {
    ranges.iter().find(|r| r.contains(value)).map(|r| r.rate)
}

/// Restricts a method to carts containing matching items. Empty lists match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingConditions {
    #[serde(default)]
    pub categories: Vec<CategoryId>,
    #[serde(default)]
    pub attribute_sets: Vec<i32>,
    #[serde(default)]
    pub skus: Vec<String>,
}

impl ShippingConditions {
    /// Whether there are no restrictions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.attribute_sets.is_empty() && self.skus.is_empty()
    }

    /// Any item matching any listed category, attribute set, or sku satisfies the conditions.
    #[must_use]
    pub fn matches(&self, cart: &ShippingCart) -> bool {
        if self.is_empty() {
            return true;
        }
        cart.items.iter().any(|item| {
            self.skus.iter().any(|s| s == &item.sku)
                || item
                    .category_ids
                    .iter()
                    .any(|c| self.categories.contains(c))
                || item
                    .attribute_set_id
                    .is_some_and(|a| self.attribute_sets.contains(&a))
        })
    }
}

/// A cart line as seen by shipping rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub sku: String,
    #[serde(default)]
    pub category_ids: Vec<CategoryId>,
    #[serde(default)]
    pub attribute_set_id: Option<i32>,
}

/// The parts of a cart that shipping depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingCart {
    pub subtotal: Decimal,
    #[serde(default)]
    pub total_weight: Decimal,
    #[serde(default)]
    pub items: Vec<CartItem>,
    /// Currency the subtotal and quoted costs are in.
    #[serde(default)]
    pub currency: CurrencyCode,
}

/// Quote a method together with its conditions.
///
/// # Errors
///
/// Returns `ShippingError` if the rule is invalid.
pub fn quote_method(
    kind: &ShippingMethodKind,
    conditions: &ShippingConditions,
    cart: &ShippingCart,
) -> Result<Option<Decimal>, ShippingError> {
    if !conditions.matches(cart) {
        return Ok(None);
    }
    kind.quote(cart)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn cart(subtotal: &str, weight: &str) -> ShippingCart {
        ShippingCart {
            subtotal: dec(subtotal),
            total_weight: dec(weight),
            items: vec![CartItem {
                sku: "TEE-1".to_owned(),
                category_ids: vec![CategoryId::new(4)],
                attribute_set_id: Some(2),
            }],
            currency: CurrencyCode::USD,
        }
    }

    fn tiers() -> Vec<RateRange> {
        vec![
            RateRange {
                min: dec("0"),
                max: Some(dec("1")),
                rate: dec("4.99"),
            },
            RateRange {
                min: dec("1"),
                max: Some(dec("5")),
                rate: dec("9.99"),
            },
            RateRange {
                min: dec("5"),
                max: None,
                rate: dec("19.99"),
            },
        ]
    }

    #[test]
    fn test_deserialize_tagged_kind() {
        let kind: ShippingMethodKind =
            serde_json::from_value(json!({"type": "flat_rate", "cost": "5.00"})).unwrap();
        assert_eq!(kind, ShippingMethodKind::FlatRate { cost: dec("5.00") });

        let kind: ShippingMethodKind =
            serde_json::from_value(json!({"type": "free_shipping"})).unwrap();
        assert_eq!(
            kind,
            ShippingMethodKind::FreeShipping {
                min_order_amount: None
            }
        );

        assert!(serde_json::from_value::<ShippingMethodKind>(json!({"type": "teleport"})).is_err());
    }

    #[test]
    fn test_weight_ranges_are_half_open() {
        let kind = ShippingMethodKind::WeightBased { ranges: tiers() };
        assert_eq!(kind.quote(&cart("10", "0.5")).unwrap(), Some(dec("4.99")));
        assert_eq!(kind.quote(&cart("10", "1")).unwrap(), Some(dec("9.99")));
        assert_eq!(kind.quote(&cart("10", "4.999")).unwrap(), Some(dec("9.99")));
        assert_eq!(kind.quote(&cart("10", "500")).unwrap(), Some(dec("19.99")));
    }

    #[test]
    fn test_price_ranges_without_match() {
        let kind = ShippingMethodKind::PriceBased {
            ranges: vec![RateRange {
                min: dec("50"),
                max: Some(dec("100")),
                rate: dec("3"),
            }],
        };
        assert_eq!(kind.quote(&cart("20", "0")).unwrap(), None);
        assert_eq!(kind.quote(&cart("100", "0")).unwrap(), None);
        assert_eq!(kind.quote(&cart("75", "0")).unwrap(), Some(dec("3")));
    }

    #[test]
    fn test_free_shipping_threshold() {
        let kind = ShippingMethodKind::FreeShipping {
            min_order_amount: Some(dec("50")),
        };
        assert_eq!(kind.quote(&cart("49.99", "0")).unwrap(), None);
        assert_eq!(kind.quote(&cart("50", "0")).unwrap(), Some(Decimal::ZERO));
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            ShippingMethodKind::FlatRate { cost: dec("-1") }.validate(),
            Err(ShippingError::Negative { field: "cost" })
        );
        assert_eq!(
            ShippingMethodKind::WeightBased { ranges: vec![] }.validate(),
            Err(ShippingError::NoRanges)
        );

        let mut overlapping = tiers();
        overlapping[1].min = dec("0.5");
        assert_eq!(
            ShippingMethodKind::WeightBased {
                ranges: overlapping
            }
            .validate(),
            Err(ShippingError::Overlap { index: 1 })
        );

        let mut unbounded_middle = tiers();
        unbounded_middle[1].max = None;
        assert_eq!(
            ShippingMethodKind::PriceBased {
                ranges: unbounded_middle
            }
            .validate(),
            Err(ShippingError::UnboundedNotLast { index: 1 })
        );

        let mut inverted = tiers();
        inverted[0].max = Some(dec("0"));
        assert_eq!(
            ShippingMethodKind::PriceBased { ranges: inverted }.validate(),
            Err(ShippingError::EmptyRange { index: 0 })
        );
    }

    #[test]
    fn test_conditions() {
        let flat = ShippingMethodKind::FlatRate { cost: dec("5") };
        let none = ShippingConditions::default();
        assert_eq!(
            quote_method(&flat, &none, &cart("1", "1")).unwrap(),
            Some(dec("5"))
        );

        let other_category = ShippingConditions {
            categories: vec![CategoryId::new(99)],
            ..Default::default()
        };
        assert_eq!(
            quote_method(&flat, &other_category, &cart("1", "1")).unwrap(),
            None
        );

        let by_attribute_set = ShippingConditions {
            categories: vec![CategoryId::new(99)],
            attribute_sets: vec![2],
            ..Default::default()
        };
        assert!(by_attribute_set.matches(&cart("1", "1")));

        let by_sku = ShippingConditions {
            skus: vec!["TEE-1".to_owned()],
            ..Default::default()
        };
        assert!(by_sku.matches(&cart("1", "1")));
    }
}
