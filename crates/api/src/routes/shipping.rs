//! Shipping method handlers and cart quotes.

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use shopforge_core::{Money, ShippingMethodId};
use shopforge_core::shipping::{ShippingCart, quote_method};

use super::{ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult, deleted};
use crate::db::ShippingMethodRepository;
use crate::error::AppError;
use crate::middleware::{RequestLanguage, StoreContext};
use crate::models::{ShippingMethod, ShippingMethodInput, ShippingQuote};
use crate::state::AppState;

/// Build the shipping router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/shipping-methods", get(list_methods).post(create_method))
        .route("/shipping-methods/quote", post(quote))
        .route(
            "/shipping-methods/{id}",
            get(get_method).put(update_method).delete(delete_method),
        )
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub active_only: bool,
}

pub async fn list_methods(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Vec<ShippingMethod>> {
    let methods = ShippingMethodRepository::new(state.pool())
        .list(ctx.store_id(), query.active_only)
        .await?;
    Ok(ApiResponse::ok(methods))
}

#[instrument(skip_all, fields(store_id = %ctx.store_id()))]
pub async fn create_method(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ShippingMethodInput>,
) -> ApiResult<ShippingMethod> {
    body.validate().map_err(AppError::BadRequest)?;
    let method = ShippingMethodRepository::new(state.pool())
        .create(ctx.store_id(), &body)
        .await?;
    Ok(ApiResponse::created(method))
}

pub async fn get_method(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ShippingMethodId>,
) -> ApiResult<ShippingMethod> {
    let method = ShippingMethodRepository::new(state.pool())
        .get(ctx.store_id(), id)
        .await?;
    Ok(ApiResponse::ok(method))
}

#[instrument(skip_all, fields(store_id = %ctx.store_id(), method_id = %id))]
pub async fn update_method(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ShippingMethodId>,
    ApiJson(body): ApiJson<ShippingMethodInput>,
) -> ApiResult<ShippingMethod> {
    body.validate().map_err(AppError::BadRequest)?;
    let method = ShippingMethodRepository::new(state.pool())
        .update(ctx.store_id(), id, &body)
        .await?;
    Ok(ApiResponse::ok(method))
}

pub async fn delete_method(
    ctx: StoreContext,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ShippingMethodId>,
) -> ApiResult<Value> {
    let removed = ShippingMethodRepository::new(state.pool())
        .delete(ctx.store_id(), id)
        .await?;
    deleted(removed, &format!("shipping method {id}"))
}

/// Price every active method that applies to the cart, cheapest first.
///
/// Names are localized from `X-Language` (falling back to the store
/// default). A method whose stored rule no longer validates is skipped.
#[instrument(skip_all, fields(store_id = %ctx.store_id()))]
pub async fn quote(
    ctx: StoreContext,
    language: RequestLanguage,
    State(state): State<AppState>,
    ApiJson(cart): ApiJson<ShippingCart>,
) -> ApiResult<Vec<ShippingQuote>> {
    let repo = ShippingMethodRepository::new(state.pool());
    let methods = repo.list(ctx.store_id(), true).await?;
    let language = language.or_store_default(Some(&ctx.store));
    let mut names = repo.localized_names(ctx.store_id(), &language).await?;

    let quotes = build_quotes(&methods, &cart, |id| names.remove(&id));
    Ok(ApiResponse::ok(quotes))
}

fn build_quotes(
    methods: &[ShippingMethod],
    cart: &ShippingCart,
    mut localized: impl FnMut(ShippingMethodId) -> Option<String>,
) -> Vec<ShippingQuote> {
    let mut quotes: Vec<ShippingQuote> = methods
        .iter()
        .filter_map(|m| match quote_method(&m.method, &m.conditions, cart) {
            Ok(Some(cost)) => Some(ShippingQuote {
                method_id: m.id,
                name: localized(m.id).unwrap_or_else(|| m.name.clone()),
                cost: Money::new(cost, cart.currency),
            }),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(method_id = %m.id, error = %e, "Skipping invalid shipping method");
                None
            }
        })
        .collect();
    quotes.sort_by(|a, b| a.cost.amount.cmp(&b.cost.amount));
    quotes
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use serde_json::json;

    use shopforge_core::shipping::ShippingConditions;
    use shopforge_core::{CurrencyCode, StoreId};

    use super::*;

    fn method(id: i32, name: &str, kind: Value) -> ShippingMethod {
        ShippingMethod {
            id: ShippingMethodId::new(id),
            store_id: StoreId::new(1),
            name: name.to_owned(),
            is_active: true,
            sort_order: id,
            method: serde_json::from_value(kind).unwrap(),
            conditions: ShippingConditions::default(),
            translations: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_quotes_sorted_and_localized() {
        let methods = vec![
            method(1, "Express", json!({ "type": "flat_rate", "cost": "12.00" })),
            method(2, "Standard", json!({ "type": "flat_rate", "cost": "4.50" })),
        ];
        let cart = ShippingCart {
            subtotal: Decimal::new(3000, 2),
            total_weight: Decimal::ZERO,
            items: vec![],
            currency: CurrencyCode::EUR,
        };

        let quotes = build_quotes(&methods, &cart, |id| {
            (id == ShippingMethodId::new(2)).then(|| "Normal".to_owned())
        });

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].name, "Normal");
        assert_eq!(quotes[0].cost, Money::new(Decimal::new(450, 2), CurrencyCode::EUR));
        assert_eq!(quotes[0].cost.display(), "€4.50");
        assert_eq!(quotes[1].name, "Express");
    }
}
