//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use checkout::{CartSnapshot, MergeOutcome};
use domain::{CartError, LineKey, SkuId, VariantId};
use serde::Deserialize;

use super::AppState;
use super::identity::{self, GUEST_HEADER, Owner, USER_HEADER};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub sku: String,
    pub variant: Option<String>,
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct ApplyCouponRequest {
    pub code: String,
}

// -- Handlers --

/// GET /cart: the caller's cart with current totals.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> Result<Json<CartSnapshot>, ApiError> {
    Ok(Json(state.carts.snapshot(&owner).await?))
}

/// POST /cart/items: add a SKU, summing into an existing line.
#[tracing::instrument(skip(state, req))]
pub async fn add_item(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartSnapshot>, ApiError> {
    let sku = req.sku.trim();
    if sku.is_empty() || sku.contains(':') {
        return Err(ApiError::BadRequest(format!("Invalid sku: {:?}", req.sku)));
    }
    let quantity = u32::try_from(req.quantity)
        .ok()
        .filter(|q| *q > 0)
        .ok_or(CartError::InvalidQuantity {
            quantity: req.quantity,
        })
        .map_err(domain::DomainError::from)?;
    let variant = req
        .variant
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(VariantId::new);

    let snapshot = state
        .carts
        .add_item(&owner, SkuId::new(sku), variant, quantity)
        .await?;
    Ok(Json(snapshot))
}

/// PATCH /cart/items/{lineKey}: set a line's quantity; zero removes it.
#[tracing::instrument(skip(state, req))]
pub async fn update_quantity(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(line_key): Path<String>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Json<CartSnapshot>, ApiError> {
    let key = parse_line_key(&line_key)?;
    let snapshot = state
        .carts
        .update_quantity(&owner, &key, req.quantity)
        .await?;
    Ok(Json(snapshot))
}

/// DELETE /cart/items/{lineKey}: remove a line.
#[tracing::instrument(skip(state))]
pub async fn remove_item(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(line_key): Path<String>,
) -> Result<Json<CartSnapshot>, ApiError> {
    let key = parse_line_key(&line_key)?;
    Ok(Json(state.carts.remove_item(&owner, &key).await?))
}

/// DELETE /cart: remove every line and the coupon.
#[tracing::instrument(skip(state))]
pub async fn clear(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> Result<Json<CartSnapshot>, ApiError> {
    Ok(Json(state.carts.clear(&owner).await?))
}

/// PUT /cart/coupon: apply a coupon code.
#[tracing::instrument(skip(state, req))]
pub async fn apply_coupon(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Json(req): Json<ApplyCouponRequest>,
) -> Result<Json<CartSnapshot>, ApiError> {
    Ok(Json(state.carts.apply_coupon(&owner, req.code.trim()).await?))
}

/// DELETE /cart/coupon: drop the applied coupon.
#[tracing::instrument(skip(state))]
pub async fn remove_coupon(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> Result<Json<CartSnapshot>, ApiError> {
    Ok(Json(state.carts.remove_coupon(&owner).await?))
}

/// POST /cart/merge: fold the guest session's cart into the user's cart.
///
/// Needs both the user and the guest header.
#[tracing::instrument(skip(state, headers))]
pub async fn merge(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<MergeOutcome>, ApiError> {
    let (Some(user), Some(guest)) = (identity::user(&headers), identity::guest(&headers)) else {
        return Err(ApiError::BadRequest(format!(
            "Merge needs both {USER_HEADER} and {GUEST_HEADER} headers"
        )));
    };
    Ok(Json(state.merge.merge(&guest, &user).await?))
}

fn parse_line_key(raw: &str) -> Result<LineKey, ApiError> {
    Ok(raw.parse::<LineKey>().map_err(domain::DomainError::from)?)
}
