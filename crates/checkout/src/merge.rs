//! Guest-cart merge at login.

use std::collections::BTreeMap;
use std::sync::Arc;

use domain::{Aggregate, MergeReport, OwnerRef};
use serde::{Deserialize, Serialize};

use crate::cart_service::{CartService, CartSnapshot};
use crate::coordinator::CheckoutCoordinator;
use crate::error::{CheckoutError, Result};

/// What a merge did and the user's cart afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub report: MergeReport,
    pub cart: CartSnapshot,
}

/// Reconciles a guest cart into a user cart.
///
/// Both owners are locked in a fixed order for the whole merge, so a merge
/// never interleaves with edits to either cart. Merging is idempotent: once
/// the guest cart is merged it is no longer active and a repeat changes
/// nothing.
///
/// A guest cart frozen into a checkout session that reserved stock cannot
/// be merged; a Draft session of it is abandoned first.
pub struct CartMergeService {
    carts: Arc<CartService>,
    checkout: Arc<CheckoutCoordinator>,
}

impl CartMergeService {
    /// Creates a merge service over the cart service and the coordinator
    /// that owns the carts' checkout sessions.
    pub fn new(carts: Arc<CartService>, checkout: Arc<CheckoutCoordinator>) -> Self {
        Self { carts, checkout }
    }

    /// Folds the guest's active cart into the user's cart.
    ///
    /// Summed lines are capped by available stock but never drop below what
    /// the user already held. The guest cart ends up empty and marked merged.
    #[tracing::instrument(skip(self))]
    pub async fn merge(&self, guest: &OwnerRef, user: &OwnerRef) -> Result<MergeOutcome> {
        if !guest.is_guest() || user.is_guest() {
            return Err(CheckoutError::Validation(format!(
                "cannot merge {guest} into {user}: expected a guest and a user"
            )));
        }

        let _guards = self.carts.lock_owners([guest, user]).await;
        let env = self.carts.env();
        let now = env.clock.now();

        let guest_cart = match self.carts.active_cart(guest).await? {
            Some(cart) if !cart.aggregate.is_empty() || cart.aggregate.applied_coupon().is_some() => {
                cart
            }
            _ => return self.unchanged(user).await,
        };
        let guest_id = guest_cart
            .aggregate
            .id()
            .ok_or_else(|| CheckoutError::CartNotFound(guest.clone()))?;
        self.checkout.detach_cart(guest_id).await?;

        let user_cart = match self.carts.active_cart(user).await? {
            Some(cart) => cart,
            None => self.carts.open_cart(user, now).await?,
        };

        let mut available = BTreeMap::new();
        for line in guest_cart.aggregate.items() {
            if user_cart.aggregate.line(&line.key()).is_none() || available.contains_key(&line.sku)
            {
                continue;
            }
            if let Some(level) = env.ledger.level(&line.sku).await {
                available.insert(line.sku.clone(), level.available);
            }
        }

        let user_id = user_cart
            .aggregate
            .id()
            .ok_or_else(|| CheckoutError::CartNotFound(user.clone()))?;
        let (events, report) = user_cart
            .aggregate
            .absorb(&guest_cart.aggregate, &available, now)?;
        let merged = guest_cart.aggregate.mark_merged(user_id, now)?;

        let cart = self.carts.persist(user_cart, events).await?;
        self.carts.persist(guest_cart, merged).await?;
        self.carts.forget_owner(guest, guest_id).await;

        metrics::counter!("cart_mutations_total", "operation" => "merge").increment(1);
        tracing::info!(
            %guest_id,
            %user_id,
            merged = report.merged.len(),
            appended = report.appended.len(),
            clamped = report.clamped.len(),
            "guest cart merged"
        );

        Ok(MergeOutcome {
            report,
            cart: self.carts.snapshot_of(user, &cart).await?,
        })
    }

    async fn unchanged(&self, user: &OwnerRef) -> Result<MergeOutcome> {
        let cart = self.carts.cart_for(user).await?.unwrap_or_default();
        Ok(MergeOutcome {
            report: MergeReport::default(),
            cart: self.carts.snapshot_of(user, &cart).await?,
        })
    }
}
