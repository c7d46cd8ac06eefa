//! Cart service: line mutations and derived totals.

use chrono::Utc;
use copperbay_core::{CartStatus, CurrencyCode, ProductId, VariantId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{Page, collect_all, named_not_found};
use crate::error::{AppError, Result};
use crate::models::{Cart, CartItem, Product, User};
use crate::store::{Collection, DEFAULT_PAGE_SIZE, Filter, ListQuery, ResourceStore, Sort};

/// Cart reads and mutations. Item lines resolve against the live catalog on
/// the way in; once stored they are plain snapshots. Only active carts
/// accept mutations.
pub struct CartService<'a> {
    carts: Collection<'a, Cart>,
    products: Collection<'a, Product>,
    users: Collection<'a, User>,
}

/// Client-settable fields for a new cart.
#[derive(Debug, Deserialize)]
pub struct CartDraft {
    pub user_id: String,
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
    #[serde(default)]
    pub items: Vec<CartItemDraft>,
}

/// One line to add. Name and default unit price come from the catalog, not
/// the client.
#[derive(Debug, Deserialize)]
pub struct CartItemDraft {
    pub product_id: String,
    pub variant_id: String,
    pub quantity: u32,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
}

/// Query parameters for the cart list endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct CartListParams {
    pub user_id: Option<String>,
    pub status: Option<CartStatus>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Body for the discount endpoint.
#[derive(Debug, Deserialize)]
pub struct DiscountRequest {
    pub code: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
}

/// Aggregates across every cart, active or not.
#[derive(Debug, Serialize)]
pub struct CartStats {
    pub total_carts: u64,
    pub active_carts: u64,
    pub total_cart_value: Decimal,
    pub average_cart_value: Decimal,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn ResourceStore) -> Self {
        Self {
            carts: Collection::new(store),
            products: Collection::new(store),
            users: Collection::new(store),
        }
    }

    /// Create a cart for a user, empty or pre-filled with catalog lines.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when the user (or any referenced
    /// product/variant) does not resolve, or `AppError::Validation` for a
    /// bad line.
    #[instrument(skip(self, draft), fields(user_id = %draft.user_id))]
    pub async fn create(&self, draft: CartDraft) -> Result<Cart> {
        let user = self
            .users
            .require(&draft.user_id)
            .await
            .map_err(|e| named_not_found(e, "User not found"))?;
        if !user.is_active {
            return Err(AppError::NotFound("User not found".to_owned()));
        }

        let mut cart = Cart::new(user.id, draft.currency.unwrap_or_default());
        for line in draft.items {
            let item = self.resolve_line(line).await?;
            cart.merge_item(item);
        }
        self.carts.insert(&cart).await?;
        Ok(cart)
    }

    /// Fetch one cart.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve.
    pub async fn get(&self, id: &str) -> Result<Cart> {
        self.carts
            .require(id)
            .await
            .map_err(|e| named_not_found(e, "Cart not found"))
    }

    /// List carts, newest first, optionally narrowed by user or status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` on backend failure.
    pub async fn list(&self, params: &CartListParams) -> Result<Page<Cart>> {
        let mut query = ListQuery::new().sort(Sort::desc("created_at")).page(
            params.page.unwrap_or(1),
            params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        );
        if let Some(user_id) = &params.user_id {
            query = query.filter(Filter::equals("user_id", user_id.clone()));
        }
        if let Some(status) = params.status {
            query = query.filter(Filter::equals("status", serde_json::json!(status)));
        }

        let (items, total) = self.carts.page(&query).await?;
        Ok(Page {
            items,
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    /// The user's single active cart.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when the user has no active cart.
    pub async fn active_for_user(&self, user_id: &str) -> Result<Cart> {
        let query = ListQuery::new()
            .filter(Filter::equals("user_id", user_id))
            .filter(Filter::equals("status", serde_json::json!(CartStatus::Active)))
            .sort(Sort::desc("created_at"))
            .page(1, 1);
        let (mut items, _) = self.carts.page(&query).await?;
        items
            .pop()
            .ok_or_else(|| AppError::NotFound("No active cart found for user".to_owned()))
    }

    /// Abandon a cart. The document stays readable; only its status moves.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve.
    #[instrument(skip(self), fields(cart_id = %id))]
    pub async fn abandon(&self, id: &str) -> Result<Cart> {
        let mut cart = self.get(id).await?;
        cart.status = CartStatus::Abandoned;
        cart.updated_at = Utc::now();
        self.carts.save(&cart).await?;
        Ok(cart)
    }

    /// Add a line, merging with an existing `(product, variant)` pair.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when the cart, product or variant is
    /// missing (or the product inactive), `AppError::InvalidState` when the
    /// cart is not active, or `AppError::Validation` for a bad line.
    #[instrument(skip(self, draft), fields(cart_id = %id))]
    pub async fn add_item(&self, id: &str, draft: CartItemDraft) -> Result<Cart> {
        let item = self.resolve_line(draft).await?;

        let mut cart = self.get(id).await?;
        ensure_mutable(&cart)?;
        cart.merge_item(item);
        self.carts.save(&cart).await?;
        Ok(cart)
    }

    /// Drop the line for `(product_id, variant_id)`. Removing an absent
    /// pair is a no-op, not an error.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the cart does not resolve, or
    /// `AppError::InvalidState` when it is not active.
    #[instrument(skip(self), fields(cart_id = %id))]
    pub async fn remove_item(&self, id: &str, product_id: &str, variant_id: &str) -> Result<Cart> {
        let mut cart = self.get(id).await?;
        ensure_mutable(&cart)?;
        cart.remove_item(&ProductId::new(product_id), &VariantId::new(variant_id));
        self.carts.save(&cart).await?;
        Ok(cart)
    }

    /// Empty the cart: lines, coupons and estimates all reset.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the cart does not resolve, or
    /// `AppError::InvalidState` when it is not active.
    #[instrument(skip(self), fields(cart_id = %id))]
    pub async fn clear(&self, id: &str) -> Result<Cart> {
        let mut cart = self.get(id).await?;
        ensure_mutable(&cart)?;
        cart.clear();
        self.carts.save(&cart).await?;
        Ok(cart)
    }

    /// Apply a flat-amount coupon, replacing any previous one. No coupon
    /// business rules are checked beyond a non-negative amount.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for an empty code or negative amount,
    /// `AppError::NotFound` if the cart does not resolve, or
    /// `AppError::InvalidState` when it is not active.
    #[instrument(skip(self, request), fields(cart_id = %id))]
    pub async fn apply_discount(&self, id: &str, request: DiscountRequest) -> Result<Cart> {
        let amount = request.amount.unwrap_or(Decimal::ZERO);
        let mut errors = Vec::new();
        if request.code.trim().is_empty() {
            errors.push("code is required".to_owned());
        }
        if amount < Decimal::ZERO {
            errors.push("amount must be non-negative".to_owned());
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let mut cart = self.get(id).await?;
        ensure_mutable(&cart)?;
        cart.apply_discount(request.code, amount);
        self.carts.save(&cart).await?;
        Ok(cart)
    }

    /// Aggregate counts and totals across every cart.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` on backend failure.
    pub async fn stats(&self) -> Result<CartStats> {
        let carts = collect_all(&self.carts).await?;
        let total_carts = u64::try_from(carts.len()).unwrap_or(u64::MAX);
        let active_carts = u64::try_from(
            carts
                .iter()
                .filter(|c| c.status == CartStatus::Active)
                .count(),
        )
        .unwrap_or(u64::MAX);
        let total_cart_value: Decimal = carts.iter().map(|c| c.cart_total).sum();
        let average_cart_value = if total_carts == 0 {
            Decimal::ZERO
        } else {
            total_cart_value / Decimal::from(total_carts)
        };
        Ok(CartStats {
            total_carts,
            active_carts,
            total_cart_value,
            average_cart_value,
        })
    }

    /// Resolve an item draft against the live catalog. The stored name comes
    /// from the product; the unit price defaults to the variant's effective
    /// price.
    async fn resolve_line(&self, draft: CartItemDraft) -> Result<CartItem> {
        let mut errors = Vec::new();
        if draft.quantity == 0 {
            errors.push("quantity must be at least 1".to_owned());
        }
        if let Some(price) = draft.unit_price
            && price < Decimal::ZERO
        {
            errors.push("unit_price must be non-negative".to_owned());
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let product = self
            .products
            .require(&draft.product_id)
            .await
            .map_err(|e| named_not_found(e, "Product not found"))?;
        if !product.is_active {
            return Err(AppError::NotFound("Product not found".to_owned()));
        }
        let variant_id = VariantId::new(draft.variant_id);
        let Some(variant) = product.variant(&variant_id) else {
            return Err(AppError::NotFound("Variant not found".to_owned()));
        };
        let unit_price = draft
            .unit_price
            .unwrap_or_else(|| variant.price.effective_amount());

        Ok(CartItem::new(
            product.id.clone(),
            variant_id,
            product.name.clone(),
            draft.quantity,
            unit_price,
        ))
    }
}

/// Carts accept mutations only while active.
fn ensure_mutable(cart: &Cart) -> Result<()> {
    if cart.status == CartStatus::Active {
        Ok(())
    } else {
        Err(AppError::InvalidState("Cart is not active".to_owned()))
    }
}
