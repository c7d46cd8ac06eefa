//! Shopping carts with denormalized totals.
//!
//! Totals are stored on the document so reads never recompute. Every
//! mutation helper ends by calling [`Cart::recompute_totals`], which keeps
//! the invariant `cart_total = subtotal + taxes + shipping - discounts`.

use chrono::{DateTime, Duration, Utc};
use copperbay_core::{CartId, CartStatus, CurrencyCode, ProductId, UserId, VariantId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::store::Document;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub applied_coupons: Vec<AppliedCoupon>,
    pub estimated_taxes: Decimal,
    pub estimated_shipping: Decimal,
    pub currency: CurrencyCode,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub cart_total: Decimal,
    pub status: CartStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line in a cart. `line_total` is always `quantity * unit_price`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl CartItem {
    #[must_use]
    pub fn new(
        product_id: ProductId,
        variant_id: VariantId,
        name: String,
        quantity: u32,
        unit_price: Decimal,
    ) -> Self {
        Self {
            product_id,
            variant_id,
            name,
            quantity,
            unit_price,
            line_total: unit_price * Decimal::from(quantity),
        }
    }
}

/// A coupon applied to the cart as a flat amount off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedCoupon {
    pub code: String,
    pub amount: Decimal,
}

impl Cart {
    /// Carts expire 30 days after creation.
    pub const TTL_DAYS: i64 = 30;

    #[must_use]
    pub fn new(user_id: UserId, currency: CurrencyCode) -> Self {
        let now = Utc::now();
        Self {
            id: CartId::generate(),
            user_id,
            items: Vec::new(),
            applied_coupons: Vec::new(),
            estimated_taxes: Decimal::ZERO,
            estimated_shipping: Decimal::ZERO,
            currency,
            subtotal: Decimal::ZERO,
            discount_total: Decimal::ZERO,
            cart_total: Decimal::ZERO,
            status: CartStatus::Active,
            expires_at: now + Duration::days(Self::TTL_DAYS),
            created_at: now,
            updated_at: now,
        }
    }

    /// Recompute every derived total from the lines and coupons.
    pub fn recompute_totals(&mut self) {
        self.subtotal = self.items.iter().map(|item| item.line_total).sum();
        self.discount_total = self
            .applied_coupons
            .iter()
            .map(|coupon| coupon.amount)
            .sum();
        self.cart_total = self.subtotal + self.estimated_taxes + self.estimated_shipping
            - self.discount_total;
        self.updated_at = Utc::now();
    }

    /// Merge an item into the cart. An existing `(product_id, variant_id)`
    /// line grows by the incoming quantity at its stored unit price; a new
    /// pair appends a line.
    pub fn merge_item(&mut self, item: CartItem) {
        if let Some(line) = self
            .items
            .iter_mut()
            .find(|l| l.product_id == item.product_id && l.variant_id == item.variant_id)
        {
            line.quantity += item.quantity;
            line.line_total = line.unit_price * Decimal::from(line.quantity);
        } else {
            self.items.push(item);
        }
        self.recompute_totals();
    }

    /// Drop the line for `(product_id, variant_id)`, if present.
    pub fn remove_item(&mut self, product_id: &ProductId, variant_id: &VariantId) {
        self.items
            .retain(|l| !(l.product_id == *product_id && l.variant_id == *variant_id));
        self.recompute_totals();
    }

    /// Empty the cart: lines, coupons and estimates all reset.
    pub fn clear(&mut self) {
        self.items.clear();
        self.applied_coupons.clear();
        self.estimated_taxes = Decimal::ZERO;
        self.estimated_shipping = Decimal::ZERO;
        self.recompute_totals();
    }

    /// Replace any applied coupon with `code` for a flat `amount` off.
    pub fn apply_discount(&mut self, code: String, amount: Decimal) {
        self.applied_coupons = vec![AppliedCoupon { code, amount }];
        self.recompute_totals();
    }
}

impl Document for Cart {
    const COLLECTION: &'static str = "carts";

    fn id(&self) -> &str {
        self.id.as_str()
    }
}
