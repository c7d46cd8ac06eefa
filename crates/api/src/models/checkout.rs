//! Checkout sessions.
//!
//! A checkout freezes one cart into an immutable snapshot (lines plus an
//! order review of the totals) while the customer picks addresses, a
//! shipping method and a payment instrument. Completing it places an order;
//! abandoned sessions expire and are swept by the cleanup endpoint.

use chrono::{DateTime, Duration, Utc};
use copperbay_core::{
    AddressId, CartId, CheckoutId, CheckoutStatus, CurrencyCode, PaymentMethodId, PaymentStatus,
    UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::cart::CartItem;
use crate::store::Document;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkout {
    pub id: CheckoutId,
    pub cart_id: CartId,
    pub user_id: UserId,
    pub selected_shipping_address_id: AddressId,
    pub selected_billing_address_id: AddressId,
    pub shipping_method: ShippingMethod,
    pub payment: CheckoutPayment,
    /// Cart lines frozen at checkout creation. Later cart edits do not
    /// bleed into this snapshot.
    pub items: Vec<CartItem>,
    pub order_review: OrderReview,
    pub status: CheckoutStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub placed_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checkout {
    /// Pending checkouts expire 15 minutes after creation.
    pub const TTL_MINUTES: i64 = 15;

    #[must_use]
    pub fn expiry_from(now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::minutes(Self::TTL_MINUTES)
    }
}

impl Document for Checkout {
    const COLLECTION: &'static str = "checkouts";

    fn id(&self) -> &str {
        self.id.as_str()
    }
}

/// The shipping option selected for this checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingMethod {
    pub id: String,
    pub label: String,
    pub cost: Decimal,
    pub carrier_estimated_days: u32,
}

/// Payment selection and authorization state for a checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutPayment {
    pub selected_payment_id: PaymentMethodId,
    pub amount_authorized: Decimal,
    pub currency: CurrencyCode,
    pub status: PaymentStatus,
    pub gateway: String,
    #[serde(default)]
    pub payment_intent_id: Option<String>,
}

/// Totals shown to the customer before placing the order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReview {
    pub subtotal: Decimal,
    pub discounts: Decimal,
    pub taxes: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub currency: CurrencyCode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_fifteen_minutes_out() {
        let now = Utc::now();
        let expires = Checkout::expiry_from(now);
        assert_eq!((expires - now).num_minutes(), Checkout::TTL_MINUTES);
    }
}
