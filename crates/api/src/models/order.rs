//! Placed orders.
//!
//! Orders are only ever created by completing a checkout and are never
//! hard-deleted. Status moves through the fulfillment pipeline
//! (`PLACED` → `CONFIRMED` → `PICKED` → `PACKED` → `SHIPPED` →
//! `OUT_FOR_DELIVERY` → `DELIVERED`) with cancellation and return branches;
//! every move appends exactly one [`StatusHistoryEntry`].

use chrono::{DateTime, Duration, Utc};
use copperbay_core::{AddressId, OrderId, OrderStatus, PaymentStatus, UserId, VariantId};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::checkout::Checkout;
use crate::store::Document;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub status_history: Vec<StatusHistoryEntry>,
    pub items: Vec<OrderItem>,
    pub fulfillment: Fulfillment,
    pub payment: OrderPayment,
    pub shipping: OrderShipping,
    pub totals: OrderTotals,
    #[serde(default)]
    pub refund_amount: Option<Decimal>,
    #[serde(default)]
    pub refund_reason: Option<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Assemble a new order from a completed checkout snapshot.
    ///
    /// `payment_method` is the instrument label (`"card"`, `"upi"`, ...)
    /// resolved from the customer's stored payment method.
    #[must_use]
    pub fn from_checkout(checkout: &Checkout, payment_method: &str) -> Self {
        let now = Utc::now();
        let review = &checkout.order_review;
        let items: Vec<OrderItem> = checkout
            .items
            .iter()
            .map(|line| OrderItem {
                variant_id: line.variant_id.clone(),
                name: line.name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                tax_amount: Decimal::ZERO,
                line_total: line.line_total,
            })
            .collect();

        let pick_list = items
            .iter()
            .map(|item| PickListItem {
                variant_id: item.variant_id.clone(),
                quantity: item.quantity,
                picked: false,
            })
            .collect();

        let transit_days = i64::from(checkout.shipping_method.carrier_estimated_days);
        let mut metadata = serde_json::Map::new();
        metadata.insert("source".to_owned(), JsonValue::String("web_checkout".to_owned()));

        Self {
            id: OrderId::generate(),
            order_number: Self::generate_order_number(),
            user_id: checkout.user_id.clone(),
            status: OrderStatus::Placed,
            status_history: vec![StatusHistoryEntry {
                status: OrderStatus::Placed,
                timestamp: now,
                actor: "system".to_owned(),
                note: format!("Order created from checkout {}", checkout.id),
            }],
            items,
            fulfillment: Fulfillment {
                fulfillment_id: internal_id("ful"),
                warehouse_id: "WH-DEL-1".to_owned(),
                fulfillment_type: "shipment".to_owned(),
                pick_list,
                packing: Packing::default(),
            },
            payment: OrderPayment {
                payment_id: internal_id("pay"),
                method: payment_method.to_owned(),
                gateway: checkout.payment.gateway.clone(),
                amount: review.total,
                currency: review.currency,
                status: PaymentStatus::Authorized,
                authorized_at: Some(now),
                captured_at: None,
                capture_attempts: 0,
            },
            shipping: OrderShipping {
                recipient_address_id: checkout.selected_shipping_address_id.clone(),
                shipping_method_id: checkout.shipping_method.id.clone(),
                shipping_cost: checkout.shipping_method.cost,
                carrier: None,
                tracking: OrderTracking::default(),
                estimated_delivery_window: DeliveryWindow {
                    start: now + Duration::days(transit_days),
                    end: now + Duration::days(transit_days + 1),
                },
            },
            totals: OrderTotals {
                subtotal: review.subtotal,
                discounts: review.discounts,
                taxes: review.taxes,
                shipping: review.shipping,
                grand_total: review.total,
                currency: review.currency,
            },
            refund_amount: None,
            refund_reason: None,
            notes: String::new(),
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// `ORD-{unix_millis}-{9 uppercase alphanumerics}`.
    #[must_use]
    pub fn generate_order_number() -> String {
        let millis = Utc::now().timestamp_millis();
        let suffix: String = rand::rng()
            .sample_iter(rand::distr::Alphanumeric)
            .take(9)
            .map(char::from)
            .collect::<String>()
            .to_uppercase();
        format!("ORD-{millis}-{suffix}")
    }

    /// Append one history entry and move to `status`. Callers validate the
    /// transition first.
    pub fn record_status(&mut self, status: OrderStatus, actor: &str, note: impl Into<String>) {
        let now = Utc::now();
        self.status_history.push(StatusHistoryEntry {
            status,
            timestamp: now,
            actor: actor.to_owned(),
            note: note.into(),
        });
        self.status = status;
        self.updated_at = now;
    }
}

impl Document for Order {
    const COLLECTION: &'static str = "orders";

    fn id(&self) -> &str {
        self.id.as_str()
    }
}

/// Embedded ids only need uniqueness within their parent document.
fn internal_id(prefix: &str) -> String {
    format!("{prefix}_{}", Utc::now().timestamp_millis())
}

/// One audit entry in the order's status history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub variant_id: VariantId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub tax_amount: Decimal,
    pub line_total: Decimal,
}

/// Warehouse-side fulfillment state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fulfillment {
    pub fulfillment_id: String,
    pub warehouse_id: String,
    pub fulfillment_type: String,
    pub pick_list: Vec<PickListItem>,
    pub packing: Packing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickListItem {
    pub variant_id: VariantId,
    pub quantity: u32,
    pub picked: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Packing {
    pub packed: bool,
    #[serde(default)]
    pub package_id: Option<String>,
    #[serde(default)]
    pub package_dimensions_cm: Option<super::product::Dimensions>,
}

/// Payment captured against this order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPayment {
    pub payment_id: String,
    pub method: String,
    pub gateway: String,
    pub amount: Decimal,
    pub currency: copperbay_core::CurrencyCode,
    pub status: PaymentStatus,
    #[serde(default)]
    pub authorized_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub capture_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderShipping {
    pub recipient_address_id: AddressId,
    pub shipping_method_id: String,
    pub shipping_cost: Decimal,
    #[serde(default)]
    pub carrier: Option<String>,
    pub tracking: OrderTracking,
    pub estimated_delivery_window: DeliveryWindow,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderTracking {
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actual_delivery: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeliveryWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discounts: Decimal,
    pub taxes: Decimal,
    pub shipping: Decimal,
    pub grand_total: Decimal,
    pub currency: copperbay_core::CurrencyCode,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use copperbay_core::{
        CartId, CheckoutId, CheckoutStatus, CurrencyCode, PaymentMethodId, ProductId,
    };

    use super::super::cart::CartItem;
    use super::super::checkout::{CheckoutPayment, OrderReview, ShippingMethod};
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn checkout() -> Checkout {
        let now = Utc::now();
        Checkout {
            id: CheckoutId::new("chk_1"),
            cart_id: CartId::new("cart_1"),
            user_id: UserId::new("user_1"),
            selected_shipping_address_id: AddressId::new("addr_1"),
            selected_billing_address_id: AddressId::new("addr_1"),
            shipping_method: ShippingMethod {
                id: "standard".into(),
                label: "Standard".into(),
                cost: dec("5.00"),
                carrier_estimated_days: 3,
            },
            payment: CheckoutPayment {
                selected_payment_id: PaymentMethodId::new("pm_1"),
                amount_authorized: dec("105.00"),
                currency: CurrencyCode::USD,
                status: PaymentStatus::Pending,
                gateway: "razorpay".into(),
                payment_intent_id: None,
            },
            items: vec![CartItem::new(
                ProductId::new("prod_1"),
                copperbay_core::VariantId::new("var_1"),
                "Widget".into(),
                2,
                dec("50.00"),
            )],
            order_review: OrderReview {
                subtotal: dec("100.00"),
                discounts: Decimal::ZERO,
                taxes: Decimal::ZERO,
                shipping: dec("5.00"),
                total: dec("105.00"),
                currency: CurrencyCode::USD,
            },
            status: CheckoutStatus::Pending,
            notes: None,
            transaction_id: None,
            placed_at: None,
            expires_at: Checkout::expiry_from(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn order_numbers_match_the_expected_shape() {
        let number = Order::generate_order_number();
        let mut parts = number.splitn(3, '-');
        assert_eq!(parts.next(), Some("ORD"));
        let millis = parts.next().unwrap();
        assert!(millis.parse::<i64>().is_ok());
        let suffix = parts.next().unwrap();
        assert_eq!(suffix.len(), 9);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn from_checkout_starts_placed_with_one_history_entry() {
        let order = Order::from_checkout(&checkout(), "card");

        assert_eq!(order.status, OrderStatus::Placed);
        assert_eq!(order.status_history.len(), 1);
        assert_eq!(order.status_history[0].actor, "system");
        assert!(order.status_history[0].note.contains("chk_1"));

        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].quantity, 2);
        assert_eq!(order.totals.grand_total, dec("105.00"));
        assert_eq!(order.payment.status, PaymentStatus::Authorized);
        assert_eq!(order.payment.method, "card");
        assert!(order.payment.authorized_at.is_some());

        assert_eq!(order.fulfillment.pick_list.len(), 1);
        assert!(!order.fulfillment.pick_list[0].picked);
        assert!(!order.fulfillment.packing.packed);

        let window = order.shipping.estimated_delivery_window;
        assert_eq!((window.end - window.start).num_days(), 1);
        assert_eq!(order.metadata["source"], serde_json::json!("web_checkout"));
    }

    #[test]
    fn record_status_appends_exactly_one_entry() {
        let mut order = Order::from_checkout(&checkout(), "card");
        order.record_status(OrderStatus::Confirmed, "system", "Payment verified");

        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.status_history.len(), 2);
        let last = order.status_history.last().unwrap();
        assert_eq!(last.status, OrderStatus::Confirmed);
        assert_eq!(last.note, "Payment verified");
    }
}
