//! Order lifecycle: transitions, tracking, delivery and refunds.
//!
//! There is no create here. Orders enter the system through checkout
//! completion and only ever change by walking the status table; every
//! accepted move appends exactly one history entry.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use copperbay_core::{OrderStatus, PaymentStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{Page, collect_all, named_not_found};
use crate::error::{AppError, Result};
use crate::models::Order;
use crate::store::{Collection, DEFAULT_PAGE_SIZE, Filter, ListQuery, ResourceStore, Sort};

pub struct OrderService<'a> {
    orders: Collection<'a, Order>,
}

/// Body for the status endpoint. The actor defaults to `"system"`.
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
}

/// Body for the tracking endpoint.
#[derive(Debug, Deserialize)]
pub struct TrackingRequest {
    pub tracking_number: String,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
}

/// Body for the refund endpoint. The amount defaults to the order total.
#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    #[serde(default)]
    pub amount: Option<Decimal>,
    pub reason: String,
}

/// Query parameters for the order list endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct OrderListParams {
    pub user_id: Option<String>,
    pub status: Option<OrderStatus>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Aggregates across every order.
#[derive(Debug, Serialize)]
pub struct OrderStats {
    pub total_orders: u64,
    pub total_revenue: Decimal,
    pub average_order_value: Decimal,
    pub by_status: BTreeMap<String, u64>,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn ResourceStore) -> Self {
        Self {
            orders: Collection::new(store),
        }
    }

    /// Fetch one order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve.
    pub async fn get(&self, id: &str) -> Result<Order> {
        self.orders
            .require(id)
            .await
            .map_err(|e| named_not_found(e, "Order not found"))
    }

    /// Fetch one order by its customer-facing number.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no order carries the number.
    pub async fn by_number(&self, order_number: &str) -> Result<Order> {
        self.orders
            .find_one(Filter::equals("order_number", order_number))
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_owned()))
    }

    /// List orders, newest first, optionally narrowed by user or status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` on backend failure.
    pub async fn list(&self, params: &OrderListParams) -> Result<Page<Order>> {
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

        let (items, total) = self.orders.page(&query).await?;
        Ok(Page {
            items,
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    /// Move an order along the status table.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve, or
    /// `AppError::InvalidState` when the table forbids the move.
    #[instrument(skip(self, request), fields(order_id = %id, status = %request.status))]
    pub async fn update_status(&self, id: &str, request: StatusUpdateRequest) -> Result<Order> {
        let mut order = self.get(id).await?;
        let actor = request.actor.unwrap_or_else(|| "system".to_owned());
        transition(
            &mut order,
            request.status,
            &actor,
            request.note.unwrap_or_default(),
        )?;
        self.orders.save(&order).await?;
        Ok(order)
    }

    /// Cancel an order. Only permitted before fulfillment begins.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve, or
    /// `AppError::InvalidState` once the order is past CONFIRMED.
    #[instrument(skip(self, reason), fields(order_id = %id))]
    pub async fn cancel(&self, id: &str, reason: Option<String>) -> Result<Order> {
        let mut order = self.get(id).await?;
        transition(
            &mut order,
            OrderStatus::Cancelled,
            "system",
            reason.unwrap_or_else(|| "Customer request".to_owned()),
        )?;
        self.orders.save(&order).await?;
        Ok(order)
    }

    /// Record carrier tracking data. A CONFIRMED order additionally moves
    /// to SHIPPED; any other status keeps the fields without transitioning.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve, or
    /// `AppError::Validation` for an empty tracking number.
    #[instrument(skip(self, request), fields(order_id = %id))]
    pub async fn add_tracking(&self, id: &str, request: TrackingRequest) -> Result<Order> {
        if request.tracking_number.trim().is_empty() {
            return Err(AppError::validation("tracking_number is required"));
        }

        let mut order = self.get(id).await?;
        order.shipping.tracking.tracking_number = Some(request.tracking_number);
        order.shipping.tracking.estimated_delivery = request.estimated_delivery;
        if let Some(carrier) = request.carrier {
            order.shipping.tracking.carrier = Some(carrier.clone());
            order.shipping.carrier = Some(carrier);
        }

        if order.status == OrderStatus::Confirmed {
            transition(
                &mut order,
                OrderStatus::Shipped,
                "system",
                "Tracking number added".to_owned(),
            )?;
        } else {
            order.updated_at = Utc::now();
        }
        self.orders.save(&order).await?;
        Ok(order)
    }

    /// Mark an order delivered, stamping the actual delivery time.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve, or
    /// `AppError::InvalidState` when DELIVERED is not reachable from the
    /// current status.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn mark_delivered(&self, id: &str) -> Result<Order> {
        let mut order = self.get(id).await?;
        order.shipping.tracking.actual_delivery = Some(Utc::now());
        transition(
            &mut order,
            OrderStatus::Delivered,
            "system",
            "Order delivered".to_owned(),
        )?;
        self.orders.save(&order).await?;
        Ok(order)
    }

    /// Refund a returned order, recording the refund block.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve,
    /// `AppError::Validation` for a bad amount or empty reason, or
    /// `AppError::InvalidState` unless the order is RETURNED.
    #[instrument(skip(self, request), fields(order_id = %id))]
    pub async fn process_refund(&self, id: &str, request: RefundRequest) -> Result<Order> {
        let mut errors = Vec::new();
        if request.reason.trim().is_empty() {
            errors.push("reason is required".to_owned());
        }
        if let Some(amount) = request.amount
            && amount < Decimal::ZERO
        {
            errors.push("amount must be non-negative".to_owned());
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let mut order = self.get(id).await?;
        order.refund_amount = Some(request.amount.unwrap_or(order.totals.grand_total));
        order.refund_reason = Some(request.reason.clone());
        order.payment.status = PaymentStatus::Refunded;
        transition(
            &mut order,
            OrderStatus::Refunded,
            "system",
            format!("Refund processed: {}", request.reason),
        )?;
        self.orders.save(&order).await?;
        Ok(order)
    }

    /// Aggregate counts and revenue across every order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` on backend failure.
    pub async fn stats(&self) -> Result<OrderStats> {
        let orders = collect_all(&self.orders).await?;
        let total_orders = u64::try_from(orders.len()).unwrap_or(u64::MAX);
        let total_revenue: Decimal = orders.iter().map(|o| o.totals.grand_total).sum();
        let average_order_value = if total_orders == 0 {
            Decimal::ZERO
        } else {
            total_revenue / Decimal::from(total_orders)
        };
        let mut by_status: BTreeMap<String, u64> = BTreeMap::new();
        for order in &orders {
            *by_status.entry(order.status.to_string()).or_insert(0) += 1;
        }
        Ok(OrderStats {
            total_orders,
            total_revenue,
            average_order_value,
            by_status,
        })
    }
}

/// Validate and apply one status move: table check, fulfillment side
/// effects, exactly one history entry. Shared with the shipment service,
/// which delivers parent orders through the same gate.
pub(crate) fn transition(
    order: &mut Order,
    status: OrderStatus,
    actor: &str,
    note: String,
) -> Result<()> {
    if !order.status.can_transition_to(status) {
        return Err(AppError::InvalidState(format!(
            "Cannot transition from {} to {}",
            order.status, status
        )));
    }
    match status {
        OrderStatus::Picked => {
            for line in &mut order.fulfillment.pick_list {
                line.picked = true;
            }
        }
        OrderStatus::Packed => {
            order.fulfillment.packing.packed = true;
        }
        _ => {}
    }
    order.record_status(status, actor, note);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use copperbay_core::{
        AddressId, CartId, CheckoutId, CheckoutStatus, CurrencyCode, PaymentMethodId, ProductId,
        UserId, VariantId,
    };

    use super::*;
    use crate::models::{
        CartItem, Checkout, CheckoutPayment, OrderReview, ShippingMethod,
    };
    use crate::store::MemoryStore;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn checkout_fixture() -> Checkout {
        let now = Utc::now();
        Checkout {
            id: CheckoutId::generate(),
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
                status: copperbay_core::PaymentStatus::Pending,
                gateway: "razorpay".into(),
                payment_intent_id: None,
            },
            items: vec![CartItem::new(
                ProductId::new("prod_1"),
                VariantId::new("var_1"),
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

    async fn seed_order(store: &MemoryStore) -> Order {
        let order = Order::from_checkout(&checkout_fixture(), "card");
        Collection::<Order>::new(store).insert(&order).await.unwrap();
        order
    }

    fn status_update(status: OrderStatus) -> StatusUpdateRequest {
        StatusUpdateRequest {
            status,
            note: None,
            actor: None,
        }
    }

    #[tokio::test]
    async fn the_full_fulfillment_walk_appends_one_entry_per_move() {
        let store = MemoryStore::new();
        let service = OrderService::new(&store);
        let order = seed_order(&store).await;
        let id = order.id.as_str();

        for status in [
            OrderStatus::Confirmed,
            OrderStatus::Picked,
            OrderStatus::Packed,
            OrderStatus::Shipped,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
        ] {
            service.update_status(id, status_update(status)).await.unwrap();
        }

        let order = service.get(id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(order.status_history.len(), 7);
        assert!(order.fulfillment.pick_list.iter().all(|l| l.picked));
        assert!(order.fulfillment.packing.packed);
    }

    #[tokio::test]
    async fn forward_skips_are_legal_backward_moves_are_not() {
        let store = MemoryStore::new();
        let service = OrderService::new(&store);
        let order = seed_order(&store).await;
        let id = order.id.as_str();

        // PLACED straight to SHIPPED skips three states.
        let order = service
            .update_status(id, status_update(OrderStatus::Shipped))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);

        let err = service
            .update_status(id, status_update(OrderStatus::Confirmed))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let err = service
            .update_status(id, status_update(OrderStatus::Shipped))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn cancel_is_allowed_only_before_fulfillment() {
        let store = MemoryStore::new();
        let service = OrderService::new(&store);

        let order = seed_order(&store).await;
        let cancelled = service.cancel(order.id.as_str(), None).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.status_history.len(), 2);
        let last = cancelled.status_history.last().unwrap();
        assert_eq!(last.note, "Customer request");
        assert_eq!(last.actor, "system");

        let order = seed_order(&store).await;
        let id = order.id.as_str();
        service
            .update_status(id, status_update(OrderStatus::Shipped))
            .await
            .unwrap();
        let err = service.cancel(id, Some("Too late".into())).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        // The rejected cancel left no trace in the history.
        let order = service.get(id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.status_history.len(), 2);
    }

    #[tokio::test]
    async fn tracking_data_ships_confirmed_orders_only() {
        let store = MemoryStore::new();
        let service = OrderService::new(&store);
        let order = seed_order(&store).await;
        let id = order.id.as_str();

        // Still PLACED: fields land, status stays put.
        let order = service
            .add_tracking(
                id,
                TrackingRequest {
                    tracking_number: "TRK1".into(),
                    carrier: Some("BlueDart".into()),
                    estimated_delivery: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Placed);
        assert_eq!(order.status_history.len(), 1);
        assert_eq!(
            order.shipping.tracking.tracking_number.as_deref(),
            Some("TRK1")
        );
        assert_eq!(order.shipping.carrier.as_deref(), Some("BlueDart"));

        service
            .update_status(id, status_update(OrderStatus::Confirmed))
            .await
            .unwrap();
        let order = service
            .add_tracking(
                id,
                TrackingRequest {
                    tracking_number: "TRK2".into(),
                    carrier: None,
                    estimated_delivery: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);
        let last = order.status_history.last().unwrap();
        assert_eq!(last.note, "Tracking number added");
        assert_eq!(last.actor, "system");
    }

    #[tokio::test]
    async fn delivery_stamps_the_actual_time_once() {
        let store = MemoryStore::new();
        let service = OrderService::new(&store);
        let order = seed_order(&store).await;
        let id = order.id.as_str();

        service
            .update_status(id, status_update(OrderStatus::OutForDelivery))
            .await
            .unwrap();
        let order = service.mark_delivered(id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
        assert!(order.shipping.tracking.actual_delivery.is_some());
        assert_eq!(order.status_history.last().unwrap().note, "Order delivered");

        let err = service.mark_delivered(id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn refunds_require_the_return_flow() {
        let store = MemoryStore::new();
        let service = OrderService::new(&store);
        let order = seed_order(&store).await;
        let id = order.id.as_str();

        service
            .update_status(id, status_update(OrderStatus::Delivered))
            .await
            .unwrap();
        let err = service
            .process_refund(
                id,
                RefundRequest {
                    amount: None,
                    reason: "Damaged".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        service
            .update_status(id, status_update(OrderStatus::ReturnRequested))
            .await
            .unwrap();
        service
            .update_status(id, status_update(OrderStatus::Returned))
            .await
            .unwrap();

        let order = service
            .process_refund(
                id,
                RefundRequest {
                    amount: None,
                    reason: "Damaged".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Refunded);
        assert_eq!(order.refund_amount, Some(dec("105.00")));
        assert_eq!(order.refund_reason.as_deref(), Some("Damaged"));
        assert_eq!(order.payment.status, PaymentStatus::Refunded);
        assert_eq!(
            order.status_history.last().unwrap().note,
            "Refund processed: Damaged"
        );
    }

    #[tokio::test]
    async fn lookup_by_number_and_filtered_lists() {
        let store = MemoryStore::new();
        let service = OrderService::new(&store);
        let order = seed_order(&store).await;
        let other = seed_order(&store).await;
        service.cancel(other.id.as_str(), None).await.unwrap();

        let found = service.by_number(&order.order_number).await.unwrap();
        assert_eq!(found.id, order.id);

        let err = service.by_number("ORD-0-NOSUCHNUM").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let page = service
            .list(&OrderListParams {
                status: Some(OrderStatus::Placed),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, order.id);

        let page = service
            .list(&OrderListParams {
                user_id: Some("user_1".to_owned()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn stats_aggregate_revenue_and_status_counts() {
        let store = MemoryStore::new();
        let service = OrderService::new(&store);
        seed_order(&store).await;
        let other = seed_order(&store).await;
        service.cancel(other.id.as_str(), None).await.unwrap();

        let stats = service.stats().await.unwrap();
        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.total_revenue, dec("210.00"));
        assert_eq!(stats.average_order_value, dec("105.00"));
        assert_eq!(stats.by_status.get("PLACED"), Some(&1));
        assert_eq!(stats.by_status.get("CANCELLED"), Some(&1));
    }
}
