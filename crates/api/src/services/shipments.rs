//! Shipments: carrier tracking feeds hanging off placed orders.
//!
//! A shipment snapshots the order data a carrier needs at creation time.
//! Delivery is the one operation that reaches back into the order, moving
//! it to DELIVERED through the same transition gate the order service uses.

use chrono::{DateTime, Utc};
use copperbay_core::{OrderStatus, ShipmentId, ShipmentStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::orders::transition;
use super::{Page, named_not_found};
use crate::error::{AppError, Result};
use crate::models::{
    Address, Dimensions, Order, PackageDetails, Shipment, ShipmentItem, TrackingEvent, User,
};
use crate::store::{
    Collection, DEFAULT_PAGE_SIZE, Filter, ListQuery, ResourceStore, Sort, WriteBatch,
};

pub struct ShipmentService<'a> {
    store: &'a dyn ResourceStore,
    shipments: Collection<'a, Shipment>,
    orders: Collection<'a, Order>,
    users: Collection<'a, User>,
}

#[derive(Debug, Deserialize)]
pub struct ShipmentDraft {
    pub order_id: String,
    pub carrier: String,
    #[serde(default)]
    pub service_level: Option<String>,
    /// Overrides the address resolved from the order's customer.
    #[serde(default)]
    pub shipping_address: Option<Address>,
    #[serde(default)]
    pub package_details: Option<PackageDetails>,
    #[serde(default)]
    pub cost: Option<Decimal>,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Carrier and package fields that may change after creation. Snapshots
/// (order number, address, items) and the event log are not touchable here.
#[derive(Debug, Default, Deserialize)]
pub struct ShipmentUpdate {
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub service_level: Option<String>,
    #[serde(default)]
    pub package_details: Option<PackageDetails>,
    #[serde(default)]
    pub cost: Option<Decimal>,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Query parameters for the shipment list endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ShipmentListParams {
    pub order_id: Option<String>,
    pub carrier: Option<String>,
    pub status: Option<ShipmentStatus>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Body for the tracking-event endpoint.
#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub status: ShipmentStatus,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

/// Body for the delivery endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct DeliveryRequest {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Customer-facing tracking summary. `status` reflects the latest scan
/// rather than the top-level shipment status, which only moves on
/// final-class events.
#[derive(Debug, Serialize)]
pub struct TrackingView {
    pub tracking_number: String,
    pub carrier: String,
    pub order_number: String,
    pub status: ShipmentStatus,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub actual_delivery: Option<DateTime<Utc>>,
    pub events: Vec<TrackingEvent>,
}

impl<'a> ShipmentService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn ResourceStore) -> Self {
        Self {
            store,
            shipments: Collection::new(store),
            orders: Collection::new(store),
            users: Collection::new(store),
        }
    }

    /// Create a shipment against an order, snapshotting the order number,
    /// shipping address and lines.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the order does not resolve, or
    /// `AppError::Validation` when the carrier is missing, the cost is
    /// negative, or no shipping address can be determined.
    #[instrument(skip(self, draft), fields(order_id = %draft.order_id))]
    pub async fn create(&self, draft: ShipmentDraft) -> Result<Shipment> {
        let mut errors = Vec::new();
        if draft.carrier.trim().is_empty() {
            errors.push("carrier is required".to_owned());
        }
        if let Some(cost) = draft.cost
            && cost < Decimal::ZERO
        {
            errors.push("cost must be non-negative".to_owned());
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let order = self
            .orders
            .require(&draft.order_id)
            .await
            .map_err(|e| named_not_found(e, "Order not found"))?;
        let shipping_address = match draft.shipping_address {
            Some(address) => address,
            None => self.resolve_address(&order).await?,
        };
        let items = order
            .items
            .iter()
            .map(|item| ShipmentItem {
                variant_id: item.variant_id.clone(),
                name: item.name.clone(),
                quantity: item.quantity,
                weight_kg: Decimal::ZERO,
                dimensions_cm: Dimensions::default(),
            })
            .collect();

        let now = Utc::now();
        let shipment = Shipment {
            id: ShipmentId::generate(),
            order_id: order.id.clone(),
            order_number: order.order_number.clone(),
            carrier: draft.carrier,
            service_level: draft.service_level,
            tracking_number: Shipment::generate_tracking_number(),
            status: ShipmentStatus::Pending,
            shipping_address,
            items,
            package_details: draft.package_details,
            cost: draft.cost,
            estimated_delivery: draft.estimated_delivery,
            actual_delivery: None,
            events: Vec::new(),
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        };
        self.shipments.insert(&shipment).await?;
        Ok(shipment)
    }

    /// Fetch one shipment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve.
    pub async fn get(&self, id: &str) -> Result<Shipment> {
        self.shipments
            .require(id)
            .await
            .map_err(|e| named_not_found(e, "Shipment not found"))
    }

    /// Fetch one shipment by its carrier tracking number.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no shipment carries the number.
    pub async fn by_tracking_number(&self, tracking_number: &str) -> Result<Shipment> {
        self.shipments
            .find_one(Filter::equals("tracking_number", tracking_number))
            .await?
            .ok_or_else(|| AppError::NotFound("Shipment not found".to_owned()))
    }

    /// List shipments, newest first, optionally narrowed by order, carrier
    /// or status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` on backend failure.
    pub async fn list(&self, params: &ShipmentListParams) -> Result<Page<Shipment>> {
        let mut query = ListQuery::new().sort(Sort::desc("created_at")).page(
            params.page.unwrap_or(1),
            params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        );
        if let Some(order_id) = &params.order_id {
            query = query.filter(Filter::equals("order_id", order_id.clone()));
        }
        if let Some(carrier) = &params.carrier {
            query = query.filter(Filter::equals("carrier", carrier.clone()));
        }
        if let Some(status) = params.status {
            query = query.filter(Filter::equals("status", serde_json::json!(status)));
        }

        let (items, total) = self.shipments.page(&query).await?;
        Ok(Page {
            items,
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    /// Update carrier and package fields.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve, or
    /// `AppError::Validation` for an empty carrier or negative cost.
    #[instrument(skip(self, update), fields(shipment_id = %id))]
    pub async fn update(&self, id: &str, update: ShipmentUpdate) -> Result<Shipment> {
        let mut errors = Vec::new();
        if let Some(carrier) = &update.carrier
            && carrier.trim().is_empty()
        {
            errors.push("carrier must not be empty".to_owned());
        }
        if let Some(cost) = update.cost
            && cost < Decimal::ZERO
        {
            errors.push("cost must be non-negative".to_owned());
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let mut shipment = self.get(id).await?;
        if let Some(carrier) = update.carrier {
            shipment.carrier = carrier;
        }
        if let Some(service_level) = update.service_level {
            shipment.service_level = Some(service_level);
        }
        if let Some(package_details) = update.package_details {
            shipment.package_details = Some(package_details);
        }
        if let Some(cost) = update.cost {
            shipment.cost = Some(cost);
        }
        if let Some(estimated_delivery) = update.estimated_delivery {
            shipment.estimated_delivery = Some(estimated_delivery);
        }
        if let Some(notes) = update.notes {
            shipment.notes = Some(notes);
        }
        shipment.updated_at = Utc::now();
        self.shipments.save(&shipment).await?;
        Ok(shipment)
    }

    /// Hard-delete a shipment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve.
    #[instrument(skip(self), fields(shipment_id = %id))]
    pub async fn delete(&self, id: &str) -> Result<()> {
        if self.shipments.remove(id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound("Shipment not found".to_owned()))
        }
    }

    /// Append one carrier scan to the event feed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve.
    #[instrument(skip(self, request), fields(shipment_id = %id, status = ?request.status))]
    pub async fn add_tracking_event(&self, id: &str, request: EventRequest) -> Result<Shipment> {
        let mut shipment = self.get(id).await?;
        shipment.record_event(
            request.status,
            request.location,
            request.description,
            request.details,
        );
        self.shipments.save(&shipment).await?;
        Ok(shipment)
    }

    /// Mark a shipment delivered and move the parent order to DELIVERED.
    ///
    /// The order write is skipped when the order already reads DELIVERED
    /// (one of several shipments got there first). Both writes go through
    /// one batch, so a rejected order transition leaves the shipment
    /// untouched as well.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve, or
    /// `AppError::InvalidState` when the parent order cannot move to
    /// DELIVERED from its current status.
    #[instrument(skip(self, request), fields(shipment_id = %id))]
    pub async fn mark_delivered(&self, id: &str, request: DeliveryRequest) -> Result<Shipment> {
        let mut shipment = self.get(id).await?;
        shipment.record_event(
            ShipmentStatus::Delivered,
            request.location,
            Some("Package delivered".to_owned()),
            request.notes,
        );
        shipment.actual_delivery = Some(Utc::now());

        let mut batch = WriteBatch::new();
        batch.replace(&shipment)?;
        if let Some(mut order) = self.orders.get(shipment.order_id.as_str()).await?
            && order.status != OrderStatus::Delivered
        {
            transition(
                &mut order,
                OrderStatus::Delivered,
                "system",
                "Package delivered".to_owned(),
            )?;
            batch.replace(&order)?;
        }
        self.store.apply(batch).await?;
        Ok(shipment)
    }

    /// Customer-facing tracking summary for one shipment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve.
    pub async fn tracking(&self, id: &str) -> Result<TrackingView> {
        let shipment = self.get(id).await?;
        let status = shipment
            .events
            .last()
            .map_or(shipment.status, |event| event.status);
        Ok(TrackingView {
            tracking_number: shipment.tracking_number,
            carrier: shipment.carrier,
            order_number: shipment.order_number,
            status,
            estimated_delivery: shipment.estimated_delivery,
            actual_delivery: shipment.actual_delivery,
            events: shipment.events,
        })
    }

    async fn resolve_address(&self, order: &Order) -> Result<Address> {
        self.users
            .get(order.user_id.as_str())
            .await?
            .and_then(|user| user.address(&order.shipping.recipient_address_id).cloned())
            .ok_or_else(|| {
                AppError::validation(
                    "shipping_address is required when the order's recipient address cannot be resolved",
                )
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use copperbay_core::{
        AddressId, CartId, CheckoutId, CheckoutStatus, CurrencyCode, Email, LoyaltyTier,
        PaymentMethodId, PaymentStatus, ProductId, UserId, VariantId,
    };

    use super::*;
    use crate::models::{CartItem, Checkout, CheckoutPayment, OrderReview, ShippingMethod};
    use crate::store::MemoryStore;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn address(id: &str) -> Address {
        Address {
            address_id: AddressId::new(id),
            label: Some("Home".into()),
            recipient: "Asha Rao".into(),
            line1: "1 Harbor Way".into(),
            line2: None,
            city: "Kochi".into(),
            state: Some("KL".into()),
            postal_code: "682001".into(),
            country: "IN".into(),
            preferred: true,
        }
    }

    async fn seed_user(store: &MemoryStore) -> User {
        let now = Utc::now();
        let user = User {
            id: UserId::new("user_1"),
            name: "Asha Rao".into(),
            email: Email::parse("asha@example.com").unwrap(),
            phone: None,
            loyalty_tier: LoyaltyTier::Bronze,
            loyalty_points: 0,
            addresses: vec![address("addr_1")],
            payment_methods: vec![],
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        Collection::<User>::new(store).insert(&user).await.unwrap();
        user
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
                status: PaymentStatus::Pending,
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

    fn draft(order_id: &str) -> ShipmentDraft {
        ShipmentDraft {
            order_id: order_id.to_owned(),
            carrier: "BlueDart".into(),
            service_level: Some("express".into()),
            shipping_address: None,
            package_details: None,
            cost: Some(dec("49.00")),
            estimated_delivery: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn create_snapshots_the_order_for_the_carrier() {
        let store = MemoryStore::new();
        let service = ShipmentService::new(&store);
        seed_user(&store).await;
        let order = seed_order(&store).await;

        let shipment = service.create(draft(order.id.as_str())).await.unwrap();

        assert_eq!(shipment.order_number, order.order_number);
        assert_eq!(shipment.shipping_address.line1, "1 Harbor Way");
        assert_eq!(shipment.items.len(), 1);
        assert_eq!(shipment.items[0].quantity, 2);
        assert_eq!(shipment.items[0].weight_kg, Decimal::ZERO);
        assert_eq!(shipment.status, ShipmentStatus::Pending);
        assert!(shipment.tracking_number.starts_with("TRK"));
        assert!(shipment.events.is_empty());
    }

    #[tokio::test]
    async fn create_needs_an_explicit_address_when_none_resolves() {
        let store = MemoryStore::new();
        let service = ShipmentService::new(&store);
        // No user seeded: the order's recipient address cannot be resolved.
        let order = seed_order(&store).await;

        let err = service.create(draft(order.id.as_str())).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut with_address = draft(order.id.as_str());
        with_address.shipping_address = Some(address("addr_override"));
        let shipment = service.create(with_address).await.unwrap();
        assert_eq!(
            shipment.shipping_address.address_id,
            AddressId::new("addr_override")
        );
    }

    #[tokio::test]
    async fn create_rejects_unknown_orders_and_bad_fields() {
        let store = MemoryStore::new();
        let service = ShipmentService::new(&store);

        let err = service.create(draft("ord_missing")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let mut bad = draft("ord_missing");
        bad.carrier = "  ".into();
        bad.cost = Some(dec("-1.00"));
        let err = service.create(bad).await.unwrap_err();
        match err {
            AppError::Validation(messages) => assert_eq!(messages.len(), 2),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn tracking_number_lookup_and_filtered_lists() {
        let store = MemoryStore::new();
        let service = ShipmentService::new(&store);
        seed_user(&store).await;
        let order = seed_order(&store).await;

        let first = service.create(draft(order.id.as_str())).await.unwrap();
        let mut second = draft(order.id.as_str());
        second.carrier = "Delhivery".into();
        service.create(second).await.unwrap();

        let found = service
            .by_tracking_number(&first.tracking_number)
            .await
            .unwrap();
        assert_eq!(found.id, first.id);

        let err = service.by_tracking_number("TRK0XXXXXX").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let page = service
            .list(&ShipmentListParams {
                carrier: Some("Delhivery".to_owned()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);

        let page = service
            .list(&ShipmentListParams {
                order_id: Some(order.id.as_str().to_owned()),
                status: Some(ShipmentStatus::Pending),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn update_leaves_snapshots_alone() {
        let store = MemoryStore::new();
        let service = ShipmentService::new(&store);
        seed_user(&store).await;
        let order = seed_order(&store).await;
        let shipment = service.create(draft(order.id.as_str())).await.unwrap();

        let updated = service
            .update(
                shipment.id.as_str(),
                ShipmentUpdate {
                    carrier: Some("Delhivery".to_owned()),
                    cost: Some(dec("55.00")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.carrier, "Delhivery");
        assert_eq!(updated.cost, Some(dec("55.00")));
        assert_eq!(updated.tracking_number, shipment.tracking_number);
        assert_eq!(updated.order_number, shipment.order_number);
    }

    #[tokio::test]
    async fn scans_append_without_moving_status_until_final_class() {
        let store = MemoryStore::new();
        let service = ShipmentService::new(&store);
        seed_user(&store).await;
        let order = seed_order(&store).await;
        let shipment = service.create(draft(order.id.as_str())).await.unwrap();
        let id = shipment.id.as_str();

        let shipment = service
            .add_tracking_event(
                id,
                EventRequest {
                    status: ShipmentStatus::InTransit,
                    location: Some("Mumbai hub".to_owned()),
                    description: Some("Departed facility".to_owned()),
                    details: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(shipment.status, ShipmentStatus::Pending);
        assert_eq!(shipment.events.len(), 1);

        // The tracking view surfaces the latest scan, not the top status.
        let view = service.tracking(id).await.unwrap();
        assert_eq!(view.status, ShipmentStatus::InTransit);

        let shipment = service
            .add_tracking_event(
                id,
                EventRequest {
                    status: ShipmentStatus::Exception,
                    location: None,
                    description: Some("Weather hold".to_owned()),
                    details: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(shipment.status, ShipmentStatus::Exception);
    }

    #[tokio::test]
    async fn delivery_drives_the_parent_order() {
        let store = MemoryStore::new();
        let service = ShipmentService::new(&store);
        seed_user(&store).await;
        let order = seed_order(&store).await;
        let shipment = service.create(draft(order.id.as_str())).await.unwrap();

        let shipment = service
            .mark_delivered(
                shipment.id.as_str(),
                DeliveryRequest {
                    location: Some("Front door".to_owned()),
                    notes: Some("Left with guard".to_owned()),
                },
            )
            .await
            .unwrap();
        assert_eq!(shipment.status, ShipmentStatus::Delivered);
        assert!(shipment.actual_delivery.is_some());
        let event = shipment.events.last().unwrap();
        assert_eq!(event.description.as_deref(), Some("Package delivered"));
        assert_eq!(event.details.as_deref(), Some("Left with guard"));

        let order = Collection::<Order>::new(&store)
            .require(order.id.as_str())
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(order.status_history.len(), 2);
        let entry = order.status_history.last().unwrap();
        assert_eq!(entry.note, "Package delivered");
        assert_eq!(entry.actor, "system");
    }

    #[tokio::test]
    async fn delivery_skips_orders_that_already_arrived() {
        let store = MemoryStore::new();
        let service = ShipmentService::new(&store);
        seed_user(&store).await;
        let mut order = seed_order(&store).await;
        order.record_status(OrderStatus::Delivered, "system", "Order delivered");
        Collection::<Order>::new(&store).save(&order).await.unwrap();

        let shipment = service.create(draft(order.id.as_str())).await.unwrap();
        service
            .mark_delivered(shipment.id.as_str(), DeliveryRequest::default())
            .await
            .unwrap();

        let order = Collection::<Order>::new(&store)
            .require(order.id.as_str())
            .await
            .unwrap();
        assert_eq!(order.status_history.len(), 2);
    }

    #[tokio::test]
    async fn delivery_aborts_whole_batch_on_an_unwilling_order() {
        let store = MemoryStore::new();
        let service = ShipmentService::new(&store);
        seed_user(&store).await;
        let mut order = seed_order(&store).await;
        let shipment = service.create(draft(order.id.as_str())).await.unwrap();

        order.record_status(OrderStatus::Cancelled, "system", "Customer request");
        Collection::<Order>::new(&store).save(&order).await.unwrap();

        let err = service
            .mark_delivered(shipment.id.as_str(), DeliveryRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        // Neither side moved.
        let shipment = service.get(shipment.id.as_str()).await.unwrap();
        assert_eq!(shipment.status, ShipmentStatus::Pending);
        assert!(shipment.events.is_empty());
    }

    #[tokio::test]
    async fn delete_is_hard() {
        let store = MemoryStore::new();
        let service = ShipmentService::new(&store);
        seed_user(&store).await;
        let order = seed_order(&store).await;
        let shipment = service.create(draft(order.id.as_str())).await.unwrap();

        service.delete(shipment.id.as_str()).await.unwrap();
        let err = service.get(shipment.id.as_str()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = service.delete(shipment.id.as_str()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
