//! Checkout lifecycle: snapshot, complete, fail, cancel, expiry sweep.
//!
//! Completion is the only place orders are created. The checkout update,
//! the order insert and the cart conversion go through one write batch so
//! a failure leaves no half-placed order behind.

use chrono::Utc;
use copperbay_core::{
    AddressId, CartStatus, CheckoutId, CheckoutStatus, OrderId, OrderStatus, PaymentMethodId,
    PaymentStatus,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{Page, named_not_found};
use crate::error::{AppError, Result};
use crate::models::{Cart, Checkout, CheckoutPayment, Order, OrderReview, ShippingMethod, User};
use crate::store::{Collection, DEFAULT_PAGE_SIZE, Filter, ListQuery, ResourceStore, Sort, WriteBatch};

pub struct CheckoutService<'a> {
    store: &'a dyn ResourceStore,
    checkouts: Collection<'a, Checkout>,
    carts: Collection<'a, Cart>,
    users: Collection<'a, User>,
}

/// Client-settable fields for a new checkout session.
#[derive(Debug, Deserialize)]
pub struct CheckoutDraft {
    pub user_id: String,
    pub cart_id: String,
    pub shipping_address_id: String,
    /// Defaults to the shipping address when absent.
    #[serde(default)]
    pub billing_address_id: Option<String>,
    pub shipping_method: ShippingMethod,
    pub payment: PaymentSelection,
}

/// The payment instrument picked for this checkout.
#[derive(Debug, Deserialize)]
pub struct PaymentSelection {
    pub payment_method_id: String,
    pub gateway: String,
}

/// Query parameters for the checkout list endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutListParams {
    pub user_id: Option<String>,
    pub cart_id: Option<String>,
    pub status: Option<CheckoutStatus>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Body for the complete endpoint. Gateway references are recorded as-is.
#[derive(Debug, Default, Deserialize)]
pub struct CompletionRequest {
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub payment_intent_id: Option<String>,
}

/// Completion result: the finalized checkout plus a trimmed view of the
/// order it placed.
#[derive(Debug, Serialize)]
pub struct CompletedCheckout {
    pub checkout: Checkout,
    pub order: OrderSummary,
}

#[derive(Debug, Serialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub total: Decimal,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn ResourceStore) -> Self {
        Self {
            store,
            checkouts: Collection::new(store),
            carts: Collection::new(store),
            users: Collection::new(store),
        }
    }

    /// Open a checkout session over an active cart, freezing its lines and
    /// totals into the snapshot.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when the user is missing/inactive or the
    /// cart missing/not active, or `AppError::Validation` when a selected
    /// address or payment method is not in the user's records.
    #[instrument(skip(self, draft), fields(user_id = %draft.user_id, cart_id = %draft.cart_id))]
    pub async fn create(&self, draft: CheckoutDraft) -> Result<Checkout> {
        let user = self
            .users
            .require(&draft.user_id)
            .await
            .map_err(|e| named_not_found(e, "User not found"))?;
        if !user.is_active {
            return Err(AppError::NotFound("User not found".to_owned()));
        }

        let cart = self
            .carts
            .require(&draft.cart_id)
            .await
            .map_err(|e| named_not_found(e, "Cart not found or inactive"))?;
        if cart.status != CartStatus::Active {
            return Err(AppError::NotFound("Cart not found or inactive".to_owned()));
        }

        let shipping_address_id = AddressId::new(draft.shipping_address_id);
        let billing_address_id = draft
            .billing_address_id
            .map_or_else(|| shipping_address_id.clone(), AddressId::new);
        let payment_id = PaymentMethodId::new(draft.payment.payment_method_id);

        let mut errors = Vec::new();
        if user.address(&shipping_address_id).is_none() {
            errors.push("shipping_address_id is not in the user's address book".to_owned());
        }
        if user.address(&billing_address_id).is_none() {
            errors.push("billing_address_id is not in the user's address book".to_owned());
        }
        if user.payment_method(&payment_id).is_none() {
            errors.push("payment_method_id is not one of the user's payment methods".to_owned());
        }
        if draft.shipping_method.cost < Decimal::ZERO {
            errors.push("shipping_method cost must be non-negative".to_owned());
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let now = Utc::now();
        let checkout = Checkout {
            id: CheckoutId::generate(),
            cart_id: cart.id.clone(),
            user_id: user.id,
            selected_shipping_address_id: shipping_address_id,
            selected_billing_address_id: billing_address_id,
            shipping_method: draft.shipping_method,
            payment: CheckoutPayment {
                selected_payment_id: payment_id,
                amount_authorized: cart.cart_total,
                currency: cart.currency,
                status: PaymentStatus::Pending,
                gateway: draft.payment.gateway,
                payment_intent_id: None,
            },
            items: cart.items,
            order_review: OrderReview {
                subtotal: cart.subtotal,
                discounts: cart.discount_total,
                taxes: cart.estimated_taxes,
                shipping: cart.estimated_shipping,
                total: cart.cart_total,
                currency: cart.currency,
            },
            status: CheckoutStatus::Pending,
            notes: None,
            transaction_id: None,
            placed_at: None,
            expires_at: Checkout::expiry_from(now),
            created_at: now,
            updated_at: now,
        };
        self.checkouts.insert(&checkout).await?;
        Ok(checkout)
    }

    /// Fetch one checkout.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve.
    pub async fn get(&self, id: &str) -> Result<Checkout> {
        self.checkouts
            .require(id)
            .await
            .map_err(|e| named_not_found(e, "Checkout not found"))
    }

    /// List checkouts, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` on backend failure.
    pub async fn list(&self, params: &CheckoutListParams) -> Result<Page<Checkout>> {
        let mut query = ListQuery::new().sort(Sort::desc("created_at")).page(
            params.page.unwrap_or(1),
            params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        );
        if let Some(user_id) = &params.user_id {
            query = query.filter(Filter::equals("user_id", user_id.clone()));
        }
        if let Some(cart_id) = &params.cart_id {
            query = query.filter(Filter::equals("cart_id", cart_id.clone()));
        }
        if let Some(status) = params.status {
            query = query.filter(Filter::equals("status", serde_json::json!(status)));
        }

        let (items, total) = self.checkouts.page(&query).await?;
        Ok(Page {
            items,
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    /// Complete a pending checkout: authorize the payment, place the order
    /// and convert the source cart, all in one batch.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve, or
    /// `AppError::InvalidState` when the checkout is not pending.
    #[instrument(skip(self, request), fields(checkout_id = %id))]
    pub async fn complete(&self, id: &str, request: CompletionRequest) -> Result<CompletedCheckout> {
        let mut checkout = self.get(id).await?;
        if checkout.status != CheckoutStatus::Pending {
            return Err(AppError::InvalidState(
                "Checkout is not in pending status".to_owned(),
            ));
        }

        let now = Utc::now();
        checkout.status = CheckoutStatus::Completed;
        checkout.payment.status = PaymentStatus::Authorized;
        checkout.transaction_id = request.transaction_id;
        checkout.payment.payment_intent_id = request.payment_intent_id;
        checkout.placed_at = Some(now);
        checkout.updated_at = now;

        // The wallet entry may have been removed since the session opened;
        // the order still needs an instrument label.
        let payment_method = self
            .users
            .get(checkout.user_id.as_str())
            .await?
            .and_then(|user| {
                user.payment_method(&checkout.payment.selected_payment_id)
                    .map(|method| method.kind.as_str())
            })
            .unwrap_or("card");

        let order = Order::from_checkout(&checkout, payment_method);

        let mut batch = WriteBatch::new();
        batch.replace(&checkout)?;
        batch.insert(&order)?;
        if let Some(mut cart) = self.carts.get(checkout.cart_id.as_str()).await? {
            cart.clear();
            cart.status = CartStatus::Converted;
            batch.replace(&cart)?;
        }
        self.store.apply(batch).await?;

        Ok(CompletedCheckout {
            order: OrderSummary {
                id: order.id.clone(),
                order_number: order.order_number.clone(),
                status: order.status,
                total: order.totals.grand_total,
            },
            checkout,
        })
    }

    /// Mark a pending checkout failed, recording the reason.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve, or
    /// `AppError::InvalidState` when the checkout is already finalized.
    #[instrument(skip(self, reason), fields(checkout_id = %id))]
    pub async fn fail(&self, id: &str, reason: Option<String>) -> Result<Checkout> {
        let mut checkout = self.get(id).await?;
        if checkout.status.is_terminal() {
            return Err(AppError::InvalidState(
                "Checkout is not in pending status".to_owned(),
            ));
        }
        checkout.status = CheckoutStatus::Failed;
        checkout.payment.status = PaymentStatus::Failed;
        checkout.notes = reason;
        checkout.updated_at = Utc::now();
        self.checkouts.save(&checkout).await?;
        Ok(checkout)
    }

    /// Cancel a checkout. Allowed from any status; payment state is left
    /// alone.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve.
    #[instrument(skip(self, reason), fields(checkout_id = %id))]
    pub async fn cancel(&self, id: &str, reason: Option<String>) -> Result<Checkout> {
        let mut checkout = self.get(id).await?;
        checkout.status = CheckoutStatus::Cancelled;
        checkout.notes = Some(reason.unwrap_or_else(|| "Checkout cancelled by user".to_owned()));
        checkout.updated_at = Utc::now();
        self.checkouts.save(&checkout).await?;
        Ok(checkout)
    }

    /// Hard-delete a checkout.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve.
    #[instrument(skip(self), fields(checkout_id = %id))]
    pub async fn delete(&self, id: &str) -> Result<()> {
        if self.checkouts.remove(id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound("Checkout not found".to_owned()))
        }
    }

    /// Delete every pending checkout whose expiry has passed, returning the
    /// number removed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` on backend failure.
    #[instrument(skip(self))]
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let filters = [
            Filter::equals("status", serde_json::json!(CheckoutStatus::Pending)),
            Filter::before("expires_at", Utc::now()),
        ];
        Ok(self.checkouts.remove_where(&filters).await?)
    }
}
