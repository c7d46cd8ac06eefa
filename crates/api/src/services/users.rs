//! Customer account service.
//!
//! Users are soft-deactivated, never hard-deleted; orders keep referencing
//! them. Address books and stored payment methods are embedded in the user
//! document, so every mutation here is one document write.

use chrono::Utc;
use copperbay_core::{AddressId, Email, LoyaltyTier, PaymentMethodId, UserId};
use serde::Deserialize;
use tracing::instrument;

use super::{Page, named_not_found};
use crate::error::{AppError, Result};
use crate::models::{Address, PaymentMethod, PaymentMethodKind, User};
use crate::store::{Collection, DEFAULT_PAGE_SIZE, Filter, ListQuery, ResourceStore, Sort};

pub struct UserService<'a> {
    users: Collection<'a, User>,
}

/// Client-settable fields for a new user.
#[derive(Debug, Deserialize)]
pub struct UserDraft {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub loyalty_points: u32,
    #[serde(default)]
    pub addresses: Vec<AddressDraft>,
    #[serde(default)]
    pub payment_methods: Vec<PaymentMethodDraft>,
}

/// An address as submitted by the client; the id is assigned here.
#[derive(Debug, Deserialize)]
pub struct AddressDraft {
    #[serde(default)]
    pub label: Option<String>,
    pub recipient: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub preferred: bool,
}

impl AddressDraft {
    fn validate(&self, errors: &mut Vec<String>) {
        for (value, field) in [
            (&self.recipient, "recipient"),
            (&self.line1, "line1"),
            (&self.city, "city"),
            (&self.postal_code, "postal_code"),
            (&self.country, "country"),
        ] {
            if value.trim().is_empty() {
                errors.push(format!("address {field} is required"));
            }
        }
    }

    fn into_address(self) -> Address {
        Address {
            address_id: AddressId::generate(),
            label: self.label,
            recipient: self.recipient,
            line1: self.line1,
            line2: self.line2,
            city: self.city,
            state: self.state,
            postal_code: self.postal_code,
            country: self.country,
            preferred: self.preferred,
        }
    }
}

/// A payment method as submitted by the client. Full card numbers are never
/// accepted; intake is limited to brand, last4 and expiry.
#[derive(Debug, Deserialize)]
pub struct PaymentMethodDraft {
    #[serde(rename = "type")]
    pub kind: PaymentMethodKind,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub last4: Option<String>,
    #[serde(default)]
    pub expiry: Option<String>,
    #[serde(default)]
    pub vpa: Option<String>,
    #[serde(default)]
    pub billing_address_id: Option<AddressId>,
    #[serde(default)]
    pub preferred: bool,
}

impl PaymentMethodDraft {
    fn validate(&self, errors: &mut Vec<String>) {
        match self.kind {
            PaymentMethodKind::Card => {
                match &self.last4 {
                    Some(last4)
                        if last4.len() == 4 && last4.bytes().all(|b| b.is_ascii_digit()) => {}
                    Some(_) => errors.push("last4 must be exactly four digits".to_owned()),
                    None => errors.push("card payment methods require last4".to_owned()),
                }
            }
            PaymentMethodKind::Upi => {
                if !self.vpa.as_deref().is_some_and(|vpa| vpa.contains('@')) {
                    errors.push("upi payment methods require a vpa".to_owned());
                }
            }
            PaymentMethodKind::Netbanking | PaymentMethodKind::Wallet => {}
        }
    }

    fn into_payment_method(self) -> PaymentMethod {
        PaymentMethod {
            payment_id: PaymentMethodId::generate(),
            kind: self.kind,
            brand: self.brand,
            last4: self.last4,
            expiry: self.expiry,
            vpa: self.vpa,
            billing_address_id: self.billing_address_id,
            preferred: self.preferred,
        }
    }
}

/// Partial update; absent fields keep their stored values.
#[derive(Debug, Default, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

/// Query parameters for the user list endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct UserListParams {
    pub loyalty_tier: Option<LoyaltyTier>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Loyalty point mutation: `{action: add|subtract, points}`.
#[derive(Debug, Deserialize)]
pub struct LoyaltyAdjustment {
    pub action: LoyaltyAction,
    pub points: u32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoyaltyAction {
    Add,
    Subtract,
}

impl<'a> UserService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn ResourceStore) -> Self {
        Self {
            users: Collection::new(store),
        }
    }

    /// Create a user after validating the draft and the email's uniqueness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` with one message per violated field,
    /// or `AppError::Conflict` when the email is already registered.
    #[instrument(skip(self, draft))]
    pub async fn create(&self, draft: UserDraft) -> Result<User> {
        let mut errors = Vec::new();
        if draft.name.trim().is_empty() {
            errors.push("name is required".to_owned());
        }
        // Emails are stored lowercased so uniqueness is case-insensitive.
        let email = match Email::parse(&draft.email.to_lowercase()) {
            Ok(email) => Some(email),
            Err(e) => {
                errors.push(e.to_string());
                None
            }
        };
        for address in &draft.addresses {
            address.validate(&mut errors);
        }
        for method in &draft.payment_methods {
            method.validate(&mut errors);
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }
        let Some(email) = email else {
            return Err(AppError::validation("email is invalid"));
        };

        self.ensure_email_free(&email, None).await?;

        let now = Utc::now();
        let mut user = User {
            id: UserId::generate(),
            name: draft.name,
            email,
            phone: draft.phone,
            loyalty_tier: LoyaltyTier::from_points(draft.loyalty_points),
            loyalty_points: draft.loyalty_points,
            addresses: Vec::new(),
            payment_methods: Vec::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        for address in draft.addresses {
            user.add_address(address.into_address());
        }
        for method in draft.payment_methods {
            user.add_payment_method(method.into_payment_method());
        }

        self.users.insert(&user).await?;
        Ok(user)
    }

    /// Fetch one user.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve.
    pub async fn get(&self, id: &str) -> Result<User> {
        self.users
            .require(id)
            .await
            .map_err(|e| named_not_found(e, "User not found"))
    }

    /// List users, newest first, optionally narrowed by loyalty tier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` on backend failure.
    pub async fn list(&self, params: &UserListParams) -> Result<Page<User>> {
        let mut query = ListQuery::new().sort(Sort::desc("created_at")).page(
            params.page.unwrap_or(1),
            params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        );
        if let Some(tier) = params.loyalty_tier {
            query = query.filter(Filter::equals("loyalty_tier", serde_json::json!(tier)));
        }

        let (items, total) = self.users.page(&query).await?;
        Ok(Page {
            items,
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    /// Apply a partial update to the user's own fields.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve,
    /// `AppError::Validation` for invalid fields, or `AppError::Conflict`
    /// when changing to an email another user holds.
    #[instrument(skip(self, update), fields(user_id = %id))]
    pub async fn update(&self, id: &str, update: UserUpdate) -> Result<User> {
        let mut user = self.get(id).await?;

        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(AppError::validation("name cannot be empty"));
            }
            user.name = name;
        }
        if let Some(raw) = update.email {
            let email = Email::parse(&raw.to_lowercase())
                .map_err(|e| AppError::validation(e.to_string()))?;
            if email != user.email {
                self.ensure_email_free(&email, Some(user.id.as_str())).await?;
                user.email = email;
            }
        }
        if let Some(phone) = update.phone {
            user.phone = Some(phone);
        }
        if let Some(is_active) = update.is_active {
            user.is_active = is_active;
        }
        user.updated_at = Utc::now();

        self.users.save(&user).await?;
        Ok(user)
    }

    /// Deactivate a user without removing the document.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the id does not resolve.
    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn deactivate(&self, id: &str) -> Result<()> {
        self.users
            .soft_delete(id)
            .await
            .map_err(|e| named_not_found(e, "User not found"))
    }

    // =========================================================================
    // Address book
    // =========================================================================

    /// Add an address, returning the updated user.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the user does not resolve, or
    /// `AppError::Validation` for missing address fields.
    #[instrument(skip(self, draft), fields(user_id = %id))]
    pub async fn add_address(&self, id: &str, draft: AddressDraft) -> Result<User> {
        let mut user = self.get(id).await?;

        let mut errors = Vec::new();
        draft.validate(&mut errors);
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        user.add_address(draft.into_address());
        user.updated_at = Utc::now();
        self.users.save(&user).await?;
        Ok(user)
    }

    /// Replace the fields of a stored address, keeping its id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the user or address does not
    /// resolve, or `AppError::Validation` for missing address fields.
    #[instrument(skip(self, draft), fields(user_id = %id, address_id = %address_id))]
    pub async fn update_address(
        &self,
        id: &str,
        address_id: &AddressId,
        draft: AddressDraft,
    ) -> Result<User> {
        let mut user = self.get(id).await?;

        let mut errors = Vec::new();
        draft.validate(&mut errors);
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let Some(slot) = user
            .addresses
            .iter_mut()
            .find(|a| a.address_id == *address_id)
        else {
            return Err(AppError::NotFound("Address not found".to_owned()));
        };

        let preferred = draft.preferred;
        let mut replacement = draft.into_address();
        replacement.address_id = address_id.clone();
        *slot = replacement;
        if preferred {
            user.prefer_address(address_id);
        }
        user.updated_at = Utc::now();

        self.users.save(&user).await?;
        Ok(user)
    }

    /// Remove an address from the book.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the user or address does not resolve.
    #[instrument(skip(self), fields(user_id = %id, address_id = %address_id))]
    pub async fn remove_address(&self, id: &str, address_id: &AddressId) -> Result<User> {
        let mut user = self.get(id).await?;
        if user.address(address_id).is_none() {
            return Err(AppError::NotFound("Address not found".to_owned()));
        }

        user.addresses.retain(|a| a.address_id != *address_id);
        user.updated_at = Utc::now();
        self.users.save(&user).await?;
        Ok(user)
    }

    // =========================================================================
    // Payment methods and loyalty
    // =========================================================================

    /// Store a payment method, returning the updated user.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the user does not resolve, or
    /// `AppError::Validation` for an invalid instrument.
    #[instrument(skip(self, draft), fields(user_id = %id))]
    pub async fn add_payment_method(&self, id: &str, draft: PaymentMethodDraft) -> Result<User> {
        let mut user = self.get(id).await?;

        let mut errors = Vec::new();
        draft.validate(&mut errors);
        if let Some(billing_id) = &draft.billing_address_id
            && user.address(billing_id).is_none()
        {
            errors.push("billing_address_id does not reference a stored address".to_owned());
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        user.add_payment_method(draft.into_payment_method());
        user.updated_at = Utc::now();
        self.users.save(&user).await?;
        Ok(user)
    }

    /// Add or subtract loyalty points. The balance clamps at zero and the
    /// tier always follows the balance.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the user does not resolve.
    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn adjust_loyalty(&self, id: &str, adjustment: LoyaltyAdjustment) -> Result<User> {
        let mut user = self.get(id).await?;

        let delta = match adjustment.action {
            LoyaltyAction::Add => i64::from(adjustment.points),
            LoyaltyAction::Subtract => -i64::from(adjustment.points),
        };
        user.adjust_points(delta);
        user.updated_at = Utc::now();

        self.users.save(&user).await?;
        Ok(user)
    }

    /// Fail with `Conflict` when another user already holds `email`.
    async fn ensure_email_free(&self, email: &Email, own_id: Option<&str>) -> Result<()> {
        let existing = self
            .users
            .find_one(Filter::equals("email", email.as_str()))
            .await?;
        match existing {
            Some(user) if Some(user.id.as_str()) != own_id => Err(AppError::Conflict(
                "Email already registered".to_owned(),
            )),
            _ => Ok(()),
        }
    }
}
