//! Customer accounts with embedded addresses and payment methods.

use chrono::{DateTime, Utc};
use copperbay_core::{AddressId, Email, LoyaltyTier, PaymentMethodId, UserId};
use serde::{Deserialize, Serialize};

use crate::store::Document;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    #[serde(default)]
    pub phone: Option<String>,
    pub loyalty_tier: LoyaltyTier,
    pub loyalty_points: u32,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub payment_methods: Vec<PaymentMethod>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Look up an address in the user's book.
    #[must_use]
    pub fn address(&self, address_id: &AddressId) -> Option<&Address> {
        self.addresses.iter().find(|a| a.address_id == *address_id)
    }

    /// Look up a stored payment method.
    #[must_use]
    pub fn payment_method(&self, payment_id: &PaymentMethodId) -> Option<&PaymentMethod> {
        self.payment_methods
            .iter()
            .find(|p| p.payment_id == *payment_id)
    }

    /// Add an address, keeping at most one preferred entry.
    pub fn add_address(&mut self, address: Address) {
        if address.preferred {
            for existing in &mut self.addresses {
                existing.preferred = false;
            }
        }
        self.addresses.push(address);
    }

    /// Make `keep` the single preferred address.
    pub fn prefer_address(&mut self, keep: &AddressId) {
        for address in &mut self.addresses {
            address.preferred = address.address_id == *keep;
        }
    }

    /// Add a payment method, keeping at most one preferred entry.
    pub fn add_payment_method(&mut self, method: PaymentMethod) {
        if method.preferred {
            for existing in &mut self.payment_methods {
                existing.preferred = false;
            }
        }
        self.payment_methods.push(method);
    }

    /// Make `keep` the single preferred payment method.
    pub fn prefer_payment_method(&mut self, keep: &PaymentMethodId) {
        for method in &mut self.payment_methods {
            method.preferred = method.payment_id == *keep;
        }
    }

    /// Apply a loyalty point delta, clamping the balance at zero. The tier
    /// always follows the balance.
    pub fn adjust_points(&mut self, delta: i64) {
        let next = i64::from(self.loyalty_points).saturating_add(delta).max(0);
        self.loyalty_points = u32::try_from(next).unwrap_or(u32::MAX);
        self.loyalty_tier = LoyaltyTier::from_points(self.loyalty_points);
    }
}

impl Document for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> &str {
        self.id.as_str()
    }
}

/// One entry in the user's address book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub address_id: AddressId,
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodKind {
    Card,
    Upi,
    Netbanking,
    Wallet,
}

impl PaymentMethodKind {
    /// Wire-format label, matching the serde representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Upi => "upi",
            Self::Netbanking => "netbanking",
            Self::Wallet => "wallet",
        }
    }
}

/// A stored payment instrument. Card numbers are never persisted; only the
/// derived `last4` survives intake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub payment_id: PaymentMethodId,
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: UserId::generate(),
            name: "Asha Rao".into(),
            email: Email::parse("asha@example.com").unwrap(),
            phone: None,
            loyalty_tier: LoyaltyTier::Bronze,
            loyalty_points: 0,
            addresses: vec![],
            payment_methods: vec![],
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn address(id: &str, preferred: bool) -> Address {
        Address {
            address_id: AddressId::new(id),
            label: Some("home".into()),
            recipient: "Asha Rao".into(),
            line1: "1 Harbor Way".into(),
            line2: None,
            city: "Kochi".into(),
            state: Some("KL".into()),
            postal_code: "682001".into(),
            country: "IN".into(),
            preferred,
        }
    }

    #[test]
    fn adding_a_preferred_address_demotes_the_rest() {
        let mut user = user();
        user.add_address(address("addr_1", true));
        user.add_address(address("addr_2", true));

        let preferred: Vec<_> = user
            .addresses
            .iter()
            .filter(|a| a.preferred)
            .map(|a| a.address_id.as_str())
            .collect();
        assert_eq!(preferred, vec!["addr_2"]);
    }

    #[test]
    fn prefer_address_is_exclusive() {
        let mut user = user();
        user.add_address(address("addr_1", true));
        user.add_address(address("addr_2", false));
        user.prefer_address(&AddressId::new("addr_2"));

        assert!(!user.address(&AddressId::new("addr_1")).unwrap().preferred);
        assert!(user.address(&AddressId::new("addr_2")).unwrap().preferred);
    }

    #[test]
    fn point_adjustments_clamp_and_retier() {
        let mut user = user();
        user.adjust_points(1200);
        assert_eq!(user.loyalty_points, 1200);
        assert_eq!(user.loyalty_tier, LoyaltyTier::Silver);

        user.adjust_points(-5000);
        assert_eq!(user.loyalty_points, 0);
        assert_eq!(user.loyalty_tier, LoyaltyTier::Bronze);

        user.adjust_points(10_000);
        assert_eq!(user.loyalty_tier, LoyaltyTier::Platinum);
    }

    #[test]
    fn payment_kind_serializes_under_type_key() {
        let method = PaymentMethod {
            payment_id: PaymentMethodId::new("pm_1"),
            kind: PaymentMethodKind::Upi,
            brand: None,
            last4: None,
            expiry: None,
            vpa: Some("asha@upi".into()),
            billing_address_id: None,
            preferred: false,
        };
        let json = serde_json::to_value(&method).unwrap();
        assert_eq!(json["type"], serde_json::json!("upi"));
    }
}
