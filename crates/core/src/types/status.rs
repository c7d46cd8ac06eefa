//! Status enums for the commerce lifecycle.
//!
//! Each entity has exactly one canonical status enum; handlers, services and
//! both store backends share these definitions so the wire format and the
//! persisted documents never disagree.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
///
/// The main flow runs PLACED through DELIVERED. A transition may skip
/// intermediate states when an upstream system reports a later one, but
/// never moves backwards. CANCELLED is reachable only before fulfillment
/// begins; the return flow hangs off DELIVERED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Placed,
    Confirmed,
    Picked,
    Packed,
    Shipped,
    InTransit,
    OutForDelivery,
    Delivered,
    Cancelled,
    ReturnRequested,
    Returned,
    Refunded,
}

impl OrderStatus {
    /// Position along the main fulfillment sequence, `None` for branch states.
    const fn sequence_rank(self) -> Option<u8> {
        match self {
            Self::Placed => Some(0),
            Self::Confirmed => Some(1),
            Self::Picked => Some(2),
            Self::Packed => Some(3),
            Self::Shipped => Some(4),
            Self::InTransit => Some(5),
            Self::OutForDelivery => Some(6),
            Self::Delivered => Some(7),
            Self::Cancelled | Self::ReturnRequested | Self::Returned | Self::Refunded => None,
        }
    }

    /// Whether `self` -> `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self.sequence_rank(), next.sequence_rank()) {
            (Some(from), Some(to)) => to > from,
            _ => matches!(
                (self, next),
                (Self::Placed | Self::Confirmed, Self::Cancelled)
                    | (Self::Delivered, Self::ReturnRequested)
                    | (Self::ReturnRequested, Self::Returned)
                    | (Self::Returned, Self::Refunded)
            ),
        }
    }

    /// Whether no transition leaves this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Placed => "PLACED",
            Self::Confirmed => "CONFIRMED",
            Self::Picked => "PICKED",
            Self::Packed => "PACKED",
            Self::Shipped => "SHIPPED",
            Self::InTransit => "IN_TRANSIT",
            Self::OutForDelivery => "OUT_FOR_DELIVERY",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
            Self::ReturnRequested => "RETURN_REQUESTED",
            Self::Returned => "RETURNED",
            Self::Refunded => "REFUNDED",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PLACED" => Ok(Self::Placed),
            "CONFIRMED" => Ok(Self::Confirmed),
            "PICKED" => Ok(Self::Picked),
            "PACKED" => Ok(Self::Packed),
            "SHIPPED" => Ok(Self::Shipped),
            "IN_TRANSIT" => Ok(Self::InTransit),
            "OUT_FOR_DELIVERY" => Ok(Self::OutForDelivery),
            "DELIVERED" => Ok(Self::Delivered),
            "CANCELLED" => Ok(Self::Cancelled),
            "RETURN_REQUESTED" => Ok(Self::ReturnRequested),
            "RETURNED" => Ok(Self::Returned),
            "REFUNDED" => Ok(Self::Refunded),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// Checkout session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl CheckoutStatus {
    /// Completed, failed and cancelled checkouts accept no further writes.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Payment status shared by checkouts and orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Authorized,
    Captured,
    Failed,
    Refunded,
}

/// Cart lifecycle status.
///
/// Carts convert when their checkout completes and are abandoned on delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CartStatus {
    #[default]
    Active,
    Converted,
    Abandoned,
}

/// Shipment status as reported by carrier tracking events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    #[default]
    Pending,
    PickedUp,
    InTransit,
    OutForDelivery,
    Delivered,
    Exception,
    Returned,
}

impl ShipmentStatus {
    /// Statuses that overwrite the shipment's top-level status when an
    /// event carrying them is appended.
    #[must_use]
    pub const fn is_final_class(self) -> bool {
        matches!(self, Self::Delivered | Self::Exception | Self::Returned)
    }
}

/// Customer loyalty tier, derived from accumulated points.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum LoyaltyTier {
    #[default]
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl LoyaltyTier {
    /// Tier for a points balance.
    #[must_use]
    pub const fn from_points(points: u32) -> Self {
        match points {
            0..=999 => Self::Bronze,
            1_000..=4_999 => Self::Silver,
            5_000..=9_999 => Self::Gold,
            _ => Self::Platinum,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_main_sequence_advances() {
        assert!(OrderStatus::Placed.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Picked.can_transition_to(OrderStatus::Packed));
        assert!(OrderStatus::OutForDelivery.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_main_sequence_allows_skips() {
        // Carrier webhooks can report a later state than we last saw.
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Placed.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_no_backward_or_self_transitions() {
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Confirmed));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Placed));
        assert!(!OrderStatus::Packed.can_transition_to(OrderStatus::Packed));
    }

    #[test]
    fn test_cancel_only_before_fulfillment() {
        assert!(OrderStatus::Placed.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Picked.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_return_flow() {
        assert!(OrderStatus::Delivered.can_transition_to(OrderStatus::ReturnRequested));
        assert!(OrderStatus::ReturnRequested.can_transition_to(OrderStatus::Returned));
        assert!(OrderStatus::Returned.can_transition_to(OrderStatus::Refunded));

        // The return flow starts at DELIVERED and never re-enters the main sequence.
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::ReturnRequested));
        assert!(!OrderStatus::ReturnRequested.can_transition_to(OrderStatus::Refunded));
        assert!(!OrderStatus::Returned.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_terminal_states() {
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Refunded.is_terminal());
        assert!(!OrderStatus::Delivered.is_terminal());

        for next in [
            OrderStatus::Placed,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Returned,
        ] {
            assert!(!OrderStatus::Cancelled.can_transition_to(next));
            assert!(!OrderStatus::Refunded.can_transition_to(next));
        }
    }

    #[test]
    fn test_order_status_serde_screaming_snake() {
        let json = serde_json::to_string(&OrderStatus::OutForDelivery).unwrap();
        assert_eq!(json, "\"OUT_FOR_DELIVERY\"");

        let parsed: OrderStatus = serde_json::from_str("\"RETURN_REQUESTED\"").unwrap();
        assert_eq!(parsed, OrderStatus::ReturnRequested);
    }

    #[test]
    fn test_order_status_from_str_roundtrip() {
        for status in [
            OrderStatus::Placed,
            OrderStatus::InTransit,
            OrderStatus::ReturnRequested,
            OrderStatus::Refunded,
        ] {
            let parsed: OrderStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("SHIPPED_MAYBE".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_checkout_terminal() {
        assert!(!CheckoutStatus::Pending.is_terminal());
        assert!(CheckoutStatus::Completed.is_terminal());
        assert!(CheckoutStatus::Failed.is_terminal());
        assert!(CheckoutStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_shipment_final_class() {
        assert!(ShipmentStatus::Delivered.is_final_class());
        assert!(ShipmentStatus::Exception.is_final_class());
        assert!(ShipmentStatus::Returned.is_final_class());
        assert!(!ShipmentStatus::InTransit.is_final_class());
        assert!(!ShipmentStatus::PickedUp.is_final_class());
    }

    #[test]
    fn test_loyalty_tier_thresholds() {
        assert_eq!(LoyaltyTier::from_points(0), LoyaltyTier::Bronze);
        assert_eq!(LoyaltyTier::from_points(999), LoyaltyTier::Bronze);
        assert_eq!(LoyaltyTier::from_points(1_000), LoyaltyTier::Silver);
        assert_eq!(LoyaltyTier::from_points(4_999), LoyaltyTier::Silver);
        assert_eq!(LoyaltyTier::from_points(5_000), LoyaltyTier::Gold);
        assert_eq!(LoyaltyTier::from_points(9_999), LoyaltyTier::Gold);
        assert_eq!(LoyaltyTier::from_points(10_000), LoyaltyTier::Platinum);
    }

    #[test]
    fn test_loyalty_tier_ordering() {
        assert!(LoyaltyTier::Bronze < LoyaltyTier::Silver);
        assert!(LoyaltyTier::Silver < LoyaltyTier::Gold);
        assert!(LoyaltyTier::Gold < LoyaltyTier::Platinum);
    }
}
