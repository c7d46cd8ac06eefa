//! Shipments and their tracking event feeds.

use chrono::{DateTime, Utc};
use copperbay_core::{OrderId, ShipmentId, ShipmentStatus, VariantId};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::product::Dimensions;
use super::user::Address;
use crate::store::Document;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub order_id: OrderId,
    /// Snapshot of the parent order's number at creation time.
    pub order_number: String,
    pub carrier: String,
    #[serde(default)]
    pub service_level: Option<String>,
    pub tracking_number: String,
    pub status: ShipmentStatus,
    pub shipping_address: Address,
    pub items: Vec<ShipmentItem>,
    #[serde(default)]
    pub package_details: Option<PackageDetails>,
    #[serde(default)]
    pub cost: Option<Decimal>,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actual_delivery: Option<DateTime<Utc>>,
    #[serde(default)]
    pub events: Vec<TrackingEvent>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    /// `TRK{unix_millis}{6 uppercase alphanumerics}`.
    #[must_use]
    pub fn generate_tracking_number() -> String {
        let millis = Utc::now().timestamp_millis();
        let suffix: String = rand::rng()
            .sample_iter(rand::distr::Alphanumeric)
            .take(6)
            .map(char::from)
            .collect::<String>()
            .to_uppercase();
        format!("TRK{millis}{suffix}")
    }

    /// Append a carrier event. Only `delivered`, `exception` and `returned`
    /// events also overwrite the shipment's top-level status; intermediate
    /// scans leave it alone.
    pub fn record_event(
        &mut self,
        status: ShipmentStatus,
        location: Option<String>,
        description: Option<String>,
        details: Option<String>,
    ) {
        let now = Utc::now();
        self.events.push(TrackingEvent {
            status,
            location,
            timestamp: now,
            description,
            details,
        });
        if status.is_final_class() {
            self.status = status;
        }
        self.updated_at = now;
    }
}

impl Document for Shipment {
    const COLLECTION: &'static str = "shipments";

    fn id(&self) -> &str {
        self.id.as_str()
    }
}

/// One physical line in the package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentItem {
    pub variant_id: VariantId,
    pub name: String,
    pub quantity: u32,
    /// Defaults to zero when the order line carries no weight data.
    #[serde(default)]
    pub weight_kg: Decimal,
    #[serde(default)]
    pub dimensions_cm: Dimensions,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    Envelope,
    #[default]
    Package,
    Box,
    Pallet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDetails {
    pub weight_kg: Decimal,
    pub dimensions_cm: Dimensions,
    #[serde(default)]
    pub package_type: PackageType,
}

/// One scan in the tracking feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub status: ShipmentStatus,
    #[serde(default)]
    pub location: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use copperbay_core::AddressId;

    use super::*;

    fn shipment() -> Shipment {
        let now = Utc::now();
        Shipment {
            id: ShipmentId::generate(),
            order_id: OrderId::new("ord_1"),
            order_number: "ORD-1-ABCDEF123".into(),
            carrier: "BlueDart".into(),
            service_level: Some("express".into()),
            tracking_number: Shipment::generate_tracking_number(),
            status: ShipmentStatus::Pending,
            shipping_address: Address {
                address_id: AddressId::new("addr_1"),
                label: None,
                recipient: "Asha Rao".into(),
                line1: "1 Harbor Way".into(),
                line2: None,
                city: "Kochi".into(),
                state: Some("KL".into()),
                postal_code: "682001".into(),
                country: "IN".into(),
                preferred: false,
            },
            items: vec![],
            package_details: None,
            cost: None,
            estimated_delivery: None,
            actual_delivery: None,
            events: vec![],
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn tracking_numbers_match_the_expected_shape() {
        let number = Shipment::generate_tracking_number();
        assert!(number.starts_with("TRK"));
        let rest = &number[3..];
        assert!(rest.len() > 6);
        assert!(rest
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn intermediate_events_do_not_change_top_level_status() {
        let mut shipment = shipment();
        shipment.record_event(
            ShipmentStatus::InTransit,
            Some("Mumbai hub".into()),
            Some("Departed facility".into()),
            None,
        );

        assert_eq!(shipment.events.len(), 1);
        assert_eq!(shipment.status, ShipmentStatus::Pending);
    }

    #[test]
    fn final_class_events_overwrite_top_level_status() {
        let mut shipment = shipment();
        shipment.record_event(ShipmentStatus::Exception, None, Some("Weather hold".into()), None);
        assert_eq!(shipment.status, ShipmentStatus::Exception);

        shipment.record_event(ShipmentStatus::Delivered, Some("Front door".into()), None, None);
        assert_eq!(shipment.status, ShipmentStatus::Delivered);
        assert_eq!(shipment.events.len(), 2);
    }
}
