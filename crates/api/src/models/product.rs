//! Catalog products with embedded variants.

use chrono::{DateTime, Utc};
use copperbay_core::{CurrencyCode, ProductId, VariantId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::store::Document;

/// A catalog entry. Sellable units are the embedded [`Variant`]s; the
/// product carries the shared descriptive data and policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub shipping: Option<ShippingProfile>,
    #[serde(default)]
    pub warranty: Option<Warranty>,
    #[serde(default)]
    pub return_policy: Option<ReturnPolicy>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Look up an embedded variant by id.
    #[must_use]
    pub fn variant(&self, variant_id: &VariantId) -> Option<&Variant> {
        self.variants.iter().find(|v| v.variant_id == *variant_id)
    }
}

impl Document for Product {
    const COLLECTION: &'static str = "products";

    fn id(&self) -> &str {
        self.id.as_str()
    }
}

/// One sellable configuration of a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub variant_id: VariantId,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    pub price: VariantPrice,
    pub inventory: Inventory,
    #[serde(default)]
    pub weight_kg: Option<Decimal>,
    #[serde(default)]
    pub dimensions_cm: Option<Dimensions>,
}

/// List price plus optional strikethrough and discount data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantPrice {
    pub currency: CurrencyCode,
    pub amount: Decimal,
    #[serde(default)]
    pub msrp: Option<Decimal>,
    #[serde(default)]
    pub discount: Option<Discount>,
}

impl VariantPrice {
    /// List price after any attached discount.
    #[must_use]
    pub fn effective_amount(&self) -> Decimal {
        self.discount
            .as_ref()
            .map_or(self.amount, |discount| discount.apply(self.amount))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    Fixed,
    Percentage,
}

/// A discount attached to a variant price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discount {
    #[serde(rename = "type")]
    pub kind: DiscountKind,
    pub value: Decimal,
    #[serde(default)]
    pub label: Option<String>,
}

impl Discount {
    /// Price after this discount, floored at zero.
    #[must_use]
    pub fn apply(&self, amount: Decimal) -> Decimal {
        let discounted = match self.kind {
            DiscountKind::Fixed => amount - self.value,
            DiscountKind::Percentage => amount - amount * self.value / Decimal::ONE_HUNDRED,
        };
        discounted.max(Decimal::ZERO)
    }
}

/// Stock position for one variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
    pub available: u32,
    #[serde(default)]
    pub allocated: u32,
    #[serde(default)]
    pub safety_stock: u32,
    #[serde(default)]
    pub warehouse_location: Option<String>,
    #[serde(default)]
    pub backorderable: bool,
    #[serde(default)]
    pub expected_restock_date: Option<DateTime<Utc>>,
}

/// Physical dimensions in centimeters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: Decimal,
    pub width: Decimal,
    pub height: Decimal,
}

/// Product-level shipping metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingProfile {
    #[serde(default)]
    pub weight_kg: Option<Decimal>,
    #[serde(default)]
    pub dimensions_cm: Option<Dimensions>,
    #[serde(default)]
    pub origin: Option<ShippingOrigin>,
    #[serde(default)]
    pub free_shipping_over: Option<Decimal>,
    #[serde(default)]
    pub eligible_shipping_methods: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingOrigin {
    pub warehouse_id: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warranty {
    #[serde(rename = "type")]
    pub kind: String,
    pub duration_days: u32,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnPolicy {
    pub days_window: u32,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub restocking_fee: Option<Decimal>,
    #[serde(default)]
    pub who_pays_return_shipping: Option<String>,
    #[serde(default)]
    pub exceptions: Vec<String>,
}
