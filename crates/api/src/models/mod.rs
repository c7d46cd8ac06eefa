//! Domain documents stored as JSON.
//!
//! Each model implements [`Document`](crate::store::Document) with its
//! collection name and owns the helpers that keep its internal invariants
//! consistent (cart totals, order history, shipment events, preferred
//! flags). Services call those helpers; they never edit derived fields
//! directly.

pub mod cart;
pub mod checkout;
pub mod order;
pub mod product;
pub mod shipment;
pub mod user;

pub use cart::{AppliedCoupon, Cart, CartItem};
pub use checkout::{Checkout, CheckoutPayment, OrderReview, ShippingMethod};
pub use order::{
    DeliveryWindow, Fulfillment, Order, OrderItem, OrderPayment, OrderShipping, OrderTotals,
    OrderTracking, Packing, PickListItem, StatusHistoryEntry,
};
pub use product::{
    Dimensions, Discount, DiscountKind, Inventory, Product, ReturnPolicy, ShippingOrigin,
    ShippingProfile, Variant, VariantPrice, Warranty,
};
pub use shipment::{PackageDetails, PackageType, Shipment, ShipmentItem, TrackingEvent};
pub use user::{Address, PaymentMethod, PaymentMethodKind, User};
