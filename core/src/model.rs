//! Order document model.
//!
//! These types mirror the JSON payload published on the order stream. Every
//! struct is `#[serde(default)]`: a missing key decodes to an empty value and is
//! rejected later by [`crate::validation`], so only malformed JSON or a type
//! mismatch counts as a decode failure.
//!
//! # Example
//!
//! ```
//! use order_mirror_core::model::Order;
//!
//! let order = Order::from_slice(br#"{"order_uid": "ord-1"}"#).unwrap();
//! assert_eq!(order.order_uid, "ord-1");
//! assert!(order.items.is_empty());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failed to decode a payload into an [`Order`].
#[derive(Error, Debug)]
#[error("Failed to decode order payload: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// A complete order as delivered on the stream and mirrored in the cache.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    /// Globally unique order identifier (primary key).
    pub order_uid: String,
    /// Tracking number.
    pub track_number: String,
    /// Entry code.
    pub entry: String,
    /// Recipient of the order.
    pub delivery: Delivery,
    /// Payment made for the order.
    pub payment: Payment,
    /// Ordered line items; must be non-empty.
    pub items: Vec<Item>,
    /// Locale.
    pub locale: String,
    /// Internal signature (optional).
    pub internal_signature: String,
    /// Customer identifier.
    pub customer_id: String,
    /// Delivery service name.
    pub delivery_service: String,
    /// Shard key.
    pub shardkey: String,
    /// Shard-manager id.
    pub sm_id: i32,
    /// Creation timestamp, kept as the opaque string the producer sent.
    pub date_created: String,
    /// Out-of-flow shard.
    pub oof_shard: String,
}

/// Customer the order is delivered to.
///
/// Persisted keyed by `name`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delivery {
    /// Customer name (natural dedup key).
    pub name: String,
    /// Phone number.
    pub phone: String,
    /// Postal code.
    pub zip: String,
    /// City.
    pub city: String,
    /// Street address.
    pub address: String,
    /// Region.
    pub region: String,
    /// Email address.
    pub email: String,
}

/// Payment for an order, keyed by `transaction`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payment {
    /// Transaction id (primary key).
    pub transaction: String,
    /// Request id (optional).
    #[serde(alias = "requset_id")]
    pub request_id: String,
    /// Currency code.
    pub currency: String,
    /// Payment provider.
    pub provider: String,
    /// Amount paid.
    pub amount: i32,
    /// Payment time in epoch seconds.
    pub payment_dt: i64,
    /// Bank.
    pub bank: String,
    /// Delivery cost.
    pub delivery_cost: i32,
    /// Total price of the goods.
    pub goods_total: i32,
    /// Custom fee (optional).
    pub custom_fee: i32,
}

/// A line item, keyed by `chrt_id` across the whole system.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    /// Item id (primary key across all orders).
    pub chrt_id: i64,
    /// Tracking number.
    pub track_number: String,
    /// Price.
    pub price: i32,
    /// Rid.
    pub rid: String,
    /// Item name.
    pub name: String,
    /// Sale percentage.
    pub sale: i32,
    /// Size.
    pub size: String,
    /// Total price after sale.
    pub total_price: i32,
    /// Nomenclature id.
    pub nm_id: i64,
    /// Brand.
    pub brand: String,
    /// Status code.
    pub status: i32,
}

impl Order {
    /// Decode an order from a raw stream payload.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the payload is not valid JSON or a field has
    /// the wrong type. Missing fields are not an error here.
    pub fn from_slice(payload: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Serialize the full document, as stored in a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize the full document indented for display.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if serialization fails.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
