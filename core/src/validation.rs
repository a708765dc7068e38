//! Structural validation of decoded orders.
//!
//! A field is required unless documented as optional on the model. Strings
//! must be non-empty and integers non-zero. Validation stops at the first
//! violation and reports its path, e.g. `delivery.phone` or `items[2].chrt_id`.
//!
//! No string, optional or not, may contain a NUL character: the relational
//! store cannot hold one, so such an order could never be persisted.

use crate::model::{Delivery, Item, Order, Payment};
use thiserror::Error;

/// The first required field found missing or empty.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is empty or zero.
    #[error("Required field '{0}' is missing or empty")]
    MissingField(String),

    /// The order carries no items.
    #[error("Order has no items")]
    NoItems,

    /// A string field contains a NUL character.
    #[error("Field '{0}' contains a NUL character")]
    NulCharacter(String),
}

impl ValidationError {
    /// Path of the offending field (`items` for [`ValidationError::NoItems`]).
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::MissingField(field) | Self::NulCharacter(field) => field,
            Self::NoItems => "items",
        }
    }
}

/// Something that can be checked for completeness.
pub trait Validate {
    /// Check all required fields.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered.
    fn validate(&self) -> Result<(), ValidationError>;
}

fn text(value: &str, field: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::MissingField(field.to_string()));
    }
    storable(value, field)
}

fn storable(value: &str, field: &str) -> Result<(), ValidationError> {
    if value.contains('\0') {
        return Err(ValidationError::NulCharacter(field.to_string()));
    }
    Ok(())
}

fn number<T: Default + PartialEq>(value: T, field: &str) -> Result<(), ValidationError> {
    if value == T::default() {
        return Err(ValidationError::MissingField(field.to_string()));
    }
    Ok(())
}

impl Validate for Delivery {
    fn validate(&self) -> Result<(), ValidationError> {
        text(&self.name, "delivery.name")?;
        text(&self.phone, "delivery.phone")?;
        text(&self.zip, "delivery.zip")?;
        text(&self.city, "delivery.city")?;
        text(&self.address, "delivery.address")?;
        text(&self.region, "delivery.region")?;
        text(&self.email, "delivery.email")
    }
}

impl Validate for Payment {
    fn validate(&self) -> Result<(), ValidationError> {
        text(&self.transaction, "payment.transaction")?;
        storable(&self.request_id, "payment.request_id")?;
        text(&self.currency, "payment.currency")?;
        text(&self.provider, "payment.provider")?;
        number(self.amount, "payment.amount")?;
        number(self.payment_dt, "payment.payment_dt")?;
        text(&self.bank, "payment.bank")?;
        number(self.delivery_cost, "payment.delivery_cost")?;
        number(self.goods_total, "payment.goods_total")
    }
}

fn validate_item(item: &Item, index: usize) -> Result<(), ValidationError> {
    let field = |name: &str| format!("items[{index}].{name}");

    number(item.chrt_id, &field("chrt_id"))?;
    text(&item.track_number, &field("track_number"))?;
    number(item.price, &field("price"))?;
    text(&item.rid, &field("rid"))?;
    text(&item.name, &field("name"))?;
    number(item.sale, &field("sale"))?;
    text(&item.size, &field("size"))?;
    number(item.total_price, &field("total_price"))?;
    number(item.nm_id, &field("nm_id"))?;
    text(&item.brand, &field("brand"))?;
    number(item.status, &field("status"))
}

impl Validate for Order {
    fn validate(&self) -> Result<(), ValidationError> {
        text(&self.order_uid, "order_uid")?;
        text(&self.track_number, "track_number")?;
        text(&self.entry, "entry")?;
        self.delivery.validate()?;
        self.payment.validate()?;
        if self.items.is_empty() {
            return Err(ValidationError::NoItems);
        }
        for (index, item) in self.items.iter().enumerate() {
            validate_item(item, index)?;
        }
        text(&self.locale, "locale")?;
        storable(&self.internal_signature, "internal_signature")?;
        text(&self.customer_id, "customer_id")?;
        text(&self.delivery_service, "delivery_service")?;
        text(&self.shardkey, "shardkey")?;
        number(self.sm_id, "sm_id")?;
        text(&self.date_created, "date_created")?;
        text(&self.oof_shard, "oof_shard")
    }
}

/// Validate a decoded order.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
pub fn validate(order: &Order) -> Result<(), ValidationError> {
    order.validate()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn complete_item(chrt_id: i64) -> Item {
        Item {
            chrt_id,
            track_number: "WBILMTESTTRACK".to_string(),
            price: 453,
            rid: "ab4219087a764ae0btest".to_string(),
            name: "Mascaras".to_string(),
            sale: 30,
            size: "0".to_string(),
            total_price: 317,
            nm_id: 2_389_212,
            brand: "Vivienne Sabo".to_string(),
            status: 202,
        }
    }

    fn complete_order() -> Order {
        Order {
            order_uid: "b563feb7b2b84b6test".to_string(),
            track_number: "WBILMTESTTRACK".to_string(),
            entry: "WBIL".to_string(),
            delivery: Delivery {
                name: "Test Testov".to_string(),
                phone: "+9720000000".to_string(),
                zip: "2639809".to_string(),
                city: "Kiryat Mozkin".to_string(),
                address: "Ploshad Mira 15".to_string(),
                region: "Kraiot".to_string(),
                email: "test@gmail.com".to_string(),
            },
            payment: Payment {
                transaction: "b563feb7b2b84b6test".to_string(),
                request_id: String::new(),
                currency: "USD".to_string(),
                provider: "wbpay".to_string(),
                amount: 1817,
                payment_dt: 1_637_907_727,
                bank: "alpha".to_string(),
                delivery_cost: 1500,
                goods_total: 317,
                custom_fee: 0,
            },
            items: vec![complete_item(9_934_930)],
            locale: "en".to_string(),
            internal_signature: String::new(),
            customer_id: "test".to_string(),
            delivery_service: "meest".to_string(),
            shardkey: "9".to_string(),
            sm_id: 99,
            date_created: "2021-11-26T06:22:19Z".to_string(),
            oof_shard: "1".to_string(),
        }
    }

    #[test]
    fn complete_order_is_valid() {
        assert_eq!(validate(&complete_order()), Ok(()));
    }

    #[test]
    fn optional_fields_may_be_empty() {
        let order = complete_order();
        assert!(order.internal_signature.is_empty());
        assert!(order.payment.request_id.is_empty());
        assert_eq!(order.payment.custom_fee, 0);
        assert!(validate(&order).is_ok());
    }

    #[test]
    fn empty_order_uid_is_rejected() {
        let mut order = complete_order();
        order.order_uid.clear();
        assert_eq!(validate(&order).unwrap_err().field(), "order_uid");
    }

    #[test]
    fn empty_item_list_is_rejected() {
        let mut order = complete_order();
        order.items.clear();
        assert_eq!(validate(&order), Err(ValidationError::NoItems));
    }

    #[test]
    fn zero_chrt_id_is_rejected_with_item_index() {
        let mut order = complete_order();
        order.items.push(complete_item(0));
        assert_eq!(validate(&order).unwrap_err().field(), "items[1].chrt_id");
    }

    #[test]
    fn nested_customer_field_is_reported() {
        let mut order = complete_order();
        order.delivery.email.clear();
        assert_eq!(validate(&order).unwrap_err().field(), "delivery.email");
    }

    #[test]
    fn first_violation_wins() {
        let mut order = complete_order();
        order.entry.clear();
        order.payment.bank.clear();
        assert_eq!(validate(&order).unwrap_err().field(), "entry");
    }

    #[test]
    fn nul_character_in_required_field_is_rejected() {
        let mut order = complete_order();
        order.delivery.name = "Ann\0".to_string();
        assert_eq!(
            validate(&order),
            Err(ValidationError::NulCharacter("delivery.name".to_string()))
        );
    }

    #[test]
    fn nul_character_in_optional_field_is_rejected() {
        let mut order = complete_order();
        order.payment.request_id = "\0".to_string();
        assert_eq!(validate(&order).unwrap_err().field(), "payment.request_id");

        let mut order = complete_order();
        order.internal_signature = "sig\0".to_string();
        assert_eq!(validate(&order).unwrap_err().field(), "internal_signature");
    }

    #[test]
    fn nul_from_json_escape_is_rejected() {
        let mut document: serde_json::Value = serde_json::to_value(complete_order()).unwrap();
        document["items"][0]["brand"] = serde_json::Value::String("Viv\u{0}".to_string());
        let order = Order::from_slice(&serde_json::to_vec(&document).unwrap()).unwrap();

        assert_eq!(validate(&order).unwrap_err().field(), "items[0].brand");
    }

    #[test]
    fn default_order_is_rejected() {
        assert!(validate(&Order::default()).is_err());
    }

    proptest! {
        #[test]
        fn clearing_any_required_string_is_rejected(index in 0usize..10) {
            let mut order = complete_order();
            let target = match index {
                0 => &mut order.track_number,
                1 => &mut order.entry,
                2 => &mut order.locale,
                3 => &mut order.customer_id,
                4 => &mut order.delivery_service,
                5 => &mut order.shardkey,
                6 => &mut order.date_created,
                7 => &mut order.oof_shard,
                8 => &mut order.payment.currency,
                _ => &mut order.items[0].brand,
            };
            target.clear();
            prop_assert!(validate(&order).is_err());
        }

        #[test]
        fn any_non_zero_ids_keep_item_valid(chrt_id in 1i64.., nm_id in 1i64..) {
            let mut order = complete_order();
            order.items[0].chrt_id = chrt_id;
            order.items[0].nm_id = nm_id;
            prop_assert!(validate(&order).is_ok());
        }
    }
}
