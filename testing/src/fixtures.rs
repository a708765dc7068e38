//! Order fixtures.

use order_mirror_core::checkpoint::Position;
use order_mirror_core::model::{Delivery, Item, Order, Payment};
use order_mirror_core::transport::Message;

/// A complete, valid order with one item.
///
/// The customer name and transaction id derive from `order_uid`, so two
/// fixtures with different ids do not share rows.
#[must_use]
pub fn sample_order(order_uid: &str, chrt_id: i64) -> Order {
    Order {
        order_uid: order_uid.to_string(),
        track_number: "WBILMTESTTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: format!("Test Testov {order_uid}"),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        },
        payment: Payment {
            transaction: format!("tx-{order_uid}"),
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
        items: vec![item(chrt_id)],
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

/// A complete, valid item.
#[must_use]
pub fn item(chrt_id: i64) -> Item {
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

/// Wire payload for `order`.
#[must_use]
pub fn payload(order: &Order) -> Vec<u8> {
    serde_json::to_vec(order).unwrap()
}

/// A delivered message carrying `order` at `position`.
#[must_use]
pub fn message(position: u64, order: &Order) -> Message {
    raw_message(position, payload(order))
}

/// A delivered message with an arbitrary payload.
#[must_use]
pub fn raw_message(position: u64, payload: impl Into<Vec<u8>>) -> Message {
    Message {
        position: Position::new(position).unwrap(),
        payload: payload.into(),
    }
}
