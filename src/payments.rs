//! Payment sessions for non-cash orders.
//!
//! Placement with an online payment method creates a checkout session and
//! hands its URL back to the storefront; the order itself is already
//! persisted and gets reconciled by the verify endpoint once the customer
//! returns. The gateway wire call is out of scope here, so the session is
//! represented locally and the redirect targets the frontend verify page.

use uuid::Uuid;

use crate::{config::Config, models::Order};

/// Flat delivery charge added to every checkout, in whole currency units.
pub const DELIVERY_FEE: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct LineItem {
    pub name: String,
    /// Unit price in the gateway's smallest currency unit (cents).
    pub unit_amount: i64,
    pub quantity: u32,
}

#[derive(Debug, Clone)]
pub struct PaymentSession {
    pub id: String,
    pub amount_due: i64,
    pub url: String,
}

pub fn line_items(order: &Order) -> Vec<LineItem> {
    let mut items: Vec<LineItem> = order
        .items
        .iter()
        .map(|line| LineItem {
            name: line.name.clone(),
            unit_amount: (line.price * 100.0).round() as i64,
            quantity: line.quantity,
        })
        .collect();

    items.push(LineItem {
        name: "Delivery Charges".to_string(),
        unit_amount: (DELIVERY_FEE * 100.0).round() as i64,
        quantity: 1,
    });

    items
}

pub fn create_session(config: &Config, order: &Order) -> PaymentSession {
    let items = line_items(order);
    let amount_due = items
        .iter()
        .map(|item| item.unit_amount * i64::from(item.quantity))
        .sum();

    PaymentSession {
        id: Uuid::new_v4().to_string(),
        amount_due,
        url: format!("{}/verify?orderId={}", config.frontend_url, order.id),
    }
}
