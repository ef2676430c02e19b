//! Order workflow.
//!
//! Owns the status state machine and its side effects:
//!
//! ```text
//! pending_acceptance --accept--> Food Processing --> Out for delivery --> Delivered (record deleted)
//!        |
//!        +--reject--> rejected          +--cancel (customer)--> cancelled
//! ```
//!
//! Every transition is an atomic check-and-set against the store, so two
//! racing decisions on one order resolve to a single winner. Notifications
//! are best effort: a failed insert is logged and never fails the order
//! operation that produced it.

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::Config,
    database::{StatusPatch, StatusSwap, Store},
    error::AppError,
    models::{Notification, NotificationType, Order, OrderItem, OrderStatus, User},
    payments,
};

/// Outcome of a successful placement.
#[derive(Debug)]
pub enum Placement {
    /// Cash on delivery: the order is live immediately.
    Placed,
    /// Online payment: the customer is sent to checkout first.
    Checkout { session_url: String },
}

pub struct PlaceOrder {
    pub items: Vec<OrderItem>,
    pub amount: f64,
    pub address: Value,
    pub payment_method: String,
}

pub enum Verification {
    Paid,
    NotPaid,
}

async fn notify(store: &dyn Store, notification: Notification) {
    if let Err(e) = store.put_notification(&notification).await {
        warn!(recipient = %notification.user_id, error = %e, "failed to record notification");
    }
}

/// Single-restaurant rule: every line must be attributed to the same owner.
fn sole_owner(items: &[OrderItem]) -> Result<String, AppError> {
    let mut owners = items.iter().map(|line| line.added_by.as_str());

    let first = owners
        .next()
        .ok_or_else(|| AppError::Validation("Order must contain at least one item".to_string()))?;

    if owners.any(|owner| owner != first) {
        return Err(AppError::Validation(
            "All items in an order must be from the same restaurant".to_string(),
        ));
    }

    Ok(first.to_string())
}

pub async fn place(
    store: &dyn Store,
    config: &Config,
    customer: &User,
    request: PlaceOrder,
) -> Result<Placement, AppError> {
    let owner_id = sole_owner(&request.items)?;
    let now = Utc::now();

    let order = Order {
        id: Uuid::new_v4().to_string(),
        customer_id: customer.id.clone(),
        items: request.items,
        amount: request.amount,
        address: request.address,
        payment_method: request.payment_method,
        payment: false,
        status: OrderStatus::PendingAcceptance,
        restaurant_owner_ids: vec![owner_id.clone()],
        delivery_contact: String::new(),
        created_at: now,
        updated_at: now,
        cancellation_reason: None,
        cancelled_at: None,
    };
    store.put_order(&order).await?;

    let mut customer = customer.clone();
    customer.cart.clear();
    store.put_user(&customer).await?;

    notify(
        store,
        Notification::new(
            &owner_id,
            "New Order Received",
            format!(
                "A new order worth ${:.2} needs your attention. Accept or reject it.",
                order.amount
            ),
            NotificationType::OrderPlaced,
            Some(order.id.clone()),
        ),
    )
    .await;

    info!(order_id = %order.id, owner_id = %owner_id, "order placed");

    if order.payment_method == "cod" {
        Ok(Placement::Placed)
    } else {
        let session = payments::create_session(config, &order);
        info!(order_id = %order.id, session_id = %session.id, "payment session created");
        Ok(Placement::Checkout {
            session_url: session.url,
        })
    }
}

/// Reconcile an online payment. Success marks the order paid; failure removes
/// the order entirely. No notification either way.
pub async fn verify(
    store: &dyn Store,
    order_id: &str,
    success: bool,
) -> Result<Verification, AppError> {
    if success {
        let mut order = store
            .order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
        order.payment = true;
        order.updated_at = Utc::now();
        store.put_order(&order).await?;
        Ok(Verification::Paid)
    } else {
        store.delete_order(order_id).await?;
        Ok(Verification::NotPaid)
    }
}

pub async fn cancel(
    store: &dyn Store,
    customer: &User,
    order_id: &str,
    reason: Option<String>,
) -> Result<(), AppError> {
    let order = store
        .order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    if order.customer_id != customer.id {
        return Err(AppError::Unauthorized(
            "You can only cancel your own orders".to_string(),
        ));
    }

    let reason = reason.unwrap_or_else(|| "Customer cancelled the order".to_string());
    let patch = StatusPatch {
        status: OrderStatus::Cancelled,
        updated_at: Utc::now(),
        cancellation_reason: Some(reason.clone()),
        cancelled_at: Some(Utc::now()),
    };

    match store
        .swap_order_status(order_id, &[OrderStatus::PendingAcceptance], patch)
        .await?
    {
        StatusSwap::Updated { .. } => {}
        StatusSwap::Conflict { .. } => {
            return Err(AppError::InvalidTransition(
                "Order can no longer be cancelled".to_string(),
            ))
        }
        StatusSwap::Missing => {
            return Err(AppError::NotFound("Order not found".to_string()));
        }
    }

    if let Some(owner_id) = owner_of(store, &order).await? {
        notify(
            store,
            Notification::new(
                owner_id,
                "Order Cancelled",
                format!("An order was cancelled by the customer: {reason}"),
                NotificationType::OrderStatus,
                Some(order.id.clone()),
            ),
        )
        .await;
    }

    info!(order_id = %order.id, "order cancelled by customer");
    Ok(())
}

/// The owner a cancellation should reach. Resolved from the first line's
/// attribution; legacy lines without one fall back to the catalog.
async fn owner_of(store: &dyn Store, order: &Order) -> Result<Option<String>, AppError> {
    match order.items.first() {
        Some(line) if !line.added_by.is_empty() => Ok(Some(line.added_by.clone())),
        Some(line) => Ok(store.food(&line.id).await?.map(|food| food.added_by)),
        None => Ok(None),
    }
}

fn check_ownership(order: &Order, owner: &User) -> Result<(), AppError> {
    if !order.restaurant_owner_ids.iter().any(|id| id == &owner.id) {
        return Err(AppError::Unauthorized(
            "This order does not belong to your restaurant".to_string(),
        ));
    }
    Ok(())
}

pub async fn accept(store: &dyn Store, owner: &User, order_id: &str) -> Result<(), AppError> {
    let order = store
        .order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    check_ownership(&order, owner)?;

    match store
        .swap_order_status(
            order_id,
            &[OrderStatus::PendingAcceptance],
            StatusPatch::to(OrderStatus::FoodProcessing),
        )
        .await?
    {
        StatusSwap::Updated { .. } => {}
        StatusSwap::Conflict { .. } => {
            return Err(AppError::InvalidTransition(
                "Order has already been processed".to_string(),
            ))
        }
        StatusSwap::Missing => {
            return Err(AppError::NotFound("Order not found".to_string()));
        }
    }

    notify(
        store,
        Notification::new(
            &order.customer_id,
            "Order Accepted",
            "Your order has been accepted and is now being prepared.",
            NotificationType::OrderStatus,
            Some(order.id.clone()),
        ),
    )
    .await;

    info!(order_id = %order.id, owner_id = %owner.id, "order accepted");
    Ok(())
}

pub async fn reject(
    store: &dyn Store,
    owner: &User,
    order_id: &str,
    reason: Option<String>,
) -> Result<(), AppError> {
    let order = store
        .order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    check_ownership(&order, owner)?;

    match store
        .swap_order_status(
            order_id,
            &[OrderStatus::PendingAcceptance],
            StatusPatch::to(OrderStatus::Rejected),
        )
        .await?
    {
        StatusSwap::Updated { .. } => {}
        StatusSwap::Conflict { .. } => {
            return Err(AppError::InvalidTransition(
                "Order has already been processed".to_string(),
            ))
        }
        StatusSwap::Missing => {
            return Err(AppError::NotFound("Order not found".to_string()));
        }
    }

    let message = match reason {
        Some(reason) => format!("Your order was rejected by the restaurant: {reason}"),
        None => "Your order was rejected by the restaurant.".to_string(),
    };
    notify(
        store,
        Notification::new(
            &order.customer_id,
            "Order Rejected",
            message,
            NotificationType::OrderStatus,
            Some(order.id.clone()),
        ),
    )
    .await;

    info!(order_id = %order.id, owner_id = %owner.id, "order rejected");
    Ok(())
}

/// Owner progression past acceptance. The order must already be accepted and
/// still in flight; `Delivered` notifies, deletes the record, then sweeps.
pub async fn update_status(
    store: &dyn Store,
    owner: &User,
    order_id: &str,
    new_status: OrderStatus,
) -> Result<(), AppError> {
    if !matches!(
        new_status,
        OrderStatus::FoodProcessing | OrderStatus::OutForDelivery | OrderStatus::Delivered
    ) {
        return Err(AppError::Validation("Invalid status".to_string()));
    }

    let order = store
        .order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    check_ownership(&order, owner)?;

    match store
        .swap_order_status(
            order_id,
            &[OrderStatus::FoodProcessing, OrderStatus::OutForDelivery],
            StatusPatch::to(new_status),
        )
        .await?
    {
        StatusSwap::Updated { .. } => {}
        StatusSwap::Conflict {
            current: OrderStatus::PendingAcceptance,
        } => {
            return Err(AppError::InvalidTransition(
                "Accept or reject the order first".to_string(),
            ))
        }
        StatusSwap::Conflict { .. } => {
            return Err(AppError::InvalidTransition(
                "Order can no longer be updated".to_string(),
            ))
        }
        StatusSwap::Missing => {
            return Err(AppError::NotFound("Order not found".to_string()));
        }
    }

    finish_status_change(store, &order, new_status).await?;

    info!(order_id = %order.id, status = %new_status, "order status updated");
    Ok(())
}

/// Admin override: no ownership check and no current-status guard.
pub async fn admin_update_status(
    store: &dyn Store,
    order_id: &str,
    new_status: OrderStatus,
) -> Result<(), AppError> {
    let order = store
        .order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    match store
        .swap_order_status(order_id, &OrderStatus::ALL, StatusPatch::to(new_status))
        .await?
    {
        StatusSwap::Updated { .. } | StatusSwap::Conflict { .. } => {}
        StatusSwap::Missing => {
            return Err(AppError::NotFound("Order not found".to_string()));
        }
    }

    finish_status_change(store, &order, new_status).await?;

    info!(order_id = %order.id, status = %new_status, "order status updated by admin");
    Ok(())
}

async fn finish_status_change(
    store: &dyn Store,
    order: &Order,
    new_status: OrderStatus,
) -> Result<(), AppError> {
    if new_status == OrderStatus::Delivered {
        notify(
            store,
            Notification::new(
                &order.customer_id,
                "Order Delivered",
                "Your order has been delivered. Enjoy your meal!",
                NotificationType::OrderDelivered,
                Some(order.id.clone()),
            ),
        )
        .await;

        // Delivered orders are not retained.
        store.delete_order(&order.id).await?;
        auto_remove_delivered(store).await?;
    } else {
        notify(
            store,
            Notification::new(
                &order.customer_id,
                "Order Status Updated",
                format!("Your order is now: {new_status}"),
                NotificationType::OrderStatus,
                Some(order.id.clone()),
            ),
        )
        .await;
    }

    Ok(())
}

fn newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

pub async fn list_for_customer(store: &dyn Store, customer: &User) -> Result<Vec<Order>, AppError> {
    let mut orders: Vec<Order> = store
        .orders()
        .await?
        .into_iter()
        .filter(|order| order.customer_id == customer.id)
        .collect();
    newest_first(&mut orders);
    Ok(orders)
}

pub async fn list_all(store: &dyn Store) -> Result<Vec<Order>, AppError> {
    let mut orders = store.orders().await?;
    newest_first(&mut orders);
    Ok(orders)
}

/// Orders with at least one line attributed to this owner, each projected
/// down to only that owner's lines. Historical documents may still hold
/// lines from several restaurants.
pub async fn list_for_owner(store: &dyn Store, owner: &User) -> Result<Vec<Order>, AppError> {
    let mut orders = Vec::new();

    for mut order in store.orders().await? {
        let mine: Vec<OrderItem> = order
            .items
            .iter()
            .filter(|line| line.added_by == owner.id)
            .cloned()
            .collect();
        if mine.is_empty() {
            continue;
        }
        order.items = mine;
        orders.push(order);
    }

    newest_first(&mut orders);
    Ok(orders)
}

/// Bulk cleanup of delivered orders. A no-op when none exist.
pub async fn remove_delivered(store: &dyn Store) -> Result<usize, AppError> {
    let mut removed = 0;

    for order in store.orders().await? {
        if order.status == OrderStatus::Delivered && store.delete_order(&order.id).await? {
            removed += 1;
        }
    }

    if removed > 0 {
        info!(removed, "removed delivered orders");
    }
    Ok(removed)
}

async fn auto_remove_delivered(store: &dyn Store) -> Result<(), AppError> {
    remove_delivered(store).await?;
    Ok(())
}
