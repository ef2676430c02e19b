//! End-to-end order lifecycle scenarios against the in-memory store.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use serde_json::json;

use crate::{
    database::Store,
    error::AppError,
    mock_store::{test_config, MemStore},
    models::{Notification, NotificationType, Order, OrderItem, OrderStatus, Role, User},
    notifications, users,
    users::{LoginRequest, RegisterRequest},
    workflow::{self, PlaceOrder, Placement, Verification},
};

fn user(id: &str, role: Role, approved: bool) -> User {
    User {
        id: id.to_string(),
        name: format!("{id} name"),
        email: format!("{id}@example.com"),
        password: String::new(),
        role,
        is_approved: approved,
        restaurant_name: None,
        restaurant_address: None,
        cart: HashMap::new(),
        created_at: Utc::now(),
    }
}

fn customer() -> User {
    user("cust-1", Role::Customer, true)
}

fn owner() -> User {
    user("owner-1", Role::RestaurantOwner, true)
}

fn line(food: &str, owner_id: &str, price: f64, quantity: u32) -> OrderItem {
    OrderItem {
        id: food.to_string(),
        name: format!("{food} dish"),
        price,
        quantity,
        added_by: owner_id.to_string(),
    }
}

async fn place(
    store: &MemStore,
    customer: &User,
    items: Vec<OrderItem>,
    payment_method: &str,
) -> Placement {
    workflow::place(
        store,
        &test_config(),
        customer,
        PlaceOrder {
            items,
            amount: 20.0,
            address: json!({ "street": "1 Main St", "city": "Springfield" }),
            payment_method: payment_method.to_string(),
        },
    )
    .await
    .unwrap()
}

async fn place_cod(store: &MemStore, customer: &User) -> Order {
    let placement = place(
        store,
        customer,
        vec![
            line("food-1", "owner-1", 8.5, 2),
            line("food-2", "owner-1", 3.0, 1),
        ],
        "cod",
    )
    .await;
    assert!(matches!(placement, Placement::Placed));

    let mut orders = store.orders().await.unwrap();
    assert_eq!(orders.len(), 1);
    orders.pop().unwrap()
}

#[tokio::test]
async fn placing_items_from_two_restaurants_fails() {
    let store = MemStore::new();

    let err = workflow::place(
        &store,
        &test_config(),
        &customer(),
        PlaceOrder {
            items: vec![
                line("food-1", "owner-1", 8.5, 1),
                line("food-9", "owner-2", 5.0, 1),
            ],
            amount: 13.5,
            address: json!({}),
            payment_method: "cod".to_string(),
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert!(store.orders().await.unwrap().is_empty());
}

#[tokio::test]
async fn cod_placement_creates_pending_order_and_notifies_only_the_owner() {
    let store = MemStore::new();
    let mut cust = customer();
    cust.cart.insert("food-1".to_string(), 2);
    store.put_user(&cust).await.unwrap();

    let order = place_cod(&store, &cust).await;

    assert_eq!(order.status, OrderStatus::PendingAcceptance);
    assert_eq!(order.restaurant_owner_ids, vec!["owner-1".to_string()]);
    assert!(!order.payment);

    let owner_feed = store.notifications_for("owner-1").await.unwrap();
    assert_eq!(owner_feed.len(), 1);
    assert_eq!(owner_feed[0].kind, NotificationType::OrderPlaced);
    assert_eq!(owner_feed[0].order_id.as_deref(), Some(order.id.as_str()));

    // The final placement path sends nothing to the customer.
    assert!(store.notifications_for("cust-1").await.unwrap().is_empty());

    // Placement empties the cart.
    let stored = store.user("cust-1").await.unwrap().unwrap();
    assert!(stored.cart.is_empty());
}

#[tokio::test]
async fn online_placement_returns_checkout_and_keeps_the_order() {
    let store = MemStore::new();

    let placement = place(
        &store,
        &customer(),
        vec![line("food-1", "owner-1", 8.5, 1)],
        "card",
    )
    .await;

    let Placement::Checkout { session_url } = placement else {
        panic!("expected a checkout redirect");
    };
    let order = store.orders().await.unwrap().pop().unwrap();
    assert!(session_url.contains(&order.id));
    assert_eq!(order.status, OrderStatus::PendingAcceptance);
}

#[tokio::test]
async fn verify_reconciles_payment_outcome() {
    let store = MemStore::new();
    let order = place_cod(&store, &customer()).await;

    let outcome = workflow::verify(&store, &order.id, true).await.unwrap();
    assert!(matches!(outcome, Verification::Paid));
    assert!(store.order(&order.id).await.unwrap().unwrap().payment);

    let outcome = workflow::verify(&store, &order.id, false).await.unwrap();
    assert!(matches!(outcome, Verification::NotPaid));
    assert!(store.order(&order.id).await.unwrap().is_none());
}

#[tokio::test]
async fn foreign_owner_cannot_decide_on_the_order() {
    let store = MemStore::new();
    let order = place_cod(&store, &customer()).await;
    let intruder = user("owner-2", Role::RestaurantOwner, true);

    let err = workflow::accept(&store, &intruder, &order.id).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    let err = workflow::update_status(&store, &intruder, &order.id, OrderStatus::Delivered)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    let untouched = store.order(&order.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, OrderStatus::PendingAcceptance);
}

#[tokio::test]
async fn accept_moves_order_to_processing_and_notifies_customer() {
    let store = MemStore::new();
    let order = place_cod(&store, &customer()).await;

    workflow::accept(&store, &owner(), &order.id).await.unwrap();

    let accepted = store.order(&order.id).await.unwrap().unwrap();
    assert_eq!(accepted.status, OrderStatus::FoodProcessing);

    let feed = store.notifications_for("cust-1").await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].kind, NotificationType::OrderStatus);
    assert_eq!(feed[0].title, "Order Accepted");
}

#[tokio::test]
async fn second_decision_on_the_same_order_conflicts() {
    let store = MemStore::new();
    let order = place_cod(&store, &customer()).await;

    workflow::accept(&store, &owner(), &order.id).await.unwrap();
    let err = workflow::reject(&store, &owner(), &order.id, None)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidTransition(_)));
    let unchanged = store.order(&order.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, OrderStatus::FoodProcessing);
}

#[tokio::test]
async fn reject_records_reason_in_the_customer_notification() {
    let store = MemStore::new();
    let order = place_cod(&store, &customer()).await;

    workflow::reject(&store, &owner(), &order.id, Some("Out of stock".to_string()))
        .await
        .unwrap();

    assert_eq!(
        store.order(&order.id).await.unwrap().unwrap().status,
        OrderStatus::Rejected
    );
    let feed = store.notifications_for("cust-1").await.unwrap();
    assert!(feed[0].message.contains("Out of stock"));
}

#[tokio::test]
async fn customer_can_cancel_while_pending() {
    let store = MemStore::new();
    let order = place_cod(&store, &customer()).await;

    workflow::cancel(&store, &customer(), &order.id, Some("Changed my mind".to_string()))
        .await
        .unwrap();

    let cancelled = store.order(&order.id).await.unwrap().unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Changed my mind"));
    assert!(cancelled.cancelled_at.is_some());

    // The owner hears about it; resolved from the line attribution.
    let owner_feed = store.notifications_for("owner-1").await.unwrap();
    assert_eq!(owner_feed.len(), 2);
    assert!(owner_feed.iter().any(|n| n.title == "Order Cancelled"));
}

#[tokio::test]
async fn cancel_fails_once_the_restaurant_accepted() {
    let store = MemStore::new();
    let order = place_cod(&store, &customer()).await;
    workflow::accept(&store, &owner(), &order.id).await.unwrap();

    let err = workflow::cancel(&store, &customer(), &order.id, None)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidTransition(_)));
    let unchanged = store.order(&order.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, OrderStatus::FoodProcessing);
    assert!(unchanged.cancellation_reason.is_none());
}

#[tokio::test]
async fn cancel_requires_owning_the_order() {
    let store = MemStore::new();
    let order = place_cod(&store, &customer()).await;
    let other = user("cust-2", Role::Customer, true);

    let err = workflow::cancel(&store, &other, &order.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn owner_progression_requires_prior_acceptance() {
    let store = MemStore::new();
    let order = place_cod(&store, &customer()).await;

    let err = workflow::update_status(&store, &owner(), &order.id, OrderStatus::OutForDelivery)
        .await
        .unwrap_err();

    match err {
        AppError::InvalidTransition(message) => {
            assert!(message.contains("Accept or reject"))
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn delivered_order_is_deleted_and_customer_notified() {
    let store = MemStore::new();
    let order = place_cod(&store, &customer()).await;

    workflow::accept(&store, &owner(), &order.id).await.unwrap();
    workflow::update_status(&store, &owner(), &order.id, OrderStatus::OutForDelivery)
        .await
        .unwrap();
    workflow::update_status(&store, &owner(), &order.id, OrderStatus::Delivered)
        .await
        .unwrap();

    assert!(store.order(&order.id).await.unwrap().is_none());

    let mine = workflow::list_for_customer(&store, &customer()).await.unwrap();
    assert!(mine.is_empty());

    let feed = store.notifications_for("cust-1").await.unwrap();
    assert!(feed
        .iter()
        .any(|n| n.kind == NotificationType::OrderDelivered));
}

#[tokio::test]
async fn admin_override_skips_the_ownership_check() {
    let store = MemStore::new();
    let order = place_cod(&store, &customer()).await;

    workflow::admin_update_status(&store, &order.id, OrderStatus::OutForDelivery)
        .await
        .unwrap();

    let updated = store.order(&order.id).await.unwrap().unwrap();
    assert_eq!(updated.status, OrderStatus::OutForDelivery);
    assert!(!store.notifications_for("cust-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn owner_listing_projects_only_their_lines() {
    let store = MemStore::new();

    // Legacy document from before the single-restaurant rule.
    let mixed = Order {
        id: "legacy-1".to_string(),
        customer_id: "cust-1".to_string(),
        items: vec![
            line("food-1", "owner-1", 8.5, 1),
            line("food-9", "owner-2", 5.0, 2),
        ],
        amount: 18.5,
        address: json!({}),
        payment_method: "cod".to_string(),
        payment: false,
        status: OrderStatus::FoodProcessing,
        restaurant_owner_ids: vec!["owner-1".to_string(), "owner-2".to_string()],
        delivery_contact: String::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        cancellation_reason: None,
        cancelled_at: None,
    };
    store.put_order(&mixed).await.unwrap();

    let visible = workflow::list_for_owner(&store, &owner()).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].items.len(), 1);
    assert_eq!(visible[0].items[0].added_by, "owner-1");

    let stranger = user("owner-3", Role::RestaurantOwner, true);
    assert!(workflow::list_for_owner(&store, &stranger)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn remove_delivered_sweeps_and_is_idempotent() {
    let store = MemStore::new();
    let order = place_cod(&store, &customer()).await;

    workflow::admin_update_status(&store, &order.id, OrderStatus::Delivered)
        .await
        .unwrap();
    // Delivery already removed the record; the sweep finds nothing.
    assert_eq!(workflow::remove_delivered(&store).await.unwrap(), 0);
    assert_eq!(workflow::remove_delivered(&store).await.unwrap(), 0);
}

#[tokio::test]
async fn notification_feed_returns_twenty_newest_first() {
    let store = MemStore::new();
    let base = Utc::now();

    for i in 0..25 {
        let mut notification = Notification::new(
            "cust-1",
            format!("Title {i}"),
            "message",
            NotificationType::OrderStatus,
            None,
        );
        notification.created_at = base + Duration::seconds(i);
        store.put_notification(&notification).await.unwrap();
    }

    let feed = notifications::feed(&store, "cust-1").await.unwrap();
    assert_eq!(feed.len(), notifications::FEED_LIMIT);
    assert_eq!(feed[0].title, "Title 24");
    assert_eq!(feed[19].title, "Title 5");
}

#[tokio::test]
async fn unread_count_tracks_mark_all_read() {
    let store = MemStore::new();
    for _ in 0..3 {
        store
            .put_notification(&Notification::new(
                "cust-1",
                "Title",
                "message",
                NotificationType::OrderStatus,
                None,
            ))
            .await
            .unwrap();
    }

    assert_eq!(store.unread_count("cust-1").await.unwrap(), 3);
    store.mark_all_notifications_read("cust-1").await.unwrap();
    assert_eq!(store.unread_count("cust-1").await.unwrap(), 0);
}

#[tokio::test]
async fn register_rejects_duplicate_email() {
    let store = MemStore::new();
    let config = test_config();

    let request = || RegisterRequest {
        name: "Alice".to_string(),
        email: "alice@example.com".to_string(),
        password: "longenough".to_string(),
        role: None,
        restaurant_name: None,
        restaurant_address: None,
    };

    users::register(&store, &config, request()).await.unwrap();
    let err = users::register(&store, &config, request()).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn owner_registration_waits_for_approval() {
    let store = MemStore::new();
    let config = test_config();

    let response = users::register(
        &store,
        &config,
        RegisterRequest {
            name: "Bob".to_string(),
            email: "bob@bistro.example".to_string(),
            password: "longenough".to_string(),
            role: Some(Role::RestaurantOwner),
            restaurant_name: Some("Bob's Bistro".to_string()),
            restaurant_address: Some("2 Side St".to_string()),
        },
    )
    .await
    .unwrap();

    assert_eq!(response["isApproved"], json!(false));
    assert!(response.get("token").is_none());

    let err = users::login(
        &store,
        &config,
        LoginRequest {
            email: "bob@bistro.example".to_string(),
            password: "longenough".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let store = MemStore::new();
    let config = test_config();

    users::register(
        &store,
        &config,
        RegisterRequest {
            name: "Carol".to_string(),
            email: "carol@example.com".to_string(),
            password: "longenough".to_string(),
            role: None,
            restaurant_name: None,
            restaurant_address: None,
        },
    )
    .await
    .unwrap();

    let err = users::login(
        &store,
        &config,
        LoginRequest {
            email: "carol@example.com".to_string(),
            password: "wrong-password".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}
