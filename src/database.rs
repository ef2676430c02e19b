//! # Redis
//!
//! Primary document store.
//!
//! ## Layout
//!
//! - One hash per collection, document id as the field, JSON as the value:
//!   `users`, `foods`, `orders`
//! - Secondary hash `user_emails` mapping email to user id; claimed with
//!   `HSETNX` so two concurrent registrations cannot share an address
//! - Per-recipient hash `notifications:<user id>` so feed reads, unread
//!   counts and bulk mark-read stay scoped to one key
//!
//! ## Atomicity
//!
//! Order status transitions go through a server-side Lua script that checks
//! the current status against the set of allowed starting states and applies
//! the patch in the same step. Concurrent accept/reject on one order resolve
//! to exactly one winner; the loser observes the conflicting status.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{
    aio::{ConnectionManager, ConnectionManagerConfig},
    AsyncCommands, Client, Script,
};
use serde::Serialize;

use crate::{
    error::AppError,
    models::{FoodItem, Notification, Order, OrderStatus, User},
};

pub const USERS_KEY: &str = "users";
pub const USER_EMAILS_KEY: &str = "user_emails";
pub const FOODS_KEY: &str = "foods";
pub const ORDERS_KEY: &str = "orders";

pub fn notifications_key(user_id: &str) -> String {
    format!("notifications:{user_id}")
}

/// Fields applied together with a status transition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPatch {
    pub status: OrderStatus,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl StatusPatch {
    pub fn to(status: OrderStatus) -> Self {
        Self {
            status,
            updated_at: Utc::now(),
            cancellation_reason: None,
            cancelled_at: None,
        }
    }
}

/// Outcome of a conditional status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSwap {
    Updated { previous: OrderStatus },
    Conflict { current: OrderStatus },
    Missing,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(&self, user: &User) -> Result<bool, AppError>;
    async fn put_user(&self, user: &User) -> Result<(), AppError>;
    async fn user(&self, id: &str) -> Result<Option<User>, AppError>;
    async fn user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn users(&self) -> Result<Vec<User>, AppError>;
    async fn delete_user(&self, id: &str) -> Result<bool, AppError>;

    async fn put_food(&self, item: &FoodItem) -> Result<(), AppError>;
    async fn food(&self, id: &str) -> Result<Option<FoodItem>, AppError>;
    async fn foods(&self) -> Result<Vec<FoodItem>, AppError>;
    async fn delete_food(&self, id: &str) -> Result<bool, AppError>;

    async fn put_order(&self, order: &Order) -> Result<(), AppError>;
    async fn order(&self, id: &str) -> Result<Option<Order>, AppError>;
    async fn orders(&self) -> Result<Vec<Order>, AppError>;
    async fn delete_order(&self, id: &str) -> Result<bool, AppError>;
    async fn swap_order_status(
        &self,
        id: &str,
        expected: &[OrderStatus],
        patch: StatusPatch,
    ) -> Result<StatusSwap, AppError>;

    async fn put_notification(&self, notification: &Notification) -> Result<(), AppError>;
    async fn notifications_for(&self, user_id: &str) -> Result<Vec<Notification>, AppError>;
    async fn mark_notification_read(&self, id: &str, user_id: &str) -> Result<bool, AppError>;
    async fn mark_all_notifications_read(&self, user_id: &str) -> Result<(), AppError>;
    async fn unread_count(&self, user_id: &str) -> Result<u64, AppError>;
    async fn delete_notification(&self, id: &str, user_id: &str) -> Result<bool, AppError>;

    async fn ping(&self) -> Result<(), AppError>;
}

pub async fn init_redis(redis_url: &str) -> ConnectionManager {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url).unwrap();
    let connection_manager = client
        .get_connection_manager_with_config(config)
        .await
        .unwrap();

    connection_manager
}

const STATUS_SWAP_SCRIPT: &str = r#"
local raw = redis.call('HGET', KEYS[1], ARGV[1])
if not raw then
  return nil
end
local doc = cjson.decode(raw)
local current = doc['status']
local allowed = false
for i = 3, #ARGV do
  if current == ARGV[i] then
    allowed = true
    break
  end
end
if not allowed then
  return {0, current}
end
local patch = cjson.decode(ARGV[2])
for field, value in pairs(patch) do
  doc[field] = value
end
redis.call('HSET', KEYS[1], ARGV[1], cjson.encode(doc))
return {1, current}
"#;

pub struct RedisStore {
    connection: ConnectionManager,
    status_swap: Script,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self {
            connection,
            status_swap: Script::new(STATUS_SWAP_SCRIPT),
        }
    }

    fn conn(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

fn parse_status(raw: &str) -> Result<OrderStatus, AppError> {
    OrderStatus::parse(raw)
        .ok_or_else(|| AppError::Internal(format!("unknown order status in store: {raw}").into()))
}

fn decode_all<T: serde::de::DeserializeOwned>(raw: Vec<String>) -> Result<Vec<T>, AppError> {
    raw.iter()
        .map(|doc| serde_json::from_str(doc).map_err(Into::into))
        .collect()
}

#[async_trait]
impl Store for RedisStore {
    async fn create_user(&self, user: &User) -> Result<bool, AppError> {
        let mut conn = self.conn();
        let claimed: bool = conn.hset_nx(USER_EMAILS_KEY, &user.email, &user.id).await?;
        if !claimed {
            return Ok(false);
        }
        let _: () = conn
            .hset(USERS_KEY, &user.id, serde_json::to_string(user)?)
            .await?;
        Ok(true)
    }

    async fn put_user(&self, user: &User) -> Result<(), AppError> {
        let mut conn = self.conn();
        let _: () = conn
            .hset(USERS_KEY, &user.id, serde_json::to_string(user)?)
            .await?;
        Ok(())
    }

    async fn user(&self, id: &str) -> Result<Option<User>, AppError> {
        let mut conn = self.conn();
        let raw: Option<String> = conn.hget(USERS_KEY, id).await?;
        raw.map(|doc| serde_json::from_str(&doc))
            .transpose()
            .map_err(Into::into)
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let mut conn = self.conn();
        let id: Option<String> = conn.hget(USER_EMAILS_KEY, email).await?;
        match id {
            Some(id) => self.user(&id).await,
            None => Ok(None),
        }
    }

    async fn users(&self) -> Result<Vec<User>, AppError> {
        let mut conn = self.conn();
        let raw: Vec<String> = conn.hvals(USERS_KEY).await?;
        decode_all(raw)
    }

    async fn delete_user(&self, id: &str) -> Result<bool, AppError> {
        let Some(user) = self.user(id).await? else {
            return Ok(false);
        };
        let mut conn = self.conn();
        let _: () = conn.hdel(USER_EMAILS_KEY, &user.email).await?;
        let removed: i64 = conn.hdel(USERS_KEY, id).await?;
        Ok(removed > 0)
    }

    async fn put_food(&self, item: &FoodItem) -> Result<(), AppError> {
        let mut conn = self.conn();
        let _: () = conn
            .hset(FOODS_KEY, &item.id, serde_json::to_string(item)?)
            .await?;
        Ok(())
    }

    async fn food(&self, id: &str) -> Result<Option<FoodItem>, AppError> {
        let mut conn = self.conn();
        let raw: Option<String> = conn.hget(FOODS_KEY, id).await?;
        raw.map(|doc| serde_json::from_str(&doc))
            .transpose()
            .map_err(Into::into)
    }

    async fn foods(&self) -> Result<Vec<FoodItem>, AppError> {
        let mut conn = self.conn();
        let raw: Vec<String> = conn.hvals(FOODS_KEY).await?;
        decode_all(raw)
    }

    async fn delete_food(&self, id: &str) -> Result<bool, AppError> {
        let mut conn = self.conn();
        let removed: i64 = conn.hdel(FOODS_KEY, id).await?;
        Ok(removed > 0)
    }

    async fn put_order(&self, order: &Order) -> Result<(), AppError> {
        let mut conn = self.conn();
        let _: () = conn
            .hset(ORDERS_KEY, &order.id, serde_json::to_string(order)?)
            .await?;
        Ok(())
    }

    async fn order(&self, id: &str) -> Result<Option<Order>, AppError> {
        let mut conn = self.conn();
        let raw: Option<String> = conn.hget(ORDERS_KEY, id).await?;
        raw.map(|doc| serde_json::from_str(&doc))
            .transpose()
            .map_err(Into::into)
    }

    async fn orders(&self) -> Result<Vec<Order>, AppError> {
        let mut conn = self.conn();
        let raw: Vec<String> = conn.hvals(ORDERS_KEY).await?;
        decode_all(raw)
    }

    async fn delete_order(&self, id: &str) -> Result<bool, AppError> {
        let mut conn = self.conn();
        let removed: i64 = conn.hdel(ORDERS_KEY, id).await?;
        Ok(removed > 0)
    }

    async fn swap_order_status(
        &self,
        id: &str,
        expected: &[OrderStatus],
        patch: StatusPatch,
    ) -> Result<StatusSwap, AppError> {
        let mut conn = self.conn();
        let mut invocation = self.status_swap.key(ORDERS_KEY);
        invocation.arg(id).arg(serde_json::to_string(&patch)?);
        for status in expected {
            invocation.arg(status.as_str());
        }

        let result: Option<(u8, String)> = invocation.invoke_async(&mut conn).await?;
        match result {
            None => Ok(StatusSwap::Missing),
            Some((1, previous)) => Ok(StatusSwap::Updated {
                previous: parse_status(&previous)?,
            }),
            Some((_, current)) => Ok(StatusSwap::Conflict {
                current: parse_status(&current)?,
            }),
        }
    }

    async fn put_notification(&self, notification: &Notification) -> Result<(), AppError> {
        let mut conn = self.conn();
        let _: () = conn
            .hset(
                notifications_key(&notification.user_id),
                &notification.id,
                serde_json::to_string(notification)?,
            )
            .await?;
        Ok(())
    }

    async fn notifications_for(&self, user_id: &str) -> Result<Vec<Notification>, AppError> {
        let mut conn = self.conn();
        let raw: Vec<String> = conn.hvals(notifications_key(user_id)).await?;
        decode_all(raw)
    }

    async fn mark_notification_read(&self, id: &str, user_id: &str) -> Result<bool, AppError> {
        let mut conn = self.conn();
        let key = notifications_key(user_id);
        let raw: Option<String> = conn.hget(&key, id).await?;
        let Some(raw) = raw else {
            return Ok(false);
        };
        let mut notification: Notification = serde_json::from_str(&raw)?;
        notification.is_read = true;
        let _: () = conn
            .hset(&key, id, serde_json::to_string(&notification)?)
            .await?;
        Ok(true)
    }

    async fn mark_all_notifications_read(&self, user_id: &str) -> Result<(), AppError> {
        let mut conn = self.conn();
        let key = notifications_key(user_id);
        let raw: Vec<String> = conn.hvals(&key).await?;
        for doc in raw {
            let mut notification: Notification = serde_json::from_str(&doc)?;
            if !notification.is_read {
                notification.is_read = true;
                let _: () = conn
                    .hset(&key, &notification.id, serde_json::to_string(&notification)?)
                    .await?;
            }
        }
        Ok(())
    }

    async fn unread_count(&self, user_id: &str) -> Result<u64, AppError> {
        let notifications = self.notifications_for(user_id).await?;
        Ok(notifications.iter().filter(|n| !n.is_read).count() as u64)
    }

    async fn delete_notification(&self, id: &str, user_id: &str) -> Result<bool, AppError> {
        let mut conn = self.conn();
        let removed: i64 = conn.hdel(notifications_key(user_id), id).await?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> Result<(), AppError> {
        let mut conn = self.conn();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
