//! In-memory [`Store`] double for tests. Collections live in one mutex, so
//! the conditional status update is check-and-set under the same lock the
//! Lua script provides in production.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    config::Config,
    database::{Store, StatusPatch, StatusSwap},
    error::AppError,
    models::{FoodItem, Notification, Order, OrderStatus, User},
};

pub fn test_config() -> Config {
    Config {
        port: 0,
        redis_url: String::new(),
        frontend_url: "http://localhost:5173".to_string(),
        jwt_secret: "test-secret".to_string(),
        bcrypt_cost: 4,
    }
}

#[derive(Default)]
struct Collections {
    users: HashMap<String, User>,
    emails: HashMap<String, String>,
    foods: HashMap<String, FoodItem>,
    orders: HashMap<String, Order>,
    notifications: HashMap<String, Vec<Notification>>,
}

#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Collections>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Collections> {
        self.inner.lock().expect("store mutex poisoned")
    }
}

#[async_trait]
impl Store for MemStore {
    async fn create_user(&self, user: &User) -> Result<bool, AppError> {
        let mut inner = self.lock();
        if inner.emails.contains_key(&user.email) {
            return Ok(false);
        }
        inner.emails.insert(user.email.clone(), user.id.clone());
        inner.users.insert(user.id.clone(), user.clone());
        Ok(true)
    }

    async fn put_user(&self, user: &User) -> Result<(), AppError> {
        self.lock().users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn user(&self, id: &str) -> Result<Option<User>, AppError> {
        Ok(self.lock().users.get(id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let inner = self.lock();
        Ok(inner
            .emails
            .get(email)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn users(&self) -> Result<Vec<User>, AppError> {
        Ok(self.lock().users.values().cloned().collect())
    }

    async fn delete_user(&self, id: &str) -> Result<bool, AppError> {
        let mut inner = self.lock();
        match inner.users.remove(id) {
            Some(user) => {
                inner.emails.remove(&user.email);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn put_food(&self, item: &FoodItem) -> Result<(), AppError> {
        self.lock().foods.insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn food(&self, id: &str) -> Result<Option<FoodItem>, AppError> {
        Ok(self.lock().foods.get(id).cloned())
    }

    async fn foods(&self) -> Result<Vec<FoodItem>, AppError> {
        Ok(self.lock().foods.values().cloned().collect())
    }

    async fn delete_food(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.lock().foods.remove(id).is_some())
    }

    async fn put_order(&self, order: &Order) -> Result<(), AppError> {
        self.lock().orders.insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn order(&self, id: &str) -> Result<Option<Order>, AppError> {
        Ok(self.lock().orders.get(id).cloned())
    }

    async fn orders(&self) -> Result<Vec<Order>, AppError> {
        Ok(self.lock().orders.values().cloned().collect())
    }

    async fn delete_order(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.lock().orders.remove(id).is_some())
    }

    async fn swap_order_status(
        &self,
        id: &str,
        expected: &[OrderStatus],
        patch: StatusPatch,
    ) -> Result<StatusSwap, AppError> {
        let mut inner = self.lock();
        let Some(order) = inner.orders.get_mut(id) else {
            return Ok(StatusSwap::Missing);
        };

        if !expected.contains(&order.status) {
            return Ok(StatusSwap::Conflict {
                current: order.status,
            });
        }

        let previous = order.status;
        order.status = patch.status;
        order.updated_at = patch.updated_at;
        if patch.cancellation_reason.is_some() {
            order.cancellation_reason = patch.cancellation_reason;
        }
        if patch.cancelled_at.is_some() {
            order.cancelled_at = patch.cancelled_at;
        }
        Ok(StatusSwap::Updated { previous })
    }

    async fn put_notification(&self, notification: &Notification) -> Result<(), AppError> {
        self.lock()
            .notifications
            .entry(notification.user_id.clone())
            .or_default()
            .push(notification.clone());
        Ok(())
    }

    async fn notifications_for(&self, user_id: &str) -> Result<Vec<Notification>, AppError> {
        Ok(self
            .lock()
            .notifications
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn mark_notification_read(&self, id: &str, user_id: &str) -> Result<bool, AppError> {
        let mut inner = self.lock();
        let Some(feed) = inner.notifications.get_mut(user_id) else {
            return Ok(false);
        };
        match feed.iter_mut().find(|n| n.id == id) {
            Some(notification) => {
                notification.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_notifications_read(&self, user_id: &str) -> Result<(), AppError> {
        if let Some(feed) = self.lock().notifications.get_mut(user_id) {
            for notification in feed {
                notification.is_read = true;
            }
        }
        Ok(())
    }

    async fn unread_count(&self, user_id: &str) -> Result<u64, AppError> {
        Ok(self
            .lock()
            .notifications
            .get(user_id)
            .map(|feed| feed.iter().filter(|n| !n.is_read).count() as u64)
            .unwrap_or(0))
    }

    async fn delete_notification(&self, id: &str, user_id: &str) -> Result<bool, AppError> {
        let mut inner = self.lock();
        let Some(feed) = inner.notifications.get_mut(user_id) else {
            return Ok(false);
        };
        let before = feed.len();
        feed.retain(|n| n.id != id);
        Ok(feed.len() < before)
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
