use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{MutationGateway, PushChannel, QueryGateway};
use crate::domain::{Order, OrderStatus, RiderRef, StatusChange};
use crate::error::TransportError;
use crate::feed::{matches_search, OrderPage, PageRequest};

const SUBSCRIPTION_BUFFER: usize = 64;

/// In-process stand-in for the order API: serves pages, pushes events to
/// subscribers and applies mutations. Used by the demo binary and the tests.
#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<BackendState>,
}

#[derive(Default)]
struct BackendState {
    /// Newest first.
    orders: Vec<Order>,
    subscribers: Vec<(String, mpsc::Sender<Value>)>,
    failing_fetches: u32,
    fetch_count: u32,
    reject_mutations: bool,
    status_changes: Vec<StatusChange>,
    rider_assignments: Vec<(String, String)>,
}

impl BackendState {
    fn push(&mut self, scope: &str, payload: Value) {
        self.subscribers.retain(|(_, tx)| !tx.is_closed());
        for (subscribed, tx) in &self.subscribers {
            if subscribed == scope {
                if let Err(e) = tx.try_send(payload.clone()) {
                    warn!(scope, error = %e, "Subscriber lagging, event dropped");
                }
            }
        }
    }

    fn push_order(&mut self, origin: &str, order: &Order) {
        match serde_json::to_value(order) {
            Ok(order_json) => {
                let scope = order.restaurant.id.clone();
                self.push(&scope, json!({ "origin": origin, "order": order_json }));
            }
            Err(e) => warn!(order_id = %order.id, error = %e, "Order could not be encoded"),
        }
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_orders(orders: Vec<Order>) -> Self {
        let backend = Self::new();
        backend.lock().orders = orders;
        backend
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores a new order and announces it to subscribers of its restaurant.
    pub fn place_order(&self, order: Order) {
        let mut state = self.lock();
        state.orders.insert(0, order.clone());
        state.push_order("new", &order);
    }

    /// Replaces an order and announces the update.
    pub fn update_order(&self, order: Order) {
        let mut state = self.lock();
        if let Some(existing) = state.orders.iter_mut().find(|o| o.id == order.id) {
            *existing = order.clone();
        }
        state.push_order("update", &order);
    }

    /// Sends an arbitrary payload to subscribers of `scope`.
    #[cfg(test)]
    pub fn push_raw(&self, scope: &str, payload: Value) {
        self.lock().push(scope, payload);
    }

    /// Makes the next `count` fetches fail with a network error.
    #[cfg(test)]
    pub fn fail_next_fetches(&self, count: u32) {
        self.lock().failing_fetches = count;
    }

    #[cfg(test)]
    pub fn reject_mutations(&self, reject: bool) {
        self.lock().reject_mutations = reject;
    }

    #[cfg(test)]
    pub fn fetch_count(&self) -> u32 {
        self.lock().fetch_count
    }

    pub fn status_changes(&self) -> Vec<StatusChange> {
        self.lock().status_changes.clone()
    }

    pub fn rider_assignments(&self) -> Vec<(String, String)> {
        self.lock().rider_assignments.clone()
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.lock();
        state.subscribers.retain(|(_, tx)| !tx.is_closed());
        state.subscribers.len()
    }
}

#[async_trait]
impl QueryGateway for InMemoryBackend {
    async fn fetch_orders(&self, request: &PageRequest) -> Result<OrderPage, TransportError> {
        let mut state = self.lock();
        state.fetch_count += 1;
        if state.failing_fetches > 0 {
            state.failing_fetches -= 1;
            return Err(TransportError::Network("connection refused".into()));
        }

        let matching: Vec<&Order> = state
            .orders
            .iter()
            .filter(|o| match &request.restaurant_scope {
                Some(scope) => &o.restaurant.id == scope,
                None => true,
            })
            .filter(|o| match &request.search_term {
                Some(term) => matches_search(o, term),
                None => true,
            })
            .collect();

        let start = request.page as usize * request.page_size as usize;
        let items = matching
            .iter()
            .skip(start)
            .take(request.page_size as usize)
            .map(|o| (*o).clone())
            .collect();

        debug!(page = request.page, total = matching.len(), "Serving orders page");
        Ok(OrderPage {
            items,
            total_count: matching.len() as u64,
        })
    }
}

#[async_trait]
impl PushChannel for InMemoryBackend {
    async fn subscribe(&self, scope: &str) -> Result<mpsc::Receiver<Value>, TransportError> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        self.lock().subscribers.push((scope.to_string(), tx));
        debug!(scope, "Subscriber added");
        Ok(rx)
    }
}

#[async_trait]
impl MutationGateway for InMemoryBackend {
    async fn update_status(&self, change: &StatusChange) -> Result<bool, TransportError> {
        let mut state = self.lock();
        if state.reject_mutations {
            return Ok(false);
        }

        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == change.order_id)
            .ok_or_else(|| TransportError::Api(format!("order {} does not exist", change.order_id)))?;
        order.order_status = change.new_status;
        let order = order.clone();

        state.status_changes.push(change.clone());
        state.push_order("update", &order);
        Ok(true)
    }

    async fn assign_rider(&self, order_id: &str, rider_id: &str) -> Result<bool, TransportError> {
        let mut state = self.lock();
        if state.reject_mutations {
            return Ok(false);
        }

        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| TransportError::Api(format!("order {} does not exist", order_id)))?;
        order.rider = Some(RiderRef {
            id: rider_id.to_string(),
            name: rider_id.to_string(),
        });
        if order.order_status == OrderStatus::Accepted {
            order.order_status = OrderStatus::Assigned;
        }
        let order = order.clone();

        state.rider_assignments.push((order_id.to_string(), rider_id.to_string()));
        state.push_order("update", &order);
        Ok(true)
    }
}
