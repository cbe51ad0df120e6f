//! Order list reconciliation.
//!
//! The working list is replaced wholesale by every pull (`seed`) and merged
//! with push events one at a time (`apply`). Lists are immutable snapshots:
//! every change produces a new [`OrderList`], so a snapshot already handed to
//! the presenter never changes underneath it.
//!
//! The selection is held by id only and re-resolved against the current list
//! after every change.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{FeedEvent, Order, OrderId};

/// Immutable, shareable snapshot of the displayed orders.
pub type OrderList = Arc<[Order]>;

/// How an event changed the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A new order was added at the front.
    Prepended,
    /// A "new" event for an order already listed; the old entry was dropped
    /// and the order moved to the front.
    Redelivered,
    /// An update replaced the entry at `index`.
    Replaced { index: usize },
    /// An update for an order outside the loaded page; the list is unchanged.
    OutOfScope,
}

impl MergeOutcome {
    pub fn changed_list(&self) -> bool {
        !matches!(self, MergeOutcome::OutOfScope)
    }
}

/// Replaces the working list with a pulled page.
pub fn seed(orders: Vec<Order>) -> OrderList {
    Arc::from(orders)
}

/// Merges one event into `current`, returning the new list.
pub fn apply(event: &FeedEvent, current: &OrderList) -> (OrderList, MergeOutcome) {
    match event {
        FeedEvent::New(order) => {
            let mut merged = Vec::with_capacity(current.len() + 1);
            merged.push(order.clone());
            merged.extend(current.iter().filter(|o| o.id != order.id).cloned());

            let outcome = if merged.len() == current.len() {
                MergeOutcome::Redelivered
            } else {
                MergeOutcome::Prepended
            };
            (Arc::from(merged), outcome)
        }
        FeedEvent::Update(order) => match current.iter().position(|o| o.id == order.id) {
            Some(index) => {
                let mut merged = current.to_vec();
                merged[index] = order.clone();
                (Arc::from(merged), MergeOutcome::Replaced { index })
            }
            None => (Arc::clone(current), MergeOutcome::OutOfScope),
        },
    }
}

/// Looks up the selected order in `current`. `None` when nothing is selected
/// or the order is no longer listed.
pub fn resolve_selection<'a>(selected: Option<&OrderId>, current: &'a [Order]) -> Option<&'a Order> {
    let id = selected?;
    current.iter().find(|o| &o.id == id)
}

/// Owns the working list and the selection between reconciliation passes.
#[derive(Debug, Clone)]
pub struct OrderFeedReconciler {
    orders: OrderList,
    selected: Option<OrderId>,
}

impl Default for OrderFeedReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderFeedReconciler {
    pub fn new() -> Self {
        Self {
            orders: Arc::from(Vec::new()),
            selected: None,
        }
    }

    pub fn orders(&self) -> OrderList {
        Arc::clone(&self.orders)
    }

    pub fn selected_id(&self) -> Option<&OrderId> {
        self.selected.as_ref()
    }

    pub fn selection(&self) -> Option<&Order> {
        resolve_selection(self.selected.as_ref(), &self.orders)
    }

    pub fn get(&self, id: &str) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == id)
    }

    /// Replaces the list and drops the selection if its order is gone.
    pub fn seed(&mut self, orders: Vec<Order>) -> OrderList {
        self.orders = seed(orders);
        if self.selected.is_some() && self.selection().is_none() {
            debug!(selected = ?self.selected, "Selected order left the list, clearing selection");
            self.selected = None;
        }
        self.orders()
    }

    pub fn apply(&mut self, event: &FeedEvent) -> MergeOutcome {
        let (orders, outcome) = apply(event, &self.orders);
        self.orders = orders;
        debug!(kind = event.kind(), order_id = %event.order_id(), ?outcome, "Applied feed event");
        outcome
    }

    /// Selects an order by id; returns the resolved order, if listed.
    pub fn select(&mut self, id: Option<OrderId>) -> Option<&Order> {
        self.selected = id;
        self.selection()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::fixtures::order;
    use crate::domain::OrderStatus;
    use std::collections::HashSet;

    fn ids(list: &[Order]) -> Vec<&str> {
        list.iter().map(|o| o.id.as_str()).collect()
    }

    fn list(ids: &[&str]) -> OrderList {
        seed(ids.iter().map(|id| order(id, OrderStatus::Pending)).collect())
    }

    #[test]
    fn seed_is_idempotent() {
        let orders = vec![order("o2", OrderStatus::Pending), order("o1", OrderStatus::Accepted)];
        let mut reconciler = OrderFeedReconciler::new();
        let first = reconciler.seed(orders.clone());
        let second = reconciler.seed(orders);
        assert_eq!(first, second);
        assert_eq!(ids(&second), ["o2", "o1"]);
    }

    #[test]
    fn new_event_prepends() {
        let current = list(&["o2", "o1"]);
        let (merged, outcome) = apply(&FeedEvent::New(order("o3", OrderStatus::Pending)), &current);
        assert_eq!(ids(&merged), ["o3", "o2", "o1"]);
        assert_eq!(outcome, MergeOutcome::Prepended);
    }

    #[test]
    fn redelivered_new_event_never_duplicates() {
        let current = list(&["o1", "o2", "o3"]);
        let mut again = order("o2", OrderStatus::Pending);
        again.payment_method = "CARD".into();

        let (merged, outcome) = apply(&FeedEvent::New(again.clone()), &current);
        assert_eq!(ids(&merged), ["o2", "o1", "o3"]);
        assert_eq!(merged[0], again);
        assert_eq!(outcome, MergeOutcome::Redelivered);
    }

    #[test]
    fn update_keeps_position() {
        let current = list(&["o1", "o2", "o3"]);
        let updated = order("o2", OrderStatus::Accepted);

        let (merged, outcome) = apply(&FeedEvent::Update(updated.clone()), &current);
        assert_eq!(ids(&merged), ["o1", "o2", "o3"]);
        assert_eq!(merged[1], updated);
        assert_eq!(outcome, MergeOutcome::Replaced { index: 1 });
    }

    #[test]
    fn update_of_absent_id_is_noop() {
        let current = list(&["o1", "o2"]);
        let (merged, outcome) = apply(&FeedEvent::Update(order("o9", OrderStatus::Accepted)), &current);
        assert_eq!(merged, current);
        assert_eq!(outcome, MergeOutcome::OutOfScope);
        assert!(!outcome.changed_list());
    }

    #[test]
    fn apply_never_touches_callers_list() {
        let current = list(&["o1", "o2"]);
        let before = current.to_vec();
        let _ = apply(&FeedEvent::Update(order("o1", OrderStatus::Cancelled)), &current);
        let _ = apply(&FeedEvent::New(order("o3", OrderStatus::Pending)), &current);
        assert_eq!(current.to_vec(), before);
    }

    #[test]
    fn ids_stay_unique_under_any_event() {
        let current = list(&["o1", "o2", "o3"]);
        let events = [
            FeedEvent::New(order("o1", OrderStatus::Accepted)),
            FeedEvent::New(order("o3", OrderStatus::Accepted)),
            FeedEvent::New(order("o4", OrderStatus::Pending)),
            FeedEvent::Update(order("o2", OrderStatus::Picked)),
            FeedEvent::Update(order("o7", OrderStatus::Picked)),
        ];
        for event in &events {
            let (merged, _) = apply(event, &current);
            let unique: HashSet<_> = merged.iter().map(|o| &o.id).collect();
            assert_eq!(unique.len(), merged.len(), "duplicate after {:?}", event.kind());
        }
    }

    #[test]
    fn selection_follows_updates() {
        let mut reconciler = OrderFeedReconciler::new();
        reconciler.seed(list(&["o1", "o2", "o3"]).to_vec());
        reconciler.select(Some("o2".to_string()));

        let updated = order("o2", OrderStatus::Accepted);
        reconciler.apply(&FeedEvent::Update(updated.clone()));

        assert_eq!(reconciler.selection(), Some(&updated));
        assert_eq!(resolve_selection(Some(&"o2".to_string()), &reconciler.orders()), Some(&updated));
    }

    #[test]
    fn seed_drops_missing_selection_and_keeps_present_one() {
        let mut reconciler = OrderFeedReconciler::new();
        reconciler.seed(list(&["o1", "o2"]).to_vec());

        reconciler.select(Some("o2".to_string()));
        let refreshed = order("o2", OrderStatus::Picked);
        reconciler.seed(vec![order("o1", OrderStatus::Pending), refreshed.clone()]);
        assert_eq!(reconciler.selection(), Some(&refreshed));

        reconciler.seed(list(&["o5", "o6"]).to_vec());
        assert_eq!(reconciler.selection(), None);
        assert_eq!(reconciler.selected_id(), None);
        assert_eq!(resolve_selection(Some(&"o2".to_string()), &reconciler.orders()), None);
    }

    #[test]
    fn resolve_without_selection() {
        assert_eq!(resolve_selection(None, &list(&["o1"])), None);
    }
}
