use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Notify};
use tracing::{debug, error, info, instrument};

use super::reconciler::{MergeOutcome, OrderFeedReconciler, OrderList};
use super::query::{matches_search, OrderPage};
use crate::clients::FeedClient;
use crate::domain::{FeedEvent, Order, OrderId};
use crate::error::FeedError;
use crate::messages::{FeedRequest, ServiceResponse};

/// What to do with an update for an order that is not on the loaded page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutOfScopePolicy {
    /// Drop the event.
    #[default]
    Ignore,
    /// Ask the poller for an immediate pull.
    Refetch,
}

impl FromStr for OutOfScopePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ignore" => Ok(OutOfScopePolicy::Ignore),
            "refetch" => Ok(OutOfScopePolicy::Refetch),
            other => Err(format!("unknown out-of-scope policy: {}", other)),
        }
    }
}

/// Read-only snapshot published to the presenter after every change.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedView {
    pub orders: OrderList,
    pub selected: Option<Order>,
    /// Total matching orders on the server, from the last pull.
    pub total_count: u64,
    /// Bumped on every published change.
    pub revision: u64,
    /// Last pull/mutation failure, cleared by the next successful pull.
    pub last_error: Option<String>,
}

impl FeedView {
    /// Orders on the loaded page that match a dispatch search term.
    pub fn matching(&self, term: &str) -> Vec<Order> {
        self.orders.iter().filter(|o| matches_search(o, term)).cloned().collect()
    }
}

impl Default for FeedView {
    fn default() -> Self {
        Self {
            orders: Arc::from(Vec::new()),
            selected: None,
            total_count: 0,
            revision: 0,
            last_error: None,
        }
    }
}

/// Actor owning the order feed. Its mailbox serializes every seed and merge
/// in arrival order.
pub struct FeedService {
    receiver: mpsc::Receiver<FeedRequest>,
    reconciler: OrderFeedReconciler,
    view: watch::Sender<FeedView>,
    total_count: u64,
    last_error: Option<String>,
    policy: OutOfScopePolicy,
    refresh: Arc<Notify>,
}

impl FeedService {
    pub fn new(buffer_size: usize, policy: OutOfScopePolicy, refresh: Arc<Notify>) -> (Self, FeedClient) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let (view, view_rx) = watch::channel(FeedView::default());
        let service = Self {
            receiver,
            reconciler: OrderFeedReconciler::new(),
            view,
            total_count: 0,
            last_error: None,
            policy,
            refresh,
        };
        let client = FeedClient::new(sender, view_rx);
        (service, client)
    }

    #[instrument(name = "feed_service", skip(self))]
    pub async fn run(mut self) {
        info!("FeedService starting");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                FeedRequest::Seed { page, respond_to } => {
                    self.handle_seed(page, respond_to);
                }
                FeedRequest::ApplyEvent { event, respond_to } => {
                    let outcome = self.merge(&event);
                    let _ = respond_to.send(Ok(outcome));
                }
                FeedRequest::Select { id, respond_to } => {
                    self.handle_select(id, respond_to);
                }
                FeedRequest::GetOrder { id, respond_to } => {
                    let order = self.reconciler.get(&id).cloned();
                    let _ = respond_to.send(Ok(order));
                }
                FeedRequest::GetView { respond_to } => {
                    let _ = respond_to.send(Ok(self.view.borrow().clone()));
                }
                FeedRequest::RecordFailure { message, respond_to } => {
                    self.handle_record_failure(message, respond_to);
                }
                FeedRequest::Shutdown => {
                    info!("FeedService shutting down");
                    break;
                }
            }
        }

        info!("FeedService stopped");
    }

    #[instrument(fields(items = page.items.len(), total = page.total_count), skip(self, page, respond_to))]
    fn handle_seed(&mut self, page: OrderPage, respond_to: ServiceResponse<FeedView, FeedError>) {
        debug!("Processing seed request");

        self.reconciler.seed(page.items);
        if let Some(id) = self.reconciler.selected_id() {
            debug!(selected = %id, "Selection kept after reseed");
        }
        self.total_count = page.total_count;
        self.last_error = None;

        let _ = respond_to.send(Ok(self.publish()));
    }

    #[instrument(fields(kind = event.kind(), order_id = %event.order_id()), skip(self, event))]
    fn merge(&mut self, event: &FeedEvent) -> MergeOutcome {
        let outcome = self.reconciler.apply(event);
        self.after_merge(outcome);
        outcome
    }

    fn after_merge(&mut self, outcome: MergeOutcome) {
        if outcome.changed_list() {
            if let MergeOutcome::Replaced { index } = outcome {
                debug!(index, "Order replaced in place");
            }
            self.publish();
            return;
        }

        match self.policy {
            OutOfScopePolicy::Ignore => debug!("Update for order outside the loaded page ignored"),
            OutOfScopePolicy::Refetch => {
                info!("Update for order outside the loaded page, requesting refetch");
                self.refresh.notify_one();
            }
        }
    }

    #[instrument(fields(order_id = ?id), skip(self, respond_to))]
    fn handle_select(&mut self, id: Option<OrderId>, respond_to: ServiceResponse<Option<Order>, FeedError>) {
        let selected = self.reconciler.select(id).cloned();
        match &selected {
            Some(order) => debug!(status = %order.order_status, "Order selected"),
            None => debug!("Selection cleared or not listed"),
        }
        self.publish();
        let _ = respond_to.send(Ok(selected));
    }

    fn handle_record_failure(&mut self, message: String, respond_to: ServiceResponse<(), FeedError>) {
        error!(error = %message, "Keeping last known orders after failure");
        self.last_error = Some(message);
        self.publish();
        let _ = respond_to.send(Ok(()));
    }

    fn publish(&mut self) -> FeedView {
        let revision = self.view.borrow().revision + 1;
        let view = FeedView {
            orders: self.reconciler.orders(),
            selected: self.reconciler.selection().cloned(),
            total_count: self.total_count,
            revision,
            last_error: self.last_error.clone(),
        };
        self.view.send_replace(view.clone());
        view
    }
}
