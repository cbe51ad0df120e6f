use tokio::sync::watch;
use tracing::debug;

use crate::domain::Order;
use crate::error::ValidationFailure;

/// Search terms shorter than this (but non-empty) never reach the server.
pub const MIN_SEARCH_LEN: usize = 3;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Parameters of one pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub restaurant_scope: Option<String>,
    /// Zero-based page index.
    pub page: u32,
    pub page_size: u32,
    pub search_term: Option<String>,
}

impl PageRequest {
    pub fn new(restaurant_scope: Option<String>, page_size: u32) -> Result<Self, ValidationFailure> {
        if page_size == 0 {
            return Err(ValidationFailure::InvalidPageRequest("page size must be positive".into()));
        }
        Ok(Self {
            restaurant_scope,
            page: 0,
            page_size,
            search_term: None,
        })
    }
}

/// Result of one pull.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderPage {
    pub items: Vec<Order>,
    pub total_count: u64,
}

/// Presenter-facing pagination and search state.
///
/// Every accepted change publishes a new [`PageRequest`] that the poller
/// picks up immediately.
#[derive(Debug)]
pub struct Pager {
    tx: watch::Sender<PageRequest>,
}

impl Pager {
    pub fn new(initial: PageRequest) -> (Self, watch::Receiver<PageRequest>) {
        let (tx, rx) = watch::channel(initial);
        (Self { tx }, rx)
    }

    pub fn current(&self) -> PageRequest {
        self.tx.borrow().clone()
    }

    /// Applies a search box change. Returns the new request, or `None` when the
    /// term is 1–2 characters long and no pull should happen.
    pub fn set_search(&self, term: &str) -> Option<PageRequest> {
        let len = term.chars().count();
        if len > 0 && len < MIN_SEARCH_LEN {
            debug!(len, "Search term too short, not querying");
            return None;
        }

        let search_term = (len > 0).then(|| term.to_string());
        Some(self.publish(|request| {
            request.search_term = search_term;
            request.page = 0;
        }))
    }

    pub fn set_page(&self, page: u32) -> PageRequest {
        self.publish(|request| request.page = page)
    }

    pub fn set_page_size(&self, page_size: u32) -> Result<PageRequest, ValidationFailure> {
        if page_size == 0 {
            return Err(ValidationFailure::InvalidPageRequest("page size must be positive".into()));
        }
        Ok(self.publish(|request| request.page_size = page_size))
    }

    fn publish(&self, change: impl FnOnce(&mut PageRequest)) -> PageRequest {
        self.tx.send_modify(change);
        let request = self.current();
        debug!(page = request.page, page_size = request.page_size, search = ?request.search_term, "Query changed");
        request
    }
}

/// Client-side filter used by the dispatch board (see
/// [`FeedView::matching`](crate::feed::FeedView::matching)). Terms shorter
/// than [`MIN_SEARCH_LEN`] match everything; surrounding whitespace is
/// counted but not matched.
pub fn matches_search(order: &Order, term: &str) -> bool {
    if term.chars().count() < MIN_SEARCH_LEN {
        return true;
    }
    let needle = term.trim().to_lowercase();
    let rider = order.rider.as_ref().map(|r| r.name.as_str()).unwrap_or_default();

    [
        order.restaurant.name.as_str(),
        order.order_id.as_str(),
        order.delivery_address.delivery_address.as_str(),
        order.payment_method.as_str(),
        order.order_status.as_str(),
        rider,
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(&needle))
}
