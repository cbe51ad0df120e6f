//! The live order feed: reconciliation, the owning actor, and the pull and
//! push tasks that keep it current.

pub mod poller;
pub mod query;
pub mod reconciler;
pub mod service;
pub mod subscription;

pub use poller::FeedPoller;
pub use query::{matches_search, OrderPage, PageRequest, Pager, DEFAULT_PAGE_SIZE};
pub use reconciler::MergeOutcome;
pub use service::{FeedService, FeedView, OutOfScopePolicy};
pub use subscription::FeedSubscription;
