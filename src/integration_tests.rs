#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::watch;
    use tracing_test::traced_test;

    use crate::app_system::{FeedConfig, FeedSystem, Gateways, Session, SystemError, UserType};
    use crate::domain::order::fixtures::order;
    use crate::domain::{OrderStatus, StatusChangeRequest};
    use crate::error::{FeedError, ValidationFailure};
    use crate::feed::{FeedView, OutOfScopePolicy};
    use crate::gateway::InMemoryBackend;

    async fn wait_for(changes: &mut watch::Receiver<FeedView>, pred: impl Fn(&FeedView) -> bool) -> FeedView {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                {
                    let view = changes.borrow_and_update();
                    if pred(&*view) {
                        return (*view).clone();
                    }
                }
                changes.changed().await.expect("feed service stopped");
            }
        })
        .await
        .expect("timed out waiting for feed view")
    }

    fn ids(view: &FeedView) -> Vec<&str> {
        view.orders.iter().map(|o| o.id.as_str()).collect()
    }

    fn quiet_config() -> FeedConfig {
        FeedConfig {
            poll_interval: Duration::from_secs(60),
            ..FeedConfig::default()
        }
    }

    async fn start(backend: &Arc<InMemoryBackend>, config: FeedConfig, session: Session) -> FeedSystem {
        FeedSystem::start(config, session, Gateways::from_backend(backend.clone()))
            .await
            .expect("system starts")
    }

    #[tokio::test]
    async fn test_live_feed_flow() {
        let backend = Arc::new(InMemoryBackend::with_orders(vec![
            order("o2", OrderStatus::Accepted),
            order("o1", OrderStatus::Pending),
        ]));
        let system = start(&backend, quiet_config(), Session::restaurant("rest_1", UserType::Vendor)).await;
        assert!(system.is_live());
        let mut changes = system.feed.changes();

        // 1. Initial pull seeds the list
        let view = wait_for(&mut changes, |v| v.orders.len() == 2).await;
        assert_eq!(ids(&view), ["o2", "o1"]);

        // 2. A pushed order goes to the top
        backend.place_order(order("o3", OrderStatus::Pending));
        let view = wait_for(&mut changes, |v| v.orders.len() == 3).await;
        assert_eq!(ids(&view), ["o3", "o2", "o1"]);

        // 3. Select it, then accept it through the status client
        let selected = system.feed.select(Some("o3".into())).await.unwrap();
        assert_eq!(selected.map(|o| o.id), Some("o3".to_string()));

        let change = system
            .status
            .change_status(StatusChangeRequest::new("o3", OrderStatus::Accepted))
            .await
            .unwrap();
        assert_eq!(change.new_status, OrderStatus::Accepted);

        // 4. The selection follows the replacement object
        let view = wait_for(&mut changes, |v| {
            v.selected.as_ref().map(|o| o.order_status) == Some(OrderStatus::Accepted)
        })
        .await;
        assert_eq!(ids(&view), ["o3", "o2", "o1"]);

        system.shutdown().await.unwrap();
        assert_eq!(backend.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_all_orders_view_has_no_push() {
        let backend = Arc::new(InMemoryBackend::with_orders(vec![order("o1", OrderStatus::Pending)]));
        let config = FeedConfig {
            poll_interval: Duration::from_millis(50),
            ..FeedConfig::default()
        };
        let system = start(&backend, config, Session::default()).await;
        assert!(!system.is_live());
        assert_eq!(backend.subscriber_count(), 0);

        let mut changes = system.feed.changes();
        wait_for(&mut changes, |v| v.orders.len() == 1).await;

        // Only the poller picks this up
        let mut other = order("x1", OrderStatus::Pending);
        other.restaurant.id = "rest_2".into();
        backend.place_order(other);
        let view = wait_for(&mut changes, |v| v.orders.len() == 2).await;
        assert_eq!(view.total_count, 2);

        system.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_pull_keeps_last_known_orders() {
        let backend = Arc::new(InMemoryBackend::with_orders(vec![order("o1", OrderStatus::Pending)]));
        let system = start(&backend, quiet_config(), Session::restaurant("rest_1", UserType::Admin)).await;
        let mut changes = system.feed.changes();
        wait_for(&mut changes, |v| v.orders.len() == 1).await;

        backend.fail_next_fetches(1);
        system.pager.set_page(0);
        let view = wait_for(&mut changes, |v| v.last_error.is_some()).await;
        assert_eq!(ids(&view), ["o1"]);

        system.pager.set_page(0);
        let view = wait_for(&mut changes, |v| v.last_error.is_none()).await;
        assert_eq!(ids(&view), ["o1"]);

        system.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_update_outside_page_triggers_refetch() {
        let backend = Arc::new(InMemoryBackend::with_orders(vec![
            order("o3", OrderStatus::Pending),
            order("o2", OrderStatus::Pending),
            order("o1", OrderStatus::Pending),
        ]));
        let config = FeedConfig {
            page_size: 2,
            out_of_scope: OutOfScopePolicy::Refetch,
            ..quiet_config()
        };
        let system = start(&backend, config, Session::restaurant("rest_1", UserType::Vendor)).await;
        let mut changes = system.feed.changes();
        let view = wait_for(&mut changes, |v| v.orders.len() == 2).await;
        assert_eq!(ids(&view), ["o3", "o2"]);
        assert_eq!(backend.fetch_count(), 1);

        backend.update_order(order("o1", OrderStatus::Accepted));
        tokio::time::timeout(Duration::from_secs(2), async {
            while backend.fetch_count() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("refetch requested");

        system.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_vendor_session_requires_restaurant() {
        let backend = Arc::new(InMemoryBackend::new());
        let session = Session {
            restaurant_id: None,
            user_type: UserType::Vendor,
        };
        let result = FeedSystem::start(quiet_config(), session, Gateways::from_backend(backend)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_zero_poll_interval_fails_start() {
        let backend = Arc::new(InMemoryBackend::with_orders(vec![order("o1", OrderStatus::Pending)]));
        let config = FeedConfig {
            poll_interval: Duration::ZERO,
            ..FeedConfig::default()
        };
        let result = FeedSystem::start(config, Session::default(), Gateways::from_backend(backend.clone())).await;
        assert!(matches!(result, Err(SystemError::Config(_))));
        assert_eq!(backend.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_buffer_size_fails_start() {
        let backend = Arc::new(InMemoryBackend::new());
        let config = FeedConfig {
            buffer_size: 0,
            ..quiet_config()
        };
        let result = FeedSystem::start(config, Session::restaurant("rest_1", UserType::Vendor), Gateways::from_backend(backend.clone())).await;
        assert!(matches!(result, Err(SystemError::Config(_))));
        assert_eq!(backend.subscriber_count(), 0);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_rejections_are_logged() {
        let backend = Arc::new(InMemoryBackend::with_orders(vec![order("o1", OrderStatus::Delivered)]));
        let system = start(&backend, quiet_config(), Session::restaurant("rest_1", UserType::Vendor)).await;
        let mut changes = system.feed.changes();
        wait_for(&mut changes, |v| v.orders.len() == 1).await;

        let result = system
            .status
            .change_status(StatusChangeRequest::new("o1", OrderStatus::Cancelled).with_reason("customer left"))
            .await;
        assert_eq!(
            result,
            Err(FeedError::Validation(ValidationFailure::TerminalStatus(OrderStatus::Delivered)))
        );
        assert!(backend.status_changes().is_empty());
        assert!(logs_contain("Status change refused"));

        // A malformed push is skipped and the stream keeps going
        backend.push_raw("rest_1", json!({"origin": "new", "order": {"_id": ""}}));
        backend.place_order(order("o2", OrderStatus::Pending));
        let view = wait_for(&mut changes, |v| v.orders.len() == 2).await;
        assert_eq!(ids(&view), ["o2", "o1"]);
        assert!(logs_contain("Dropping malformed feed event"));

        system.shutdown().await.unwrap();
    }
}
