use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use super::{FeedConfig, Session, SystemError};
use crate::clients::{FeedClient, StatusClient};
use crate::feed::{FeedPoller, FeedService, FeedSubscription, PageRequest, Pager};
use crate::gateway::{MutationGateway, PushChannel, QueryGateway};

/// Gateways the system talks to. Usually one backend implementing all three.
#[derive(Clone)]
pub struct Gateways {
    pub query: Arc<dyn QueryGateway>,
    pub push: Arc<dyn PushChannel>,
    pub mutation: Arc<dyn MutationGateway>,
}

impl Gateways {
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: QueryGateway + PushChannel + MutationGateway + 'static,
    {
        Self {
            query: backend.clone(),
            push: backend.clone(),
            mutation: backend,
        }
    }
}

/// Starts, wires and stops everything behind one order feed screen.
///
/// **Startup Order:**
/// 1. FeedService (owns the list and selection)
/// 2. Push subscription, when the session is scoped to a restaurant
/// 3. FeedPoller, whose first tick seeds the list
pub struct FeedSystem {
    pub feed: FeedClient,
    pub pager: Pager,
    pub status: StatusClient,
    session: Session,
    subscription: Option<FeedSubscription>,
    poller_token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl FeedSystem {
    #[instrument(name = "feed_system", skip(config, session, gateways), fields(restaurant = ?session.restaurant_id, user_type = ?session.user_type))]
    pub async fn start(config: FeedConfig, session: Session, gateways: Gateways) -> Result<Self, SystemError> {
        config.validate()?;
        session.validate()?;
        let initial = PageRequest::new(session.restaurant_id.clone(), config.page_size)?;

        info!("Starting feed system");
        let mut handles = Vec::new();
        let refresh = Arc::new(Notify::new());

        let (service, feed) = FeedService::new(config.buffer_size, config.out_of_scope, refresh.clone());
        handles.push(tokio::spawn(service.run()));

        let subscription = match &session.restaurant_id {
            Some(restaurant_id) => match FeedSubscription::start(gateways.push.as_ref(), restaurant_id, feed.clone()).await {
                Ok(subscription) => Some(subscription),
                Err(e) => {
                    let _ = feed.shutdown().await;
                    return Err(e.into());
                }
            },
            None => {
                info!("No restaurant in session, running without push updates");
                None
            }
        };

        let (pager, query_rx) = Pager::new(initial);
        let poller_token = CancellationToken::new();
        let poller = FeedPoller::new(
            gateways.query,
            feed.clone(),
            query_rx,
            refresh.clone(),
            config.poll_interval,
            poller_token.clone(),
        );
        handles.push(tokio::spawn(poller.run()));

        let status = StatusClient::new(feed.clone(), gateways.mutation, refresh);

        info!("Feed system started successfully");

        Ok(Self {
            feed,
            pager,
            status,
            session,
            subscription,
            poller_token,
            handles,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_live(&self) -> bool {
        self.subscription.as_ref().is_some_and(|s| !s.is_cancelled())
    }

    /// Stops push delivery and polling first, then the service.
    ///
    /// **Error Handling:** Log errors but continue shutdown to prevent hangs
    #[instrument(skip(self))]
    pub async fn shutdown(self) -> Result<(), SystemError> {
        info!("Shutting down feed system");

        if let Some(subscription) = self.subscription {
            subscription.close().await;
        }
        self.poller_token.cancel();

        if let Err(e) = self.feed.shutdown().await {
            warn!(error = %e, "Feed service already stopped");
        }

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = ?e, "Task shutdown error");
            }
        }

        info!("Feed system shutdown complete");
        Ok(())
    }
}
