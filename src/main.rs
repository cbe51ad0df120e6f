mod app_system;
mod clients;
mod domain;
mod error;
mod feed;
mod gateway;
mod messages;

#[cfg(test)]
mod mock_framework;
#[cfg(test)]
mod integration_tests;

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::{info, warn, Instrument};

use crate::app_system::{setup_tracing, FeedConfig, FeedSystem, Gateways, Session, SystemError};
use crate::domain::{
    DeliveryAddress, LineItem, Order, OrderStatus, RestaurantRef, RiderRef, StatusChangeRequest, UserRef, Variation,
};
use crate::error::FeedError;
use crate::feed::FeedView;
use crate::gateway::InMemoryBackend;

const DEMO_RESTAURANT: &str = "rest_demo";

fn demo_order(id: &str, title: &str, cents: i64, status: OrderStatus, minutes_ago: i64) -> Order {
    let price = Decimal::new(cents, 2);
    Order {
        id: id.to_string(),
        order_id: format!("ORD-{}", id.to_uppercase()),
        restaurant: RestaurantRef {
            id: DEMO_RESTAURANT.to_string(),
            name: "Demo Kitchen".to_string(),
        },
        rider: None,
        user: Some(UserRef {
            id: "user_1".to_string(),
            name: "Alice".to_string(),
            phone: None,
        }),
        zone: None,
        delivery_address: DeliveryAddress {
            delivery_address: "12 Market Street".to_string(),
            details: None,
        },
        items: vec![LineItem {
            quantity: 1,
            title: title.to_string(),
            variation: Variation {
                title: "Regular".to_string(),
                price,
            },
            addons: vec![],
        }],
        payment_method: "COD".to_string(),
        delivery_charges: Decimal::new(250, 2),
        tipping: Decimal::ZERO,
        taxation_amount: Decimal::ZERO,
        order_amount: price + Decimal::new(250, 2),
        instructions: None,
        order_status: status,
        is_picked_up: false,
        created_at: Utc::now() - Duration::minutes(minutes_ago),
    }
}

async fn next_view(changes: &mut watch::Receiver<FeedView>) -> Result<FeedView, FeedError> {
    changes
        .changed()
        .await
        .map_err(|e| FeedError::ActorCommunicationError(e.to_string()))?;
    Ok(changes.borrow_and_update().clone())
}

#[tokio::main]
async fn main() -> Result<(), SystemError> {
    // Setup tracing once for the entire application
    setup_tracing();

    let config = FeedConfig::from_env()?;
    let mut session = Session::from_env()?;
    if session.restaurant_id.is_none() {
        session = Session::restaurant(DEMO_RESTAURANT, session.user_type);
    }

    info!(?config, "Starting order feed demo");

    let backend = Arc::new(InMemoryBackend::with_orders(vec![
        demo_order("o3", "Pizza Margherita", 1200, OrderStatus::Pending, 5),
        demo_order("o2", "Caesar Salad", 850, OrderStatus::Accepted, 15),
        demo_order("o1", "Pad Thai", 1100, OrderStatus::Delivered, 60),
    ]));

    let system = FeedSystem::start(config, session, Gateways::from_backend(backend.clone())).await?;
    let mut changes = system.feed.changes();
    info!(restaurant = ?system.session().restaurant_id, user_type = ?system.session().user_type, "Feed system running");

    let view = next_view(&mut changes).await?;
    info!(orders = view.orders.len(), total = view.total_count, "Feed seeded");

    // A customer places an order; it arrives over the push channel
    backend.place_order(demo_order("o4", "Ramen", 1400, OrderStatus::Pending, 0));
    let view = next_view(&mut changes).await?;
    if let Some(newest) = view.orders.first() {
        info!(newest = %newest.order_id, "New order pushed");
    }

    let span = tracing::info_span!("order_detail", order_id = "o4");
    async {
        if let Some(order) = system.feed.select(Some("o4".to_string())).await? {
            let summary = order.summary();
            info!(
                items = %order.items_label(),
                subtotal = %summary.subtotal,
                total = %summary.total,
                discount = ?summary.discount,
                to_pay = %summary.amount_to_pay,
                "Order selected"
            );
        }

        let change = system
            .status
            .change_status(StatusChangeRequest::new("o4", OrderStatus::Accepted))
            .await?;
        info!(status = %change.new_status, "Order accepted");

        if let Err(e) = system
            .status
            .change_status(StatusChangeRequest::new("o4", OrderStatus::Cancelled))
            .await
        {
            warn!(error = %e, "Cancellation without a reason refused as expected");
        }

        loop {
            let view = next_view(&mut changes).await?;
            if let Some(selected) = view.selected.filter(|o| o.order_status == OrderStatus::Accepted) {
                info!(status = %selected.order_status, "Selection follows the update");
                break;
            }
        }

        system.status.assign_rider("o4", "rider_7").await?;
        info!(revision = system.feed.latest().revision, "Rider assigned");

        // The rider app reports the pickup straight to the backend
        if let Some(mut picked) = system.feed.get_order("o4".to_string()).await? {
            picked.rider = Some(RiderRef {
                id: "rider_7".to_string(),
                name: "rider_7".to_string(),
            });
            picked.is_picked_up = true;
            picked.order_status = OrderStatus::Picked;
            backend.update_order(picked);
        }
        Ok::<_, FeedError>(())
    }
    .instrument(span)
    .await?;

    let cancelled = system
        .status
        .change_status(StatusChangeRequest::new("o3", OrderStatus::Cancelled).with_reason("Out of dough"))
        .await?;
    info!(order_id = %cancelled.order_id, reason = ?cancelled.reason, "Order cancelled");

    let view = system.feed.get_view().await?;
    let on_the_road = view.matching("rider_7");
    info!(dispatch = on_the_road.len(), "Orders with rider_7");

    system.pager.set_page_size(25)?;
    if system.pager.set_search("O4").is_none() {
        info!("Two-letter search not sent");
    }
    system.pager.set_search("ord-o4");
    let view = loop {
        let view = next_view(&mut changes).await?;
        if view.orders.len() == 1 {
            break view;
        }
    };
    info!(matches = view.orders.len(), "Search applied");

    let request = system.pager.set_page(1);
    info!(page = request.page, "Paged past the last match");

    info!(
        status_changes = backend.status_changes().len(),
        rider_assignments = backend.rider_assignments().len(),
        "Backend mutations"
    );

    // Shutdown system gracefully
    system.shutdown().await?;

    info!("Application completed successfully");
    Ok(())
}
