//! Server-sent event streams of registry changes.

use axum::extract::State;
use axum::http::{header, HeaderValue};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use routing_core::SubscriberStream;
use routing_types::WatchFilter;
use std::convert::Infallible;
use tracing::info;

use crate::state::AppState;

pub async fn http_route_events(State(state): State<AppState>) -> Response {
    event_stream(&state, WatchFilter::HttpRoutes)
}

pub async fn tcp_route_events(State(state): State<AppState>) -> Response {
    event_stream(&state, WatchFilter::TcpRoutes)
}

/// One independent watch per connection. The stream ends when the watch
/// ends or the daemon shuts down; a client disconnect drops the stream,
/// which releases the watch.
fn event_stream(state: &AppState, filter: WatchFilter) -> Response {
    info!(%filter, "event subscriber connected");

    let mut shutdown = state.shutdown_rx();
    let stopped = async move {
        let signalled = shutdown.wait_for(|stop| *stop).await.is_ok();
        if !signalled {
            std::future::pending::<()>().await;
        }
    };

    let events = SubscriberStream::subscribe(state.store(), filter)
        .into_stream()
        .take_until(stopped)
        .map(|event| {
            Ok::<_, Infallible>(
                Event::default().id(event.id.to_string()).event(event.name.as_str()).data(event.data),
            )
        });

    let mut response = Sse::new(events).keep_alive(KeepAlive::default()).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}
