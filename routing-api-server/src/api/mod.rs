//! API Routes
//!
//! Route registry endpoints, mounted under `/routing/v1`.

pub(crate) mod error;
mod events;
mod routes;
mod tcp_routes;

#[cfg(test)]
mod routes_tests;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        // HTTP routes
        .route(
            "/routes",
            get(routes::list_routes).post(routes::upsert_routes).delete(routes::delete_routes),
        )
        .route("/events", get(events::http_route_events))
        // TCP route mappings
        .route("/tcp_routes", get(tcp_routes::list_tcp_routes))
        .route("/tcp_routes/create", post(tcp_routes::create_tcp_routes))
        .route("/tcp_routes/delete", post(tcp_routes::delete_tcp_routes))
        .route("/tcp_routes/events", get(events::tcp_route_events))
}
