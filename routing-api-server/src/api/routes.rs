use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use routing_core::registry::validate_route;
use routing_types::{RegistryError, Route};
use tracing::{debug, info};

use super::error::ApiError;
use crate::state::AppState;

pub async fn list_routes(State(state): State<AppState>) -> Result<Json<Vec<Route>>, ApiError> {
    let routes = state.store().read_routes().await?;
    Ok(Json(routes))
}

/// Upsert a batch. The whole batch is validated before anything is saved.
pub async fn upsert_routes(
    State(state): State<AppState>,
    payload: Result<Json<Vec<Route>>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(routes) = payload?;
    for route in &routes {
        validate_route(route, state.max_ttl())?;
    }

    info!(count = routes.len(), "upserting routes");
    for route in routes {
        let saved = state.store().save_route(route).await?;
        debug!(key = %saved.key(), index = saved.modification_tag.index, "route saved");
    }
    Ok(StatusCode::CREATED)
}

/// Delete a batch. Routes that are already gone are skipped.
pub async fn delete_routes(
    State(state): State<AppState>,
    payload: Result<Json<Vec<Route>>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(routes) = payload?;

    info!(count = routes.len(), "deleting routes");
    for route in &routes {
        match state.store().delete_route(route).await {
            Ok(()) | Err(RegistryError::NotFound { .. }) => {},
            Err(err) => return Err(err.into()),
        }
    }
    Ok(StatusCode::NO_CONTENT)
}
