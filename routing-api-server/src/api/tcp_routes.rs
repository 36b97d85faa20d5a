use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use routing_core::registry::validate_tcp_route_mapping;
use routing_types::{RegistryError, TcpRouteMapping};
use tracing::info;

use super::error::ApiError;
use crate::state::AppState;

pub async fn list_tcp_routes(
    State(state): State<AppState>,
) -> Result<Json<Vec<TcpRouteMapping>>, ApiError> {
    let mappings = state.store().read_tcp_route_mappings().await?;
    Ok(Json(mappings))
}

pub async fn create_tcp_routes(
    State(state): State<AppState>,
    payload: Result<Json<Vec<TcpRouteMapping>>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(mappings) = payload?;
    for mapping in &mappings {
        validate_tcp_route_mapping(mapping, state.max_ttl())?;
    }

    info!(count = mappings.len(), "upserting tcp route mappings");
    for mapping in mappings {
        state.store().save_tcp_route_mapping(mapping).await?;
    }
    Ok(StatusCode::CREATED)
}

pub async fn delete_tcp_routes(
    State(state): State<AppState>,
    payload: Result<Json<Vec<TcpRouteMapping>>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(mappings) = payload?;

    info!(count = mappings.len(), "deleting tcp route mappings");
    for mapping in &mappings {
        match state.store().delete_tcp_route_mapping(mapping).await {
            Ok(()) | Err(RegistryError::NotFound { .. }) => {},
            Err(err) => return Err(err.into()),
        }
    }
    Ok(StatusCode::NO_CONTENT)
}
