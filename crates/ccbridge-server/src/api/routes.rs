use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use tracing::{error, info};

use super::AppState;
use super::error::ApiError;
use super::types::{
    AddressUpdate, AddressUpdated, ExecuteResponse, HealthResponse, QueryRequest,
};
use crate::background;
use crate::users::{NewUser, User};

fn query_from(body: Result<Json<QueryRequest>, JsonRejection>) -> Result<String, ApiError> {
    let Json(request) = body?;
    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".into()));
    }
    Ok(request.query)
}

/// `POST /execute`: run a query and return the accumulated output.
pub async fn execute(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let query = query_from(body)?;
    info!(query = %query, "Received query");

    match state.orchestrator.execute(&query).await {
        Ok(result) => {
            info!(bytes = result.len(), "Query completed");
            Ok(Json(ExecuteResponse::completed(result)))
        }
        Err(e) => {
            error!(error = %e, "Query failed");
            Err(e.into())
        }
    }
}

/// `POST /execute/background`: start a query and return immediately.
pub async fn execute_background(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let query = query_from(body)?;
    let task = background::spawn_query(state.orchestrator.clone(), query);
    info!(task_id = %task.id(), "Background query scheduled");
    Ok(Json(ExecuteResponse::started()))
}

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// `POST /users`
pub async fn create_user(
    State(state): State<AppState>,
    body: Result<Json<NewUser>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let Json(new) = body?;
    let user = state.users.create(new).await;
    info!(user = %user, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /users/{id}`
pub async fn get_user(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<User>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.users.get(id).await?))
}

/// `PUT /users/{id}/address`
pub async fn update_address(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
    body: Result<Json<AddressUpdate>, JsonRejection>,
) -> Result<Json<AddressUpdated>, ApiError> {
    let Path(id) = id?;
    let Json(update) = body?;
    let user = state.users.update_address(id, update.address).await?;
    info!(user_id = id, "User address updated");
    Ok(Json(AddressUpdated {
        message: "Address updated successfully".to_string(),
        user,
    }))
}
