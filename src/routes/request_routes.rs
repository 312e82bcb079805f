use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::controllers::request_controller::RequestController;
use crate::dto::common::ApiResponse;
use crate::dto::request_dto::{CreateServiceRequest, DispatchRequest, ServiceRequestResponse};
use crate::models::history::HistoryEntry;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_request_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_requests).post(create_request))
        .route("/requester/:requester_id", get(list_by_requester))
        .route("/:id", get(get_request))
        .route("/:id/dispatch", post(dispatch_request))
        .route("/:id/complete", post(complete_request))
        .route("/:id/cancel", post(cancel_request))
        .route("/:id/history", get(request_history))
}

async fn create_request(
    State(state): State<AppState>,
    Json(request): Json<CreateServiceRequest>,
) -> Result<Json<ApiResponse<ServiceRequestResponse>>, AppError> {
    let controller = RequestController::new(state.engine.clone());
    Ok(Json(controller.create(request).await?))
}

async fn list_requests(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ServiceRequestResponse>>>, AppError> {
    let controller = RequestController::new(state.engine.clone());
    Ok(Json(controller.list_all().await?))
}

async fn list_by_requester(
    State(state): State<AppState>,
    Path(requester_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<ServiceRequestResponse>>>, AppError> {
    let controller = RequestController::new(state.engine.clone());
    Ok(Json(controller.list_by_requester(&requester_id).await?))
}

async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ServiceRequestResponse>>, AppError> {
    let controller = RequestController::new(state.engine.clone());
    Ok(Json(controller.get_by_id(id).await?))
}

// El cuerpo es opcional: vacío usa las opciones por defecto, mal formado es 400
async fn dispatch_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<ApiResponse<ServiceRequestResponse>>, AppError> {
    let options = parse_dispatch_body(&body)?;
    let controller = RequestController::new(state.engine.clone());
    let response = controller.dispatch(id, options).await?;
    Ok(Json(response))
}

fn parse_dispatch_body(body: &[u8]) -> Result<Option<DispatchRequest>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| AppError::BadRequest(format!("Invalid dispatch options: {}", e)))
}

async fn complete_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ServiceRequestResponse>>, AppError> {
    let controller = RequestController::new(state.engine.clone());
    Ok(Json(controller.complete(id).await?))
}

async fn cancel_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ServiceRequestResponse>>, AppError> {
    let controller = RequestController::new(state.engine.clone());
    Ok(Json(controller.cancel(id).await?))
}

async fn request_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<HistoryEntry>>>, AppError> {
    let controller = RequestController::new(state.engine.clone());
    Ok(Json(controller.history(id).await?))
}
