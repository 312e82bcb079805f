use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use uuid::Uuid;

use crate::controllers::vehicle_controller::VehicleController;
use crate::dto::common::ApiResponse;
use crate::dto::vehicle_dto::{
    CreateVehicleRequest, NearestVehiclesQuery, UpdateLocationRequest, VehicleResponse,
};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_vehicle_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_vehicles).post(register_vehicle))
        .route("/available", get(list_available_vehicles))
        .route("/nearest", get(nearest_vehicles))
        .route("/:id", get(get_vehicle).delete(decommission_vehicle))
        .route("/:id/location", put(update_location))
}

async fn register_vehicle(
    State(state): State<AppState>,
    Json(request): Json<CreateVehicleRequest>,
) -> Result<Json<ApiResponse<VehicleResponse>>, AppError> {
    let controller = VehicleController::new(state.engine.clone());
    let response = controller.register(request).await?;
    Ok(Json(response))
}

async fn list_vehicles(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<VehicleResponse>>>, AppError> {
    let controller = VehicleController::new(state.engine.clone());
    Ok(Json(controller.list_all().await?))
}

async fn list_available_vehicles(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<VehicleResponse>>>, AppError> {
    let controller = VehicleController::new(state.engine.clone());
    Ok(Json(controller.list_available().await?))
}

async fn nearest_vehicles(
    State(state): State<AppState>,
    Query(query): Query<NearestVehiclesQuery>,
) -> Result<Json<ApiResponse<Vec<VehicleResponse>>>, AppError> {
    let controller = VehicleController::new(state.engine.clone());
    Ok(Json(controller.nearest(query).await?))
}

async fn get_vehicle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<VehicleResponse>>, AppError> {
    let controller = VehicleController::new(state.engine.clone());
    Ok(Json(controller.get_by_id(id).await?))
}

async fn update_location(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateLocationRequest>,
) -> Result<Json<ApiResponse<VehicleResponse>>, AppError> {
    let controller = VehicleController::new(state.engine.clone());
    Ok(Json(controller.update_location(id, request).await?))
}

async fn decommission_vehicle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let controller = VehicleController::new(state.engine.clone());
    Ok(Json(controller.decommission(id).await?))
}
