use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::dto::common::ApiResponse;
use crate::dto::vehicle_dto::{
    CreateVehicleRequest, NearestVehiclesQuery, UpdateLocationRequest, VehicleResponse,
};
use crate::services::dispatch_engine::DispatchEngine;
use crate::utils::errors::AppError;

pub struct VehicleController {
    engine: Arc<DispatchEngine>,
}

impl VehicleController {
    pub fn new(engine: Arc<DispatchEngine>) -> Self {
        Self { engine }
    }

    pub async fn register(
        &self,
        request: CreateVehicleRequest,
    ) -> Result<ApiResponse<VehicleResponse>, AppError> {
        request.validate()?;

        let vehicle = self.engine.vehicles().register(request.into()).await?;

        Ok(ApiResponse::success_with_message(
            vehicle.into(),
            "Vehicle registered".to_string(),
        ))
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<ApiResponse<VehicleResponse>, AppError> {
        let vehicle = self.engine.vehicles().get(id).await?;
        Ok(ApiResponse::success(vehicle.into()))
    }

    pub async fn list_all(&self) -> Result<ApiResponse<Vec<VehicleResponse>>, AppError> {
        let vehicles = self.engine.vehicles().list_all().await?;
        Ok(ApiResponse::success(
            vehicles.into_iter().map(VehicleResponse::from).collect(),
        ))
    }

    pub async fn list_available(&self) -> Result<ApiResponse<Vec<VehicleResponse>>, AppError> {
        let vehicles = self.engine.vehicles().list_available().await?;
        Ok(ApiResponse::success(
            vehicles.into_iter().map(VehicleResponse::from).collect(),
        ))
    }

    pub async fn nearest(
        &self,
        query: NearestVehiclesQuery,
    ) -> Result<ApiResponse<Vec<VehicleResponse>>, AppError> {
        query.validate()?;

        let limit = query
            .limit
            .map(|limit| limit as usize)
            .unwrap_or(self.engine.settings().default_options.candidate_pool_size);
        let vehicles = self
            .engine
            .vehicles()
            .nearest_available(query.latitude, query.longitude, limit)
            .await?;

        Ok(ApiResponse::success(
            vehicles
                .into_iter()
                .map(|v| VehicleResponse::with_distance(v, query.latitude, query.longitude))
                .collect(),
        ))
    }

    pub async fn update_location(
        &self,
        id: Uuid,
        request: UpdateLocationRequest,
    ) -> Result<ApiResponse<VehicleResponse>, AppError> {
        request.validate()?;

        let vehicle = self
            .engine
            .report_location(id, request.latitude, request.longitude)
            .await?;

        Ok(ApiResponse::success(vehicle.into()))
    }

    pub async fn decommission(&self, id: Uuid) -> Result<ApiResponse<()>, AppError> {
        self.engine.vehicles().decommission(id).await?;
        Ok(ApiResponse::message("Vehicle decommissioned".to_string()))
    }
}
