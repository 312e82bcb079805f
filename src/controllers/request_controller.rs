use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::dto::common::ApiResponse;
use crate::dto::request_dto::{CreateServiceRequest, DispatchRequest, ServiceRequestResponse};
use crate::models::history::HistoryEntry;
use crate::services::dispatch_engine::DispatchEngine;
use crate::utils::errors::AppError;

pub struct RequestController {
    engine: Arc<DispatchEngine>,
}

impl RequestController {
    pub fn new(engine: Arc<DispatchEngine>) -> Self {
        Self { engine }
    }

    pub async fn create(
        &self,
        request: CreateServiceRequest,
    ) -> Result<ApiResponse<ServiceRequestResponse>, AppError> {
        request.validate()?;

        let created = self.engine.create_request(request.into()).await?;

        Ok(ApiResponse::success_with_message(
            created.into(),
            "Request created".to_string(),
        ))
    }

    pub async fn get_by_id(
        &self,
        id: Uuid,
    ) -> Result<ApiResponse<ServiceRequestResponse>, AppError> {
        let request = self.engine.get_request(id).await?;
        Ok(ApiResponse::success(request.into()))
    }

    pub async fn list_all(&self) -> Result<ApiResponse<Vec<ServiceRequestResponse>>, AppError> {
        let requests = self.engine.requests().list_all().await?;
        Ok(ApiResponse::success(
            requests.into_iter().map(ServiceRequestResponse::from).collect(),
        ))
    }

    pub async fn list_by_requester(
        &self,
        requester_id: &str,
    ) -> Result<ApiResponse<Vec<ServiceRequestResponse>>, AppError> {
        let requests = self.engine.requests().list_by_requester(requester_id).await?;
        Ok(ApiResponse::success(
            requests.into_iter().map(ServiceRequestResponse::from).collect(),
        ))
    }

    pub async fn dispatch(
        &self,
        id: Uuid,
        request: Option<DispatchRequest>,
    ) -> Result<ApiResponse<ServiceRequestResponse>, AppError> {
        let request = request.unwrap_or_default();
        request.validate()?;

        let options = request.merge_into(self.engine.settings().default_options);
        let dispatched = self.engine.dispatch_with(id, options).await?;

        Ok(ApiResponse::success_with_message(
            dispatched.into(),
            "Vehicle dispatched".to_string(),
        ))
    }

    pub async fn complete(&self, id: Uuid) -> Result<ApiResponse<ServiceRequestResponse>, AppError> {
        let completed = self.engine.complete(id).await?;
        Ok(ApiResponse::success_with_message(
            completed.into(),
            "Request completed".to_string(),
        ))
    }

    pub async fn cancel(&self, id: Uuid) -> Result<ApiResponse<ServiceRequestResponse>, AppError> {
        let cancelled = self.engine.cancel(id).await?;
        Ok(ApiResponse::success_with_message(
            cancelled.into(),
            "Request cancelled".to_string(),
        ))
    }

    pub async fn history(&self, id: Uuid) -> Result<ApiResponse<Vec<HistoryEntry>>, AppError> {
        let entries = self.engine.get_history(id).await?;
        Ok(ApiResponse::success(entries))
    }
}
