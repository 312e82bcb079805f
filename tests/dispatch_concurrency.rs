use std::collections::HashSet;
use std::sync::Arc;

use emergency_dispatch::config::EnvironmentConfig;
use emergency_dispatch::models::request::{NewServiceRequest, RequestStatus};
use emergency_dispatch::models::vehicle::NewVehicle;
use emergency_dispatch::utils::errors::AppError;
use emergency_dispatch::AppState;

fn new_vehicle(index: usize) -> NewVehicle {
    NewVehicle {
        plate_number: format!("CC-{:03}", index),
        latitude: 0.0 + index as f64 * 0.01,
        longitude: 0.0,
        driver_name: format!("Driver {}", index),
        driver_contact: format!("+1 555 {:04}", index),
    }
}

fn new_request(index: usize) -> NewServiceRequest {
    NewServiceRequest {
        requester_id: format!("caller-{}", index),
        latitude: 0.005,
        longitude: 0.005,
        description: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_dispatches_never_share_a_vehicle() {
    const VEHICLES: usize = 3;
    const REQUESTS: usize = 10;

    let state = AppState::in_memory(EnvironmentConfig::default()).unwrap();
    let engine = state.engine.clone();

    for i in 0..VEHICLES {
        engine.vehicles().register(new_vehicle(i)).await.unwrap();
    }
    let mut request_ids = Vec::new();
    for i in 0..REQUESTS {
        request_ids.push(engine.create_request(new_request(i)).await.unwrap().id);
    }

    let handles: Vec<_> = request_ids
        .iter()
        .map(|id| {
            let engine = Arc::clone(&engine);
            let id = *id;
            tokio::spawn(async move { engine.dispatch(id).await })
        })
        .collect();

    let mut winners = Vec::new();
    let mut no_vehicle = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(request) => winners.push(request),
            Err(AppError::NoAvailableVehicle) => no_vehicle += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(winners.len(), VEHICLES);
    assert_eq!(no_vehicle, REQUESTS - VEHICLES);

    let assigned: HashSet<_> = winners.iter().filter_map(|r| r.vehicle_id).collect();
    assert_eq!(assigned.len(), VEHICLES);
    assert!(engine.vehicles().list_available().await.unwrap().is_empty());

    for id in &request_ids {
        let request = engine.get_request(*id).await.unwrap();
        assert!(matches!(
            request.status,
            RequestStatus::Pending | RequestStatus::Dispatched
        ));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_racing_dispatch_never_strands_a_vehicle() {
    let state = AppState::in_memory(EnvironmentConfig::default()).unwrap();
    let engine = state.engine.clone();
    engine.vehicles().register(new_vehicle(1)).await.unwrap();

    for i in 0..20 {
        let request = engine.create_request(new_request(i)).await.unwrap();

        let dispatcher = Arc::clone(&engine);
        let canceller = Arc::clone(&engine);
        let dispatch = tokio::spawn(async move { dispatcher.dispatch(request.id).await });
        let cancel = tokio::spawn(async move { canceller.cancel(request.id).await });
        let _ = dispatch.await.unwrap();
        let _ = cancel.await.unwrap();

        let final_state = engine.get_request(request.id).await.unwrap();
        match final_state.status {
            // El cancel llegó primero y el despacho fue rechazado
            RequestStatus::Cancelled => {
                assert_eq!(engine.vehicles().list_available().await.unwrap().len(), 1);
            }
            other => panic!("request ended in {}", other),
        }
    }
}
