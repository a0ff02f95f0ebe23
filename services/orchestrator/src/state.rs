use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::health::ServiceHealth;
use crate::infra::db::{DbContainerRepository, DbHostRepository, DbUpdateStatusRepository};
use crate::infra::monitor::GrpcMonitorClient;
use crate::logstream::LogHub;
use crate::registry::ConnectionRegistry;
use crate::scheduler::{Scheduler, UpdateTick};
use crate::usecase::dispatch::DispatchUpdatesUseCase;

/// The scheduler tick as wired in production.
pub type FleetTick = DispatchUpdatesUseCase<
    DbHostRepository,
    DbContainerRepository,
    GrpcMonitorClient,
    Arc<ConnectionRegistry>,
>;

impl UpdateTick for FleetTick {
    fn run(&self) -> impl Future<Output = ()> + Send {
        self.execute()
    }
}

/// Shared state handed to both gRPC services.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub registry: Arc<ConnectionRegistry>,
    pub health: Arc<ServiceHealth>,
    pub logs: LogHub,
    pub scheduler: Arc<Scheduler<FleetTick>>,
}

impl AppState {
    pub fn host_repo(&self) -> DbHostRepository {
        DbHostRepository {
            db: self.db.clone(),
        }
    }

    pub fn container_repo(&self) -> DbContainerRepository {
        DbContainerRepository {
            db: self.db.clone(),
        }
    }

    pub fn update_status_repo(&self) -> DbUpdateStatusRepository {
        DbUpdateStatusRepository {
            db: self.db.clone(),
        }
    }
}
