//! sea-orm implementations of the store repositories.

use anyhow::Context as _;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};

use lighthouse_orchestrator_schema::{containers, hosts, update_status};

use crate::domain::repository::{ContainerRepository, HostRepository, UpdateStatusRepository};
use crate::domain::types::{
    ContainerRecord, HostRecord, NewContainer, NewUpdateStatus, UpdateStage,
};
use crate::error::OrchestratorError;

// ── Hosts ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbHostRepository {
    pub db: DatabaseConnection,
}

impl HostRepository for DbHostRepository {
    async fn upsert(
        &self,
        mac_address: &str,
        hostname: &str,
        ip_address: &str,
    ) -> Result<HostRecord, OrchestratorError> {
        let model = hosts::Entity::insert(hosts::ActiveModel {
            mac_address: Set(mac_address.to_owned()),
            hostname: Set(hostname.to_owned()),
            ip_address: Set(ip_address.to_owned()),
            ..Default::default()
        })
        .on_conflict(
            OnConflict::column(hosts::Column::MacAddress)
                .update_columns([hosts::Column::Hostname, hosts::Column::IpAddress])
                .to_owned(),
        )
        .exec_with_returning(&self.db)
        .await
        .context("upsert host")?;
        Ok(host_from_model(model))
    }

    async fn touch_heartbeat(&self, host_id: i64) -> Result<(), OrchestratorError> {
        hosts::ActiveModel {
            id: Set(host_id),
            last_heartbeat: Set(Some(Utc::now())),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("refresh host heartbeat")?;
        Ok(())
    }

    async fn find_by_mac(
        &self,
        mac_address: &str,
    ) -> Result<Option<HostRecord>, OrchestratorError> {
        let model = hosts::Entity::find()
            .filter(hosts::Column::MacAddress.eq(mac_address))
            .one(&self.db)
            .await
            .context("find host by mac")?;
        Ok(model.map(host_from_model))
    }

    async fn find_by_id(&self, host_id: i64) -> Result<Option<HostRecord>, OrchestratorError> {
        let model = hosts::Entity::find_by_id(host_id)
            .one(&self.db)
            .await
            .context("find host by id")?;
        Ok(model.map(host_from_model))
    }

    async fn all(&self) -> Result<Vec<HostRecord>, OrchestratorError> {
        let models = hosts::Entity::find()
            .all(&self.db)
            .await
            .context("list hosts")?;
        Ok(models.into_iter().map(host_from_model).collect())
    }
}

fn host_from_model(m: hosts::Model) -> HostRecord {
    HostRecord {
        id: m.id,
        mac_address: m.mac_address,
        hostname: m.hostname,
        ip_address: m.ip_address,
        last_heartbeat: m.last_heartbeat,
    }
}

// ── Containers ───────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbContainerRepository {
    pub db: DatabaseConnection,
}

impl ContainerRepository for DbContainerRepository {
    async fn upsert(&self, new: &NewContainer) -> Result<(), OrchestratorError> {
        // `watch` is absent from the update set: the operator owns it and an
        // inventory report must not reset it.
        containers::Entity::insert(containers::ActiveModel {
            host_id: Set(new.host_id),
            container_uid: Set(new.container_uid.clone()),
            name: Set(new.name.clone()),
            image: Set(new.image.clone()),
            digest: Set(new.digest.clone()),
            ports: Set(new.ports.clone()),
            env_vars: Set(new.env_vars.clone()),
            volumes: Set(new.volumes.clone()),
            network: Set(new.network.clone()),
            watch: Set(false),
            ..Default::default()
        })
        .on_conflict(
            OnConflict::columns([
                containers::Column::HostId,
                containers::Column::ContainerUid,
            ])
            .update_columns([
                containers::Column::Name,
                containers::Column::Image,
                containers::Column::Digest,
                containers::Column::Ports,
                containers::Column::EnvVars,
                containers::Column::Volumes,
                containers::Column::Network,
            ])
            .to_owned(),
        )
        .exec(&self.db)
        .await
        .context("upsert container")?;
        Ok(())
    }

    async fn delete_stale(
        &self,
        host_id: i64,
        active_uids: &[String],
    ) -> Result<u64, OrchestratorError> {
        let result = containers::Entity::delete_many()
            .filter(containers::Column::HostId.eq(host_id))
            .filter(containers::Column::ContainerUid.is_not_in(active_uids.iter().cloned()))
            .exec(&self.db)
            .await
            .context("delete stale containers")?;
        Ok(result.rows_affected)
    }

    async fn list_for_host(
        &self,
        host_id: i64,
    ) -> Result<Vec<ContainerRecord>, OrchestratorError> {
        let models = containers::Entity::find()
            .filter(containers::Column::HostId.eq(host_id))
            .all(&self.db)
            .await
            .context("list containers for host")?;
        Ok(models.into_iter().map(container_from_model).collect())
    }

    async fn list_watched(&self) -> Result<Vec<ContainerRecord>, OrchestratorError> {
        let models = containers::Entity::find()
            .filter(containers::Column::Watch.eq(true))
            .all(&self.db)
            .await
            .context("list watched containers")?;
        Ok(models.into_iter().map(container_from_model).collect())
    }

    async fn find_by_uid(
        &self,
        container_uid: &str,
    ) -> Result<Option<ContainerRecord>, OrchestratorError> {
        let model = containers::Entity::find()
            .filter(containers::Column::ContainerUid.eq(container_uid))
            .one(&self.db)
            .await
            .context("find container by uid")?;
        Ok(model.map(container_from_model))
    }

    async fn set_watch(
        &self,
        name: &str,
        host_mac: &str,
        watch: bool,
    ) -> Result<bool, OrchestratorError> {
        let Some(host) = hosts::Entity::find()
            .filter(hosts::Column::MacAddress.eq(host_mac))
            .one(&self.db)
            .await
            .context("find host for watch update")?
        else {
            return Ok(false);
        };

        let result = containers::Entity::update_many()
            .col_expr(containers::Column::Watch, Expr::value(watch))
            .filter(containers::Column::HostId.eq(host.id))
            .filter(containers::Column::Name.eq(name))
            .exec(&self.db)
            .await
            .context("set container watch")?;
        Ok(result.rows_affected > 0)
    }
}

fn container_from_model(m: containers::Model) -> ContainerRecord {
    ContainerRecord {
        id: m.id,
        host_id: m.host_id,
        container_uid: m.container_uid,
        name: m.name,
        image: m.image,
        digest: m.digest,
        ports: m.ports,
        env_vars: m.env_vars,
        volumes: m.volumes,
        network: m.network,
        watch: m.watch,
    }
}

// ── Update status ────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbUpdateStatusRepository {
    pub db: DatabaseConnection,
}

impl UpdateStatusRepository for DbUpdateStatusRepository {
    async fn append(&self, status: &NewUpdateStatus) -> Result<(), OrchestratorError> {
        update_status::ActiveModel {
            host_id: Set(status.host_id),
            image: Set(status.image.clone()),
            stage: Set(stage_to_db(status.stage)),
            logs: Set(status.logs.clone()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .context("append update status")?;
        Ok(())
    }
}

fn stage_to_db(stage: UpdateStage) -> update_status::UpdateStage {
    match stage {
        UpdateStage::Starting => update_status::UpdateStage::Starting,
        UpdateStage::Pulling => update_status::UpdateStage::Pulling,
        UpdateStage::Running => update_status::UpdateStage::Running,
        UpdateStage::Rollback => update_status::UpdateStage::Rollback,
        UpdateStage::Completed => update_status::UpdateStage::Completed,
        UpdateStage::Failed => update_status::UpdateStage::Failed,
    }
}
