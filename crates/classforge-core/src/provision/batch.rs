//! Staggered fan-out of workflows over a batch of entities.
//!
//! Every description gets its own task. Task `i` waits until `i × unit` has
//! passed since the batch started and then runs unpaced. A failure is
//! reported for its entity only; siblings keep going.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::entity::{
    EntityRef, GroupRepoDescription, PersistedProvisioningState, ProjectRepoDescription,
    Staggered,
};
use crate::error::ProvisionError;
use crate::schedule::StaggerSchedule;

use super::repair::{repair_group, repair_group_facets, repair_project, repair_project_facets};
use super::{ProvisionTargets, Provisioner, RepairFacet, provision_group, provision_project};

/// Final result for one entity of a batch.
#[derive(Debug)]
pub struct EntityOutcome {
    pub entity: EntityRef,
    pub result: Result<PersistedProvisioningState, ProvisionError>,
}

impl EntityOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn summary(&self) -> OutcomeSummary {
        match &self.result {
            Ok(state) => OutcomeSummary {
                entity: self.entity.to_string(),
                status: "ok",
                repo_url: Some(state.repo.url.clone()).filter(|url| !url.is_empty()),
                error: None,
            },
            Err(ProvisionError::AlreadyProvisioned { url }) => OutcomeSummary {
                entity: self.entity.to_string(),
                status: "already-provisioned",
                repo_url: Some(url.clone()),
                error: None,
            },
            Err(error) => OutcomeSummary {
                entity: self.entity.to_string(),
                status: "failed",
                repo_url: None,
                error: Some(error.to_string()),
            },
        }
    }
}

/// Flat, serializable view of an [`EntityOutcome`] for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeSummary {
    pub entity: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs workflows for whole batches of entities.
#[derive(Clone)]
pub struct BatchRunner {
    provisioner: Arc<Provisioner>,
    targets: Arc<ProvisionTargets>,
    create_schedule: StaggerSchedule,
    repair_schedule: StaggerSchedule,
}

impl BatchRunner {
    pub fn new(provisioner: Provisioner, targets: ProvisionTargets) -> Self {
        Self {
            provisioner: Arc::new(provisioner),
            targets: Arc::new(targets),
            create_schedule: StaggerSchedule::for_creation(),
            repair_schedule: StaggerSchedule::for_repair(),
        }
    }

    pub fn with_schedules(mut self, create: StaggerSchedule, repair: StaggerSchedule) -> Self {
        self.create_schedule = create;
        self.repair_schedule = repair;
        self
    }

    pub fn targets(&self) -> &ProvisionTargets {
        &self.targets
    }

    pub async fn provision_groups(
        &self,
        descriptions: Vec<GroupRepoDescription>,
    ) -> Vec<EntityOutcome> {
        self.fan_out(self.create_schedule, descriptions, |p, t, d| async move {
            provision_group(&p, &t, &d).await
        })
        .await
    }

    pub async fn provision_projects(
        &self,
        descriptions: Vec<ProjectRepoDescription>,
    ) -> Vec<EntityOutcome> {
        self.fan_out(self.create_schedule, descriptions, |p, t, d| async move {
            provision_project(&p, &t, &d).await
        })
        .await
    }

    /// Repair every group. `None` runs the default repair for each entity;
    /// `Some` runs exactly the listed facets.
    pub async fn repair_groups(
        &self,
        descriptions: Vec<GroupRepoDescription>,
        facets: Option<Vec<RepairFacet>>,
    ) -> Vec<EntityOutcome> {
        let facets = facets.map(Arc::new);
        self.fan_out(self.repair_schedule, descriptions, move |p, t, d| {
            let facets = facets.clone();
            async move {
                match facets {
                    Some(facets) => repair_group_facets(&p, &t, &d, &facets).await,
                    None => repair_group(&p, &t, &d).await,
                }
            }
        })
        .await
    }

    pub async fn repair_projects(
        &self,
        descriptions: Vec<ProjectRepoDescription>,
        facets: Option<Vec<RepairFacet>>,
    ) -> Vec<EntityOutcome> {
        let facets = facets.map(Arc::new);
        self.fan_out(self.repair_schedule, descriptions, move |p, t, d| {
            let facets = facets.clone();
            async move {
                match facets {
                    Some(facets) => repair_project_facets(&p, &t, &d, &facets).await,
                    None => repair_project(&p, &t, &d).await,
                }
            }
        })
        .await
    }

    /// Outcomes come back in input order regardless of completion order.
    async fn fan_out<D, F, Fut>(
        &self,
        schedule: StaggerSchedule,
        descriptions: Vec<D>,
        run: F,
    ) -> Vec<EntityOutcome>
    where
        D: Staggered + Send + 'static,
        F: Fn(Arc<Provisioner>, Arc<ProvisionTargets>, D) -> Fut,
        Fut: Future<Output = Result<PersistedProvisioningState, ProvisionError>> + Send + 'static,
    {
        let batch_start = Instant::now();
        let total = descriptions.len();
        info!(total, unit_ms = schedule.unit().as_millis() as u64, "starting batch");

        let mut entities = Vec::with_capacity(total);
        let mut handles = Vec::with_capacity(total);
        for description in descriptions {
            let index = description.index();
            entities.push(description.entity().clone());
            let work = run(self.provisioner.clone(), self.targets.clone(), description);
            handles.push(tokio::spawn(async move {
                schedule.wait_turn(batch_start, index).await;
                work.await
            }));
        }

        let outcomes: Vec<EntityOutcome> = join_all(handles)
            .await
            .into_iter()
            .zip(entities)
            .map(|(joined, entity)| {
                let result = joined.unwrap_or_else(|join_error| {
                    Err(ProvisionError::Aborted(join_error.to_string()))
                });
                match &result {
                    Ok(_) => info!(%entity, "entity done"),
                    Err(error) => warn!(%entity, %error, "entity failed"),
                }
                EntityOutcome { entity, result }
            })
            .collect();

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        let elapsed_ms = batch_start.elapsed().as_millis() as u64;
        info!(total, failed, elapsed_ms, "batch finished");
        outcomes
    }
}
