use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::PodSpec;
use kube::api::{Api, ListParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::models::Page;

/// Workload resource kinds that own a pod template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    CronJob,
    DaemonSet,
    Deployment,
    Job,
    StatefulSet,
}

impl WorkloadKind {
    /// Every supported kind, in default survey order
    pub const ALL: [WorkloadKind; 5] = [
        WorkloadKind::Deployment,
        WorkloadKind::DaemonSet,
        WorkloadKind::CronJob,
        WorkloadKind::Job,
        WorkloadKind::StatefulSet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::CronJob => "CronJob",
            WorkloadKind::DaemonSet => "DaemonSet",
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::Job => "Job",
            WorkloadKind::StatefulSet => "StatefulSet",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A listed workload resource of any supported kind
#[derive(Debug, Clone)]
pub enum Workload {
    CronJob(CronJob),
    DaemonSet(DaemonSet),
    Deployment(Deployment),
    Job(Job),
    StatefulSet(StatefulSet),
}

impl Workload {
    pub fn kind(&self) -> WorkloadKind {
        match self {
            Workload::CronJob(_) => WorkloadKind::CronJob,
            Workload::DaemonSet(_) => WorkloadKind::DaemonSet,
            Workload::Deployment(_) => WorkloadKind::Deployment,
            Workload::Job(_) => WorkloadKind::Job,
            Workload::StatefulSet(_) => WorkloadKind::StatefulSet,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Workload::CronJob(r) => r.name_any(),
            Workload::DaemonSet(r) => r.name_any(),
            Workload::Deployment(r) => r.name_any(),
            Workload::Job(r) => r.name_any(),
            Workload::StatefulSet(r) => r.name_any(),
        }
    }

    /// The pod spec of the workload's template, if the resource carries one
    pub fn pod_spec(&self) -> Option<&PodSpec> {
        match self {
            Workload::CronJob(cron_job) => cron_job
                .spec
                .as_ref()?
                .job_template
                .spec
                .as_ref()?
                .template
                .spec
                .as_ref(),
            Workload::DaemonSet(daemon_set) => daemon_set.spec.as_ref()?.template.spec.as_ref(),
            Workload::Deployment(deployment) => deployment.spec.as_ref()?.template.spec.as_ref(),
            Workload::Job(job) => job.spec.as_ref()?.template.spec.as_ref(),
            Workload::StatefulSet(stateful_set) => {
                stateful_set.spec.as_ref()?.template.spec.as_ref()
            }
        }
    }
}

/// Read-only view of a cluster control plane
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// List one page of workloads of `kind` across all namespaces
    async fn list_workloads(
        &self,
        kind: WorkloadKind,
        continue_token: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Page<Workload>, ApiError>;
}

/// ClusterApi backed by the Kubernetes API server
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the in-cluster environment or the local kubeconfig
    pub async fn try_default() -> Result<Self, kube::Error> {
        Ok(Self::new(Client::try_default().await?))
    }

    async fn list<K>(
        &self,
        params: &ListParams,
        wrap: fn(K) -> Workload,
    ) -> Result<Page<Workload>, ApiError>
    where
        K: Resource + Clone + DeserializeOwned + fmt::Debug,
        K::DynamicType: Default,
    {
        let api: Api<K> = Api::all(self.client.clone());
        let list = api.list(params).await?;
        Ok(Page {
            items: list.items.into_iter().map(wrap).collect(),
            next_token: list.metadata.continue_.filter(|token| !token.is_empty()),
        })
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn list_workloads(
        &self,
        kind: WorkloadKind,
        continue_token: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Page<Workload>, ApiError> {
        let mut params = ListParams::default();
        if let Some(limit) = limit {
            params = params.limit(limit);
        }
        if let Some(token) = continue_token {
            params = params.continue_token(token);
        }

        match kind {
            WorkloadKind::CronJob => self.list(&params, Workload::CronJob).await,
            WorkloadKind::DaemonSet => self.list(&params, Workload::DaemonSet).await,
            WorkloadKind::Deployment => self.list(&params, Workload::Deployment).await,
            WorkloadKind::Job => self.list(&params, Workload::Job).await,
            WorkloadKind::StatefulSet => self.list(&params, Workload::StatefulSet).await,
        }
    }
}
