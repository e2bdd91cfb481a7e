//! In-memory cluster and registry fakes shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::{
    DaemonSet, DaemonSetSpec, Deployment, DeploymentSpec, StatefulSet, StatefulSetSpec,
};
use k8s_openapi::api::batch::v1::{CronJob, CronJobSpec, JobSpec, JobTemplateSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tokio_util::sync::CancellationToken;

use crate::cluster::{ClusterApi, Workload, WorkloadKind};
use crate::error::ApiError;
use crate::models::{
    BatchDeleteOutput, ImageDetail, ImageFailure, ImageId, Page, Repository, RepositoryTag,
};
use crate::prune::MAX_BATCH_DELETE;
use crate::registry::RegistryApi;
use crate::strategy::DEFAULT_PERIOD_TAG_KEY;

pub const REGISTRY: &str = "000123456789.dkr.ecr.us-east-1.amazonaws.com";

/// Serve `all` in pages of `limit`, using the start offset as continuation token
fn paginate<T: Clone>(all: &[T], limit: Option<usize>, token: Option<&str>) -> Page<T> {
    let start: usize = token.map(|t| t.parse().unwrap()).unwrap_or(0);
    let end = match limit {
        Some(n) => (start + n).min(all.len()),
        None => all.len(),
    };
    Page {
        items: all[start..end].to_vec(),
        next_token: (end < all.len()).then(|| end.to_string()),
    }
}

#[derive(Default)]
pub struct FakeCluster {
    pub workloads: HashMap<WorkloadKind, Vec<Workload>>,
    pub failing: Option<WorkloadKind>,
    pub calls: Mutex<Vec<(WorkloadKind, Option<String>, Option<u32>)>>,
}

impl FakeCluster {
    pub fn with(workloads: Vec<Workload>) -> Self {
        let mut by_kind: HashMap<WorkloadKind, Vec<Workload>> = HashMap::new();
        for workload in workloads {
            by_kind.entry(workload.kind()).or_default().push(workload);
        }
        Self {
            workloads: by_kind,
            ..Default::default()
        }
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn list_workloads(
        &self,
        kind: WorkloadKind,
        continue_token: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Page<Workload>, ApiError> {
        self.calls
            .lock()
            .unwrap()
            .push((kind, continue_token.map(String::from), limit));
        if self.failing == Some(kind) {
            return Err("connection refused".into());
        }
        let all = self.workloads.get(&kind).cloned().unwrap_or_default();
        Ok(paginate(&all, limit.map(|n| n as usize), continue_token))
    }
}

pub fn metadata(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        ..Default::default()
    }
}

fn containers(images: &[&str]) -> Vec<Container> {
    images
        .iter()
        .map(|image| Container {
            image: Some(image.to_string()),
            ..Default::default()
        })
        .collect()
}

fn template(images: &[&str], init_images: &[&str]) -> PodTemplateSpec {
    PodTemplateSpec {
        spec: Some(PodSpec {
            containers: containers(images),
            init_containers: (!init_images.is_empty()).then(|| containers(init_images)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn deployment(name: &str, images: &[&str]) -> Workload {
    Workload::Deployment(Deployment {
        metadata: metadata(name),
        spec: Some(DeploymentSpec {
            template: template(images, &[]),
            ..Default::default()
        }),
        ..Default::default()
    })
}

pub fn daemon_set(name: &str, images: &[&str], init_images: &[&str]) -> Workload {
    Workload::DaemonSet(DaemonSet {
        metadata: metadata(name),
        spec: Some(DaemonSetSpec {
            template: template(images, init_images),
            ..Default::default()
        }),
        ..Default::default()
    })
}

pub fn stateful_set(name: &str, images: &[&str]) -> Workload {
    Workload::StatefulSet(StatefulSet {
        metadata: metadata(name),
        spec: Some(StatefulSetSpec {
            template: template(images, &[]),
            ..Default::default()
        }),
        ..Default::default()
    })
}

pub fn cron_job(name: &str, images: &[&str]) -> Workload {
    Workload::CronJob(CronJob {
        metadata: metadata(name),
        spec: Some(CronJobSpec {
            schedule: "* * * * *".to_string(),
            job_template: JobTemplateSpec {
                spec: Some(JobSpec {
                    template: template(images, &[]),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

#[derive(Default)]
pub struct FakeRegistry {
    pub repositories: Vec<Repository>,
    pub tags: HashMap<String, Vec<RepositoryTag>>,
    pub images: HashMap<String, Vec<ImageDetail>>,
    /// 1-based index of the BatchDeleteImage call that fails
    pub fail_batch: Option<usize>,
    /// Tags BatchDeleteImage reports as per-image failures
    pub refuse: HashSet<String>,
    /// 1-based index of the BatchDeleteImage call answering with untagged ids
    pub untagged_batch: Option<usize>,
    /// Cancel the token once the given BatchDeleteImage call has completed
    pub cancel_after: Option<(usize, CancellationToken)>,
    pub batches: Mutex<Vec<Vec<ImageId>>>,
    pub image_requests: Mutex<Vec<(Option<i32>, Option<String>)>>,
}

impl FakeRegistry {
    /// Add a repository whose prune period tag holds `period`, if any
    pub fn add_repo(&mut self, name: &str, period: Option<&str>, images: Vec<ImageDetail>) {
        let repo = Repository {
            name: name.to_string(),
            arn: format!("arn:aws:ecr:us-east-1:000123456789:repository/{}", name),
            uri: format!("{}/{}", REGISTRY, name),
        };
        let tags = period
            .map(|value| RepositoryTag {
                key: Some(DEFAULT_PERIOD_TAG_KEY.to_string()),
                value: Some(value.to_string()),
            })
            .into_iter()
            .collect();
        self.tags.insert(repo.arn.clone(), tags);
        self.images.insert(name.to_string(), images);
        self.repositories.push(repo);
    }

    pub fn deleted_count(&self) -> usize {
        let batches = self.batches.lock().unwrap();
        let succeeded = self.fail_batch.map_or(batches.len(), |failed| failed - 1);
        batches
            .iter()
            .take(succeeded)
            .flatten()
            .filter(|id| !id.tag.as_ref().is_some_and(|tag| self.refuse.contains(tag)))
            .count()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }
}

#[async_trait]
impl RegistryApi for FakeRegistry {
    async fn describe_repositories(
        &self,
        names: &[String],
        max_results: Option<i32>,
        next_token: Option<&str>,
    ) -> Result<Page<Repository>, ApiError> {
        let repos: Vec<Repository> = self
            .repositories
            .iter()
            .filter(|repo| names.is_empty() || names.contains(&repo.name))
            .cloned()
            .collect();
        Ok(paginate(&repos, max_results.map(|n| n as usize), next_token))
    }

    async fn list_tags(&self, arn: &str) -> Result<Vec<RepositoryTag>, ApiError> {
        self.tags
            .get(arn)
            .cloned()
            .ok_or_else(|| format!("ARN {} not found", arn).into())
    }

    async fn describe_images(
        &self,
        repository: &str,
        max_results: Option<i32>,
        next_token: Option<&str>,
    ) -> Result<Page<ImageDetail>, ApiError> {
        self.image_requests
            .lock()
            .unwrap()
            .push((max_results, next_token.map(String::from)));
        let images = self
            .images
            .get(repository)
            .ok_or_else(|| format!("repository with name {} not found", repository))?;
        Ok(paginate(images, max_results.map(|n| n as usize), next_token))
    }

    async fn batch_delete_image(
        &self,
        _repository: &str,
        ids: &[ImageId],
    ) -> Result<BatchDeleteOutput, ApiError> {
        assert!(ids.len() <= MAX_BATCH_DELETE);
        let batch = {
            let mut batches = self.batches.lock().unwrap();
            batches.push(ids.to_vec());
            batches.len()
        };
        if self.fail_batch == Some(batch) {
            return Err("throttled".into());
        }
        if let Some((after, cancel)) = &self.cancel_after {
            if *after == batch {
                cancel.cancel();
            }
        }

        let mut output = BatchDeleteOutput::default();
        for id in ids {
            match &id.tag {
                Some(tag) if self.refuse.contains(tag) => output.failures.push(ImageFailure {
                    id: id.clone(),
                    code: Some("ImageReferencedByManifestList".to_string()),
                    reason: Some("image is referenced by a manifest list".to_string()),
                }),
                _ if self.untagged_batch == Some(batch) => output.deleted.push(ImageId { tag: None }),
                _ => output.deleted.push(id.clone()),
            }
        }
        Ok(output)
    }
}

pub fn image(pushed_at: DateTime<Utc>, tags: &[&str]) -> ImageDetail {
    ImageDetail {
        pushed_at: Some(pushed_at),
        tags: tags.iter().map(|t| Some(t.to_string())).collect(),
    }
}

pub fn image_ref(repo: &str, tag: &str) -> String {
    format!("{}/{}:{}", REGISTRY, repo, tag)
}
