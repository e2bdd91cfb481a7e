use std::collections::BTreeSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::cluster::{ClusterApi, Workload, WorkloadKind};
use crate::error::CensusError;
use crate::metrics;

/// Surveyor configuration
#[derive(Debug, Clone)]
pub struct SurveyorConfig {
    /// Workload kinds to survey, in order
    pub kinds: Vec<WorkloadKind>,
    /// Maximum items per list call; 0 leaves the API default
    pub page_size: u32,
}

impl Default for SurveyorConfig {
    fn default() -> Self {
        Self {
            kinds: WorkloadKind::ALL.to_vec(),
            page_size: 0,
        }
    }
}

/// Surveys the container images referenced by workloads in a cluster
pub struct Surveyor {
    cluster: Arc<dyn ClusterApi>,
    config: SurveyorConfig,
}

impl Surveyor {
    pub fn new(cluster: Arc<dyn ClusterApi>, config: SurveyorConfig) -> Self {
        Self { cluster, config }
    }

    /// Return the sorted, deduplicated image references of every container
    /// and init container of the configured workload kinds.
    #[instrument(skip_all)]
    pub async fn survey_deployed_images(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, CensusError> {
        let mut images = BTreeSet::new();

        for &kind in &self.config.kinds {
            let mut continue_token: Option<String> = None;
            loop {
                let page = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(CensusError::Cancelled),
                    page = self.cluster.list_workloads(kind, continue_token.as_deref(), self.limit()) => {
                        page.map_err(|source| CensusError::List { kind, source })?
                    }
                };

                debug!(%kind, items = page.items.len(), "listed workload page");
                for workload in &page.items {
                    collect_images(workload, &mut images)?;
                }

                match page.next_token {
                    Some(next) => continue_token = Some(next),
                    None => break,
                }
            }
            info!(%kind, "listed images from workloads");
        }

        let refs: Vec<String> = images.into_iter().collect();
        info!(count = refs.len(), "surveyed unique deployed images");
        metrics::record_census(refs.len());
        Ok(refs)
    }

    fn limit(&self) -> Option<u32> {
        (self.config.page_size > 0).then_some(self.config.page_size)
    }
}

fn collect_images(workload: &Workload, images: &mut BTreeSet<String>) -> Result<(), CensusError> {
    let spec = workload
        .pod_spec()
        .ok_or_else(|| CensusError::MissingPodTemplate {
            kind: workload.kind(),
            name: workload.name(),
        })?;

    let containers = spec
        .containers
        .iter()
        .chain(spec.init_containers.iter().flatten());
    for container in containers {
        if let Some(image) = &container.image {
            images.insert(image.clone());
        }
    }
    Ok(())
}
