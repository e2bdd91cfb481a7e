use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::census::Surveyor;
use crate::error::RunError;
use crate::models::{RepoOutcome, SweepReport};
use crate::prune::Pruner;

/// Which repositories a run prunes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    AllRepositories,
    Repository(String),
}

/// Removes old registry images that are not deployed in the cluster
pub struct Thermite {
    surveyor: Option<Surveyor>,
    pruner: Pruner,
    scope: Scope,
}

impl Thermite {
    /// Without a surveyor no deployed images are excluded.
    pub fn new(surveyor: Option<Surveyor>, pruner: Pruner, scope: Scope) -> Self {
        Self {
            surveyor,
            pruner,
            scope,
        }
    }

    /// Survey deployed images, then prune every image older than its
    /// repository's prune period relative to `until`, excluding them.
    #[instrument(skip_all, fields(scope = ?self.scope))]
    pub async fn run(
        &self,
        until: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<SweepReport, RunError> {
        let excluded = match &self.surveyor {
            Some(surveyor) => surveyor.survey_deployed_images(cancel).await?,
            None => {
                info!("skipping cluster census");
                Vec::new()
            }
        };

        match &self.scope {
            Scope::AllRepositories => Ok(self
                .pruner
                .prune_all_repos(until, &excluded, cancel)
                .await?),
            Scope::Repository(name) => {
                let mut sweep = SweepReport {
                    examined_repos: 1,
                    ..Default::default()
                };
                let outcome = self
                    .pruner
                    .prune_repo(name, until, &excluded, cancel)
                    .await
                    .map_err(|mut partial| {
                        partial.report.examined_repos = 1;
                        partial
                    })?;
                match outcome {
                    RepoOutcome::Pruned(report) => {
                        sweep.tagged_repos = 1;
                        sweep.merge(report);
                    }
                    RepoOutcome::NoPolicy => info!(
                        repository = %name,
                        key = self.pruner.period_tag_key(),
                        "repository has no prune period tag"
                    ),
                }
                Ok(sweep)
            }
        }
    }
}
