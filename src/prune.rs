use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{ApiError, PartialPrune, PruneError};
use crate::metrics;
use crate::models::{ImageDetail, ImageId, PruneReport, RepoOutcome, Repository, SweepReport};
use crate::registry::RegistryApi;
use crate::strategy::{self, Whitelist, DEFAULT_PERIOD_TAG_KEY};

/// Maximum image ids accepted by one BatchDeleteImage call
pub const MAX_BATCH_DELETE: usize = 100;

/// Prune engine configuration
#[derive(Debug, Clone)]
pub struct PruneConfig {
    /// Repository tag key holding the prune period in days
    pub period_tag_key: String,
    /// Maximum items per list call; 0 leaves the API default
    pub page_size: u32,
    /// Delete eligible images instead of only reporting them
    pub remove_images: bool,
    /// Allow pruning when the caller excludes no images
    pub allow_zero_exclusions: bool,
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            period_tag_key: DEFAULT_PERIOD_TAG_KEY.to_string(),
            page_size: 0,
            remove_images: false,
            allow_zero_exclusions: false,
        }
    }
}

/// Removes images from registry repositories based on their age
pub struct Pruner {
    registry: Arc<dyn RegistryApi>,
    config: PruneConfig,
}

impl Pruner {
    pub fn new(registry: Arc<dyn RegistryApi>, config: PruneConfig) -> Self {
        Self { registry, config }
    }

    pub fn period_tag_key(&self) -> &str {
        &self.config.period_tag_key
    }

    /// Run [`Pruner::prune_repo`] over every repository in the registry.
    ///
    /// Repositories without a prune period are skipped. Any other failure
    /// stops the sweep and carries the references pruned so far.
    #[instrument(skip_all, fields(excluded = excluded.len()))]
    pub async fn prune_all_repos(
        &self,
        until: DateTime<Utc>,
        excluded: &[String],
        cancel: &CancellationToken,
    ) -> Result<SweepReport, PartialPrune> {
        let repos = self.list_repositories(cancel).await?;
        let mut sweep = SweepReport {
            examined_repos: repos.len(),
            ..Default::default()
        };

        for repo in &repos {
            match self.prune_repo(&repo.name, until, excluded, cancel).await {
                Ok(RepoOutcome::Pruned(report)) => {
                    sweep.tagged_repos += 1;
                    sweep.merge(report);
                }
                Ok(RepoOutcome::NoPolicy) => {
                    debug!(repository = %repo.name, "skipping repository without prune period");
                }
                Err(failure) => {
                    sweep.pruned.extend(failure.report.pruned);
                    sweep.deleted += failure.report.deleted;
                    sweep.refused += failure.report.refused;
                    warn!(repository = %repo.uri, error = %failure.source, "error pruning repository");
                    metrics::record_sweep(sweep.tagged_repos, sweep.examined_repos);
                    return Err(PartialPrune::new(sweep, failure.source));
                }
            }
        }

        info!(
            pruned = sweep.pruned.len(),
            tagged = sweep.tagged_repos,
            examined = sweep.examined_repos,
            "pruned registry images"
        );
        metrics::record_sweep(sweep.tagged_repos, sweep.examined_repos);
        Ok(sweep)
    }

    /// Prune the named repository.
    ///
    /// The repository's prune period tag gives the number of days after push
    /// before an image may be removed. Images pushed before `until` minus that
    /// period are pruned, except those referenced by `excluded` and the most
    /// recently pushed image. Returns [`RepoOutcome::NoPolicy`] when the tag is
    /// absent or invalid.
    ///
    /// Fails when `excluded` is empty unless zero exclusions are allowed.
    #[instrument(skip(self, until, excluded, cancel), fields(excluded = excluded.len()))]
    pub async fn prune_repo(
        &self,
        name: &str,
        until: DateTime<Utc>,
        excluded: &[String],
        cancel: &CancellationToken,
    ) -> Result<RepoOutcome, PartialPrune> {
        if excluded.is_empty() && !self.config.allow_zero_exclusions {
            return Err(PruneError::ZeroExclusions.into());
        }

        let repo = self.repository(name, cancel).await?;
        let Some(period) = self.resolve_period(&repo.arn, cancel).await? else {
            info!(repository = name, "no valid prune period tag");
            return Ok(RepoOutcome::NoPolicy);
        };
        info!(period, repository = name, "found prune period in days");

        let details = self.list_images(&repo, cancel).await?;

        let mut whitelist = Whitelist::new(excluded);
        strategy::protect_most_recent(&repo, &details, &mut whitelist)?;
        let plan = strategy::plan(
            &repo,
            &details,
            strategy::cutoff(until, period),
            &whitelist,
        )?;

        info!(
            eligible = plan.eligible.len(),
            survivors = plan.survivors,
            protected = plan.protected,
            whitelisted = whitelist.len(),
            repository = name,
            "found pruneable images"
        );
        metrics::record_pruneable(name, plan.eligible.len());

        if !self.config.remove_images {
            metrics::record_deleted(name, 0);
            let pruned = plan.eligible.iter().map(|tag| repo.image_ref(tag)).collect();
            return Ok(RepoOutcome::Pruned(PruneReport {
                pruned,
                ..Default::default()
            }));
        }

        self.delete_images(&repo, &plan.eligible, cancel)
            .await
            .map(RepoOutcome::Pruned)
    }

    /// Resolve the prune period of the repository with `arn`, in days.
    ///
    /// `None` means the repository has no usable prune period tag.
    #[instrument(skip(self, cancel))]
    pub async fn resolve_period(
        &self,
        arn: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<u32>, PruneError> {
        let tags = guard(
            cancel,
            "ListTagsForResource",
            arn,
            self.registry.list_tags(arn),
        )
        .await?;
        Ok(strategy::prune_period(&tags, self.period_tag_key(), arn))
    }

    async fn repository(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Repository, PruneError> {
        let names = [name.to_string()];
        let page = guard(
            cancel,
            "DescribeRepositories",
            name,
            self.registry.describe_repositories(&names, None, None),
        )
        .await?;
        page.items
            .into_iter()
            .next()
            .ok_or_else(|| PruneError::RepositoryNotFound(name.to_string()))
    }

    async fn list_repositories(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Repository>, PruneError> {
        let mut repos = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let page = guard(
                cancel,
                "DescribeRepositories",
                "*",
                self.registry
                    .describe_repositories(&[], self.max_results(), next_token.as_deref()),
            )
            .await?;
            repos.extend(page.items);
            match page.next_token {
                Some(next) => next_token = Some(next),
                None => break,
            }
        }
        Ok(repos)
    }

    async fn list_images(
        &self,
        repo: &Repository,
        cancel: &CancellationToken,
    ) -> Result<Vec<ImageDetail>, PruneError> {
        let mut details = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let page = guard(
                cancel,
                "DescribeImages",
                &repo.name,
                self.registry
                    .describe_images(&repo.name, self.max_results(), next_token.as_deref()),
            )
            .await?;
            debug!(images = page.items.len(), repository = %repo.name, "described image page");
            details.extend(page.items);
            match page.next_token {
                Some(next) => next_token = Some(next),
                None => break,
            }
        }
        Ok(details)
    }

    /// Delete tags in batches of [`MAX_BATCH_DELETE`]. A failed batch stops
    /// the deletion; references from earlier batches are kept in the error.
    /// Ids the registry refuses are counted, not pruned.
    async fn delete_images(
        &self,
        repo: &Repository,
        tags: &[String],
        cancel: &CancellationToken,
    ) -> Result<PruneReport, PartialPrune> {
        let mut report = PruneReport::default();

        for batch in tags.chunks(MAX_BATCH_DELETE) {
            let ids: Vec<ImageId> = batch.iter().map(ImageId::tag).collect();
            let output = match guard(
                cancel,
                "BatchDeleteImage",
                &repo.name,
                self.registry.batch_delete_image(&repo.name, &ids),
            )
            .await
            {
                Ok(output) => output,
                Err(err) => return Err(PartialPrune::new(report.into(), err)),
            };

            for failure in &output.failures {
                warn!(
                    tag = failure.id.tag.as_deref().unwrap_or("<none>"),
                    code = failure.code.as_deref().unwrap_or("<none>"),
                    reason = failure.reason.as_deref().unwrap_or("<none>"),
                    repository = %repo.name,
                    "registry refused to delete image"
                );
            }
            info!(
                deleted = output.deleted.len(),
                repository = %repo.name,
                "deleted images from repository"
            );
            metrics::record_deleted(&repo.name, output.deleted.len());
            metrics::record_refused(&repo.name, output.failures.len());
            report.deleted += output.deleted.len();
            report.refused += output.failures.len();

            for id in &output.deleted {
                let Some(tag) = id.tag.as_deref() else {
                    return Err(PartialPrune::new(
                        report.into(),
                        PruneError::MissingImageTag(repo.uri.clone()),
                    ));
                };
                report.pruned.push(repo.image_ref(tag));
            }
        }

        Ok(report)
    }

    fn max_results(&self) -> Option<i32> {
        i32::try_from(self.config.page_size).ok().filter(|n| *n > 0)
    }
}

/// Await a registry call unless `cancel` fires first
async fn guard<T>(
    cancel: &CancellationToken,
    operation: &'static str,
    repository: &str,
    call: impl Future<Output = Result<T, ApiError>>,
) -> Result<T, PruneError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PruneError::Cancelled),
        result = call => result.map_err(|source| PruneError::Api {
            operation,
            repository: repository.to_string(),
            source,
        }),
    }
}
