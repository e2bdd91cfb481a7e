use chrono::{DateTime, Utc};
use serde::Serialize;

/// One page of a paginated list call
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

/// Registry repository as returned by DescribeRepositories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub name: String,
    pub arn: String,
    pub uri: String,
}

impl Repository {
    /// Image reference `<uri>:<tag>` for a tag in this repository
    pub fn image_ref(&self, tag: &str) -> String {
        format!("{}:{}", self.uri, tag)
    }
}

/// Resource tag attached to a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryTag {
    pub key: Option<String>,
    pub value: Option<String>,
}

/// DescribeImages entry. A missing push time or tag is a malformed response.
#[derive(Debug, Clone)]
pub struct ImageDetail {
    pub pushed_at: Option<DateTime<Utc>>,
    pub tags: Vec<Option<String>>,
}

/// Image identifier used by BatchDeleteImage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageId {
    pub tag: Option<String>,
}

impl ImageId {
    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
        }
    }
}

/// Per-image failure reported by BatchDeleteImage
#[derive(Debug, Clone)]
pub struct ImageFailure {
    pub id: ImageId,
    pub code: Option<String>,
    pub reason: Option<String>,
}

/// BatchDeleteImage response
#[derive(Debug, Clone, Default)]
pub struct BatchDeleteOutput {
    pub deleted: Vec<ImageId>,
    pub failures: Vec<ImageFailure>,
}

/// Result of a prune pass over one repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// References removed, or that would be removed in a dry run
    pub pruned: Vec<String>,
    /// Images confirmed deleted by the registry (0 in a dry run)
    pub deleted: usize,
    /// Images the registry refused to delete
    pub refused: usize,
}

/// Outcome of pruning one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoOutcome {
    Pruned(PruneReport),
    /// The repository carries no valid prune period tag
    NoPolicy,
}

#[cfg(test)]
impl RepoOutcome {
    pub fn pruned(&self) -> &[String] {
        match self {
            RepoOutcome::Pruned(report) => &report.pruned,
            RepoOutcome::NoPolicy => &[],
        }
    }
}

/// Result of pruning every repository in the registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub pruned: Vec<String>,
    pub deleted: usize,
    pub refused: usize,
    /// Repositories with a valid prune period tag
    pub tagged_repos: usize,
    pub examined_repos: usize,
}

impl SweepReport {
    pub fn merge(&mut self, report: PruneReport) {
        self.pruned.extend(report.pruned);
        self.deleted += report.deleted;
        self.refused += report.refused;
    }
}

impl From<PruneReport> for SweepReport {
    fn from(report: PruneReport) -> Self {
        let mut sweep = SweepReport::default();
        sweep.merge(report);
        sweep
    }
}
