use thiserror::Error;

use crate::cluster::WorkloadKind;
use crate::models::SweepReport;

/// Error reported by a cluster or registry collaborator.
pub type ApiError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum CensusError {
    #[error("error listing {kind} resources")]
    List {
        kind: WorkloadKind,
        #[source]
        source: ApiError,
    },

    #[error("error getting pod spec from {kind} {name}: missing pod template")]
    MissingPodTemplate { kind: WorkloadKind, name: String },

    #[error("census cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum PruneError {
    #[error("zero images excluded from prune")]
    ZeroExclusions,

    #[error("no repository named {0} found")]
    RepositoryNotFound(String),

    #[error("error calling {operation} for repository {repository}")]
    Api {
        operation: &'static str,
        repository: String,
        #[source]
        source: ApiError,
    },

    #[error("found unexpected missing image pushed at time in repository {0}")]
    MissingPushedAt(String),

    #[error("found unexpected missing image tag in repository {0}")]
    MissingImageTag(String),

    #[error("prune cancelled")]
    Cancelled,
}

/// A prune failure together with everything done before it happened.
#[derive(Error, Debug)]
#[error("{} images pruned before failure", .report.pruned.len())]
pub struct PartialPrune {
    pub report: SweepReport,
    #[source]
    pub source: PruneError,
}

impl PartialPrune {
    pub fn new(report: SweepReport, source: PruneError) -> Self {
        Self { report, source }
    }
}

impl From<PruneError> for PartialPrune {
    fn from(source: PruneError) -> Self {
        Self::new(SweepReport::default(), source)
    }
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("error surveying Kubernetes images")]
    Census(#[from] CensusError),

    #[error("error pruning registry images")]
    Prune(#[from] PartialPrune),
}

impl RunError {
    /// Counts and references accumulated before the failure
    pub fn report(&self) -> SweepReport {
        match self {
            RunError::Census(_) => SweepReport::default(),
            RunError::Prune(partial) => partial.report.clone(),
        }
    }
}
