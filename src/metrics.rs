//! Metric names and recording helpers.
//!
//! No exporter is installed here; without a recorder these calls are no-ops.

use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Unique images found by the last census.
pub const CENSUS_DEPLOYED_IMAGES: &str = "thermite_census_deployed_images";

/// Images eligible for removal in a repository.
pub const PRUNE_REPO_PRUNEABLE: &str = "thermite_prune_repo_pruneable";

/// Images deleted from a repository.
pub const PRUNE_REPO_DELETED: &str = "thermite_prune_repo_deleted_total";

/// Images the registry refused to delete from a repository.
pub const PRUNE_REPO_REFUSED: &str = "thermite_prune_repo_refused_total";

/// Repositories with a valid prune period tag in the last sweep.
pub const PRUNE_TAGGED_REPOS: &str = "thermite_prune_tagged_repos";

/// Repositories examined in the last sweep.
pub const PRUNE_REPOS_EXAMINED: &str = "thermite_prune_repos_examined";

/// Registers metric descriptions. Call once after installing a recorder.
pub fn register_metrics() {
    describe_gauge!(CENSUS_DEPLOYED_IMAGES, "Unique images deployed in the cluster");
    describe_gauge!(PRUNE_REPO_PRUNEABLE, "Images eligible for pruning per repository");
    describe_counter!(PRUNE_REPO_DELETED, "Images deleted per repository");
    describe_counter!(PRUNE_REPO_REFUSED, "Image deletions refused per repository");
    describe_gauge!(PRUNE_TAGGED_REPOS, "Repositories with a prune period tag");
    describe_gauge!(PRUNE_REPOS_EXAMINED, "Repositories examined by a sweep");
}

pub fn record_census(unique_images: usize) {
    gauge!(CENSUS_DEPLOYED_IMAGES).set(unique_images as f64);
}

pub fn record_pruneable(repository: &str, count: usize) {
    gauge!(PRUNE_REPO_PRUNEABLE, "repository" => repository.to_string()).set(count as f64);
}

pub fn record_deleted(repository: &str, count: usize) {
    counter!(PRUNE_REPO_DELETED, "repository" => repository.to_string()).increment(count as u64);
}

pub fn record_refused(repository: &str, count: usize) {
    counter!(PRUNE_REPO_REFUSED, "repository" => repository.to_string()).increment(count as u64);
}

pub fn record_sweep(tagged_repos: usize, examined_repos: usize) {
    gauge!(PRUNE_TAGGED_REPOS).set(tagged_repos as f64);
    gauge!(PRUNE_REPOS_EXAMINED).set(examined_repos as f64);
}
