use clap::{Parser, ValueEnum};

use crate::strategy::DEFAULT_PERIOD_TAG_KEY;

/// thermite: remove old Amazon ECR images that are not deployed in Kubernetes
///
/// Checks each registry repository for a resource tag giving the number of
/// days after push before an image may be pruned, and never prunes images
/// used by a CronJob, DaemonSet, Deployment, Job, or StatefulSet in the
/// cluster, nor the most recently pushed image of a repository.
#[derive(Parser, Debug)]
#[command(name = "thermite", version, about)]
pub struct Cli {
    /// Remove eligible images instead of only listing them
    #[arg(short = 'y', long, env = "THERMITE_REMOVE_IMAGES", default_value_t = false)]
    pub remove_images: bool,

    /// Repository resource tag holding the prune period in days
    #[arg(long, env = "THERMITE_PERIOD_TAG_KEY", default_value = DEFAULT_PERIOD_TAG_KEY)]
    pub period_tag_key: String,

    /// Items requested per paginated API call (0 uses the API default)
    #[arg(long, env = "THERMITE_PAGE_SIZE", default_value_t = 0)]
    pub page_size: u32,

    /// Prune even when no images are excluded
    #[arg(long, env = "THERMITE_ALLOW_ZERO_EXCLUSIONS", default_value_t = false)]
    pub allow_zero_exclusions: bool,

    /// Prune only this repository
    #[arg(long, env = "THERMITE_REPO")]
    pub repo: Option<String>,

    /// Do not survey the cluster for deployed images
    #[arg(long, env = "THERMITE_SKIP_CENSUS", default_value_t = false)]
    pub skip_census: bool,

    /// Output format for pruned image references
    #[arg(long, env = "THERMITE_FORMAT", value_enum, default_value_t = Format::Text)]
    pub format: Format,

    /// Verbose output
    #[arg(short, long, env = "THERMITE_VERBOSE", default_value_t = false)]
    pub verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}
