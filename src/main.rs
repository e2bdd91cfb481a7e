mod census;
mod cli;
mod cluster;
mod error;
mod metrics;
mod models;
mod output;
mod prune;
mod registry;
mod strategy;
#[cfg(test)]
mod testing;
mod thermite;

use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use census::{Surveyor, SurveyorConfig};
use cli::Cli;
use cluster::KubeCluster;
use output::{print_pruned, print_summary};
use prune::{PruneConfig, Pruner};
use registry::EcrRegistry;
use thermite::{Scope, Thermite};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "thermite=debug" } else { "thermite=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    metrics::register_metrics();

    let surveyor = if cli.skip_census {
        None
    } else {
        let cluster = KubeCluster::try_default()
            .await
            .context("error creating Kubernetes client")?;
        Some(Surveyor::new(
            Arc::new(cluster),
            SurveyorConfig {
                page_size: cli.page_size,
                ..Default::default()
            },
        ))
    };

    let registry = EcrRegistry::from_env().await;
    let pruner = Pruner::new(
        Arc::new(registry),
        PruneConfig {
            period_tag_key: cli.period_tag_key.clone(),
            page_size: cli.page_size,
            remove_images: cli.remove_images,
            allow_zero_exclusions: cli.allow_zero_exclusions,
        },
    );

    let scope = match cli.repo.clone() {
        Some(name) => Scope::Repository(name),
        None => Scope::AllRepositories,
    };
    let thermite = Thermite::new(surveyor, pruner, scope);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling in-flight calls");
            on_interrupt.cancel();
        }
    });

    let dry_run = !cli.remove_images;
    match thermite.run(Utc::now(), &cancel).await {
        Ok(report) => {
            print_pruned(&report, cli.format)?;
            print_summary(&report, dry_run, false);
            Ok(())
        }
        Err(err) => {
            // Everything pruned before the failure is still reported
            let report = err.report();
            if let Err(print_err) = print_pruned(&report, cli.format) {
                tracing::error!(error = %print_err, "error printing pruned images");
            }
            print_summary(&report, dry_run, true);
            Err(err).context("error running thermite")
        }
    }
}
