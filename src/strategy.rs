use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::error::PruneError;
use crate::models::{ImageDetail, Repository, RepositoryTag};

/// Default repository tag key holding the prune period in days
pub const DEFAULT_PERIOD_TAG_KEY: &str = "thermite:prune-period";

/// Find the prune period (days) among a repository's tags.
///
/// Values that are missing, not a base-10 integer, or zero are ignored; the
/// last valid value wins.
pub fn prune_period(tags: &[RepositoryTag], key: &str, arn: &str) -> Option<u32> {
    let mut period = None;
    for tag in tags {
        if tag.key.as_deref() != Some(key) {
            continue;
        }
        let Some(value) = tag.value.as_deref() else {
            warn!(key, arn, "prune period tag has no value");
            continue;
        };
        match parse_period(value) {
            Some(0) => warn!(arn, "prune period is zero"),
            Some(days) => period = Some(days),
            None => warn!(
                value,
                arn, "prune period tag value is not parseable as an unsigned integer"
            ),
        }
    }
    period
}

fn parse_period(value: &str) -> Option<u32> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Instant before which an image becomes eligible, `until - period days`.
///
/// A period reaching past the earliest representable time yields that time,
/// so every image survives.
pub fn cutoff(until: DateTime<Utc>, period_days: u32) -> DateTime<Utc> {
    Duration::try_days(i64::from(period_days))
        .and_then(|period| until.checked_sub_signed(period))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Image references that must never be pruned
#[derive(Debug, Default)]
pub struct Whitelist(HashSet<String>);

impl Whitelist {
    pub fn new<I, S>(refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(refs.into_iter().map(Into::into).collect())
    }

    pub fn insert(&mut self, image_ref: String) {
        self.0.insert(image_ref);
    }

    pub fn is_excluded(&self, image_ref: &str) -> bool {
        self.0.contains(image_ref)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// The image with the latest push time. Ties keep the first seen.
pub fn most_recent(details: &[ImageDetail]) -> Option<&ImageDetail> {
    let mut latest: Option<(&ImageDetail, DateTime<Utc>)> = None;
    for detail in details {
        let Some(pushed_at) = detail.pushed_at else {
            continue;
        };
        match latest {
            Some((_, latest_at)) if pushed_at <= latest_at => {}
            _ => latest = Some((detail, pushed_at)),
        }
    }
    latest.map(|(detail, _)| detail)
}

/// Add every tag of the most recently pushed image to the whitelist
pub fn protect_most_recent(
    repo: &Repository,
    details: &[ImageDetail],
    whitelist: &mut Whitelist,
) -> Result<(), PruneError> {
    let Some(latest) = most_recent(details) else {
        return Ok(());
    };
    for tag in &latest.tags {
        let tag = tag
            .as_deref()
            .ok_or_else(|| PruneError::MissingImageTag(repo.uri.clone()))?;
        whitelist.insert(repo.image_ref(tag));
    }
    Ok(())
}

/// Result of classifying a repository's images
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PrunePlan {
    /// Tags to remove
    pub eligible: Vec<String>,
    /// Images pushed at or after the cutoff
    pub survivors: usize,
    /// Images kept because one of their tags is whitelisted
    pub protected: usize,
}

/// Classify images against the cutoff and whitelist.
///
/// An image pushed at or after `cutoff` survives. Otherwise each tag is eligible,
/// unless any tag of the image is whitelisted, which keeps the whole image.
/// Tags listed before the whitelisted one are kept as well.
pub fn plan(
    repo: &Repository,
    details: &[ImageDetail],
    cutoff: DateTime<Utc>,
    whitelist: &Whitelist,
) -> Result<PrunePlan, PruneError> {
    let mut plan = PrunePlan::default();

    'images: for detail in details {
        let pushed_at = detail
            .pushed_at
            .ok_or_else(|| PruneError::MissingPushedAt(repo.uri.clone()))?;
        if pushed_at >= cutoff {
            plan.survivors += 1;
            continue;
        }

        let mut tags = Vec::with_capacity(detail.tags.len());
        for tag in &detail.tags {
            let tag = tag
                .as_deref()
                .ok_or_else(|| PruneError::MissingImageTag(repo.uri.clone()))?;
            if whitelist.is_excluded(&repo.image_ref(tag)) {
                plan.protected += 1;
                continue 'images;
            }
            tags.push(tag.to_string());
        }
        for tag in &tags {
            debug!(image = %repo.image_ref(tag), "image is prunable");
        }
        plan.eligible.extend(tags);
    }

    Ok(plan)
}
