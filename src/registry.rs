use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ecr::primitives::DateTime as EcrDateTime;
use aws_sdk_ecr::types::ImageIdentifier;
use aws_sdk_ecr::Client;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::ApiError;
use crate::models::{
    BatchDeleteOutput, ImageDetail, ImageFailure, ImageId, Page, Repository, RepositoryTag,
};

/// Registry operations the prune engine depends on
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// DescribeRepositories, optionally restricted to `names`
    async fn describe_repositories(
        &self,
        names: &[String],
        max_results: Option<i32>,
        next_token: Option<&str>,
    ) -> Result<Page<Repository>, ApiError>;

    /// ListTagsForResource on a repository ARN
    async fn list_tags(&self, arn: &str) -> Result<Vec<RepositoryTag>, ApiError>;

    /// DescribeImages for one repository
    async fn describe_images(
        &self,
        repository: &str,
        max_results: Option<i32>,
        next_token: Option<&str>,
    ) -> Result<Page<ImageDetail>, ApiError>;

    /// BatchDeleteImage. At most 100 ids per call.
    async fn batch_delete_image(
        &self,
        repository: &str,
        ids: &[ImageId],
    ) -> Result<BatchDeleteOutput, ApiError>;
}

#[derive(Error, Debug)]
#[error("registry returned a repository without a {0}")]
struct MissingField(&'static str);

/// RegistryApi backed by Amazon Elastic Container Registry
pub struct EcrRegistry {
    client: Client,
}

impl EcrRegistry {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the shared AWS environment configuration
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::new(Client::new(&config))
    }
}

#[async_trait]
impl RegistryApi for EcrRegistry {
    async fn describe_repositories(
        &self,
        names: &[String],
        max_results: Option<i32>,
        next_token: Option<&str>,
    ) -> Result<Page<Repository>, ApiError> {
        let output = self
            .client
            .describe_repositories()
            .set_repository_names((!names.is_empty()).then(|| names.to_vec()))
            .set_max_results(max_results)
            .set_next_token(next_token.map(String::from))
            .send()
            .await
            .map_err(aws_sdk_ecr::Error::from)?;

        let items = output
            .repositories()
            .iter()
            .map(|repo| {
                Ok(Repository {
                    name: repo
                        .repository_name()
                        .ok_or(MissingField("name"))?
                        .to_string(),
                    arn: repo.repository_arn().ok_or(MissingField("ARN"))?.to_string(),
                    uri: repo.repository_uri().ok_or(MissingField("URI"))?.to_string(),
                })
            })
            .collect::<Result<Vec<_>, MissingField>>()?;

        Ok(Page {
            items,
            next_token: output.next_token().map(String::from),
        })
    }

    async fn list_tags(&self, arn: &str) -> Result<Vec<RepositoryTag>, ApiError> {
        let output = self
            .client
            .list_tags_for_resource()
            .resource_arn(arn)
            .send()
            .await
            .map_err(aws_sdk_ecr::Error::from)?;

        Ok(output
            .tags()
            .iter()
            .map(|tag| RepositoryTag {
                key: Some(tag.key().to_string()),
                value: Some(tag.value().to_string()),
            })
            .collect())
    }

    async fn describe_images(
        &self,
        repository: &str,
        max_results: Option<i32>,
        next_token: Option<&str>,
    ) -> Result<Page<ImageDetail>, ApiError> {
        let output = self
            .client
            .describe_images()
            .repository_name(repository)
            .set_max_results(max_results)
            .set_next_token(next_token.map(String::from))
            .send()
            .await
            .map_err(aws_sdk_ecr::Error::from)?;

        let items = output
            .image_details()
            .iter()
            .map(|detail| ImageDetail {
                pushed_at: detail.image_pushed_at().and_then(to_chrono),
                tags: detail
                    .image_tags()
                    .iter()
                    .map(|tag| Some(tag.clone()))
                    .collect(),
            })
            .collect();

        Ok(Page {
            items,
            next_token: output.next_token().map(String::from),
        })
    }

    async fn batch_delete_image(
        &self,
        repository: &str,
        ids: &[ImageId],
    ) -> Result<BatchDeleteOutput, ApiError> {
        let image_ids = ids
            .iter()
            .map(|id| ImageIdentifier::builder().set_image_tag(id.tag.clone()).build())
            .collect();

        let output = self
            .client
            .batch_delete_image()
            .repository_name(repository)
            .set_image_ids(Some(image_ids))
            .send()
            .await
            .map_err(aws_sdk_ecr::Error::from)?;

        Ok(BatchDeleteOutput {
            deleted: output
                .image_ids()
                .iter()
                .map(|id| ImageId {
                    tag: id.image_tag().map(String::from),
                })
                .collect(),
            failures: output
                .failures()
                .iter()
                .map(|failure| ImageFailure {
                    id: ImageId {
                        tag: failure
                            .image_id()
                            .and_then(|id| id.image_tag())
                            .map(String::from),
                    },
                    code: failure.failure_code().map(|code| code.as_str().to_string()),
                    reason: failure.failure_reason().map(String::from),
                })
                .collect(),
        })
    }
}

fn to_chrono(time: &EcrDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(time.secs(), time.subsec_nanos())
}
