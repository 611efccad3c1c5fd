use super::wire::StoryQuery;
use super::{RemoteError, StoryApiClient};
use crate::database::models::StoryRecord;
use async_trait::async_trait;

/// One page of the remote story feed. Pages are numbered from 1.
#[async_trait]
pub trait StoryPageSource: Send + Sync {
    async fn fetch_page(
        &self,
        token: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<StoryRecord>, RemoteError>;
}

#[async_trait]
impl StoryPageSource for StoryApiClient {
    async fn fetch_page(
        &self,
        token: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<StoryRecord>, RemoteError> {
        tracing::debug!(page, page_size, "fetching remote story page");
        let response = self
            .list_stories(token, StoryQuery::page(page, page_size))
            .await?;
        Ok(response.list_story.into_iter().map(Into::into).collect())
    }
}
