mod error;
mod source;
pub mod wire;

pub use error::RemoteError;
pub use source::StoryPageSource;

use crate::config::{sanitize_base_url, StoryAppConfig};
use crate::database::models::StoryRecord;
use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use wire::{
    DetailStoryResponse, ListStoryResponse, LoginRequest, LoginResult, LoginResponse,
    MessageResponse, NewStory, RegisterRequest, StoryQuery,
};

/// HTTP client for the story service. Calls never retry; the caller decides.
#[derive(Clone)]
pub struct StoryApiClient {
    base_url: String,
    client: Client,
}

impl StoryApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = sanitize_base_url(base_url.into())?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { base_url, client })
    }

    pub fn from_config(config: &StoryAppConfig) -> Result<Self> {
        Self::new(config.api_base_url.clone(), config.http.timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<MessageResponse, RemoteError> {
        let response = self
            .client
            .post(self.url("register"))
            .json(request)
            .send()
            .await?;
        let body: MessageResponse = read_json(response).await?;
        ensure_accepted(body.error, &body.message)?;
        Ok(body)
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResult, RemoteError> {
        let response = self
            .client
            .post(self.url("login"))
            .json(request)
            .send()
            .await?;
        let body: LoginResponse = read_json(response).await?;
        ensure_accepted(body.error, &body.message)?;
        body.login_result
            .ok_or_else(|| RemoteError::Rejected("login response missing loginResult".into()))
    }

    pub async fn add_story(&self, token: &str, story: NewStory) -> Result<MessageResponse, RemoteError> {
        let photo = Part::bytes(story.photo)
            .file_name(story.file_name)
            .mime_str(&story.mime)?;
        let mut form = Form::new().text("description", story.description);
        if let Some(lat) = story.lat {
            form = form.text("lat", lat.to_string());
        }
        if let Some(lon) = story.lon {
            form = form.text("lon", lon.to_string());
        }
        let form = form.part("photo", photo);

        let response = self
            .client
            .post(self.url("stories"))
            .header(reqwest::header::AUTHORIZATION, bearer(token))
            .multipart(form)
            .send()
            .await?;
        let body: MessageResponse = read_json(response).await?;
        ensure_accepted(body.error, &body.message)?;
        Ok(body)
    }

    pub async fn list_stories(
        &self,
        token: &str,
        query: StoryQuery,
    ) -> Result<ListStoryResponse, RemoteError> {
        let response = self
            .client
            .get(self.url("stories"))
            .header(reqwest::header::AUTHORIZATION, bearer(token))
            .query(&query.to_pairs())
            .send()
            .await?;
        let body: ListStoryResponse = read_json(response).await?;
        if body.error.unwrap_or(false) {
            return Err(RemoteError::Rejected(
                body.message.unwrap_or_else(|| "story listing rejected".into()),
            ));
        }
        Ok(body)
    }

    pub async fn get_story(&self, token: &str, story_id: &str) -> Result<StoryRecord, RemoteError> {
        let response = self
            .client
            .get(self.url(&format!("stories/{story_id}")))
            .header(reqwest::header::AUTHORIZATION, bearer(token))
            .send()
            .await?;
        let body: DetailStoryResponse = read_json(response).await?;
        match body.story {
            Some(story) if !body.error.unwrap_or(false) => Ok(story.into()),
            _ => Err(RemoteError::Rejected(
                body.message.unwrap_or_else(|| format!("story {story_id} not found")),
            )),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn bearer(token: &str) -> String {
    if token.starts_with("Bearer ") {
        token.to_string()
    } else {
        format!("Bearer {token}")
    }
}

fn ensure_accepted(error: bool, message: &str) -> Result<(), RemoteError> {
    if error {
        return Err(RemoteError::Rejected(message.to_string()));
    }
    Ok(())
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let raw = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<MessageResponse>(&raw)
        .ok()
        .map(|body| body.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        });
    if status == StatusCode::UNAUTHORIZED {
        return Err(RemoteError::Unauthorized(message));
    }
    Err(RemoteError::Status {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_prefix_is_added_once() {
        assert_eq!(bearer("abc"), "Bearer abc");
        assert_eq!(bearer("Bearer abc"), "Bearer abc");
    }

    #[test]
    fn urls_join_without_double_slashes() {
        let client = StoryApiClient::new("story-api.test/v1/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://story-api.test/v1");
        assert_eq!(client.url("/stories"), "http://story-api.test/v1/stories");
    }
}
