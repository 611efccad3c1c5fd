use crate::config::StoryAppConfig;
use crate::database::models::StoryRecord;
use crate::database::repositories::StoryRepository;
use crate::database::Database;
use crate::paging::{Pager, RemoteMediator};
use crate::preferences::{Session, SessionPreferences};
use crate::remote::wire::{LoginRequest, NewStory, RegisterRequest, StoryQuery};
use crate::remote::StoryApiClient;
use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;
use std::sync::Arc;

/// Stories fetched for the map view in one request.
const MAP_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct StoryUpload {
    pub description: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Account, upload and feed operations on top of the REST client, the local
/// cache and the stored session.
#[derive(Clone)]
pub struct StoryService {
    client: StoryApiClient,
    database: Database,
    preferences: SessionPreferences,
    config: StoryAppConfig,
}

impl StoryService {
    pub fn new(config: StoryAppConfig, database: Database) -> Result<Self> {
        let client = StoryApiClient::from_config(&config)?;
        Ok(Self::with_client(config, database, client))
    }

    pub fn with_client(config: StoryAppConfig, database: Database, client: StoryApiClient) -> Self {
        let preferences = SessionPreferences::new(database.clone());
        Self {
            client,
            database,
            preferences,
            config,
        }
    }

    pub fn preferences(&self) -> &SessionPreferences {
        &self.preferences
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<String> {
        let request = RegisterRequest {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let response = self
            .client
            .register(&request)
            .await
            .context("registration failed")?;
        tracing::info!(email = %request.email, "registered account");
        Ok(response.message)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let email = email.trim();
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let result = self.client.login(&request).await.context("login failed")?;
        self.preferences
            .save_login_session(&result.name, email, &result.token)?;
        Ok(Session {
            name: result.name,
            email: email.to_string(),
            token: result.token,
        })
    }

    pub fn logout(&self) -> Result<()> {
        self.preferences.clear_session()
    }

    pub fn current_session(&self) -> Result<Option<Session>> {
        self.preferences.session()
    }

    fn require_token(&self) -> Result<String> {
        self.preferences
            .session()?
            .map(|session| session.token)
            .ok_or_else(|| anyhow!("not logged in; run `login` first"))
    }

    pub async fn add_story(&self, photo: &Path, upload: StoryUpload) -> Result<String> {
        let token = self.require_token()?;
        if upload.description.trim().is_empty() {
            bail!("story description must not be empty");
        }
        if upload.lat.is_some() != upload.lon.is_some() {
            bail!("latitude and longitude must be given together");
        }

        let bytes = tokio::fs::read(photo)
            .await
            .with_context(|| format!("failed to read {}", photo.display()))?;
        let limit = self.config.http.max_upload_bytes;
        if bytes.len() as u64 > limit {
            bail!(
                "{} is {} bytes; uploads are limited to {limit} bytes",
                photo.display(),
                bytes.len()
            );
        }
        let mime = infer::get(&bytes)
            .map(|kind| kind.mime_type())
            .filter(|mime| mime.starts_with("image/"))
            .ok_or_else(|| anyhow!("{} is not a supported image", photo.display()))?;
        let file_name = photo
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo".to_string());

        let story = NewStory {
            description: upload.description,
            photo: bytes,
            file_name,
            mime: mime.to_string(),
            lat: upload.lat,
            lon: upload.lon,
        };
        let response = self
            .client
            .add_story(&token, story)
            .await
            .context("story upload failed")?;
        tracing::info!(photo = %photo.display(), mime, "story uploaded");
        Ok(response.message)
    }

    /// Stories that carry coordinates, straight from the server. The map view
    /// does not go through the feed cache.
    pub async fn stories_with_location(&self) -> Result<Vec<StoryRecord>> {
        let token = self.require_token()?;
        let query = StoryQuery {
            page: Some(1),
            size: Some(MAP_PAGE_SIZE),
            location: Some(true),
        };
        let response = self
            .client
            .list_stories(&token, query)
            .await
            .context("failed to load stories with location")?;
        Ok(response
            .list_story
            .into_iter()
            .map(StoryRecord::from)
            .filter(StoryRecord::has_location)
            .collect())
    }

    /// Cached copy when the feed already holds it, otherwise the server's.
    pub async fn story_detail(&self, story_id: &str) -> Result<StoryRecord> {
        let cached = self
            .database
            .with_repositories(|repos| repos.stories().get(story_id))?;
        if let Some(story) = cached {
            return Ok(story);
        }
        let token = self.require_token()?;
        self.client
            .get_story(&token, story_id)
            .await
            .with_context(|| format!("failed to load story {story_id}"))
    }

    /// Newest cached stories for the home-screen widget. Never touches the
    /// network.
    pub fn widget_stories(&self, limit: usize) -> Result<Vec<StoryRecord>> {
        self.database
            .with_repositories(|repos| repos.stories().list_recent(limit))
    }

    pub fn pager(&self) -> Result<Pager> {
        let token = self.require_token()?;
        let paging = self.config.paging;
        let mediator = RemoteMediator::new(
            self.database.clone(),
            Arc::new(self.client.clone()),
            token,
            paging.page_size,
        );
        Ok(Pager::new(paging, self.database.clone(), mediator))
    }
}
