use crate::database::models::StoryRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The `{error, message}` envelope every endpoint answers with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub message: String,
    pub login_result: Option<LoginResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub user_id: String,
    pub name: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStoryResponse {
    pub error: Option<bool>,
    pub message: Option<String>,
    #[serde(default)]
    pub list_story: Vec<StoryItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailStoryResponse {
    pub error: Option<bool>,
    pub message: Option<String>,
    pub story: Option<StoryItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryItem {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub photo_url: String,
    #[serde(default)]
    pub created_at: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl From<StoryItem> for StoryRecord {
    fn from(item: StoryItem) -> Self {
        Self {
            id: item.id,
            name: item.name,
            description: item.description,
            photo_url: item.photo_url,
            created_at: item.created_at,
            lat: item.lat,
            lon: item.lon,
        }
    }
}

impl From<StoryRecord> for StoryItem {
    fn from(record: StoryRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            description: record.description,
            photo_url: record.photo_url,
            created_at: record.created_at,
            lat: record.lat,
            lon: record.lon,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoryQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    /// `Some(true)` asks only for stories that carry coordinates.
    pub location: Option<bool>,
}

impl StoryQuery {
    pub fn page(page: u32, size: u32) -> Self {
        Self {
            page: Some(page),
            size: Some(size),
            location: None,
        }
    }

    pub(crate) fn to_pairs(self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(size) = self.size {
            pairs.push(("size", size.to_string()));
        }
        if let Some(location) = self.location {
            pairs.push(("location", if location { "1" } else { "0" }.to_string()));
        }
        pairs
    }
}

/// A story upload ready to be sent as multipart form data.
#[derive(Debug, Clone)]
pub struct NewStory {
    pub description: String,
    pub photo: Vec<u8>,
    pub file_name: String,
    pub mime: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}
