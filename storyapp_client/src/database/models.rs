use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub photo_url: String,
    pub created_at: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl StoryRecord {
    pub fn has_location(&self) -> bool {
        self.lat.is_some() && self.lon.is_some()
    }
}

/// Page cursors for the remote page a cached story was fetched from.
/// `None` means there is no page in that direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteKeyRecord {
    pub story_id: String,
    pub prev_key: Option<u32>,
    pub next_key: Option<u32>,
}
