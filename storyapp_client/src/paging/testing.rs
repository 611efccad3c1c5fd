use crate::database::models::StoryRecord;
use crate::database::Database;
use crate::remote::{RemoteError, StoryPageSource};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

fn feed_epoch() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

/// Story `i` of the fake feed; lower numbers are newer.
pub(crate) fn story(i: usize) -> StoryRecord {
    StoryRecord {
        id: i.to_string(),
        name: format!("Name {i}"),
        description: format!("Description {i}"),
        photo_url: format!("https://photos.test/{i}.jpg"),
        created_at: (feed_epoch() - chrono::Duration::minutes(i as i64))
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        lat: Some(i as f64),
        lon: Some(i as f64),
    }
}

pub(crate) fn memory_database() -> Database {
    let conn = Connection::open_in_memory().expect("in-memory db");
    let database = Database::from_connection(conn, true);
    database.ensure_migrations().expect("migrations");
    database
}

/// In-memory remote feed: `pages` full pages of `page_size` stories, then
/// empty pages.
pub(crate) struct FakeStorySource {
    pages: Mutex<HashMap<u32, Vec<StoryRecord>>>,
    calls: Mutex<Vec<u32>>,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeStorySource {
    pub(crate) fn new(pages: u32, page_size: usize) -> Self {
        let mut map = HashMap::new();
        for page in 1..=pages {
            let start = (page as usize - 1) * page_size;
            map.insert(page, (start..start + page_size).map(story).collect());
        }
        Self {
            pages: Mutex::new(map),
            calls: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            delay: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set_page(&self, page: u32, stories: Vec<StoryRecord>) {
        self.pages.lock().unwrap().insert(page, stories);
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    pub(crate) fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoryPageSource for FakeStorySource {
    async fn fetch_page(
        &self,
        _token: &str,
        page: u32,
        _page_size: u32,
    ) -> Result<Vec<StoryRecord>, RemoteError> {
        self.calls.lock().unwrap().push(page);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Status {
                status: 503,
                message: "service unavailable".into(),
            });
        }
        Ok(self
            .pages
            .lock()
            .unwrap()
            .get(&page)
            .cloned()
            .unwrap_or_default())
    }
}
