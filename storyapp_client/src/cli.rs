use crate::database::models::StoryRecord;
use crate::paging::{LoadState, PagingSnapshot};
use crate::preferences::Theme;
use crate::stories::{StoryService, StoryUpload};
use crate::utils::format_time_ago;
use anyhow::{bail, Result};
use chrono::Utc;
use std::path::Path;

/// Terminal front end over [`StoryService`]. Each method handles one
/// subcommand and prints its result to stdout.
pub struct CliSession {
    service: StoryService,
}

impl CliSession {
    pub fn new(service: StoryService) -> Self {
        Self { service }
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<()> {
        let message = self.service.register(name, email, password).await?;
        println!("{message}");
        Ok(())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        let session = self.service.login(email, password).await?;
        println!("Logged in as {} <{}>", session.name, session.email);
        Ok(())
    }

    pub fn logout(&self) -> Result<()> {
        self.service.logout()?;
        println!("Logged out");
        Ok(())
    }

    pub fn whoami(&self) -> Result<()> {
        let prefs = self.service.preferences();
        match self.service.current_session()? {
            Some(session) => println!("{} <{}>", session.name, session.email),
            None => println!("Not logged in"),
        }
        println!("theme: {}  language: {}", prefs.theme()?, prefs.language()?);
        Ok(())
    }

    /// Shows the cached feed, refreshes it, then scrolls through `pages`
    /// pages so older stories are fetched as the reader nears the end.
    pub async fn feed(&self, pages: usize) -> Result<()> {
        let pager = self.service.pager()?;
        let mut snapshot = pager.start().await?;
        report_errors(&snapshot);

        for _ in 1..pages.max(1) {
            if snapshot.load_states.append.is_end_of_pagination() {
                break;
            }
            let Some(last) = snapshot.total().checked_sub(1) else {
                break;
            };
            snapshot = pager.scroll_to(last).await?;
            if report_errors(&snapshot) {
                break;
            }
        }

        print_stories(&snapshot.stories, snapshot.items_before);
        if snapshot.load_states.append.is_end_of_pagination() {
            println!("-- end of feed --");
        }
        Ok(())
    }

    pub async fn refresh(&self) -> Result<()> {
        let pager = self.service.pager()?;
        let snapshot = pager.refresh().await?;
        if report_errors(&snapshot) {
            bail!("refresh failed");
        }
        println!("Feed refreshed: {} stories cached", snapshot.total());
        Ok(())
    }

    pub async fn upload(&self, photo: &Path, upload: StoryUpload) -> Result<()> {
        let message = self.service.add_story(photo, upload).await?;
        println!("{message}");
        Ok(())
    }

    pub async fn map(&self) -> Result<()> {
        let stories = self.service.stories_with_location().await?;
        if stories.is_empty() {
            println!("No stories with a location");
            return Ok(());
        }
        for story in stories {
            if let (Some(lat), Some(lon)) = (story.lat, story.lon) {
                println!("{lat:>10.5} {lon:>11.5}  {}  {}", story.id, story.name);
            }
        }
        Ok(())
    }

    pub fn widget(&self, limit: usize) -> Result<()> {
        let stories = self.service.widget_stories(limit)?;
        if stories.is_empty() {
            println!("No cached stories yet; run `feed` first");
            return Ok(());
        }
        print_stories(&stories, 0);
        Ok(())
    }

    pub async fn story(&self, story_id: &str) -> Result<()> {
        let story = self.service.story_detail(story_id).await?;
        println!("{} ({})", story.name, format_time_ago(&story.created_at, Utc::now()));
        println!("{}", story.description);
        println!("photo: {}", story.photo_url);
        if let (Some(lat), Some(lon)) = (story.lat, story.lon) {
            println!("location: {lat}, {lon}");
        }
        Ok(())
    }

    pub fn theme(&self, theme: Theme) -> Result<()> {
        self.service.preferences().set_theme(theme)?;
        println!("Theme set to {theme}");
        Ok(())
    }

    pub fn language(&self, code: &str) -> Result<()> {
        self.service.preferences().set_language(code)?;
        println!("Language set to {code}");
        Ok(())
    }
}

fn print_stories(stories: &[StoryRecord], first_position: usize) {
    let now = Utc::now();
    for (offset, story) in stories.iter().enumerate() {
        println!(
            "{:>4}. {} - {} [{}]",
            first_position + offset + 1,
            story.name,
            story.description,
            format_time_ago(&story.created_at, now)
        );
    }
}

/// Prints any failed load direction; returns whether one was found.
fn report_errors(snapshot: &PagingSnapshot) -> bool {
    let states = &snapshot.load_states;
    let mut failed = false;
    for (label, state) in [
        ("refresh", &states.refresh),
        ("older stories", &states.append),
        ("newer stories", &states.prepend),
    ] {
        if let LoadState::Error(err) = state {
            eprintln!("Could not load {label}: {err}");
            failed = true;
        }
    }
    failed
}
