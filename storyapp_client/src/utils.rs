//! Small formatting helpers shared by the CLI.

use chrono::{DateTime, Utc};

pub const APP_NAME: &str = "storyapp_client";

/// Renders a story timestamp relative to `now`, falling back to the raw
/// string when it is not RFC 3339.
pub fn format_time_ago(timestamp: &str, now: DateTime<Utc>) -> String {
    let Ok(created) = DateTime::parse_from_rfc3339(timestamp) else {
        return timestamp.to_string();
    };
    let created = created.with_timezone(&Utc);
    let elapsed = now.signed_duration_since(created);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();
    let plural = |n: i64| if n > 1 { "s" } else { "" };

    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{minutes} minute{} ago", plural(minutes))
    } else if hours < 24 {
        format!("{hours} hour{} ago", plural(hours))
    } else if days < 7 {
        format!("{days} day{} ago", plural(days))
    } else {
        created.format("%d %b %Y").to_string()
    }
}
