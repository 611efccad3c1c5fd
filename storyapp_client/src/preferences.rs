use crate::database::repositories::SettingsRepository;
use crate::database::Database;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const LOGIN_KEY: &str = "login_key";
const TOKEN_KEY: &str = "token_key";
const NAME_KEY: &str = "name";
const EMAIL_KEY: &str = "email";
const THEME_KEY: &str = "theme_setting";
const LANGUAGE_KEY: &str = "language";

const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub name: String,
    pub email: String,
    pub token: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => f.write_str("light"),
            Theme::Dark => f.write_str("dark"),
        }
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => bail!("unknown theme {other:?}; expected light or dark"),
        }
    }
}

/// Login session and display settings, persisted in the `settings` table so
/// they survive cache schema resets.
#[derive(Clone)]
pub struct SessionPreferences {
    database: Database,
}

impl SessionPreferences {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn save_login_session(&self, name: &str, email: &str, token: &str) -> Result<()> {
        self.database.with_repositories(|repos| {
            let settings = repos.settings();
            settings.set(NAME_KEY, name)?;
            settings.set(EMAIL_KEY, email)?;
            settings.set(TOKEN_KEY, token)?;
            settings.set(LOGIN_KEY, "true")?;
            Ok(())
        })?;
        tracing::info!(email, "login session saved");
        Ok(())
    }

    pub fn clear_session(&self) -> Result<()> {
        self.database.with_repositories(|repos| {
            let settings = repos.settings();
            settings.set(LOGIN_KEY, "false")?;
            settings.delete(TOKEN_KEY)?;
            Ok(())
        })?;
        tracing::info!("login session cleared");
        Ok(())
    }

    pub fn is_logged_in(&self) -> Result<bool> {
        Ok(self.get(LOGIN_KEY)?.as_deref() == Some("true"))
    }

    /// The stored token, or an empty string when nobody is logged in.
    pub fn token(&self) -> Result<String> {
        Ok(self.get(TOKEN_KEY)?.unwrap_or_default())
    }

    pub fn session(&self) -> Result<Option<Session>> {
        if !self.is_logged_in()? {
            return Ok(None);
        }
        let token = self.token()?;
        if token.is_empty() {
            return Ok(None);
        }
        Ok(Some(Session {
            name: self.get(NAME_KEY)?.unwrap_or_default(),
            email: self.get(EMAIL_KEY)?.unwrap_or_default(),
            token,
        }))
    }

    pub fn theme(&self) -> Result<Theme> {
        match self.get(THEME_KEY)? {
            Some(raw) => raw.parse(),
            None => Ok(Theme::default()),
        }
    }

    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        self.set(THEME_KEY, &theme.to_string())
    }

    pub fn language(&self) -> Result<String> {
        Ok(self
            .get(LANGUAGE_KEY)?
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()))
    }

    pub fn set_language(&self, code: &str) -> Result<()> {
        let code = code.trim();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphabetic() || c == '-') {
            bail!("invalid language code {code:?}");
        }
        self.set(LANGUAGE_KEY, code)
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        self.database.with_repositories(|repos| repos.settings().get(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.database
            .with_repositories(|repos| repos.settings().set(key, value))
    }
}
