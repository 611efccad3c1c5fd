use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use storyapp_client::bootstrap;
use storyapp_client::cli::CliSession;
use storyapp_client::config::StoryAppConfig;
use storyapp_client::preferences::Theme;
use storyapp_client::stories::{StoryService, StoryUpload};
use storyapp_client::telemetry;

#[derive(Parser)]
#[command(author, version, about = "StoryApp command line client")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Log in and remember the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the stored session and settings
    Whoami,
    /// Show the story feed, fetching older pages as needed
    Feed {
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    /// Refetch the first page and replace the cached feed
    Refresh,
    /// Post a new story
    Upload {
        photo: PathBuf,
        #[arg(long)]
        description: String,
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,
    },
    /// List stories that carry a location
    Map,
    /// Newest cached stories, as shown by the home-screen widget
    Widget {
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Show a single story
    Story { id: String },
    /// Switch between light and dark theme
    Theme { theme: Theme },
    /// Set the display language
    Language { code: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let args = Args::parse();

    let config = StoryAppConfig::from_env()?;
    let resources = bootstrap::initialize(&config)?;
    tracing::info!(
        api = %config.api_base_url,
        database_initialized = resources.database_initialized,
        "bootstrap complete"
    );

    let service = StoryService::new(config, resources.database)?;
    let session = CliSession::new(service);

    match args.command.unwrap_or(Command::Feed { pages: 1 }) {
        Command::Register {
            name,
            email,
            password,
        } => session.register(&name, &email, &password).await,
        Command::Login { email, password } => session.login(&email, &password).await,
        Command::Logout => session.logout(),
        Command::Whoami => session.whoami(),
        Command::Feed { pages } => session.feed(pages).await,
        Command::Refresh => session.refresh().await,
        Command::Upload {
            photo,
            description,
            lat,
            lon,
        } => {
            let upload = StoryUpload {
                description,
                lat,
                lon,
            };
            session.upload(&photo, upload).await
        }
        Command::Map => session.map().await,
        Command::Widget { limit } => session.widget(limit),
        Command::Story { id } => session.story(&id).await,
        Command::Theme { theme } => session.theme(theme),
        Command::Language { code } => session.language(&code),
    }
}
