use anyhow::Result;
use clap::{Parser, Subcommand};
use shared::{EventStatus, Platform};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod commands;
mod config;
mod error;
mod gateway;
mod history;
mod images;
mod store;
mod workflow;

use commands::{Console, CreateArgs};
use history::{DateRange, HistoryFilter, HISTORY_LIMIT};

#[derive(Parser)]
#[command(name = "samvedana")]
#[command(about = "Samvedana Foundation admin console - create events, edit AI drafts and publish them")]
#[command(version = env!("SAMVEDANA_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with an administrator account
    Login {
        /// Mobile number (prompted when omitted)
        #[arg(long)]
        mobile: Option<String>,
        /// Password (prompted when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the saved session
    Logout,
    /// Show the signed-in account
    Whoami,
    /// Summary of the most recent events
    Dashboard,
    /// List past events
    History {
        #[arg(long)]
        status: Option<EventStatus>,
        #[arg(long, value_enum, default_value_t = DateRange::All)]
        range: DateRange,
        /// Case-insensitive title search
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = HISTORY_LIMIT)]
        limit: u32,
    },
    /// Create an event and generate its drafts
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        /// YYYY-MM-DD, YYYY-MM-DDTHH:MM or RFC 3339
        #[arg(long)]
        date: String,
        /// Image file (repeatable)
        #[arg(long = "image", required = true)]
        images: Vec<PathBuf>,
    },
    /// View, edit and publish drafts
    Drafts {
        #[command(subcommand)]
        action: DraftsAction,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum DraftsAction {
    /// Show an event's drafts (local cache first, then the service)
    Show { event_id: String },
    /// List events with locally cached drafts
    List,
    /// Change draft fields
    Edit {
        event_id: String,
        /// platform.field=value, e.g. twitter.hashtags="#run #5k" (repeatable)
        #[arg(long = "set", required = true)]
        assignments: Vec<String>,
        /// Apply the edits without saving them to the local cache
        #[arg(long)]
        no_save: bool,
    },
    /// Discard cached drafts and reload from the service
    Revert { event_id: String },
    /// Publish the drafts of the selected platforms
    Publish {
        event_id: String,
        /// Platform to publish to (repeatable, defaults to every available platform)
        #[arg(long = "platform")]
        platforms: Vec<Platform>,
        /// Do not wait for Enter after a successful publish
        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Set a configuration value
    Set {
        /// Configuration key, e.g. api.base_url
        key: String,
        /// Configuration value
        value: String,
    },
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },
    /// Show all configuration
    Show,
    /// Get the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "samvedana=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { action } => handle_config_command(action),
        command => run(command, &Console::load()?).await,
    }
}

async fn run(command: Commands, console: &Console) -> Result<()> {
    match command {
        Commands::Login { mobile, password } => commands::login(console, mobile, password).await,
        Commands::Logout => commands::logout(console),
        Commands::Whoami => commands::whoami(console),
        Commands::Dashboard => commands::dashboard(console).await,
        Commands::History {
            status,
            range,
            search,
            limit,
        } => {
            let filter = HistoryFilter {
                status,
                range,
                search,
                limit,
            };
            commands::show_history(console, filter).await
        }
        Commands::Create {
            title,
            description,
            date,
            images,
        } => {
            let args = CreateArgs {
                title,
                description,
                date_time: date,
                images,
            };
            commands::create(console, args).await
        }
        Commands::Drafts { action } => match action {
            DraftsAction::Show { event_id } => commands::show_drafts(console, &event_id).await,
            DraftsAction::List => commands::list_drafts(console),
            DraftsAction::Edit {
                event_id,
                assignments,
                no_save,
            } => commands::edit_drafts(console, &event_id, &assignments, !no_save).await,
            DraftsAction::Revert { event_id } => commands::revert_drafts(console, &event_id).await,
            DraftsAction::Publish {
                event_id,
                platforms,
                yes,
            } => commands::publish_drafts(console, &event_id, &platforms, yes).await,
        },
        Commands::Config { action } => handle_config_command(action),
    }
}

fn handle_config_command(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            let mut config = config::Config::load().unwrap_or_default();
            config.set_value(&key, &value)?;
            config.save()?;
            println!("Configuration saved");
        }
        ConfigAction::Get { key } => {
            let config = config::Config::load()?;
            println!("{}", config.get_value(&key)?);
        }
        ConfigAction::Show => {
            let config = config::Config::load()?;
            for key in config::KEYS {
                println!("{}: {}", key, config.get_value(key)?);
            }
        }
        ConfigAction::Path => {
            let path = config::Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
