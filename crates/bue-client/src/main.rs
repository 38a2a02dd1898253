mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use tracing::{info, warn};

use bue_db::EventStore;
use bue_sync::backend::rest::RestBackend;
use bue_sync::platform::{NetworkStatus, Session};
use bue_sync::{
    Observation, ProfileWriter, RefreshOutcome, RemoteEventGateway, SavedEventRelations,
    SyncCoordinator,
};
use bue_types::{Event, format_time_range, group_by_start_date, saved_by};

use config::Config;

#[derive(Parser)]
#[command(name = "bue")]
#[command(about = "Browse, cache and save campus events")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show cached events, then refresh them from the backend
    Sync,
    /// Show one event, refreshing it from the backend
    Show {
        /// Event id
        id: String,
    },
    /// Save an event for the signed-in user
    Save {
        /// Event id
        id: String,
    },
    /// Remove a saved event for the signed-in user
    Unsave {
        /// Event id
        id: String,
    },
    /// List the signed-in user's saved events by day, from the cache
    Calendar,
    /// Set one field of the signed-in user's profile
    Profile {
        /// Field name, e.g. firstName
        field: String,
        /// New value, stored as a string
        value: String,
    },
    /// Point the signed-in user's profile at an uploaded image
    ProfileImage {
        /// Download URL of the image
        url: String,
    },
    /// Drop every cached event
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bue_client=debug,bue_sync=debug,bue_db=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let store = EventStore::open(&config.db_path)
        .with_context(|| format!("opening event cache at {}", config.db_path.display()))?;

    match cli.command {
        Commands::Clear => {
            store.clear_all()?;
            info!("Event cache cleared");
        }
        Commands::Calendar => {
            let uid = config.uid.as_deref().context("BUE_UID is not set")?;
            print_calendar(&store.all_events()?, uid);
        }
        Commands::Sync => {
            let sync = coordinator(&config, store)?;
            let obs = sync.observe_events();
            follow(obs, |events| {
                println!("{} events", events.len());
                for event in events {
                    print_event(event);
                }
            })
            .await?;
        }
        Commands::Show { id } => {
            let sync = coordinator(&config, store)?;
            let obs = sync.observe_event(&id);
            follow(obs, |event| match event {
                Some(event) => print_event(event),
                None => println!("Event {} is not cached", id),
            })
            .await?;
        }
        Commands::Save { id } => {
            let ok = relations(&config)?.add_saved_event(&id).await;
            println!("{}", if ok { "Event saved" } else { "Failed to save event, please try again" });
        }
        Commands::Unsave { id } => {
            let ok = relations(&config)?.remove_saved_event(&id).await;
            println!("{}", if ok { "Event removed" } else { "Failed to remove event, please try again" });
        }
        Commands::Profile { field, value } => {
            profile(&config)?.update_field(&field, value.into()).await?;
            println!("Profile updated");
        }
        Commands::ProfileImage { url } => {
            profile(&config)?.set_profile_image_url(&url).await?;
            println!("Profile image updated");
        }
    }

    Ok(())
}

fn rest_backend(config: &Config) -> Result<Arc<RestBackend>> {
    let (url, bucket) = config.backend()?;
    let backend = RestBackend::new(url, bucket, config.auth_token.clone(), config.http_timeout)?;
    Ok(Arc::new(backend))
}

fn coordinator(config: &Config, store: EventStore) -> Result<SyncCoordinator> {
    let backend = rest_backend(config)?;
    Ok(SyncCoordinator::new(
        store,
        RemoteEventGateway::new(backend.clone(), backend),
        Arc::new(NetworkStatus::new(!config.offline)),
    ))
}

fn session(config: &Config) -> Session {
    match &config.uid {
        Some(uid) => Session::signed_in(uid.clone()),
        None => Session::default(),
    }
}

fn relations(config: &Config) -> Result<SavedEventRelations> {
    Ok(SavedEventRelations::new(
        rest_backend(config)?,
        Arc::new(session(config)),
        Arc::new(NetworkStatus::new(!config.offline)),
    ))
}

fn profile(config: &Config) -> Result<ProfileWriter> {
    Ok(ProfileWriter::new(
        rest_backend(config)?,
        Arc::new(session(config)),
        Arc::new(NetworkStatus::new(!config.offline)),
    ))
}

/// Prints the cached snapshot, waits for the refresh, and prints again if
/// the refresh changed the cache.
async fn follow<T, F>(mut obs: Observation<T>, show: F) -> Result<()>
where
    F: Fn(&T),
{
    if let Some(snapshot) = obs.next().await {
        show(&snapshot?);
    }

    match obs.wait_refresh().await {
        // An empty write never notifies the cache, so there is nothing to wait for.
        Some(RefreshOutcome::CacheWritten { count: 0 }) => info!("Remote has no events"),
        Some(RefreshOutcome::CacheWritten { count }) => {
            info!("Refreshed {} events", count);
            if let Some(snapshot) = obs.next().await {
                show(&snapshot?);
            }
        }
        Some(outcome) => warn!("Showing cached data ({:?})", outcome),
        None => {}
    }
    Ok(())
}

fn print_event(event: &Event) {
    let when = format_time_range(&event.start_time, &event.end_time)
        .unwrap_or_else(|_| format!("{} - {}", event.start_time, event.end_time));
    println!("[{}] {} | {} | {}", event.id, event.title, when, event.location);
}

fn print_calendar(events: &[Event], uid: &str) {
    let saved = saved_by(events, uid);
    if saved.is_empty() {
        println!("No saved events");
        return;
    }
    for (date, day) in group_by_start_date(&saved) {
        println!("{}", date.format("%A, %B %-d %Y"));
        for event in &day {
            print!("  ");
            print_event(event);
        }
    }
}
