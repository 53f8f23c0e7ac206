//! Command handlers. Each returns `AppError` so `main` can print a
//! user-facing message.

use chrono::Utc;
use checkin_core::{App, AppError};
use checkin_services::{Mood, NewCheckIn};
use checkin_sync::FeedUpdate;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::cli::Commands;
use crate::render;
use crate::services::{AppServices, Feed, FeedTransport};

pub async fn run(app: &App, command: Commands) -> Result<(), AppError> {
    let services = AppServices::new(app)?;

    match command {
        Commands::Login { email, password } => login(&services, &email, password).await,
        Commands::Logout => logout(&services).await,
        Commands::Whoami => whoami(&services).await,
        Commands::Weather { location } => {
            weather(&services, location);
            Ok(())
        }
        Commands::Locations => {
            locations();
            Ok(())
        }
        Commands::CheckIn {
            location,
            mood,
            notes,
        } => check_in(&services, location, mood, notes).await,
        Commands::Feed { location, once } => feed(&services, location, once).await,
    }
}

async fn login(services: &AppServices, email: &str, password: Option<String>) -> Result<(), AppError> {
    let password = match password {
        Some(p) => p,
        None => prompt("Password: ").await?,
    };

    let identity = services.sign_in(email, &password).await?;
    println!("Signed in as {}", identity.display_name());
    Ok(())
}

async fn prompt(label: &str) -> Result<String, AppError> {
    eprint!("{}", label);
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn logout(services: &AppServices) -> Result<(), AppError> {
    services.restore_session().await;
    services.sign_out().await?;
    println!("Signed out");
    Ok(())
}

async fn whoami(services: &AppServices) -> Result<(), AppError> {
    match services.restore_session().await {
        Some(identity) => {
            println!("{}", identity.display_name());
            if let Some(email) = &identity.email {
                println!("  Email: {}", email);
            }
            println!("  User ID: {}", identity.id);
        }
        None => println!("Not signed in. Run `checkin login --email <EMAIL>`."),
    }
    Ok(())
}

fn weather(services: &AppServices, location: Option<String>) {
    let location = location.unwrap_or_else(|| services.config().weather.default_location.clone());
    let snapshot = checkin_weather::lookup(&location);

    println!("{}", render::weather_card(&snapshot));
    if !checkin_weather::is_known_location(&location) {
        println!("  (no data for this location; showing typical conditions)");
    }
}

fn locations() {
    println!("Popular locations:");
    for name in checkin_weather::popular_locations() {
        let snapshot = checkin_weather::lookup(name);
        println!("  {:<16} {:>3}°  {}", name, snapshot.temperature, snapshot.condition);
    }
}

/// Connect realtime and build a detached feed
async fn open_feed(services: &AppServices) -> Feed {
    let transport = match services.connect_realtime().await {
        Ok(client) => FeedTransport::Live(client),
        Err(e) => {
            tracing::debug!("Realtime connect failed: {}", e);
            eprintln!("{}", e.user_message());
            FeedTransport::Offline
        }
    };

    services.live_feed(transport)
}

async fn check_in(
    services: &AppServices,
    location: Option<String>,
    mood: Option<Mood>,
    notes: Option<String>,
) -> Result<(), AppError> {
    let identity = services.require_identity().await?;
    let location = location.unwrap_or_else(|| services.config().weather.default_location.clone());
    let snapshot = checkin_weather::lookup(&location);

    let input = NewCheckIn::from_weather(&snapshot)
        .with_mood(mood)
        .with_notes(notes);
    let stored = services.check_in(&identity, input).await?;

    println!("Daily Check-in Complete! ✨");
    println!("{}", render::today_label(stored.check_in_date));
    println!("{}", render::weather_card(&snapshot));
    if let Some(mood) = &stored.mood {
        println!("  Mood: {}", mood);
    }
    Ok(())
}

async fn feed(services: &AppServices, location: Option<String>, once: bool) -> Result<(), AppError> {
    let identity = services.require_identity().await?;
    let feed = open_feed(services).await;
    let mut updates = feed.subscribe();
    feed.attach(identity);

    if let Some(location) = &location {
        feed.update_presence(location);
    }

    let follow = feed.follow(services.auth().subscribe());
    tokio::pin!(follow);

    println!("Weather Check-in · {}", render::today_label(Utc::now().date_naive()));
    loop {
        tokio::select! {
            _ = &mut follow => break,
            _ = tokio::signal::ctrl_c() => break,
            update = updates.recv() => match update {
                Ok(FeedUpdate::Cleared) if feed.identity().is_none() => {
                    println!("Signed out; live feed stopped.");
                    break;
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {
                    if feed.is_loading() {
                        continue;
                    }
                    println!("\n{}", render::feed(&feed.state(), Utc::now()));
                    if once {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    feed.detach();
    Ok(())
}
