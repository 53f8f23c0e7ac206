use clap::{Parser, Subcommand};

use checkin_services::Mood;

#[derive(Parser, Debug)]
#[command(name = "checkin")]
#[command(about = "Daily weather check-in with a live feed of who else is checking in")]
#[command(version)]
pub struct Cli {
    /// Backend URL (overrides config and CHECKIN_BACKEND_URL)
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        /// Prompted for when not given
        #[arg(long, env = "CHECKIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Show the weather for a location
    Weather {
        /// Defaults to the configured location
        location: Option<String>,
    },
    /// List popular locations
    Locations,
    /// Record today's check-in
    CheckIn {
        #[arg(long)]
        location: Option<String>,
        /// happy, calm, neutral, tired, sad or excited
        #[arg(long)]
        mood: Option<Mood>,
        /// Up to 200 characters
        #[arg(long)]
        notes: Option<String>,
    },
    /// Show recent check-ins and who is online, updating live
    Feed {
        /// Announce yourself as online at this location
        #[arg(long)]
        location: Option<String>,
        /// Print the feed once and exit
        #[arg(long)]
        once: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_check_in() {
        let cli = Cli::parse_from([
            "checkin",
            "check-in",
            "--location",
            "Tokyo, Japan",
            "--mood",
            "calm",
            "--notes",
            "Cherry blossoms",
        ]);

        assert_eq!(
            cli.command,
            Commands::CheckIn {
                location: Some("Tokyo, Japan".to_string()),
                mood: Some(Mood::Calm),
                notes: Some("Cherry blossoms".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_rejects_unknown_mood() {
        assert!(Cli::try_parse_from(["checkin", "check-in", "--mood", "grumpy"]).is_err());
    }

    #[test]
    fn test_parse_feed_with_global_url() {
        let cli = Cli::parse_from(["checkin", "feed", "--once", "--backend-url", "http://localhost:9999"]);
        assert_eq!(cli.backend_url.as_deref(), Some("http://localhost:9999"));
        assert_eq!(cli.command, Commands::Feed { location: None, once: true });
    }
}
