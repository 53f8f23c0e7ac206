//! Row types for the `check_ins` and `profiles` tables.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use checkin_weather::WeatherSnapshot;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ServiceError;

/// Longest accepted `notes` value, in characters.
pub const MAX_NOTES_CHARS: usize = 200;

/// Display name used when a user has no profile row.
pub const ANONYMOUS: &str = "Anonymous";

/// A stored daily check-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckIn {
    pub id: Uuid,
    pub user_id: Uuid,
    pub weather_condition: String,
    /// Degrees Celsius
    pub temperature: f64,
    pub location: String,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub check_in_date: NaiveDate,
    /// Resolved from `profiles`; not a column of `check_ins`.
    #[serde(default, skip_serializing)]
    pub display_name: Option<String>,
}

impl CheckIn {
    /// Attach a resolved display name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Display name, or "Anonymous" when unresolved
    pub fn display_name_or_anonymous(&self) -> &str {
        self.display_name.as_deref().unwrap_or(ANONYMOUS)
    }
}

/// A row of the `profiles` table (only the columns this client reads).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub display_name: Option<String>,
}

/// How the user feels today. Stored as its emoji label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Happy,
    Calm,
    Neutral,
    Tired,
    Sad,
    Excited,
}

impl Mood {
    pub const ALL: [Mood; 6] = [
        Mood::Happy,
        Mood::Calm,
        Mood::Neutral,
        Mood::Tired,
        Mood::Sad,
        Mood::Excited,
    ];

    /// Emoji label written to the `mood` column
    pub fn label(&self) -> &'static str {
        match self {
            Mood::Happy => "😊 Happy",
            Mood::Calm => "😌 Calm",
            Mood::Neutral => "😐 Neutral",
            Mood::Tired => "😴 Tired",
            Mood::Sad => "😔 Sad",
            Mood::Excited => "🤩 Excited",
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Calm => "calm",
            Mood::Neutral => "neutral",
            Mood::Tired => "tired",
            Mood::Sad => "sad",
            Mood::Excited => "excited",
        }
    }
}

impl FromStr for Mood {
    type Err = ServiceError;

    /// Accepts the bare name ("happy") or the full label ("😊 Happy").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Mood::ALL
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(wanted) || m.label() == wanted)
            .ok_or_else(|| ServiceError::Validation(format!("Unknown mood: {}", wanted)))
    }
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Fields the user fills in for a new check-in.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCheckIn {
    pub weather_condition: String,
    pub temperature: f64,
    pub location: String,
    pub mood: Option<Mood>,
    pub notes: Option<String>,
}

impl NewCheckIn {
    /// Start a check-in from the weather currently shown
    pub fn from_weather(weather: &WeatherSnapshot) -> Self {
        Self {
            weather_condition: weather.condition.clone(),
            temperature: weather.temperature,
            location: weather.location.clone(),
            mood: None,
            notes: None,
        }
    }

    pub fn with_mood(mut self, mood: Option<Mood>) -> Self {
        self.mood = mood;
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    /// Check input limits before anything is sent. Notes are measured as
    /// they will be stored, without surrounding whitespace.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if let Some(notes) = &self.notes {
            let len = notes.trim().chars().count();
            if len > MAX_NOTES_CHARS {
                return Err(ServiceError::Validation(format!(
                    "Notes must be {} characters or fewer (got {})",
                    MAX_NOTES_CHARS, len
                )));
            }
        }
        if self.location.trim().is_empty() {
            return Err(ServiceError::Validation("Location is required".to_string()));
        }
        Ok(())
    }

    /// Validate and stamp with the caller's identity.
    ///
    /// Blank notes are dropped rather than stored as empty strings.
    pub fn into_insert(self, user_id: Uuid) -> Result<CheckInInsert, ServiceError> {
        self.validate()?;
        let notes = self
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        Ok(CheckInInsert {
            user_id,
            weather_condition: self.weather_condition,
            temperature: self.temperature,
            location: self.location,
            mood: self.mood.map(|m| m.label().to_string()),
            notes,
        })
    }
}

/// Wire shape of an insert into `check_ins`.
///
/// `id`, `created_at` and `check_in_date` are filled in by the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckInInsert {
    pub user_id: Uuid,
    pub weather_condition: String,
    pub temperature: f64,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}
