use serde::{Deserialize, Serialize};

/// Weather condition categories used by the mocked table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Sunny,
    PartlyCloudy,
    Cloudy,
    Rainy,
    Stormy,
    Snowy,
    Foggy,
}

impl WeatherCondition {
    /// Parse a stored condition label ("Sunny", "partly cloudy", ...).
    ///
    /// Matching ignores case and surrounding whitespace; unknown labels yield `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "sunny" | "clear" => Some(Self::Sunny),
            "partly cloudy" | "partly_cloudy" => Some(Self::PartlyCloudy),
            "cloudy" | "overcast" => Some(Self::Cloudy),
            "rainy" | "rain" => Some(Self::Rainy),
            "stormy" | "thunderstorm" => Some(Self::Stormy),
            "snowy" | "snow" => Some(Self::Snowy),
            "foggy" | "fog" => Some(Self::Foggy),
            _ => None,
        }
    }

    /// Get a human-readable description (also the label stored with check-ins)
    pub fn description(&self) -> &'static str {
        match self {
            Self::Sunny => "Sunny",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Rainy => "Rainy",
            Self::Stormy => "Stormy",
            Self::Snowy => "Snowy",
            Self::Foggy => "Foggy",
        }
    }

    /// Get icon name
    pub fn icon_name(&self) -> &'static str {
        match self {
            Self::Sunny => "sun",
            Self::PartlyCloudy => "cloud_sun",
            Self::Cloudy => "cloud",
            Self::Rainy => "cloud_rain",
            Self::Stormy => "cloud_lightning",
            Self::Snowy => "cloud_snow",
            Self::Foggy => "cloud_fog",
        }
    }

    /// Icon for a free-text condition label; unknown labels show the sun.
    pub fn icon_for_label(label: &str) -> &'static str {
        Self::from_label(label).unwrap_or_default().icon_name()
    }
}

/// Weather at a location at a point in time. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Degrees Celsius
    pub temperature: f64,
    pub condition: String,
    /// Relative humidity, percent
    pub humidity: u8,
    pub location: String,
}

impl WeatherSnapshot {
    /// Parsed condition, if the label is one we recognise
    pub fn condition_kind(&self) -> Option<WeatherCondition> {
        WeatherCondition::from_label(&self.condition)
    }
}
