//! Static weather table.

use crate::types::{WeatherCondition, WeatherSnapshot};

struct Entry {
    name: &'static str,
    temperature: f64,
    condition: WeatherCondition,
    humidity: u8,
}

const fn entry(
    name: &'static str,
    temperature: f64,
    condition: WeatherCondition,
    humidity: u8,
) -> Entry {
    Entry {
        name,
        temperature,
        condition,
        humidity,
    }
}

const TABLE: &[Entry] = &[
    entry("San Francisco", 24.0, WeatherCondition::Sunny, 65),
    entry("Seattle", 18.0, WeatherCondition::Cloudy, 78),
    entry("Los Angeles", 28.0, WeatherCondition::Sunny, 45),
    entry("Lagos, Nigeria", 31.0, WeatherCondition::PartlyCloudy, 80),
    entry("Abuja, Nigeria", 29.0, WeatherCondition::Sunny, 55),
    entry("London, UK", 12.0, WeatherCondition::Rainy, 85),
    entry("New York, USA", 16.0, WeatherCondition::Cloudy, 60),
    entry("Tokyo, Japan", 20.0, WeatherCondition::PartlyCloudy, 70),
    entry("Dubai, UAE", 38.0, WeatherCondition::Sunny, 35),
];

const DEFAULT_TEMPERATURE: f64 = 22.0;
const DEFAULT_CONDITION: WeatherCondition = WeatherCondition::PartlyCloudy;
const DEFAULT_HUMIDITY: u8 = 60;

const POPULAR: [&str; 6] = [
    "Lagos, Nigeria",
    "Abuja, Nigeria",
    "London, UK",
    "New York, USA",
    "Tokyo, Japan",
    "Dubai, UAE",
];

impl Entry {
    fn snapshot(&self) -> WeatherSnapshot {
        WeatherSnapshot {
            temperature: self.temperature,
            condition: self.condition.description().to_string(),
            humidity: self.humidity,
            location: self.name.to_string(),
        }
    }
}

fn find(location: &str) -> Option<&'static Entry> {
    let wanted = location.trim();
    TABLE.iter().find(|e| e.name.eq_ignore_ascii_case(wanted))
}

/// Weather for a location.
///
/// Never fails: locations missing from the table get [`default_snapshot`]
/// with the requested name carried through unchanged.
pub fn lookup(location: &str) -> WeatherSnapshot {
    match find(location) {
        Some(entry) => entry.snapshot(),
        None => {
            tracing::debug!("No weather entry for {:?}, using default", location);
            default_snapshot(location)
        }
    }
}

/// The fallback snapshot for an arbitrary location name
pub fn default_snapshot(location: &str) -> WeatherSnapshot {
    WeatherSnapshot {
        temperature: DEFAULT_TEMPERATURE,
        condition: DEFAULT_CONDITION.description().to_string(),
        humidity: DEFAULT_HUMIDITY,
        location: location.to_string(),
    }
}

/// Whether `location` has its own table entry
pub fn is_known_location(location: &str) -> bool {
    find(location).is_some()
}

/// Quick-pick locations offered next to the search box
pub fn popular_locations() -> &'static [&'static str] {
    &POPULAR
}

/// Location shown before the user picks one
pub fn default_location() -> &'static str {
    TABLE[0].name
}
