//! Plain-text rendering of weather, check-ins and the live feed.

use chrono::{DateTime, NaiveDate, Utc};
use checkin_services::CheckIn;
use checkin_sync::{FeedState, UserPresence};
use checkin_weather::{WeatherCondition, WeatherSnapshot};

/// Online users listed by name before the rest are summarized
const ONLINE_SHOWN: usize = 5;

pub fn weather_card(weather: &WeatherSnapshot) -> String {
    let icon = WeatherCondition::icon_for_label(&weather.condition);

    format!(
        "{}\n  {}°  {} [{}]\n  Humidity: {}%",
        weather.location, weather.temperature, weather.condition, icon, weather.humidity
    )
}

/// e.g. "Monday, October 19, 2026"
pub fn today_label(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

/// Distance from `then` to `now` in words, with an "ago" suffix
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds().max(0);
    let minutes = (seconds + 30) / 60;
    let hours = (minutes + 30) / 60;
    let days = (hours + 12) / 24;

    match seconds {
        s if s < 30 => "less than a minute ago".to_string(),
        s if s < 90 => "1 minute ago".to_string(),
        _ if minutes < 45 => format!("{} minutes ago", minutes),
        _ if minutes < 90 => "about 1 hour ago".to_string(),
        _ if hours < 24 => format!("about {} hours ago", hours),
        _ if hours < 42 => "1 day ago".to_string(),
        _ if days < 30 => format!("{} days ago", days),
        _ if days < 365 => {
            let months = (days / 30).max(1);
            if months == 1 {
                "about 1 month ago".to_string()
            } else {
                format!("{} months ago", months)
            }
        }
        _ => {
            let years = days / 365;
            if years == 1 {
                "about 1 year ago".to_string()
            } else {
                format!("about {} years ago", years)
            }
        }
    }
}

/// Upper-cased first letter of a display name, "U" when empty
pub fn avatar_initial(name: &str) -> String {
    name.chars()
        .next()
        .map(|c| c.to_uppercase().collect::<String>())
        .unwrap_or_else(|| "U".to_string())
}

/// "3 users online: alice, bob, carol"; `None` when nobody else is online
pub fn online_summary(users: &[UserPresence]) -> Option<String> {
    if users.is_empty() {
        return None;
    }

    let count = users.len();
    let mut names: Vec<&str> = users
        .iter()
        .take(ONLINE_SHOWN)
        .map(|u| u.display_name.as_str())
        .collect();
    let more = count.saturating_sub(ONLINE_SHOWN);
    let more_label = format!("+{} more", more);
    if more > 0 {
        names.push(&more_label);
    }

    Some(format!(
        "{} user{} online: {}",
        count,
        if count == 1 { "" } else { "s" },
        names.join(", ")
    ))
}

pub fn check_in_entry(check_in: &CheckIn, now: DateTime<Utc>) -> String {
    let name = check_in.display_name_or_anonymous();
    let mut out = format!(
        "({}) {}  {}\n    {}  {}°C  {}",
        avatar_initial(name),
        name,
        relative_time(check_in.created_at, now),
        check_in.location,
        check_in.temperature,
        check_in.weather_condition,
    );
    if let Some(mood) = &check_in.mood {
        out.push_str("  ");
        out.push_str(mood);
    }
    if let Some(notes) = check_in.notes.as_deref().filter(|n| !n.is_empty()) {
        out.push_str(&format!("\n    \"{}\"", notes));
    }
    out
}

pub fn feed(state: &FeedState, now: DateTime<Utc>) -> String {
    if state.loading {
        return "Live Check-ins\n  Loading...".to_string();
    }

    let mut sections = Vec::new();
    if let Some(online) = online_summary(&state.online_users) {
        sections.push(online);
    }

    let mut list = String::from("Live Check-ins");
    if state.check_ins.is_empty() {
        list.push_str("\n  No check-ins yet today. Be the first to check in!");
    }
    for check_in in &state.check_ins {
        list.push('\n');
        list.push_str(&check_in_entry(check_in, now));
    }
    sections.push(list);

    sections.join("\n\n")
}
