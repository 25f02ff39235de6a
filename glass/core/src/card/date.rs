//! Date labels shown on cards

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};

/// Relative label for a card's display date, as seen at `now`.
///
/// - within a minute: "Just now"
/// - rounds to one minute: "a minute ago"
/// - under an hour: "N minutes ago"
/// - rounds to one hour: "an hour ago"
/// - up to four hours: "N hours ago"
/// - same calendar day: "HH:MM"
/// - otherwise: "YYYY-MM-DD HH:MM"
///
/// Calendar fields are taken in `now`'s time zone.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn nice_date<Tz: TimeZone>(date: DateTime<Utc>, now: &DateTime<Tz>) -> String {
    let minutes = (now.timestamp_millis() - date.timestamp_millis()) as f64 / 60_000.0;

    if minutes <= 1.0 {
        return "Just now".to_string();
    }
    let rounded = minutes.round() as i64;
    if rounded == 1 {
        return "a minute ago".to_string();
    }
    if minutes < 60.0 {
        return format!("{rounded} minutes ago");
    }

    let hours = (minutes / 60.0).round() as i64;
    if hours == 1 {
        return "an hour ago".to_string();
    }
    if hours <= 4 {
        return format!("{hours} hours ago");
    }

    let local = date.with_timezone(&now.timezone());
    if local.year() == now.year() && local.month() == now.month() && local.day() == now.day() {
        return format!("{:02}:{:02}", local.hour(), local.minute());
    }
    format!(
        "{}-{:02}-{:02} {:02}:{:02}",
        local.year(),
        local.month(),
        local.day(),
        local.hour(),
        local.minute()
    )
}

/// Clock face text: hour without padding, minutes padded ("9:05")
#[must_use]
pub fn clock_face<Tz: TimeZone>(now: &DateTime<Tz>) -> String {
    format!("{}:{:02}", now.hour(), now.minute())
}
