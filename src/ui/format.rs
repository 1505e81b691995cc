/// Relative dates for the project list and comment threads

use chrono::DateTime;

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// "Today", "Yesterday", "N days ago", then "Jan 15, 2024"
pub fn format_project_date(timestamp: i64, now: i64) -> String {
    let days = (now - timestamp).div_euclid(DAY_MS);
    match days {
        i64::MIN..=0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        2..=6 => format!("{} days ago", days),
        _ => calendar_date(timestamp),
    }
}

/// "Just now", "5m ago", "3h ago", "Yesterday", "4d ago", then a calendar date
pub fn format_comment_time(timestamp: i64, now: i64) -> String {
    let elapsed = now - timestamp;
    let minutes = elapsed.div_euclid(MINUTE_MS);
    let hours = elapsed.div_euclid(HOUR_MS);
    let days = elapsed.div_euclid(DAY_MS);

    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else if days == 1 {
        "Yesterday".to_string()
    } else if days < 7 {
        format!("{}d ago", days)
    } else {
        calendar_date(timestamp)
    }
}

fn calendar_date(timestamp: i64) -> String {
    match DateTime::from_timestamp_millis(timestamp) {
        Some(date) => date.format("%b %-d, %Y").to_string(),
        None => String::new(),
    }
}
