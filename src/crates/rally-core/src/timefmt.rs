//! Relative timestamps for feed rows

use chrono::{DateTime, Utc};

/// Age of a wall message: `Just now`, `{m}m ago`, `{h}h ago` or `{d}d ago`
pub fn message_age(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = elapsed_minutes(created_at, now);
    if minutes < 1 {
        "Just now".to_string()
    } else {
        coarse_age(minutes)
    }
}

/// Age of an experience story; never says `Just now`
pub fn experience_age(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    coarse_age(elapsed_minutes(created_at, now))
}

fn coarse_age(minutes: i64) -> String {
    if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 60 * 24 {
        format!("{}h ago", minutes / 60)
    } else {
        format!("{}d ago", minutes / (60 * 24))
    }
}

// rows stamped slightly in the future by a skewed clock count as new
fn elapsed_minutes(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - created_at).num_minutes().max(0)
}
