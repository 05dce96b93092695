use chrono::{DateTime, Utc};
use chrono_tz::America::New_York;
use serde_json::json;

use crate::models::tool::Tool;

pub const NAME: &str = "get_datetime";

pub fn tool() -> Tool {
    Tool::new(
        NAME,
        "Get the current local date and time. Use this whenever the answer depends on \
        today's date, the day of the week, or the current time.",
        json!({
            "type": "object",
            "properties": {},
            "required": []
        }),
    )
}

/// Format an instant in the reference timezone (US Eastern)
pub fn format_datetime(now: DateTime<Utc>) -> String {
    now.with_timezone(&New_York)
        .format("%A, %B %-d, %Y at %-I:%M:%S %p %Z")
        .to_string()
}

pub fn get_datetime() -> String {
    format_datetime(Utc::now())
}
