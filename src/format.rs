use time::{UtcOffset, format_description};
use tracing::warn;

use crate::models::Timestamp;

pub const DEFAULT_TIMESTAMP_FORMAT: &str = "[year]/[month]/[day] [hour]:[minute]:[second]";

/// Render a stored timestamp in the local offset, or UTC when the local
/// offset cannot be determined. Missing or unrepresentable values render as `-`.
pub fn format_timestamp(timestamp: Option<Timestamp>, format: Option<&str>) -> String {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    render(timestamp, format.unwrap_or(DEFAULT_TIMESTAMP_FORMAT), offset)
}

fn render(timestamp: Option<Timestamp>, format: &str, offset: UtcOffset) -> String {
    let Some(datetime) = timestamp.and_then(|ts| ts.to_datetime()) else {
        return "-".to_string();
    };
    let description = match format_description::parse(format) {
        Ok(description) => description,
        Err(err) => {
            warn!(format, error = %err, "invalid timestamp format");
            return "-".to_string();
        }
    };
    datetime
        .to_offset(offset)
        .format(&description[..])
        .unwrap_or_else(|_| "-".to_string())
}
