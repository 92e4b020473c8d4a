//! Post and comment text rules plus shared display formats.

use time::{format_description::FormatItem, macros::format_description};

pub const POST_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[day] [month repr:short] [year], [hour]:[minute]");

pub const TEXT_REQUIRED_MESSAGE: &str = "This field is required.";

/// Trim user text, returning `None` when nothing remains.
pub fn normalize_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
