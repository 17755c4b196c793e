//! Presentation transforms for rendered logs.

use std::sync::OnceLock;

use chrono::DateTime;
use regex::{Captures, Regex};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const NANOS_PER_SECOND: i64 = 1_000_000_000;

fn escaped_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"&lt;(https?://[^\s|]+?)(?:\|(.*?))?&gt;").expect("valid chat link pattern")
    })
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            '\0' => escaped.push('\u{FFFD}'),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Rewrites escaped chat link markup (`&lt;url&gt;` or `&lt;url|label&gt;`)
/// into anchors. Input must already be HTML-escaped.
pub fn linkify_escaped(escaped: &str) -> String {
    escaped_link_pattern()
        .replace_all(escaped, |captures: &Captures<'_>| {
            let url = &captures[1];
            let label = captures
                .get(2)
                .map(|label| label.as_str())
                .filter(|label| !label.is_empty())
                .unwrap_or(url);
            format!("<a href=\"{url}\" target=\"_blank\">{label}</a>")
        })
        .into_owned()
}

/// Escape first, then linkify.
pub fn message_to_html(message: &str) -> String {
    linkify_escaped(&escape_html(message))
}

/// Formats a `seconds.fraction` chat timestamp as UTC `YYYY-MM-DD HH:MM:SS`.
/// Returns an empty string when either segment is not numeric.
pub fn format_slack_timestamp(raw: &str) -> String {
    let raw = raw.trim();
    let (seconds, fraction) = match raw.split_once('.') {
        Some((seconds, fraction)) => (seconds, Some(fraction)),
        None => (raw, None),
    };
    let Ok(seconds) = seconds.parse::<i64>() else {
        return String::new();
    };
    let fraction = match fraction {
        Some(fraction) => match fraction.parse::<i64>() {
            Ok(value) => value,
            Err(_) => return String::new(),
        },
        None => 0,
    };
    let seconds = seconds.saturating_add(fraction.div_euclid(NANOS_PER_SECOND));
    let nanos = fraction.rem_euclid(NANOS_PER_SECOND) as u32;
    DateTime::from_timestamp(seconds, nanos)
        .map(|moment| moment.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}
