pub mod sync_report;

use chrono::{DateTime, FixedOffset, Local, Utc};
use serde::{Deserialize, Serialize};

pub use sync_report::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkdownContent(pub String);

impl std::fmt::Display for MarkdownContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed UTC offset used to display report timestamps.
///
/// Accepts a few common abbreviations (UTC, GMT, JST, EST, PST, PDT, BST) and
/// `+HH:MM` / `-HH:MM` strings. Daylight saving time is not tracked; pick the
/// abbreviation that matches the period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimezoneOffset {
    /// Offset from UTC in seconds, positive east of Greenwich
    pub offset_seconds: i32,
    pub name: String,
}

impl TimezoneOffset {
    pub fn new(hours: i32, minutes: i32, name: String) -> Self {
        Self {
            offset_seconds: hours * 3600 + minutes * 60,
            name,
        }
    }

    pub fn from_local() -> Self {
        let offset_seconds = Local::now().offset().local_minus_utc();
        let sign = if offset_seconds >= 0 { '+' } else { '-' };
        let abs = offset_seconds.abs();
        Self {
            offset_seconds,
            name: format!("{}{:02}:{:02}", sign, abs / 3600, (abs % 3600) / 60),
        }
    }

    pub fn parse(tz_str: &str) -> Option<Self> {
        let named = |hours, name: &str| Some(Self::new(hours, 0, name.to_string()));
        match tz_str {
            "UTC" | "GMT" => named(0, "UTC"),
            "JST" => named(9, "JST"),
            "EST" => named(-5, "EST"),
            "PST" => named(-8, "PST"),
            "PDT" => named(-7, "PDT"),
            "BST" => named(1, "BST"),
            s if s.starts_with('+') || s.starts_with('-') => {
                let sign = if s.starts_with('-') { -1 } else { 1 };
                let (hours, minutes) = s[1..].split_once(':')?;
                let hours = hours.parse::<i32>().ok()?;
                let minutes = minutes.parse::<i32>().ok()?;
                if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
                    return None;
                }
                Some(Self::new(sign * hours, sign * minutes, s.to_string()))
            }
            _ => None,
        }
    }

    pub fn to_fixed_offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.offset_seconds)
    }
}

impl std::fmt::Display for TimezoneOffset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Format a UTC datetime in `timezone`, or in UTC when none is given
pub fn format_datetime_with_timezone_offset(
    dt: DateTime<Utc>,
    timezone: Option<&TimezoneOffset>,
) -> String {
    match timezone.and_then(|tz| tz.to_fixed_offset().map(|offset| (tz, offset))) {
        Some((tz, offset)) => dt
            .with_timezone(&offset)
            .format(&format!("%Y-%m-%d %H:%M:%S {}", tz.name))
            .to_string(),
        None => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    }
}
