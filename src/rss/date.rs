//! Publication date parsing for feed items.
//!
//! Feeds in the wild use a handful of timestamp layouts. [`DATE_LAYOUTS`] lists
//! the supported ones in the order they are tried; the first that parses wins.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown date format: {input}")]
pub struct DateParseError {
    pub input: String,
}

/// One entry of the layout table.
#[derive(Clone, Copy)]
pub struct DateLayout {
    pub name: &'static str,
    /// A literal this layout accepts.
    pub example: &'static str,
    pub parse: fn(&str) -> Option<DateTime<Utc>>,
}

impl std::fmt::Debug for DateLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DateLayout")
            .field("name", &self.name)
            .field("example", &self.example)
            .finish()
    }
}

pub const DATE_LAYOUTS: &[DateLayout] = &[
    DateLayout {
        name: "rfc1123",
        example: "Mon, 02 Jan 2006 15:04:05 MST",
        parse: parse_rfc1123,
    },
    DateLayout {
        name: "rfc1123z",
        example: "Mon, 02 Jan 2006 15:04:05 -0700",
        parse: parse_rfc1123z,
    },
    DateLayout {
        name: "rfc3339",
        example: "2006-01-02T15:04:05Z",
        parse: parse_rfc3339,
    },
    DateLayout {
        name: "rfc822",
        example: "02 Jan 06 15:04 MST",
        parse: parse_rfc822,
    },
    DateLayout {
        name: "rfc822z",
        example: "02 Jan 06 15:04 -0700",
        parse: parse_rfc822z,
    },
    DateLayout {
        name: "rfc850",
        example: "Monday, 02-Jan-06 15:04:05 MST",
        parse: parse_rfc850,
    },
    DateLayout {
        name: "ruby_date",
        example: "Mon Jan 02 15:04:05 -0700 2006",
        parse: parse_ruby_date,
    },
];

/// Parses `raw` against [`DATE_LAYOUTS`].
pub fn parse_date(raw: &str) -> Result<DateTime<Utc>, DateParseError> {
    parse_date_with(DATE_LAYOUTS, raw)
}

/// Parses `raw` against a caller-supplied layout table.
pub fn parse_date_with(layouts: &[DateLayout], raw: &str) -> Result<DateTime<Utc>, DateParseError> {
    let trimmed = raw.trim();
    layouts
        .iter()
        .find_map(|layout| (layout.parse)(trimmed))
        .ok_or_else(|| DateParseError {
            input: raw.to_string(),
        })
}

fn parse_rfc1123(s: &str) -> Option<DateTime<Utc>> {
    let rest = strip_weekday(s, ", ")?;
    with_named_zone(rest, "%d %b %Y %H:%M:%S")
}

fn parse_rfc1123z(s: &str) -> Option<DateTime<Utc>> {
    let rest = strip_weekday(s, ", ")?;
    with_numeric_zone(rest, "%d %b %Y %H:%M:%S %z")
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_rfc822(s: &str) -> Option<DateTime<Utc>> {
    with_named_zone(s, "%d %b %y %H:%M")
}

fn parse_rfc822z(s: &str) -> Option<DateTime<Utc>> {
    with_numeric_zone(s, "%d %b %y %H:%M %z")
}

fn parse_rfc850(s: &str) -> Option<DateTime<Utc>> {
    let rest = strip_weekday(s, ", ")?;
    with_named_zone(rest, "%d-%b-%y %H:%M:%S")
}

fn parse_ruby_date(s: &str) -> Option<DateTime<Utc>> {
    let rest = strip_weekday(s, " ")?;
    with_numeric_zone(rest, "%b %d %H:%M:%S %z %Y")
}

/// Drops a leading weekday name. The weekday is not checked against the date.
fn strip_weekday<'a>(s: &'a str, separator: &str) -> Option<&'a str> {
    let (weekday, rest) = s.split_once(separator)?;
    if weekday.is_empty() || !weekday.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(rest.trim_start())
}

fn with_numeric_zone(s: &str, format: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, format)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn with_named_zone(s: &str, format: &str) -> Option<DateTime<Utc>> {
    let (stamp, zone) = s.rsplit_once(' ')?;
    let offset = zone_offset(zone)?;
    let naive = NaiveDateTime::parse_from_str(stamp, format).ok()?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// RFC 822 zone names. Unknown alphabetic abbreviations resolve to UTC.
fn zone_offset(zone: &str) -> Option<FixedOffset> {
    if zone.is_empty() || !zone.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let hours = match zone.to_ascii_uppercase().as_str() {
        "EDT" => -4,
        "EST" | "CDT" => -5,
        "CST" | "MDT" => -6,
        "MST" | "PDT" => -7,
        "PST" => -8,
        _ => 0,
    };
    FixedOffset::east_opt(hours * 3600)
}
