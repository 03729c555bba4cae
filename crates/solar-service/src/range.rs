//! Classification of the `range` query parameter.

use std::fmt;

use time::{Date, Month};

/// What a `range` value asks for.
///
/// Every string maps to exactly one variant; classification never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeSelector {
    /// `"day"`: intraday readings for the current day from the hot tier.
    Today,
    /// `"7"` or `"30"`: daily maxima for the preceding days.
    Window(u32),
    /// `"YYYYMMDD"`: the full cold partition for one date.
    Date(Date),
    /// Anything else. Holds the original value.
    Invalid(String),
}

impl RangeSelector {
    /// Classify a raw `range` value.
    ///
    /// Matching is exact and case-sensitive; surrounding whitespace makes a
    /// value invalid. A date must be exactly eight ASCII digits naming a real
    /// calendar day.
    ///
    /// ```
    /// use solar_service::RangeSelector;
    /// use time::macros::date;
    ///
    /// assert_eq!(RangeSelector::parse("day"), RangeSelector::Today);
    /// assert_eq!(RangeSelector::parse("7"), RangeSelector::Window(7));
    /// assert_eq!(RangeSelector::parse("20240701"), RangeSelector::Date(date!(2024-07-01)));
    /// assert!(!RangeSelector::parse("2024071").is_valid());
    /// ```
    pub fn parse(raw: &str) -> Self {
        match raw {
            "day" => Self::Today,
            "7" => Self::Window(7),
            "30" => Self::Window(30),
            _ => match parse_compact_date(raw) {
                Some(date) => Self::Date(date),
                None => Self::Invalid(raw.to_string()),
            },
        }
    }

    /// Whether the value selected something queryable.
    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Invalid(_))
    }
}

impl fmt::Display for RangeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Today => write!(f, "day"),
            Self::Window(days) => write!(f, "{}", days),
            Self::Date(date) => write!(
                f,
                "{:04}{:02}{:02}",
                date.year(),
                u8::from(date.month()),
                date.day()
            ),
            Self::Invalid(raw) => write!(f, "{}", raw),
        }
    }
}

/// Parse `YYYYMMDD` into a calendar date.
pub fn parse_compact_date(raw: &str) -> Option<Date> {
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = raw[0..4].parse().ok()?;
    let month: u8 = raw[4..6].parse().ok()?;
    let day: u8 = raw[6..8].parse().ok()?;
    Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()
}
