//! Conversion of raw upstream samples into validated [`Reading`]s.
//!
//! The upstream page reports times one hour ahead of real time and can
//! serve a cached row from an earlier interval. [`normalize`] applies the
//! freshness gate: a sample is accepted only when its reported hour equals
//! the hour of `now + REPORTING_LAG`. Anything else comes back as
//! [`Normalized::Stale`], which is an expected outcome and not an error.
//!
//! # Example
//!
//! ```
//! use solar_types::{RawSample, Normalized, normalize};
//! use time::macros::datetime;
//!
//! let raw = RawSample {
//!     date: "07/03/24".into(),
//!     time: "3:02PM".into(),
//!     energy: "3.20kWh".into(),
//!     power: "1,234W".into(),
//!     temperature: "21.5C".into(),
//! };
//!
//! match normalize(&raw, datetime!(2024-03-07 14:05 UTC)).unwrap() {
//!     Normalized::Accepted(reading) => assert_eq!(reading.power_w, 1234.0),
//!     Normalized::Stale { .. } => unreachable!(),
//! }
//! ```

use time::{Duration, OffsetDateTime};

use crate::error::{ParseError, ParseResult};
use crate::types::{RawSample, Reading, TimeOfDay};

/// Fixed offset between real time and the time the upstream source reports.
pub const REPORTING_LAG: Duration = Duration::hours(1);

/// How long a reading stays retrievable from the hot store.
pub const HOT_RETENTION: Duration = Duration::days(7);

/// Outcome of normalizing one sample.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// The sample passed the freshness gate and should be written.
    Accepted(Reading),
    /// The sample reports a different hour than the current reporting hour.
    Stale {
        /// Time the sample claims to be from.
        time_of_day: TimeOfDay,
        /// Hour the sample was expected to report.
        reporting_hour: u8,
    },
}

impl Normalized {
    /// Whether the sample should be written to the hot store.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Normalized::Accepted(_))
    }
}

/// Parse a 12-hour clock label with an am/pm marker into a [`TimeOfDay`].
///
/// Accepts `"3:02PM"`, `"03:02pm"`, `"12:05 AM"` and `"3:2PM"`. The hour
/// must be 1-12 and the minute one or two digits below 60.
///
/// ```
/// use solar_types::{parse_time_label, TimeOfDay};
///
/// assert_eq!(parse_time_label("3:02PM").unwrap(), TimeOfDay::new(15, 2).unwrap());
/// assert_eq!(parse_time_label("12:05am").unwrap(), TimeOfDay::new(0, 5).unwrap());
/// assert!(parse_time_label("15:02").is_err());
/// ```
pub fn parse_time_label(label: &str) -> ParseResult<TimeOfDay> {
    let invalid = || ParseError::InvalidTime(label.to_string());
    let trimmed = label.trim();
    if trimmed.len() < 2 || !trimmed.is_char_boundary(trimmed.len() - 2) {
        return Err(invalid());
    }

    let (clock, marker) = trimmed.split_at(trimmed.len() - 2);
    let pm = if marker.eq_ignore_ascii_case("pm") {
        true
    } else if marker.eq_ignore_ascii_case("am") {
        false
    } else {
        return Err(invalid());
    };

    let (h, m) = clock.trim_end().split_once(':').ok_or_else(invalid)?;
    if h.is_empty() || h.len() > 2 || m.is_empty() || m.len() > 2 {
        return Err(invalid());
    }
    if !h.bytes().chain(m.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let hour12: u8 = h.parse().map_err(|_| invalid())?;
    let minute: u8 = m.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&hour12) {
        return Err(invalid());
    }

    let hour = match (hour12, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, false) => h,
        (h, true) => h + 12,
    };

    TimeOfDay::new(hour, minute).ok_or_else(invalid)
}

/// Strip a unit suffix and thousands separators, then parse the decimal.
///
/// ```
/// use solar_types::strip_unit;
///
/// assert_eq!(strip_unit("energy", "3.20kWh", "kWh").unwrap(), 3.20);
/// assert_eq!(strip_unit("power", "1,234W", "W").unwrap(), 1234.0);
/// assert_eq!(strip_unit("temperature", "21.5C", "C").unwrap(), 21.5);
/// ```
pub fn strip_unit(field: &'static str, value: &str, unit: &str) -> ParseResult<f64> {
    let trimmed = value.trim();
    let number = trimmed.strip_suffix(unit).unwrap_or(trimmed);
    let cleaned: String = number.chars().filter(|c| *c != ',').collect();

    match cleaned.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ParseError::InvalidNumber {
            field,
            value: value.to_string(),
        }),
    }
}

fn non_negative(field: &'static str, value: f64) -> ParseResult<f64> {
    if value < 0.0 {
        Err(ParseError::Negative { field, value })
    } else {
        Ok(value)
    }
}

/// The hour a fresh sample is expected to report at `now`.
#[must_use]
pub fn reporting_hour(now: OffsetDateTime) -> u8 {
    (now + REPORTING_LAG).hour()
}

/// Turn a raw sample into a [`Reading`], applying the freshness gate.
///
/// `now` is the ingestion instant in the deployment's local offset; it
/// decides the reporting hour, the day-of-month partition and the expiry.
///
/// # Errors
///
/// Returns a [`ParseError`] when any field is malformed. Nothing about the
/// sample should be written in that case.
pub fn normalize(raw: &RawSample, now: OffsetDateTime) -> ParseResult<Normalized> {
    let time_of_day = parse_time_label(&raw.time)?;
    let energy_kwh = non_negative("energy", strip_unit("energy", &raw.energy, "kWh")?)?;
    let power_w = non_negative("power", strip_unit("power", &raw.power, "W")?)?;
    let temperature_c = strip_unit("temperature", &raw.temperature, "C")?;

    let expected = reporting_hour(now);
    if time_of_day.hour() != expected {
        return Ok(Normalized::Stale {
            time_of_day,
            reporting_hour: expected,
        });
    }

    Ok(Normalized::Accepted(Reading {
        time_of_day,
        day_of_month: now.day(),
        energy_kwh,
        power_w,
        temperature_c,
        expires_at: now + HOT_RETENTION,
    }))
}
