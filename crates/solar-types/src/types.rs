//! Core types for solar telemetry.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::{Date, OffsetDateTime};

use crate::error::ParseError;

#[cfg(feature = "serde")]
time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Wall-clock time of day at minute resolution, as reported by the upstream source.
///
/// Displays and serializes as 24-hour `"HH:MM"`. Because both components are
/// zero-padded, the text form sorts in the same order as the value.
///
/// ```
/// use solar_types::TimeOfDay;
///
/// let t: TimeOfDay = "15:02".parse().unwrap();
/// assert_eq!(t.hour(), 15);
/// assert_eq!(t.to_string(), "15:02");
/// assert!(TimeOfDay::new(24, 0).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    /// Create a time of day, returning `None` when out of range.
    #[must_use]
    pub const fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    /// Hour component (0-23).
    #[must_use]
    pub const fn hour(&self) -> u8 {
        self.hour
    }

    /// Minute component (0-59).
    #[must_use]
    pub const fn minute(&self) -> u8 {
        self.minute
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = ParseError;

    /// Parse a 24-hour `"HH:MM"` value (the stored form).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidTime(s.to_string());
        let (h, m) = s.split_once(':').ok_or_else(invalid)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }
        if !h.bytes().chain(m.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let hour = h.parse::<u8>().map_err(|_| invalid())?;
        let minute = m.parse::<u8>().map_err(|_| invalid())?;
        Self::new(hour, minute).ok_or_else(invalid)
    }
}

#[cfg(feature = "serde")]
impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The five text fields extracted from one row of the upstream page.
///
/// Units are still embedded in the values (`"3.2kWh"`, `"1,234W"`, `"21C"`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawSample {
    /// Date label as shown upstream (informational only).
    #[cfg_attr(feature = "serde", serde(default))]
    pub date: String,
    /// 12-hour time label with am/pm marker, e.g. `"3:05PM"`.
    pub time: String,
    /// Cumulative energy for the day, e.g. `"3.20kWh"`.
    pub energy: String,
    /// Instantaneous power, e.g. `"1,234W"`.
    pub power: String,
    /// Ambient temperature, e.g. `"21.5C"`.
    pub temperature: String,
}

/// One validated telemetry sample, as held by the hot store.
///
/// Serializes to the hot-store record shape:
/// `{time, energy, power, temperature, day, expireAt}` where `expireAt`
/// is in unix seconds.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reading {
    /// Reported wall-clock time.
    #[cfg_attr(feature = "serde", serde(rename = "time"))]
    pub time_of_day: TimeOfDay,
    /// Cumulative energy for the day in kWh.
    #[cfg_attr(feature = "serde", serde(rename = "energy"))]
    pub energy_kwh: f64,
    /// Instantaneous power in watts.
    #[cfg_attr(feature = "serde", serde(rename = "power"))]
    pub power_w: f64,
    /// Ambient temperature in degrees Celsius.
    #[cfg_attr(feature = "serde", serde(rename = "temperature"))]
    pub temperature_c: f64,
    /// Calendar day (1-31) the sample belongs to; the hot-store partition key.
    #[cfg_attr(feature = "serde", serde(rename = "day"))]
    pub day_of_month: u8,
    /// Instant after which the hot store may discard this reading.
    #[cfg_attr(
        feature = "serde",
        serde(rename = "expireAt", with = "time::serde::timestamp")
    )]
    pub expires_at: OffsetDateTime,
}

impl Reading {
    /// The two-digit day key used to partition the hot store (`"07"`).
    #[must_use]
    pub fn day_key(&self) -> String {
        day_key(self.day_of_month)
    }

    /// Project to the record stored in a cold partition.
    #[must_use]
    pub fn to_cold_record(&self) -> ColdRecord {
        ColdRecord {
            time: self.time_of_day,
            power: self.power_w,
            energy: self.energy_kwh,
            temperature: self.temperature_c,
        }
    }

    /// Project to the intraday point returned for the current day.
    #[must_use]
    pub fn to_day_point(&self) -> DayPoint {
        DayPoint {
            time: self.time_of_day,
            power: self.power_w,
            energy: self.energy_kwh,
        }
    }
}

/// Format a day of month as the two-digit hot-store key.
#[must_use]
pub fn day_key(day_of_month: u8) -> String {
    format!("{:02}", day_of_month)
}

/// One element of a cold partition: `{time, power, energy, temperature}`.
///
/// Numeric fields serialize as JSON numbers. When deserializing they may
/// also be decimal strings, which is how older partitions were written.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ColdRecord {
    /// Reported wall-clock time.
    pub time: TimeOfDay,
    /// Instantaneous power in watts.
    #[cfg_attr(feature = "serde", serde(deserialize_with = "number_or_string"))]
    pub power: f64,
    /// Cumulative energy in kWh.
    #[cfg_attr(feature = "serde", serde(deserialize_with = "number_or_string"))]
    pub energy: f64,
    /// Ambient temperature in degrees Celsius.
    #[cfg_attr(feature = "serde", serde(deserialize_with = "number_or_string"))]
    pub temperature: f64,
}

/// Intraday projection `{time, power, energy}` of a hot reading.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DayPoint {
    /// Reported wall-clock time.
    pub time: TimeOfDay,
    /// Instantaneous power in watts.
    pub power: f64,
    /// Cumulative energy in kWh.
    pub energy: f64,
}

/// Peak energy of one archived day. Derived at query time, never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AggregatedPoint {
    /// Calendar date, serialized as `"YYYY-MM-DD"`.
    #[cfg_attr(feature = "serde", serde(with = "iso_date"))]
    pub date: Date,
    /// Maximum cumulative energy recorded that day in kWh.
    pub max_energy: f64,
}

#[cfg(feature = "serde")]
fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        Text(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn sample_reading() -> Reading {
        Reading {
            time_of_day: TimeOfDay::new(15, 2).unwrap(),
            energy_kwh: 3.2,
            power_w: 1234.0,
            temperature_c: 21.5,
            day_of_month: 7,
            expires_at: datetime!(2024-03-14 14:05 UTC),
        }
    }

    #[test]
    fn test_time_of_day_bounds() {
        assert!(TimeOfDay::new(0, 0).is_some());
        assert!(TimeOfDay::new(23, 59).is_some());
        assert!(TimeOfDay::new(24, 0).is_none());
        assert!(TimeOfDay::new(12, 60).is_none());
    }

    #[test]
    fn test_time_of_day_display_is_zero_padded() {
        assert_eq!(TimeOfDay::new(7, 5).unwrap().to_string(), "07:05");
        assert_eq!(TimeOfDay::new(0, 0).unwrap().to_string(), "00:00");
    }

    #[test]
    fn test_time_of_day_from_str() {
        assert_eq!("09:30".parse::<TimeOfDay>(), Ok(TimeOfDay::new(9, 30).unwrap()));
        assert_eq!("9:30".parse::<TimeOfDay>(), Ok(TimeOfDay::new(9, 30).unwrap()));
        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("12:5".parse::<TimeOfDay>().is_err());
        assert!("12-05".parse::<TimeOfDay>().is_err());
        assert!("+1:05".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn test_time_of_day_ordering_matches_text() {
        let mut times = vec![
            TimeOfDay::new(13, 0).unwrap(),
            TimeOfDay::new(9, 45).unwrap(),
            TimeOfDay::new(9, 5).unwrap(),
        ];
        times.sort();
        let text: Vec<String> = times.iter().map(ToString::to_string).collect();
        let mut sorted_text = text.clone();
        sorted_text.sort();
        assert_eq!(text, sorted_text);
        assert_eq!(text, vec!["09:05", "09:45", "13:00"]);
    }

    #[test]
    fn test_day_key() {
        assert_eq!(day_key(7), "07");
        assert_eq!(day_key(31), "31");
        assert_eq!(sample_reading().day_key(), "07");
    }

    #[test]
    fn test_reading_serializes_as_hot_record() {
        let json = serde_json::to_value(sample_reading()).unwrap();
        assert_eq!(json["time"], "15:02");
        assert_eq!(json["energy"], 3.2);
        assert_eq!(json["power"], 1234.0);
        assert_eq!(json["temperature"], 21.5);
        assert_eq!(json["day"], 7);
        assert_eq!(
            json["expireAt"],
            datetime!(2024-03-14 14:05 UTC).unix_timestamp()
        );
    }

    #[test]
    fn test_cold_record_field_order() {
        let json = serde_json::to_string(&sample_reading().to_cold_record()).unwrap();
        assert_eq!(
            json,
            r#"{"time":"15:02","power":1234.0,"energy":3.2,"temperature":21.5}"#
        );
    }

    #[test]
    fn test_cold_record_accepts_string_numbers() {
        let json = r#"{"time":"10:15","power":"450","energy":"1.25","temperature":"-3.5"}"#;
        let record: ColdRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.time, TimeOfDay::new(10, 15).unwrap());
        assert_eq!(record.power, 450.0);
        assert_eq!(record.energy, 1.25);
        assert_eq!(record.temperature, -3.5);
    }

    #[test]
    fn test_cold_record_rejects_garbage_number() {
        let json = r#"{"time":"10:15","power":"n/a","energy":1.0,"temperature":2.0}"#;
        assert!(serde_json::from_str::<ColdRecord>(json).is_err());
    }

    #[test]
    fn test_day_point_projection() {
        let point = sample_reading().to_day_point();
        let json = serde_json::to_string(&point).unwrap();
        assert_eq!(json, r#"{"time":"15:02","power":1234.0,"energy":3.2}"#);
    }

    #[test]
    fn test_aggregated_point_date_format() {
        let point = AggregatedPoint {
            date: date!(2024 - 03 - 07),
            max_energy: 2.5,
        };
        let json = serde_json::to_string(&point).unwrap();
        assert_eq!(json, r#"{"date":"2024-03-07","max_energy":2.5}"#);

        let back: AggregatedPoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, point);
    }

    #[test]
    fn test_raw_sample_date_optional() {
        let raw: RawSample = serde_json::from_str(
            r#"{"time":"3:05PM","energy":"3.2kWh","power":"450W","temperature":"21C"}"#,
        )
        .unwrap();
        assert!(raw.date.is_empty());
        assert_eq!(raw.time, "3:05PM");
    }
}
