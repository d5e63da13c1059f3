//! Time-axis decoding for CF and ARM style time variables
//!
//! Lidar files store time as numeric offsets plus a units attribute such as
//! `seconds since 2023-04-03 00:00:00 0:00` and an optional `calendar`
//! attribute. This module turns those offsets into UTC timestamps and can
//! re-express offsets against another epoch, which is needed when hourly
//! files each declare their own base time.

use crate::errors::{DlWindError, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use ndarray::{Array1, ArrayView1};
use std::fmt;

/// Length unit of a time offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "milliseconds" | "millisecond" | "msec" | "msecs" | "ms" => Some(Self::Milliseconds),
            "seconds" | "second" | "secs" | "sec" | "s" => Some(Self::Seconds),
            "minutes" | "minute" | "mins" | "min" => Some(Self::Minutes),
            "hours" | "hour" | "hrs" | "hr" | "h" => Some(Self::Hours),
            "days" | "day" | "d" => Some(Self::Days),
            _ => None,
        }
    }

    /// Number of seconds in one unit
    #[must_use]
    pub const fn seconds(self) -> f64 {
        match self {
            Self::Milliseconds => 1e-3,
            Self::Seconds => 1.0,
            Self::Minutes => 60.0,
            Self::Hours => 3600.0,
            Self::Days => 86_400.0,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Milliseconds => "milliseconds",
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
        }
    }
}

/// Calendars the decoder understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Calendar {
    /// Mixed Julian/Gregorian calendar; only Gregorian-era epochs are accepted
    #[default]
    Standard,
    ProlepticGregorian,
}

impl Calendar {
    /// Parses a `calendar` attribute; a missing attribute means `standard`.
    ///
    /// # Errors
    ///
    /// Returns [`DlWindError::UnsupportedCalendar`] for non-Gregorian calendars
    /// such as `noleap` or `360_day`.
    pub fn parse(name: Option<&str>) -> Result<Self> {
        let Some(name) = name else {
            return Ok(Self::Standard);
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "standard" | "gregorian" => Ok(Self::Standard),
            "proleptic_gregorian" => Ok(Self::ProlepticGregorian),
            _ => Err(DlWindError::UnsupportedCalendar {
                calendar: name.to_string(),
            }),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::ProlepticGregorian => "proleptic_gregorian",
        }
    }
}

/// Parsed `<unit> since <epoch>` string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeUnits {
    pub unit: TimeUnit,
    pub epoch: DateTime<Utc>,
}

impl TimeUnits {
    /// Parses a units attribute such as `seconds since 2023-04-03 00:00:00 0:00`.
    ///
    /// # Errors
    ///
    /// Returns [`DlWindError::InvalidTimeUnits`] if the unit word, the date,
    /// the clock time or the UTC offset cannot be read.
    pub fn parse(units: &str) -> Result<Self> {
        let invalid = |reason: &str| DlWindError::InvalidTimeUnits {
            units: units.to_string(),
            reason: reason.to_string(),
        };

        let lowered = units.to_ascii_lowercase();
        let split_at = lowered
            .find(" since ")
            .ok_or_else(|| invalid("expected '<unit> since <epoch>'"))?;
        let unit = TimeUnit::parse(units[..split_at].trim())
            .ok_or_else(|| invalid("unknown time unit"))?;
        let epoch = parse_epoch(&units[split_at + " since ".len()..]).map_err(|r| invalid(&r))?;

        Ok(Self { unit, epoch })
    }

    /// Converts one offset to a UTC timestamp
    ///
    /// # Errors
    ///
    /// Returns [`DlWindError::InvalidTimeValue`] for non-finite or out-of-range offsets.
    pub fn decode(&self, value: f64) -> Result<DateTime<Utc>> {
        let micros = (value * self.unit.seconds() * 1e6).round();
        if !micros.is_finite() || micros.abs() >= i64::MAX as f64 {
            return Err(DlWindError::InvalidTimeValue { value });
        }
        #[allow(clippy::cast_possible_truncation)]
        let delta = Duration::microseconds(micros as i64);
        self.epoch
            .checked_add_signed(delta)
            .ok_or(DlWindError::InvalidTimeValue { value })
    }

    /// Re-expresses offsets measured in `self` as offsets measured in `target`
    #[must_use]
    pub fn rebase(&self, values: ArrayView1<'_, f64>, target: &TimeUnits) -> Array1<f64> {
        let shift = self.epoch - target.epoch;
        #[allow(clippy::cast_precision_loss)]
        let shift_seconds = shift
            .num_microseconds()
            .map_or_else(|| shift.num_milliseconds() as f64 / 1e3, |us| us as f64 / 1e6);
        let scale = self.unit.seconds();
        let target_scale = target.unit.seconds();
        values.mapv(|v| (v * scale + shift_seconds) / target_scale)
    }
}

impl fmt::Display for TimeUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} since {}",
            self.unit.as_str(),
            self.epoch.format("%Y-%m-%d %H:%M:%S 0:00")
        )
    }
}

/// Decodes a whole time axis into UTC timestamps.
///
/// # Errors
///
/// Returns an error if the units or calendar are not understood, or if any
/// offset is non-finite.
pub fn decode_times(
    values: ArrayView1<'_, f64>,
    units: &str,
    calendar: Calendar,
) -> Result<Vec<DateTime<Utc>>> {
    let parsed = TimeUnits::parse(units)?;
    if calendar == Calendar::Standard && parsed.epoch < gregorian_reform() {
        return Err(DlWindError::InvalidTimeUnits {
            units: units.to_string(),
            reason: "standard calendar epochs before 1582-10-15 are not supported".to_string(),
        });
    }
    values.iter().map(|&v| parsed.decode(v)).collect()
}

fn gregorian_reform() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1582, 10, 15)
        .unwrap_or(NaiveDate::MIN)
        .and_time(NaiveTime::MIN)
        .and_utc()
}

fn parse_epoch(text: &str) -> std::result::Result<DateTime<Utc>, String> {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    if let Some((date, clock)) = tokens.first().copied().and_then(|t| t.split_once(['T', 't'])) {
        tokens.splice(0..1, [date, clock]);
    }

    let (date_token, rest) = tokens
        .split_first()
        .ok_or_else(|| "missing epoch date".to_string())?;
    let date = parse_date(date_token)?;

    let mut clock = NaiveTime::MIN;
    let mut offset_seconds = 0_i64;
    let mut rest = rest.iter();

    if let Some(token) = rest.next() {
        let (clock_part, zone) = split_zone(token);
        clock = parse_clock(clock_part)?;
        if let Some(zone) = zone {
            offset_seconds = parse_offset(zone)?;
        }
    }
    if let Some(zone) = rest.next() {
        offset_seconds = parse_offset(zone)?;
    }
    if rest.next().is_some() {
        return Err("unexpected trailing text after epoch".to_string());
    }

    let local = NaiveDateTime::new(date, clock);
    local
        .checked_sub_signed(Duration::seconds(offset_seconds))
        .map(|utc| utc.and_utc())
        .ok_or_else(|| "epoch out of range".to_string())
}

fn parse_date(token: &str) -> std::result::Result<NaiveDate, String> {
    let parts: Vec<&str> = token.split('-').collect();
    let [year, month, day] = parts.as_slice() else {
        return Err(format!("invalid date '{token}'"));
    };
    let year: i32 = year.parse().map_err(|_| format!("invalid year in '{token}'"))?;
    let month: u32 = month.parse().map_err(|_| format!("invalid month in '{token}'"))?;
    let day: u32 = day.parse().map_err(|_| format!("invalid day in '{token}'"))?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| format!("invalid date '{token}'"))
}

fn parse_clock(token: &str) -> std::result::Result<NaiveTime, String> {
    let parts: Vec<&str> = token.split(':').collect();
    let (hour, minute, second) = match parts.as_slice() {
        [h] => (*h, "0", "0"),
        [h, m] => (*h, *m, "0"),
        [h, m, s] => (*h, *m, *s),
        _ => return Err(format!("invalid time of day '{token}'")),
    };
    let hour: u32 = hour.parse().map_err(|_| format!("invalid hour in '{token}'"))?;
    let minute: u32 = minute.parse().map_err(|_| format!("invalid minute in '{token}'"))?;
    let second: f64 = second.parse().map_err(|_| format!("invalid second in '{token}'"))?;
    if !(0.0..60.0).contains(&second) {
        return Err(format!("invalid second in '{token}'"));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (whole, nanos) = (second.trunc() as u32, (second.fract() * 1e9).round() as u32);
    NaiveTime::from_hms_nano_opt(hour, minute, whole, nanos.min(999_999_999))
        .ok_or_else(|| format!("invalid time of day '{token}'"))
}

/// Splits a zone suffix glued to a clock token, e.g. `00:00:00Z` or `12:00:00+05:30`
fn split_zone(token: &str) -> (&str, Option<&str>) {
    if let Some(clock) = token.strip_suffix(['Z', 'z']) {
        return (clock, Some("Z"));
    }
    match token.find(['+', '-']) {
        Some(idx) if idx > 0 => (&token[..idx], Some(&token[idx..])),
        _ => (token, None),
    }
}

fn parse_offset(token: &str) -> std::result::Result<i64, String> {
    let upper = token.to_ascii_uppercase();
    if matches!(upper.as_str(), "Z" | "UTC" | "GMT") {
        return Ok(0);
    }

    let (sign, body) = match token.as_bytes().first() {
        Some(b'+') => (1, &token[1..]),
        Some(b'-') => (-1, &token[1..]),
        _ => (1, token),
    };
    let (hours, minutes) = match body.split_once(':') {
        Some((h, m)) => (h, m),
        None if body.len() == 4 => body.split_at(2),
        None => (body, "0"),
    };
    let hours: i64 = hours.parse().map_err(|_| format!("invalid UTC offset '{token}'"))?;
    let minutes: i64 = minutes.parse().map_err(|_| format!("invalid UTC offset '{token}'"))?;
    if hours > 23 || minutes > 59 {
        return Err(format!("invalid UTC offset '{token}'"));
    }
    Ok(sign * (hours * 3600 + minutes * 60))
}
