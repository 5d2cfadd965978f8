// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Precision-aware temporal types for FHIRPath
//!
//! Every temporal value remembers how precisely it was written. A day-only date is
//! never padded with a midnight time, and comparisons only look at the components
//! both operands actually carry.

use chrono::{
    Datelike, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Precision levels for temporal values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum TemporalPrecision {
    /// Year precision (YYYY)
    Year,
    /// Month precision (YYYY-MM)
    Month,
    /// Day precision (YYYY-MM-DD)
    Day,
    /// Hour precision (THH)
    Hour,
    /// Minute precision (THH:MM)
    Minute,
    /// Second precision (THH:MM:SS)
    Second,
    /// Millisecond precision (THH:MM:SS.sss)
    Millisecond,
}

impl TemporalPrecision {
    /// Number of leading components (year, month, day, hour, minute, second+fraction)
    /// that a value of this precision carries. Seconds and milliseconds count as one
    /// component so that `10:00:00` and `10:00:00.000` compare at the same precision.
    fn significant_components(self) -> usize {
        match self {
            Self::Year => 1,
            Self::Month => 2,
            Self::Day => 3,
            Self::Hour => 4,
            Self::Minute => 5,
            Self::Second | Self::Millisecond => 6,
        }
    }
}

impl fmt::Display for TemporalPrecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Year => write!(f, "year"),
            Self::Month => write!(f, "month"),
            Self::Day => write!(f, "day"),
            Self::Hour => write!(f, "hour"),
            Self::Minute => write!(f, "minute"),
            Self::Second => write!(f, "second"),
            Self::Millisecond => write!(f, "millisecond"),
        }
    }
}

/// Comparable breakdown of a temporal value. The last slot holds seconds in
/// milliseconds so the fraction participates in second-level comparison.
#[derive(Debug, Clone, Copy)]
struct TemporalKey {
    fields: [i64; 6],
    precision: TemporalPrecision,
}

impl TemporalKey {
    fn from_datetime(value: &NaiveDateTime, precision: TemporalPrecision) -> Self {
        Self {
            fields: [
                i64::from(value.year()),
                i64::from(value.month()),
                i64::from(value.day()),
                i64::from(value.hour()),
                i64::from(value.minute()),
                i64::from(value.second()) * 1000
                    + i64::from(value.nanosecond() / 1_000_000),
            ],
            precision,
        }
    }

    fn from_time(value: &NaiveTime, precision: TemporalPrecision) -> Self {
        Self {
            fields: [
                0,
                0,
                0,
                i64::from(value.hour()),
                i64::from(value.minute()),
                i64::from(value.second()) * 1000
                    + i64::from(value.nanosecond() / 1_000_000),
            ],
            precision,
        }
    }

    /// Ordering over the shared components. `None` when the shared components are
    /// equal but one side is more precise than the other: the answer is unknown.
    fn compare(&self, other: &Self) -> Option<Ordering> {
        let own = self.precision.significant_components();
        let theirs = other.precision.significant_components();
        let shared = own.min(theirs);
        for index in 0..shared {
            match self.fields[index].cmp(&other.fields[index]) {
                Ordering::Equal => continue,
                decided => return Some(decided),
            }
        }
        if own == theirs {
            Some(Ordering::Equal)
        } else {
            None
        }
    }

    /// Equality after truncating both sides to the coarser precision.
    fn equivalent(&self, other: &Self) -> bool {
        let shared = self
            .precision
            .significant_components()
            .min(other.precision.significant_components());
        self.fields[..shared] == other.fields[..shared]
    }
}

/// A calendar duration that dates and datetimes can be shifted by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarDuration {
    /// Whole months; a year is twelve
    Months(i64),
    /// Fixed-length units down to the millisecond
    Milliseconds(i64),
}

impl CalendarDuration {
    /// The same duration pointing the other way
    pub fn checked_neg(self) -> Option<Self> {
        match self {
            Self::Months(months) => months.checked_neg().map(Self::Months),
            Self::Milliseconds(millis) => millis.checked_neg().map(Self::Milliseconds),
        }
    }
}

/// Shift a local datetime, truncating the duration to what `precision` can carry.
/// Years stay within 1..=9999.
fn shift(
    datetime: NaiveDateTime,
    precision: TemporalPrecision,
    duration: CalendarDuration,
) -> Option<NaiveDateTime> {
    let shifted = match duration {
        CalendarDuration::Months(months) => {
            let months = if precision == TemporalPrecision::Year {
                months / 12 * 12
            } else {
                months
            };
            let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
            if months >= 0 {
                datetime.checked_add_months(magnitude)?
            } else {
                datetime.checked_sub_months(magnitude)?
            }
        }
        CalendarDuration::Milliseconds(millis) => {
            let unit = match precision {
                TemporalPrecision::Year | TemporalPrecision::Month => return Some(datetime),
                TemporalPrecision::Day => 86_400_000,
                TemporalPrecision::Hour => 3_600_000,
                TemporalPrecision::Minute => 60_000,
                TemporalPrecision::Second => 1_000,
                TemporalPrecision::Millisecond => 1,
            };
            datetime.checked_add_signed(TimeDelta::try_milliseconds(millis / unit * unit)?)?
        }
    };
    (1..=9999).contains(&shifted.year()).then_some(shifted)
}

/// A date with precision tracking
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrecisionDate {
    /// The date value; missing month/day components are stored as 1
    pub date: NaiveDate,
    /// The precision of this date (year, month or day)
    pub precision: TemporalPrecision,
}

impl PrecisionDate {
    /// Create a new precision date
    pub fn new(date: NaiveDate, precision: TemporalPrecision) -> Self {
        Self { date, precision }
    }

    /// Parse `YYYY`, `YYYY-MM` or `YYYY-MM-DD`
    pub fn parse(text: &str) -> Option<Self> {
        let (date, precision) = parse_date_part(text)?;
        Some(Self::new(date, precision))
    }

    /// Promote to a datetime of the same precision, for mixed date/datetime comparison
    pub fn to_datetime(&self) -> PrecisionDateTime {
        PrecisionDateTime::new(self.date.and_time(NaiveTime::MIN), None, self.precision)
    }

    /// Ordering at the shared precision, `None` when undecidable
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        self.to_datetime().compare(&other.to_datetime())
    }

    /// Equivalence at the coarser of the two precisions
    pub fn equivalent(&self, other: &Self) -> bool {
        self.to_datetime().equivalent(&other.to_datetime())
    }

    /// Shift by a calendar duration, keeping the precision
    pub fn checked_add(&self, duration: CalendarDuration) -> Option<Self> {
        let shifted = shift(self.date.and_time(NaiveTime::MIN), self.precision, duration)?;
        Some(Self::new(shifted.date(), self.precision))
    }
}

impl fmt::Display for PrecisionDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.precision {
            TemporalPrecision::Year => write!(f, "{}", self.date.format("%Y")),
            TemporalPrecision::Month => write!(f, "{}", self.date.format("%Y-%m")),
            _ => write!(f, "{}", self.date.format("%Y-%m-%d")),
        }
    }
}

/// A datetime with precision tracking and an optional timezone offset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrecisionDateTime {
    /// Local date and time as written
    pub datetime: NaiveDateTime,
    /// Timezone offset, when one was written
    #[serde(with = "offset_seconds")]
    pub offset: Option<FixedOffset>,
    /// The precision of this datetime
    pub precision: TemporalPrecision,
}

impl PrecisionDateTime {
    /// Create a new precision datetime
    pub fn new(
        datetime: NaiveDateTime,
        offset: Option<FixedOffset>,
        precision: TemporalPrecision,
    ) -> Self {
        Self {
            datetime,
            offset,
            precision,
        }
    }

    /// Parse a FHIR dateTime or FHIRPath datetime literal body.
    ///
    /// Accepts a bare date (`2011-01-01`), a date followed by `T` with no time
    /// (`2012-04-15T`), and any time precision with an optional `Z` or `±HH:MM` offset.
    pub fn parse(text: &str) -> Option<Self> {
        let (date_text, time_text) = match text.split_once('T') {
            Some((date_text, time_text)) => (date_text, Some(time_text)),
            None => (text, None),
        };
        let (date, date_precision) = parse_date_part(date_text)?;

        let time_text = match time_text {
            None | Some("") => {
                return Some(Self::new(
                    date.and_time(NaiveTime::MIN),
                    None,
                    date_precision,
                ));
            }
            Some(time_text) => time_text,
        };
        // A time component needs a full date in front of it.
        if date_precision != TemporalPrecision::Day {
            return None;
        }

        let (time_body, offset) = split_offset(time_text)?;
        let (time, precision) = parse_time_part(time_body)?;
        Some(Self::new(date.and_time(time), offset, precision))
    }

    /// The date component at no more than day precision
    pub fn date(&self) -> PrecisionDate {
        PrecisionDate::new(
            self.datetime.date(),
            self.precision.min(TemporalPrecision::Day),
        )
    }

    /// Keys for a pairwise comparison. Offsets only matter when both sides carry one
    /// and the comparison reaches into the time of day.
    fn keys(&self, other: &Self) -> (TemporalKey, TemporalKey) {
        let reaches_time = self.precision.min(other.precision) >= TemporalPrecision::Hour;
        match (self.offset, other.offset) {
            (Some(own), Some(theirs)) if reaches_time => {
                let own_utc = self.datetime - own;
                let their_utc = other.datetime - theirs;
                (
                    TemporalKey::from_datetime(&own_utc, self.precision),
                    TemporalKey::from_datetime(&their_utc, other.precision),
                )
            }
            _ => (
                TemporalKey::from_datetime(&self.datetime, self.precision),
                TemporalKey::from_datetime(&other.datetime, other.precision),
            ),
        }
    }

    /// Ordering at the shared precision, `None` when undecidable
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        let (own, theirs) = self.keys(other);
        own.compare(&theirs)
    }

    /// Equivalence at the coarser of the two precisions
    pub fn equivalent(&self, other: &Self) -> bool {
        let (own, theirs) = self.keys(other);
        own.equivalent(&theirs)
    }

    /// Shift by a calendar duration, keeping the precision and offset
    pub fn checked_add(&self, duration: CalendarDuration) -> Option<Self> {
        let shifted = shift(self.datetime, self.precision, duration)?;
        Some(Self::new(shifted, self.offset, self.precision))
    }
}

impl fmt::Display for PrecisionDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.precision <= TemporalPrecision::Day {
            return write!(f, "{}", self.date());
        }
        let time = PrecisionTime::new(self.datetime.time(), self.precision);
        write!(f, "{}T{}", self.datetime.format("%Y-%m-%d"), time)?;
        if let Some(offset) = self.offset {
            if offset.local_minus_utc() == 0 {
                write!(f, "Z")?;
            } else {
                write!(f, "{offset}")?;
            }
        }
        Ok(())
    }
}

/// Offsets serialize as seconds east of UTC
mod offset_seconds {
    use chrono::FixedOffset;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        offset: &Option<FixedOffset>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        offset
            .map(|offset| offset.local_minus_utc())
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<FixedOffset>, D::Error> {
        match Option::<i32>::deserialize(deserializer)? {
            Some(seconds) => FixedOffset::east_opt(seconds)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom("offset out of range")),
            None => Ok(None),
        }
    }
}

/// A time of day with precision tracking
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrecisionTime {
    /// The time value
    pub time: NaiveTime,
    /// The precision of this time (hour through millisecond)
    pub precision: TemporalPrecision,
}

impl PrecisionTime {
    /// Create a new precision time
    pub fn new(time: NaiveTime, precision: TemporalPrecision) -> Self {
        Self { time, precision }
    }

    /// Parse `HH`, `HH:MM`, `HH:MM:SS` or `HH:MM:SS.fff`
    pub fn parse(text: &str) -> Option<Self> {
        let (time, precision) = parse_time_part(text)?;
        Some(Self::new(time, precision))
    }

    /// Ordering at the shared precision, `None` when undecidable
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        TemporalKey::from_time(&self.time, self.precision)
            .compare(&TemporalKey::from_time(&other.time, other.precision))
    }

    /// Equivalence at the coarser of the two precisions
    pub fn equivalent(&self, other: &Self) -> bool {
        TemporalKey::from_time(&self.time, self.precision)
            .equivalent(&TemporalKey::from_time(&other.time, other.precision))
    }
}

impl fmt::Display for PrecisionTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.precision {
            TemporalPrecision::Hour => write!(f, "{}", self.time.format("%H")),
            TemporalPrecision::Minute => write!(f, "{}", self.time.format("%H:%M")),
            TemporalPrecision::Millisecond => write!(f, "{}", self.time.format("%H:%M:%S%.3f")),
            _ => write!(f, "{}", self.time.format("%H:%M:%S")),
        }
    }
}

fn parse_number(text: &str, digits: usize) -> Option<u32> {
    if text.len() != digits || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn parse_date_part(text: &str) -> Option<(NaiveDate, TemporalPrecision)> {
    let mut parts = text.split('-');
    let year = parse_number(parts.next()?, 4)? as i32;
    let month = match parts.next() {
        Some(part) => Some(parse_number(part, 2)?),
        None => None,
    };
    let day = match parts.next() {
        Some(part) => Some(parse_number(part, 2)?),
        None => None,
    };
    if parts.next().is_some() {
        return None;
    }

    let precision = match (month, day) {
        (None, _) => TemporalPrecision::Year,
        (Some(_), None) => TemporalPrecision::Month,
        (Some(_), Some(_)) => TemporalPrecision::Day,
    };
    let date = NaiveDate::from_ymd_opt(year, month.unwrap_or(1), day.unwrap_or(1))?;
    Some((date, precision))
}

fn parse_time_part(text: &str) -> Option<(NaiveTime, TemporalPrecision)> {
    let (clock, fraction) = match text.split_once('.') {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (text, None),
    };
    let mut parts = clock.split(':');
    let hour = parse_number(parts.next()?, 2)?;
    let minute = match parts.next() {
        Some(part) => Some(parse_number(part, 2)?),
        None => None,
    };
    let second = match parts.next() {
        Some(part) => Some(parse_number(part, 2)?),
        None => None,
    };
    if parts.next().is_some() {
        return None;
    }

    let millis = match fraction {
        Some(fraction) => {
            if second.is_none()
                || fraction.is_empty()
                || !fraction.bytes().all(|b| b.is_ascii_digit())
            {
                return None;
            }
            let padded = format!("{fraction:0<3}");
            Some(padded[..3].parse::<u32>().ok()?)
        }
        None => None,
    };

    let precision = match (minute, second, millis) {
        (None, _, _) => TemporalPrecision::Hour,
        (Some(_), None, _) => TemporalPrecision::Minute,
        (Some(_), Some(_), None) => TemporalPrecision::Second,
        (Some(_), Some(_), Some(_)) => TemporalPrecision::Millisecond,
    };
    let time = NaiveTime::from_hms_milli_opt(
        hour,
        minute.unwrap_or(0),
        second.unwrap_or(0),
        millis.unwrap_or(0),
    )?;
    Some((time, precision))
}

/// Split a trailing `Z` or `±HH:MM` offset from a time body
fn split_offset(text: &str) -> Option<(&str, Option<FixedOffset>)> {
    if let Some(body) = text.strip_suffix('Z') {
        return Some((body, FixedOffset::east_opt(0)));
    }
    match text.rfind(['+', '-']) {
        Some(index) => {
            let (body, offset) = text.split_at(index);
            let sign = if offset.starts_with('-') { -1 } else { 1 };
            let (hours, minutes) = offset[1..].split_once(':')?;
            let seconds = (parse_number(hours, 2)? * 3600 + parse_number(minutes, 2)? * 60) as i32;
            Some((body, Some(FixedOffset::east_opt(sign * seconds)?)))
        }
        None => Some((text, None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_precision() {
        let date = PrecisionDate::parse("2012-04").unwrap();
        assert_eq!(date.precision, TemporalPrecision::Month);
        assert_eq!(date.to_string(), "2012-04");

        let datetime = PrecisionDateTime::parse("2011-01-01").unwrap();
        assert_eq!(datetime.precision, TemporalPrecision::Day);
        assert_eq!(datetime.to_string(), "2011-01-01");

        let datetime = PrecisionDateTime::parse("2012-04-15T10:00:00.123+02:00").unwrap();
        assert_eq!(datetime.precision, TemporalPrecision::Millisecond);
        assert_eq!(datetime.to_string(), "2012-04-15T10:00:00.123+02:00");

        let time = PrecisionTime::parse("10:30").unwrap();
        assert_eq!(time.precision, TemporalPrecision::Minute);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(PrecisionDate::parse("2012-4-15").is_none());
        assert!(PrecisionDate::parse("2012-13").is_none());
        assert!(PrecisionDateTime::parse("2012-04T10:00").is_none());
        assert!(PrecisionTime::parse("25:00").is_none());
        assert!(PrecisionTime::parse("10:00.5").is_none());
        assert!(PrecisionDate::parse("2012-04-5").is_none());
        assert!(PrecisionDate::parse("2012-04-").is_none());
        assert!(PrecisionTime::parse("10:5").is_none());
        assert!(PrecisionTime::parse("10:05:7").is_none());
        assert!(PrecisionDateTime::parse("2012-04-15T10:5").is_none());
    }

    #[test]
    fn test_equivalence_truncates_to_coarser_precision() {
        let day = PrecisionDate::parse("2012-04-15").unwrap().to_datetime();
        let timestamp = PrecisionDateTime::parse("2012-04-15T10:00:00").unwrap();
        assert!(day.equivalent(&timestamp));
        assert!(timestamp.equivalent(&day));

        let next_day = PrecisionDateTime::parse("2012-04-16T10:00:00").unwrap();
        assert!(!day.equivalent(&next_day));
    }

    #[test]
    fn test_compare_at_different_precision_is_unknown_when_shared_part_equal() {
        let day = PrecisionDateTime::parse("2012-04-15").unwrap();
        let timestamp = PrecisionDateTime::parse("2012-04-15T10:00:00").unwrap();
        assert_eq!(day.compare(&timestamp), None);

        let later = PrecisionDateTime::parse("2012-05-01T10:00:00").unwrap();
        assert_eq!(day.compare(&later), Some(Ordering::Less));
    }

    #[test]
    fn test_offsets_are_normalized() {
        let utc = PrecisionDateTime::parse("2012-04-15T10:00:00Z").unwrap();
        let shifted = PrecisionDateTime::parse("2012-04-15T12:00:00+02:00").unwrap();
        assert_eq!(utc.compare(&shifted), Some(Ordering::Equal));
    }

    #[test]
    fn test_shift_by_calendar_duration() {
        let date = PrecisionDate::parse("2012-01-31").unwrap();
        let next_month = date.checked_add(CalendarDuration::Months(1)).unwrap();
        assert_eq!(next_month.to_string(), "2012-02-29");

        let year_only = PrecisionDate::parse("2012").unwrap();
        let shifted = year_only.checked_add(CalendarDuration::Months(13)).unwrap();
        assert_eq!(shifted.to_string(), "2013");

        let day = PrecisionDate::parse("2012-04-15").unwrap();
        let ninety_hours = CalendarDuration::Milliseconds(90 * 3_600_000);
        assert_eq!(day.checked_add(ninety_hours).unwrap().to_string(), "2012-04-18");

        let timestamp = PrecisionDateTime::parse("2012-04-15T23:30:00+02:00").unwrap();
        let later = timestamp
            .checked_add(CalendarDuration::Milliseconds(45 * 60_000))
            .unwrap();
        assert_eq!(later.to_string(), "2012-04-16T00:15:00+02:00");

        let last_year = PrecisionDate::parse("9999-06").unwrap();
        assert!(last_year.checked_add(CalendarDuration::Months(12)).is_none());
    }

    #[test]
    fn test_seconds_and_milliseconds_share_precision() {
        let seconds = PrecisionTime::parse("10:00:00").unwrap();
        let millis = PrecisionTime::parse("10:00:00.000").unwrap();
        assert_eq!(seconds.compare(&millis), Some(Ordering::Equal));
    }
}
