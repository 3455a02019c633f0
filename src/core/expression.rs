//! Six-field schedule expression parsing.
//!
//! An expression has exactly six whitespace-separated fields:
//!
//! ```text
//! second minute hour day-of-month month day-of-week
//! ```
//!
//! Each field is `*`, a single value, an inclusive range `a-b`, or a comma list `a,b,c`.
//! Day-of-week additionally accepts three-letter English names (`SUN`..`SAT`, any case),
//! and its ranges may wrap around the end of the week (`FRI-MON`).

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of fields in an expression.
pub const FIELD_COUNT: usize = 6;

/// Day names indexed by their day-of-week number (Sunday = 0).
const DAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Errors that can occur when parsing or evaluating schedules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// The expression is not a valid six-field schedule.
    #[error("malformed expression '{expression}': {reason}")]
    MalformedExpression { expression: String, reason: String },

    /// No instant matched within the search horizon.
    #[error("no execution found within {horizon_days} days after {from}")]
    NoExecutionFound {
        from: DateTime<Utc>,
        horizon_days: i64,
    },
}

/// A position in the six-field expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Second,
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
}

impl Field {
    /// All fields in expression order.
    pub const ALL: [Field; FIELD_COUNT] = [
        Field::Second,
        Field::Minute,
        Field::Hour,
        Field::DayOfMonth,
        Field::Month,
        Field::DayOfWeek,
    ];

    /// Inclusive domain of the field.
    pub fn bounds(self) -> (u8, u8) {
        match self {
            Field::Second | Field::Minute => (0, 59),
            Field::Hour => (0, 23),
            Field::DayOfMonth => (1, 31),
            Field::Month => (1, 12),
            Field::DayOfWeek => (0, 6),
        }
    }

    /// Human-readable field name.
    pub fn name(self) -> &'static str {
        match self {
            Field::Second => "second",
            Field::Minute => "minute",
            Field::Hour => "hour",
            Field::DayOfMonth => "day-of-month",
            Field::Month => "month",
            Field::DayOfWeek => "day-of-week",
        }
    }

    /// Value of this field for a UTC instant.
    pub fn value_of(self, instant: &DateTime<Utc>) -> u32 {
        match self {
            Field::Second => instant.second(),
            Field::Minute => instant.minute(),
            Field::Hour => instant.hour(),
            Field::DayOfMonth => instant.day(),
            Field::Month => instant.month(),
            Field::DayOfWeek => instant.weekday().num_days_from_sunday(),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The set of values one field accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldMatcher {
    /// Matches every value (`*`).
    Any,
    /// Matches exactly the listed values.
    Matches(BTreeSet<u8>),
}

impl FieldMatcher {
    /// Check whether a field value is accepted.
    pub fn matches(&self, value: u32) -> bool {
        match self {
            FieldMatcher::Any => true,
            FieldMatcher::Matches(values) => {
                u8::try_from(value).is_ok_and(|value| values.contains(&value))
            }
        }
    }
}

impl fmt::Display for FieldMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldMatcher::Any => f.write_str("*"),
            FieldMatcher::Matches(values) => {
                let joined: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                f.write_str(&joined.join(","))
            }
        }
    }
}

/// A parsed schedule expression.
///
/// Immutable once built; two parses of the same string compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleSpec {
    pub second: FieldMatcher,
    pub minute: FieldMatcher,
    pub hour: FieldMatcher,
    pub day_of_month: FieldMatcher,
    pub month: FieldMatcher,
    pub day_of_week: FieldMatcher,
}

impl ScheduleSpec {
    /// Parse a six-field expression.
    pub fn parse(expression: &str) -> Result<Self, ScheduleError> {
        let malformed = |reason: String| ScheduleError::MalformedExpression {
            expression: expression.to_string(),
            reason,
        };

        let raw: Vec<&str> = expression.split_whitespace().collect();
        if raw.len() != FIELD_COUNT {
            return Err(malformed(format!(
                "expected {} fields, got {}",
                FIELD_COUNT,
                raw.len()
            )));
        }

        let field = |index: usize| {
            let field = Field::ALL[index];
            parse_field(raw[index], field).map_err(|reason| {
                malformed(format!("{} field '{}': {}", field, raw[index], reason))
            })
        };

        Ok(Self {
            second: field(0)?,
            minute: field(1)?,
            hour: field(2)?,
            day_of_month: field(3)?,
            month: field(4)?,
            day_of_week: field(5)?,
        })
    }

    /// Get the matcher for a field.
    pub fn field(&self, field: Field) -> &FieldMatcher {
        match field {
            Field::Second => &self.second,
            Field::Minute => &self.minute,
            Field::Hour => &self.hour,
            Field::DayOfMonth => &self.day_of_month,
            Field::Month => &self.month,
            Field::DayOfWeek => &self.day_of_week,
        }
    }

    /// Check whether every field accepts the given instant.
    pub fn matches(&self, instant: &DateTime<Utc>) -> bool {
        Field::ALL
            .into_iter()
            .all(|field| self.field(field).matches(field.value_of(instant)))
    }
}

impl FromStr for ScheduleSpec {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ScheduleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.second, self.minute, self.hour, self.day_of_month, self.month, self.day_of_week
        )
    }
}

/// Parse one field. Rule order: `*`, range, list, single value.
fn parse_field(token: &str, field: Field) -> Result<FieldMatcher, String> {
    if token == "*" {
        return Ok(FieldMatcher::Any);
    }

    let values = if let Some((start, end)) = token.split_once('-') {
        parse_range(start, end, field)?
    } else if token.contains(',') {
        token
            .split(',')
            .map(|item| resolve(item, field))
            .collect::<Result<BTreeSet<u8>, String>>()?
    } else {
        BTreeSet::from([resolve(token, field)?])
    };

    Ok(FieldMatcher::Matches(values))
}

/// Expand an inclusive range. Day-of-week ranges wrap modulo 7.
fn parse_range(start: &str, end: &str, field: Field) -> Result<BTreeSet<u8>, String> {
    let start = resolve(start, field)?;
    let end = resolve(end, field)?;

    if field == Field::DayOfWeek {
        let mut values = BTreeSet::new();
        let mut day = start;
        loop {
            values.insert(day);
            if day == end {
                break;
            }
            day = (day + 1) % 7;
        }
        return Ok(values);
    }

    if start > end {
        return Err(format!("range start {} is after end {}", start, end));
    }
    Ok((start..=end).collect())
}

/// Map a token to a field value: day names first (day-of-week only), then numbers.
fn resolve(token: &str, field: Field) -> Result<u8, String> {
    if token.is_empty() {
        return Err("empty value".to_string());
    }

    if field == Field::DayOfWeek {
        if let Some(index) = DAY_NAMES
            .iter()
            .position(|name| name.eq_ignore_ascii_case(token))
        {
            return Ok(index as u8);
        }
    }

    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(if field == Field::DayOfWeek {
            format!("unrecognized day name '{}'", token)
        } else {
            format!("'{}' is not a number", token)
        });
    }

    let (min, max) = field.bounds();
    match token.parse::<u8>() {
        Ok(value) if (min..=max).contains(&value) => Ok(value),
        _ => Err(format!("value {} outside {}-{}", token, min, max)),
    }
}
