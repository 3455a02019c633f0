//! Next occurrence calculation.
//!
//! Candidates are probed forward from the second after the reference instant and tested
//! field by field against the parsed expression. When a coarse field (month, day, hour,
//! minute) rejects a candidate, every later second sharing that field value is rejected
//! too, so the probe jumps to the first second of the next unit instead of stepping
//! through each one. The first accepted candidate is the same one second-by-second
//! probing would find.

use chrono::{DateTime, Datelike, Duration, NaiveDate, SubsecRound, TimeZone, Timelike, Utc};

use super::expression::{Field, ScheduleError, ScheduleSpec};

/// How far ahead the calculator searches before giving up.
///
/// 366 days so that a yearly schedule is always found, leap years included.
pub const SEARCH_HORIZON_DAYS: i64 = 366;

/// Find the first instant strictly after `from` that matches every field of `spec`.
pub fn next_execution(
    from: DateTime<Utc>,
    spec: &ScheduleSpec,
) -> Result<DateTime<Utc>, ScheduleError> {
    let start = from.trunc_subsecs(0) + Duration::seconds(1);
    let horizon = start + Duration::days(SEARCH_HORIZON_DAYS);

    let mut probe = start;
    while probe < horizon {
        match first_mismatch(spec, &probe) {
            None => return Ok(probe),
            Some(field) => probe = skip_past(probe, field),
        }
    }

    Err(ScheduleError::NoExecutionFound {
        from,
        horizon_days: SEARCH_HORIZON_DAYS,
    })
}

/// The coarsest field that rejects `probe`, if any.
fn first_mismatch(spec: &ScheduleSpec, probe: &DateTime<Utc>) -> Option<Field> {
    [
        Field::Month,
        Field::DayOfMonth,
        Field::DayOfWeek,
        Field::Hour,
        Field::Minute,
        Field::Second,
    ]
    .into_iter()
    .find(|field| !spec.field(*field).matches(field.value_of(probe)))
}

/// First second after `probe` whose `field` value differs from the current one.
fn skip_past(probe: DateTime<Utc>, field: Field) -> DateTime<Utc> {
    match field {
        Field::Second => probe + Duration::seconds(1),
        Field::Minute => probe + Duration::seconds(60 - i64::from(probe.second())),
        Field::Hour => {
            let into_hour = i64::from(probe.minute() * 60 + probe.second());
            probe + Duration::seconds(3600 - into_hour)
        }
        Field::DayOfMonth | Field::DayOfWeek => next_midnight(probe),
        Field::Month => {
            let (year, month) = if probe.month() == 12 {
                (probe.year() + 1, 1)
            } else {
                (probe.year(), probe.month() + 1)
            };
            NaiveDate::from_ymd_opt(year, month, 1)
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
                .unwrap_or_else(|| next_midnight(probe))
        }
    }
}

fn next_midnight(probe: DateTime<Utc>) -> DateTime<Utc> {
    let into_day = i64::from(probe.num_seconds_from_midnight());
    probe + Duration::seconds(86_400 - into_day)
}

/// A parsed expression together with its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    expression: String,
    spec: ScheduleSpec,
}

impl Schedule {
    /// Parse a schedule from a six-field expression.
    pub fn new(expression: impl Into<String>) -> Result<Self, ScheduleError> {
        let expression = expression.into();
        let spec = ScheduleSpec::parse(&expression)?;
        Ok(Self { expression, spec })
    }

    /// Get the next occurrence strictly after the given time.
    pub fn next_after(&self, after: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
        next_execution(after, &self.spec)
    }

    /// Get the next N occurrences after the given time.
    pub fn next_n_after(
        &self,
        after: DateTime<Utc>,
        n: usize,
    ) -> Result<Vec<DateTime<Utc>>, ScheduleError> {
        let mut results = Vec::with_capacity(n);
        let mut current = after;
        for _ in 0..n {
            current = self.next_after(current)?;
            results.push(current);
        }
        Ok(results)
    }

    /// Get the original expression string.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Get the parsed field matchers.
    pub fn spec(&self) -> &ScheduleSpec {
        &self.spec
    }
}
