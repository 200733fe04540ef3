use super::domain::{
    BallotField, Column, WorkingTable, MAX_PLAUSIBLE_AGE, MIN_PLAUSIBLE_AGE, REFERENCE_YEAR,
};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use tracing::debug;

const SECONDS_PER_DAY: i64 = 86_400;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized date value '{value}'")]
pub struct DateParseError {
    pub value: String,
}

/// What a derivation step discarded along the way.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeriveReport {
    pub parse_failures: usize,
    pub rows_dropped: usize,
}

pub fn parse_date(value: &str) -> Result<NaiveDateTime, DateParseError> {
    let trimmed = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_local());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt);
        }
    }

    for format in DATE_FORMATS {
        if let Some(dt) = NaiveDate::parse_from_str(trimmed, format)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
        {
            return Ok(dt);
        }
    }

    Err(DateParseError {
        value: value.to_string(),
    })
}

fn coerce(value: &str, failures: &mut usize) -> Option<NaiveDateTime> {
    match parse_date(value) {
        Ok(dt) => Some(dt),
        Err(error) => {
            debug!(%error, "date coerced to null");
            *failures += 1;
            None
        }
    }
}

/// Parses `dateofbirth` and derives `yr_born`, placed right after it.
pub fn add_birth_year(mut table: WorkingTable) -> (WorkingTable, DeriveReport) {
    let mut report = DeriveReport::default();

    for record in table.records_mut() {
        record.birth_date = coerce(&record.date_of_birth, &mut report.parse_failures);
        record.yr_born = record.birth_date.map(|dt| dt.year());
    }

    table.insert_column_after(Column::YrBorn, &Column::Field(BallotField::DateOfBirth));
    (table, report)
}

/// Age in the reference year, keeping only plausible voters. Records without
/// a birth year have no age and are dropped too.
pub fn add_age_in_reference_year(mut table: WorkingTable) -> (WorkingTable, DeriveReport) {
    for record in table.records_mut() {
        record.age_in_2020 = record.yr_born.map(|year| REFERENCE_YEAR - year);
    }
    table.push_column(Column::AgeInReferenceYear);

    let before = table.len();
    table.retain(|record| {
        record
            .age_in_2020
            .is_some_and(|age| (MIN_PLAUSIBLE_AGE..=MAX_PLAUSIBLE_AGE).contains(&age))
    });

    let report = DeriveReport {
        parse_failures: 0,
        rows_dropped: before - table.len(),
    };
    (table, report)
}

/// Whole days from application issue to ballot return. Negative values are
/// kept; the latency report filters them.
pub fn add_latency(mut table: WorkingTable) -> (WorkingTable, DeriveReport) {
    let mut report = DeriveReport::default();

    for record in table.records_mut() {
        record.issued_at = coerce(&record.app_issue_date, &mut report.parse_failures);
        record.returned_at = coerce(&record.ballot_returned_date, &mut report.parse_failures);
        record.latency_days = match (record.issued_at, record.returned_at) {
            (Some(issued), Some(returned)) => Some(latency_days(issued, returned)),
            _ => None,
        };
    }

    table.push_column(Column::LatencyDays);
    (table, report)
}

pub fn latency_days(issued: NaiveDateTime, returned: NaiveDateTime) -> i64 {
    (returned - issued).num_seconds().div_euclid(SECONDS_PER_DAY)
}
