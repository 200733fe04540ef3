use chrono::NaiveDateTime;
use std::fmt;

/// Calendar year ages are computed against.
pub const REFERENCE_YEAR: i32 = 2020;
pub const MIN_PLAUSIBLE_AGE: i32 = 18;
pub const MAX_PLAUSIBLE_AGE: i32 = 110;

pub const YR_BORN_COLUMN: &str = "yr_born";
pub const AGE_COLUMN: &str = "age_in_2020";
pub const AGE_GROUP_COLUMN: &str = "age_group";
pub const LATENCY_COLUMN: &str = "latency_days";

/// Source columns every ballot application must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BallotField {
    DateOfBirth,
    Senate,
    Legislative,
    Congressional,
    Party,
    AppIssueDate,
    BallotReturnedDate,
}

impl BallotField {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::DateOfBirth,
            Self::Senate,
            Self::Legislative,
            Self::Congressional,
            Self::Party,
            Self::AppIssueDate,
            Self::BallotReturnedDate,
        ]
    }

    pub const fn column_name(self) -> &'static str {
        match self {
            Self::DateOfBirth => "dateofbirth",
            Self::Senate => "senate",
            Self::Legislative => "legislative",
            Self::Congressional => "congressional",
            Self::Party => "party",
            Self::AppIssueDate => "appissuedate",
            Self::BallotReturnedDate => "ballotreturneddate",
        }
    }

    pub fn from_column_name(name: &str) -> Option<Self> {
        Self::ordered()
            .into_iter()
            .find(|field| field.column_name() == name)
    }
}

/// Fixed age buckets, left-inclusive. `80+` also holds the upper bound of
/// the plausible age range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AgeGroup {
    EighteenToTwentyNine,
    Thirties,
    Forties,
    Fifties,
    Sixties,
    Seventies,
    EightyPlus,
}

impl AgeGroup {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::EighteenToTwentyNine,
            Self::Thirties,
            Self::Forties,
            Self::Fifties,
            Self::Sixties,
            Self::Seventies,
            Self::EightyPlus,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::EighteenToTwentyNine => "18-29",
            Self::Thirties => "30-39",
            Self::Forties => "40-49",
            Self::Fifties => "50-59",
            Self::Sixties => "60-69",
            Self::Seventies => "70-79",
            Self::EightyPlus => "80+",
        }
    }

    pub const fn for_age(age: i32) -> Option<Self> {
        match age {
            18..=29 => Some(Self::EighteenToTwentyNine),
            30..=39 => Some(Self::Thirties),
            40..=49 => Some(Self::Forties),
            50..=59 => Some(Self::Fifties),
            60..=69 => Some(Self::Sixties),
            70..=79 => Some(Self::Seventies),
            80..=MAX_PLAUSIBLE_AGE => Some(Self::EightyPlus),
            _ => None,
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One CSV row as fetched; `None` marks an empty field.
pub type RawRow = Vec<Option<String>>;

/// Untyped rows straight from the source, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<RawRow>,
}

impl RawTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn from_rows(headers: Vec<String>, rows: Vec<RawRow>) -> Self {
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[RawRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends the rows of `page`. The first page fixes the header row;
    /// later pages must repeat it exactly.
    pub fn append(&mut self, page: RawTable) -> Result<(), HeaderMismatch> {
        if self.headers.is_empty() && self.rows.is_empty() {
            *self = page;
            return Ok(());
        }

        if page.headers != self.headers {
            return Err(HeaderMismatch {
                expected: self.headers.clone(),
                found: page.headers,
            });
        }

        self.rows.extend(page.rows);
        Ok(())
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<RawRow>) {
        (self.headers, self.rows)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("page header {found:?} does not match {expected:?}")]
pub struct HeaderMismatch {
    pub expected: Vec<String>,
    pub found: Vec<String>,
}

/// A column of the working table, in presentation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    Field(BallotField),
    Passthrough { name: String, slot: usize },
    YrBorn,
    AgeInReferenceYear,
    AgeGroup,
    LatencyDays,
}

impl Column {
    pub fn name(&self) -> &str {
        match self {
            Column::Field(field) => field.column_name(),
            Column::Passthrough { name, .. } => name.as_str(),
            Column::YrBorn => YR_BORN_COLUMN,
            Column::AgeInReferenceYear => AGE_COLUMN,
            Column::AgeGroup => AGE_GROUP_COLUMN,
            Column::LatencyDays => LATENCY_COLUMN,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_source(&self) -> bool {
        matches!(self, Column::Field(_) | Column::Passthrough { .. })
    }
}

/// A null-free ballot application with the fields the reports read typed
/// out; other source columns ride along in `passthrough`.
#[derive(Debug, Clone, PartialEq)]
pub struct BallotApplication {
    pub date_of_birth: String,
    pub senate: String,
    pub legislative: String,
    pub congressional: String,
    pub party: String,
    pub app_issue_date: String,
    pub ballot_returned_date: String,
    pub passthrough: Vec<String>,
    pub birth_date: Option<NaiveDateTime>,
    pub issued_at: Option<NaiveDateTime>,
    pub returned_at: Option<NaiveDateTime>,
    pub yr_born: Option<i32>,
    pub age_in_2020: Option<i32>,
    pub age_group: Option<AgeGroup>,
    pub latency_days: Option<i64>,
}

impl BallotApplication {
    pub fn field(&self, field: BallotField) -> &str {
        match field {
            BallotField::DateOfBirth => &self.date_of_birth,
            BallotField::Senate => &self.senate,
            BallotField::Legislative => &self.legislative,
            BallotField::Congressional => &self.congressional,
            BallotField::Party => &self.party,
            BallotField::AppIssueDate => &self.app_issue_date,
            BallotField::BallotReturnedDate => &self.ballot_returned_date,
        }
    }

    /// Display text for `column`; derived columns that are unset render
    /// as `<NA>`.
    pub fn cell(&self, column: &Column) -> String {
        fn optional<T: ToString>(value: Option<T>) -> String {
            value.map_or_else(|| "<NA>".to_string(), |value| value.to_string())
        }

        match column {
            Column::Field(field) => self.field(*field).to_string(),
            Column::Passthrough { slot, .. } => {
                self.passthrough.get(*slot).cloned().unwrap_or_default()
            }
            Column::YrBorn => optional(self.yr_born),
            Column::AgeInReferenceYear => optional(self.age_in_2020),
            Column::AgeGroup => optional(self.age_group),
            Column::LatencyDays => optional(self.latency_days),
        }
    }
}

/// The dataset threaded through every stage after normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingTable {
    columns: Vec<Column>,
    records: Vec<BallotApplication>,
}

impl WorkingTable {
    pub fn new(columns: Vec<Column>, records: Vec<BallotApplication>) -> Self {
        Self { columns, records }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn records(&self) -> &[BallotApplication] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [BallotApplication] {
        &mut self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: &Column) -> bool {
        self.columns.contains(column)
    }

    /// Places `column` right after `anchor`, or last when `anchor` is
    /// missing. A column already present is moved.
    pub fn insert_column_after(&mut self, column: Column, anchor: &Column) {
        self.columns.retain(|existing| existing != &column);
        match self.columns.iter().position(|existing| existing == anchor) {
            Some(index) => self.columns.insert(index + 1, column),
            None => self.columns.push(column),
        }
    }

    pub fn push_column(&mut self, column: Column) {
        if !self.has_column(&column) {
            self.columns.push(column);
        }
    }

    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&BallotApplication) -> bool,
    {
        self.records.retain(keep);
    }

    /// Source columns only, back in raw form.
    #[cfg(test)]
    pub(crate) fn to_raw(&self) -> RawTable {
        let source: Vec<&Column> = self.columns.iter().filter(|c| c.is_source()).collect();
        let headers = source.iter().map(|c| c.name().to_string()).collect();
        let rows = self
            .records
            .iter()
            .map(|record| source.iter().map(|c| Some(record.cell(c))).collect())
            .collect();
        RawTable::from_rows(headers, rows)
    }
}
