pub mod derive;
pub mod domain;
pub mod fetch;
pub mod normalizer;
pub mod report;

use derive::DeriveReport;
use domain::{RawTable, WorkingTable, MAX_PLAUSIBLE_AGE, MIN_PLAUSIBLE_AGE};
use fetch::{FetchSummary, FetchTermination, PageSource};
use normalizer::NormalizeError;
use report::{
    age_party, district, latency, AgePartyReport, DistrictFrequencyReport, LatencyReport,
    ReportError, TextTable,
};
use std::fmt;
use std::num::NonZeroUsize;
use tracing::{info, warn};

pub use domain::{AgeGroup, BallotApplication, BallotField, Column, REFERENCE_YEAR};
pub use fetch::{CsvExportSource, FetchError, HttpPageSource};

pub const DEFAULT_PREVIEW_ROWS: usize = 5;

const RULE_WIDTH: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no ballot applications fetched: request at offset {offset} failed: {source}")]
    Fetch {
        offset: usize,
        #[source]
        source: FetchError,
    },
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error("no ballot applications left after {stage}")]
    EmptyDataset { stage: &'static str },
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Runs fetch, normalize, derive and the reports in order, handing the
/// table from stage to stage.
#[derive(Debug, Clone)]
pub struct BallotPipeline {
    page_size: NonZeroUsize,
    preview_rows: usize,
}

impl BallotPipeline {
    pub fn new(page_size: NonZeroUsize) -> Self {
        Self {
            page_size,
            preview_rows: DEFAULT_PREVIEW_ROWS,
        }
    }

    pub fn with_preview_rows(mut self, rows: usize) -> Self {
        self.preview_rows = rows;
        self
    }

    pub fn run<S: PageSource + ?Sized>(
        &self,
        source: &S,
    ) -> Result<BallotAnalysis, PipelineError> {
        let summary = fetch::fetch_all(source, self.page_size);
        if !summary.is_complete() && !summary.table.is_empty() {
            warn!(
                pages = summary.pages,
                rows = summary.table.len(),
                "continuing with a partial dataset"
            );
        }

        let FetchSummary {
            table: raw,
            pages,
            termination,
        } = summary;
        if raw.is_empty() {
            return Err(match termination {
                FetchTermination::Failed { offset, error } => {
                    PipelineError::Fetch { offset, source: error }
                }
                FetchTermination::Exhausted => PipelineError::EmptyDataset { stage: "fetching" },
            });
        }

        let fetched = FetchedShape::of(&raw);
        let normalized = normalizer::normalize(raw)?;
        let invalid_rows = normalized.invalid_count();
        info!(invalid_rows, kept = normalized.table.len(), "dropped rows with nulls");

        let (table, birth_year) = derive::add_birth_year(normalized.table);
        let preview = preview(&table, self.preview_rows);

        let (table, ages) = derive::add_age_in_reference_year(table);
        info!(dropped = ages.rows_dropped, kept = table.len(), "filtered implausible ages");
        if table.is_empty() {
            return Err(PipelineError::EmptyDataset {
                stage: "age filtering",
            });
        }

        let table = report::assign_age_groups(table);
        let age_party = age_party::analyze(&table)?;

        let (table, latency_dates) = derive::add_latency(table);
        let latency = latency::analyze(&table);

        let districts = district::analyze(&table)?;

        Ok(BallotAnalysis {
            pages,
            termination,
            fetched,
            invalid_rows,
            birth_year,
            ages,
            latency_dates,
            preview,
            age_party,
            latency,
            districts,
            table,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchedShape {
    pub rows: usize,
    pub columns: usize,
}

impl FetchedShape {
    fn of(table: &RawTable) -> Self {
        Self {
            rows: table.len(),
            columns: table.headers().len(),
        }
    }
}

/// Everything one pipeline run produced. `Display` renders the full
/// plain-text report.
#[derive(Debug)]
pub struct BallotAnalysis {
    pub pages: usize,
    pub termination: FetchTermination,
    pub fetched: FetchedShape,
    pub invalid_rows: usize,
    pub birth_year: DeriveReport,
    pub ages: DeriveReport,
    pub latency_dates: DeriveReport,
    pub preview: String,
    pub age_party: AgePartyReport,
    pub latency: LatencyReport,
    pub districts: DistrictFrequencyReport,
    pub table: WorkingTable,
}

fn preview(table: &WorkingTable, rows: usize) -> String {
    let mut text = TextTable::new(table.column_names());
    for record in table.records().iter().take(rows) {
        text.push_row(
            table
                .columns()
                .iter()
                .map(|column| record.cell(column))
                .collect(),
        );
    }
    text.to_string()
}

fn rule(f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "{}", "-".repeat(RULE_WIDTH))
}

impl fmt::Display for BallotAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Number of records: {} rows x {} columns ({} page(s))",
            self.fetched.rows, self.fetched.columns, self.pages
        )?;
        if let FetchTermination::Failed { offset, error } = &self.termination {
            writeln!(
                f,
                "Warning: retrieval stopped at offset {offset} ({error}); results cover the rows fetched before it"
            )?;
        }
        rule(f)?;

        writeln!(f, "Stored the rows with null values as invalid records")?;
        writeln!(
            f,
            "Number of records that have a null value in at least one column: {}",
            self.invalid_rows
        )?;
        rule(f)?;

        writeln!(
            f,
            "Converted all state senate district (senate) entries to snake case, i.e. '29TH SENATORIAL DISTRICT' => '29th_senatorial_district'"
        )?;
        rule(f)?;

        writeln!(
            f,
            "Added new column for birth year of voter, appears next to dateofbirth column"
        )?;
        if self.birth_year.parse_failures > 0 {
            writeln!(
                f,
                "Birth dates that could not be parsed: {}",
                self.birth_year.parse_failures
            )?;
        }
        write!(f, "{}", self.preview)?;
        rule(f)?;

        writeln!(
            f,
            "Calculated ages of the voters and filtered out unrealistic ages (ages below {} and above {})",
            MIN_PLAUSIBLE_AGE, MAX_PLAUSIBLE_AGE
        )?;
        writeln!(f, "Records removed by the age filter: {}", self.ages.rows_dropped)?;
        write!(f, "{}", self.age_party)?;
        rule(f)?;

        if self.latency_dates.parse_failures > 0 {
            writeln!(
                f,
                "Issue/return dates that could not be parsed: {}",
                self.latency_dates.parse_failures
            )?;
        }
        write!(f, "{}", self.latency)?;
        rule(f)?;

        write!(f, "{}", self.districts)?;
        rule(f)?;

        writeln!(f)?;
        writeln!(f, "All analyses completed successfully!")
    }
}
