use ballot_insights::workflows::ballots::domain::RawTable;
use ballot_insights::workflows::ballots::fetch::{FetchTermination, PageSource};
use ballot_insights::workflows::ballots::normalizer::NormalizeError;
use ballot_insights::workflows::ballots::{
    AgeGroup, BallotPipeline, CsvExportSource, FetchError, PipelineError,
};
use std::io::Write;
use std::num::NonZeroUsize;

const FIXTURE: &str = include_str!("fixtures/ballot_applications.csv");

fn page_size(rows: usize) -> NonZeroUsize {
    NonZeroUsize::new(rows).expect("non-zero page size")
}

fn fixture_source() -> CsvExportSource {
    CsvExportSource::from_reader(FIXTURE.as_bytes()).expect("fixture parses")
}

/// Serves the fixture but fails every request past `fail_from`.
struct FlakySource {
    inner: CsvExportSource,
    fail_from: usize,
}

impl PageSource for FlakySource {
    fn fetch_page(&self, offset: usize, limit: usize) -> Result<RawTable, FetchError> {
        if offset >= self.fail_from {
            return Err(FetchError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }
        self.inner.fetch_page(offset, limit)
    }
}

#[test]
fn pipeline_cleans_fixture_and_reports() {
    let analysis = BallotPipeline::new(page_size(5))
        .run(&fixture_source())
        .expect("pipeline runs");

    assert!(matches!(analysis.termination, FetchTermination::Exhausted));
    assert_eq!(analysis.pages, 3);
    assert_eq!(analysis.fetched.rows, 12);
    assert_eq!(analysis.fetched.columns, 9);
    assert_eq!(analysis.invalid_rows, 2);
    assert_eq!(analysis.birth_year.parse_failures, 1);
    assert_eq!(analysis.ages.rows_dropped, 3);
    assert_eq!(analysis.table.len(), 7);

    assert!(analysis
        .table
        .records()
        .iter()
        .all(|record| record.senate.chars().all(|c| !c.is_ascii_uppercase() && c != ' ')));
}

#[test]
fn birth_year_sits_next_to_date_of_birth() {
    let analysis = BallotPipeline::new(page_size(50))
        .run(&fixture_source())
        .expect("pipeline runs");

    let names = analysis.table.column_names();
    let dob = names
        .iter()
        .position(|name| *name == "dateofbirth")
        .expect("dateofbirth column");
    assert_eq!(names[dob + 1], "yr_born");
    assert_eq!(analysis.table.records()[0].yr_born, Some(1990));
    assert_eq!(analysis.table.records()[0].age_in_2020, Some(30));

    let preview_header = analysis.preview.lines().next().expect("preview header");
    let headings: Vec<_> = preview_header.split_whitespace().collect();
    let dob = headings
        .iter()
        .position(|name| *name == "dateofbirth")
        .expect("dateofbirth in preview");
    assert_eq!(headings[dob + 1], "yr_born");
    assert_eq!(analysis.preview.lines().count(), 6);
}

#[test]
fn age_party_report_matches_fixture() {
    let analysis = BallotPipeline::new(page_size(50))
        .run(&fixture_source())
        .expect("pipeline runs");
    let report = &analysis.age_party;

    assert_eq!(report.total, 7);
    assert_eq!((report.min_age, report.max_age), (21, 90));
    assert_eq!(report.parties[0].label, "D");
    assert_eq!(report.parties[0].count, 4);
    assert_eq!(report.insights.top_age_group.group, AgeGroup::Thirties);
    assert_eq!(report.insights.oldest_party.party, "R");
    assert_eq!(report.insights.youngest_party.party, "D");
    assert!((report.insights.seniors_percent - 300.0 / 7.0).abs() < 1e-9);
}

#[test]
fn latency_report_excludes_negative_rows_only() {
    let analysis = BallotPipeline::new(page_size(50))
        .run(&fixture_source())
        .expect("pipeline runs");
    let latency = &analysis.latency;

    assert_eq!(latency.valid, 6);
    assert_eq!(latency.excluded, 1);
    assert_eq!(analysis.table.len(), 7);

    let ordered: Vec<_> = latency
        .districts
        .iter()
        .map(|entry| (entry.district.as_str(), entry.median_days))
        .collect();
    assert_eq!(
        ordered,
        vec![
            ("126TH LEGISLATIVE DISTRICT", 5.0),
            ("23RD LEGISLATIVE DISTRICT", 6.0),
            ("91ST LEGISLATIVE DISTRICT", 9.0),
            ("18TH LEGISLATIVE DISTRICT", 10.0),
        ]
    );
}

#[test]
fn district_report_highlights_busiest_district() {
    let analysis = BallotPipeline::new(page_size(50))
        .run(&fixture_source())
        .expect("pipeline runs");
    let top = analysis.districts.top_district().expect("top district");

    assert_eq!(top.label, "18TH CONGRESSIONAL DISTRICT");
    assert_eq!(top.count, 3);
    assert_eq!(analysis.districts.districts.len(), 5);
}

#[test]
fn fetch_failure_truncates_but_pipeline_completes() {
    let source = FlakySource {
        inner: fixture_source(),
        fail_from: 6,
    };
    let analysis = BallotPipeline::new(page_size(6))
        .run(&source)
        .expect("pipeline runs on partial data");

    assert_eq!(analysis.fetched.rows, 6);
    assert!(matches!(
        analysis.termination,
        FetchTermination::Failed { offset: 6, .. }
    ));
    assert!(analysis
        .to_string()
        .contains("Warning: retrieval stopped at offset 6"));
}

#[test]
fn rendered_report_covers_every_section() {
    let rendered = BallotPipeline::new(page_size(50))
        .run(&fixture_source())
        .expect("pipeline runs")
        .to_string();

    for section in [
        "Number of records: 12 rows x 9 columns",
        "Number of records that have a null value in at least one column: 2",
        "AGE GROUP BY PARTY in %",
        "KEY INSIGHTS:",
        "MEDIAN LATENCY BY LEGISLATIVE DISTRICT (sorted by median):",
        "Congressional District 18TH CONGRESSIONAL DISTRICT has the highest frequency",
        "All analyses completed successfully!",
    ] {
        assert!(rendered.contains(section), "missing section: {section}");
    }
}

#[test]
fn csv_export_can_be_read_from_disk() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(FIXTURE.as_bytes()).expect("write fixture");

    let source = CsvExportSource::from_path(file.path()).expect("export loads");
    let analysis = BallotPipeline::new(page_size(50))
        .run(&source)
        .expect("pipeline runs");
    assert_eq!(analysis.fetched.rows, 12);
}

#[test]
fn empty_dataset_is_reported() {
    let source = CsvExportSource::from_reader(
        "dateofbirth,senate,legislative,congressional,party,appissuedate,ballotreturneddate\n"
            .as_bytes(),
    )
    .expect("header-only export");
    let error = BallotPipeline::new(page_size(10))
        .run(&source)
        .expect_err("nothing to analyze");
    assert!(matches!(
        error,
        PipelineError::EmptyDataset { stage: "fetching" }
    ));
}

#[test]
fn dataset_without_plausible_ages_is_reported() {
    let csv = "dateofbirth,senate,legislative,congressional,party,appissuedate,ballotreturneddate\n\
2015-01-01,1ST SENATORIAL DISTRICT,1,1,D,2020-09-01,2020-09-05\n";
    let source = CsvExportSource::from_reader(csv.as_bytes()).expect("export parses");
    let error = BallotPipeline::new(page_size(10))
        .run(&source)
        .expect_err("no plausible ages");
    assert!(matches!(
        error,
        PipelineError::EmptyDataset {
            stage: "age filtering"
        }
    ));
}

#[test]
fn missing_required_column_is_fatal() {
    let source = CsvExportSource::from_reader("party\nD\n".as_bytes()).expect("export parses");
    let error = BallotPipeline::new(page_size(10))
        .run(&source)
        .expect_err("missing columns");
    assert!(matches!(
        error,
        PipelineError::Normalize(NormalizeError::MissingColumn("dateofbirth"))
    ));
}

#[test]
fn short_row_counts_as_invalid_without_stopping_pagination() {
    let mut lines = FIXTURE.lines();
    let header = lines.next().expect("fixture header");
    let mut csv = format!("{header}\n");
    for (index, line) in lines.enumerate() {
        if index == 3 {
            csv.push_str("ADAMS,2020-08-28T00:00:00.000,1988-01-01T00:00:00.000\n");
        }
        csv.push_str(line);
        csv.push('\n');
    }

    let source = CsvExportSource::from_reader(csv.as_bytes()).expect("ragged export parses");
    let analysis = BallotPipeline::new(page_size(5))
        .run(&source)
        .expect("pipeline runs");

    assert!(matches!(analysis.termination, FetchTermination::Exhausted));
    assert_eq!(analysis.fetched.rows, 13);
    assert_eq!(analysis.invalid_rows, 3);
    assert_eq!(analysis.table.len(), 7);
}

#[test]
fn failed_first_request_reports_its_cause() {
    let source = FlakySource {
        inner: fixture_source(),
        fail_from: 0,
    };
    let error = BallotPipeline::new(page_size(5))
        .run(&source)
        .expect_err("nothing fetched");

    assert!(matches!(
        error,
        PipelineError::Fetch {
            offset: 0,
            source: FetchError::Io(_)
        }
    ));
    assert!(error.to_string().contains("connection reset by peer"));
}
