use super::domain::{HeaderMismatch, RawRow, RawTable};
use crate::config::SourceConfig;
use reqwest::blocking::Client;
use std::io::Read;
use std::num::NonZeroUsize;
use std::path::Path;
use tracing::{debug, info, warn};

/// Field values read as missing, on top of the empty field.
const NULL_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request for {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid CSV page: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to read CSV export: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Header(#[from] HeaderMismatch),
}

/// Anything that can hand out a bounded page of rows at an offset.
pub trait PageSource {
    fn fetch_page(&self, offset: usize, limit: usize) -> Result<RawTable, FetchError>;
}

/// Pages a Socrata-style CSV resource with `$limit` / `$offset`.
pub struct HttpPageSource {
    client: Client,
    base_url: String,
}

impl HttpPageSource {
    pub fn new(config: &SourceConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    pub fn page_url(&self, offset: usize, limit: usize) -> String {
        page_url(&self.base_url, offset, limit)
    }
}

impl PageSource for HttpPageSource {
    fn fetch_page(&self, offset: usize, limit: usize) -> Result<RawTable, FetchError> {
        let url = self.page_url(offset, limit);
        let http_error = |source| FetchError::Http {
            url: url.clone(),
            source,
        };

        let body = self
            .client
            .get(&url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.bytes())
            .map_err(http_error)?;

        Ok(parse_page(body.as_ref())?)
    }
}

pub(crate) fn page_url(base_url: &str, offset: usize, limit: usize) -> String {
    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{base_url}{separator}$limit={limit}&$offset={offset}")
}

/// A CSV export held in memory and served back in pages.
#[derive(Debug, Clone)]
pub struct CsvExportSource {
    table: RawTable,
}

impl CsvExportSource {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, FetchError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, FetchError> {
        Ok(Self {
            table: parse_page(reader)?,
        })
    }
}

impl PageSource for CsvExportSource {
    fn fetch_page(&self, offset: usize, limit: usize) -> Result<RawTable, FetchError> {
        let rows = self.table.rows();
        let start = offset.min(rows.len());
        let end = offset.saturating_add(limit).min(rows.len());
        Ok(RawTable::from_rows(
            self.table.headers().to_vec(),
            rows[start..end].to_vec(),
        ))
    }
}

/// Parses one CSV page with a header row. Empty fields and the usual
/// missing-value markers become `None`. Rows whose field count differs from
/// the header are kept as-is; the normalizer treats them as invalid.
pub fn parse_page<R: Read>(reader: R) -> Result<RawTable, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);
    let headers = csv_reader
        .headers()?
        .iter()
        .map(|header| header.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let row: RawRow = record.iter().map(null_aware).collect();
        rows.push(row);
    }

    Ok(RawTable::from_rows(headers, rows))
}

fn null_aware(value: &str) -> Option<String> {
    if value.is_empty() || NULL_TOKENS.contains(&value) {
        None
    } else {
        Some(value.to_string())
    }
}

/// Why pagination stopped.
#[derive(Debug)]
pub enum FetchTermination {
    /// A page came back with zero rows.
    Exhausted,
    /// A page could not be fetched or parsed; rows before it are kept.
    Failed { offset: usize, error: FetchError },
}

#[derive(Debug)]
pub struct FetchSummary {
    pub table: RawTable,
    pub pages: usize,
    pub termination: FetchTermination,
}

impl FetchSummary {
    pub fn is_complete(&self) -> bool {
        matches!(self.termination, FetchTermination::Exhausted)
    }
}

/// Pulls pages of `page_size` rows from offset zero until an empty page or
/// the first failure, concatenating them in arrival order. Failures are not
/// retried.
pub fn fetch_all<S: PageSource + ?Sized>(source: &S, page_size: NonZeroUsize) -> FetchSummary {
    let limit = page_size.get();
    let mut offset = 0usize;
    let mut pages = 0usize;
    let mut table = RawTable::default();

    let termination = loop {
        info!(offset, "retrieving rows");

        let page = match source.fetch_page(offset, limit) {
            Ok(page) => page,
            Err(error) => {
                warn!(offset, %error, "error while fetching page, stopping pagination");
                break FetchTermination::Failed { offset, error };
            }
        };

        if page.is_empty() {
            debug!(offset, "empty page, no more data");
            break FetchTermination::Exhausted;
        }

        let rows = page.len();
        if let Err(mismatch) = table.append(page) {
            warn!(offset, error = %mismatch, "page header changed, stopping pagination");
            break FetchTermination::Failed {
                offset,
                error: mismatch.into(),
            };
        }

        pages += 1;
        debug!(offset, rows, "page appended");
        offset += limit;
    };

    info!(pages, rows = table.len(), "pagination finished");

    FetchSummary {
        table,
        pages,
        termination,
    }
}
