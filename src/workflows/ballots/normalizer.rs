use super::domain::{BallotApplication, BallotField, Column, RawRow, RawTable, WorkingTable};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("required column '{0}' is missing from the dataset")]
    MissingColumn(&'static str),
}

/// Working table plus the rows dropped for carrying a null.
#[derive(Debug)]
pub struct NormalizedTable {
    pub table: WorkingTable,
    pub invalid: Vec<RawRow>,
}

impl NormalizedTable {
    pub fn invalid_count(&self) -> usize {
        self.invalid.len()
    }
}

/// Lowercases a district label and joins its space-separated parts with
/// underscores. Missing values pass through untouched.
pub fn to_snake_case(value: Option<&str>) -> Option<String> {
    value.map(|word| word.to_lowercase().replace(' ', "_"))
}

/// Snake-cases `senate`, diverts every row holding a null in any column to
/// `invalid`, and types the rest.
pub fn normalize(raw: RawTable) -> Result<NormalizedTable, NormalizeError> {
    let (headers, rows) = raw.into_parts();
    let columns = layout(&headers)?;
    let senate_index = columns
        .iter()
        .position(|column| *column == Column::Field(BallotField::Senate))
        .ok_or(NormalizeError::MissingColumn(BallotField::Senate.column_name()))?;

    let mut records = Vec::with_capacity(rows.len());
    let mut invalid = Vec::new();

    for mut row in rows {
        if let Some(cell) = row.get_mut(senate_index) {
            *cell = to_snake_case(cell.as_deref());
        }

        match to_record(&columns, &row) {
            Some(record) => records.push(record),
            None => invalid.push(row),
        }
    }

    Ok(NormalizedTable {
        table: WorkingTable::new(columns, records),
        invalid,
    })
}

fn layout(headers: &[String]) -> Result<Vec<Column>, NormalizeError> {
    let mut columns = Vec::with_capacity(headers.len());
    let mut slot = 0;

    for header in headers {
        let field = BallotField::from_column_name(header)
            .filter(|field| !columns.contains(&Column::Field(*field)));
        match field {
            Some(field) => columns.push(Column::Field(field)),
            None => {
                columns.push(Column::Passthrough {
                    name: header.clone(),
                    slot,
                });
                slot += 1;
            }
        }
    }

    for field in BallotField::ordered() {
        if !columns.contains(&Column::Field(field)) {
            return Err(NormalizeError::MissingColumn(field.column_name()));
        }
    }

    Ok(columns)
}

fn to_record(columns: &[Column], row: &RawRow) -> Option<BallotApplication> {
    if row.len() != columns.len() || row.iter().any(Option::is_none) {
        return None;
    }

    let mut record = BallotApplication {
        date_of_birth: String::new(),
        senate: String::new(),
        legislative: String::new(),
        congressional: String::new(),
        party: String::new(),
        app_issue_date: String::new(),
        ballot_returned_date: String::new(),
        passthrough: Vec::new(),
        birth_date: None,
        issued_at: None,
        returned_at: None,
        yr_born: None,
        age_in_2020: None,
        age_group: None,
        latency_days: None,
    };

    for (column, cell) in columns.iter().zip(row) {
        let value = cell.clone()?;
        match column {
            Column::Field(BallotField::DateOfBirth) => record.date_of_birth = value,
            Column::Field(BallotField::Senate) => record.senate = value,
            Column::Field(BallotField::Legislative) => record.legislative = value,
            Column::Field(BallotField::Congressional) => record.congressional = value,
            Column::Field(BallotField::Party) => record.party = value,
            Column::Field(BallotField::AppIssueDate) => record.app_issue_date = value,
            Column::Field(BallotField::BallotReturnedDate) => {
                record.ballot_returned_date = value
            }
            _ => record.passthrough.push(value),
        }
    }

    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADERS: [&str; 8] = [
        "countyname",
        "dateofbirth",
        "senate",
        "legislative",
        "congressional",
        "party",
        "appissuedate",
        "ballotreturneddate",
    ];

    fn raw(rows: &[[Option<&str>; 8]]) -> RawTable {
        RawTable::from_rows(
            HEADERS.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|cell| cell.map(str::to_string)).collect())
                .collect(),
        )
    }

    fn complete(county: &'static str, senate: &'static str) -> [Option<&'static str>; 8] {
        [
            Some(county),
            Some("1990-05-14T00:00:00.000"),
            Some(senate),
            Some("10TH LEGISLATIVE DISTRICT"),
            Some("3RD CONGRESSIONAL DISTRICT"),
            Some("DEM"),
            Some("2020-09-01T00:00:00.000"),
            Some("2020-09-10T00:00:00.000"),
        ]
    }

    #[test]
    fn snake_case_lowercases_and_joins_words() {
        assert_eq!(
            to_snake_case(Some("29TH SENATORIAL DISTRICT")).as_deref(),
            Some("29th_senatorial_district")
        );
        assert_eq!(to_snake_case(None), None);
    }

    #[test]
    fn rows_with_any_null_are_diverted() {
        let mut partial = complete("ADAMS", "33RD SENATORIAL DISTRICT");
        partial[0] = None;
        let mut missing_senate = complete("BERKS", "11TH SENATORIAL DISTRICT");
        missing_senate[2] = None;

        let normalized = normalize(raw(&[
            complete("ADAMS", "33RD SENATORIAL DISTRICT"),
            partial,
            missing_senate,
        ]))
        .expect("normalizes");

        assert_eq!(normalized.table.len(), 1);
        assert_eq!(normalized.invalid_count(), 2);
        let record = &normalized.table.records()[0];
        assert_eq!(record.senate, "33rd_senatorial_district");
        assert_eq!(record.passthrough, vec!["ADAMS".to_string()]);
    }

    #[test]
    fn short_rows_are_diverted_with_the_nulls() {
        let (headers, mut rows) = raw(&[
            complete("ADAMS", "33RD SENATORIAL DISTRICT"),
            complete("BUCKS", "6TH SENATORIAL DISTRICT"),
        ])
        .into_parts();
        rows.insert(1, vec![Some("BERKS".into()), Some("1970-01-01".into())]);

        let normalized = normalize(RawTable::from_rows(headers, rows)).expect("normalizes");
        assert_eq!(normalized.table.len(), 2);
        assert_eq!(normalized.invalid_count(), 1);
        assert_eq!(normalized.invalid[0].len(), 2);
    }

    #[test]
    fn missing_required_column_is_rejected() {
        let table = RawTable::from_rows(vec!["party".into()], vec![vec![Some("DEM".into())]]);
        let error = normalize(table).expect_err("missing columns");
        assert_eq!(error, NormalizeError::MissingColumn("dateofbirth"));
    }

    #[test]
    fn columns_keep_source_order() {
        let normalized = normalize(raw(&[complete("ADAMS", "1ST SENATORIAL DISTRICT")]))
            .expect("normalizes");
        assert_eq!(normalized.table.column_names(), HEADERS.to_vec());
    }

    #[test]
    fn normalizing_twice_changes_nothing() {
        let first = normalize(raw(&[
            complete("ADAMS", "29TH SENATORIAL DISTRICT"),
            complete("BUCKS", "6TH SENATORIAL DISTRICT"),
        ]))
        .expect("first pass");
        let second = normalize(first.table.to_raw()).expect("second pass");

        assert_eq!(second.invalid_count(), 0);
        assert_eq!(second.table, first.table);
    }
}
