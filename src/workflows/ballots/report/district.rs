use super::stats::{self, Share};
use super::{ReportError, TextTable};
use crate::workflows::ballots::domain::WorkingTable;
use std::fmt;

pub const TOP_DISTRICTS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct DistrictFrequencyReport {
    pub total_requests: usize,
    /// Every congressional district, most requests first.
    pub districts: Vec<Share>,
}

impl DistrictFrequencyReport {
    pub fn top(&self, n: usize) -> &[Share] {
        &self.districts[..n.min(self.districts.len())]
    }

    pub fn top_district(&self) -> Option<&Share> {
        self.districts.first()
    }
}

/// Ballot requests per congressional district.
pub fn analyze(table: &WorkingTable) -> Result<DistrictFrequencyReport, ReportError> {
    if table.is_empty() {
        return Err(ReportError::EmptyTable("congressional district"));
    }

    let districts = stats::frequencies(
        table
            .records()
            .iter()
            .map(|record| record.congressional.as_str()),
    );

    Ok(DistrictFrequencyReport {
        total_requests: table.len(),
        districts,
    })
}

impl fmt::Display for DistrictFrequencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CONGRESSIONAL DISTRICT WITH HIGHEST BALLOT REQUEST FREQUENCY")?;
        writeln!(f, "Total congressional districts: {}", self.districts.len())?;
        writeln!(
            f,
            "Total ballot requests analyzed: {}",
            stats::thousands(self.total_requests)
        )?;
        writeln!(f)?;

        writeln!(
            f,
            "TOP {TOP_DISTRICTS} CONGRESSIONAL DISTRICTS BY BALLOT REQUEST FREQUENCY:"
        )?;
        let mut table = TextTable::new(["District", "Count", "Percent", "Rank"]);
        for (rank, share) in self.top(TOP_DISTRICTS).iter().enumerate() {
            table.push_row(vec![
                share.label.clone(),
                stats::thousands(share.count),
                format!("{:.2}%", share.percent),
                (rank + 1).to_string(),
            ]);
        }
        write!(f, "{table}")?;
        writeln!(f)?;

        let Some(top) = self.top_district() else {
            return Ok(());
        };
        writeln!(
            f,
            "Congressional District {} has the highest frequency of ballot requests",
            top.label
        )?;
        writeln!(f, "-> Total requests: {}", stats::thousands(top.count))?;
        writeln!(f, "-> Percentage of all requests: {:.2}%", top.percent)
    }
}
