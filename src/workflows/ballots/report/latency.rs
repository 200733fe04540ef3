use super::stats;
use super::TextTable;
use crate::workflows::ballots::domain::WorkingTable;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct DistrictLatency {
    pub district: String,
    pub median_days: f64,
    pub ballot_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LatencyReport {
    pub valid: usize,
    pub excluded: usize,
    /// Sorted by ascending median, then district.
    pub districts: Vec<DistrictLatency>,
}

/// Median issue-to-return latency per legislative district. Rows without a
/// latency, or with a negative one, only drop out of this aggregation.
pub fn analyze(table: &WorkingTable) -> LatencyReport {
    let mut by_district: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    let mut valid = 0usize;

    for record in table.records() {
        let Some(days) = record.latency_days.filter(|days| *days >= 0) else {
            continue;
        };
        valid += 1;
        by_district
            .entry(record.legislative.as_str())
            .or_default()
            .push(days as f64);
    }

    let mut districts: Vec<DistrictLatency> = by_district
        .into_iter()
        .filter_map(|(district, days)| {
            Some(DistrictLatency {
                district: district.to_string(),
                median_days: stats::median(&days)?,
                ballot_count: days.len(),
            })
        })
        .collect();
    districts.sort_by(|a, b| {
        a.median_days
            .total_cmp(&b.median_days)
            .then_with(|| a.district.cmp(&b.district))
    });

    LatencyReport {
        valid,
        excluded: table.len() - valid,
        districts,
    }
}

impl fmt::Display for LatencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Records with valid application and return dates: {}",
            stats::thousands(self.valid)
        )?;
        writeln!(
            f,
            "Records excluded due to missing/invalid dates: {}",
            stats::thousands(self.excluded)
        )?;
        writeln!(f)?;

        writeln!(f, "MEDIAN LATENCY BY LEGISLATIVE DISTRICT (sorted by median):")?;
        let mut table = TextTable::new(["District", "Median Days", "Count"]);
        for entry in &self.districts {
            table.push_row(vec![
                entry.district.clone(),
                format!("{:.1}", entry.median_days),
                stats::thousands(entry.ballot_count),
            ]);
        }
        write!(f, "{table}")
    }
}
