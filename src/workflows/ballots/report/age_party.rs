use super::stats::{self, Share};
use super::{ReportError, TextTable};
use crate::workflows::ballots::domain::{AgeGroup, Column, WorkingTable};
use std::collections::BTreeMap;
use std::fmt;

/// Age from which a voter counts as a senior in the insights.
pub const SENIOR_AGE: i32 = 65;

#[derive(Debug, Clone, PartialEq)]
pub struct AgeGroupShare {
    pub group: AgeGroup,
    pub count: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrossTabRow {
    pub group: AgeGroup,
    /// One count per party, in `CrossTab::parties` order.
    pub counts: Vec<usize>,
    pub total: usize,
}

impl CrossTabRow {
    pub fn percentages(&self) -> Vec<f64> {
        self.counts
            .iter()
            .map(|count| stats::percent(*count, self.total))
            .collect()
    }
}

/// Age group x party counts. Parties are in label order and empty age
/// groups are left out.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossTab {
    pub parties: Vec<String>,
    pub rows: Vec<CrossTabRow>,
}

impl CrossTab {
    pub fn party_totals(&self) -> Vec<usize> {
        let mut totals = vec![0; self.parties.len()];
        for row in &self.rows {
            for (total, count) in totals.iter_mut().zip(&row.counts) {
                *total += count;
            }
        }
        totals
    }

    pub fn grand_total(&self) -> usize {
        self.rows.iter().map(|row| row.total).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartyAgeStats {
    pub party: String,
    pub mean: f64,
    pub median: f64,
    /// Undefined for a party with a single voter.
    pub std_dev: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyInsights {
    pub top_party: Share,
    pub top_age_group: AgeGroupShare,
    pub oldest_party: PartyAgeStats,
    pub youngest_party: PartyAgeStats,
    pub seniors_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgePartyReport {
    pub total: usize,
    pub min_age: i32,
    pub max_age: i32,
    pub parties: Vec<Share>,
    pub age_groups: Vec<AgeGroupShare>,
    pub crosstab: CrossTab,
    pub age_by_party: Vec<PartyAgeStats>,
    pub insights: KeyInsights,
}

/// Buckets every record's age and adds the `age_group` working column.
pub fn assign_age_groups(mut table: WorkingTable) -> WorkingTable {
    for record in table.records_mut() {
        record.age_group = record.age_in_2020.and_then(AgeGroup::for_age);
    }
    table.push_column(Column::AgeGroup);
    table
}

pub fn analyze(table: &WorkingTable) -> Result<AgePartyReport, ReportError> {
    let empty = || ReportError::EmptyTable("age/party");

    let voters: Vec<(i32, AgeGroup, &str)> = table
        .records()
        .iter()
        .filter_map(|record| {
            let age = record.age_in_2020?;
            let group = record.age_group.or_else(|| AgeGroup::for_age(age))?;
            Some((age, group, record.party.as_str()))
        })
        .collect();

    let total = voters.len();
    let min_age = voters.iter().map(|(age, _, _)| *age).min().ok_or_else(empty)?;
    let max_age = voters.iter().map(|(age, _, _)| *age).max().ok_or_else(empty)?;

    let parties = stats::frequencies(voters.iter().map(|(_, _, party)| *party));

    let age_groups: Vec<AgeGroupShare> = AgeGroup::ordered()
        .into_iter()
        .map(|group| {
            let count = voters.iter().filter(|(_, g, _)| *g == group).count();
            AgeGroupShare {
                group,
                count,
                percent: stats::percent(count, total),
            }
        })
        .collect();

    let crosstab = cross_tabulate(&voters);
    let age_by_party = age_by_party(&voters);

    let seniors = voters
        .iter()
        .filter(|(age, _, _)| *age >= SENIOR_AGE)
        .count();

    let top_party = parties.first().cloned().ok_or_else(empty)?;
    let top_age_group = age_groups
        .iter()
        .fold(None::<&AgeGroupShare>, |best, share| match best {
            Some(current) if current.count >= share.count => Some(current),
            _ => Some(share),
        })
        .cloned()
        .ok_or_else(empty)?;
    let oldest_party = extreme_mean(&age_by_party, |candidate, current| candidate > current)
        .ok_or_else(empty)?;
    let youngest_party = extreme_mean(&age_by_party, |candidate, current| candidate < current)
        .ok_or_else(empty)?;

    let insights = KeyInsights {
        top_party,
        top_age_group,
        oldest_party,
        youngest_party,
        seniors_percent: stats::percent(seniors, total),
    };

    Ok(AgePartyReport {
        total,
        min_age,
        max_age,
        parties,
        age_groups,
        crosstab,
        age_by_party,
        insights,
    })
}

fn cross_tabulate(voters: &[(i32, AgeGroup, &str)]) -> CrossTab {
    let mut parties: Vec<String> = voters
        .iter()
        .map(|(_, _, party)| party.to_string())
        .collect();
    parties.sort();
    parties.dedup();

    let rows = AgeGroup::ordered()
        .into_iter()
        .filter_map(|group| {
            let counts: Vec<usize> = parties
                .iter()
                .map(|party| {
                    voters
                        .iter()
                        .filter(|(_, g, p)| *g == group && *p == party.as_str())
                        .count()
                })
                .collect();
            let total: usize = counts.iter().sum();
            (total > 0).then_some(CrossTabRow {
                group,
                counts,
                total,
            })
        })
        .collect();

    CrossTab { parties, rows }
}

fn age_by_party(voters: &[(i32, AgeGroup, &str)]) -> Vec<PartyAgeStats> {
    let mut ages: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for (age, _, party) in voters {
        ages.entry(*party).or_default().push(f64::from(*age));
    }

    ages.into_iter()
        .filter_map(|(party, ages)| {
            Some(PartyAgeStats {
                party: party.to_string(),
                mean: stats::mean(&ages)?,
                median: stats::median(&ages)?,
                std_dev: stats::sample_std_dev(&ages),
            })
        })
        .collect()
}

/// First party whose mean beats every other under `better`.
fn extreme_mean<F>(entries: &[PartyAgeStats], better: F) -> Option<PartyAgeStats>
where
    F: Fn(f64, f64) -> bool,
{
    let mut best: Option<&PartyAgeStats> = None;
    for candidate in entries {
        match best {
            Some(current) if !better(candidate.mean, current.mean) => {}
            _ => best = Some(candidate),
        }
    }
    best.cloned()
}

fn one_decimal(value: f64) -> String {
    format!("{value:.1}")
}

impl fmt::Display for AgePartyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ANALYSIS: Age and Party VS votes by mail requests")?;

        writeln!(f, "INITIAL STATISTICS")?;
        writeln!(f, "Total mail requests: {}", stats::thousands(self.total))?;
        writeln!(f, "Age range: {} to {} years", self.min_age, self.max_age)?;

        writeln!(f, "PARTY DESIGNATIONS")?;
        for share in &self.parties {
            writeln!(
                f,
                "{}: {} ({:.1}%)",
                share.label,
                stats::thousands(share.count),
                share.percent
            )?;
        }
        writeln!(f)?;

        writeln!(f, "AGE BREAKDOWN")?;
        for share in &self.age_groups {
            writeln!(
                f,
                "{}: {} ({:.1}%)",
                share.group,
                stats::thousands(share.count),
                share.percent
            )?;
        }
        writeln!(f)?;

        writeln!(f, "AGE GROUP BY PARTY")?;
        let mut counts = TextTable::new(
            std::iter::once("age_group".to_string())
                .chain(self.crosstab.parties.iter().cloned())
                .chain(std::iter::once("All".to_string())),
        );
        for row in &self.crosstab.rows {
            counts.push_row(
                std::iter::once(row.group.to_string())
                    .chain(row.counts.iter().map(usize::to_string))
                    .chain(std::iter::once(row.total.to_string()))
                    .collect(),
            );
        }
        counts.push_row(
            std::iter::once("All".to_string())
                .chain(self.crosstab.party_totals().iter().map(usize::to_string))
                .chain(std::iter::once(self.crosstab.grand_total().to_string()))
                .collect(),
        );
        write!(f, "{counts}")?;
        writeln!(f)?;

        writeln!(f, "AGE GROUP BY PARTY in %")?;
        let mut shares = TextTable::new(
            std::iter::once("age_group".to_string()).chain(self.crosstab.parties.iter().cloned()),
        );
        for row in &self.crosstab.rows {
            shares.push_row(
                std::iter::once(row.group.to_string())
                    .chain(row.percentages().into_iter().map(one_decimal))
                    .collect(),
            );
        }
        write!(f, "{shares}")?;
        writeln!(f)?;

        writeln!(f, "AVERAGE AGE BY PARTY:")?;
        let mut averages = TextTable::new(["party", "mean", "median", "std"]);
        for entry in &self.age_by_party {
            averages.push_row(vec![
                entry.party.clone(),
                one_decimal(entry.mean),
                one_decimal(entry.median),
                entry.std_dev.map_or_else(|| "NaN".to_string(), one_decimal),
            ]);
        }
        write!(f, "{averages}")?;
        writeln!(f)?;

        let insights = &self.insights;
        writeln!(f, "KEY INSIGHTS:")?;
        writeln!(
            f,
            "-> {} had the most mail ballot requests ({:.1}% of total)",
            insights.top_party.label, insights.top_party.percent
        )?;
        writeln!(
            f,
            "-> Age group {} had the most requests ({:.1}% of total)",
            insights.top_age_group.group, insights.top_age_group.percent
        )?;
        writeln!(
            f,
            "-> {} voters had the highest average age ({:.1} years)",
            insights.oldest_party.party, insights.oldest_party.mean
        )?;
        writeln!(
            f,
            "-> {} voters had the lowest average age ({:.1} years)",
            insights.youngest_party.party, insights.youngest_party.mean
        )?;
        writeln!(
            f,
            "-> {:.1}% of mail ballot requests came from voters {} and older",
            insights.seniors_percent, SENIOR_AGE
        )
    }
}
