use std::collections::BTreeMap;
use std::fmt::Write as _;

use itertools::Itertools;
use serde::Serialize;

use crate::config::Jurisdiction;
use crate::merge::CanonicalCollection;
use crate::record::{PersonName, Record};

/// Coverage numbers for the whole collection and per jurisdiction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total: usize,
    pub resolved: usize,
    pub vacant: usize,
    pub with_email: usize,
    pub with_phone: usize,
    pub flagged: usize,
    /// Resolved share, whole percent (dashboard figure).
    pub percent_rounded: u32,
    /// Resolved share to one decimal place.
    pub percent_resolved: f64,
    pub jurisdictions: Vec<JurisdictionStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JurisdictionStats {
    pub code: String,
    pub name: String,
    pub total: usize,
    pub resolved: usize,
    pub expected: Option<usize>,
    pub percent_resolved: f64,
}

impl JurisdictionStats {
    /// Subdivisions known to exist but absent from the collection.
    pub fn missing(&self) -> Option<usize> {
        self.expected.map(|e| e.saturating_sub(self.total))
    }
}

pub fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

fn one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Compute coverage. `known` supplies names and expected subdivision counts;
/// jurisdictions listed there but without records still get a zero row.
pub fn report(collection: &CanonicalCollection, known: &[Jurisdiction]) -> Stats {
    let records = collection.records();

    let total = records.len();
    let resolved = records.iter().filter(|r| r.person_name.is_resolved()).count();
    let vacant = records
        .iter()
        .filter(|r| r.person_name == PersonName::Vacant)
        .count();
    let with_email = records.iter().filter(|r| r.has_email()).count();
    let with_phone = records.iter().filter(|r| r.has_phone()).count();
    let flagged = records.iter().filter(|r| r.needs_verification()).count();
    let pct = percent(resolved, total);

    Stats {
        total,
        resolved,
        vacant,
        with_email,
        with_phone,
        flagged,
        percent_rounded: pct.round() as u32,
        percent_resolved: one_decimal(pct),
        jurisdictions: per_jurisdiction(&records, known),
    }
}

fn per_jurisdiction(records: &[&Record], known: &[Jurisdiction]) -> Vec<JurisdictionStats> {
    let mut rows: BTreeMap<String, JurisdictionStats> = known
        .iter()
        .map(|j| {
            let code = j.code.to_ascii_uppercase();
            let row = JurisdictionStats {
                code: code.clone(),
                name: j.name.clone(),
                total: 0,
                resolved: 0,
                expected: j.subdivisions,
                percent_resolved: 0.0,
            };
            (code, row)
        })
        .collect();

    // Records arrive sorted by code, so consecutive grouping is complete.
    for (code, group) in &records.iter().group_by(|r| r.jurisdiction_code.clone()) {
        let group: Vec<&&Record> = group.collect();
        let resolved = group.iter().filter(|r| r.person_name.is_resolved()).count();
        let row = rows.entry(code.clone()).or_insert_with(|| JurisdictionStats {
            code,
            name: group[0].jurisdiction_name.clone(),
            total: 0,
            resolved: 0,
            expected: None,
            percent_resolved: 0.0,
        });
        row.total = group.len();
        row.resolved = resolved;
        row.percent_resolved = one_decimal(percent(resolved, group.len()));
    }

    rows.into_values().collect()
}

/// Plain-text summary for the terminal. `detail` adds the per-jurisdiction table.
pub fn render(stats: &Stats, detail: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "County chair coverage");
    let _ = writeln!(out, "  Records:          {}", stats.total);
    let _ = writeln!(
        out,
        "  Resolved:         {} ({}%)",
        stats.resolved, stats.percent_rounded
    );
    let _ = writeln!(out, "  Vacant:           {}", stats.vacant);
    let _ = writeln!(
        out,
        "  Placeholders:     {}",
        stats.total - stats.resolved - stats.vacant
    );
    let _ = writeln!(out, "  With email:       {}", stats.with_email);
    let _ = writeln!(out, "  With phone:       {}", stats.with_phone);
    let _ = writeln!(out, "  Need verification: {}", stats.flagged);

    if detail {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:<4} {:<22} {:>7} {:>8} {:>8} {:>7} {:>7}",
            "Code", "Jurisdiction", "Records", "Resolved", "Expected", "Missing", "Pct"
        );
        let _ = writeln!(out, "{}", "-".repeat(70));
        for j in &stats.jurisdictions {
            let _ = writeln!(
                out,
                "{:<4} {:<22} {:>7} {:>8} {:>8} {:>7} {:>6.1}%",
                j.code,
                j.name,
                j.total,
                j.resolved,
                j.expected.map(|e| e.to_string()).unwrap_or_else(|| "-".into()),
                j.missing().map(|m| m.to_string()).unwrap_or_else(|| "-".into()),
                j.percent_resolved
            );
        }
        let _ = writeln!(out, "{}", "-".repeat(70));
        let _ = writeln!(
            out,
            "Overall: {}/{} resolved ({:.1}%)",
            stats.resolved, stats.total, stats.percent_resolved
        );
    }
    out
}
