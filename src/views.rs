use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::merge::CanonicalCollection;
use crate::record::Record;

/// One row of the jurisdiction index written alongside the records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JurisdictionSummary {
    pub code: String,
    pub name: String,
    pub records: usize,
    pub resolved: usize,
}

/// Jurisdictions present in the collection, by code.
pub fn jurisdictions(collection: &CanonicalCollection) -> Vec<JurisdictionSummary> {
    collection
        .records()
        .into_iter()
        .group_by(|r| r.jurisdiction_code.clone())
        .into_iter()
        .map(|(code, group)| {
            let group: Vec<&Record> = group.collect();
            JurisdictionSummary {
                name: group[0].jurisdiction_name.clone(),
                records: group.len(),
                resolved: group.iter().filter(|r| r.person_name.is_resolved()).count(),
                code,
            }
        })
        .collect()
}

pub fn by_jurisdiction<'a>(collection: &'a CanonicalCollection, code: &str) -> Vec<&'a Record> {
    let code = code.trim();
    collection
        .records()
        .into_iter()
        .filter(|r| r.jurisdiction_code.eq_ignore_ascii_case(code))
        .collect()
}

/// Case-insensitive substring match over person, subdivision, jurisdiction
/// name and code. A blank query matches nothing.
pub fn search<'a>(collection: &'a CanonicalCollection, query: &str) -> Vec<&'a Record> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    collection
        .records()
        .into_iter()
        .filter(|r| {
            [
                r.person_name.as_str(),
                r.subdivision_name.as_str(),
                r.jurisdiction_name.as_str(),
                r.jurisdiction_code.as_str(),
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{PersonName, RecordDraft};
    use chrono::NaiveDate;

    fn rec(code: &str, name: &str, subdivision: &str, person: &str) -> Record {
        let mut draft = RecordDraft::new(
            code,
            name,
            subdivision,
            NaiveDate::from_ymd_opt(2025, 12, 27).unwrap(),
        );
        draft.person_name = PersonName::parse(person);
        draft.source_url = Some("https://example.gop".into());
        draft.into_record().unwrap()
    }

    fn sample() -> CanonicalCollection {
        CanonicalCollection::from_records([
            rec("VA", "Virginia", "York County", "Jane Doe"),
            rec("VA", "Virginia", "Accomack County", "TBD"),
            rec("LA", "Louisiana", "Acadia Parish", "Mike Smith"),
            rec("MS", "Mississippi", "DeSoto County", "Shannon Bibbee"),
        ])
    }

    #[test]
    fn jurisdiction_counts() {
        let rows = jurisdictions(&sample());
        assert_eq!(
            rows,
            vec![
                JurisdictionSummary {
                    code: "LA".into(),
                    name: "Louisiana".into(),
                    records: 1,
                    resolved: 1
                },
                JurisdictionSummary {
                    code: "MS".into(),
                    name: "Mississippi".into(),
                    records: 1,
                    resolved: 1
                },
                JurisdictionSummary {
                    code: "VA".into(),
                    name: "Virginia".into(),
                    records: 2,
                    resolved: 1
                },
            ]
        );
    }

    #[test]
    fn records_of_one_jurisdiction_sorted() {
        let c = sample();
        let va: Vec<&str> = by_jurisdiction(&c, "va")
            .iter()
            .map(|r| r.subdivision_name.as_str())
            .collect();
        assert_eq!(va, vec!["Accomack County", "York County"]);
        assert!(by_jurisdiction(&c, "TX").is_empty());
    }

    #[test]
    fn search_fields() {
        let c = sample();
        let ids = |q: &str| -> Vec<String> { search(&c, q).iter().map(|r| r.id.clone()).collect() };
        assert_eq!(ids("bibbee"), vec!["MS-desoto-county"]);
        assert_eq!(ids("PARISH"), vec!["LA-acadia-parish"]);
        assert_eq!(ids("virginia").len(), 2);
        assert_eq!(ids("tbd"), vec!["VA-accomack-county"]);
        assert!(ids("  ").is_empty());
    }
}
