use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ChairsError, Result};
use crate::normalize::record_id;

/// Note marker for candidates whose chair could not be confirmed on the page.
pub const NEEDS_VERIFICATION: &str = "Needs manual verification";
/// Note marker for records with no corroborating source URL.
pub const UNSOURCED: &str = "Unverified: no source";
/// Legacy placeholder marker carried by older artifacts.
pub const REQUIRES_RESEARCH: &str = "Requires Research";

const UNKNOWN_SPELLINGS: &[&str] = &["TBD", "COMING SOON", "UNKNOWN", "N/A", "NONE"];

/// Who holds the chair: a named person, an empty seat, or not yet known.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum PersonName {
    #[default]
    Unknown,
    Vacant,
    Assigned(String),
}

impl PersonName {
    /// Map raw source text onto a variant. Sentinel spellings are matched
    /// case-insensitively as a leading token, so "TBD - Requires Research" is
    /// `Unknown` while "Vacanti Rossi" stays a name.
    pub fn parse(raw: &str) -> Self {
        let name = collapse_ws(raw);
        if name.is_empty() {
            return PersonName::Unknown;
        }
        let upper = name.to_uppercase();
        if leads_with(&upper, "VACANT") {
            return PersonName::Vacant;
        }
        if UNKNOWN_SPELLINGS.iter().any(|s| leads_with(&upper, s)) {
            return PersonName::Unknown;
        }
        PersonName::Assigned(name)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, PersonName::Assigned(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            PersonName::Unknown => "TBD",
            PersonName::Vacant => "VACANT",
            PersonName::Assigned(name) => name,
        }
    }
}

fn leads_with(text: &str, token: &str) -> bool {
    text.strip_prefix(token)
        .is_some_and(|rest| !rest.starts_with(|c: char| c.is_alphanumeric()))
}

impl From<Option<String>> for PersonName {
    fn from(raw: Option<String>) -> Self {
        raw.as_deref().map(PersonName::parse).unwrap_or_default()
    }
}

impl From<PersonName> for String {
    fn from(name: PersonName) -> Self {
        name.as_str().to_string()
    }
}

impl std::fmt::Display for PersonName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One subdivision's chair entry. Produced once, replaced wholesale on merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    #[serde(alias = "stateCode")]
    pub jurisdiction_code: String,
    #[serde(alias = "state")]
    pub jurisdiction_name: String,
    #[serde(alias = "county")]
    pub subdivision_name: String,
    #[serde(alias = "chairName", default)]
    pub person_name: PersonName,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(alias = "electionDate", default, deserialize_with = "lenient_date")]
    pub effective_date: Option<NaiveDate>,
    #[serde(alias = "source")]
    pub source_url: Option<String>,
    #[serde(alias = "lastVerified")]
    pub verified_on: NaiveDate,
    pub notes: Option<String>,
}

impl Record {
    /// True when the notes carry any verification or placeholder marker.
    pub fn needs_verification(&self) -> bool {
        self.notes.as_deref().is_some_and(|n| {
            n.contains(NEEDS_VERIFICATION) || n.contains(UNSOURCED) || n.contains(REQUIRES_RESEARCH)
        })
    }

    /// Re-derive the id from code and subdivision. Older artifacts carry ids
    /// built by hand-written per-state rules; this brings them onto one scheme.
    pub fn rekeyed(mut self) -> Result<Record> {
        self.jurisdiction_code = self.jurisdiction_code.trim().to_ascii_uppercase();
        self.id = record_id(&self.jurisdiction_code, &self.subdivision_name).ok_or_else(|| {
            ChairsError::EmptySlug {
                jurisdiction: self.jurisdiction_code.clone(),
                subdivision: self.subdivision_name.clone(),
            }
        })?;
        Ok(self)
    }

    pub fn has_email(&self) -> bool {
        self.email.is_some()
    }

    pub fn has_phone(&self) -> bool {
        self.phone.is_some()
    }
}

/// Mutable staging form of a [`Record`]; `into_record` validates and derives the id.
#[derive(Debug, Clone, Default)]
pub struct RecordDraft {
    pub jurisdiction_code: String,
    pub jurisdiction_name: String,
    pub subdivision_name: String,
    pub person_name: PersonName,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub effective_date: Option<NaiveDate>,
    pub source_url: Option<String>,
    pub verified_on: NaiveDate,
    pub notes: Option<String>,
}

impl RecordDraft {
    pub fn new(code: &str, name: &str, subdivision: &str, verified_on: NaiveDate) -> Self {
        RecordDraft {
            jurisdiction_code: code.to_string(),
            jurisdiction_name: name.to_string(),
            subdivision_name: subdivision.to_string(),
            verified_on,
            ..Default::default()
        }
    }

    pub fn note(mut self, marker: &str) -> Self {
        self.notes = Some(append_note(self.notes.take(), marker));
        self
    }

    pub fn into_record(self) -> Result<Record> {
        let code = self.jurisdiction_code.trim().to_ascii_uppercase();
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ChairsError::InvalidJurisdiction(self.jurisdiction_code));
        }

        let subdivision = collapse_ws(&self.subdivision_name);
        let id = record_id(&code, &subdivision).ok_or_else(|| ChairsError::EmptySlug {
            jurisdiction: code.clone(),
            subdivision: self.subdivision_name.clone(),
        })?;

        let source_url = non_empty(self.source_url);
        let mut notes = non_empty(self.notes);
        if source_url.is_none() {
            notes = Some(append_note(notes, UNSOURCED));
        }

        Ok(Record {
            id,
            jurisdiction_code: code,
            jurisdiction_name: collapse_ws(&self.jurisdiction_name),
            subdivision_name: subdivision,
            person_name: self.person_name,
            email: non_empty(self.email).map(|e| e.to_lowercase()),
            phone: non_empty(self.phone),
            effective_date: self.effective_date,
            source_url,
            verified_on: self.verified_on,
            notes,
        })
    }
}

/// Where a dataset came from and when it was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub source: String,
    pub origin: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

/// Ordered output of one extractor run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDataset {
    pub provenance: Provenance,
    pub records: Vec<Record>,
}

impl SourceDataset {
    pub fn new(provenance: Provenance, records: Vec<Record>) -> Self {
        SourceDataset {
            provenance,
            records,
        }
    }

    /// Stand-in for a source that could not be fetched or parsed.
    pub fn empty(provenance: Provenance) -> Self {
        SourceDataset::new(provenance, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn append_note(notes: Option<String>, marker: &str) -> String {
    match notes {
        Some(n) if n.contains(marker) => n,
        Some(n) => format!("{}; {}", n, marker),
        None => marker.to_string(),
    }
}

fn lenient_date<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 27).unwrap()
    }

    #[test]
    fn sentinel_parsing() {
        assert_eq!(PersonName::parse("TBD"), PersonName::Unknown);
        assert_eq!(PersonName::parse("TBD - Requires Research"), PersonName::Unknown);
        assert_eq!(PersonName::parse("Coming Soon"), PersonName::Unknown);
        assert_eq!(PersonName::parse("   "), PersonName::Unknown);
        assert_eq!(PersonName::parse("vacant"), PersonName::Vacant);
        assert_eq!(
            PersonName::parse("  Ashlee   Ellis Smith "),
            PersonName::Assigned("Ashlee Ellis Smith".into())
        );
    }

    #[test]
    fn names_starting_with_a_sentinel_spelling_survive() {
        assert_eq!(
            PersonName::parse("Vacanti Rossi"),
            PersonName::Assigned("Vacanti Rossi".into())
        );
        assert_eq!(
            PersonName::parse("Tbdarian Cole"),
            PersonName::Assigned("Tbdarian Cole".into())
        );
        assert_eq!(
            PersonName::parse("Noneman Price"),
            PersonName::Assigned("Noneman Price".into())
        );
        assert_eq!(PersonName::parse("VACANT (resigned 2025)"), PersonName::Vacant);
        assert_eq!(PersonName::parse("None."), PersonName::Unknown);
        assert_eq!(PersonName::parse("n/a"), PersonName::Unknown);
    }

    #[test]
    fn sentinels_are_not_resolved() {
        assert!(!PersonName::Unknown.is_resolved());
        assert!(!PersonName::Vacant.is_resolved());
        assert!(PersonName::Assigned("Pat Nozinich".into()).is_resolved());
    }

    #[test]
    fn draft_derives_id_and_cleans_fields() {
        let mut draft = RecordDraft::new("ms", "Mississippi", " DeSoto   County ", day());
        draft.person_name = PersonName::parse("Shannon Bibbee");
        draft.email = Some(" S.Bibbee@Gmail.com ".into());
        draft.phone = Some("".into());
        draft.source_url = Some("https://www.msgop.org".into());
        let r = draft.into_record().unwrap();
        assert_eq!(r.id, "MS-desoto-county");
        assert_eq!(r.jurisdiction_code, "MS");
        assert_eq!(r.subdivision_name, "DeSoto County");
        assert_eq!(r.email.as_deref(), Some("s.bibbee@gmail.com"));
        assert_eq!(r.phone, None);
        assert!(!r.needs_verification());
    }

    #[test]
    fn unsourced_record_is_flagged() {
        let r = RecordDraft::new("KS", "Kansas", "Allen County", day())
            .into_record()
            .unwrap();
        assert!(r.needs_verification());
        assert_eq!(r.notes.as_deref(), Some(UNSOURCED));
    }

    #[test]
    fn notes_are_not_duplicated() {
        let r = RecordDraft::new("KS", "Kansas", "Allen County", day())
            .note(NEEDS_VERIFICATION)
            .note(NEEDS_VERIFICATION)
            .into_record()
            .unwrap();
        assert_eq!(r.notes.as_deref(), Some("Needs manual verification; Unverified: no source"));
    }

    #[test]
    fn rejects_bad_code_and_empty_slug() {
        let bad_code = RecordDraft::new("Kansas", "Kansas", "Allen", day()).into_record();
        assert!(matches!(bad_code, Err(ChairsError::InvalidJurisdiction(_))));
        let empty = RecordDraft::new("KS", "Kansas", " .. ", day()).into_record();
        assert!(matches!(empty, Err(ChairsError::EmptySlug { .. })));
    }

    #[test]
    fn serializes_sentinels_as_strings() {
        let r = RecordDraft::new("VA", "Virginia", "York County", day())
            .into_record()
            .unwrap();
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["personName"], "TBD");
        assert_eq!(json["verifiedOn"], "2025-12-27");
        assert!(json["email"].is_null());
    }

    #[test]
    fn reads_legacy_field_names() {
        let legacy = r#"{
            "id": "OH-adams", "state": "Ohio", "stateCode": "OH", "county": "Adams County",
            "chairName": null, "email": null, "phone": null, "electionDate": "March 2026",
            "source": "https://ohiogop.org/county-chairs", "lastVerified": "2025-11-13", "notes": null
        }"#;
        let r: Record = serde_json::from_str(legacy).unwrap();
        assert_eq!(r.jurisdiction_code, "OH");
        assert_eq!(r.subdivision_name, "Adams County");
        assert_eq!(r.person_name, PersonName::Unknown);
        assert_eq!(r.effective_date, None);
        assert_eq!(r.rekeyed().unwrap().id, "OH-adams-county");
    }
}
