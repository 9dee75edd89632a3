pub mod contact;
pub mod html;
pub mod pattern;
pub mod payload;
pub mod structured;
pub mod table;

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::config::{ExtractorKind, Jurisdiction, SourceConfig};
use crate::record::{Provenance, Record, RecordDraft, SourceDataset};

/// Everything an extractor needs to know about the source it is reading.
pub struct SourceContext<'a> {
    pub source: &'a str,
    pub jurisdiction: &'a Jurisdiction,
    pub source_url: Option<&'a str>,
    pub keywords: &'a [String],
    pub markers: &'a [String],
    pub verified_on: NaiveDate,
}

impl<'a> SourceContext<'a> {
    pub fn new(source: &'a SourceConfig, jurisdiction: &'a Jurisdiction, verified_on: NaiveDate) -> Self {
        SourceContext {
            source: &source.name,
            jurisdiction,
            source_url: source.url.as_deref(),
            keywords: &source.keywords,
            markers: &source.markers,
            verified_on,
        }
    }

    /// Draft pre-filled with the jurisdiction, source URL and verification date.
    pub fn draft(&self, subdivision: &str) -> RecordDraft {
        let mut draft = RecordDraft::new(
            &self.jurisdiction.code,
            &self.jurisdiction.name,
            subdivision,
            self.verified_on,
        );
        draft.source_url = self.source_url.map(str::to_string);
        draft
    }

    /// Validate a draft; failures are logged and dropped.
    pub fn finish(&self, draft: RecordDraft) -> Option<Record> {
        match draft.into_record() {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(source = self.source, error = %e, "candidate discarded");
                None
            }
        }
    }

    /// True when `text` contains one of the subdivision keywords as a word.
    pub fn has_keyword(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| self.keywords.iter().any(|k| k.eq_ignore_ascii_case(word)))
    }

    /// True when `text` is nothing but a keyword ("County", "Parish"...).
    pub fn is_bare_keyword(&self, text: &str) -> bool {
        self.keywords.iter().any(|k| k.eq_ignore_ascii_case(text.trim()))
    }
}

/// Run the configured strategy over raw input. Never fails: empty or
/// unusable input produces an empty list and a log line.
pub fn extract(kind: &ExtractorKind, ctx: &SourceContext, input: &str) -> Vec<Record> {
    if input.trim().is_empty() {
        warn!(source = ctx.source, "empty input, nothing to extract");
        return Vec::new();
    }

    let candidates = match kind {
        ExtractorKind::StructuredList { append_keyword } => {
            structured::extract(ctx, input, append_keyword.as_deref())
        }
        ExtractorKind::Table => table::extract(ctx, input),
        ExtractorKind::FreeText { window } => pattern::extract(ctx, input, *window),
        ExtractorKind::EmbeddedPayload => {
            let report = payload::probe(input, ctx.markers);
            report.log(ctx.source);
            Vec::new()
        }
    };

    let records = dedupe(candidates);
    let unresolved = records.iter().filter(|r| !r.person_name.is_resolved()).count();
    info!(
        source = ctx.source,
        records = records.len(),
        unresolved,
        "extracted"
    );
    records
}

/// Extract one source into a dataset. `input` is `None` when the source was
/// unavailable, which yields an empty dataset.
pub fn run_source(
    source: &SourceConfig,
    jurisdiction: &Jurisdiction,
    input: Option<&str>,
    verified_on: NaiveDate,
) -> SourceDataset {
    let provenance = Provenance {
        source: source.name.clone(),
        origin: source.origin(),
        fetched_at: Utc::now(),
    };
    let Some(text) = input else {
        warn!(source = %source.name, "source unavailable, empty dataset");
        return SourceDataset::empty(provenance);
    };
    let ctx = SourceContext::new(source, jurisdiction, verified_on);
    SourceDataset::new(provenance, extract(&source.extractor, &ctx, text))
}

/// Collapse candidates sharing an id. A resolved name beats a placeholder;
/// otherwise the first occurrence is kept. Order of first appearance is preserved.
fn dedupe(candidates: Vec<Record>) -> Vec<Record> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<Record> = Vec::with_capacity(candidates.len());

    for record in candidates {
        match slots.get(&record.id) {
            Some(&i) => {
                if !out[i].person_name.is_resolved() && record.person_name.is_resolved() {
                    out[i] = record;
                }
            }
            None => {
                slots.insert(record.id.clone(), out.len());
                out.push(record);
            }
        }
    }
    out
}

/// Looks like a capitalized proper name of two or three tokens
/// ("Jane Doe", "Robert E. Spiller").
pub fn looks_like_name(candidate: &str) -> bool {
    let tokens: Vec<&str> = candidate.split_whitespace().collect();
    (2..=3).contains(&tokens.len())
        && tokens
            .iter()
            .all(|t| t.chars().next().is_some_and(|c| c.is_uppercase()))
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;

    pub fn jurisdiction(code: &str, name: &str) -> Jurisdiction {
        Jurisdiction {
            code: code.into(),
            name: name.into(),
            subdivisions: None,
        }
    }

    pub fn keywords() -> Vec<String> {
        crate::config::DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect()
    }

    pub fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
    }

    pub fn ctx<'a>(j: &'a Jurisdiction, keywords: &'a [String]) -> SourceContext<'a> {
        SourceContext {
            source: "test",
            jurisdiction: j,
            source_url: Some("https://example.gop/county-chairs/"),
            keywords,
            markers: &[],
            verified_on: day(),
        }
    }
}
