use chrono::NaiveDate;
use config::{Config, File, FileFormat};
use serde::Deserialize;
use tracing::warn;

use super::SourceContext;
use crate::record::{PersonName, Record};

/// A transcribed chair list (from a PDF or a static page), TOML or JSON.
///
/// ```toml
/// source_url = "https://kansas.gop/counties/"
/// verified_on = "2025-12-27"
///
/// [[entries]]
/// subdivision = "Allen"
/// person = "John Brocker"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct StructuredList {
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub verified_on: Option<NaiveDate>,
    #[serde(default)]
    pub entries: Vec<ListEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListEntry {
    pub subdivision: String,
    #[serde(default)]
    pub person: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl StructuredList {
    /// Parse list text; JSON when it opens with a brace, TOML otherwise.
    pub fn parse(text: &str) -> Result<StructuredList, config::ConfigError> {
        let format = if text.trim_start().starts_with('{') {
            FileFormat::Json
        } else {
            FileFormat::Toml
        };
        Config::builder()
            .add_source(File::from_str(text, format))
            .build()?
            .try_deserialize()
    }
}

pub fn extract(ctx: &SourceContext, input: &str, append_keyword: Option<&str>) -> Vec<Record> {
    let list = match StructuredList::parse(input) {
        Ok(list) => list,
        Err(e) => {
            warn!(source = ctx.source, error = %e, "malformed structured list, skipped");
            return Vec::new();
        }
    };

    list.entries
        .iter()
        .filter_map(|entry| {
            let subdivision = match append_keyword {
                Some(kw) if !ctx.has_keyword(&entry.subdivision) => {
                    format!("{} {}", entry.subdivision.trim(), kw)
                }
                _ => entry.subdivision.clone(),
            };

            let mut draft = ctx.draft(&subdivision);
            draft.person_name = entry
                .person
                .as_deref()
                .map(PersonName::parse)
                .unwrap_or_default();
            draft.email = entry.email.clone();
            draft.phone = entry.phone.clone();
            draft.effective_date = entry.effective_date;
            draft.notes = entry.notes.clone();
            if let Some(url) = &list.source_url {
                draft.source_url = Some(url.clone());
            }
            if let Some(day) = list.verified_on {
                draft.verified_on = day;
            }
            ctx.finish(draft)
        })
        .collect()
}
