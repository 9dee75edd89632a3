use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::artifact::{self, Artifact};
use crate::config::{Settings, SourceConfig};
use crate::db;
use crate::extract;
use crate::fetch::{self, FetchStats};
use crate::merge::{merge, CanonicalCollection, MergeSummary};
use crate::record::SourceDataset;
use crate::report::{report, Stats};

/// What one `run` did, for the closing summary.
pub struct RunOutcome {
    pub fetch: FetchStats,
    pub datasets: Vec<(String, usize)>,
    pub merge: MergeSummary,
    pub stats: Stats,
}

/// Registered sources in merge order, narrowed to `names` when given.
pub fn select_sources<'a>(settings: &'a Settings, names: &[String]) -> Result<Vec<&'a SourceConfig>> {
    for name in names {
        settings.source(name)?;
    }
    Ok(settings
        .sources_in_order()
        .into_iter()
        .filter(|s| names.is_empty() || names.contains(&s.name))
        .collect())
}

/// Extract every fetched body. Runs in parallel; output order follows `sources`.
pub fn extract_all(
    settings: &Settings,
    sources: &[&SourceConfig],
    bodies: &[Option<String>],
    verified_on: NaiveDate,
) -> Vec<SourceDataset> {
    sources
        .par_iter()
        .zip(bodies.par_iter())
        .filter_map(|(source, body)| {
            let Some(jurisdiction) = settings.jurisdiction(&source.jurisdiction) else {
                warn!(source = %source.name, jurisdiction = %source.jurisdiction, "unknown jurisdiction, skipped");
                return None;
            };
            Some(extract::run_source(source, jurisdiction, body.as_deref(), verified_on))
        })
        .collect()
}

/// Fetch, extract, merge over the prior artifact, and publish.
pub async fn run(settings: &Settings, names: &[String]) -> Result<RunOutcome> {
    let sources = select_sources(settings, names)?;
    info!(sources = sources.len(), "starting run");

    let (bodies, fetch_stats) = fetch::fetch_all(&settings.fetch, &sources).await?;
    let datasets = extract_all(settings, &sources, &bodies, Utc::now().date_naive());

    // An empty dataset would clobber the last good intermediate for that source.
    for dataset in datasets.iter().filter(|d| !d.is_empty()) {
        let path = dataset_path(settings, &dataset.provenance.source);
        if let Err(e) = artifact::save_dataset(&path, dataset) {
            warn!(error = %e, "dataset not saved");
        }
    }

    let prior = artifact::load_collection(&settings.artifact)
        .with_context(|| format!("loading {}", settings.artifact.display()))?;
    let (collection, summary) = merge(prior, &datasets);
    let stats = publish(settings, &collection)?;

    Ok(RunOutcome {
        fetch: fetch_stats,
        datasets: datasets
            .iter()
            .map(|d| (d.provenance.source.clone(), d.len()))
            .collect(),
        merge: summary,
        stats,
    })
}

/// Merge dataset files, in the order given, into the artifact.
pub fn merge_files(settings: &Settings, paths: &[PathBuf]) -> Result<(MergeSummary, Stats)> {
    let datasets = paths
        .iter()
        .map(|p| artifact::load_dataset(p).with_context(|| format!("loading dataset {}", p.display())))
        .collect::<Result<Vec<_>>>()?;

    let prior = artifact::load_collection(&settings.artifact)
        .with_context(|| format!("loading {}", settings.artifact.display()))?;
    let (collection, summary) = merge(prior, &datasets);
    let stats = publish(settings, &collection)?;
    Ok((summary, stats))
}

/// Write the artifact, then the SQLite export when one is configured.
pub fn publish(settings: &Settings, collection: &CanonicalCollection) -> Result<Stats> {
    let stats = report(collection, &settings.jurisdictions);
    artifact::save_artifact(&settings.artifact, &Artifact::new(collection, &stats))
        .with_context(|| format!("writing {}", settings.artifact.display()))?;

    if let Some(path) = &settings.sqlite {
        export_sqlite(path, collection, &stats)?;
    }
    Ok(stats)
}

pub fn export_sqlite(path: &std::path::Path, collection: &CanonicalCollection, stats: &Stats) -> Result<usize> {
    let conn = db::connect(path).with_context(|| format!("opening {}", path.display()))?;
    db::init_schema(&conn)?;
    let count = db::export(&conn, collection, stats)?;
    info!(path = %path.display(), rows = count, "sqlite export written");
    Ok(count)
}

pub fn dataset_path(settings: &Settings, source: &str) -> PathBuf {
    settings.dataset_dir.join(format!("{}.json", source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PersonName;

    fn settings(dir: &std::path::Path) -> Settings {
        let text = format!(
            r#"
artifact = "{dir}/county-chairs.json"
dataset_dir = "{dir}/datasets"

[[jurisdictions]]
code = "OH"
name = "Ohio"
subdivisions = 88

[[jurisdictions]]
code = "GA"
name = "Georgia"
subdivisions = 159

[[sources]]
name = "ohio-table"
jurisdiction = "OH"
path = "tests/fixtures/county_table.html"
kind = "table"

[[sources]]
name = "ohio-fix"
jurisdiction = "OH"
priority = 10
path = "{dir}/ohio-fix.toml"
kind = "structured_list"
append_keyword = "County"

[[sources]]
name = "georgia"
jurisdiction = "GA"
path = "tests/fixtures/free_text.html"
kind = "free_text"
"#,
            dir = dir.display()
        );
        let path = dir.join("sources.toml");
        std::fs::write(&path, text).unwrap();
        Settings::load(&path).unwrap()
    }

    #[test]
    fn selection_follows_priority_then_name() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let names: Vec<&str> = select_sources(&s, &[]).unwrap().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["georgia", "ohio-table", "ohio-fix"]);

        let only = select_sources(&s, &["ohio-fix".to_string()]).unwrap();
        assert_eq!(only.len(), 1);
        assert!(select_sources(&s, &["texas".to_string()]).is_err());
    }

    #[test]
    fn extraction_keeps_source_order_and_later_sources_win() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let sources = select_sources(&s, &[]).unwrap();
        let bodies = vec![
            Some(std::fs::read_to_string("tests/fixtures/free_text.html").unwrap()),
            Some(std::fs::read_to_string("tests/fixtures/county_table.html").unwrap()),
            Some("[[entries]]\nsubdivision = \"Ashland\"\nperson = \"Pat Lane\"\n".to_string()),
        ];
        let day = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let datasets = extract_all(&s, &sources, &bodies, day);
        let order: Vec<&str> = datasets.iter().map(|d| d.provenance.source.as_str()).collect();
        assert_eq!(order, vec!["georgia", "ohio-table", "ohio-fix"]);

        let (collection, summary) = merge(CanonicalCollection::new(), &datasets);
        assert_eq!(summary.replaced, 1);
        assert_eq!(
            collection.get("OH-ashland-county").unwrap().person_name,
            PersonName::Assigned("Pat Lane".into())
        );
        assert_eq!(collection.len(), 4 + 4);
    }

    #[test]
    fn unavailable_source_leaves_prior_data() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let sources = select_sources(&s, &["ohio-table".to_string()]).unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();

        let first = extract_all(
            &s,
            &sources,
            &[Some(std::fs::read_to_string("tests/fixtures/county_table.html").unwrap())],
            day,
        );
        let (collection, _) = merge(CanonicalCollection::new(), &first);
        publish(&s, &collection).unwrap();

        let second = extract_all(&s, &sources, &[None], day);
        assert!(second[0].is_empty());
        let prior = artifact::load_collection(&s.artifact).unwrap();
        let (after, summary) = merge(prior, &second);
        assert_eq!(after, collection);
        assert_eq!(summary.touched(), 0);
    }

    #[test]
    fn merge_files_and_sqlite_export() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(dir.path());
        s.sqlite = Some(dir.path().join("chairs.sqlite"));
        let sources = select_sources(&s, &["georgia".to_string()]).unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let datasets = extract_all(
            &s,
            &sources,
            &[Some(std::fs::read_to_string("tests/fixtures/free_text.html").unwrap())],
            day,
        );
        let path = dataset_path(&s, "georgia");
        artifact::save_dataset(&path, &datasets[0]).unwrap();

        let (summary, stats) = merge_files(&s, &[path]).unwrap();
        assert_eq!(summary.inserted, 4);
        assert_eq!(stats.resolved, 3);
        let ga = stats.jurisdictions.iter().find(|j| j.code == "GA").unwrap();
        assert_eq!(ga.missing(), Some(155));

        let conn = db::connect(s.sqlite.as_ref().unwrap()).unwrap();
        let rows = db::fetch_coverage(&conn).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!((rows[0].records, rows[0].resolved), (4, 3));
    }
}
