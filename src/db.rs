use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;
use crate::merge::CanonicalCollection;
use crate::report::Stats;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| crate::error::ChairsError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS chairs (
            id                TEXT PRIMARY KEY,
            jurisdiction_code TEXT NOT NULL,
            jurisdiction_name TEXT NOT NULL,
            subdivision_name  TEXT NOT NULL,
            person_name       TEXT NOT NULL,
            is_resolved       BOOLEAN GENERATED ALWAYS AS (person_name NOT IN ('TBD','VACANT')) STORED,
            email             TEXT,
            phone             TEXT,
            effective_date    TEXT,
            source_url        TEXT,
            verified_on       TEXT NOT NULL,
            notes             TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_chairs_code ON chairs(jurisdiction_code);

        CREATE TABLE IF NOT EXISTS jurisdictions (
            code      TEXT PRIMARY KEY,
            name      TEXT NOT NULL,
            records   INTEGER NOT NULL,
            resolved  INTEGER NOT NULL,
            expected  INTEGER
        );
        ",
    )?;
    Ok(())
}

/// Replace the exported tables with the collection, all in one transaction.
pub fn export(conn: &Connection, collection: &CanonicalCollection, stats: &Stats) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        tx.execute("DELETE FROM chairs", [])?;
        tx.execute("DELETE FROM jurisdictions", [])?;

        let mut stmt = tx.prepare(
            "INSERT INTO chairs
             (id, jurisdiction_code, jurisdiction_name, subdivision_name, person_name,
              email, phone, effective_date, source_url, verified_on, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;
        for r in collection.records() {
            count += stmt.execute(rusqlite::params![
                r.id,
                r.jurisdiction_code,
                r.jurisdiction_name,
                r.subdivision_name,
                r.person_name.as_str(),
                r.email,
                r.phone,
                r.effective_date.map(|d| d.to_string()),
                r.source_url,
                r.verified_on.to_string(),
                r.notes,
            ])?;
        }

        let mut j_stmt = tx.prepare(
            "INSERT INTO jurisdictions (code, name, records, resolved, expected)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for j in &stats.jurisdictions {
            j_stmt.execute(rusqlite::params![
                j.code,
                j.name,
                j.total as i64,
                j.resolved as i64,
                j.expected.map(|e| e as i64),
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub struct CoverageRow {
    pub code: String,
    pub records: usize,
    pub resolved: usize,
}

/// Per-jurisdiction counts straight from the exported table.
pub fn fetch_coverage(conn: &Connection) -> Result<Vec<CoverageRow>> {
    let mut stmt = conn.prepare(
        "SELECT jurisdiction_code, COUNT(*), SUM(is_resolved)
         FROM chairs
         GROUP BY jurisdiction_code
         ORDER BY jurisdiction_code",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(CoverageRow {
                code: row.get(0)?,
                records: row.get(1)?,
                resolved: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{PersonName, Record, RecordDraft};
    use crate::report::report;
    use chrono::NaiveDate;

    fn rec(code: &str, subdivision: &str, person: &str) -> Record {
        let mut draft = RecordDraft::new(
            code,
            "Somewhere",
            subdivision,
            NaiveDate::from_ymd_opt(2025, 12, 27).unwrap(),
        );
        draft.person_name = PersonName::parse(person);
        draft.source_url = Some("https://example.gop".into());
        draft.into_record().unwrap()
    }

    #[test]
    fn export_replaces_rows() {
        let dir = tempfile::tempdir().unwrap();
        let conn = connect(&dir.path().join("chairs.sqlite")).unwrap();
        init_schema(&conn).unwrap();

        let first = CanonicalCollection::from_records([
            rec("OH", "Adams County", "Brian Baldridge"),
            rec("OH", "Allen County", "VACANT"),
            rec("KS", "Allen County", "TBD"),
        ]);
        assert_eq!(export(&conn, &first, &report(&first, &[])).unwrap(), 3);

        let coverage = fetch_coverage(&conn).unwrap();
        let rows: Vec<(&str, usize, usize)> = coverage
            .iter()
            .map(|c| (c.code.as_str(), c.records, c.resolved))
            .collect();
        assert_eq!(rows, vec![("KS", 1, 0), ("OH", 2, 1)]);

        let second = CanonicalCollection::from_records([rec("OH", "Adams County", "Jane Doe")]);
        export(&conn, &second, &report(&second, &[])).unwrap();
        let total: usize = conn
            .query_row("SELECT COUNT(*) FROM chairs", [], |r| r.get(0))
            .unwrap();
        assert_eq!(total, 1);
        let name: String = conn
            .query_row("SELECT person_name FROM chairs WHERE id = 'OH-adams-county'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(name, "Jane Doe");
    }
}
