use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::contact::{find_email, find_phone, strip_contacts};
use super::html::inline_text;
use super::SourceContext;
use crate::record::{PersonName, Record};

static TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table\b[^>]*>(.*?)</table>").unwrap());
static ROW_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").unwrap());
static CELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(td|th)\b[^>]*>(.*?)</t[dh]>").unwrap());

struct Cell {
    header: bool,
    text: String,
}

/// Read (subdivision, chair) pairs from every HTML table on the page.
///
/// The first cell must name a subdivision (contain a keyword and be more than
/// the bare keyword); the second cell holds the chair. Header rows and rows
/// with fewer than two cells are skipped. Contacts may sit in any cell.
pub fn extract(ctx: &SourceContext, input: &str) -> Vec<Record> {
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for table in TABLE_RE.captures_iter(input) {
        for row in ROW_RE.captures_iter(&table[1]) {
            let cells: Vec<Cell> = CELL_RE
                .captures_iter(&row[1])
                .map(|c| Cell {
                    header: c[1].eq_ignore_ascii_case("th"),
                    text: inline_text(&c[2]),
                })
                .collect();

            if cells.len() < 2 || cells.iter().all(|c| c.header) {
                skipped += 1;
                continue;
            }
            let subdivision = &cells[0].text;
            if !ctx.has_keyword(subdivision) || ctx.is_bare_keyword(subdivision) {
                skipped += 1;
                continue;
            }

            let mut draft = ctx.draft(subdivision);
            draft.person_name = PersonName::parse(&strip_contacts(&cells[1].text));
            draft.email = cells.iter().find_map(|c| find_email(&c.text));
            draft.phone = cells.iter().find_map(|c| find_phone(&c.text));

            if let Some(record) = ctx.finish(draft) {
                records.push(record);
            }
        }
    }

    debug!(source = ctx.source, rows = records.len(), skipped, "table rows read");
    records
}
