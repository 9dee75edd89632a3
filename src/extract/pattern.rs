use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::contact::{find_email, find_phone};
use super::html::{floor_boundary, to_text};
use super::{looks_like_name, SourceContext};
use crate::normalize::normalize;
use crate::record::{PersonName, Record, NEEDS_VERIFICATION};

// Role keyword (any case), optional colon, at most one line break, then up to
// four capitalized tokens on one line. The name part stays case-sensitive.
static ROLE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i:\b(?:chair(?:person|man|woman)?|contact|representative)\b)[ \t]*:?[ \t]*(?:\n[ \t]*)?([A-Z][A-Za-z'’-]*\.?(?:[ \t]+(?:[A-Z]\.|[A-Z][A-Za-z'’-]+)){1,3})",
    )
    .unwrap()
});

// Capitalized words that trail a name on the same line but are labels, not names.
const TRAILING_LABELS: &[&str] = &[
    "Email", "E-mail", "Phone", "Tel", "Cell", "Fax", "Website", "Web", "Address", "Chair",
    "Vice", "Secretary", "Treasurer", "County", "Parish", "Borough", "Contact",
];

// Capitalized words that precede a subdivision keyword in page copy without
// naming one ("Find Your County Chair", "Republican County Committee").
const NOT_PLACE_NAMES: &[&str] = &[
    "A", "All", "An", "Any", "By", "Each", "Every", "Find", "For", "From", "Home", "In", "Local",
    "My", "Of", "Other", "Our", "Per", "Select", "State", "That", "The", "Their", "This", "Your",
    "Republican", "Republicans", "Democratic", "Democrat", "GOP", "Party", "Committee",
    "Chair", "Chairman", "Chairwoman", "Chairperson", "Contact", "Representative", "Email",
    "Phone", "Vice", "Secretary", "Treasurer",
];

const SAINT_PREFIXES: &[&str] = &["St", "St.", "Ste", "Ste.", "Saint", "Sainte"];

// One capitalized word of a place name: DeKalb, McDuffie, O'Brien, Miami-Dade.
static PLACE_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Za-z'’-]*[A-Za-z]$").unwrap());

const MAX_PLACE_TOKENS: usize = 3;

/// A subdivision named in running text: byte span plus display name.
struct Mention {
    start: usize,
    end: usize,
    subdivision: String,
}

/// Pull (subdivision, chair, contact) triples out of free-form page text.
///
/// Each mention of a place name (up to three capitalized words, optionally
/// after a saint prefix) followed by a keyword opens a window that runs at most
/// `window` bytes past the mention and never into the next mention. Inside it the
/// first role-anchored name is taken, along with the first email and phone.
/// Subdivisions without an acceptable name are kept as `TBD` and flagged.
pub fn extract(ctx: &SourceContext, input: &str, window: usize) -> Vec<Record> {
    let text = if input.contains('<') { to_text(input) } else { input.to_string() };
    let Some(keyword_re) = keyword_regex(ctx.keywords) else {
        debug!(source = ctx.source, "no subdivision keywords configured");
        return Vec::new();
    };
    let mentions = find_mentions(&text, &keyword_re, ctx.keywords);

    let mut records = Vec::with_capacity(mentions.len());
    for (i, mention) in mentions.iter().enumerate() {
        let end = mention.end;
        let limit = mentions
            .get(i + 1)
            .map(|next| next.start)
            .unwrap_or(text.len())
            .min(end.saturating_add(window));
        let tail = &text[end..floor_boundary(&text, limit).max(end)];

        let person = find_person(tail, &mention.subdivision);
        let mut draft = ctx.draft(&mention.subdivision);
        if person.is_none() {
            draft = draft.note(NEEDS_VERIFICATION);
        }
        draft.person_name = person.unwrap_or_default();
        draft.email = find_email(tail);
        draft.phone = find_phone(tail);

        if let Some(record) = ctx.finish(draft) {
            records.push(record);
        }
    }
    records
}

fn keyword_regex(keywords: &[String]) -> Option<Regex> {
    if keywords.is_empty() {
        return None;
    }
    let alternation = keywords
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{})\b", alternation)).ok()
}

/// Every keyword occurrence preceded, on the same line, by a place name.
fn find_mentions(text: &str, keyword_re: &Regex, keywords: &[String]) -> Vec<Mention> {
    keyword_re
        .find_iter(text)
        .filter_map(|kw| {
            let (start, place) = place_before(&text[..kw.start()], keywords)?;
            Some(Mention {
                start,
                end: kw.end(),
                subdivision: format!("{} {}", place, kw.as_str()),
            })
        })
        .collect()
}

/// Walk back from the end of `before` over up to three capitalized words,
/// plus an optional saint prefix. Stops at a line break, punctuation, a
/// keyword, or a word that never names a place.
fn place_before<'t>(before: &'t str, keywords: &[String]) -> Option<(usize, String)> {
    let mut rest = before;
    let mut tokens: Vec<&'t str> = Vec::new();
    let mut start = before.len();

    loop {
        let trimmed = rest.trim_end_matches([' ', '\t']);
        if trimmed.len() == rest.len() || trimmed.is_empty() {
            break;
        }
        let from = trimmed.rfind([' ', '\t', '\n', '\r']).map_or(0, |i| i + 1);
        let token = &trimmed[from..];

        if tokens.len() < MAX_PLACE_TOKENS && is_place_token(token, keywords) {
            tokens.push(token);
            start = from;
            rest = &trimmed[..from];
            continue;
        }
        if !tokens.is_empty() && SAINT_PREFIXES.contains(&token) {
            tokens.push(token);
            start = from;
        }
        break;
    }

    if tokens.is_empty() {
        return None;
    }
    tokens.reverse();
    Some((start, tokens.join(" ")))
}

fn is_place_token(token: &str, keywords: &[String]) -> bool {
    PLACE_TOKEN_RE.is_match(token)
        && !NOT_PLACE_NAMES.contains(&token)
        && !SAINT_PREFIXES.contains(&token)
        && !keywords.iter().any(|k| k.eq_ignore_ascii_case(token))
}

/// First role-anchored name in `tail`, if it passes the sanity checks.
/// Only the first match is considered; a rejected candidate is not retried.
fn find_person(tail: &str, subdivision: &str) -> Option<PersonName> {
    let caps = ROLE_NAME_RE.captures(tail)?;
    let raw = caps.get(1)?.as_str();

    let mut tokens: Vec<&str> = raw.split_whitespace().collect();
    while tokens
        .last()
        .is_some_and(|t| TRAILING_LABELS.iter().any(|l| t.trim_end_matches(':') == *l))
    {
        tokens.pop();
    }
    let candidate = tokens.join(" ");

    if !looks_like_name(&candidate) {
        debug!(candidate = %candidate, subdivision, "name rejected: shape");
        return None;
    }
    if is_self_match(&candidate, subdivision) {
        debug!(candidate = %candidate, subdivision, "name rejected: self-match");
        return None;
    }
    Some(PersonName::parse(&candidate))
}

fn is_self_match(candidate: &str, subdivision: &str) -> bool {
    let cand = normalize(candidate);
    let full = normalize(subdivision);
    let bare = subdivision
        .rsplit_once(' ')
        .map(|(base, _)| normalize(base))
        .unwrap_or_default();
    cand == full || cand == bare || full.starts_with(&format!("{}-", cand))
}
