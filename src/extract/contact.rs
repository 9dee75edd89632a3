use std::sync::LazyLock;

use regex::Regex;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap());

// Tried in order; the first pattern that matches anywhere wins.
static PHONE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\(\d{3}\)\s*\d{3}[-\s]\d{4}",
        r"\b\d{3}[-.\s]\d{3}[-.\s]\d{4}\b",
        r"\b\d{10}\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

pub fn find_email(text: &str) -> Option<String> {
    EMAIL_RE
        .find(text)
        .map(|m| m.as_str().trim_end_matches('.').to_string())
}

pub fn find_phone(text: &str) -> Option<String> {
    PHONE_RES
        .iter()
        .find_map(|re| re.find(text))
        .map(|m| m.as_str().to_string())
}

/// `text` with any email addresses and phone numbers cut out.
pub fn strip_contacts(text: &str) -> String {
    let no_email = EMAIL_RE.replace_all(text, " ");
    let cleaned = PHONE_RES
        .iter()
        .fold(no_email.into_owned(), |acc, re| re.replace_all(&acc, " ").into_owned());
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
