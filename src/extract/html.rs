use std::sync::LazyLock;

use regex::Regex;

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(script|style|noscript)\b[^>]*>.*?</(script|style|noscript)>").unwrap());
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static BLOCK_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\s*(br|/p|/div|/li|/tr|/h[1-6]|/section|/article|/table|/ul|/ol|hr)\b[^>]*>").unwrap()
});
static CELL_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<\s*/t[dh]\s*>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static NUMERIC_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").unwrap());

/// Reduce an HTML page to plain text lines.
///
/// Scripts, styles and comments are dropped; block-level closers become line
/// breaks and table cells are separated by a tab. Each output line has its
/// whitespace collapsed, and blank lines are removed.
pub fn to_text(html: &str) -> String {
    let without_scripts = SCRIPT_RE.replace_all(html, " ");
    let without_comments = COMMENT_RE.replace_all(&without_scripts, " ");
    let with_breaks = BLOCK_TAG_RE.replace_all(&without_comments, "\n");
    let with_cells = CELL_END_RE.replace_all(&with_breaks, "\t");
    let bare = TAG_RE.replace_all(&with_cells, " ");
    let decoded = decode_entities(&bare);

    decoded
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text content of an HTML fragment (a table cell, say) on a single line.
pub fn inline_text(fragment: &str) -> String {
    let bare = TAG_RE.replace_all(fragment, " ");
    decode_entities(&bare)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode the named entities that show up on party sites plus numeric references.
pub fn decode_entities(s: &str) -> String {
    let named = s
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&rsquo;", "'")
        .replace("&lsquo;", "'")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-");
    let numeric = NUMERIC_ENTITY_RE.replace_all(&named, |caps: &regex::Captures| {
        let code = &caps[1];
        let value = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        value
            .and_then(char::from_u32)
            .map(|c| match c {
                '\u{2019}' | '\u{2018}' => '\''.to_string(),
                '\u{a0}' => " ".to_string(),
                other => other.to_string(),
            })
            .unwrap_or_default()
    });
    // Last so "&amp;lt;" stays literal.
    numeric.replace("&amp;", "&")
}

/// Largest char boundary in `s` that is `<= idx`.
pub fn floor_boundary(s: &str, idx: usize) -> usize {
    let mut i = idx.min(s.len());
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
