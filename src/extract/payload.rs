use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

const KEY_PREVIEW: usize = 10;

/// Embedded-state markers in the order they are tried. Each regex ends right
/// where the JSON value should begin.
static MARKERS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        (
            "__NEXT_DATA__",
            r#"(?i)<script[^>]*\bid=["']__NEXT_DATA__["'][^>]*>\s*|__NEXT_DATA__\s*=\s*"#,
        ),
        ("__NUXT__", r"__NUXT__\s*=\s*"),
        ("window.__INITIAL_STATE__", r"window\.__INITIAL_STATE__\s*=\s*"),
        ("window.INITIAL_DATA", r"window\.INITIAL_DATA\s*=\s*"),
        ("window.data", r"window\.data\s*=\s*"),
        (
            "application/ld+json",
            r#"(?i)<script[^>]*\btype=["']application/ld\+json["'][^>]*>\s*"#,
        ),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).unwrap()))
    .collect()
});

static API_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)https?://[^\s"'<>]*api[^\s"'<>]*"#).unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PayloadShape {
    Object { keys: Vec<String> },
    Array { len: usize },
    Scalar,
}

impl PayloadShape {
    fn of(value: &Value) -> PayloadShape {
        match value {
            Value::Object(map) => PayloadShape::Object {
                keys: map.keys().take(KEY_PREVIEW).cloned().collect(),
            },
            Value::Array(items) => PayloadShape::Array { len: items.len() },
            _ => PayloadShape::Scalar,
        }
    }
}

impl fmt::Display for PayloadShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadShape::Object { keys } => write!(f, "object {{{}}}", keys.join(", ")),
            PayloadShape::Array { len } => write!(f, "array [{}]", len),
            PayloadShape::Scalar => f.write_str("scalar"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadHit {
    pub marker: &'static str,
    pub shape: PayloadShape,
}

/// What the page carries besides its visible text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub bytes: usize,
    pub payload: Option<PayloadHit>,
    /// Markers present on the page whose JSON failed to parse.
    pub malformed: Vec<&'static str>,
    pub api_urls: Vec<String>,
}

impl ProbeReport {
    pub fn log(&self, source: &str) {
        match &self.payload {
            Some(hit) => info!(
                source,
                marker = hit.marker,
                shape = %hit.shape,
                api_urls = self.api_urls.len(),
                "embedded payload found"
            ),
            None => info!(
                source,
                bytes = self.bytes,
                malformed = self.malformed.len(),
                api_urls = self.api_urls.len(),
                "no embedded payload"
            ),
        }
    }
}

/// Look for framework-injected JSON in `html`. The first marker whose text
/// parses wins. A non-empty `configured` list (marker names) replaces the
/// built-in order; names it does not know are skipped.
pub fn probe(html: &str, configured: &[String]) -> ProbeReport {
    let mut malformed = Vec::new();
    let mut payload = None;

    'markers: for (name, re) in marker_order(configured) {
        for m in re.find_iter(html) {
            match first_value(&html[m.end()..]) {
                Some(value) => {
                    payload = Some(PayloadHit {
                        marker: *name,
                        shape: PayloadShape::of(&value),
                    });
                    break 'markers;
                }
                None => {
                    debug!(marker = name, offset = m.start(), "payload did not parse");
                    if !malformed.contains(name) {
                        malformed.push(*name);
                    }
                }
            }
        }
    }

    let api_urls: BTreeSet<String> = API_URL_RE
        .find_iter(html)
        .map(|m| m.as_str().trim_end_matches([',', ';', ')']).to_string())
        .collect();

    ProbeReport {
        bytes: html.len(),
        payload,
        malformed,
        api_urls: api_urls.into_iter().collect(),
    }
}

fn marker_order(configured: &[String]) -> Vec<&'static (&'static str, Regex)> {
    if configured.is_empty() {
        return MARKERS.iter().collect();
    }
    configured
        .iter()
        .filter_map(|wanted| {
            let found = MARKERS.iter().find(|(name, _)| name == wanted);
            if found.is_none() {
                debug!(marker = %wanted, "unknown payload marker ignored");
            }
            found
        })
        .collect()
}

/// Parse the JSON value at the start of `text`, ignoring whatever follows it.
fn first_value(text: &str) -> Option<Value> {
    serde_json::Deserializer::from_str(text)
        .into_iter::<Value>()
        .next()
        .and_then(|r| r.ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_data_script_block() {
        let html = std::fs::read_to_string("tests/fixtures/next_data.html").unwrap();
        let report = probe(&html, &[]);
        let hit = report.payload.unwrap();
        assert_eq!(hit.marker, "__NEXT_DATA__");
        assert_eq!(
            hit.shape,
            PayloadShape::Object {
                keys: vec!["buildId".into(), "page".into(), "props".into()]
            }
        );
        assert_eq!(
            report.api_urls,
            vec!["https://api.example-gop.org/v1/counties".to_string()]
        );
    }

    #[test]
    fn malformed_marker_falls_through() {
        let html = r#"<script>window.__INITIAL_STATE__ = {broken: true};</script>
            <script type="application/ld+json">[{"@type": "Organization"}, {"@type": "Person"}]</script>"#;
        let report = probe(html, &[]);
        assert_eq!(report.malformed, vec!["window.__INITIAL_STATE__"]);
        let hit = report.payload.unwrap();
        assert_eq!(hit.marker, "application/ld+json");
        assert_eq!(hit.shape, PayloadShape::Array { len: 2 });
    }

    #[test]
    fn allowed_markers_filter() {
        let html = r#"<script>window.data = {"a": 1}; window.__NUXT__ = "ssr";</script>"#;
        let report = probe(html, &["window.data".to_string()]);
        assert_eq!(report.payload.unwrap().marker, "window.data");
        let report = probe(html, &[]);
        let hit = report.payload.unwrap();
        assert_eq!(hit.marker, "__NUXT__");
        assert_eq!(hit.shape, PayloadShape::Scalar);
    }

    #[test]
    fn configured_order_is_followed() {
        let html = r#"<script>window.__NUXT__ = {"state": {}}; window.data = [1, 2, 3];</script>"#;
        let report = probe(html, &["window.data".to_string(), "__NUXT__".to_string()]);
        assert_eq!(report.payload.unwrap().marker, "window.data");

        let report = probe(html, &["__NUXT__".to_string(), "window.data".to_string()]);
        assert_eq!(report.payload.unwrap().marker, "__NUXT__");

        let report = probe(html, &["window.nope".to_string()]);
        assert!(report.payload.is_none());
    }

    #[test]
    fn plain_page() {
        let html = "<html><body><p>Adams County</p></body></html>";
        let report = probe(html, &[]);
        assert!(report.payload.is_none());
        assert!(report.malformed.is_empty());
        assert!(report.api_urls.is_empty());
        assert_eq!(report.bytes, html.len());
    }
}
