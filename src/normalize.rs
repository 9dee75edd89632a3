/// Turn display text into a lowercase ASCII slug.
///
/// Runs of separators (`,./:'-`, whitespace, and any other non-alphanumeric
/// character) collapse to a single hyphen; leading and trailing hyphens are
/// dropped. Accented Latin letters fold to their ASCII base. The result may be
/// empty when the input holds no letters or digits.
pub fn normalize(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_sep = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        match fold_ascii(c) {
            Some(a) => {
                if pending_sep && !slug.is_empty() {
                    slug.push('-');
                }
                pending_sep = false;
                slug.push(a);
            }
            None => pending_sep = true,
        }
    }

    slug
}

/// Stable record id: upper-cased jurisdiction code plus the subdivision slug.
/// Returns `None` when either part normalizes to nothing.
pub fn record_id(jurisdiction_code: &str, subdivision: &str) -> Option<String> {
    let code = jurisdiction_code.trim().to_ascii_uppercase();
    let slug = normalize(subdivision);
    if code.is_empty() || slug.is_empty() {
        return None;
    }
    Some(format!("{}-{}", code, slug))
}

fn fold_ascii(c: char) -> Option<char> {
    if c.is_ascii_alphanumeric() {
        return Some(c);
    }
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        _ => return None,
    };
    Some(folded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_and_case_insensitive() {
        let a = normalize("St. Clair County");
        assert_eq!(a, "st-clair-county");
        assert_eq!(a, normalize("st clair county"));
        assert_eq!(a, normalize("ST-CLAIR COUNTY"));
    }

    #[test]
    fn collapses_separator_runs() {
        assert_eq!(normalize("  Alleghany / Covington  "), "alleghany-covington");
        assert_eq!(normalize("Prince George's  County"), "prince-george-s-county");
        assert_eq!(normalize("Emporia/Greensville, County."), "emporia-greensville-county");
    }

    #[test]
    fn idempotent() {
        for s in ["St. Clair County", "--Doña Ana--", "King & Queen", "O'Brien: County"] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn folds_accents() {
        assert_eq!(normalize("Doña Ana County"), "dona-ana-county");
    }

    #[test]
    fn punctuation_only_is_empty() {
        assert_eq!(normalize(" .,'- / "), "");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn id_from_code_and_subdivision() {
        assert_eq!(record_id("va", "York County").as_deref(), Some("VA-york-county"));
        assert_eq!(record_id("VA", "york  county."), record_id("VA", "York County"));
        assert_eq!(record_id("VA", "..."), None);
        assert_eq!(record_id(" ", "York"), None);
    }
}
