use once_cell::sync::Lazy;
use regex::Regex;

pub const MAX_TITLE_CHARS: usize = 100;

static RE_SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").unwrap());
static RE_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").unwrap());
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<h[1-6]\b[^>]*>(.*?)</h[1-6]\s*>").unwrap());
static RE_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>").unwrap());

// Decoded in this order, after tags are gone.
const ENTITIES: [(&str, &str); 6] = [
    ("&nbsp;", " "),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
];

/// Reduces chapter markup to a single line of plain text.
pub fn sanitize(markup: &str) -> String {
    let text = RE_SCRIPT.replace_all(markup, "");
    let text = RE_STYLE.replace_all(&text, "");
    let mut text = RE_TAG.replace_all(&text, "").into_owned();
    for (entity, replacement) in ENTITIES {
        if text.contains(entity) {
            text = text.replace(entity, replacement);
        }
    }
    RE_WHITESPACE.replace_all(&text, " ").trim().to_owned()
}

/// Title from the first heading, else the first `<title>`, searched in the raw markup.
///
/// Falls back to `Chapter {position}` when neither yields any text.
pub fn derive_title(markup: &str, position: usize) -> String {
    let matched = RE_HEADING
        .captures(markup)
        .or_else(|| RE_TITLE.captures(markup))
        .and_then(|caps| caps.get(1));

    if let Some(inner) = matched {
        let title: String = sanitize(inner.as_str())
            .chars()
            .take(MAX_TITLE_CHARS)
            .collect();
        let title = title.trim_end();
        if !title.is_empty() {
            return title.to_owned();
        }
    }

    format!("Chapter {position}")
}
