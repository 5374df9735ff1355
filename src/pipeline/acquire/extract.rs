//! Field-level pattern extraction from semi-structured page text.
//!
//! Each helper looks for one field and returns `None` when it is absent, so a
//! missing optional field never blocks the others.

use once_cell::sync::Lazy;
use regex::Regex;

static META_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<meta\b[^>]*>").unwrap());

static TAG_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)([a-z_:\-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

static TITLE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());

static ISO_DATETIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{4}-\d{2}-\d{2}T\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?").unwrap()
});

static NUMERIC_ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|\d+);").unwrap());

/// `"key": "value"` pairs. The key is matched against the wanted one per hit,
/// so one compiled pattern serves every field.
static JSON_STRING_MEMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""([^"\\]+)"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap()
});

/// `"key": <number>`, the number optionally quoted.
static JSON_NUMBER_MEMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""([^"\\]+)"\s*:\s*"?(-?\d+(?:\.\d+)?(?:[eE][+-]?\d+)?)"?"#).unwrap()
});

/// `"key": {` or `"key": [`.
static JSON_OPENER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"\\]+)"\s*:\s*([\{\[])"#).unwrap());

/// First `"key": "value"` in `text`, with JSON escapes decoded.
pub fn json_string_field(text: &str, key: &str) -> Option<String> {
    let raw = JSON_STRING_MEMBER
        .captures_iter(text)
        .find(|caps| &caps[1] == key)?
        .get(2)?
        .as_str();
    clean_text(&decode_json_string(raw))
}

/// First `"key": <number>` in `text`. Quoted numbers are accepted too.
pub fn json_number_field(text: &str, key: &str) -> Option<f64> {
    JSON_NUMBER_MEMBER
        .captures_iter(text)
        .find(|caps| &caps[1] == key)?
        .get(2)?
        .as_str()
        .parse()
        .ok()
}

/// Index just past the first `"key": {` or `"key": [` opener in `text`.
pub fn find_opener(text: &str, key: &str, opener: char) -> Option<usize> {
    JSON_OPENER
        .captures_iter(text)
        .find(|caps| &caps[1] == key && caps[2].starts_with(opener))
        .and_then(|caps| caps.get(0))
        .map(|m| m.end())
}

/// Index just past the JSON string whose opening quote is at `bytes[open]`.
fn skip_json_string(bytes: &[u8], open: usize) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Contents of the object or array opened just before `text`, up to its
/// matching closer. Content cut short runs to the end of `text`.
pub fn enclosed_body(text: &str) -> &str {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i = skip_json_string(bytes, i);
                continue;
            }
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                if depth == 0 {
                    return &text[..i];
                }
                depth -= 1;
            }
            _ => {}
        }
        i += 1;
    }
    text
}

/// `body` with the insides of nested objects and arrays removed, leaving only
/// its own members for key lookups.
pub fn top_level_members(body: &str) -> String {
    let bytes = body.as_bytes();
    let mut out = String::with_capacity(body.len());
    let mut depth = 0usize;
    let mut kept_from = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i = skip_json_string(bytes, i);
                continue;
            }
            b'{' | b'[' => {
                if depth == 0 {
                    out.push_str(&body[kept_from..=i]);
                }
                depth += 1;
            }
            b'}' | b']' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    kept_from = i;
                }
            }
            _ => {}
        }
        i += 1;
    }
    if depth == 0 {
        out.push_str(&body[kept_from..]);
    }
    out
}

/// Contents of the object stored under `key` among `body`'s own members.
pub fn member_object<'a>(body: &'a str, key: &str) -> Option<&'a str> {
    let bytes = body.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let end = skip_json_string(bytes, i);
                if depth == 0 && end > i + 1 && body.get(i + 1..end - 1) == Some(key) {
                    let value = body[end..]
                        .trim_start()
                        .strip_prefix(':')
                        .map(str::trim_start)
                        .and_then(|rest| rest.strip_prefix('{'));
                    if let Some(inner) = value {
                        return Some(enclosed_body(inner));
                    }
                }
                i = end;
                continue;
            }
            b'{' | b'[' => depth += 1,
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }
    None
}

/// `text[start..start + max_len]`, shrunk to a char boundary.
pub fn bounded_slice(text: &str, start: usize, max_len: usize) -> &str {
    let mut end = text.len().min(start.saturating_add(max_len));
    while end > start && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[start..end]
}

/// Decodes JSON string escapes; falls back to the raw text if they are broken.
pub fn decode_json_string(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{raw}\"")).unwrap_or_else(|_| raw.to_string())
}

/// Trims and collapses whitespace; blank input becomes `None`.
pub fn clean_text(value: &str) -> Option<String> {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// `content` of the first `<meta>` whose `property` or `name` equals `key`.
pub fn meta_content(html: &str, key: &str) -> Option<String> {
    for tag in META_TAG.find_iter(html) {
        let mut matched = false;
        let mut content = None;
        for cap in TAG_ATTR.captures_iter(tag.as_str()) {
            let name = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
            let value = cap
                .get(2)
                .or_else(|| cap.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            if (name.eq_ignore_ascii_case("property") || name.eq_ignore_ascii_case("name"))
                && value.eq_ignore_ascii_case(key)
            {
                matched = true;
            } else if name.eq_ignore_ascii_case("content") {
                content = Some(value);
            }
        }
        if matched {
            if let Some(found) = content.and_then(|c| clean_text(&decode_html_entities(c))) {
                return Some(found);
            }
        }
    }
    None
}

pub fn title_tag(html: &str) -> Option<String> {
    let raw = TITLE_TAG.captures(html)?.get(1)?.as_str();
    clean_text(&decode_html_entities(raw))
}

pub fn find_iso_datetime(text: &str) -> Option<String> {
    ISO_DATETIME.find(text).map(|m| m.as_str().to_string())
}

/// Decodes the handful of entities that show up in meta content.
pub fn decode_html_entities(value: &str) -> String {
    let numeric = NUMERIC_ENTITY.replace_all(value, |caps: &regex::Captures| {
        let code = &caps[1];
        let parsed = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        parsed
            .and_then(char::from_u32)
            .map(|c| c.to_string())
            .unwrap_or_else(|| caps[0].to_string())
    });
    numeric
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
