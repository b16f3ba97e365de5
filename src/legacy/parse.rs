use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::{Map, Value};

use crate::legacy::{LegacyAnnotation, LegacySource, non_empty};
use crate::model::BoundingRect;

static CHECKBOX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?P<num>\d+)\.\s+\[(?P<mark>[ xX~\-])\]\s+(?P<title>.+?)\s+[-–—]\s+"(?P<desc>.*)"\s*$"#)
        .unwrap()
});

static DASH_STATUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<num>\d+)\.\s+(?P<title>.+?)\s+-\s+(?P<desc>.+)\s+-\s+\[?(?P<status>[A-Za-z][A-Za-z _-]*?)\]?\s*$")
        .unwrap()
});

static NUMBERED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\d+\.\s+\S").unwrap());

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#{2,3}\s+(?:Task\s+)?#?(?P<num>\d+)\s*[.:)\-–]?\s*(?P<title>.*?)\s*$").unwrap()
});

static ANY_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#{1,6}\s").unwrap());

static BOLD_KV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*]\s+)?\*\*(?P<key>[^*]+?):?\*\*\s*:?\s*(?P<value>.*?)\s*$").unwrap()
});

static PLAIN_KV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[-*]\s+(?P<key>[A-Za-z][A-Za-z _]{0,30}?):\s+(?P<value>.+?)\s*$").unwrap()
});

/// A line or section a parser could not use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub source: LegacySource,
    pub position: usize,
    pub reason: String,
}

impl std::fmt::Display for Skipped {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} #{}: {}", self.source, self.position, self.reason)
    }
}

/// Aggregate of the per-line/per-section outcomes of one parse.
#[derive(Debug, Default, Clone)]
pub struct ParseOutcome {
    pub annotations: Vec<LegacyAnnotation>,
    pub skipped: Vec<Skipped>,
}

impl ParseOutcome {
    fn skip(&mut self, source: LegacySource, position: usize, reason: impl Into<String>) {
        self.skipped.push(Skipped {
            source,
            position,
            reason: reason.into(),
        });
    }
}

/// Parse legacy timestamps: RFC 3339, naive `YYYY-MM-DD HH:MM[:SS]` (read as
/// UTC), a bare date, or epoch seconds/milliseconds.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
    }
    raw.parse::<i64>().ok().and_then(epoch_to_datetime)
}

fn epoch_to_datetime(n: i64) -> Option<DateTime<Utc>> {
    // Anything past ~5138 AD in seconds is really milliseconds.
    if n.abs() >= 100_000_000_000 {
        DateTime::from_timestamp_millis(n)
    } else {
        DateTime::from_timestamp(n, 0)
    }
}

fn first_str(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn first_timestamp(obj: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n.as_i64().and_then(epoch_to_datetime),
        _ => None,
    })
}

fn rect_from(obj: &Map<String, Value>) -> Option<BoundingRect> {
    ["boundingRect", "bounding_rect", "rect", "bounds"]
        .iter()
        .find_map(|k| obj.get(*k))
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// Parse the line-delimited JSON stream. Blank lines are ignored; any line
/// that is not a JSON object is skipped on its own.
pub fn parse_stream(content: &str) -> ParseOutcome {
    let mut out = ParseOutcome::default();
    for (idx, line) in content.lines().enumerate() {
        let position = idx + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let obj = match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(obj)) => obj,
            Ok(_) => {
                out.skip(LegacySource::Stream, position, "not a JSON object");
                continue;
            }
            Err(e) => {
                out.skip(LegacySource::Stream, position, format!("invalid JSON: {e}"));
                continue;
            }
        };

        // Some writers nested the element details under "element".
        let element = obj.get("element").and_then(Value::as_object);

        let mut ann = LegacyAnnotation::new(LegacySource::Stream, position);
        ann.id = first_str(&obj, &["id", "taskId", "annotationId"]);
        ann.title = first_str(&obj, &["title", "elementName", "name", "label"])
            .or_else(|| element.and_then(|e| first_str(e, &["title", "name", "tagName"])));
        ann.comment = first_str(&obj, &["comment", "text", "request", "description", "message"]);
        ann.selector = first_str(&obj, &["selector", "elementSelector", "cssSelector"])
            .or_else(|| element.and_then(|e| first_str(e, &["selector", "cssSelector"])));
        ann.status = first_str(&obj, &["status", "state"]);
        ann.timestamp = first_timestamp(&obj, &["timestamp", "createdAt", "created", "time"]);
        ann.bounding_rect = rect_from(&obj).or_else(|| element.and_then(rect_from));
        ann.screenshot_path = first_str(&obj, &["screenshotPath", "screenshot", "screenshot_path"]);

        if ann.is_blank() {
            out.skip(LegacySource::Stream, position, "no title, comment or selector");
            continue;
        }
        out.annotations.push(ann);
    }
    out
}

fn mark_status(mark: &str) -> &'static str {
    match mark {
        "x" | "X" => "done",
        "~" | "-" => "doing",
        _ => "to-do",
    }
}

fn strip_quotes(text: &str) -> &str {
    let t = text.trim();
    for (open, close) in [('"', '"'), ('“', '”'), ('\'', '\'')] {
        if let Some(inner) = t.strip_prefix(open).and_then(|s| s.strip_suffix(close)) {
            return inner.trim();
        }
    }
    t
}

/// Parse the summary markdown: checkbox lines first, then the older
/// `N. Title - description - status` form. Numbered lines matching neither
/// are reported; everything else (headings, stats, prose) is ignored.
pub fn parse_summary(content: &str) -> ParseOutcome {
    let mut out = ParseOutcome::default();
    for (idx, line) in content.lines().enumerate() {
        let position = idx + 1;
        let mut ann = LegacyAnnotation::new(LegacySource::Summary, position);

        if let Some(caps) = CHECKBOX_RE.captures(line) {
            ann.title = non_empty(&caps["title"]);
            ann.comment = non_empty(&caps["desc"]);
            ann.status = Some(mark_status(&caps["mark"]).to_string());
        } else if let Some(caps) = DASH_STATUS_RE.captures(line) {
            ann.title = non_empty(strip_quotes(&caps["title"]));
            ann.comment = non_empty(strip_quotes(&caps["desc"]));
            ann.status = non_empty(&caps["status"]);
        } else {
            if NUMBERED_RE.is_match(line) {
                out.skip(LegacySource::Summary, position, "numbered line in unknown format");
            }
            continue;
        }

        if ann.comment.is_none() && ann.title.is_none() {
            out.skip(LegacySource::Summary, position, "empty title and description");
            continue;
        }
        out.annotations.push(ann);
    }
    out
}

enum DetailField {
    Id,
    Title,
    Comment,
    Selector,
    Status,
    Timestamp,
    Screenshot,
}

fn detail_field(key: &str) -> Option<DetailField> {
    let key: String = key
        .to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    let field = match key.as_str() {
        "id" | "taskid" | "originalid" => DetailField::Id,
        "title" | "name" => DetailField::Title,
        "request" | "comment" | "description" | "change" | "feedback" | "text" => {
            DetailField::Comment
        }
        "element" | "selector" | "elementselector" | "target" => DetailField::Selector,
        "status" | "state" => DetailField::Status,
        "created" | "createdat" | "timestamp" | "time" | "date" => DetailField::Timestamp,
        "screenshot" | "screenshotpath" => DetailField::Screenshot,
        _ => return None,
    };
    Some(field)
}

fn clean_value(raw: &str) -> String {
    strip_quotes(raw.trim().trim_matches('`')).to_string()
}

fn apply_field(ann: &mut LegacyAnnotation, field: &DetailField, value: &str) {
    let value = clean_value(value);
    match field {
        DetailField::Id => ann.id = non_empty(&value),
        DetailField::Title => ann.title = non_empty(&value),
        DetailField::Comment => ann.comment = non_empty(&value),
        DetailField::Selector => ann.selector = non_empty(&value),
        DetailField::Status => ann.status = non_empty(&value),
        DetailField::Timestamp => ann.timestamp = parse_timestamp(&value),
        DetailField::Screenshot => ann.screenshot_path = non_empty(&value),
    }
}

struct Section {
    ann: LegacyAnnotation,
    /// Field whose value continues on following `>` lines.
    open_field: Option<DetailField>,
    open_text: Vec<String>,
}

impl Section {
    fn close_open_field(&mut self) {
        if let Some(field) = self.open_field.take() {
            let text = self.open_text.join(" ");
            apply_field(&mut self.ann, &field, &text);
            self.open_text.clear();
        }
    }
}

fn finish_section(out: &mut ParseOutcome, section: Option<Section>) {
    let Some(mut section) = section else {
        return;
    };
    section.close_open_field();
    if section.ann.is_blank() {
        let position = section.ann.position;
        out.skip(LegacySource::Detailed, position, "section has no usable fields");
    } else {
        out.annotations.push(section.ann);
    }
}

/// Parse the detailed markdown: one `##`/`###` numbered section per task,
/// fields as `- **Key**: value` (or `- Key: value`) lines. A field whose value
/// is on following `>` quote lines is joined into one line.
pub fn parse_detailed(content: &str) -> ParseOutcome {
    let mut out = ParseOutcome::default();
    let mut current: Option<Section> = None;
    let mut ordinal = 0;

    for line in content.lines() {
        if let Some(caps) = SECTION_RE.captures(line) {
            finish_section(&mut out, current.take());
            ordinal += 1;
            let mut ann = LegacyAnnotation::new(LegacySource::Detailed, ordinal);
            ann.title = non_empty(&caps["title"]);
            current = Some(Section {
                ann,
                open_field: None,
                open_text: Vec::new(),
            });
            continue;
        }
        if ANY_HEADER_RE.is_match(line) {
            finish_section(&mut out, current.take());
            continue;
        }
        let Some(section) = current.as_mut() else {
            continue;
        };

        let trimmed = line.trim();
        if section.open_field.is_some() {
            if let Some(quoted) = trimmed.strip_prefix('>') {
                section.open_text.push(quoted.trim().to_string());
                continue;
            }
            if trimmed.is_empty() && section.open_text.is_empty() {
                continue;
            }
            section.close_open_field();
        }

        let kv = BOLD_KV_RE
            .captures(line)
            .or_else(|| PLAIN_KV_RE.captures(line));
        let Some(caps) = kv else {
            continue;
        };
        let Some(field) = detail_field(&caps["key"]) else {
            continue;
        };
        let value = &caps["value"];
        if value.trim().is_empty() {
            section.open_field = Some(field);
        } else {
            apply_field(&mut section.ann, &field, value);
        }
    }
    finish_section(&mut out, current.take());
    out
}
