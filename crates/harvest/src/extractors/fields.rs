// ABOUTME: Shared field helpers for staff entries: visible text, name/title splitting, and department headings.
// ABOUTME: Builds StaffRecords from DOM fragments; absence of a field is an empty value, never an error.

//! Field extraction utilities.
//!
//! Key behaviors:
//! - Only visible text counts; `script`, `style`, `noscript` and hidden
//!   subtrees are skipped.
//! - Whitespace is normalized (collapsed to single spaces, trimmed).
//! - Email and phone text is removed before a fragment's remaining text
//!   segments are read as name and title.
//! - The department is the nearest preceding heading, never an `h1`.

use ego_tree::NodeRef;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Node};

use super::compiled::select_all;
use super::email::{extract_email, strip_emails};
use super::phone::{extract_phone, strip_phones};
use crate::record::StaffRecord;

const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];

const HEADING_SELECTOR: &str = "h2, h3, h4, h5, h6, [role=heading], caption, legend";

const MAX_HEADING_LEN: usize = 120;

static LABEL_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:e-?mail|phone|tel|telephone|office|fax|cell|mobile|name|title|position)\s*:\s*")
        .unwrap()
});

const LABELS: &[&str] = &[
    "email",
    "e-mail",
    "phone",
    "tel",
    "telephone",
    "office",
    "fax",
    "bio",
    "full bio",
    "view bio",
    "profile",
    "view profile",
    "vcard",
    "contact",
    "email protected",
];

/// Collapse whitespace runs into single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Wrap a trimmed, non-empty string.
pub fn non_empty(s: impl AsRef<str>) -> Option<String> {
    let normalized = normalize_whitespace(s.as_ref());
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Visible text of an element as normalized segments, one per text node.
pub fn text_segments(el: ElementRef) -> Vec<String> {
    let mut out = Vec::new();
    collect_segments(*el, &mut out);
    out
}

fn collect_segments(node: NodeRef<'_, Node>, out: &mut Vec<String>) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => {
                let normalized = normalize_whitespace(text);
                if !normalized.is_empty() {
                    out.push(normalized);
                }
            }
            Node::Element(element) => {
                if HIDDEN_TAGS.contains(&element.name()) || element.attr("hidden").is_some() {
                    continue;
                }
                collect_segments(child, out);
            }
            _ => {}
        }
    }
}

/// Visible text of an element, whitespace-normalized.
pub fn visible_text(el: ElementRef) -> String {
    text_segments(el).join(" ")
}

/// True when the fragment carries an email address or a phone number.
pub fn has_contact_signal(el: ElementRef) -> bool {
    extract_email(el).is_some() || extract_phone(el).is_some()
}

/// A short run of words with letters and no digits.
pub fn looks_like_name(s: &str) -> bool {
    let words = s.split_whitespace().count();
    (1..=6).contains(&words)
        && s.chars().count() <= 60
        && s.chars().any(char::is_alphabetic)
        && !s.chars().any(|c| c.is_ascii_digit())
}

/// Whether the text is a field label ("Email:", "Bio", ...) rather than data.
pub fn is_label(s: &str) -> bool {
    let lowered = s
        .trim()
        .trim_end_matches(':')
        .trim_matches(|c: char| c == '[' || c == ']')
        .to_lowercase();
    LABELS.contains(&lowered.as_str())
}

/// Strip contact data and labels from one text segment.
fn clean_segment(segment: &str) -> Option<String> {
    let without_contact = strip_phones(&strip_emails(segment));
    let without_label = LABEL_PREFIX_RE.replace(&without_contact, "");
    let trimmed = without_label.trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, '|' | ',' | '-' | '–' | '—' | ':' | '•' | '/')
    });
    if trimmed.is_empty() || is_label(trimmed) || !trimmed.chars().any(char::is_alphabetic) {
        return None;
    }
    Some(trimmed.to_string())
}

/// Segments with contact data and labels removed; empty ones dropped.
pub fn clean_segments(segments: &[String]) -> Vec<String> {
    segments.iter().filter_map(|s| clean_segment(s)).collect()
}

/// Segments with contact data and labels removed, joined by spaces.
pub fn clean_text(segments: &[String]) -> Option<String> {
    let parts = clean_segments(segments);
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Read name and title from an entry's text segments.
///
/// The first remaining segment is the name and the second the title. A
/// single segment such as "Jane Doe - Head Coach" is split on a dash, a
/// pipe, or a comma following a two-to-four word name.
pub fn name_and_title(segments: &[String]) -> (Option<String>, Option<String>) {
    let parts = clean_segments(segments);
    match parts.as_slice() {
        [] => (None, None),
        [single] => split_name_title(single),
        [name, title, ..] => (Some(name.clone()), Some(title.clone())),
    }
}

fn split_name_title(text: &str) -> (Option<String>, Option<String>) {
    for sep in [" - ", " – ", " — ", " | "] {
        if let Some((name, title)) = text.split_once(sep) {
            let (name, title) = (name.trim(), title.trim());
            if !name.is_empty() && !title.is_empty() {
                return (Some(name.to_string()), Some(title.to_string()));
            }
        }
    }
    if let Some((name, title)) = text.split_once(", ") {
        let words = name.split_whitespace().count();
        if (2..=4).contains(&words) && !title.trim().is_empty() {
            return (Some(name.trim().to_string()), Some(title.trim().to_string()));
        }
    }
    (Some(text.to_string()), None)
}

/// Text of the nearest heading preceding `el` in document order.
///
/// Walks previous siblings, then the ancestors' previous siblings, up to
/// `<body>`. A preceding sibling is searched for its last heading unless it
/// carries contact data itself (another staff entry's heading is a name,
/// not a department).
pub fn nearest_heading(el: ElementRef) -> Option<String> {
    let mut current: NodeRef<'_, Node> = *el;
    loop {
        for sibling in current.prev_siblings() {
            let Some(sibling) = ElementRef::wrap(sibling) else {
                continue;
            };
            if is_heading(sibling) {
                if let Some(text) = heading_text(sibling) {
                    return Some(text);
                }
                continue;
            }
            let Some(text) = last_heading_within(sibling) else {
                continue;
            };
            if !has_contact_signal(sibling) {
                return Some(text);
            }
        }

        let parent = current.parent()?;
        match ElementRef::wrap(parent) {
            Some(p) if !matches!(p.value().name(), "body" | "html") => current = parent,
            _ => return None,
        }
    }
}

/// Whether the element acts as a section heading.
pub fn is_heading(el: ElementRef) -> bool {
    let element = el.value();
    matches!(
        element.name(),
        "h2" | "h3" | "h4" | "h5" | "h6" | "caption" | "legend"
    ) || element.attr("role") == Some("heading")
}

fn heading_text(el: ElementRef) -> Option<String> {
    let text = visible_text(el);
    if text.is_empty() || text.chars().count() > MAX_HEADING_LEN {
        None
    } else {
        Some(text)
    }
}

fn last_heading_within(el: ElementRef) -> Option<String> {
    select_all(el, HEADING_SELECTOR)
        .into_iter()
        .rev()
        .find_map(heading_text)
}

/// A fragment that reads like one person: contact data plus a name.
pub fn is_person_like(el: ElementRef) -> bool {
    if !has_contact_signal(el) {
        return false;
    }
    let (name, _) = name_and_title(&text_segments(el));
    name.is_some_and(|n| looks_like_name(&n))
}

/// Build a record from a whole-entry fragment.
pub fn record_from_fragment(
    fragment: ElementRef,
    source_url: &str,
    department: Option<String>,
) -> StaffRecord {
    let (full_name, title) = name_and_title(&text_segments(fragment));
    StaffRecord {
        full_name,
        title,
        email: extract_email(fragment),
        phone: extract_phone(fragment),
        department,
        ..StaffRecord::new(source_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::compiled::select_first;
    use pretty_assertions::assert_eq;
    use scraper::Html;

    fn segs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn visible_text_skips_scripts_and_styles() {
        let doc = Html::parse_fragment(
            "<div>Jane <style>.x{}</style>Doe<script>var a = 1;</script><noscript>enable js</noscript></div>",
        );
        let div = select_first(doc.root_element(), "div").unwrap();
        assert_eq!(visible_text(div), "Jane Doe");
        assert_eq!(text_segments(div), segs(&["Jane", "Doe"]));
    }

    #[test]
    fn name_and_title_from_segments() {
        assert_eq!(
            name_and_title(&segs(&["Jane Doe", "Head Coach", "jdoe@state.edu", "555-123-4567"])),
            (Some("Jane Doe".to_string()), Some("Head Coach".to_string()))
        );
    }

    #[test]
    fn labels_are_dropped() {
        assert_eq!(
            name_and_title(&segs(&["Email:", "jdoe@state.edu", "Jane Doe", "Phone: 555-123-4567", "Bio"])),
            (Some("Jane Doe".to_string()), None)
        );
    }

    #[test]
    fn single_segment_is_split() {
        assert_eq!(
            name_and_title(&segs(&["Jane Doe - Head Coach"])),
            (Some("Jane Doe".to_string()), Some("Head Coach".to_string()))
        );
        assert_eq!(
            name_and_title(&segs(&["John Smith, Assistant Coach jsmith@state.edu"])),
            (Some("John Smith".to_string()), Some("Assistant Coach".to_string()))
        );
        assert_eq!(
            name_and_title(&segs(&["Doe, Jane"])),
            (Some("Doe, Jane".to_string()), None)
        );
    }

    #[test]
    fn clean_text_keeps_commas_inside_segments() {
        assert_eq!(
            clean_text(&segs(&["Head Coach, Men's Soccer", "Email:", "coach@state.edu"])),
            Some("Head Coach, Men's Soccer".to_string())
        );
        assert_eq!(clean_text(&segs(&["Phone:", "555-123-4567"])), None);
    }

    #[test]
    fn looks_like_name_rejects_long_or_numeric_text() {
        assert!(looks_like_name("Jane Doe"));
        assert!(!looks_like_name("Room 204"));
        assert!(!looks_like_name(
            "This is a long paragraph describing the department and its many goals"
        ));
    }

    #[test]
    fn nearest_heading_walks_siblings_and_ancestors() {
        let doc = Html::parse_document(
            r#"<body>
                <h1>Staff Directory</h1>
                <h2>Football</h2>
                <div class="wrap"><dl id="target"><dd>x</dd></dl></div>
            </body>"#,
        );
        let dl = select_first(doc.root_element(), "#target").unwrap();
        assert_eq!(nearest_heading(dl), Some("Football".to_string()));
    }

    #[test]
    fn nearest_heading_ignores_h1_and_contact_blocks() {
        let doc = Html::parse_document(
            r#"<body>
                <h1>Staff Directory</h1>
                <div class="card"><h3>Jane Doe</h3><a href="mailto:jdoe@state.edu">Email</a></div>
                <div class="card" id="target"><h3>John Smith</h3></div>
            </body>"#,
        );
        let card = select_first(doc.root_element(), "#target").unwrap();
        assert_eq!(nearest_heading(card), None);
    }

    #[test]
    fn nearest_heading_descends_into_section_wrappers() {
        let doc = Html::parse_document(
            r#"<body>
                <section><header><h2>Women's Soccer</h2></header></section>
                <table id="target"><tr><td>x</td></tr></table>
            </body>"#,
        );
        let table = select_first(doc.root_element(), "#target").unwrap();
        assert_eq!(nearest_heading(table), Some("Women's Soccer".to_string()));
    }

    #[test]
    fn record_from_fragment_collects_all_fields() {
        let doc = Html::parse_fragment(
            r#"<div class="staff"><strong>Jane Doe</strong><span>Head Coach</span>
               <a href="mailto:jdoe@state.edu">jdoe@state.edu</a> <a href="tel:5551234567">555.123.4567</a></div>"#,
        );
        let div = select_first(doc.root_element(), "div").unwrap();
        let record = record_from_fragment(div, "https://state.edu/staff", Some("Track".to_string()));
        assert_eq!(record.full_name.as_deref(), Some("Jane Doe"));
        assert_eq!(record.title.as_deref(), Some("Head Coach"));
        assert_eq!(record.email.as_deref(), Some("jdoe@state.edu"));
        assert_eq!(record.phone.as_deref(), Some("555-123-4567"));
        assert_eq!(record.department.as_deref(), Some("Track"));
        assert_eq!(record.source_url, "https://state.edu/staff");
    }

    #[test]
    fn person_like_requires_contact_and_name() {
        let doc = Html::parse_fragment(
            r#"<li id="a">Jane Doe <a href="mailto:jdoe@state.edu">Email</a></li><li id="b">Jane Doe</li>"#,
        );
        let a = select_first(doc.root_element(), "#a").unwrap();
        let b = select_first(doc.root_element(), "#b").unwrap();
        assert!(is_person_like(a));
        assert!(!is_person_like(b));
    }
}
