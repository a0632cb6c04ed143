// ABOUTME: Repeated-block strategy: finds sibling elements that share a tag+class signature and read like people.
// ABOUTME: Covers card grids, list items, and flat heading-then-paragraph layouts.

//! Repeated-block extraction.
//!
//! Staff cards are usually siblings with the same tag and class list. A
//! sibling group qualifies when at least two members, and at least half of
//! them, carry contact data next to a name. Only the innermost qualifying
//! blocks are used, so a section wrapper never swallows its cards.
//!
//! Flat layouts (`<h3>Name</h3><p>Title, email</p>` repeated) are detected
//! when every member is preceded by its own heading-like sibling; the name
//! then comes from that sibling.

use std::collections::HashSet;

use ego_tree::NodeId;
use scraper::{ElementRef, Html};
use tracing::debug;

use super::compiled::{select_all, select_first};
use super::email::extract_email;
use super::fields::{
    clean_segments, clean_text, is_heading, is_person_like, looks_like_name, name_and_title,
    nearest_heading, non_empty, text_segments, visible_text,
};
use super::phone::extract_phone;
use crate::record::{Confidence, ExtractionOutcome, StaffRecord, StrategyKind};

const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "head", "meta", "link", "br", "hr", "option", "svg",
    "img", "tr", "td", "th", "thead", "tbody", "dt", "dd",
];

const NAME_SELECTORS: &[&str] = &[
    "[class*=\"name\"]",
    "h2, h3, h4, h5, h6",
    "strong, b",
];

const TITLE_SELECTOR: &str =
    "[class*=\"title\"], [class*=\"position\"], [class*=\"role\"], [class*=\"job\"]";

/// A qualifying block plus the sibling that names it in flat layouts.
#[derive(Clone, Copy)]
struct Block<'a> {
    el: ElementRef<'a>,
    lead: Option<ElementRef<'a>>,
}

/// Run the repeated-block strategy over a parsed document.
pub fn extract(doc: &Html, url: &str) -> ExtractionOutcome {
    let root = doc.root_element();
    let body = select_first(root, "body").unwrap_or(root);

    let mut candidates: Vec<Block> = Vec::new();
    let parents = std::iter::once(body).chain(select_all(body, "*"));
    for parent in parents {
        for group in sibling_groups(parent) {
            candidates.extend(qualifying_blocks(&group));
        }
    }

    let ids: HashSet<NodeId> = candidates.iter().map(|b| b.el.id()).collect();
    let mut innermost: Vec<Block> = candidates
        .into_iter()
        .filter(|block| {
            !block
                .el
                .descendants()
                .skip(1)
                .any(|node| ids.contains(&node.id()))
        })
        .collect();
    innermost.sort_by_key(|b| document_position(body, b.el));

    let records: Vec<StaffRecord> = innermost
        .iter()
        .map(|block| block_record(*block, url))
        .collect();

    debug!(url, blocks = records.len(), "repeated-block pass");
    ExtractionOutcome::graded(records, StrategyKind::RepeatedBlock, Confidence::Low)
}

/// Element children of `parent` grouped by tag and class list, in first-seen order.
fn sibling_groups(parent: ElementRef) -> Vec<Vec<ElementRef>> {
    let mut keys: Vec<String> = Vec::new();
    let mut groups: Vec<Vec<ElementRef>> = Vec::new();
    for child in parent.children().filter_map(ElementRef::wrap) {
        if SKIPPED_TAGS.contains(&child.value().name()) {
            continue;
        }
        let key = signature(child);
        match keys.iter().position(|k| *k == key) {
            Some(idx) => groups[idx].push(child),
            None => {
                keys.push(key);
                groups.push(vec![child]);
            }
        }
    }
    groups.retain(|g| g.len() >= 2);
    groups
}

fn signature(el: ElementRef) -> String {
    let mut classes: Vec<&str> = el.value().classes().collect();
    classes.sort_unstable();
    format!("{}.{}", el.value().name(), classes.join("."))
}

fn qualifying_blocks<'a>(group: &[ElementRef<'a>]) -> Vec<Block<'a>> {
    let flat = group.iter().all(|el| lead_heading(*el).is_some());

    let person: Vec<bool> = group
        .iter()
        .map(|el| {
            if flat {
                extract_email(*el).is_some() || extract_phone(*el).is_some()
            } else {
                is_person_like(*el)
            }
        })
        .collect();
    let hits = person.iter().filter(|p| **p).count();
    if hits < 2 || hits * 2 < group.len() {
        return Vec::new();
    }

    group
        .iter()
        .zip(person)
        .filter(|(el, is_person)| *is_person || has_name_and_title(**el))
        .map(|(el, _)| Block {
            el: *el,
            lead: if flat { lead_heading(*el) } else { None },
        })
        .collect()
}

fn has_name_and_title(el: ElementRef) -> bool {
    match name_and_title(&text_segments(el)) {
        (Some(name), Some(_)) => looks_like_name(&name),
        _ => false,
    }
}

/// The heading-like element directly before `el`, when it names a person.
fn lead_heading(el: ElementRef) -> Option<ElementRef> {
    let prev = el.prev_siblings().find_map(ElementRef::wrap)?;
    let heading_like = matches!(
        prev.value().name(),
        "h2" | "h3" | "h4" | "h5" | "h6" | "strong" | "b"
    );
    if heading_like && looks_like_name(&visible_text(prev)) {
        Some(prev)
    } else {
        None
    }
}

fn block_record(block: Block, url: &str) -> StaffRecord {
    let parts = clean_segments(&text_segments(block.el));

    let (full_name, department) = match block.lead {
        Some(lead) => (clean_text(&text_segments(lead)), flat_department(lead)),
        None => (block_name(block.el), nearest_heading(block.el)),
    };

    let title = select_first(block.el, TITLE_SELECTOR)
        .and_then(|el| clean_text(&text_segments(el)))
        .filter(|t| Some(t) != full_name.as_ref())
        .or_else(|| {
            parts
                .iter()
                .find(|p| !full_name.as_deref().is_some_and(|n| n.contains(p.as_str())))
                .cloned()
        });

    StaffRecord {
        full_name,
        title,
        email: extract_email(block.el),
        phone: extract_phone(block.el),
        department,
        ..StaffRecord::new(url)
    }
}

/// In flat layouts the other leads are headings too; skip past them.
fn flat_department(lead: ElementRef) -> Option<String> {
    let lead_tag = lead.value().name();
    for sibling in lead.prev_siblings().filter_map(ElementRef::wrap) {
        if sibling.value().name() != lead_tag && is_heading(sibling) {
            return non_empty(visible_text(sibling));
        }
    }
    lead.parent()
        .and_then(ElementRef::wrap)
        .filter(|parent| !matches!(parent.value().name(), "body" | "html"))
        .and_then(nearest_heading)
}

fn block_name(el: ElementRef) -> Option<String> {
    for css in NAME_SELECTORS {
        let found = select_all(el, css)
            .into_iter()
            .filter_map(|candidate| clean_text(&text_segments(candidate)))
            .find(|text| looks_like_name(text));
        if found.is_some() {
            return found;
        }
    }
    name_and_title(&text_segments(el)).0
}

fn document_position(body: ElementRef, el: ElementRef) -> usize {
    body.descendants()
        .position(|node| node.id() == el.id())
        .unwrap_or(usize::MAX)
}
