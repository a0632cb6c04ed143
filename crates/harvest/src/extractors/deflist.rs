// ABOUTME: Definition-list strategy: <dt> terms set the department, each <dd> is one staff entry.
// ABOUTME: Name and title come from the entry text once email and phone text is removed.

use scraper::{ElementRef, Html};
use tracing::debug;

use super::compiled::select_all;
use super::fields::{nearest_heading, non_empty, record_from_fragment, visible_text};
use crate::record::{Confidence, ExtractionOutcome, StrategyKind};

/// Run the definition-list strategy over a parsed document.
pub fn extract(doc: &Html, url: &str) -> ExtractionOutcome {
    let mut records = Vec::new();

    for dl in select_all(doc.root_element(), "dl") {
        let mut department = nearest_heading(dl);
        for item in select_all(dl, "dt, dd") {
            if closest_list(item) != Some(dl.id()) {
                continue;
            }
            let text = visible_text(item);
            if text.is_empty() {
                continue;
            }
            match item.value().name() {
                "dt" => department = non_empty(text),
                _ => records.push(record_from_fragment(item, url, department.clone())),
            }
        }
    }

    debug!(url, entries = records.len(), "definition-list pass");
    ExtractionOutcome::graded(records, StrategyKind::DefinitionList, Confidence::Medium)
}

fn closest_list(el: ElementRef) -> Option<ego_tree::NodeId> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "dl")
        .map(|a| a.id())
}
