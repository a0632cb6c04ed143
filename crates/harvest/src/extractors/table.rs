// ABOUTME: Structured-table strategy: one staff record per table row.
// ABOUTME: Prefers Sidearm Sports row classes, maps header columns, and tracks category rows as departments.

//! Structured-table extraction.
//!
//! Sidearm Sports directories mark every staff row with
//! `s-table-body__row`; when such rows exist only they are read. Otherwise
//! every table on the page is scanned. A header row with recognizable
//! labels builds a [`ColumnMap`]; without one, the name is the first
//! non-avatar cell and the title the cell after it.

use scraper::{ElementRef, Html};
use tracing::debug;

use super::compiled::{select_all, select_first};
use super::email::extract_email;
use super::fields::{
    clean_text, has_contact_signal, name_and_title, nearest_heading, non_empty, text_segments,
    visible_text,
};
use super::phone::extract_phone;
use crate::record::{Confidence, ExtractionOutcome, StaffRecord, StrategyKind};

const SIDEARM_ROW_CLASS: &str = "s-table-body__row";
const MAX_CATEGORY_LEN: usize = 80;
const MAX_HEADER_LABEL_LEN: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Name,
    Title,
    Email,
    Phone,
    Department,
}

/// Cell positions of the known columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    name: Option<usize>,
    title: Option<usize>,
    email: Option<usize>,
    phone: Option<usize>,
    department: Option<usize>,
}

impl ColumnMap {
    /// Build a map from header labels. At least two known columns, one of
    /// them name or email, are required.
    pub fn from_labels(labels: &[String]) -> Option<Self> {
        let mut map = ColumnMap::default();
        let mut matched = 0;
        for (idx, label) in labels.iter().enumerate() {
            let Some(column) = classify_label(label) else {
                continue;
            };
            let slot = match column {
                Column::Name => &mut map.name,
                Column::Title => &mut map.title,
                Column::Email => &mut map.email,
                Column::Phone => &mut map.phone,
                Column::Department => &mut map.department,
            };
            if slot.is_none() {
                *slot = Some(idx);
                matched += 1;
            }
        }
        if matched >= 2 && (map.name.is_some() || map.email.is_some()) {
            Some(map)
        } else {
            None
        }
    }

    fn record(&self, row: ElementRef, cells: &[ElementRef], url: &str) -> StaffRecord {
        let cell = |idx: Option<usize>| idx.and_then(|i| cells.get(i).copied());

        let email = cell(self.email)
            .and_then(extract_email)
            .or_else(|| extract_email(row));
        let phone = cell(self.phone)
            .and_then(extract_phone)
            .or_else(|| extract_phone(row));

        StaffRecord {
            full_name: cell(self.name).and_then(cell_name),
            title: cell(self.title).and_then(cell_text),
            department: cell(self.department).and_then(cell_text),
            email,
            phone,
            ..StaffRecord::new(url)
        }
    }
}

fn classify_label(label: &str) -> Option<Column> {
    let lowered = label.trim().to_lowercase();
    if lowered.is_empty() || lowered.chars().count() > MAX_HEADER_LABEL_LEN {
        return None;
    }
    if lowered.contains("mail") {
        Some(Column::Email)
    } else if lowered.contains("phone") || lowered == "tel" || lowered.starts_with("tel.") {
        Some(Column::Phone)
    } else if lowered.contains("name") {
        Some(Column::Name)
    } else if lowered.contains("title") || lowered.contains("position") || lowered == "role" {
        Some(Column::Title)
    } else if lowered.contains("department")
        || lowered.contains("sport")
        || lowered.contains("team")
        || lowered == "unit"
    {
        Some(Column::Department)
    } else {
        None
    }
}

/// Run the structured-table strategy over a parsed document.
pub fn extract(doc: &Html, url: &str) -> ExtractionOutcome {
    let root = doc.root_element();
    let sidearm = select_first(root, &format!("tr[class*=\"{}\"]", SIDEARM_ROW_CLASS)).is_some();

    let mut records = Vec::new();
    for table in select_all(root, "table") {
        if sidearm && !has_own_row(table, is_sidearm_row) {
            continue;
        }
        records.extend(extract_table(table, url, sidearm));
    }

    debug!(url, sidearm, rows = records.len(), "structured-table pass");
    ExtractionOutcome::graded(records, StrategyKind::StructuredTable, Confidence::High)
}

fn extract_table(table: ElementRef, url: &str, sidearm_only: bool) -> Vec<StaffRecord> {
    let mut department = select_first(table, "caption")
        .filter(|caption| closest_table(*caption) == Some(table.id()))
        .and_then(|caption| non_empty(visible_text(caption)))
        .or_else(|| nearest_heading(table));
    let mut columns: Option<ColumnMap> = None;
    let mut records = Vec::new();

    for row in own_rows(table) {
        if select_first(row, "table").is_some() {
            continue;
        }
        let cells = row_cells(row);
        if cells.is_empty() {
            continue;
        }

        let all_th = cells.iter().all(|c| c.value().name() == "th");
        if all_th || (columns.is_none() && is_label_row(&cells)) {
            let labels: Vec<String> = cells.iter().map(|c| visible_text(*c)).collect();
            if let Some(map) = ColumnMap::from_labels(&labels) {
                columns = Some(map);
                continue;
            }
        }

        if let Some(category) = category_text(row, &cells) {
            department = Some(category);
            continue;
        }
        if all_th || (sidearm_only && !is_sidearm_row(row)) {
            continue;
        }

        let mut record = match &columns {
            Some(map) => map.record(row, &cells, url),
            None => positional_record(row, &cells, url),
        };
        if record.department.is_none() {
            record.department = department.clone();
        }
        records.push(record);
    }
    records
}

/// Name from the first non-avatar cell, title from the cell after it.
fn positional_record(row: ElementRef, cells: &[ElementRef], url: &str) -> StaffRecord {
    let start = cells
        .iter()
        .position(|cell| !is_avatar_cell(*cell))
        .unwrap_or(cells.len());

    let name_cell = cells.get(start).copied();
    let title = cells.get(start + 1).copied().and_then(cell_text).or_else(|| {
        // Name and title stacked in one cell.
        name_cell.and_then(|cell| name_and_title(&text_segments(cell)).1)
    });

    StaffRecord {
        full_name: name_cell.and_then(cell_name),
        title,
        email: extract_email(row),
        phone: extract_phone(row),
        ..StaffRecord::new(url)
    }
}

fn is_avatar_cell(cell: ElementRef) -> bool {
    visible_text(cell).is_empty() || (select_first(cell, "img").is_some() && cell_name(cell).is_none())
}

/// Link text when the cell links somewhere other than mail/phone, else the cell's first segment.
fn cell_name(cell: ElementRef) -> Option<String> {
    let link_text = select_all(cell, "a[href]")
        .into_iter()
        .filter(|a| {
            let href = a.value().attr("href").unwrap_or_default().to_lowercase();
            !href.starts_with("mailto:") && !href.starts_with("tel:")
        })
        .find_map(|a| name_and_title(&text_segments(a)).0);
    link_text.or_else(|| name_and_title(&text_segments(cell)).0)
}

/// Cell text with contact data and labels removed.
fn cell_text(cell: ElementRef) -> Option<String> {
    clean_text(&text_segments(cell))
}

/// A row naming the section that follows.
///
/// The row must be a single cell or open with a `colspan` cell, carry one
/// short piece of text, and have no links or contact data.
fn category_text(row: ElementRef, cells: &[ElementRef]) -> Option<String> {
    let spans_row = cells.len() == 1
        || cells
            .first()
            .and_then(|c| c.value().attr("colspan"))
            .and_then(|span| span.trim().parse::<usize>().ok())
            .is_some_and(|span| span > 1);
    if !spans_row {
        return None;
    }
    let filled: Vec<String> = cells
        .iter()
        .map(|c| visible_text(*c))
        .filter(|t| !t.is_empty())
        .collect();
    let [text] = filled.as_slice() else {
        return None;
    };
    if text.chars().count() > MAX_CATEGORY_LEN
        || select_first(row, "a[href]").is_some()
        || has_contact_signal(row)
    {
        return None;
    }
    Some(text.clone())
}

/// A `<td>` header row: every non-empty cell is a known column label.
fn is_label_row(cells: &[ElementRef]) -> bool {
    let labels: Vec<String> = cells
        .iter()
        .map(|c| visible_text(*c))
        .filter(|t| !t.is_empty())
        .collect();
    labels.len() >= 2 && labels.iter().all(|l| classify_label(l).is_some())
}

fn is_sidearm_row(row: ElementRef) -> bool {
    row.value()
        .attr("class")
        .is_some_and(|class| class.contains(SIDEARM_ROW_CLASS))
}

fn row_cells(row: ElementRef) -> Vec<ElementRef> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "td" | "th"))
        .collect()
}

/// Rows belonging to this table, not to a table nested inside it.
fn own_rows(table: ElementRef) -> Vec<ElementRef> {
    select_all(table, "tr")
        .into_iter()
        .filter(|row| closest_table(*row) == Some(table.id()))
        .collect()
}

fn has_own_row(table: ElementRef, pred: impl Fn(ElementRef) -> bool) -> bool {
    own_rows(table).into_iter().any(pred)
}

fn closest_table(el: ElementRef) -> Option<ego_tree::NodeId> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "table")
        .map(|a| a.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const URL: &str = "https://valid.edu/staff";

    fn names(outcome: &ExtractionOutcome) -> Vec<Option<String>> {
        outcome.records.iter().map(|r| r.full_name.clone()).collect()
    }

    #[test]
    fn three_row_table_yields_three_records() {
        let doc = Html::parse_document(
            r#"<html><body><h2>Athletics Staff</h2><table>
                <tr><th>Name</th><th>Title</th><th>Email</th><th>Phone</th></tr>
                <tr><td>Jane Doe</td><td>Athletic Director</td><td><a href="mailto:jdoe@valid.edu">jdoe@valid.edu</a></td><td>555-100-0001</td></tr>
                <tr><td>John Smith</td><td>Head Coach</td><td><a href="mailto:jsmith@valid.edu">Email</a></td><td>(555) 100-0002</td></tr>
                <tr><td>Ann Lee</td><td>Trainer</td><td>alee [at] valid [dot] edu</td><td></td></tr>
            </table></body></html>"#,
        );
        let outcome = extract(&doc, URL);

        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.strategy_used, StrategyKind::StructuredTable);
        assert_eq!(outcome.confidence, Confidence::High);

        let first = &outcome.records[0];
        assert_eq!(first.full_name.as_deref(), Some("Jane Doe"));
        assert_eq!(first.title.as_deref(), Some("Athletic Director"));
        assert_eq!(first.email.as_deref(), Some("jdoe@valid.edu"));
        assert_eq!(first.phone.as_deref(), Some("555-100-0001"));
        assert_eq!(first.department.as_deref(), Some("Athletics Staff"));

        assert_eq!(outcome.records[1].email.as_deref(), Some("jsmith@valid.edu"));
        assert_eq!(outcome.records[1].phone.as_deref(), Some("555-100-0002"));
        assert_eq!(outcome.records[2].email.as_deref(), Some("alee@valid.edu"));
        assert!(outcome.records.iter().all(|r| r.source_url == URL));
    }

    #[test]
    fn category_rows_set_department() {
        let doc = Html::parse_document(
            r#"<table>
                <tr><td colspan="3">Football</td></tr>
                <tr><td><img src="a.jpg"></td><td><a href="/bio/1">Pat Coach</a></td><td>Head Coach</td></tr>
                <tr><td colspan="3">Volleyball</td></tr>
                <tr><td><img src="b.jpg"></td><td><a href="/bio/2">Sam Setter</a></td><td>Assistant Coach</td></tr>
            </table>"#,
        );
        let outcome = extract(&doc, URL);
        assert_eq!(
            names(&outcome),
            vec![Some("Pat Coach".to_string()), Some("Sam Setter".to_string())]
        );
        assert_eq!(outcome.records[0].department.as_deref(), Some("Football"));
        assert_eq!(outcome.records[0].title.as_deref(), Some("Head Coach"));
        assert_eq!(outcome.records[1].department.as_deref(), Some("Volleyball"));
        // No contact data at all.
        assert_eq!(outcome.confidence, Confidence::Medium);
    }

    #[test]
    fn sidearm_rows_are_preferred() {
        let doc = Html::parse_document(
            r#"<table class="layout"><tr><td>Site Menu</td><td>Tickets</td></tr></table>
            <table class="sidearm-table">
                <thead><tr><th>Photo</th><th>Name</th><th>Title</th><th>Phone</th><th>Email</th></tr></thead>
                <tbody>
                <tr><th colspan="5">Administration</th></tr>
                <tr class="s-table-body__row"><td><img src="x.jpg"></td><td><a href="/staff/1">Jane Doe</a></td><td>Director of Athletics</td><td>555-200-0001</td><td><a href="mailto:jdoe@valid.edu">Email</a></td></tr>
                <tr class="s-table-body__row"><td><img src="y.jpg"></td><td><a href="/staff/2">John Smith</a></td><td>Senior Associate AD</td><td>555-200-0002</td><td><a href="mailto:jsmith@valid.edu">Email</a></td></tr>
                </tbody>
            </table>"#,
        );
        let outcome = extract(&doc, URL);
        assert_eq!(outcome.records.len(), 2);
        let first = &outcome.records[0];
        assert_eq!(first.full_name.as_deref(), Some("Jane Doe"));
        assert_eq!(first.title.as_deref(), Some("Director of Athletics"));
        assert_eq!(first.email.as_deref(), Some("jdoe@valid.edu"));
        assert_eq!(first.department.as_deref(), Some("Administration"));
    }

    #[test]
    fn td_header_row_builds_column_map() {
        let doc = Html::parse_document(
            r#"<table>
                <tr><td>Email</td><td>Name</td><td>Position</td></tr>
                <tr><td>jdoe@valid.edu</td><td>Jane Doe</td><td>Coach</td></tr>
            </table>"#,
        );
        let outcome = extract(&doc, URL);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].full_name.as_deref(), Some("Jane Doe"));
        assert_eq!(outcome.records[0].title.as_deref(), Some("Coach"));
        assert_eq!(outcome.records[0].email.as_deref(), Some("jdoe@valid.edu"));
    }

    #[test]
    fn nested_layout_tables_are_not_double_counted() {
        let doc = Html::parse_document(
            r#"<table><tr><td>
                <table>
                    <tr><th>Name</th><th>Email</th></tr>
                    <tr><td>Jane Doe</td><td>jdoe@valid.edu</td></tr>
                </table>
            </td></tr></table>"#,
        );
        let outcome = extract(&doc, URL);
        assert_eq!(names(&outcome), vec![Some("Jane Doe".to_string())]);
    }

    #[test]
    fn name_only_row_is_a_person_not_a_category() {
        let doc = Html::parse_document(
            r#"<h2>Staff</h2><table>
                <tr><th>Name</th><th>Title</th><th>Email</th></tr>
                <tr><td>Jane Doe</td><td>Athletic Director</td><td>jdoe@valid.edu</td></tr>
                <tr><td>Sam Jones</td><td></td><td></td></tr>
                <tr><td>John Smith</td><td>Head Coach</td><td>jsmith@valid.edu</td></tr>
            </table>"#,
        );
        let outcome = extract(&doc, URL);
        assert_eq!(
            names(&outcome),
            vec![
                Some("Jane Doe".to_string()),
                Some("Sam Jones".to_string()),
                Some("John Smith".to_string()),
            ]
        );
        assert!(outcome
            .records
            .iter()
            .all(|r| r.department.as_deref() == Some("Staff")));

        let positional = Html::parse_document(
            r#"<table>
                <tr><td>Jane Doe</td><td>Athletic Director</td></tr>
                <tr><td>Sam Jones</td><td></td></tr>
                <tr><td>John Smith</td><td>Head Coach</td></tr>
            </table>"#,
        );
        let outcome = extract(&positional, URL);
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.records[2].department, None);
    }

    #[test]
    fn no_tables_means_no_records() {
        let doc = Html::parse_document("<p>Nothing here</p>");
        let outcome = extract(&doc, URL);
        assert!(!outcome.is_success());
    }

    #[test]
    fn column_map_needs_name_or_email() {
        assert!(ColumnMap::from_labels(&["Title".into(), "Phone".into()]).is_none());
        assert!(ColumnMap::from_labels(&["Name".into(), "Title".into()]).is_some());
        assert!(ColumnMap::from_labels(&["Name".into()]).is_none());
    }
}
