// ABOUTME: Pre-compiled CSS selector cache for scraper queries.
// ABOUTME: Strategies and field extractors look selectors up here instead of re-parsing them per fragment.

//! Selector caching for repeated DOM queries.
//!
//! Field extractors run once per staff entry, often hundreds of times per
//! page, with the same handful of selectors. Selectors are compiled once
//! and cloned out of a shared cache.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};

static SELECTOR_CACHE: Lazy<RwLock<HashMap<String, Option<Selector>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Gets or compiles a CSS selector, caching the result.
///
/// Returns `None` for invalid selectors; the failure is cached too.
pub fn get_or_compile(css: &str) -> Option<Selector> {
    {
        let cache = SELECTOR_CACHE.read().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = cache.get(css) {
            return cached.clone();
        }
    }

    let compiled = Selector::parse(css).ok();
    let mut cache = SELECTOR_CACHE.write().unwrap_or_else(|e| e.into_inner());
    if let Some(cached) = cache.get(css) {
        return cached.clone();
    }
    cache.insert(css.to_string(), compiled.clone());
    compiled
}

/// All descendants of `root` matching `css`, in document order.
///
/// An invalid selector matches nothing.
pub fn select_all<'a>(root: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match get_or_compile(css) {
        Some(sel) => root.select(&sel).collect(),
        None => Vec::new(),
    }
}

/// First descendant of `root` matching `css`.
pub fn select_first<'a>(root: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let sel = get_or_compile(css)?;
    root.select(&sel).next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_valid_selector_is_cached() {
        assert!(get_or_compile("tr.s-table-body__row").is_some());
        assert!(get_or_compile("tr.s-table-body__row").is_some());
    }

    #[test]
    fn test_invalid_selector_returns_none() {
        assert!(get_or_compile("[[[invalid").is_none());
        assert!(get_or_compile("[[[invalid").is_none());
    }

    #[test]
    fn test_select_helpers() {
        let doc = Html::parse_document("<dl><dt>A</dt><dd>1</dd><dd>2</dd></dl>");
        let root = doc.root_element();
        assert_eq!(select_all(root, "dd").len(), 2);
        assert_eq!(
            select_first(root, "dt").map(|el| el.inner_html()),
            Some("A".to_string())
        );
        assert!(select_all(root, "[[[invalid").is_empty());
    }
}
