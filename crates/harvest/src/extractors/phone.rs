// ABOUTME: Phone number extraction and normalization.
// ABOUTME: Reads tel: links first, then North American number patterns in visible text.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;

use super::compiled::select_all;
use super::fields::visible_text;

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:\+?1[\s.\-]?)?\(?\b(\d{3})\)?[\s.\-]?(\d{3})[\s.\-]?(\d{4})\b(?:\s*(?:x|ext\.?|extension)\s*(\d{1,6}))?",
    )
    .unwrap()
});

/// Extract and normalize the first phone number in a fragment.
pub fn extract_phone(fragment: ElementRef) -> Option<String> {
    for link in select_all(fragment, "a[href]") {
        let href = link.value().attr("href").unwrap_or_default().trim();
        let Some(number) = href
            .get(..4)
            .filter(|scheme| scheme.eq_ignore_ascii_case("tel:"))
            .map(|_| &href[4..])
        else {
            continue;
        };
        if let Some(phone) = normalize_digits(number) {
            return Some(phone);
        }
    }
    find_phone(&visible_text(fragment))
}

/// Find the first phone number in free text, normalized to `NNN-NNN-NNNN`.
pub fn find_phone(text: &str) -> Option<String> {
    let caps = PHONE_RE.captures(text)?;
    let mut phone = format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]);
    if let Some(ext) = caps.get(4) {
        phone.push_str(" x");
        phone.push_str(ext.as_str());
    }
    Some(phone)
}

/// Remove phone numbers from text.
pub fn strip_phones(text: &str) -> String {
    PHONE_RE
        .replace_all(text, "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a bare dialing string such as a `tel:` target.
fn normalize_digits(raw: &str) -> Option<String> {
    let (main, ext) = match raw.find([',', ';', 'x', 'X']) {
        Some(idx) => (&raw[..idx], Some(&raw[idx + 1..])),
        None => (raw, None),
    };
    let mut digits: String = main.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 11 && digits.starts_with('1') {
        digits.remove(0);
    }
    if digits.len() != 10 {
        return None;
    }
    let mut phone = format!("{}-{}-{}", &digits[..3], &digits[3..6], &digits[6..]);
    let ext_digits: String = ext
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    if !ext_digits.is_empty() {
        phone.push_str(" x");
        phone.push_str(&ext_digits);
    }
    Some(phone)
}
