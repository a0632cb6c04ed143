// ABOUTME: Email extraction and deobfuscation for staff entries.
// ABOUTME: Handles mailto links, plain text, Cloudflare protection, script literals, [at]/[dot] text, and reversed strings.

//! Email extraction.
//!
//! Candidates are tried in a fixed order and the first one passing
//! [`is_valid_email`] wins. Nothing is ever guessed: when no candidate
//! validates, the field stays empty.

use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use scraper::ElementRef;

use super::compiled::select_all;
use super::fields::visible_text;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[a-z0-9._%+\-]+@[a-z0-9\-]+(?:\.[a-z0-9\-]+)*\.[a-z]{2,}").unwrap()
});

static VALID_EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[a-z0-9._%+\-]+@[a-z0-9](?:[a-z0-9\-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9\-]*[a-z0-9])?)*\.[a-z]{2,}$")
        .unwrap()
});

// local, at-separator, domain with dot-separators
static OBFUSCATED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)([a-z0-9._%+\-]+)(\s*[\[\(\{<]\s*at\s*[\]\)\}>]\s*|\s+at\s+|\s*@\s*)([a-z0-9\-]+(?:(?:\s*[\[\(\{<]\s*dot\s*[\]\)\}>]\s*|\s+dot\s+|\.|\s+\.\s+)[a-z0-9\-]+)+)",
    )
    .unwrap()
});

static DOT_SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*[\[\(\{<]\s*dot\s*[\]\)\}>]\s*|\s+dot\s+|\s+\.\s+|\.").unwrap()
});

static WORD_DOT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bdot\b").unwrap());

static STRING_LITERAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)""#).unwrap());

const CLOUDFLARE_PATH: &str = "/cdn-cgi/l/email-protection#";

/// Syntactic email check: one `@`, dotted domain, alphabetic TLD, no empty labels.
pub fn is_valid_email(candidate: &str) -> bool {
    if candidate.len() > 254 || !VALID_EMAIL_RE.is_match(candidate) {
        return false;
    }
    let Some((local, _)) = candidate.split_once('@') else {
        return false;
    };
    !(local.starts_with('.') || local.ends_with('.') || local.contains(".."))
}

/// Extract the best email address from a staff entry fragment.
pub fn extract_email(fragment: ElementRef) -> Option<String> {
    from_mailto_links(fragment)
        .or_else(|| find_plain(&visible_text(fragment)))
        .or_else(|| from_cloudflare(fragment))
        .or_else(|| from_scripts(fragment))
        .or_else(|| {
            let text = visible_text(fragment);
            find_substituted(&text).or_else(|| find_reversed(&text))
        })
}

/// Find an address in free text, trying plain, substituted, then reversed forms.
pub fn find_email_in_text(text: &str) -> Option<String> {
    find_plain(text)
        .or_else(|| find_substituted(text))
        .or_else(|| find_reversed(text))
}

/// Remove plain and substituted addresses from text (used before name/title splitting).
pub fn strip_emails(text: &str) -> String {
    let without_obfuscated = OBFUSCATED_RE.replace_all(text, |caps: &regex::Captures| {
        match reconstruct(caps) {
            Some(_) => String::new(),
            None => caps[0].to_string(),
        }
    });
    let without_plain = EMAIL_RE.replace_all(&without_obfuscated, "");
    without_plain
        .split_whitespace()
        .filter(|token| !is_reversed_email(token))
        .collect::<Vec<_>>()
        .join(" ")
}

fn from_mailto_links(fragment: ElementRef) -> Option<String> {
    for link in select_all(fragment, "a[href]") {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        let Some(target) = strip_prefix_ignore_case(href, "mailto:") else {
            continue;
        };

        let text = visible_text(link);
        if text.contains('@') {
            if let Some(email) = clean_candidate(&text) {
                return Some(email);
            }
        }

        let address = target.split('?').next().unwrap_or_default();
        let decoded = percent_decode_str(address).decode_utf8_lossy();
        for part in decoded.split([',', ';']) {
            if let Some(email) = clean_candidate(part) {
                return Some(email);
            }
        }

        if let Some(email) = find_substituted(&text) {
            return Some(email);
        }
    }
    None
}

fn from_cloudflare(fragment: ElementRef) -> Option<String> {
    for el in select_all(fragment, "[data-cfemail]") {
        if let Some(email) = el
            .value()
            .attr("data-cfemail")
            .and_then(decode_cfemail)
            .and_then(|s| clean_candidate(&s))
        {
            return Some(email);
        }
    }
    for link in select_all(fragment, "a[href]") {
        let href = link.value().attr("href").unwrap_or_default();
        if let Some(idx) = href.find(CLOUDFLARE_PATH) {
            let hex = &href[idx + CLOUDFLARE_PATH.len()..];
            if let Some(email) = decode_cfemail(hex).and_then(|s| clean_candidate(&s)) {
                return Some(email);
            }
        }
    }
    None
}

/// Decode a Cloudflare-protected address: hex bytes, first byte is the XOR key.
pub fn decode_cfemail(hex: &str) -> Option<String> {
    let hex = hex.trim();
    if hex.len() < 4 || hex.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    let key = bytes[0];
    let decoded: Vec<u8> = bytes[1..].iter().map(|b| b ^ key).collect();
    String::from_utf8(decoded).ok()
}

fn from_scripts(fragment: ElementRef) -> Option<String> {
    for script in select_all(fragment, "script") {
        let source: String = script.text().collect();
        if let Some(email) = email_from_script(&source) {
            return Some(email);
        }
    }
    None
}

/// Join the string literals of an inline script and scan the result.
///
/// Covers `document.write('jdoe' + '@' + 'example.edu')` style injection.
pub fn email_from_script(source: &str) -> Option<String> {
    let joined: String = STRING_LITERAL_RE
        .captures_iter(source)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str())
        .collect();
    let joined = joined
        .replace("&#64;", "@")
        .replace("&#046;", ".")
        .replace("&#46;", ".")
        .replace("\\x40", "@")
        .replace("\\u0040", "@");
    find_plain(&joined).or_else(|| find_substituted(&joined))
}

fn find_plain(text: &str) -> Option<String> {
    EMAIL_RE
        .find_iter(text)
        .find_map(|m| clean_candidate(m.as_str()))
}

/// Rebuild `jdoe [at] example [dot] edu` style addresses.
fn find_substituted(text: &str) -> Option<String> {
    OBFUSCATED_RE.captures_iter(text).find_map(|caps| reconstruct(&caps))
}

fn reconstruct(caps: &regex::Captures) -> Option<String> {
    let local = caps.get(1)?.as_str();
    let separator = caps.get(2)?.as_str();
    let domain = caps.get(3)?.as_str();

    // A bare " at " only counts when the domain also spells out "dot";
    // otherwise "Coach at Example.edu" would become an address.
    let bare_at = !separator.contains(['[', '(', '{', '<', '@']);
    if bare_at && !WORD_DOT_RE.is_match(domain) {
        return None;
    }

    let domain = DOT_SEPARATOR_RE.replace_all(domain, ".");
    clean_candidate(&format!("{}@{}", local, domain))
}

fn find_reversed(text: &str) -> Option<String> {
    text.split_whitespace().find_map(|token| {
        let token = trim_token(token);
        if is_reversed_email(token) {
            Some(token.chars().rev().collect())
        } else {
            None
        }
    })
}

/// A token whose forward form is invalid but whose reversal is a valid address.
fn is_reversed_email(token: &str) -> bool {
    let token = trim_token(token);
    if !token.contains('@') || is_valid_email(token) {
        return false;
    }
    let reversed: String = token.chars().rev().collect();
    is_valid_email(&reversed)
}

fn trim_token(token: &str) -> &str {
    token.trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '"' | '\'' | '(' | ')' | '<' | '>'))
}

fn clean_candidate(raw: &str) -> Option<String> {
    let trimmed = raw
        .trim()
        .trim_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '<' | '>' | '"' | '\'' | '(' | ')'));
    if is_valid_email(trimmed) {
        Some(trimmed.to_string())
    } else {
        None
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}
