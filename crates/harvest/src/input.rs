// ABOUTME: Reads the newline-delimited list of directory URLs.
// ABOUTME: Strips a UTF-8 BOM, skips blanks and comments, takes the first CSV field, and keeps http(s) entries only.

use std::fs;
use std::io;
use std::path::Path;

use tracing::warn;

/// Parse URL list text into the URLs to harvest, in order.
///
/// Lines that do not start with `http` are logged and skipped.
pub fn parse_url_list(text: &str) -> Vec<String> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut urls = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let first_field = line
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
            .trim_matches('"')
            .trim();
        if first_field.to_ascii_lowercase().starts_with("http") {
            urls.push(first_field.to_string());
        } else {
            warn!(line = idx + 1, entry = first_field, "skipping non-URL entry");
        }
    }
    urls
}

/// Read and parse a URL list file.
pub fn read_url_list(path: impl AsRef<Path>) -> io::Result<Vec<String>> {
    let text = fs::read_to_string(path)?;
    Ok(parse_url_list(&text))
}
