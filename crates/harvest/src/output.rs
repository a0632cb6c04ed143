// ABOUTME: Writers for the batch outputs: the records file (CSV or JSON) and the plain-text error log.
// ABOUTME: Both files are always produced; an empty CSV still carries its header row.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::batch::BatchReport;
use crate::record::{ErrorEntry, StaffRecord};

/// Column names of the records CSV, in order.
pub const RECORD_HEADERS: [&str; 6] = [
    "Name",
    "Email",
    "Position/Title",
    "Phone",
    "Sport/Department",
    "Source URL",
];

/// Records file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Csv,
        }
    }
}

/// Write records in the given format.
pub fn write_records<W: Write>(
    writer: W,
    records: &[StaffRecord],
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Csv => write_records_csv(writer, records),
        OutputFormat::Json => write_records_json(writer, records),
    }
}

fn write_records_csv<W: Write>(writer: W, records: &[StaffRecord]) -> io::Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(RECORD_HEADERS)?;
    for record in records {
        csv_writer.serialize(record)?;
    }
    csv_writer.flush()
}

fn write_records_json<W: Write>(mut writer: W, records: &[StaffRecord]) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, records)?;
    writeln!(writer)?;
    writer.flush()
}

/// Write one line per error entry.
pub fn write_error_log<W: Write>(mut writer: W, errors: &[ErrorEntry]) -> io::Result<()> {
    for entry in errors {
        writeln!(writer, "{}", entry)?;
    }
    writer.flush()
}

/// Persist a batch report to the records file and the error log.
pub fn write_report(
    report: &BatchReport,
    records_path: impl AsRef<Path>,
    errors_path: impl AsRef<Path>,
    format: OutputFormat,
) -> io::Result<()> {
    let records_file = BufWriter::new(File::create(records_path)?);
    write_records(records_file, &report.records, format)?;

    let errors_file = BufWriter::new(File::create(errors_path)?);
    write_error_log(errors_file, &report.errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Stage;
    use pretty_assertions::assert_eq;

    fn jane() -> StaffRecord {
        StaffRecord {
            full_name: Some("Jane Doe".to_string()),
            email: Some("jdoe@valid.edu".to_string()),
            title: Some("Head Coach, Track".to_string()),
            phone: None,
            department: Some("Track & Field".to_string()),
            source_url: "https://valid.edu/staff".to_string(),
        }
    }

    #[test]
    fn csv_has_header_and_quoted_fields() {
        let mut out = Vec::new();
        write_records(&mut out, &[jane()], OutputFormat::Csv).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "Name,Email,Position/Title,Phone,Sport/Department,Source URL\n\
             Jane Doe,jdoe@valid.edu,\"Head Coach, Track\",,Track & Field,https://valid.edu/staff\n"
        );
    }

    #[test]
    fn empty_csv_keeps_header() {
        let mut out = Vec::new();
        write_records(&mut out, &[], OutputFormat::Csv).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Name,Email,Position/Title,Phone,Sport/Department,Source URL\n"
        );
    }

    #[test]
    fn json_uses_column_names() {
        let mut out = Vec::new();
        write_records(&mut out, &[jane()], OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[0]["Name"], "Jane Doe");
        assert_eq!(value[0]["Phone"], serde_json::Value::Null);
        assert_eq!(value[0]["Source URL"], "https://valid.edu/staff");
    }

    #[test]
    fn error_log_lines() {
        let errors = vec![
            ErrorEntry {
                url: "https://dead.edu/404".to_string(),
                stage: Stage::Fetch,
                message: "HTTP error status: HTTP status 404".to_string(),
            },
            ErrorEntry {
                url: "https://plain.edu/about".to_string(),
                stage: Stage::Parse,
                message: "no recognizable staff structure".to_string(),
            },
        ];
        let mut out = Vec::new();
        write_error_log(&mut out, &errors).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[fetch] https://dead.edu/404 - HTTP error status: HTTP status 404\n\
             [parse] https://plain.edu/about - no recognizable staff structure\n"
        );
    }

    #[test]
    fn write_report_creates_both_files_even_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let records = dir.path().join("staff_directory.csv");
        let errors = dir.path().join("scrape_errors.txt");

        write_report(&BatchReport::default(), &records, &errors, OutputFormat::Csv).unwrap();

        assert!(std::fs::read_to_string(&records)
            .unwrap()
            .starts_with("Name,Email"));
        assert_eq!(std::fs::read_to_string(&errors).unwrap(), "");
    }

    #[test]
    fn format_parsing() {
        assert_eq!(OutputFormat::from("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from("csv"), OutputFormat::Csv);
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }
}
