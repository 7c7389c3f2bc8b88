use crate::{
    models::{fields, GrantRecord},
    Error, Result,
};
use chrono::NaiveDate;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// MIME type of the CSV export
pub const CSV_MIME_TYPE: &str = "text/csv";

/// Column headers of the CSV export, in order
pub const CSV_HEADERS: [&str; 8] = [
    fields::TITLE,
    fields::ORGANIZATION,
    fields::VALUE,
    fields::DEADLINE,
    fields::COUNTRIES,
    fields::SECTORS,
    fields::SUMMARY,
    fields::LINK,
];

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

/// Exporter for the grants currently on screen
pub struct Exporter;

impl Exporter {
    /// `<prefix>-<YYYY-MM-DD>.<ext>`, e.g. `quantilytix-grants-2025-03-01.csv`
    pub fn default_filename(prefix: &str, date: NaiveDate, format: ExportFormat) -> String {
        format!("{}-{}.{}", prefix, date.format("%Y-%m-%d"), format.extension())
    }

    /// Export to a file with an explicit format.
    ///
    /// Refuses an empty list instead of writing an empty file.
    pub fn export_to_file_with_format<P: AsRef<Path>>(
        grants: &[GrantRecord],
        path: P,
        format: ExportFormat,
    ) -> Result<PathBuf> {
        if grants.is_empty() {
            return Err(Error::EmptyExport);
        }

        let content = match format {
            ExportFormat::Csv => Self::to_csv(grants),
            ExportFormat::Json => Self::to_json(grants)?,
        };

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;

        tracing::info!("Exported {} grants to {}", grants.len(), path.display());
        Ok(path.to_path_buf())
    }

    /// Export grants to JSON, using the API's field names
    pub fn to_json(grants: &[GrantRecord]) -> Result<String> {
        Ok(serde_json::to_string_pretty(grants)?)
    }

    /// Export grants to CSV.
    ///
    /// Every cell is quoted, list fields are joined with `"; "`, rows are
    /// separated by `\n` with no trailing newline. No grants, no output:
    /// an empty slice gives an empty string, not a lone header row.
    pub fn to_csv(grants: &[GrantRecord]) -> String {
        if grants.is_empty() {
            return String::new();
        }

        let mut rows = Vec::with_capacity(grants.len() + 1);
        rows.push(Self::csv_row(CSV_HEADERS.iter().map(|h| h.to_string())));

        for grant in grants {
            rows.push(Self::csv_row(
                CSV_HEADERS.iter().map(|header| Self::cell(grant, header)),
            ));
        }

        rows.join("\n")
    }

    fn cell(grant: &GrantRecord, header: &str) -> String {
        match header {
            fields::TITLE => grant.title.clone().unwrap_or_default(),
            fields::ORGANIZATION => grant.organization.clone().unwrap_or_default(),
            fields::VALUE => grant
                .value
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_default(),
            fields::DEADLINE => grant.deadline.clone().unwrap_or_default(),
            fields::COUNTRIES => grant.countries.join("; "),
            fields::SECTORS => grant.sectors.join("; "),
            fields::SUMMARY => grant.summary.clone().unwrap_or_default(),
            fields::LINK => grant.link.clone().unwrap_or_default(),
            _ => String::new(),
        }
    }

    fn csv_row<I: Iterator<Item = String>>(cells: I) -> String {
        cells
            .map(|c| Self::escape_csv(&c))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Always quote; double any embedded quotes
    fn escape_csv(s: &str) -> String {
        format!("\"{}\"", s.replace('"', "\"\""))
    }
}
