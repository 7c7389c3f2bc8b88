//! Presentation rules for grant records.
//!
//! Front ends (CLI listing, interactive shell) render through these helpers
//! so "N/A", money formatting and link fixing behave the same everywhere.

use crate::models::{GrantRecord, GrantValue};

pub const NOT_AVAILABLE: &str = "N/A";
pub const NO_DESCRIPTION: &str = "No description.";
pub const NO_RESULTS: &str = "No grants found for your search. Try different terms.";

/// Text values the API uses to mean "we don't know"
const UNSPECIFIED: [&str; 2] = ["Not specified", "NA"];

fn or_na(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

pub fn render_title(grant: &GrantRecord) -> String {
    or_na(grant.title.as_deref())
}

pub fn render_organization(grant: &GrantRecord) -> String {
    or_na(grant.organization.as_deref())
}

pub fn render_deadline(grant: &GrantRecord) -> String {
    or_na(grant.deadline.as_deref())
}

pub fn render_countries(grant: &GrantRecord) -> String {
    let joined = grant.countries.join(", ");
    or_na(Some(joined.as_str()))
}

/// `$1,500,000` for amounts, free text as-is, `N/A` for the unknowns
pub fn render_value(value: Option<&GrantValue>) -> String {
    match value {
        Some(GrantValue::Amount(n)) => format!("${}", format_thousands(*n)),
        Some(GrantValue::Text(s)) => {
            let s = s.trim();
            if s.is_empty() || UNSPECIFIED.contains(&s) {
                NOT_AVAILABLE.to_string()
            } else {
                s.to_string()
            }
        }
        None => NOT_AVAILABLE.to_string(),
    }
}

/// en-US grouping: 1234567.5 -> "1,234,567.5" (at most 3 decimals)
pub fn format_thousands(n: f64) -> String {
    if !n.is_finite() {
        return n.to_string();
    }

    let rounded = (n.abs() * 1000.0).round() / 1000.0;
    let plain = format!("{:.3}", rounded);
    let (int_part, frac_part) = plain.split_once('.').unwrap_or((plain.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if n < 0.0 && rounded != 0.0 { "-" } else { "" };
    if frac_part.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{}", sign, grouped, frac_part)
    }
}

/// Where the "Explore" action should go, if anywhere.
///
/// Scheme-less links get `https://` and lose anything after the first space
/// (the scraper sometimes appends commentary).
pub fn explore_link(grant: &GrantRecord) -> Option<String> {
    let url = grant.link.as_deref()?.trim();
    if url.is_empty() || url == "Not specified" {
        return None;
    }

    if url.starts_with("http") {
        Some(url.to_string())
    } else {
        let host_and_path = url.split(' ').next().unwrap_or(url);
        Some(format!("https://{}", host_and_path))
    }
}

pub fn render_summary(grant: &GrantRecord) -> String {
    match grant.summary.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => NO_DESCRIPTION.to_string(),
    }
}

/// Sector tags. A lone comma-delimited string is split into separate tags.
pub fn sector_tags(grant: &GrantRecord) -> Vec<String> {
    let split_single = grant.sectors.len() == 1;
    grant
        .sectors
        .iter()
        .flat_map(|entry| {
            if split_single {
                entry.split(',').map(str::trim).map(str::to_string).collect()
            } else {
                vec![entry.trim().to_string()]
            }
        })
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Multi-line block for one grant, as printed by the CLI
pub fn render_grant(index: usize, grant: &GrantRecord) -> String {
    let mut out = String::new();

    out.push_str(&format!("{:>3}. {}\n", index, render_title(grant)));
    out.push_str(&format!("     Organization: {}\n", render_organization(grant)));
    out.push_str(&format!("     Value:        {}\n", render_value(grant.value.as_ref())));
    out.push_str(&format!("     Deadline:     {}\n", render_deadline(grant)));
    out.push_str(&format!("     Countries:    {}\n", render_countries(grant)));

    let tags = sector_tags(grant);
    if tags.is_empty() {
        out.push_str("     Sector:       No sector\n");
    } else {
        let tags: Vec<String> = tags.iter().map(|t| format!("[{}]", t)).collect();
        out.push_str(&format!("     Sector:       {}\n", tags.join(" ")));
    }

    match explore_link(grant) {
        Some(link) => out.push_str(&format!("     Explore:      {}\n", link)),
        None => out.push_str("     Explore:      No Link\n"),
    }
    out.push_str(&format!("     Summary:      {}\n", render_summary(grant)));

    out
}

/// The full listing, or the "nothing found" line for an empty list
pub fn render_results(grants: &[GrantRecord]) -> String {
    if grants.is_empty() {
        return format!("{}\n", NO_RESULTS);
    }

    grants
        .iter()
        .enumerate()
        .map(|(i, g)| render_grant(i + 1, g))
        .collect::<Vec<_>>()
        .join("\n")
}
