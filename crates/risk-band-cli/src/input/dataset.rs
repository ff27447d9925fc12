use risk_band_core::LoanRecord;
use rust_decimal::Decimal;
use std::fs::File;

use super::file::resolve_path;

/// Read the loans CSV into records, addressing columns by header name.
///
/// Empty, NA, N/A, nan, and null score cells map to a missing score; the
/// default flag accepts 0/1 and true/false spellings.
pub fn read_csv(
    path: &str,
    score_col: &str,
    default_col: &str,
) -> Result<Vec<LoanRecord>, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let file = File::open(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader.headers()?.clone();
    let score_idx = headers
        .iter()
        .position(|h| h == score_col)
        .ok_or_else(|| format!("Column '{}' not found in '{}'", score_col, canonical.display()))?;
    let default_idx = headers.iter().position(|h| h == default_col).ok_or_else(|| {
        format!(
            "Column '{}' not found in '{}'",
            default_col,
            canonical.display()
        )
    })?;

    let mut records = Vec::new();
    for (row_number, row) in reader.records().enumerate() {
        let row = row?;
        // Header is line 1; data starts on line 2.
        let line = row_number + 2;
        let score = parse_score(row.get(score_idx).unwrap_or(""))
            .map_err(|e| format!("Line {} of '{}': {}", line, canonical.display(), e))?;
        let defaulted = parse_flag(row.get(default_idx).unwrap_or(""))
            .map_err(|e| format!("Line {} of '{}': {}", line, canonical.display(), e))?;
        records.push(LoanRecord { score, defaulted });
    }

    Ok(records)
}

fn parse_score(raw: &str) -> Result<Option<Decimal>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "na" | "n/a" | "nan" | "null" => Ok(None),
        _ => trimmed
            .parse::<Decimal>()
            .map(Some)
            .map_err(|e| format!("invalid score '{}': {}", trimmed, e)),
    }
}

fn parse_flag(raw: &str) -> Result<u8, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "0" | "false" | "no" => Ok(0),
        "1" | "true" | "yes" => Ok(1),
        other => Err(format!("invalid default flag '{}'", other)),
    }
}
