use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use super::ApiRecord;
use crate::error::{ApigraphError, Result};

const REQUIRED_COLUMNS: [&str; 4] = ["tool_name", "api_endpoint", "input_payload", "output_response"];

/// Raw CSV row; empty cells deserialize to `None`.
#[derive(Debug, Deserialize)]
struct CsvRow {
    tool_name: Option<String>,
    api_endpoint: Option<String>,
    input_payload: Option<String>,
    output_response: Option<String>,
    #[serde(default)]
    status_code: Option<String>,
    #[serde(default)]
    success: Option<String>,
    #[serde(default)]
    curl_command: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}

/// Read API records from one CSV file.
///
/// The file stem becomes the source collection id. Rows with a blank tool
/// name are skipped; a missing required column fails the whole file.
pub fn read_csv(path: &Path) -> Result<Vec<ApiRecord>> {
    let source_collection = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ApigraphError::InvalidInput(format!("Invalid CSV file name: {}", path.display())))?
        .to_string();

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)?;

    let headers: HashSet<String> = reader.headers()?.iter().map(str::to_string).collect();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !headers.contains(*c))
        .collect();
    if !missing.is_empty() {
        return Err(ApigraphError::InvalidInput(format!(
            "Missing required columns in {}: {}",
            path.display(),
            missing.join(", ")
        )));
    }

    let mut records = Vec::new();
    for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                log::warn!("Skipping unreadable row {} in {}: {}", line + 2, path.display(), e);
                continue;
            }
        };

        let tool_name = match row.tool_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                log::warn!("Skipping row {} with empty tool_name in {}", line + 2, path.display());
                continue;
            }
        };

        records.push(ApiRecord {
            tool_name,
            source_collection: source_collection.clone(),
            api_endpoint: non_blank(row.api_endpoint),
            input_payload: row.input_payload,
            output_payload: row.output_response,
            status_code: row.status_code.as_deref().and_then(parse_status_code),
            success: row.success.as_deref().and_then(parse_bool),
            example_invocation: non_blank(row.curl_command),
            timestamp: non_blank(row.timestamp),
        });
    }

    log::info!("Parsed {} API records from {}", records.len(), path.display());
    Ok(records)
}

/// Read several CSV files; unreadable files are logged and skipped.
pub fn read_many<P: AsRef<Path>>(paths: &[P]) -> Vec<ApiRecord> {
    let mut all_records = Vec::new();
    for path in paths {
        let path = path.as_ref();
        match read_csv(path) {
            Ok(records) => all_records.extend(records),
            Err(e) => log::error!("Skipping file {}: {}", path.display(), e),
        }
    }
    log::info!("Parsed total of {} API records from {} files", all_records.len(), paths.len());
    all_records
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Accepts `200` as well as spreadsheet-style `200.0`.
fn parse_status_code(raw: &str) -> Option<u16> {
    let raw = raw.trim();
    raw.parse::<u16>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.fract() == 0.0 && (0.0..=u16::MAX as f64).contains(v))
            .map(|v| v as u16)
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const HEADER: &str = "tool_name,api_endpoint,input_payload,output_response,status_code,success,curl_command,timestamp\n";

    #[test]
    fn test_read_csv_basic() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fms.csv");
        let content = format!(
            "{}{}",
            HEADER,
            r#"shipit,/api/ship,"{""order_id"": 1}","{""wbn"": ""W1""}",200.0,True,curl -X POST,2024-01-01
"#
        );
        fs::write(&path, content).unwrap();

        let records = read_csv(&path).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.tool_name, "shipit");
        assert_eq!(record.source_collection, "fms");
        assert_eq!(record.api_endpoint.as_deref(), Some("/api/ship"));
        assert_eq!(record.input_payload.as_deref(), Some(r#"{"order_id": 1}"#));
        assert_eq!(record.output_payload.as_deref(), Some(r#"{"wbn": "W1"}"#));
        assert_eq!(record.status_code, Some(200));
        assert_eq!(record.success, Some(true));
        assert_eq!(record.example_invocation.as_deref(), Some("curl -X POST"));
    }

    #[test]
    fn test_read_csv_skips_blank_tool_name() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("hq.csv");
        let content = format!("{}{}", HEADER, ",/x,{},{},,,,\ntrack,/track,{},{},,,,\n");
        fs::write(&path, content).unwrap();

        let records = read_csv(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tool_name, "track");
        assert_eq!(records[0].status_code, None);
    }

    #[test]
    fn test_read_csv_optional_columns_absent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("min.csv");
        fs::write(&path, "tool_name,api_endpoint,input_payload,output_response\nping,/ping,,\n").unwrap();

        let records = read_csv(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].input_payload, None);
        assert_eq!(records[0].timestamp, None);
    }

    #[test]
    fn test_read_csv_padded_headers() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("padded.csv");
        fs::write(
            &path,
            " tool_name , api_endpoint,input_payload ,output_response\nping,/ping,\"{\"\"id\"\": 1}\",\n",
        )
        .unwrap();

        let records = read_csv(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tool_name, "ping");
        assert_eq!(records[0].input_payload.as_deref(), Some(r#"{"id": 1}"#));
    }

    #[test]
    fn test_read_csv_missing_columns() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.csv");
        fs::write(&path, "tool_name,api_endpoint\nping,/ping\n").unwrap();

        let err = read_csv(&path).unwrap_err();
        assert!(err.to_string().contains("input_payload"));
    }

    #[test]
    fn test_read_many_skips_failing_files() {
        let temp_dir = TempDir::new().unwrap();
        let good = temp_dir.path().join("good.csv");
        fs::write(&good, "tool_name,api_endpoint,input_payload,output_response\nping,/ping,,\n").unwrap();
        let missing = temp_dir.path().join("missing.csv");

        let records = read_many(&[good, missing]);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_status_code("404"), Some(404));
        assert_eq!(parse_status_code("201.0"), Some(201));
        assert_eq!(parse_status_code("abc"), None);
        assert_eq!(parse_bool("False"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
