//! Input discovery and raw row parsing.
//!
//! Inputs are CSV files with a header row or JSON arrays of row objects.
//! Column names follow the order export layout; unknown columns are ignored.

use crate::error::IngestError;
use crate::models::OrderRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Membership flag as written by spreadsheets (`True`), pandas, or JSON (`true`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Number(i64),
    Text(String),
}

impl Flag {
    /// Interpret the flag, or `None` if it is not a recognizable boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Flag::Bool(value) => Some(*value),
            Flag::Number(0) => Some(false),
            Flag::Number(1) => Some(true),
            Flag::Number(_) => None,
            Flag::Text(text) => match text.trim().to_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Some(true),
                "false" | "no" | "n" | "0" => Some(false),
                _ => None,
            },
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flag::Bool(value) => write!(f, "{}", value),
            Flag::Number(value) => write!(f, "{}", value),
            Flag::Text(text) => write!(f, "{}", text),
        }
    }
}

/// One unvalidated input row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawOrderRow {
    #[serde(default)]
    pub order_id: Option<String>,

    #[serde(default)]
    pub service_level: Option<String>,

    /// Alternative to `service_level` used by older exports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_prime_member: Option<Flag>,

    #[serde(default)]
    pub carrier: Option<String>,

    #[serde(default)]
    pub destination_state: Option<String>,

    #[serde(default)]
    pub destination_city: Option<String>,

    #[serde(default)]
    pub order_date: Option<String>,

    #[serde(default, alias = "actual_delivery_date")]
    pub delivery_date: Option<String>,

    #[serde(default, alias = "expected_delivery_date")]
    pub promised_delivery_date: Option<String>,

    #[serde(default)]
    pub route_score: Option<String>,

    #[serde(default, alias = "delivery_cost_to_amazon")]
    pub delivery_cost: Option<f64>,
}

impl From<&OrderRecord> for RawOrderRow {
    fn from(record: &OrderRecord) -> Self {
        Self {
            order_id: Some(record.order_id.clone()),
            service_level: Some(record.service_level.to_string()),
            is_prime_member: None,
            carrier: Some(record.carrier.to_string()),
            destination_state: Some(record.destination_state.clone()),
            destination_city: Some(record.destination_city.clone()),
            order_date: Some(record.order_date.to_string()),
            delivery_date: Some(record.delivery_date.to_string()),
            promised_delivery_date: Some(record.promised_delivery_date.to_string()),
            route_score: Some(record.route_score.to_string()),
            delivery_cost: record.delivery_cost_cents.map(|cents| cents as f64 / 100.0),
        }
    }
}

/// A parsed row with its 1-based data line number.
#[derive(Debug, Clone)]
pub struct NumberedRow {
    pub line: usize,
    pub row: RawOrderRow,
}

/// Rows read from one file, plus rows that could not be deserialized.
#[derive(Debug, Default)]
pub struct RowsRead {
    pub rows: Vec<NumberedRow>,
    pub malformed: Vec<IngestError>,
}

/// Expand files and directories into the sorted list of input files.
pub fn discover_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>, IngestError> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).follow_links(true) {
                let entry = entry.map_err(|e| IngestError::Io {
                    path: path.clone(),
                    source: e.into(),
                })?;
                if entry.file_type().is_file() && is_supported(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        } else if path.is_file() {
            if !is_supported(path) {
                return Err(IngestError::UnsupportedFormat { path: path.clone() });
            }
            files.push(path.clone());
        } else {
            return Err(IngestError::Io {
                path: path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
            });
        }
    }

    files.sort();
    files.dedup();

    if files.is_empty() {
        let listed: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        return Err(IngestError::NoInputs {
            paths: listed.join(", "),
        });
    }

    debug!("Discovered {} input files", files.len());
    Ok(files)
}

/// Read every row of a CSV or JSON input file.
pub fn read_rows(path: &Path) -> Result<RowsRead, IngestError> {
    let text = fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    // Strip UTF-8 BOM if present
    let text = text.trim_start_matches('\u{FEFF}');

    match extension(path).as_deref() {
        Some("csv") => read_csv(path, text),
        Some("json") => read_json(path, text),
        _ => Err(IngestError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

fn read_csv(path: &Path, text: &str) -> Result<RowsRead, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|source| IngestError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .clone();
    debug!("{} headers: {:?}", path.display(), headers.iter().collect::<Vec<_>>());

    let mut read = RowsRead::default();
    for (index, result) in reader.deserialize::<RawOrderRow>().enumerate() {
        match result {
            Ok(row) => read.rows.push(NumberedRow {
                line: index + 1,
                row,
            }),
            Err(source) => read.malformed.push(IngestError::Csv {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    Ok(read)
}

fn read_json(path: &Path, text: &str) -> Result<RowsRead, IngestError> {
    let values: Vec<serde_json::Value> =
        serde_json::from_str(text).map_err(|source| IngestError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    let mut read = RowsRead::default();
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<RawOrderRow>(value) {
            Ok(row) => read.rows.push(NumberedRow {
                line: index + 1,
                row,
            }),
            Err(source) => read.malformed.push(IngestError::Json {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    Ok(read)
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn is_supported(path: &Path) -> bool {
    matches!(extension(path).as_deref(), Some("csv") | Some("json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str = "order_id,customer_id,order_date,is_prime_member,expected_delivery_date,actual_delivery_date,delivery_status,carrier,delivery_cost_to_amazon,destination_state,destination_city,route_score";

    #[test]
    fn test_read_csv_with_export_column_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("orders.csv");
        let content = format!(
            "\u{FEFF}{}\nORD-0000001,CUST-12345,2024-01-01,True,2024-01-03,2024-01-03,On-Time,AMZL,6.02,wa,Seattle,High\nORD-0000002,CUST-54321,2024-01-02,False,2024-01-08,2024-01-09,Late,UPS,,TX,Austin,Low\n",
            HEADER
        );
        fs::write(&path, content).unwrap();

        let read = read_rows(&path).unwrap();
        assert!(read.malformed.is_empty());
        assert_eq!(read.rows.len(), 2);

        let first = &read.rows[0];
        assert_eq!(first.line, 1);
        assert_eq!(first.row.order_id.as_deref(), Some("ORD-0000001"));
        assert_eq!(first.row.is_prime_member.as_ref().and_then(Flag::as_bool), Some(true));
        assert_eq!(first.row.delivery_date.as_deref(), Some("2024-01-03"));
        assert_eq!(first.row.promised_delivery_date.as_deref(), Some("2024-01-03"));
        assert_eq!(first.row.delivery_cost, Some(6.02));

        let second = &read.rows[1];
        assert_eq!(second.row.is_prime_member.as_ref().and_then(Flag::as_bool), Some(false));
        assert_eq!(second.row.delivery_cost, None);
    }

    #[test]
    fn test_read_json_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("orders.json");
        fs::write(
            &path,
            r#"[
                {"order_id": "A", "service_level": "Prime", "carrier": "FedEx", "delivery_cost": 3.5},
                {"order_id": "B", "is_prime_member": true},
                "not an object"
            ]"#,
        )
        .unwrap();

        let read = read_rows(&path).unwrap();
        assert_eq!(read.rows.len(), 2);
        assert_eq!(read.malformed.len(), 1);
        assert_eq!(read.rows[0].row.carrier.as_deref(), Some("FedEx"));
        assert_eq!(read.rows[1].row.is_prime_member, Some(Flag::Bool(true)));
    }

    #[test]
    fn test_discover_inputs_walks_directories() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("2024").join("q1");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("b.csv"), HEADER).unwrap();
        fs::write(nested.join("a.json"), "[]").unwrap();
        fs::write(nested.join("notes.txt"), "ignore me").unwrap();

        let files = discover_inputs(&[dir.path().to_path_buf()]).unwrap();

        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|f| f.ends_with("b.csv")));
        assert!(files.iter().any(|f| f.ends_with("a.json")));
    }

    #[test]
    fn test_discover_inputs_errors() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            discover_inputs(&[dir.path().to_path_buf()]),
            Err(IngestError::NoInputs { .. })
        ));

        let txt = dir.path().join("orders.txt");
        fs::write(&txt, "").unwrap();
        assert!(matches!(
            discover_inputs(&[txt]),
            Err(IngestError::UnsupportedFormat { .. })
        ));

        assert!(matches!(
            discover_inputs(&[dir.path().join("missing.csv")]),
            Err(IngestError::Io { .. })
        ));
    }

    #[test]
    fn test_flag_parsing() {
        assert_eq!(Flag::Text("True".to_string()).as_bool(), Some(true));
        assert_eq!(Flag::Text("0".to_string()).as_bool(), Some(false));
        assert_eq!(Flag::Text("maybe".to_string()).as_bool(), None);
        assert_eq!(Flag::Bool(false).as_bool(), Some(false));
        assert_eq!(Flag::Number(1).as_bool(), Some(true));
        assert_eq!(Flag::Number(7).as_bool(), None);
    }
}
