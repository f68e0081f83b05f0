//! Reading input rows from JSON Lines and CSV files

use anyhow::{bail, Context, Result};
use rowform::{Column, ColumnType, RecordValue, Row};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Read rows from `path`: CSV when the extension is `csv`, JSON Lines otherwise
pub fn read_rows(path: &Path, columns: &[Column]) -> Result<Vec<Row>> {
    let file = File::open(path).with_context(|| format!("Failed to open '{}'", path.display()))?;
    let is_csv = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));

    if is_csv {
        read_csv(file, columns)
    } else {
        read_json_lines(BufReader::new(file))
    }
}

/// One JSON object per line; blank lines are skipped
pub fn read_json_lines<R: BufRead>(reader: R) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(&line)
            .with_context(|| format!("Line {} is not valid JSON", index + 1))?;
        match RecordValue::from(value) {
            RecordValue::Map(row) => rows.push(row),
            other => bail!(
                "Line {} must be a JSON object, found {}",
                index + 1,
                other.type_name()
            ),
        }
    }
    Ok(rows)
}

/// A header row followed by records. Fields are typed by the declared column
/// type, or detected when the column is not declared.
pub fn read_csv<R: Read>(reader: R, columns: &[Column]) -> Result<Vec<Row>> {
    let types: HashMap<&str, &ColumnType> = columns
        .iter()
        .filter_map(|c| c.column_type.as_ref().map(|t| (c.name.as_str(), t)))
        .collect();

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let mut rows = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        let row = headers
            .iter()
            .zip(record.iter())
            .map(|(name, field)| {
                let value = typed_field(field, types.get(name).copied());
                (name.to_string(), value)
            })
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn typed_field(field: &str, column_type: Option<&ColumnType>) -> RecordValue {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return RecordValue::Null;
    }

    match column_type {
        Some(ColumnType::Integer | ColumnType::Decimal) => trimmed
            .parse::<f64>()
            .map(RecordValue::Number)
            .unwrap_or_else(|_| RecordValue::from(field)),
        Some(ColumnType::Boolean) => match trimmed.to_lowercase().as_str() {
            "true" | "yes" | "1" => RecordValue::Boolean(true),
            "false" | "no" | "0" => RecordValue::Boolean(false),
            _ => RecordValue::from(field),
        },
        Some(_) => RecordValue::from(field),
        None => detect_type(trimmed),
    }
}

fn detect_type(field: &str) -> RecordValue {
    match field {
        "true" => return RecordValue::Boolean(true),
        "false" => return RecordValue::Boolean(false),
        _ => {}
    }

    if let Ok(n) = field.parse::<f64>() {
        return RecordValue::Number(n);
    }

    RecordValue::from(field)
}
