//! Table body encodings
//!
//! Each [`TableFormat`] maps to a pair of pure functions over bytes. The
//! storage layer moves the bytes; nothing here touches the filesystem.

use serde_json::Value;
use thiserror::Error;

use super::{Cell, TableData, TableFormat};

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("bincode: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("body is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("malformed table: {0}")]
    Shape(String),
}

pub fn encode(format: TableFormat, data: &TableData) -> Result<Vec<u8>, CodecError> {
    data.check_shape().map_err(CodecError::Shape)?;
    match format {
        TableFormat::Bincode => Ok(bincode::serialize(data)?),
        TableFormat::JsonLines => encode_json_lines(data),
        TableFormat::Csv => encode_csv(data),
    }
}

pub fn decode(format: TableFormat, bytes: &[u8]) -> Result<TableData, CodecError> {
    let data = match format {
        TableFormat::Bincode => bincode::deserialize(bytes)?,
        TableFormat::JsonLines => decode_json_lines(bytes)?,
        TableFormat::Csv => decode_csv(bytes)?,
    };
    data.check_shape().map_err(CodecError::Shape)?;
    Ok(data)
}

fn encode_json_lines(data: &TableData) -> Result<Vec<u8>, CodecError> {
    let mut out = serde_json::to_vec(&data.columns)?;
    out.push(b'\n');
    for row in &data.rows {
        let values: Vec<Value> = row.iter().map(cell_to_json).collect();
        serde_json::to_writer(&mut out, &values)?;
        out.push(b'\n');
    }
    Ok(out)
}

fn decode_json_lines(bytes: &[u8]) -> Result<TableData, CodecError> {
    let text = std::str::from_utf8(bytes)?;
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());

    let header = lines
        .next()
        .ok_or_else(|| CodecError::Shape("missing header line".to_string()))?;
    let columns: Vec<String> = serde_json::from_str(header)?;

    let mut rows = Vec::new();
    for line in lines {
        let values: Vec<Value> = serde_json::from_str(line)?;
        rows.push(
            values
                .into_iter()
                .map(json_to_cell)
                .collect::<Result<Vec<_>, _>>()?,
        );
    }

    Ok(TableData::new(columns, rows))
}

fn cell_to_json(cell: &Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Bool(b) => Value::Bool(*b),
        Cell::Int(i) => Value::from(*i),
        // Non-finite floats have no JSON form and become null
        Cell::Float(f) => Value::from(*f),
        Cell::Str(s) => Value::String(s.clone()),
    }
}

fn json_to_cell(value: Value) -> Result<Cell, CodecError> {
    match value {
        Value::Null => Ok(Cell::Null),
        Value::Bool(b) => Ok(Cell::Bool(b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Cell::Int(i)),
            None => n
                .as_f64()
                .map(Cell::Float)
                .ok_or_else(|| CodecError::Shape(format!("unrepresentable number {n}"))),
        },
        Value::String(s) => Ok(Cell::Str(s)),
        other => Err(CodecError::Shape(format!(
            "nested values are not supported: {other}"
        ))),
    }
}

fn encode_csv(data: &TableData) -> Result<Vec<u8>, CodecError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&data.columns)?;
    for row in &data.rows {
        writer.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| CodecError::Shape(format!("failed to flush csv: {e}")))
}

fn decode_csv(bytes: &[u8]) -> Result<TableData, CodecError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(infer_cell).collect());
    }

    Ok(TableData::new(columns, rows))
}

/// CSV carries no types: empty is null, then int, float, bool, string
fn infer_cell(field: &str) -> Cell {
    if field.is_empty() {
        return Cell::Null;
    }
    if let Ok(i) = field.parse::<i64>() {
        return Cell::Int(i);
    }
    if let Ok(f) = field.parse::<f64>() {
        return Cell::Float(f);
    }
    match field {
        "true" => Cell::Bool(true),
        "false" => Cell::Bool(false),
        _ => Cell::Str(field.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> TableData {
        TableData::new(
            vec!["country".into(), "year".into(), "share".into(), "flag".into()],
            vec![
                vec!["France".into(), 2020.into(), 0.25.into(), true.into()],
                vec!["Chile, Rep.".into(), 2021.into(), Cell::Null, false.into()],
            ],
        )
    }

    #[test]
    fn test_every_format_preserves_sample() {
        for format in TableFormat::PRIORITY {
            let bytes = encode(format, &sample()).unwrap();
            let decoded = decode(format, &bytes).unwrap();
            assert_eq!(decoded, sample(), "format {format}");
        }
    }

    #[test]
    fn test_csv_is_type_lossy_for_numeric_strings() {
        let data = TableData::new(vec!["code".into()], vec![vec!["007".into()]]);
        let bytes = encode(TableFormat::Csv, &data).unwrap();
        let decoded = decode(TableFormat::Csv, &bytes).unwrap();
        assert_eq!(decoded.rows[0][0], Cell::Int(7));

        // JSON lines keeps the string
        let bytes = encode(TableFormat::JsonLines, &data).unwrap();
        let decoded = decode(TableFormat::JsonLines, &bytes).unwrap();
        assert_eq!(decoded.rows[0][0], Cell::Str("007".into()));
    }

    #[test]
    fn test_json_lines_layout() {
        let data = TableData::new(vec!["a".into(), "b".into()], vec![vec![1.into(), "x".into()]]);
        let bytes = encode(TableFormat::JsonLines, &data).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "[\"a\",\"b\"]\n[1,\"x\"]\n");
    }

    #[test]
    fn test_empty_table_keeps_columns() {
        let data = TableData::new(vec!["a".into(), "b".into()], vec![]);
        for format in TableFormat::PRIORITY {
            let decoded = decode(format, &encode(format, &data).unwrap()).unwrap();
            assert_eq!(decoded.columns, vec!["a", "b"], "format {format}");
            assert!(decoded.rows.is_empty());
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode(TableFormat::Bincode, b"\x01").is_err());
        assert!(decode(TableFormat::JsonLines, b"not json\n").is_err());
        assert!(decode(TableFormat::JsonLines, b"").is_err());
    }

    #[test]
    fn test_decode_rejects_ragged_rows() {
        let err = decode(TableFormat::JsonLines, b"[\"a\",\"b\"]\n[1]\n").unwrap_err();
        assert!(matches!(err, CodecError::Shape(_)));
    }

    #[test]
    fn test_encode_rejects_ragged_rows() {
        let data = TableData::new(vec!["a".into()], vec![vec![1.into(), 2.into()]]);
        assert!(encode(TableFormat::Bincode, &data).is_err());
    }

    #[test]
    fn test_nested_json_is_rejected() {
        let err = decode(TableFormat::JsonLines, b"[\"a\"]\n[[1,2]]\n").unwrap_err();
        assert!(err.to_string().contains("nested"));
    }
}
