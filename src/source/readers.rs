//! Decoders for the partition encodings understood by [`LocalPartitionSource`].
//!
//! Both readers apply the ID predicate while decoding, so rows that are not
//! wanted never leave this module.
//!
//! [`LocalPartitionSource`]: crate::source::LocalPartitionSource

use crate::error::{IdSiftError, Result};
use crate::source::{IdPredicate, Row, Value};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::{Field, Row as ParquetRow};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub fn read_json_lines(path: &Path, predicate: &IdPredicate<'_>) -> Result<Vec<Row>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut rows = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let parsed: serde_json::Value = serde_json::from_str(&line).map_err(|e| {
            IdSiftError::partition_read(
                path.display().to_string(),
                format!("line {}: {}", index + 1, e),
            )
        })?;

        let row = Row::from_json(parsed).ok_or_else(|| {
            IdSiftError::partition_read(
                path.display().to_string(),
                format!("line {}: expected a JSON object", index + 1),
            )
        })?;

        if predicate.matches(&row) {
            rows.push(row);
        }
    }

    Ok(rows)
}

pub fn read_parquet(path: &Path, predicate: &IdPredicate<'_>) -> Result<Vec<Row>> {
    let file = File::open(path)?;
    let reader = SerializedFileReader::new(file)
        .map_err(|e| IdSiftError::partition_read(path.display().to_string(), e))?;

    let has_id_column = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .root_schema()
        .get_fields()
        .iter()
        .any(|field| field.name() == predicate.id_field());

    // Without the ID column no row can match
    if !has_id_column {
        tracing::debug!(
            partition = %path.display(),
            id_field = predicate.id_field(),
            "partition has no id column"
        );
        return Ok(Vec::new());
    }

    let row_iter = reader
        .get_row_iter(None)
        .map_err(|e| IdSiftError::partition_read(path.display().to_string(), e))?;

    let mut rows = Vec::new();
    for record in row_iter {
        let record =
            record.map_err(|e| IdSiftError::partition_read(path.display().to_string(), e))?;

        let id_matches = record
            .get_column_iter()
            .find(|(name, _)| name.as_str() == predicate.id_field())
            .map(|(_, field)| predicate.matches_value(&field_to_value(field)))
            .unwrap_or(false);

        if id_matches {
            rows.push(parquet_row_to_row(&record));
        }
    }

    Ok(rows)
}

fn parquet_row_to_row(record: &ParquetRow) -> Row {
    Row::from_fields(
        record
            .get_column_iter()
            .map(|(name, field)| (name.clone(), field_to_value(field)))
            .collect(),
    )
}

fn field_to_value(field: &Field) -> Value {
    match field {
        Field::Null => Value::Null,
        Field::Bool(b) => Value::Bool(*b),
        Field::Byte(v) => Value::Int(i64::from(*v)),
        Field::Short(v) => Value::Int(i64::from(*v)),
        Field::Int(v) => Value::Int(i64::from(*v)),
        Field::Long(v) => Value::Int(*v),
        Field::UByte(v) => Value::Int(i64::from(*v)),
        Field::UShort(v) => Value::Int(i64::from(*v)),
        Field::UInt(v) => Value::Int(i64::from(*v)),
        Field::ULong(v) => match i64::try_from(*v) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::Float(*v as f64),
        },
        Field::Float(v) => Value::Float(f64::from(*v)),
        Field::Double(v) => Value::Float(*v),
        Field::Str(s) => Value::Text(s.clone()),
        Field::Bytes(bytes) => Value::Bytes(bytes.data().to_vec()),
        Field::Group(row) => Value::Map(
            row.get_column_iter()
                .map(|(name, field)| (name.clone(), field_to_value(field)))
                .collect(),
        ),
        Field::ListInternal(list) => {
            Value::List(list.elements().iter().map(field_to_value).collect())
        }
        Field::MapInternal(map) => Value::Map(
            map.entries()
                .iter()
                .map(|(key, value)| (map_key(key), field_to_value(value)))
                .collect(),
        ),
        // Dates, timestamps and decimals keep the crate's JSON rendering
        other => Value::from(other.to_json_value()),
    }
}

fn map_key(key: &Field) -> String {
    match key {
        Field::Str(s) => s.clone(),
        Field::Bytes(bytes) => String::from_utf8_lossy(bytes.data()).into_owned(),
        other => other.to_string(),
    }
}
