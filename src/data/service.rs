//! Service layer responsible for ingesting and fingerprinting datasets.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::info;

use crate::common::error::{RealtyError, RealtyResult};
use crate::common::ids::SimpleHash;
use crate::common::time;

use super::domain::{Dataset, DatasetId, FieldKind, FieldValue, PropertyRecord, RecordSchema};

/// Ingest a CSV file with a header row into a validated dataset.
///
/// Columns are matched by header name against `schema`; undeclared columns are
/// ignored. Empty cells read as missing values.
///
/// # Errors
///
/// `Io`/`Csv` for unreadable input, `SchemaViolation` for unparsable numeric
/// cells or rows that fail [`RecordSchema::validate`] with the target required.
pub fn load_csv(path: &Path, schema: &RecordSchema) -> RealtyResult<Dataset> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));
    let headers = reader.headers()?.clone();

    let mut columns = Vec::new();
    for (idx, header) in headers.iter().enumerate() {
        let header = header.trim();
        let kind = if header == schema.target {
            Some(FieldKind::Numeric)
        } else {
            schema.field(header).map(|decl| decl.kind)
        };
        if let Some(kind) = kind {
            columns.push((idx, header.to_string(), kind));
        }
    }

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let raw = result?;
        let mut record = PropertyRecord::new();
        for (idx, name, kind) in &columns {
            let cell = raw.get(*idx).unwrap_or("").trim();
            let value = parse_cell(name, *kind, cell, row)?;
            record.set(name.clone(), value);
        }
        records.push(record);
    }

    let dataset = from_records(records, schema.clone())?;
    info!(
        path = %path.display(),
        dataset_id = %dataset.id,
        rows = dataset.len(),
        "dataset ingested"
    );
    Ok(dataset)
}

fn parse_cell(name: &str, kind: FieldKind, cell: &str, row: usize) -> RealtyResult<FieldValue> {
    if cell.is_empty() {
        return Ok(FieldValue::Missing);
    }
    match kind {
        FieldKind::Categorical => Ok(FieldValue::Text(cell.to_string())),
        FieldKind::Numeric => cell.parse::<f64>().map(FieldValue::Number).map_err(|_| {
            RealtyError::schema(name, format!("row {}: cannot parse `{cell}` as a number", row + 1))
        }),
    }
}

/// Validate in-memory labelled rows and wrap them as a dataset.
pub fn from_records(records: Vec<PropertyRecord>, schema: RecordSchema) -> RealtyResult<Dataset> {
    for record in &records {
        schema.validate(record, true)?;
    }
    Ok(Dataset {
        id: fingerprint(&records, &schema),
        schema,
        records,
        created_at: time::now(),
    })
}

/// Deterministic dataset id over the declared fields of every row.
pub fn fingerprint(records: &[PropertyRecord], schema: &RecordSchema) -> DatasetId {
    let mut hasher = SimpleHash::new();
    let names = schema
        .fields
        .iter()
        .map(|f| f.name.as_str())
        .chain(std::iter::once(schema.target.as_str()));
    let names: Vec<&str> = names.collect();

    for name in &names {
        hasher.update(name.as_bytes());
        hasher.separator();
    }
    for record in records {
        for name in &names {
            match record.get(name) {
                FieldValue::Number(v) => hasher.update(&v.to_bits().to_le_bytes()),
                FieldValue::Text(t) => hasher.update(t.as_bytes()),
                FieldValue::Missing => hasher.update(&[0]),
            }
            hasher.separator();
        }
        hasher.update(b"\n");
    }
    DatasetId::new(format!("ds-{}", hasher.finish_hex()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::data::domain::FieldDecl;

    const CSV: &str = "\
area,bedrooms,bathrooms,neighborhood,price,listing_url
120,3,2,A,250000,http://x
80,2,1,B,150000,http://y
95,2,,C,180000,http://z
";

    #[test]
    fn loads_declared_columns() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CSV.as_bytes()).unwrap();

        let schema = RecordSchema::new(
            vec![
                FieldDecl::numeric("area", true),
                FieldDecl::numeric("bedrooms", true),
                FieldDecl::numeric("bathrooms", false),
                FieldDecl::categorical("neighborhood", true),
            ],
            "price",
        );
        let dataset = load_csv(file.path(), &schema).unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.records[0].number("area"), Some(120.0));
        assert_eq!(dataset.records[1].text("neighborhood"), Some("B"));
        assert!(dataset.records[2].get("bathrooms").is_missing());
        assert!(dataset.records[0].get("listing_url").is_missing());
        assert_eq!(dataset.targets().unwrap(), vec![250_000.0, 150_000.0, 180_000.0]);
        assert!(dataset.id.as_str().starts_with("ds-"));
    }

    #[test]
    fn unparsable_number_is_a_schema_violation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"area,bedrooms,bathrooms,price\nbig,3,2,100\n").unwrap();
        let err = load_csv(file.path(), &RecordSchema::property()).unwrap_err();
        assert!(matches!(err, RealtyError::SchemaViolation { ref field, .. } if field == "area"));
    }

    #[test]
    fn fingerprint_is_stable_and_content_sensitive() {
        let schema = RecordSchema::property();
        let rows = vec![PropertyRecord::new()
            .with("area", 100.0)
            .with("bedrooms", 2.0)
            .with("bathrooms", 1.0)
            .with("price", 10.0)];
        let a = fingerprint(&rows, &schema);
        let b = fingerprint(&rows.clone(), &schema);
        assert_eq!(a, b);

        let changed = vec![rows[0].clone().with("price", 11.0)];
        assert_ne!(a, fingerprint(&changed, &schema));
    }
}
