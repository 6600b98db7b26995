use crate::dataset::{CarRecord, Dataset, FieldValue, NumericField};
use crate::error::TrainingResult;
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

/// On-disk encodings understood by [`load_dataset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Csv,
    Jsonl,
}

impl DatasetFormat {
    /// Pick a format from the file extension. Anything unrecognised is read as CSV.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .as_deref()
        {
            Some("jsonl" | "ndjson") => Self::Jsonl,
            _ => Self::Csv,
        }
    }
}

/// Load every record of a dataset file. Rows are never dropped: a row that cannot
/// be decoded becomes [`CarRecord::unreadable`].
pub fn load_dataset(path: &Path) -> TrainingResult<Dataset> {
    let format = DatasetFormat::from_path(path);
    debug!(path = %path.display(), ?format, "loading dataset");
    match format {
        DatasetFormat::Csv => read_csv_dataset(path),
        DatasetFormat::Jsonl => read_jsonl_dataset(path),
    }
}

pub fn read_csv_dataset(path: &Path) -> TrainingResult<Dataset> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let column = |field: NumericField| headers.iter().position(|h| h == field.name());
    let price_col = column(NumericField::Price);
    let year_col = column(NumericField::Year);
    let mileage_col = column(NumericField::Mileage);

    for field in NumericField::ALL {
        if column(field).is_none() {
            warn!(path = %path.display(), column = field.name(), "dataset has no such column");
        }
    }

    let mut dataset = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let line = idx as u64 + 1;
        let record = match result {
            Ok(r) => r,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                dataset.push(CarRecord::unreadable(line, &e.to_string()));
                continue;
            }
        };

        let cell = |col: Option<usize>| FieldValue::parse(col.and_then(|c| record.get(c)));
        let mut attributes = BTreeMap::new();
        for (i, value) in record.iter().enumerate() {
            if Some(i) == price_col || Some(i) == year_col || Some(i) == mileage_col {
                continue;
            }
            if let Some(name) = headers.get(i) {
                attributes.insert(name.clone(), value.to_string());
            }
        }

        dataset.push(CarRecord {
            line,
            price: cell(price_col),
            year: cell(year_col),
            mileage: cell(mileage_col),
            attributes,
        });
    }

    Ok(dataset)
}

pub fn read_jsonl_dataset(path: &Path) -> TrainingResult<Dataset> {
    let mut reader = BufReader::new(std::fs::File::open(path)?);
    let mut dataset = Vec::new();
    let mut buf = Vec::new();
    let mut line_no = 0u64;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;
        let text = match std::str::from_utf8(&buf) {
            Ok(text) => text,
            Err(e) => {
                dataset.push(CarRecord::unreadable(line_no, &format!("invalid utf-8: {e}")));
                continue;
            }
        };
        let line = text.trim();
        if line.is_empty() {
            continue;
        }

        let value: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                dataset.push(CarRecord::unreadable(line_no, &format!("invalid json: {e}")));
                continue;
            }
        };
        let Some(obj) = value.as_object() else {
            dataset.push(CarRecord::unreadable(line_no, "line is not a json object"));
            continue;
        };

        let mut attributes = BTreeMap::new();
        for (k, v) in obj {
            if NumericField::ALL.iter().any(|f| f.name() == k) {
                continue;
            }
            let text = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            attributes.insert(k.clone(), text);
        }

        dataset.push(CarRecord {
            line: line_no,
            price: FieldValue::from_json(obj.get("price")),
            year: FieldValue::from_json(obj.get("year")),
            mileage: FieldValue::from_json(obj.get("mileage")),
            attributes,
        });
    }

    Ok(dataset)
}

/// Write well-formed records as CSV (`price,year,mileage` plus attribute columns
/// of the first record).
pub fn write_csv_dataset(path: &Path, records: &[CarRecord]) -> TrainingResult<()> {
    let attribute_names: Vec<String> = records
        .first()
        .map(|r| r.attributes.keys().cloned().collect())
        .unwrap_or_default();

    let mut wtr = csv::Writer::from_path(path)?;
    let mut header = vec!["price".to_string(), "year".to_string(), "mileage".to_string()];
    header.extend(attribute_names.iter().cloned());
    wtr.write_record(&header)?;

    for rec in records {
        let mut row = Vec::with_capacity(header.len());
        for field in NumericField::ALL {
            row.push(match rec.field(field) {
                FieldValue::Number(v) => v.to_string(),
                FieldValue::Missing => String::new(),
                FieldValue::Malformed(raw) => raw.clone(),
            });
        }
        for name in &attribute_names {
            row.push(rec.attributes.get(name).cloned().unwrap_or_default());
        }
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_csv_keeps_malformed_rows() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cars.csv");
        std::fs::write(
            &path,
            "price,year,mileage,make\n9000,2015,120000,volvo\nabc,2016,1000,saab\n5000,2010\n",
        )
        .unwrap();

        let ds = load_dataset(&path).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds[0].price, FieldValue::Number(9000.0));
        assert_eq!(ds[0].attributes.get("make").map(String::as_str), Some("volvo"));
        assert!(matches!(ds[1].price, FieldValue::Malformed(_)));
        assert_eq!(ds[2].mileage, FieldValue::Missing);
        assert_eq!(ds[2].line, 3);
    }

    #[test]
    fn test_read_csv_header_is_case_insensitive() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cars.csv");
        std::fs::write(&path, "Price,YEAR,Mileage\n1,2000,3\n").unwrap();

        let ds = load_dataset(&path).unwrap();
        assert!(ds[0].is_well_formed());
    }

    #[test]
    fn test_read_jsonl_with_bad_lines() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cars.jsonl");
        std::fs::write(
            &path,
            "{\"price\": 100, \"year\": 2001, \"mileage\": 5, \"fuel\": \"diesel\"}\n\nnot json\n[1,2]\n",
        )
        .unwrap();

        let ds = load_dataset(&path).unwrap();
        assert_eq!(ds.len(), 3);
        assert!(ds[0].is_well_formed());
        assert_eq!(ds[0].attributes.get("fuel").map(String::as_str), Some("diesel"));
        assert!(!ds[1].is_well_formed());
        assert_eq!(ds[1].line, 3);
        assert!(!ds[2].is_well_formed());
    }

    #[test]
    fn test_read_jsonl_keeps_invalid_utf8_line() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cars.jsonl");
        let mut bytes = b"{\"price\": 100, \"year\": 2001, \"mileage\": 5}\n".to_vec();
        bytes.extend_from_slice(b"{\"price\": \"\xff\xfe\", \"year\": 2002, \"mileage\": 6}\n");
        bytes.extend_from_slice(b"{\"price\": 300, \"year\": 2003, \"mileage\": 7}");
        std::fs::write(&path, bytes).unwrap();

        let ds = load_dataset(&path).unwrap();
        assert_eq!(ds.len(), 3);
        assert!(ds[0].is_well_formed());
        assert!(!ds[1].is_well_formed());
        assert_eq!(ds[1].line, 2);
        assert!(matches!(&ds[1].price, FieldValue::Malformed(reason) if reason.contains("utf-8")));
        assert_eq!(ds[2].price, FieldValue::Number(300.0));
    }

    #[test]
    fn test_write_then_load_csv_preserves_values() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.csv");
        let mut attributes = BTreeMap::new();
        attributes.insert("make".to_string(), "audi".to_string());
        let records = vec![CarRecord {
            line: 1,
            price: FieldValue::Number(12_500.0),
            year: FieldValue::Number(2019.0),
            mileage: FieldValue::Number(40_000.0),
            attributes,
        }];

        write_csv_dataset(&path, &records).unwrap();
        let loaded = load_dataset(&path).unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(DatasetFormat::from_path(Path::new("a.NDJSON")), DatasetFormat::Jsonl);
        assert_eq!(DatasetFormat::from_path(Path::new("a.csv")), DatasetFormat::Csv);
        assert_eq!(DatasetFormat::from_path(Path::new("a")), DatasetFormat::Csv);
    }
}
