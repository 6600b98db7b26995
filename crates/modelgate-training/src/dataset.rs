use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stable identifier for a dataset file (content hash).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetFingerprint(pub String);

impl std::fmt::Display for DatasetFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The numeric columns every dataset must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericField {
    Price,
    Year,
    Mileage,
}

impl NumericField {
    pub const ALL: [Self; 3] = [Self::Price, Self::Year, Self::Mileage];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Year => "year",
            Self::Mileage => "mileage",
        }
    }
}

/// A numeric cell as it was read, before any domain check runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Number(f64),
    Missing,
    Malformed(String),
}

impl FieldValue {
    /// Parse a raw cell. Empty cells are `Missing`; anything that is not a finite
    /// number is `Malformed` and keeps the raw text for diagnostics.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Missing;
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => Self::Number(v),
            _ => Self::Malformed(trimmed.to_string()),
        }
    }

    /// Interpret a JSON value. Numbers and numeric strings are accepted.
    #[must_use]
    pub fn from_json(value: Option<&serde_json::Value>) -> Self {
        match value {
            None | Some(serde_json::Value::Null) => Self::Missing,
            Some(serde_json::Value::Number(n)) => match n.as_f64() {
                Some(v) if v.is_finite() => Self::Number(v),
                _ => Self::Malformed(n.to_string()),
            },
            Some(serde_json::Value::String(s)) => Self::parse(Some(s)),
            Some(other) => Self::Malformed(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Missing | Self::Malformed(_) => None,
        }
    }
}

/// One row of a vehicle listing dataset.
///
/// Numeric fields are kept as [`FieldValue`] so that unparseable cells reach the
/// validator instead of being dropped at load time. Every other column is kept
/// verbatim in `attributes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarRecord {
    /// 1-based line (CSV: data row, JSONL: physical line) the record came from.
    pub line: u64,
    pub price: FieldValue,
    pub year: FieldValue,
    pub mileage: FieldValue,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl CarRecord {
    /// A record that could not be decoded at all. All numeric fields are malformed.
    #[must_use]
    pub fn unreadable(line: u64, reason: &str) -> Self {
        let bad = FieldValue::Malformed(reason.to_string());
        Self {
            line,
            price: bad.clone(),
            year: bad.clone(),
            mileage: bad,
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn field(&self, field: NumericField) -> &FieldValue {
        match field {
            NumericField::Price => &self.price,
            NumericField::Year => &self.year,
            NumericField::Mileage => &self.mileage,
        }
    }

    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        NumericField::ALL
            .iter()
            .all(|f| self.field(*f).as_number().is_some())
    }

    /// Feature view handed to external inference: numeric inputs plus categorical
    /// attributes. The target (`price`) is omitted.
    #[must_use]
    pub fn features_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        for (k, v) in &self.attributes {
            obj.insert(k.clone(), serde_json::Value::String(v.clone()));
        }
        obj.insert("year".to_string(), serde_json::json!(self.year.as_number()));
        obj.insert("mileage".to_string(), serde_json::json!(self.mileage.as_number()));
        serde_json::Value::Object(obj)
    }
}

pub type Dataset = Vec<CarRecord>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_parse() {
        assert_eq!(FieldValue::parse(Some(" 12.5 ")), FieldValue::Number(12.5));
        assert_eq!(FieldValue::parse(Some("")), FieldValue::Missing);
        assert_eq!(FieldValue::parse(None), FieldValue::Missing);
        assert_eq!(FieldValue::parse(Some("abc")), FieldValue::Malformed("abc".to_string()));
        assert!(matches!(FieldValue::parse(Some("NaN")), FieldValue::Malformed(_)));
        assert!(matches!(FieldValue::parse(Some("inf")), FieldValue::Malformed(_)));
    }

    #[test]
    fn test_field_value_from_json() {
        let v = serde_json::json!({"a": 3, "b": "4.5", "c": true, "d": null});
        assert_eq!(FieldValue::from_json(v.get("a")), FieldValue::Number(3.0));
        assert_eq!(FieldValue::from_json(v.get("b")), FieldValue::Number(4.5));
        assert!(matches!(FieldValue::from_json(v.get("c")), FieldValue::Malformed(_)));
        assert_eq!(FieldValue::from_json(v.get("d")), FieldValue::Missing);
        assert_eq!(FieldValue::from_json(v.get("missing")), FieldValue::Missing);
    }

    #[test]
    fn test_unreadable_record_is_not_well_formed() {
        let rec = CarRecord::unreadable(7, "bad utf-8");
        assert!(!rec.is_well_formed());
        assert_eq!(rec.line, 7);
    }

    #[test]
    fn test_features_json_omits_price() {
        let mut attributes = BTreeMap::new();
        attributes.insert("make".to_string(), "volvo".to_string());
        let rec = CarRecord {
            line: 1,
            price: FieldValue::Number(9000.0),
            year: FieldValue::Number(2015.0),
            mileage: FieldValue::Number(120_000.0),
            attributes,
        };
        let json = rec.features_json();
        assert!(json.get("price").is_none());
        assert_eq!(json["year"], serde_json::json!(2015.0));
        assert_eq!(json["make"], serde_json::json!("volvo"));
    }
}
