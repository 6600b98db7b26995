//! Data quality gate.
//!
//! Runs a fixed battery of checks over every record. All checks run and are
//! reported even when an earlier one fails. Malformed or missing numeric cells
//! are counted against the check for that field.

use super::report::{CheckResult, ReportKind, ValidationReport};
use crate::config::PipelineConfig;
use crate::config::pipeline_config::{DEFAULT_MIN_ROWS, DEFAULT_MIN_YEAR};
use chrono::Datelike;
use modelgate_training::{CarRecord, FieldValue, NumericField};
use tracing::debug;

pub const VALID_PRICE: &str = "valid_price";
pub const VALID_YEAR: &str = "valid_year";
pub const VALID_MILEAGE: &str = "valid_mileage";
pub const MINIMUM_ROW_COUNT: &str = "minimum_row_count";

#[derive(Debug, Clone)]
pub struct DataValidator {
    min_rows: usize,
    min_year: i32,
    current_year: Option<i32>,
}

impl Default for DataValidator {
    fn default() -> Self {
        Self { min_rows: DEFAULT_MIN_ROWS, min_year: DEFAULT_MIN_YEAR, current_year: None }
    }
}

impl DataValidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new().with_min_rows(config.min_rows()).with_min_year(config.min_year())
    }

    /// Row count must be strictly greater than `min_rows`.
    #[must_use]
    pub fn with_min_rows(mut self, min_rows: usize) -> Self {
        self.min_rows = min_rows;
        self
    }

    /// Years must be strictly greater than `min_year`.
    #[must_use]
    pub fn with_min_year(mut self, min_year: i32) -> Self {
        self.min_year = min_year;
        self
    }

    /// Pin the current year instead of reading the clock at validation time.
    #[must_use]
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = Some(year);
        self
    }

    pub fn validate(&self, records: &[CarRecord]) -> ValidationReport {
        let current_year = self.current_year.unwrap_or_else(|| chrono::Utc::now().year());
        let min_year = f64::from(self.min_year);
        let max_year_exclusive = f64::from(current_year) + 1.0;

        let price = FieldTally::scan(records, NumericField::Price, |v| v < 0.0);
        let year = FieldTally::scan(records, NumericField::Year, |v| v <= min_year || v >= max_year_exclusive);
        let mileage = FieldTally::scan(records, NumericField::Mileage, |v| v < 0.0);

        let checks = vec![
            price.into_check(VALID_PRICE, "price < 0", "price >= 0", records.len()),
            year.into_check(
                VALID_YEAR,
                &format!("year outside ({}, {})", self.min_year, current_year + 1),
                &format!("year in ({}, {})", self.min_year, current_year + 1),
                records.len(),
            ),
            mileage.into_check(VALID_MILEAGE, "mileage < 0", "mileage >= 0", records.len()),
            self.row_count_check(records.len()),
        ];

        let report = ValidationReport::new(ReportKind::Data, checks);
        debug!(records = records.len(), passed = report.passed(), "data validation finished");
        report
    }

    fn row_count_check(&self, count: usize) -> CheckResult {
        if count > self.min_rows {
            CheckResult::pass(MINIMUM_ROW_COUNT, format!("{count} records (more than {} required)", self.min_rows))
        } else {
            CheckResult::fail(MINIMUM_ROW_COUNT, format!("{count} records; more than {} required", self.min_rows))
        }
    }
}

/// Violations and malformed cells found for one numeric field.
#[derive(Debug, Default)]
struct FieldTally {
    field: Option<NumericField>,
    violations: usize,
    first_violation: Option<(u64, f64)>,
    malformed: usize,
    first_malformed: Option<(u64, String)>,
}

impl FieldTally {
    fn scan(records: &[CarRecord], field: NumericField, violates: impl Fn(f64) -> bool) -> Self {
        let mut tally = Self { field: Some(field), ..Self::default() };
        for rec in records {
            match rec.field(field) {
                FieldValue::Number(v) => {
                    if violates(*v) {
                        tally.violations += 1;
                        tally.first_violation.get_or_insert((rec.line, *v));
                    }
                }
                FieldValue::Missing => {
                    tally.malformed += 1;
                    tally.first_malformed.get_or_insert_with(|| (rec.line, "missing".to_string()));
                }
                FieldValue::Malformed(raw) => {
                    tally.malformed += 1;
                    tally.first_malformed.get_or_insert_with(|| (rec.line, format!("{raw:?}")));
                }
            }
        }
        tally
    }

    fn into_check(self, name: &str, violation: &str, ok: &str, total: usize) -> CheckResult {
        let field = self.field.map_or("value", NumericField::name);
        let mut problems = Vec::new();
        if let Some((line, value)) = self.first_violation {
            problems.push(format!(
                "{} of {total} records have {violation} (first at line {line}: {value})",
                self.violations
            ));
        }
        if let Some((line, raw)) = self.first_malformed {
            problems.push(format!(
                "{} of {total} records have a malformed or missing {field} (first at line {line}: {raw})",
                self.malformed
            ));
        }

        if problems.is_empty() {
            CheckResult::pass(name, format!("all {total} records have {ok}"))
        } else {
            CheckResult::fail(name, problems.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn rec(line: u64, price: f64, year: f64, mileage: f64) -> CarRecord {
        CarRecord {
            line,
            price: FieldValue::Number(price),
            year: FieldValue::Number(year),
            mileage: FieldValue::Number(mileage),
            attributes: BTreeMap::new(),
        }
    }

    fn valid_rows(n: usize) -> Vec<CarRecord> {
        (0..n).map(|i| rec(i as u64 + 1, 5_000.0 + i as f64, 2015.0, 80_000.0)).collect()
    }

    fn validator() -> DataValidator {
        DataValidator::new().with_current_year(2024)
    }

    #[test]
    fn test_all_valid_passes() {
        let report = validator().validate(&valid_rows(10_001));
        assert!(report.passed(), "{}", report.summary());
        assert_eq!(report.checks().len(), 4);
    }

    #[test]
    fn test_row_count_boundary_is_strict() {
        let report = validator().validate(&valid_rows(10_000));
        assert!(!report.check(MINIMUM_ROW_COUNT).unwrap().passed);
        assert!(!report.passed());
        assert!(report.check(VALID_PRICE).unwrap().passed);
    }

    #[test]
    fn test_negative_price_fails_and_other_checks_still_run() {
        let mut rows = valid_rows(5);
        rows[2].price = FieldValue::Number(-1.0);
        let report = validator().with_min_rows(1).validate(&rows);

        let price = report.check(VALID_PRICE).unwrap();
        assert!(!price.passed);
        assert!(price.message.contains("first at line 3"), "{}", price.message);
        assert!(report.check(VALID_YEAR).unwrap().passed);
        assert!(report.check(VALID_MILEAGE).unwrap().passed);
        assert!(report.check(MINIMUM_ROW_COUNT).unwrap().passed);
        assert!(!report.passed());
    }

    #[test]
    fn test_year_bounds_are_exclusive() {
        let v = validator().with_min_rows(0);
        for (year, ok) in [(1950.0, false), (1951.0, true), (2024.0, true), (2025.0, false), (2024.5, true)] {
            let report = v.validate(&[rec(1, 1.0, year, 1.0)]);
            assert_eq!(report.check(VALID_YEAR).unwrap().passed, ok, "year {year}");
        }
    }

    #[test]
    fn test_zero_price_and_mileage_are_valid() {
        let report = validator().with_min_rows(0).validate(&[rec(1, 0.0, 2000.0, 0.0)]);
        assert!(report.passed());
    }

    #[test]
    fn test_negative_mileage_fails() {
        let report = validator().with_min_rows(0).validate(&[rec(1, 1.0, 2000.0, -5.0)]);
        assert!(!report.check(VALID_MILEAGE).unwrap().passed);
    }

    #[test]
    fn test_malformed_cells_count_against_their_check() {
        let mut rows = valid_rows(3);
        rows[0].mileage = FieldValue::Malformed("lots".to_string());
        rows[1].year = FieldValue::Missing;
        let report = validator().with_min_rows(0).validate(&rows);

        let mileage = report.check(VALID_MILEAGE).unwrap();
        assert!(!mileage.passed);
        assert!(mileage.message.contains("malformed or missing mileage"), "{}", mileage.message);
        assert!(mileage.message.contains("\"lots\""));

        let year = report.check(VALID_YEAR).unwrap();
        assert!(!year.passed);
        assert!(year.message.contains("missing"));

        assert!(report.check(VALID_PRICE).unwrap().passed);
    }

    #[test]
    fn test_unreadable_record_fails_all_field_checks() {
        let rows = vec![CarRecord::unreadable(1, "bad row")];
        let report = validator().with_min_rows(0).validate(&rows);
        assert!(!report.check(VALID_PRICE).unwrap().passed);
        assert!(!report.check(VALID_YEAR).unwrap().passed);
        assert!(!report.check(VALID_MILEAGE).unwrap().passed);
    }

    #[test]
    fn test_validator_does_not_mutate_input() {
        let rows = valid_rows(3);
        let before = rows.clone();
        let _ = validator().validate(&rows);
        assert_eq!(rows, before);
    }
}
