//! Data and model quality gates.

pub mod data;
pub mod model;
pub mod report;

pub use data::DataValidator;
pub use model::{BaselineRegressionCheck, ModelCheck, ModelCheckContext, ModelValidation, ModelValidator};
pub use report::{CheckResult, ReportKind, ValidationReport};
