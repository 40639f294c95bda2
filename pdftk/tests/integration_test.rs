#[path = "integration/common/mod.rs"]
mod common;

#[path = "integration/assembly.rs"]
mod assembly;

#[path = "integration/burst.rs"]
mod burst;

#[path = "integration/reports.rs"]
mod reports;

#[path = "integration/filters.rs"]
mod filters;

#[path = "integration/error_cases.rs"]
mod error_cases;
