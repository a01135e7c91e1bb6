// src/report/mod.rs
//! Raw results, the derived flat table, and the run directory.

mod raw;
mod results_dir;
mod table;

pub use raw::{FailedCase, RawResult, RawResults};
pub use results_dir::{RunDir, RunMetadata};
pub use table::{render_table, write_csv, ResultRecord, CSV_HEADERS};
