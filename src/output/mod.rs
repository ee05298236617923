//! Run reports
//!
//! `json` builds and writes the machine-readable report, `text` prints the
//! console summary. Both read from the same `RunReport`.

pub mod json;
pub mod text;

pub use json::{write_json_output, JsonDuration, RunReport};
pub use text::print_summary;
