//! Output formatting for decoding results.

mod json;

pub use json::{to_json, to_json_pretty, write_json};
