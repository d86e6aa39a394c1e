mod json;

pub use json::{parse_json, to_json_string, write_json};
