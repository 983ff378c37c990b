pub mod extract;

pub use extract::{extract_metadata, parse_extract_request};
