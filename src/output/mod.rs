//! JSON response envelope for the CLI.

mod response;

pub use response::{map_cmd_result_to_json, print_json_result};
