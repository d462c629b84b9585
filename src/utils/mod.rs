pub mod constants;
pub mod string_utils;

pub use constants::*;
pub use string_utils::{first_line, sanitize_partition_name, tail_chars};
