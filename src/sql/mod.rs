pub mod name;
pub mod normalize;
pub mod splitter;

pub use name::extract_function_name;
pub use normalize::{normalize_sql, calculate_sql_hash};
pub use splitter::{split_sql_file, SqlStatement};
