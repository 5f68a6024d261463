use regex::Regex;
use std::sync::OnceLock;
use crate::error::{PgfnError, Result};

static FUNCTION_NAME: OnceLock<Regex> = OnceLock::new();

fn function_name_pattern() -> &'static Regex {
    FUNCTION_NAME.get_or_init(|| {
        Regex::new(r"FUNCTION.+?(\w+).+").expect("function name pattern is valid")
    })
}

/// Extract the function name from a `CREATE FUNCTION` definition.
///
/// This is a plain pattern search, not a parse: the first `FUNCTION` keyword
/// (case-sensitive) followed by an identifier on the same line wins. For a
/// schema-qualified name such as `api.totals` the schema part is returned.
pub fn extract_function_name(sql: &str) -> Result<String> {
    function_name_pattern()
        .captures(sql)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| PgfnError::NameExtraction {
            sql_preview: create_sql_preview(sql),
        })
}

/// Shorten SQL for error messages
pub(crate) fn create_sql_preview(sql: &str) -> String {
    let flattened = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= 80 {
        flattened
    } else {
        let head: String = flattened.chars().take(77).collect();
        format!("{}...", head)
    }
}
