use crate::error::Result;

#[derive(Debug, Clone)]
pub struct SqlStatement {
    pub index: usize,
    pub sql: String,
    pub start_line: Option<usize>,
}

/// Split SQL file content into individual statements using pg_query's parser.
/// The trailing semicolon is dropped by the parser and added back here so
/// every statement can be executed on its own.
pub fn split_sql_file(file_content: &str) -> Result<Vec<SqlStatement>> {
    let statements = pg_query::split_with_parser(file_content)?;

    let mut search_from = 0;
    let mut result = Vec::new();

    for (index, stmt) in statements.into_iter().enumerate() {
        let trimmed = stmt.trim();
        if trimmed.is_empty() {
            continue;
        }

        let start_line = file_content[search_from..].find(trimmed).map(|offset| {
            let absolute = search_from + offset;
            search_from = absolute + trimmed.len();
            file_content[..absolute].matches('\n').count() + 1
        });

        result.push(SqlStatement {
            index,
            sql: format!("{};", trimmed),
            start_line,
        });
    }

    Ok(result)
}
