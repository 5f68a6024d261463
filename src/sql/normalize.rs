//! Formatting-insensitive canonical form of SQL text.
//!
//! Tokens come from the PostgreSQL scanner (`pg_query::scan`), so keyword
//! classification and operator boundaries match the server exactly. The
//! normalized text is what gets compared and persisted. It stays valid SQL
//! because it is replayed as the reverse step of an upsert.

use pg_query::protobuf::{KeywordKind, ScanToken, Token as PgToken};
use sha2::{Digest, Sha256};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Keyword,
    Ident,
    QuotedIdent,
    Str,
    Dollar,
    Number,
    Param,
    LineComment,
    BlockComment,
    Punct,
    Operator,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    text: String,
}

impl Token {
    fn is(&self, text: &str) -> bool {
        matches!(self.kind, TokenKind::Punct | TokenKind::Operator) && self.text == text
    }

    /// Upper-cased text of a bare word (keyword or unquoted identifier)
    fn upper(&self) -> Option<String> {
        match self.kind {
            TokenKind::Keyword | TokenKind::Ident => Some(self.text.to_ascii_uppercase()),
            _ => None,
        }
    }
}

/// Body languages the normalizer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Language {
    Sql,
    PlPgSql,
    Other,
}

/// Keywords that start a new line when they appear outside parentheses
const CLAUSE_KEYWORDS: &[&str] = &[
    "BEGIN", "DECLARE", "END", "EXCEPTION", "FROM", "GROUP", "HAVING", "LANGUAGE", "LIMIT",
    "ORDER", "RETURNING", "RETURNS", "SELECT", "UNION", "VALUES", "WHERE",
];

/// Words that keep a space before an opening parenthesis
const SPACED_BEFORE_PAREN: &[&str] = &[
    "ALL", "AND", "ANY", "AS", "BETWEEN", "BY", "ELSE", "EXISTS", "FROM", "IN", "IS",
    "JOIN", "LIKE", "NOT", "ON", "OR", "RETURN", "RETURNS", "SELECT", "THEN", "USING",
    "VALUES", "WHEN", "WHERE", "WITH",
];

/// PL/pgSQL statement keywords unknown to the core scanner
const PLPGSQL_KEYWORDS: &[&str] = &[
    "ALIAS", "ASSERT", "BACKWARD", "CALL", "CLOSE", "COLUMN_NAME", "CONSTANT",
    "CONSTRAINT_NAME", "CONTINUE", "DATATYPE", "DEBUG", "DETAIL", "DIAGNOSTICS", "DUMP",
    "ELSEIF", "ELSIF", "ERRCODE", "ERROR", "EXCEPTION", "EXIT", "FOREACH", "GET", "HINT",
    "INFO", "LOG", "LOOP", "MESSAGE", "MESSAGE_TEXT", "NOTICE", "OPEN", "PERFORM",
    "PG_CONTEXT", "PG_DATATYPE_NAME", "PG_EXCEPTION_CONTEXT", "PG_EXCEPTION_DETAIL",
    "PG_EXCEPTION_HINT", "PG_ROUTINE_OID", "PRINT_STRICT_PARAMS", "QUERY", "RAISE",
    "RETURNED_SQLSTATE", "REVERSE", "ROW_COUNT", "ROWTYPE", "SCHEMA_NAME", "SLICE",
    "SQLSTATE", "STACKED", "TABLE_NAME", "USE_COLUMN", "USE_VARIABLE", "VARIABLE_CONFLICT",
    "WARNING", "WHILE",
];

/// Canonicalize SQL text: collapse whitespace, upper-case keywords, fold
/// unquoted identifiers and put major clauses on their own line.
/// Deterministic and idempotent.
pub fn normalize_sql(sql: &str) -> String {
    match tokenize(sql) {
        Some(tokens) => {
            let language = body_language(&tokens);
            render(&tokens, Some(language), false)
        }
        None => sql.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

/// SHA-256 of the normalized SQL, used for display
pub fn calculate_sql_hash(sql: &str) -> String {
    let normalized = normalize_sql(sql);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Scan with the PostgreSQL lexer. `None` when the text does not scan, for
/// example with an unterminated literal.
fn tokenize(sql: &str) -> Option<Vec<Token>> {
    let scanned = match pg_query::scan(sql) {
        Ok(result) => result,
        Err(e) => {
            debug!(error = %e, "SQL did not scan, falling back to whitespace collapsing");
            return None;
        }
    };

    scanned
        .tokens
        .iter()
        .map(|scan_token| {
            let text = sql.get(scan_token.start as usize..scan_token.end as usize)?;
            Some(Token {
                kind: classify(scan_token, text),
                text: text.to_string(),
            })
        })
        .collect()
}

fn classify(scan_token: &ScanToken, text: &str) -> TokenKind {
    match scan_token.token() {
        PgToken::SqlComment => TokenKind::LineComment,
        PgToken::CComment => TokenKind::BlockComment,
        PgToken::Sconst if text.starts_with('$') => TokenKind::Dollar,
        PgToken::Sconst | PgToken::Usconst | PgToken::Bconst | PgToken::Xconst => TokenKind::Str,
        PgToken::Uident => TokenKind::QuotedIdent,
        PgToken::Ident if text.starts_with('"') => TokenKind::QuotedIdent,
        PgToken::Ident => TokenKind::Ident,
        PgToken::Iconst | PgToken::Fconst => TokenKind::Number,
        PgToken::Param => TokenKind::Param,
        PgToken::Typecast | PgToken::ColonEquals | PgToken::DotDot => TokenKind::Punct,
        _ if scan_token.keyword_kind() != KeywordKind::NoKeyword => TokenKind::Keyword,
        _ if matches!(text, "(" | ")" | "," | ";" | "[" | "]" | "." | ":") => TokenKind::Punct,
        _ => TokenKind::Operator,
    }
}

/// Language named by the `LANGUAGE` clause. Without one the body is SQL
/// (`BEGIN ATOMIC` or a plain statement).
fn body_language(tokens: &[Token]) -> Language {
    let language = tokens
        .windows(2)
        .find(|pair| pair[0].kind == TokenKind::Keyword && pair[0].upper().as_deref() == Some("LANGUAGE"))
        .map(|pair| language_value(&pair[1]));

    match language.as_deref() {
        None | Some("sql") => Language::Sql,
        Some("plpgsql") => Language::PlPgSql,
        Some(_) => Language::Other,
    }
}

fn language_value(token: &Token) -> String {
    token
        .text
        .trim_matches(|c| c == '\'' || c == '"')
        .to_ascii_lowercase()
}

/// Render tokens in canonical layout. `body_language` is set for a whole
/// statement and governs the `AS $$...$$` body; `plpgsql` is set while
/// rendering a PL/pgSQL body.
fn render(tokens: &[Token], body_language: Option<Language>, plpgsql: bool) -> String {
    let mut out = String::new();
    let mut depth = 0usize;
    let mut force_newline = false;
    let mut prev: Option<&Token> = None;

    for token in tokens {
        if token.is(")") || token.is("]") {
            depth = depth.saturating_sub(1);
        }

        let after = |word: &str| prev.and_then(|p| p.upper()).as_deref() == Some(word);

        let text = match token.kind {
            TokenKind::Keyword | TokenKind::Ident if after("LANGUAGE") => language_value(token),
            TokenKind::Keyword => token.text.to_ascii_uppercase(),
            TokenKind::Ident if plpgsql && PLPGSQL_KEYWORDS.contains(&token.text.to_ascii_uppercase().as_str()) => {
                token.text.to_ascii_uppercase()
            }
            TokenKind::Ident => token.text.to_ascii_lowercase(),
            TokenKind::Str if after("LANGUAGE") => format!("'{}'", language_value(token)),
            TokenKind::Dollar if after("AS") => match body_language {
                Some(Language::Sql) => render_dollar_body(&token.text, false),
                Some(Language::PlPgSql) => render_dollar_body(&token.text, true),
                _ => token.text.clone(),
            },
            TokenKind::LineComment => token.text.trim_end().to_string(),
            _ => token.text.clone(),
        };

        if !out.is_empty() {
            if force_newline || (depth == 0 && starts_clause(prev, token)) {
                out.push('\n');
            } else if needs_space(prev, token) {
                out.push(' ');
            }
        }
        out.push_str(&text);

        if token.is("(") || token.is("[") {
            depth += 1;
        }
        force_newline = token.kind == TokenKind::LineComment || (token.is(";") && depth == 0);
        prev = Some(token);
    }

    out.trim_end().to_string()
}

/// Re-render a `$tag$ ... $tag$` body. Bodies that do not scan keep their
/// text, trimmed.
fn render_dollar_body(text: &str, plpgsql: bool) -> String {
    let Some(delimiter) = dollar_delimiter(text) else {
        return text.to_string();
    };
    let body = match text
        .strip_prefix(delimiter)
        .and_then(|rest| rest.strip_suffix(delimiter))
    {
        Some(body) if text.len() >= delimiter.len() * 2 => body,
        _ => return text.to_string(),
    };

    let inner = match tokenize(body) {
        Some(tokens) => render(&tokens, None, plpgsql),
        None => body.trim().to_string(),
    };
    if inner.is_empty() {
        format!("{}{}", delimiter, delimiter)
    } else {
        format!("{}\n{}\n{}", delimiter, inner, delimiter)
    }
}

/// The leading `$tag$` of a dollar-quoted literal
fn dollar_delimiter(text: &str) -> Option<&str> {
    let rest = text.strip_prefix('$')?;
    let close = rest.find('$')?;
    Some(&text[..close + 2])
}

fn starts_clause(prev: Option<&Token>, token: &Token) -> bool {
    if token.kind != TokenKind::Keyword {
        return false;
    }
    let word = token.text.to_ascii_uppercase();
    if !CLAUSE_KEYWORDS.contains(&word.as_str()) {
        return false;
    }
    // Keep compound forms such as `IS DISTINCT FROM` or `WITHIN GROUP` together
    let prev_word = prev.and_then(|p| p.upper());
    !matches!(prev_word.as_deref(), Some("DISTINCT") | Some("WITHIN") | Some("DELETE"))
}

fn needs_space(prev: Option<&Token>, token: &Token) -> bool {
    let Some(prev) = prev else {
        return false;
    };

    if [",", ";", ")", "]", ".", "::"].iter().any(|p| token.is(p)) {
        return false;
    }
    if ["(", "[", ".", "::"].iter().any(|p| prev.is(p)) {
        return false;
    }
    if token.is("(") || token.is("[") {
        return match prev.kind {
            TokenKind::Keyword | TokenKind::Ident => prev
                .upper()
                .map_or(false, |w| SPACED_BEFORE_PAREN.contains(&w.as_str())),
            TokenKind::QuotedIdent | TokenKind::Param => false,
            _ => !(prev.is(")") || prev.is("]")),
        };
    }
    true
}
