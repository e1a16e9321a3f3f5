//! Validation of caller-supplied SQL fragments.
//!
//! Table names are interpolated into statements, so they are restricted to
//! plain identifiers. Free-form queries must be a single `SELECT`.

use super::DatabaseError;

pub const DEFAULT_SCHEMA: &str = "public";

/// A validated, optionally schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    schema: Option<String>,
    table: String,
}

impl TableName {
    pub fn parse(raw: &str) -> Result<Self, DatabaseError> {
        let raw = raw.trim();
        let invalid = || DatabaseError::InvalidTableName(raw.to_string());

        if raw.is_empty()
            || !raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            return Err(invalid());
        }

        let parts: Vec<&str> = raw.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }

        match parts.as_slice() {
            [table] => Ok(Self {
                schema: None,
                table: table.to_string(),
            }),
            [schema, table] => Ok(Self {
                schema: Some(schema.to_string()),
                table: table.to_string(),
            }),
            _ => Err(invalid()),
        }
    }

    pub fn schema(&self) -> &str {
        self.schema.as_deref().unwrap_or(DEFAULT_SCHEMA)
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.table),
            None => write!(f, "{}", self.table),
        }
    }
}

/// A single `SELECT` statement, trailing `;` removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOnlyQuery(String);

impl ReadOnlyQuery {
    pub fn parse(raw: &str) -> Result<Self, DatabaseError> {
        let reject = |reason: &str| Err(DatabaseError::NotReadOnly(reason.to_string()));

        let body = skip_comments_and_whitespace(raw)
            .ok_or_else(|| DatabaseError::NotReadOnly("unterminated comment".to_string()))?;
        if body.is_empty() {
            return reject("query is empty");
        }

        let keyword: String = body
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        if !keyword.eq_ignore_ascii_case("select") {
            return reject(&format!(
                "statement starts with {}",
                if keyword.is_empty() { "a symbol" } else { keyword.as_str() }
            ));
        }

        let statement = match statement_end(body)? {
            Some(end) => {
                let rest = skip_comments_and_whitespace(&body[end + 1..])
                    .ok_or_else(|| DatabaseError::NotReadOnly("unterminated comment".to_string()))?;
                if !rest.is_empty() {
                    return reject("multiple statements");
                }
                &body[..end]
            }
            None => body,
        };

        Ok(Self(statement.trim_end().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Strip leading whitespace, `-- line` and `/* block */` comments.
/// `None` for an unterminated block comment.
fn skip_comments_and_whitespace(mut sql: &str) -> Option<&str> {
    loop {
        sql = sql.trim_start();
        if let Some(rest) = sql.strip_prefix("--") {
            sql = rest.find('\n').map(|i| &rest[i + 1..]).unwrap_or("");
        } else if sql.starts_with("/*") {
            sql = &sql[block_comment_len(sql)?..];
        } else {
            return Some(sql);
        }
    }
}

/// Byte offset of the first `;` outside quotes, dollar quotes and comments.
fn statement_end(sql: &str) -> Result<Option<usize>, DatabaseError> {
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b';' => return Ok(Some(i)),
            quote @ (b'\'' | b'"') => {
                i += 1;
                loop {
                    match bytes.get(i) {
                        None => {
                            return Err(DatabaseError::NotReadOnly(
                                "unterminated quoted string".to_string(),
                            ))
                        }
                        // Doubled quote is an escaped quote
                        Some(&b) if b == quote && bytes.get(i + 1) == Some(&quote) => i += 2,
                        Some(&b) if b == quote => break,
                        Some(_) => i += 1,
                    }
                }
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = sql[i..].find('\n').map(|n| i + n).unwrap_or(bytes.len());
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let len = block_comment_len(&sql[i..]).ok_or_else(|| {
                    DatabaseError::NotReadOnly("unterminated comment".to_string())
                })?;
                i += len - 1;
            }
            b'$' => {
                if let Some(tag_len) = dollar_tag_len(&sql[i..]) {
                    let tag = &sql[i..i + tag_len];
                    let close = sql[i + tag_len..].find(tag).ok_or_else(|| {
                        DatabaseError::NotReadOnly("unterminated dollar-quoted string".to_string())
                    })?;
                    i += tag_len + close + tag_len - 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    Ok(None)
}

/// Length of the block comment opening `s`. PostgreSQL nests block
/// comments, so it ends at the `*/` that brings the depth back to zero.
fn block_comment_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'/', b'*') => {
                depth += 1;
                i += 2;
            }
            (b'*', b'/') if depth > 0 => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => i += 1,
        }
    }
    None
}

/// Length of a `$tag$` opener at the start of `s`, if there is one.
fn dollar_tag_len(s: &str) -> Option<usize> {
    let rest = &s[1..];
    let end = rest.find('$')?;
    let tag = &rest[..end];
    let valid = tag
        .chars()
        .enumerate()
        .all(|(idx, c)| c == '_' || c.is_ascii_alphabetic() || (idx > 0 && c.is_ascii_digit()));
    valid.then_some(end + 2)
}
