//! Markdown rendering of result sets.

use serde::Serialize;

pub const NULL_TEXT: &str = "NULL";

/// Rows in PostgreSQL text format, `None` for NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl QueryRows {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_markdown(&self) -> String {
        if self.rows.is_empty() {
            return "No rows returned.".to_string();
        }

        let mut out = String::new();
        out.push_str(&markdown_row(self.columns.iter().map(String::as_str)));
        out.push_str(&markdown_row(self.columns.iter().map(|_| "---")));
        for row in &self.rows {
            out.push_str(&markdown_row(
                row.iter().map(|cell| cell.as_deref().unwrap_or(NULL_TEXT)),
            ));
        }
        out
    }
}

fn markdown_row<'a>(cells: impl Iterator<Item = &'a str>) -> String {
    let cells: Vec<String> = cells.map(escape_cell).collect();
    format!("| {} |\n", cells.join(" | "))
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|").replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_table_with_nulls() {
        let rows = QueryRows {
            columns: vec!["id".to_string(), "note".to_string()],
            rows: vec![
                vec![Some("1".to_string()), None],
                vec![Some("2".to_string()), Some("a|b\nc".to_string())],
            ],
        };
        assert_eq!(
            rows.to_markdown(),
            "| id | note |\n| --- | --- |\n| 1 | NULL |\n| 2 | a\\|b c |\n"
        );
    }

    #[test]
    fn test_empty_result() {
        let rows = QueryRows {
            columns: vec!["id".to_string()],
            rows: vec![],
        };
        assert!(rows.is_empty());
        assert_eq!(rows.to_markdown(), "No rows returned.");
    }
}
