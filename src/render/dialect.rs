//! Dialect-specific spellings.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ir::CastType;

/// Supported SQL dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    Sqlite,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Positional placeholder for the `index`-th binding (1-based)
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", index),
            Dialect::Sqlite => "?".to_string(),
        }
    }

    /// Quote a possibly table-qualified identifier; `*` segments stay bare
    pub fn quote_identifier(&self, ident: &str) -> String {
        ident
            .split('.')
            .map(|part| {
                if part == "*" {
                    part.to_string()
                } else {
                    format!("\"{}\"", part.replace('"', "\"\""))
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// JSON extraction over an already-rendered column
    ///
    /// Intermediate segments yield JSON, the last one yields text.
    pub fn json_extract(&self, column_sql: &str, path: &[String]) -> String {
        match self {
            Dialect::Postgres => {
                let mut out = column_sql.to_string();
                let last = path.len().saturating_sub(1);
                for (i, segment) in path.iter().enumerate() {
                    out.push_str(if i == last { "->>" } else { "->" });
                    if is_index(segment) {
                        out.push_str(segment);
                    } else {
                        out.push_str(&quote_string(segment));
                    }
                }
                out
            }
            Dialect::Sqlite => {
                let mut json_path = String::from("$");
                for segment in path {
                    if is_index(segment) {
                        json_path.push_str(&format!("[{}]", segment));
                    } else {
                        json_path.push_str(&format!(".\"{}\"", segment.replace('"', "\\\"")));
                    }
                }
                format!("json_extract({}, {})", column_sql, quote_string(&json_path))
            }
        }
    }

    /// Cast an already-rendered expression
    pub fn cast(&self, expr_sql: &str, to: CastType) -> String {
        match (self, to) {
            (Dialect::Postgres, CastType::Uuid) => format!("{}::uuid", expr_sql),
            (Dialect::Postgres, CastType::Integer) => format!("{}::integer", expr_sql),
            (Dialect::Sqlite, CastType::Uuid) => format!("CAST({} AS TEXT)", expr_sql),
            (Dialect::Sqlite, CastType::Integer) => format!("CAST({} AS INTEGER)", expr_sql),
        }
    }

    /// Inline literal for `raw_sql`
    pub fn literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => match self {
                Dialect::Postgres => (if *b { "true" } else { "false" }).to_string(),
                Dialect::Sqlite => (if *b { "1" } else { "0" }).to_string(),
            },
            Value::Number(n) => n.to_string(),
            Value::String(s) => quote_string(s),
            Value::Array(_) | Value::Object(_) => quote_string(&value.to_string()),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quote_identifier() {
        let d = Dialect::Postgres;
        assert_eq!(d.quote_identifier("status"), "\"status\"");
        assert_eq!(d.quote_identifier("orders.id"), "\"orders\".\"id\"");
        assert_eq!(d.quote_identifier("orders.*"), "\"orders\".*");
        assert_eq!(d.quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_postgres_json_extract() {
        let path = vec!["info".to_string(), "tags".to_string()];
        assert_eq!(
            Dialect::Postgres.json_extract("\"meta\"", &path),
            "\"meta\"->'info'->>'tags'"
        );
        let indexed = vec!["items".to_string(), "0".to_string()];
        assert_eq!(
            Dialect::Postgres.json_extract("\"meta\"", &indexed),
            "\"meta\"->'items'->>0"
        );
    }

    #[test]
    fn test_sqlite_json_extract() {
        let path = vec!["items".to_string(), "0".to_string(), "sku".to_string()];
        assert_eq!(
            Dialect::Sqlite.json_extract("\"meta\"", &path),
            "json_extract(\"meta\", '$.\"items\"[0].\"sku\"')"
        );
    }

    #[test]
    fn test_casts() {
        assert_eq!(Dialect::Postgres.cast("\"a\"", CastType::Uuid), "\"a\"::uuid");
        assert_eq!(
            Dialect::Sqlite.cast("\"a\"", CastType::Integer),
            "CAST(\"a\" AS INTEGER)"
        );
    }

    #[test]
    fn test_literals() {
        let d = Dialect::Postgres;
        assert_eq!(d.literal(&json!("O'Brien")), "'O''Brien'");
        assert_eq!(d.literal(&json!(100)), "100");
        assert_eq!(d.literal(&json!(null)), "NULL");
        assert_eq!(Dialect::Sqlite.literal(&json!(true)), "1");
        assert_eq!(d.literal(&json!({"a": 1})), "'{\"a\":1}'");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
        assert_eq!(Dialect::Sqlite.placeholder(3), "?");
    }
}
