//! Attribute and JSON-path resolution.
//!
//! `meta->info->tags` addresses the `tags` key inside the `info` object of
//! the `meta` JSON column. Plain names resolve to columns, and attributes
//! that start like an SQL expression (`CASE`, `CAST`, `COALESCE`, ...) are
//! passed through as raw SQL.

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{QueryError, QueryResult};
use crate::ir::{Expr, Projection};

/// Default path separator
pub const DEFAULT_SEPARATOR: &str = "->";

static SQL_EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(CASE|CAST|COALESCE|CONCAT|NULLIF|IFNULL|IF)(\s|\()")
        .expect("static regex")
});

static AGGREGATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(COUNT|SUM|AVG|MIN|MAX)\s*\(").expect("static regex")
});

static ALIASED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+?)\s+as\s+([A-Za-z_][A-Za-z0-9_]*)$").expect("static regex")
});

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_]").expect("static regex"));

static REPEATED_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_{2,}").expect("static regex"));

/// Returns true if the attribute starts like an SQL expression
pub fn is_sql_expression(attribute: &str) -> bool {
    SQL_EXPRESSION.is_match(attribute)
}

/// Returns true if the attribute is an aggregate call such as `COUNT(*)`
pub fn is_aggregate(attribute: &str) -> bool {
    AGGREGATE.is_match(attribute)
}

/// Resolves attribute strings into IR expressions
#[derive(Debug, Clone)]
pub struct JsonPathResolver {
    separator: String,
}

impl Default for JsonPathResolver {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR)
    }
}

impl JsonPathResolver {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Returns true if the attribute contains the path separator
    pub fn is_path(&self, attribute: &str) -> bool {
        attribute.contains(self.separator.as_str())
    }

    /// First segment of a path; the attribute itself when it is not a path
    pub fn base_column<'a>(&self, path: &'a str) -> &'a str {
        path.split(self.separator.as_str())
            .next()
            .unwrap_or(path)
            .trim()
    }

    /// Resolve a column or JSON path
    pub fn resolve(&self, attribute: &str) -> QueryResult<Expr> {
        let attribute = attribute.trim();
        if attribute.is_empty() {
            return Err(QueryError::invalid_argument("Attribute cannot be empty"));
        }
        if !self.is_path(attribute) {
            return Ok(Expr::column(attribute));
        }

        let mut segments = attribute.split(self.separator.as_str()).map(str::trim);
        let column = segments.next().unwrap_or_default();
        let path: Vec<String> = segments.map(str::to_string).collect();

        if column.is_empty() || path.iter().any(|s| s.is_empty()) {
            return Err(QueryError::invalid_argument(format!(
                "Malformed JSON path: {}",
                attribute
            )));
        }

        Ok(Expr::json(column, path))
    }

    /// Resolve an attribute used in a filter, sort or join position
    ///
    /// SQL-expression detection runs before JSON-path detection.
    pub fn resolve_attribute(&self, attribute: &str) -> QueryResult<Expr> {
        if is_sql_expression(attribute) {
            return Ok(Expr::raw(attribute.trim()));
        }
        self.resolve(attribute)
    }

    /// Deterministic alias for a path: `meta->info->tags` becomes `meta_info_tags`
    pub fn alias(&self, path: &str) -> String {
        let replaced = path.replace(self.separator.as_str(), "_");
        let cleaned = NON_WORD.replace_all(&replaced, "_");
        let collapsed = REPEATED_UNDERSCORE.replace_all(&cleaned, "_");
        collapsed.trim_matches('_').to_lowercase()
    }

    /// Build a projection entry for a selected attribute
    ///
    /// - `path as alias` / `column as alias` use the explicit alias
    /// - SQL expressions and aggregates are emitted raw
    /// - JSON paths get a generated alias
    /// - everything else is a column identifier
    pub fn projection(&self, attribute: &str) -> QueryResult<Projection> {
        let attribute = attribute.trim();

        if is_sql_expression(attribute) || is_aggregate(attribute) {
            return Ok(Projection::new(Expr::raw(attribute)));
        }

        if let Some(caps) = ALIASED.captures(attribute) {
            let source = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            let alias = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            if self.is_plain(source) || self.is_path(source) {
                return Ok(Projection::aliased(self.resolve(source)?, alias));
            }
            return Ok(Projection::new(Expr::raw(attribute)));
        }

        if self.is_path(attribute) {
            let expr = self.resolve(attribute)?;
            return Ok(Projection::aliased(expr, self.alias(attribute)));
        }

        // Anything undetected is an identifier and gets quoted
        Ok(Projection::new(Expr::column(attribute)))
    }

    /// Identifier characters, dots and `*` only
    fn is_plain(&self, attribute: &str) -> bool {
        !attribute.is_empty()
            && attribute
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '*')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_column_unchanged() {
        let r = JsonPathResolver::default();
        assert_eq!(r.resolve("status").unwrap(), Expr::column("status"));
        assert_eq!(r.base_column("status"), "status");
    }

    #[test]
    fn test_json_path_resolution() {
        let r = JsonPathResolver::default();
        let expr = r.resolve("meta->info->tags").unwrap();
        assert_eq!(
            expr,
            Expr::json("meta", vec!["info".to_string(), "tags".to_string()])
        );
        assert_eq!(r.base_column("meta->info->tags"), "meta");
        assert_eq!(r.alias("meta->info->tags"), "meta_info_tags");
    }

    #[test]
    fn test_alias_cleaning() {
        let r = JsonPathResolver::default();
        assert_eq!(r.alias("Meta->Info Data->-tags-"), "meta_info_data_tags");
        assert_eq!(r.alias("__a->->b__"), "a_b");
    }

    #[test]
    fn test_malformed_path_rejected() {
        let r = JsonPathResolver::default();
        assert!(r.resolve("meta->").is_err());
        assert!(r.resolve("->info").is_err());
        assert!(r.resolve("  ").is_err());
    }

    #[test]
    fn test_sql_expression_detection() {
        assert!(is_sql_expression("CASE WHEN a > 1 THEN 'x' END"));
        assert!(is_sql_expression("coalesce(a, b)"));
        assert!(is_sql_expression("IF(a, 1, 0)"));
        assert!(!is_sql_expression("if_active"));
        assert!(!is_sql_expression("case_number"));
        assert!(is_aggregate("COUNT(*) AS total"));
        assert!(!is_aggregate("counter"));
    }

    #[test]
    fn test_sql_expression_wins_over_path() {
        let r = JsonPathResolver::default();
        let expr = r.resolve_attribute("COALESCE(meta->>'x', 'y')").unwrap();
        assert!(matches!(expr, Expr::Raw { .. }));
    }

    #[test]
    fn test_projection_forms() {
        let r = JsonPathResolver::default();

        let p = r.projection("meta->info->tags").unwrap();
        assert_eq!(p.alias.as_deref(), Some("meta_info_tags"));

        let p = r.projection("meta->info->tags as tags").unwrap();
        assert_eq!(p.alias.as_deref(), Some("tags"));
        assert!(matches!(p.expr, Expr::JsonExtract { .. }));

        let p = r.projection("orders.total AS amount").unwrap();
        assert_eq!(p, Projection::aliased(Expr::column("orders.total"), "amount"));

        let p = r.projection("SUM(total) AS revenue").unwrap();
        assert_eq!(p, Projection::new(Expr::raw("SUM(total) AS revenue")));

        let p = r.projection("orders.*").unwrap();
        assert_eq!(p, Projection::new(Expr::column("orders.*")));
    }

    #[test]
    fn test_undetected_attribute_is_quoted_identifier() {
        let r = JsonPathResolver::default();
        let attribute = "id FROM users; DROP TABLE orders; --";

        let p = r.projection(attribute).unwrap();
        assert_eq!(p, Projection::new(Expr::column(attribute)));

        let sql = crate::render::SqlRenderer::new(crate::render::Dialect::Postgres).expr(&p.expr);
        assert_eq!(sql, "\"id FROM users; DROP TABLE orders; --\"");
    }

    #[test]
    fn test_custom_separator() {
        let r = JsonPathResolver::new(".");
        assert_eq!(
            r.resolve("meta.info").unwrap(),
            Expr::json("meta", vec!["info".to_string()])
        );
        assert_eq!(r.alias("meta.info"), "meta_info");
    }
}
