//! Whole-operation compilation.
//!
//! Validation of required fields happens here, before anything touches the
//! store.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};

use super::join::JoinCompiler;
use super::json_path::JsonPathResolver;
use super::predicate::PredicateCompiler;
use crate::clock::Clock;
use crate::errors::{QueryError, QueryResult};
use crate::filter::FilterGroup;
use crate::ir::{
    DeleteQuery, Expr, InsertQuery, OrderBy, Predicate, Query, SelectQuery, TableRef, UpdateQuery,
};
use crate::operation::{CountOp, DeleteOp, InsertOp, Operation, SelectOp, SortSpec, UpdateOp};

/// Compiles operation descriptors into IR statements
#[derive(Debug, Clone, Default)]
pub struct OperationCompiler {
    resolver: JsonPathResolver,
    predicates: PredicateCompiler,
    joins: JoinCompiler,
}

impl OperationCompiler {
    pub fn new(separator: &str) -> Self {
        let resolver = JsonPathResolver::new(separator);
        Self {
            predicates: PredicateCompiler::new(resolver.clone()),
            joins: JoinCompiler::new(resolver.clone()),
            resolver,
        }
    }

    pub fn resolver(&self) -> &JsonPathResolver {
        &self.resolver
    }

    /// Compile any operation; the clock anchors presets and soft-delete stamps
    pub fn compile(&self, operation: &Operation, clock: &dyn Clock) -> QueryResult<Query> {
        let today = clock.today();
        match operation {
            Operation::Select(op) => self.select(op, today).map(Query::Select),
            Operation::Count(op) => self.count(op, today).map(Query::Count),
            Operation::Insert(op) => self.insert(op).map(Query::Insert),
            Operation::Update(op) => self.update(op, today).map(Query::Update),
            Operation::Delete(op) => self.delete(op, today, clock.now()),
        }
    }

    pub fn select(&self, op: &SelectOp, today: NaiveDate) -> QueryResult<SelectQuery> {
        let mut query = SelectQuery::from_table(table_ref(&op.table_name)?);

        if let Some(attributes) = &op.attributes {
            query.projection = attributes
                .iter()
                .map(|attr| self.resolver.projection(attr))
                .collect::<QueryResult<Vec<_>>>()?;
        }

        self.apply_filters(&mut query, op.filters.as_ref(), op.delete_column.as_deref(), today)?;

        if let Some(joins) = &op.joins {
            query.joins = self.joins.compile_all(joins)?;
        }

        if let Some(sorts) = &op.sorts {
            query.order_by = sorts
                .iter()
                .map(|sort| self.order_by(sort))
                .collect::<QueryResult<Vec<_>>>()?;
        }

        query.group_by = group_by(op.group_by.as_deref())?;
        Ok(query)
    }

    pub fn count(&self, op: &CountOp, today: NaiveDate) -> QueryResult<SelectQuery> {
        let mut query = SelectQuery::from_table(table_ref(&op.table_name)?);
        self.apply_filters(&mut query, op.filters.as_ref(), op.delete_column.as_deref(), today)?;
        if let Some(joins) = &op.joins {
            query.joins = self.joins.compile_all(joins)?;
        }
        query.group_by = group_by(op.group_by.as_deref())?;
        Ok(query)
    }

    /// Single object or list of objects sharing one column set
    pub fn insert(&self, op: &InsertOp) -> QueryResult<InsertQuery> {
        let table = table_ref(&op.table_name)?;
        let empty = || QueryError::invalid_argument("Data array is required and cannot be empty");

        let rows: Vec<&Map<String, Value>> = match op.data.as_ref().ok_or_else(empty)? {
            Value::Object(row) if !row.is_empty() => vec![row],
            Value::Array(items) if !items.is_empty() => items
                .iter()
                .map(|item| match item {
                    Value::Object(row) if !row.is_empty() => Ok(row),
                    _ => Err(QueryError::invalid_argument(
                        "Each row of a bulk insert must be a non-empty object",
                    )),
                })
                .collect::<QueryResult<Vec<_>>>()?,
            _ => return Err(empty()),
        };

        let columns: Vec<String> = rows[0].keys().cloned().collect();
        if rows
            .iter()
            .any(|row| row.len() != columns.len() || !columns.iter().all(|c| row.contains_key(c)))
        {
            return Err(QueryError::invalid_argument(
                "All rows of a bulk insert must have the same columns",
            ));
        }

        let values = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Ok(InsertQuery {
            table,
            columns,
            rows: values,
        })
    }

    pub fn update(&self, op: &UpdateOp, today: NaiveDate) -> QueryResult<UpdateQuery> {
        let table = table_ref(&op.table_name)?;
        let assignments = match &op.data {
            Some(Value::Object(data)) if !data.is_empty() => data
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Vec<_>>(),
            _ => return Err(QueryError::invalid_argument("Update data is required")),
        };
        let filters = op.filters.as_ref().ok_or_else(|| {
            QueryError::invalid_argument("Update conditions (filters) are required")
        })?;

        Ok(UpdateQuery {
            table,
            assignments,
            predicate: self.predicates.compile(filters, today)?,
        })
    }

    /// Physical delete, or an update stamping `deleteColumn` with `now`
    pub fn delete(&self, op: &DeleteOp, today: NaiveDate, now: DateTime<Utc>) -> QueryResult<Query> {
        let table = table_ref(&op.table_name)?;
        let filters = op.filters.as_ref().ok_or_else(|| {
            QueryError::invalid_argument("Delete conditions (filters) are required")
        })?;
        let predicate = self.predicates.compile(filters, today)?;

        match op.delete_column.as_deref().map(str::trim) {
            Some(column) if !column.is_empty() => Ok(Query::Update(UpdateQuery {
                table,
                assignments: vec![(column.to_string(), timestamp(now))],
                predicate,
            })),
            _ => Ok(Query::Delete(DeleteQuery { table, predicate })),
        }
    }

    fn apply_filters(
        &self,
        query: &mut SelectQuery,
        filters: Option<&FilterGroup>,
        delete_column: Option<&str>,
        today: NaiveDate,
    ) -> QueryResult<()> {
        if let Some(filters) = filters {
            query.filter(self.predicates.compile(filters, today)?);
        }
        if let Some(column) = delete_column.map(str::trim).filter(|c| !c.is_empty()) {
            query.filter(Predicate::is_null(Expr::column(column)));
        }
        Ok(())
    }

    fn order_by(&self, sort: &SortSpec) -> QueryResult<OrderBy> {
        Ok(OrderBy {
            expr: self.resolver.resolve_attribute(&sort.attribute)?,
            direction: sort.direction,
        })
    }
}

fn table_ref(name: &str) -> QueryResult<TableRef> {
    let name = name.trim();
    if name.is_empty() {
        return Err(QueryError::invalid_argument("Table name is required"));
    }
    Ok(TableRef::new(name))
}

fn group_by(columns: Option<&[String]>) -> QueryResult<Vec<String>> {
    let columns = columns.unwrap_or_default();
    if columns.iter().any(|c| c.trim().is_empty()) {
        return Err(QueryError::invalid_argument("groupBy columns must not be empty"));
    }
    Ok(columns.iter().map(|c| c.trim().to_string()).collect())
}

fn timestamp(now: DateTime<Utc>) -> Value {
    Value::String(now.format("%Y-%m-%d %H:%M:%S").to_string())
}
