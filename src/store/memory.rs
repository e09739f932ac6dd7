//! In-memory store
//!
//! Evaluates the IR over `serde_json` rows. One database is shared by all
//! connection names; each connection can hold one open transaction, backed
//! by a snapshot restored on rollback.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use super::eval::{eval_expr, eval_join_condition, eval_predicate, sort_order};
use super::{InsertOutcome, Row, Statement, Store, StoreError, StoreResult};
use crate::ir::{
    DeleteQuery, Expr, InsertQuery, Join, JoinKind, Predicate, Projection, SelectQuery,
    TableRef, UpdateQuery,
};

type Tables = BTreeMap<String, Vec<Row>>;

/// Call counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub selects: u64,
    pub counts: u64,
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
    pub begins: u64,
    pub commits: u64,
    pub rollbacks: u64,
}

impl StoreStats {
    /// Statements executed, excluding transaction control
    pub fn statements(&self) -> u64 {
        self.selects + self.counts + self.inserts + self.updates + self.deletes
    }
}

/// In-memory relational store
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tables: Tables,
    snapshots: BTreeMap<String, Tables>,
    primary_key: String,
    fail_on: Option<String>,
    stats: StoreStats,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Tables::new(),
            snapshots: BTreeMap::new(),
            primary_key: "id".to_string(),
            fail_on: None,
            stats: StoreStats::default(),
        }
    }

    /// Column that receives generated keys on insert
    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    pub fn with_table(mut self, name: impl Into<String>, rows: Vec<Row>) -> Self {
        self.tables.insert(name.into(), rows);
        self
    }

    /// Make every statement touching `table` fail
    pub fn fail_on(mut self, table: impl Into<String>) -> Self {
        self.fail_on = Some(table.into());
        self
    }

    /// Seed from `{"table": [{...}, ...], ...}`
    pub fn from_value(value: &Value) -> StoreResult<Self> {
        let tables = value
            .as_object()
            .ok_or_else(|| StoreError::Query("Seed data must be an object of tables".into()))?;

        let mut store = Self::new();
        for (name, rows) in tables {
            let rows = rows
                .as_array()
                .ok_or_else(|| StoreError::Query(format!("Table '{}' must be an array", name)))?
                .iter()
                .map(|row| {
                    row.as_object().cloned().ok_or_else(|| {
                        StoreError::Query(format!("Rows of '{}' must be objects", name))
                    })
                })
                .collect::<StoreResult<Vec<_>>>()?;
            store.tables.insert(name.clone(), rows);
        }
        Ok(store)
    }

    pub fn table(&self, name: &str) -> Option<&[Row]> {
        self.tables.get(name).map(Vec::as_slice)
    }

    pub fn tables(&self) -> &BTreeMap<String, Vec<Row>> {
        &self.tables
    }

    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    pub fn in_transaction(&self) -> bool {
        !self.snapshots.is_empty()
    }

    fn check_failure(&self, table: &str) -> StoreResult<()> {
        match &self.fail_on {
            Some(failing) if failing == table => Err(StoreError::Query(format!(
                "simulated failure on table '{}'",
                table
            ))),
            _ => Ok(()),
        }
    }

    fn rows_of(&self, table: &str) -> StoreResult<&[Row]> {
        self.table(table)
            .ok_or_else(|| StoreError::Query(format!("Table '{}' does not exist", table)))
    }

    /// Joined, filtered and grouped rows, keyed by both bare and qualified names
    fn matching_rows(&self, query: &SelectQuery) -> StoreResult<Vec<Row>> {
        let mut rows: Vec<Row> = self
            .rows_of(&query.table.name)?
            .iter()
            .map(|row| scope(row, &query.table))
            .collect();

        for join in &query.joins {
            rows = self.apply_join(rows, join)?;
        }

        if let Some(predicate) = &query.predicate {
            let mut kept = Vec::with_capacity(rows.len());
            for row in rows {
                if eval_predicate(predicate, &row)? {
                    kept.push(row);
                }
            }
            rows = kept;
        }

        if !query.group_by.is_empty() {
            let mut seen = BTreeSet::new();
            let mut grouped = Vec::new();
            for row in rows {
                let key = query
                    .group_by
                    .iter()
                    .map(|col| eval_expr(&Expr::column(col.as_str()), &row))
                    .collect::<StoreResult<Vec<_>>>()?;
                if seen.insert(Value::Array(key).to_string()) {
                    grouped.push(row);
                }
            }
            rows = grouped;
        }

        Ok(rows)
    }

    fn apply_join(&self, left: Vec<Row>, join: &Join) -> StoreResult<Vec<Row>> {
        let right: Vec<Row> = self
            .rows_of(&join.table.name)?
            .iter()
            .map(|row| scope(row, &join.table))
            .collect();

        if join.kind == JoinKind::Cross {
            return Ok(left
                .iter()
                .flat_map(|l| right.iter().map(move |r| merge(l, r)))
                .collect());
        }

        let condition = join.on.as_ref().ok_or_else(|| {
            StoreError::Query(format!("Join on '{}' has no condition", join.table.name))
        })?;

        let mut out = Vec::new();
        let mut right_matched = vec![false; right.len()];
        for l in &left {
            let mut matched = false;
            for (i, r) in right.iter().enumerate() {
                let merged = merge(l, r);
                if eval_join_condition(condition, &merged)? {
                    matched = true;
                    right_matched[i] = true;
                    out.push(merged);
                }
            }
            if !matched && join.kind == JoinKind::Left {
                out.push(merge(l, &null_row(&right)));
            }
        }

        if join.kind == JoinKind::Right {
            let padding = null_row(&left);
            for (r, matched) in right.iter().zip(right_matched) {
                if !matched {
                    out.push(merge(&padding, r));
                }
            }
        }

        Ok(out)
    }

    fn project(&self, row: &Row, projection: &[Projection]) -> StoreResult<Row> {
        if projection.is_empty() {
            return Ok(bare_columns(row));
        }

        let mut out = Row::new();
        for item in projection {
            if let Expr::Column { name } = &item.expr {
                if name == "*" {
                    out.extend(bare_columns(row));
                    continue;
                }
                if let Some(qualifier) = name.strip_suffix(".*") {
                    let prefix = format!("{}.", qualifier);
                    for (key, value) in row {
                        if let Some(column) = key.strip_prefix(&prefix) {
                            out.insert(column.to_string(), value.clone());
                        }
                    }
                    continue;
                }
            }

            let key = item.output_key().ok_or_else(|| {
                StoreError::Unsupported("projection without an output name".to_string())
            })?;
            out.insert(key, eval_expr(&item.expr, row)?);
        }
        Ok(out)
    }

    fn matching_indices(
        &self,
        table: &TableRef,
        predicate: &Predicate,
    ) -> StoreResult<Vec<usize>> {
        let mut indices = Vec::new();
        for (i, row) in self.rows_of(&table.name)?.iter().enumerate() {
            if eval_predicate(predicate, &scope(row, table))? {
                indices.push(i);
            }
        }
        Ok(indices)
    }
}

impl Store for MemoryStore {
    fn select(&mut self, stmt: Statement<'_, SelectQuery>) -> StoreResult<Vec<Row>> {
        self.stats.selects += 1;
        let query = stmt.query;
        self.check_failure(&query.table.name)?;

        let rows = self.matching_rows(query)?;

        let mut keyed = Vec::with_capacity(rows.len());
        for row in rows {
            let keys = query
                .order_by
                .iter()
                .map(|o| eval_expr(&o.expr, &row))
                .collect::<StoreResult<Vec<_>>>()?;
            keyed.push((keys, row));
        }
        keyed.sort_by(|(a, _), (b, _)| {
            query
                .order_by
                .iter()
                .zip(a.iter().zip(b))
                .map(|(o, (x, y))| sort_order(x, y, o.direction))
                .find(|ord| ord.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map_or(usize::MAX, |l| l as usize);

        keyed
            .iter()
            .skip(offset)
            .take(limit)
            .map(|(_, row)| self.project(row, &query.projection))
            .collect()
    }

    fn count(&mut self, stmt: Statement<'_, SelectQuery>) -> StoreResult<u64> {
        self.stats.counts += 1;
        self.check_failure(&stmt.query.table.name)?;
        Ok(self.matching_rows(stmt.query)?.len() as u64)
    }

    fn insert(&mut self, stmt: Statement<'_, InsertQuery>) -> StoreResult<InsertOutcome> {
        self.stats.inserts += 1;
        let query = stmt.query;
        self.check_failure(&query.table.name)?;

        if let Some(bad) = query.rows.iter().find(|r| r.len() != query.columns.len()) {
            return Err(StoreError::Query(format!(
                "INSERT has {} columns but {} values",
                query.columns.len(),
                bad.len()
            )));
        }

        let pk = self.primary_key.clone();
        let table = self.tables.entry(query.table.name.clone()).or_default();
        let mut next_id = table
            .iter()
            .filter_map(|r| r.get(&pk).and_then(Value::as_i64))
            .max()
            .unwrap_or(0)
            + 1;

        let mut last_insert_id = None;
        for values in &query.rows {
            let mut row: Row = query
                .columns
                .iter()
                .cloned()
                .zip(values.iter().cloned())
                .collect();

            match row.get(&pk) {
                None | Some(Value::Null) => {
                    row.insert(pk.clone(), Value::from(next_id));
                    last_insert_id = Some(Value::from(next_id));
                    next_id += 1;
                }
                Some(existing) => {
                    if let Some(id) = existing.as_i64() {
                        next_id = next_id.max(id + 1);
                    }
                }
            }
            table.push(row);
        }

        Ok(InsertOutcome {
            rows_affected: query.rows.len() as u64,
            last_insert_id,
        })
    }

    fn update(&mut self, stmt: Statement<'_, UpdateQuery>) -> StoreResult<u64> {
        self.stats.updates += 1;
        let query = stmt.query;
        self.check_failure(&query.table.name)?;

        let indices = self.matching_indices(&query.table, &query.predicate)?;
        if let Some(rows) = self.tables.get_mut(&query.table.name) {
            for &i in &indices {
                for (column, value) in &query.assignments {
                    rows[i].insert(column.clone(), value.clone());
                }
            }
        }
        Ok(indices.len() as u64)
    }

    fn delete(&mut self, stmt: Statement<'_, DeleteQuery>) -> StoreResult<u64> {
        self.stats.deletes += 1;
        let query = stmt.query;
        self.check_failure(&query.table.name)?;

        let indices: BTreeSet<usize> = self
            .matching_indices(&query.table, &query.predicate)?
            .into_iter()
            .collect();
        if let Some(rows) = self.tables.get_mut(&query.table.name) {
            let mut i = 0;
            rows.retain(|_| {
                let keep = !indices.contains(&i);
                i += 1;
                keep
            });
        }
        Ok(indices.len() as u64)
    }

    fn begin(&mut self, connection: &str) -> StoreResult<()> {
        self.stats.begins += 1;
        if self.snapshots.contains_key(connection) {
            return Err(StoreError::Transaction(format!(
                "Transaction already active on connection '{}'",
                connection
            )));
        }
        self.snapshots
            .insert(connection.to_string(), self.tables.clone());
        Ok(())
    }

    fn commit(&mut self, connection: &str) -> StoreResult<()> {
        self.stats.commits += 1;
        self.snapshots
            .remove(connection)
            .map(|_| ())
            .ok_or_else(|| no_transaction(connection))
    }

    fn rollback(&mut self, connection: &str) -> StoreResult<()> {
        self.stats.rollbacks += 1;
        let snapshot = self
            .snapshots
            .remove(connection)
            .ok_or_else(|| no_transaction(connection))?;
        self.tables = snapshot;
        Ok(())
    }
}

fn no_transaction(connection: &str) -> StoreError {
    StoreError::Transaction(format!(
        "No active transaction on connection '{}'",
        connection
    ))
}

/// Key a row by bare column name and by `qualifier.column`
fn scope(row: &Row, table: &TableRef) -> Row {
    let mut scoped = Row::new();
    for (column, value) in row {
        scoped.insert(format!("{}.{}", table.qualifier(), column), value.clone());
        scoped.insert(column.clone(), value.clone());
    }
    scoped
}

/// Combine two scoped rows; bare names from `left` win unless NULL
fn merge(left: &Row, right: &Row) -> Row {
    let mut merged = left.clone();
    for (key, value) in right {
        match merged.get(key) {
            Some(existing) if !key.contains('.') && !existing.is_null() => {}
            _ => {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}

/// A row of NULLs over every key appearing in `rows`
fn null_row(rows: &[Row]) -> Row {
    rows.iter()
        .flat_map(|row| row.keys())
        .map(|key| (key.clone(), Value::Null))
        .collect()
}

fn bare_columns(row: &Row) -> Row {
    row.iter()
        .filter(|(key, _)| !key.contains('.'))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
