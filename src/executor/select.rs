//! SELECT execution. The row id generator is fixed when the stream is
//! built; rows themselves are fetched and projected one `next` at a time,
//! so dropping the result abandons the remaining work.

use crate::executor::predicate::matches_row;
use crate::planner::ast::SelectStatement;
use crate::planner::plan::{plan_select, CompiledAtom, IndexAtom, QueryPlan};
use crate::storage::database::Database;
use crate::storage::db_index::{DbIndex, IndexCursor, ValueRange};
use crate::storage::sparse_array::{RowCursor, SparseArray};
use crate::storage::table::Table;
use crate::storage::tree::{Direction, TreeContext};
use crate::types::error::{DatabaseError, Result};
use crate::types::row::Row;
use crate::types::RowId;

/// Lazy row sequence plus the projected column names.
pub struct QueryResult {
    pub columns: Vec<String>,
    projection: Vec<usize>,
    stream: RowStream,
}

enum RowStream {
    Scan {
        cursor: RowCursor,
    },
    ByIds {
        ids: std::vec::IntoIter<RowId>,
        rows: SparseArray,
    },
    Ordered {
        cursor: IndexCursor,
        rows: SparseArray,
        filter: Option<Vec<Vec<CompiledAtom>>>,
    },
}

impl QueryResult {
    /// Next projected row, or `None` once the plan is drained.
    pub async fn next(&mut self) -> Result<Option<Row>> {
        match &mut self.stream {
            RowStream::Scan { cursor } => match cursor.next().await? {
                Some((_, row)) => Ok(Some(row.project(&self.projection))),
                None => Ok(None),
            },
            RowStream::ByIds { ids, rows } => match ids.next() {
                Some(row_id) => {
                    let row = fetch_row(rows, row_id).await?;
                    Ok(Some(row.project(&self.projection)))
                }
                None => Ok(None),
            },
            RowStream::Ordered {
                cursor,
                rows,
                filter,
            } => loop {
                let Some(row_id) = cursor.next().await? else {
                    return Ok(None);
                };
                let row = fetch_row(rows, row_id).await?;
                let keep = match filter {
                    Some(groups) => matches_row(groups, &row)?,
                    None => true,
                };
                if keep {
                    return Ok(Some(row.project(&self.projection)));
                }
            },
        }
    }

    /// Drains the stream.
    pub async fn all(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }
}

async fn fetch_row(rows: &SparseArray, row_id: RowId) -> Result<Row> {
    rows.get(row_id).await?.ok_or_else(|| DatabaseError::Corrupted {
        reason: format!("indexed row {} missing from row store", row_id),
    })
}

pub(crate) async fn execute(db: &Database, stmt: SelectStatement) -> Result<QueryResult> {
    let table = db.load_table(&stmt.table).await?;
    let plan = plan_select(&table, &stmt)?;
    let ctx = db.ctx();

    let stream = match plan.plan {
        QueryPlan::FullScan => {
            let rows = SparseArray::new(ctx.clone(), table.rows_root);
            RowStream::Scan {
                cursor: rows.scan(Direction::Ascending).await?,
            }
        }
        QueryPlan::IndexLookup { groups } => {
            let ids = evaluate_groups(ctx, &table, groups).await?;
            RowStream::ByIds {
                ids: ids.into_iter(),
                rows: SparseArray::new(ctx.clone(), table.rows_root),
            }
        }
        QueryPlan::OrderedScan {
            column,
            descending,
            filter,
        } => {
            let index = DbIndex::new(ctx.clone(), table.columns[column].index_root);
            let direction = if descending {
                Direction::Descending
            } else {
                Direction::Ascending
            };
            RowStream::Ordered {
                cursor: index.range(ValueRange::All, direction).await?,
                rows: SparseArray::new(ctx.clone(), table.rows_root),
                filter,
            }
        }
    };

    Ok(QueryResult {
        columns: plan.column_names,
        projection: plan.projection,
        stream,
    })
}

/// Answers a DNF: every atom becomes one index range, AND groups intersect
/// their row id sets, the groups union into one ascending id list.
async fn evaluate_groups(
    ctx: &TreeContext,
    table: &Table,
    groups: Vec<Vec<IndexAtom>>,
) -> Result<Vec<RowId>> {
    let mut merged: Vec<RowId> = Vec::new();
    for group in groups {
        let mut intersection: Option<Vec<RowId>> = None;
        for atom in group {
            let ids = atom_row_ids(ctx, table, &atom).await?;
            intersection = Some(match intersection {
                Some(current) => intersect_sorted(&current, &ids),
                None => ids,
            });
            if intersection.as_ref().is_some_and(Vec::is_empty) {
                break;
            }
        }
        merged = union_sorted(&merged, &intersection.unwrap_or_default());
    }
    Ok(merged)
}

/// Drains one index range into a sorted row id list. The index streams in
/// value order, so ids need a sort before the merges.
async fn atom_row_ids(ctx: &TreeContext, table: &Table, atom: &IndexAtom) -> Result<Vec<RowId>> {
    let index = DbIndex::new(ctx.clone(), table.columns[atom.column].index_root);
    let mut cursor = index.range(atom.range.clone(), Direction::Ascending).await?;
    let mut ids = Vec::new();
    while let Some(row_id) = cursor.next().await? {
        ids.push(row_id);
    }
    ids.sort_unstable();
    Ok(ids)
}

fn intersect_sorted(a: &[RowId], b: &[RowId]) -> Vec<RowId> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

fn union_sorted(a: &[RowId], b: &[RowId]) -> Vec<RowId> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}
