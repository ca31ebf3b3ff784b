//! Turns a parsed SELECT into an index-driven plan over one table. All
//! name resolution and type checking happens here, so execution only sees
//! well-formed column positions.

use crate::planner::ast::{CompareOp, Projection, SelectStatement};
use crate::planner::normalize::{to_dnf, Atom};
use crate::storage::db_index::ValueRange;
use crate::storage::table::Table;
use crate::types::error::{DatabaseError, Result};
use crate::types::value::{DataType, Value};

/// One atomic comparison answered by a column index range scan.
#[derive(Debug, Clone)]
pub struct IndexAtom {
    pub column: usize,
    pub range: ValueRange,
}

/// One atomic comparison evaluated against a materialized row.
#[derive(Debug, Clone)]
pub struct CompiledAtom {
    pub column: usize,
    pub op: CompareOp,
    pub value: Value,
}

#[derive(Debug, Clone)]
pub enum QueryPlan {
    /// No filter and no ordering: walk the row tree ascending.
    FullScan,
    /// Filter without ordering: per-atom index ranges, intersected within
    /// each AND group, groups unioned.
    IndexLookup { groups: Vec<Vec<IndexAtom>> },
    /// ORDER BY: stream the order column's index in the requested
    /// direction and filter each candidate row.
    OrderedScan {
        column: usize,
        descending: bool,
        filter: Option<Vec<Vec<CompiledAtom>>>,
    },
}

#[derive(Debug, Clone)]
pub struct SelectPlan {
    pub plan: QueryPlan,
    /// Column positions to emit, in output order.
    pub projection: Vec<usize>,
    pub column_names: Vec<String>,
}

pub fn plan_select(table: &Table, stmt: &SelectStatement) -> Result<SelectPlan> {
    let projection = resolve_projection(table, &stmt.projection)?;
    let column_names = projection
        .iter()
        .map(|&i| table.columns[i].schema.name.clone())
        .collect();

    let groups = match &stmt.filter {
        Some(filter) => Some(resolve_groups(table, to_dnf(filter))?),
        None => None,
    };

    let plan = match (&stmt.order_by, groups) {
        (Some(order), groups) => QueryPlan::OrderedScan {
            column: resolve_column(table, &order.column)?,
            descending: order.descending,
            filter: groups,
        },
        (None, Some(groups)) => QueryPlan::IndexLookup {
            groups: groups
                .into_iter()
                .map(|group| group.into_iter().map(index_atom).collect())
                .collect(),
        },
        (None, None) => QueryPlan::FullScan,
    };

    Ok(SelectPlan {
        plan,
        projection,
        column_names,
    })
}

fn resolve_projection(table: &Table, projection: &Projection) -> Result<Vec<usize>> {
    match projection {
        Projection::All => Ok((0..table.columns.len()).collect()),
        Projection::Columns(names) => names
            .iter()
            .map(|name| resolve_column(table, name))
            .collect(),
    }
}

fn resolve_column(table: &Table, name: &str) -> Result<usize> {
    table
        .column_index(name)
        .ok_or_else(|| DatabaseError::ColumnNotFound {
            name: name.to_string(),
            table: table.name.clone(),
        })
}

/// Resolves and type-checks every atom of the DNF against the schema.
fn resolve_groups(table: &Table, groups: Vec<Vec<Atom>>) -> Result<Vec<Vec<CompiledAtom>>> {
    groups
        .into_iter()
        .map(|group| {
            group
                .into_iter()
                .map(|atom| {
                    let column = resolve_column(table, &atom.column)?;
                    check_comparable(&table.columns[column].schema.data_type, &atom.value)?;
                    Ok(CompiledAtom {
                        column,
                        op: atom.op,
                        value: atom.value,
                    })
                })
                .collect()
        })
        .collect()
}

fn check_comparable(data_type: &DataType, value: &Value) -> Result<()> {
    let matches = matches!(
        (data_type, value),
        (DataType::Integer, Value::Integer(_)) | (DataType::Varchar(_), Value::Text(_))
    );
    if matches {
        Ok(())
    } else {
        Err(DatabaseError::TypeMismatch {
            expected: data_type.to_string(),
            actual: value.data_type_name().to_string(),
        })
    }
}

fn index_atom(atom: CompiledAtom) -> IndexAtom {
    let range = match atom.op {
        CompareOp::Eq => ValueRange::Eq(atom.value),
        CompareOp::Lt => ValueRange::Lt(atom.value),
        CompareOp::LtEq => ValueRange::Le(atom.value),
        CompareOp::Gt => ValueRange::Gt(atom.value),
        CompareOp::GtEq => ValueRange::Ge(atom.value),
    };
    IndexAtom {
        column: atom.column,
        range,
    }
}
