use std::cmp::Ordering;

use crate::planner::ast::CompareOp;
use crate::planner::plan::CompiledAtom;
use crate::types::error::Result;
use crate::types::row::Row;

/// Evaluates a DNF filter against a materialized row. Null column values
/// satisfy no comparison.
pub fn matches_row(groups: &[Vec<CompiledAtom>], row: &Row) -> Result<bool> {
    for group in groups {
        if matches_group(group, row)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn matches_group(group: &[CompiledAtom], row: &Row) -> Result<bool> {
    for atom in group {
        if !matches_atom(atom, row)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches_atom(atom: &CompiledAtom, row: &Row) -> Result<bool> {
    let Some(value) = row.get_value(atom.column) else {
        return Ok(false);
    };
    if value.is_null() {
        return Ok(false);
    }
    let ordering = value.typed_cmp(&atom.value)?;
    Ok(match atom.op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::LtEq => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::GtEq => ordering != Ordering::Less,
    })
}
