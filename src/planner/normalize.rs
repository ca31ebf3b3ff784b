//! Rewrites a filter expression into disjunctive normal form, an OR of AND
//! groups of atomic comparisons. The planner answers each atom with one
//! index range and combines the row id sets.

use crate::planner::ast::{CompareOp, Expr};
use crate::types::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub column: String,
    pub op: CompareOp,
    pub value: Value,
}

/// DNF of `expr`: the outer vector is the OR, each inner vector an AND
/// group. ANDs distribute over ORs, so the result can grow with nesting
/// depth; filters here are small.
pub fn to_dnf(expr: &Expr) -> Vec<Vec<Atom>> {
    match expr {
        Expr::Compare { column, op, value } => vec![vec![Atom {
            column: column.clone(),
            op: op.clone(),
            value: value.clone(),
        }]],
        Expr::Or(left, right) => {
            let mut groups = to_dnf(left);
            groups.extend(to_dnf(right));
            groups
        }
        Expr::And(left, right) => {
            let left_groups = to_dnf(left);
            let right_groups = to_dnf(right);
            let mut groups = Vec::with_capacity(left_groups.len() * right_groups.len());
            for l in &left_groups {
                for r in &right_groups {
                    let mut group = l.clone();
                    group.extend(r.iter().cloned());
                    groups.push(group);
                }
            }
            groups
        }
    }
}
