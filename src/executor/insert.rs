use crate::planner::ast::InsertStatement;
use crate::storage::database::{Database, Mutation};
use crate::storage::table::Table;
use crate::types::error::{DatabaseError, Result};
use crate::types::value::Value;

/// Appends the statement's tuples to the table and assembles the successor
/// snapshot: tree blocks first, then the table block, then the new root.
pub(crate) async fn execute(db: &Database, stmt: InsertStatement) -> Result<Mutation> {
    let table = db.load_table(&stmt.table).await?;
    let rows = match &stmt.columns {
        None => stmt.rows,
        Some(columns) => reorder_rows(&table, columns, stmt.rows)?,
    };
    let (table, blocks) = table.insert(db.ctx(), rows).await?;
    Ok(db.finish_mutation(table, blocks))
}

/// Maps tuples given for an explicit column list back into declaration
/// order, padding unnamed columns with nulls.
fn reorder_rows(
    table: &Table,
    columns: &[String],
    rows: Vec<Vec<Value>>,
) -> Result<Vec<Vec<Value>>> {
    let mut positions = Vec::with_capacity(columns.len());
    for name in columns {
        let position = table
            .column_index(name)
            .ok_or_else(|| DatabaseError::ColumnNotFound {
                name: name.clone(),
                table: table.name.clone(),
            })?;
        if positions.contains(&position) {
            return Err(DatabaseError::DuplicateColumn { name: name.clone() });
        }
        positions.push(position);
    }

    rows.into_iter()
        .map(|row| {
            if row.len() != positions.len() {
                return Err(DatabaseError::Constraint {
                    details: format!(
                        "{} values for {} named columns",
                        row.len(),
                        positions.len()
                    ),
                });
            }
            let mut full = vec![Value::Null; table.columns.len()];
            for (&position, value) in positions.iter().zip(row) {
                full[position] = value;
            }
            Ok(full)
        })
        .collect()
}
