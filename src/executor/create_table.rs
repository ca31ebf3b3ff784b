use crate::planner::ast::CreateTableStatement;
use crate::storage::database::{Database, Mutation};
use crate::storage::schema::{ColumnSchema, TableSchema};
use crate::storage::table::Table;
use crate::types::error::{DatabaseError, Result};

/// Creates an empty table: a table block with null tree roots plus the
/// successor database root.
pub(crate) async fn execute(db: &Database, stmt: CreateTableStatement) -> Result<Mutation> {
    if db.has_table(&stmt.name) {
        return Err(DatabaseError::TableExists { name: stmt.name });
    }
    let schema = TableSchema::new(
        stmt.columns
            .into_iter()
            .map(|decl| ColumnSchema::new(decl.name, decl.data_type))
            .collect(),
    )?;
    let table = Table::create(stmt.name, schema);
    Ok(db.finish_mutation(table, Vec::new()))
}
