use crate::storage::block::{Block, Cid};
use crate::storage::codec;
use crate::storage::db_index::DbIndex;
use crate::storage::schema::{ColumnSchema, TableSchema};
use crate::storage::sparse_array::SparseArray;
use crate::storage::tree::{Direction, TreeContext};
use crate::types::error::{DatabaseError, Result};
use crate::types::row::Row;
use crate::types::value::{DataType, Value};

/// Runtime column: its declared schema plus the root of its value index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub schema: ColumnSchema,
    pub index_root: Option<Cid>,
}

/// Immutable table value. A mutation yields a new `Table` with the same
/// schema and new tree roots; the old value keeps describing the old
/// snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub rows_root: Option<Cid>,
}

impl Table {
    pub fn create(name: impl Into<String>, schema: TableSchema) -> Self {
        Self {
            name: name.into(),
            columns: schema
                .columns
                .into_iter()
                .map(|schema| Column {
                    schema,
                    index_root: None,
                })
                .collect(),
            rows_root: None,
        }
    }

    pub fn schema(&self) -> TableSchema {
        TableSchema {
            columns: self.columns.iter().map(|c| c.schema.clone()).collect(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.schema.name == name)
    }

    pub fn encode(&self) -> Block {
        Block::new(codec::encode_table(self))
    }

    /// Inserts the given tuples, assigning consecutive row ids, and returns
    /// the successor table together with every block the tree walks
    /// produced, children before parents.
    pub async fn insert(
        &self,
        ctx: &TreeContext,
        rows: Vec<Vec<Value>>,
    ) -> Result<(Table, Vec<Block>)> {
        let mut blocks = Vec::new();
        let mut sparse = SparseArray::new(ctx.clone(), self.rows_root);
        let mut indexes: Vec<DbIndex> = self
            .columns
            .iter()
            .map(|c| DbIndex::new(ctx.clone(), c.index_root))
            .collect();

        let mut next_row_id = match sparse.max_row_id().await? {
            Some(max) => max + 1,
            None => 0,
        };

        for raw in rows {
            let row = self.normalize_values(raw)?;
            let row_id = next_row_id;
            next_row_id += 1;

            for (i, index) in indexes.iter_mut().enumerate() {
                blocks.extend(index.insert(row.values[i].clone(), row_id).await?);
            }
            blocks.extend(sparse.insert(row_id, row).await?);
        }

        let table = Table {
            name: self.name.clone(),
            columns: self
                .columns
                .iter()
                .zip(&indexes)
                .map(|(column, index)| Column {
                    schema: column.schema.clone(),
                    index_root: index.root().copied(),
                })
                .collect(),
            rows_root: sparse.root().copied(),
        };
        Ok((table, blocks))
    }

    /// Pads a partial tuple with nulls and checks it against the schema.
    fn normalize_values(&self, mut values: Vec<Value>) -> Result<Row> {
        if values.len() > self.columns.len() {
            return Err(DatabaseError::Constraint {
                details: format!(
                    "{} values for {} columns in table '{}'",
                    values.len(),
                    self.columns.len(),
                    self.name
                ),
            });
        }
        values.resize(self.columns.len(), Value::Null);

        for (value, column) in values.iter().zip(&self.columns) {
            if !column.schema.data_type.accepts(value) {
                return Err(DatabaseError::TypeMismatch {
                    expected: column.schema.data_type.to_string(),
                    actual: value.data_type_name().to_string(),
                });
            }
            if let (DataType::Varchar(limit), Value::Text(text)) = (&column.schema.data_type, value)
            {
                let length = text.chars().count();
                if length > *limit as usize {
                    return Err(DatabaseError::Constraint {
                        details: format!(
                            "string of length {} exceeds VARCHAR({}) in column '{}'",
                            length, limit, column.schema.name
                        ),
                    });
                }
            }
        }
        Ok(Row::new(values))
    }

    /// Number of stored rows. Walks the row tree, so this is a full scan.
    pub async fn row_count(&self, ctx: &TreeContext) -> Result<u64> {
        let sparse = SparseArray::new(ctx.clone(), self.rows_root);
        let mut cursor = sparse.scan(Direction::Ascending).await?;
        let mut count = 0;
        while cursor.next().await?.is_some() {
            count += 1;
        }
        Ok(count)
    }
}
