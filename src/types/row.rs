use serde::{Deserialize, Serialize};

use crate::types::value::Value;

/// An ordered tuple of values, one per column in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn get_value(&self, column_index: usize) -> Option<&Value> {
        self.values.get(column_index)
    }

    /// Projects the listed column positions into a new row.
    pub fn project(&self, positions: &[usize]) -> Row {
        Row::new(
            positions
                .iter()
                .map(|&i| self.values.get(i).cloned().unwrap_or(Value::Null))
                .collect(),
        )
    }
}
