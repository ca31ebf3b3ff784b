pub mod error;
pub mod row;
pub mod value;

// Common type aliases
pub type RowId = u64;
