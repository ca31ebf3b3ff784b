//! Canonical block encoding. The same logical payload must always produce
//! the same bytes, since a block's identity is the hash of its bytes. All
//! integers are little-endian fixed width, strings are length-prefixed
//! UTF-8, entries appear in key order, and map entries in name order.

use std::collections::BTreeMap;

use crate::storage::block::Cid;
use crate::storage::node::{BranchEntry, LeafEntry, Node, TreeKey};
use crate::storage::schema::ColumnSchema;
use crate::storage::table::{Column, Table};
use crate::types::error::{DatabaseError, Result};
use crate::types::row::Row;
use crate::types::value::{DataType, Value};

const KIND_LEAF: u8 = 0x01;
const KIND_BRANCH: u8 = 0x02;
const KIND_TABLE: u8 = 0x03;
const KIND_DB: u8 = 0x04;

const VALUE_NULL: u8 = 0;
const VALUE_INTEGER: u8 = 1;
const VALUE_TEXT: u8 = 2;

const KEY_ROW: u8 = 1;
const KEY_INDEX: u8 = 2;

const TYPE_INTEGER: u8 = 1;
const TYPE_VARCHAR: u8 = 2;

// ---------------------------------------------------------------- encoding

fn put_u32(buffer: &mut Vec<u8>, n: u32) {
    buffer.extend_from_slice(&n.to_le_bytes());
}

fn put_u64(buffer: &mut Vec<u8>, n: u64) {
    buffer.extend_from_slice(&n.to_le_bytes());
}

fn put_str(buffer: &mut Vec<u8>, s: &str) {
    put_u32(buffer, s.len() as u32);
    buffer.extend_from_slice(s.as_bytes());
}

fn put_cid(buffer: &mut Vec<u8>, cid: &Cid) {
    buffer.extend_from_slice(cid.as_bytes());
}

fn put_opt_cid(buffer: &mut Vec<u8>, cid: Option<&Cid>) {
    match cid {
        Some(cid) => {
            buffer.push(1);
            put_cid(buffer, cid);
        }
        None => buffer.push(0),
    }
}

fn encode_value(buffer: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => buffer.push(VALUE_NULL),
        Value::Integer(i) => {
            buffer.push(VALUE_INTEGER);
            buffer.extend_from_slice(&i.to_le_bytes());
        }
        Value::Text(s) => {
            buffer.push(VALUE_TEXT);
            put_str(buffer, s);
        }
    }
}

fn encode_row(buffer: &mut Vec<u8>, row: &Row) {
    put_u32(buffer, row.values.len() as u32);
    for value in &row.values {
        encode_value(buffer, value);
    }
}

fn encode_key(buffer: &mut Vec<u8>, key: &TreeKey) {
    match key {
        TreeKey::Row(row_id) => {
            buffer.push(KEY_ROW);
            put_u64(buffer, *row_id);
        }
        TreeKey::Index { value, row_id } => {
            buffer.push(KEY_INDEX);
            encode_value(buffer, value);
            put_u64(buffer, *row_id);
        }
    }
}

/// Canonical key bytes, the chunker's boundary input.
pub fn key_bytes(key: &TreeKey) -> Vec<u8> {
    let mut buffer = Vec::new();
    encode_key(&mut buffer, key);
    buffer
}

fn encode_leaf_entry(buffer: &mut Vec<u8>, entry: &LeafEntry) {
    match entry {
        LeafEntry::Row { row_id, row } => {
            buffer.push(KEY_ROW);
            put_u64(buffer, *row_id);
            encode_row(buffer, row);
        }
        LeafEntry::Index { value, row_id } => {
            buffer.push(KEY_INDEX);
            encode_value(buffer, value);
            put_u64(buffer, *row_id);
        }
    }
}

pub fn encode_node(node: &Node) -> Vec<u8> {
    let mut buffer = Vec::new();
    match node {
        Node::Leaf(entries) => {
            buffer.push(KIND_LEAF);
            put_u32(&mut buffer, entries.len() as u32);
            for entry in entries {
                encode_leaf_entry(&mut buffer, entry);
            }
        }
        Node::Branch(entries) => {
            buffer.push(KIND_BRANCH);
            put_u32(&mut buffer, entries.len() as u32);
            for entry in entries {
                encode_key(&mut buffer, &entry.key);
                put_cid(&mut buffer, &entry.child);
            }
        }
    }
    buffer
}

pub fn encode_table(table: &Table) -> Vec<u8> {
    let mut buffer = Vec::new();
    buffer.push(KIND_TABLE);
    put_str(&mut buffer, &table.name);
    put_u32(&mut buffer, table.columns.len() as u32);
    for column in &table.columns {
        put_str(&mut buffer, &column.schema.name);
        match column.schema.data_type {
            DataType::Integer => buffer.push(TYPE_INTEGER),
            DataType::Varchar(len) => {
                buffer.push(TYPE_VARCHAR);
                put_u32(&mut buffer, len);
            }
        }
        put_opt_cid(&mut buffer, column.index_root.as_ref());
    }
    put_opt_cid(&mut buffer, table.rows_root.as_ref());
    buffer
}

pub fn encode_database(tables: &BTreeMap<String, Cid>) -> Vec<u8> {
    let mut buffer = Vec::new();
    buffer.push(KIND_DB);
    put_u32(&mut buffer, tables.len() as u32);
    for (name, cid) in tables {
        put_str(&mut buffer, name);
        put_cid(&mut buffer, cid);
    }
    buffer
}

// ---------------------------------------------------------------- decoding

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn error(&self, details: &str) -> DatabaseError {
        DatabaseError::Codec {
            details: format!("{} at offset {}", details, self.pos),
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(self.error("truncated block"));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        let raw = self.take(4)?;
        Ok(u32::from_le_bytes(raw.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64> {
        let raw = self.take(8)?;
        Ok(u64::from_le_bytes(raw.try_into().unwrap()))
    }

    fn i64(&mut self) -> Result<i64> {
        let raw = self.take(8)?;
        Ok(i64::from_le_bytes(raw.try_into().unwrap()))
    }

    fn str(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| self.error("invalid UTF-8"))
    }

    fn cid(&mut self) -> Result<Cid> {
        let raw = self.take(Cid::LEN)?;
        Ok(Cid::from_bytes(raw.try_into().unwrap()))
    }

    fn opt_cid(&mut self) -> Result<Option<Cid>> {
        match self.u8()? {
            0 => Ok(None),
            1 => Ok(Some(self.cid()?)),
            tag => Err(self.error(&format!("invalid option tag {}", tag))),
        }
    }

    fn value(&mut self) -> Result<Value> {
        match self.u8()? {
            VALUE_NULL => Ok(Value::Null),
            VALUE_INTEGER => Ok(Value::Integer(self.i64()?)),
            VALUE_TEXT => Ok(Value::Text(self.str()?)),
            tag => Err(self.error(&format!("unknown value tag {}", tag))),
        }
    }

    fn row(&mut self) -> Result<Row> {
        let count = self.u32()? as usize;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.value()?);
        }
        Ok(Row::new(values))
    }

    fn key(&mut self) -> Result<TreeKey> {
        match self.u8()? {
            KEY_ROW => Ok(TreeKey::Row(self.u64()?)),
            KEY_INDEX => {
                let value = self.value()?;
                let row_id = self.u64()?;
                Ok(TreeKey::Index { value, row_id })
            }
            tag => Err(self.error(&format!("unknown key tag {}", tag))),
        }
    }

    fn leaf_entry(&mut self) -> Result<LeafEntry> {
        match self.u8()? {
            KEY_ROW => {
                let row_id = self.u64()?;
                let row = self.row()?;
                Ok(LeafEntry::Row { row_id, row })
            }
            KEY_INDEX => {
                let value = self.value()?;
                let row_id = self.u64()?;
                Ok(LeafEntry::Index { value, row_id })
            }
            tag => Err(self.error(&format!("unknown entry tag {}", tag))),
        }
    }

    fn finish(&self) -> Result<()> {
        if self.pos != self.bytes.len() {
            return Err(self.error("trailing bytes"));
        }
        Ok(())
    }
}

pub fn decode_node(bytes: &[u8]) -> Result<Node> {
    let mut reader = Reader::new(bytes);
    let node = match reader.u8()? {
        KIND_LEAF => {
            let count = reader.u32()? as usize;
            let mut entries = Vec::with_capacity(count);
            for _ in 0..count {
                entries.push(reader.leaf_entry()?);
            }
            Node::Leaf(entries)
        }
        KIND_BRANCH => {
            let count = reader.u32()? as usize;
            let mut entries = Vec::with_capacity(count);
            for _ in 0..count {
                let key = reader.key()?;
                let child = reader.cid()?;
                entries.push(BranchEntry { key, child });
            }
            Node::Branch(entries)
        }
        kind => return Err(reader.error(&format!("expected tree node, found kind {}", kind))),
    };
    reader.finish()?;
    Ok(node)
}

pub fn decode_table(bytes: &[u8]) -> Result<Table> {
    let mut reader = Reader::new(bytes);
    if reader.u8()? != KIND_TABLE {
        return Err(reader.error("expected table block"));
    }
    let name = reader.str()?;
    let count = reader.u32()? as usize;
    let mut columns = Vec::with_capacity(count);
    for _ in 0..count {
        let column_name = reader.str()?;
        let data_type = match reader.u8()? {
            TYPE_INTEGER => DataType::Integer,
            TYPE_VARCHAR => DataType::Varchar(reader.u32()?),
            tag => return Err(reader.error(&format!("unknown column type tag {}", tag))),
        };
        let index_root = reader.opt_cid()?;
        columns.push(Column {
            schema: ColumnSchema::new(column_name, data_type),
            index_root,
        });
    }
    let rows_root = reader.opt_cid()?;
    reader.finish()?;
    Ok(Table {
        name,
        columns,
        rows_root,
    })
}

pub fn decode_database(bytes: &[u8]) -> Result<BTreeMap<String, Cid>> {
    let mut reader = Reader::new(bytes);
    if reader.u8()? != KIND_DB {
        return Err(reader.error("expected database root block"));
    }
    let count = reader.u32()? as usize;
    let mut tables = BTreeMap::new();
    for _ in 0..count {
        let name = reader.str()?;
        let cid = reader.cid()?;
        tables.insert(name, cid);
    }
    reader.finish()?;
    Ok(tables)
}
