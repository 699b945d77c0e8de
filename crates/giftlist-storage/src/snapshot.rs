//! Uniform record access over read and write transactions.
//!
//! Decision logic must run unchanged against a read snapshot (plain permission
//! checks) and against an open write transaction (re-validation right before a
//! reservation is written). `Snapshot` is the read surface both provide;
//! `SnapshotMut` adds writes and is only implemented for write transactions.

use anyhow::Result;
use redb::{ReadTransaction, ReadableTable, WriteTransaction};

use crate::tables::{RecordTable, prefix_upper_bound};

pub trait Snapshot {
    /// Fetch one record by key.
    fn read(&self, table: RecordTable, key: &str) -> Result<Option<Vec<u8>>>;

    /// Fetch every record whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, table: RecordTable, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;

    /// Fetch every record in the table.
    fn scan_all(&self, table: RecordTable) -> Result<Vec<(String, Vec<u8>)>>;
}

pub trait SnapshotMut: Snapshot {
    /// Insert or overwrite a record.
    fn write(&self, table: RecordTable, key: &str, data: &[u8]) -> Result<()>;

    /// Delete a record, returns true if it existed.
    fn remove(&self, table: RecordTable, key: &str) -> Result<bool>;
}

fn collect_prefix<T>(table: &T, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let end = prefix_upper_bound(prefix);
    let rows = match &end {
        Some(end) => table.range(prefix..end.as_str())?,
        None => table.range(prefix..)?,
    };
    let mut items = Vec::new();
    for item in rows {
        let (key, value) = item?;
        items.push((key.value().to_string(), value.value().to_vec()));
    }
    Ok(items)
}

fn collect_all<T>(table: &T) -> Result<Vec<(String, Vec<u8>)>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let mut items = Vec::new();
    for item in table.iter()? {
        let (key, value) = item?;
        items.push((key.value().to_string(), value.value().to_vec()));
    }
    Ok(items)
}

impl Snapshot for ReadTransaction {
    fn read(&self, table: RecordTable, key: &str) -> Result<Option<Vec<u8>>> {
        let table = self.open_table(table)?;
        Ok(table.get(key)?.map(|v| v.value().to_vec()))
    }

    fn scan_prefix(&self, table: RecordTable, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let table = self.open_table(table)?;
        collect_prefix(&table, prefix)
    }

    fn scan_all(&self, table: RecordTable) -> Result<Vec<(String, Vec<u8>)>> {
        let table = self.open_table(table)?;
        collect_all(&table)
    }
}

impl Snapshot for WriteTransaction {
    fn read(&self, table: RecordTable, key: &str) -> Result<Option<Vec<u8>>> {
        let table = self.open_table(table)?;
        Ok(table.get(key)?.map(|v| v.value().to_vec()))
    }

    fn scan_prefix(&self, table: RecordTable, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let table = self.open_table(table)?;
        collect_prefix(&table, prefix)
    }

    fn scan_all(&self, table: RecordTable) -> Result<Vec<(String, Vec<u8>)>> {
        let table = self.open_table(table)?;
        collect_all(&table)
    }
}

impl SnapshotMut for WriteTransaction {
    fn write(&self, table: RecordTable, key: &str, data: &[u8]) -> Result<()> {
        let mut table = self.open_table(table)?;
        table.insert(key, data)?;
        Ok(())
    }

    fn remove(&self, table: RecordTable, key: &str) -> Result<bool> {
        let mut table = self.open_table(table)?;
        let existed = table.remove(key)?.is_some();
        Ok(existed)
    }
}
