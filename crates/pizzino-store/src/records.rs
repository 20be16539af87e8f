use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::{Result, StoreError};

/// The tables created by the migrations, one per collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Datagrams,
    Inbox,
    Bundles,
    Outbox,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Datagrams => "datagrams",
            Table::Inbox => "inbox",
            Table::Bundles => "bundles",
            Table::Outbox => "outbox",
        }
    }
}

impl Database {
    /// Insert or replace the document stored under `key` in one statement.
    pub fn upsert_record(&self, table: Table, key: &str, document: &str) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (key, document) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET document = excluded.document",
            table.name()
        );
        self.conn()
            .execute(&sql, params![key, document])
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    StoreError::UniquenessViolation(key.to_string())
                }
                other => StoreError::Sqlite(other),
            })?;
        Ok(())
    }

    pub fn get_record(&self, table: Table, key: &str) -> Result<Option<String>> {
        let sql = format!("SELECT document FROM {} WHERE key = ?1", table.name());
        let document = self
            .conn()
            .query_row(&sql, params![key], |row| row.get(0))
            .optional()?;
        Ok(document)
    }

    pub fn has_record(&self, table: Table, key: &str) -> Result<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE key = ?1)",
            table.name()
        );
        let exists: bool = self.conn().query_row(&sql, params![key], |row| row.get(0))?;
        Ok(exists)
    }

    pub fn delete_record(&self, table: Table, key: &str) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE key = ?1", table.name());
        let affected = self.conn().execute(&sql, params![key])?;
        Ok(affected > 0)
    }

    /// Every document of `table`, oldest insertion first.
    pub fn list_records(&self, table: Table) -> Result<Vec<String>> {
        let sql = format!("SELECT document FROM {} ORDER BY seq ASC", table.name());
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn count_records(&self, table: Table) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        let count: i64 = self.conn().query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
